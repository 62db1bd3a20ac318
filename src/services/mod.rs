pub mod movie_search;
pub mod recommendations;
