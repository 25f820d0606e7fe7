pub mod filters;
pub mod repos;
pub mod worker;
