pub mod memory_repo;
pub mod postgres_repo;
