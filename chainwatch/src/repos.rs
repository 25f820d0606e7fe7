mod memory_repo;
#[cfg(feature = "postgres")]
mod postgres_repo;
mod repo;

pub use memory_repo::MemoryRepo;
pub use repo::{
    CursorRepo, FilterRepo, JobRepo, NotificationRepo, Repo, RepoError, SQLikeMigrations,
    UserRepo,
};

#[cfg(feature = "postgres")]
pub use postgres_repo::{
    Conn as PostgresRepoConn, ExecutesWithRawQuery, HasRawQueryClient, Pool as PostgresRepoPool,
    PostgresRepo, PostgresRepoRawQueryClient,
};
