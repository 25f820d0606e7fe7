use crate::repos::repo::{RepoError, SQLikeMigrations};

use super::raw_queries::{ExecutesWithRawQuery, PostgresRepoRawQueryClient};
use super::PostgresRepo;

pub async fn run(client: &PostgresRepoRawQueryClient) -> Result<(), RepoError> {
    for migration in SQLikeMigrations::get_all() {
        PostgresRepo::execute_raw_query(client, migration).await?;
    }

    Ok(())
}
