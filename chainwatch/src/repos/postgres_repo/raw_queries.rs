use tokio_postgres::{Client, NoTls};

use crate::repos::repo::RepoError;

use super::PostgresRepo;

pub type PostgresRepoRawQueryClient = Client;

#[async_trait::async_trait]
pub trait HasRawQueryClient {
    type RawQueryClient: Send + Sync;

    async fn get_raw_query_client(&self) -> Result<Self::RawQueryClient, RepoError>;
}

#[async_trait::async_trait]
pub trait ExecutesWithRawQuery: HasRawQueryClient {
    async fn execute_raw_query(client: &Self::RawQueryClient, query: &str)
        -> Result<(), RepoError>;
}

#[async_trait::async_trait]
impl HasRawQueryClient for PostgresRepo {
    type RawQueryClient = Client;

    async fn get_raw_query_client(&self) -> Result<Self::RawQueryClient, RepoError> {
        let (client, conn) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .map_err(|error| RepoError::NotConnected(error.to_string()))?;

        tokio::spawn(async move {
            if let Err(error) = conn.await {
                tracing::error!(%error, "raw query connection error");
            }
        });

        Ok(client)
    }
}

#[async_trait::async_trait]
impl ExecutesWithRawQuery for PostgresRepo {
    async fn execute_raw_query(
        client: &Self::RawQueryClient,
        query: &str,
    ) -> Result<(), RepoError> {
        client.batch_execute(query).await.map_err(|error| RepoError::Unknown(error.to_string()))
    }
}
