use std::future::Future;
use std::sync::Arc;

use chainwatch::{MemoryRepo, PostgresRepo, Repo};
use rand::Rng;

use crate::db;

pub fn new_memory_repo() -> Arc<MemoryRepo> {
    Arc::new(MemoryRepo::new())
}

/// Runs `test_fn` against a migrated Postgres repo, or skips it when
/// TEST_DATABASE_URL is not set. Tests share the database, so they should key
/// their rows with `unique_name`.
pub async fn run_postgres_test<TestFn, Fut>(test_fn: TestFn)
where
    TestFn: FnOnce(PostgresRepo, String) -> Fut,
    Fut: Future<Output = ()>,
{
    let Some(database_url) = db::database_url() else {
        return;
    };

    db::setup(&database_url);

    let repo = PostgresRepo::new(&database_url).await.unwrap();
    repo.migrate().await.unwrap();

    test_fn(repo, database_url).await;
}

pub fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", rand::thread_rng().gen::<u32>())
}
