use chainwatch::{PostgresRepo, Repo};
use chainwatch_tests::db;

/// Prepares the test database so `cargo test` can run the Postgres suites
#[tokio::main]
async fn main() {
    let Some(database_url) = db::database_url() else {
        println!("TEST_DATABASE_URL is not set, nothing to set up");
        return;
    };

    db::setup(&database_url);

    let repo = PostgresRepo::new(&database_url).await.unwrap();
    repo.migrate().await.unwrap();
}
