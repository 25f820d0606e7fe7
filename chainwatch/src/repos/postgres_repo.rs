mod migrations;
mod raw_queries;

use chrono::{DateTime, Utc};
use diesel::sql_types::{BigInt, VarChar};
use diesel::{upsert::excluded, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{
    scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl,
};

use crate::cursors::CursorKey;
use crate::jobs::{Job, JobAuditRecord, JobCompletion, JobId, UnsavedJob};
use crate::notifications::{Notification, UnsavedNotification};

use super::repo::{CursorRepo, JobRepo, NotificationRepo, Repo, RepoError, UserRepo};

pub use raw_queries::{ExecutesWithRawQuery, HasRawQueryClient, PostgresRepoRawQueryClient};

pub type Conn<'a> = bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;
pub type Pool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

const MAX_POOL_SIZE: u32 = 10;

#[derive(Clone)]
pub struct PostgresRepo {
    url: String,
    pool: Pool,
}

impl std::fmt::Debug for PostgresRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRepo").finish_non_exhaustive()
    }
}

impl From<diesel::result::Error> for RepoError {
    fn from(error: diesel::result::Error) -> Self {
        RepoError::Unknown(error.to_string())
    }
}

impl PostgresRepo {
    pub async fn new(url: &str) -> Result<Self, RepoError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
        let pool = bb8::Pool::builder()
            .max_size(MAX_POOL_SIZE)
            .build(manager)
            .await
            .map_err(|error| RepoError::NotConnected(error.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            pool,
        })
    }

    pub fn get_pool(&self) -> Pool {
        self.pool.clone()
    }

    pub async fn get_conn(&self) -> Result<Conn<'_>, RepoError> {
        self.pool.get().await.map_err(|error| RepoError::NotConnected(error.to_string()))
    }

    /// Writes the wallet lookup the filters read. The API layer owns these rows in production.
    pub async fn upsert_user_wallet(&self, wallet: &str, owner_id: i64) -> Result<(), RepoError> {
        use crate::diesel::schema::chainwatch_user_wallets::dsl::*;

        let mut conn = self.get_conn().await?;

        diesel::insert_into(chainwatch_user_wallets)
            .values((address.eq(wallet.to_lowercase()), user_id.eq(owner_id)))
            .on_conflict(address)
            .do_update()
            .set(user_id.eq(excluded(user_id)))
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl CursorRepo for PostgresRepo {
    async fn get_last_processed_block(&self, key: &CursorKey) -> Result<Option<u64>, RepoError> {
        use crate::diesel::schema::chainwatch_filter_cursors::dsl::*;

        let mut conn = self.get_conn().await?;

        let block = chainwatch_filter_cursors
            .filter(chain_name.eq(&key.chain_name))
            .filter(filter_name.eq(&key.filter_name))
            .select(last_processed_block)
            .first::<i64>(&mut conn)
            .await
            .optional()?;

        Ok(block.map(|b| b as u64))
    }

    async fn set_last_processed_block(
        &self,
        key: &CursorKey,
        block: u64,
    ) -> Result<(), RepoError> {
        let mut conn = self.get_conn().await?;

        diesel::sql_query(
            "INSERT INTO chainwatch_filter_cursors
                (chain_name, filter_name, last_processed_block, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (chain_name, filter_name) DO UPDATE SET
                last_processed_block = GREATEST(
                    chainwatch_filter_cursors.last_processed_block,
                    EXCLUDED.last_processed_block
                ),
                updated_at = NOW()",
        )
        .bind::<VarChar, _>(key.chain_name.as_str())
        .bind::<VarChar, _>(key.filter_name.as_str())
        .bind::<BigInt, _>(block as i64)
        .execute(&mut conn)
        .await?;

        Ok(())
    }

    async fn reset_cursor(&self, key: &CursorKey, block: Option<u64>) -> Result<(), RepoError> {
        use crate::diesel::schema::chainwatch_filter_cursors::dsl::*;

        let mut conn = self.get_conn().await?;

        match block {
            Some(block) => {
                diesel::insert_into(chainwatch_filter_cursors)
                    .values(&crate::cursors::FilterCursor::new(key, block))
                    .on_conflict((chain_name, filter_name))
                    .do_update()
                    .set((
                        last_processed_block.eq(excluded(last_processed_block)),
                        updated_at.eq(excluded(updated_at)),
                    ))
                    .execute(&mut conn)
                    .await?;
            }
            None => {
                diesel::delete(
                    chainwatch_filter_cursors
                        .filter(chain_name.eq(&key.chain_name))
                        .filter(filter_name.eq(&key.filter_name)),
                )
                .execute(&mut conn)
                .await?;
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl JobRepo for PostgresRepo {
    async fn create_job(&self, job: &UnsavedJob) -> Result<Job, RepoError> {
        use crate::diesel::schema::chainwatch_jobs::dsl::*;

        let mut conn = self.get_conn().await?;

        let job = diesel::insert_into(chainwatch_jobs)
            .values(job)
            .get_result::<Job>(&mut conn)
            .await?;

        Ok(job)
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<Job>, RepoError> {
        use crate::diesel::schema::chainwatch_jobs::dsl::*;

        let mut conn = self.get_conn().await?;

        let job = chainwatch_jobs
            .filter(id.eq(job_id))
            .first::<Job>(&mut conn)
            .await
            .optional()?;

        Ok(job)
    }

    async fn get_due_jobs(&self, now: &DateTime<Utc>, limit: i64) -> Result<Vec<Job>, RepoError> {
        use crate::diesel::schema::chainwatch_jobs::dsl::*;

        let mut conn = self.get_conn().await?;

        let jobs = chainwatch_jobs
            .filter(due.le(*now))
            .filter(started.is_null())
            .order((due.asc(), id.asc()))
            .limit(limit)
            .load::<Job>(&mut conn)
            .await?;

        Ok(jobs)
    }

    async fn claim_job(
        &self,
        job_id: JobId,
        now: &DateTime<Utc>,
    ) -> Result<Option<Job>, RepoError> {
        use crate::diesel::schema::chainwatch_jobs::dsl::*;

        let mut conn = self.get_conn().await?;

        let job = diesel::update(chainwatch_jobs.filter(id.eq(job_id)).filter(started.is_null()))
            .set(started.eq(Some(*now)))
            .get_result::<Job>(&mut conn)
            .await
            .optional()?;

        Ok(job)
    }

    async fn get_stale_jobs(
        &self,
        claimed_before: &DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Job>, RepoError> {
        use crate::diesel::schema::chainwatch_jobs::dsl::*;

        let mut conn = self.get_conn().await?;

        let jobs = chainwatch_jobs
            .filter(started.lt(*claimed_before))
            .filter(finished.is_null())
            .order((started.asc(), id.asc()))
            .limit(limit)
            .load::<Job>(&mut conn)
            .await?;

        Ok(jobs)
    }

    async fn record_job_completion(
        &self,
        completion: &JobCompletion,
    ) -> Result<Vec<Job>, RepoError> {
        use crate::diesel::schema::chainwatch_job_audit_records::dsl::chainwatch_job_audit_records;
        use crate::diesel::schema::chainwatch_jobs::dsl::*;

        let mut conn = self.get_conn().await?;

        let successors = conn
            .transaction::<Vec<Job>, diesel::result::Error, _>(|conn| {
                async move {
                    let finished_count = diesel::update(
                        chainwatch_jobs.filter(id.eq(completion.job_id)).filter(finished.is_null()),
                    )
                    .set((
                        finished.eq(Some(completion.finished_at)),
                        success.eq(Some(completion.is_success())),
                        result.eq(completion.audit_record.result.clone()),
                        error.eq(completion.audit_record.error.clone()),
                    ))
                    .execute(conn)
                    .await?;

                    if finished_count == 0 {
                        return Ok(vec![]);
                    }

                    diesel::insert_into(chainwatch_job_audit_records)
                        .values(&completion.audit_record)
                        .execute(conn)
                        .await?;

                    if completion.successors.is_empty() {
                        return Ok(vec![]);
                    }

                    diesel::insert_into(chainwatch_jobs)
                        .values(&completion.successors)
                        .get_results::<Job>(conn)
                        .await
                }
                .scope_boxed()
            })
            .await?;

        Ok(successors)
    }

    async fn has_unfinished_job(
        &self,
        type_: &str,
        job_data: &serde_json::Value,
    ) -> Result<bool, RepoError> {
        use crate::diesel::schema::chainwatch_jobs::dsl::*;

        let mut conn = self.get_conn().await?;

        // JSON columns have no equality operator
        let unfinished_data = chainwatch_jobs
            .filter(job_type.eq(type_))
            .filter(finished.is_null())
            .select(data)
            .load::<serde_json::Value>(&mut conn)
            .await?;

        Ok(unfinished_data.iter().any(|d| d == job_data))
    }

    async fn remove_old_jobs(&self, now: &DateTime<Utc>) -> Result<u64, RepoError> {
        use crate::diesel::schema::chainwatch_jobs::dsl::*;

        let mut conn = self.get_conn().await?;

        let removed = diesel::delete(
            chainwatch_jobs.filter(finished.is_not_null()).filter(remove_at.lt(*now)),
        )
        .execute(&mut conn)
        .await?;

        Ok(removed as u64)
    }

    async fn get_audit_records(
        &self,
        audited_job_id: JobId,
    ) -> Result<Vec<JobAuditRecord>, RepoError> {
        use crate::diesel::schema::chainwatch_job_audit_records::dsl::*;

        let mut conn = self.get_conn().await?;

        let records = chainwatch_job_audit_records
            .filter(job_id.eq(audited_job_id))
            .order(id.asc())
            .load::<JobAuditRecord>(&mut conn)
            .await?;

        Ok(records)
    }

    async fn cleanup_audit_log(
        &self,
        completed_before: &DateTime<Utc>,
    ) -> Result<u64, RepoError> {
        use crate::diesel::schema::chainwatch_job_audit_records::dsl::*;

        let mut conn = self.get_conn().await?;

        let removed = diesel::delete(
            chainwatch_job_audit_records
                .filter(completed_at.is_not_null())
                .filter(completed_at.lt(Some(*completed_before))),
        )
        .execute(&mut conn)
        .await?;

        Ok(removed as u64)
    }
}

#[async_trait::async_trait]
impl NotificationRepo for PostgresRepo {
    async fn create_notification(
        &self,
        notification: &UnsavedNotification,
    ) -> Result<bool, RepoError> {
        use crate::diesel::schema::chainwatch_notifications::dsl::*;

        let mut conn = self.get_conn().await?;

        let inserted = diesel::insert_into(chainwatch_notifications)
            .values(notification)
            .on_conflict(idempotency_key)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(inserted > 0)
    }

    async fn get_notifications(&self, recipient_id: i64) -> Result<Vec<Notification>, RepoError> {
        use crate::diesel::schema::chainwatch_notifications::dsl::*;

        let mut conn = self.get_conn().await?;

        let notifications = chainwatch_notifications
            .filter(user_id.eq(recipient_id))
            .order(id.asc())
            .load::<Notification>(&mut conn)
            .await?;

        Ok(notifications)
    }
}

#[async_trait::async_trait]
impl UserRepo for PostgresRepo {
    async fn find_user_id_by_wallet(&self, wallet: &str) -> Result<Option<i64>, RepoError> {
        use crate::diesel::schema::chainwatch_user_wallets::dsl::*;

        let mut conn = self.get_conn().await?;

        let owner_id = chainwatch_user_wallets
            .filter(address.eq(wallet.to_lowercase()))
            .select(user_id)
            .first::<i64>(&mut conn)
            .await
            .optional()?;

        Ok(owner_id)
    }
}

#[async_trait::async_trait]
impl Repo for PostgresRepo {
    async fn migrate(&self) -> Result<(), RepoError> {
        let client = self.get_raw_query_client().await?;

        migrations::run(&client).await
    }
}
