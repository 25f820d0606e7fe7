#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chainwatch::jobs::{JobCompletion, UnsavedJobAuditRecord};
    use chainwatch::{
        CursorKey, CursorRepo, JobRepo, NotificationKind, NotificationRepo, UnsavedJob,
        UnsavedNotification, UserRepo,
    };
    use chrono::Utc;
    use serde_json::json;

    use crate::db;
    use crate::test_runner::{self, unique_name};

    #[tokio::test]
    pub async fn never_moves_cursors_backward() {
        test_runner::run_postgres_test(|repo, _database_url| async move {
            let key = CursorKey::new(&unique_name("chain"), "transfers");

            assert_eq!(repo.get_last_processed_block(&key).await.unwrap(), None);

            repo.set_last_processed_block(&key, 500).await.unwrap();
            repo.set_last_processed_block(&key, 200).await.unwrap();
            assert_eq!(repo.get_last_processed_block(&key).await.unwrap(), Some(500));

            repo.set_last_processed_block(&key, 1_000).await.unwrap();
            assert_eq!(repo.get_last_processed_block(&key).await.unwrap(), Some(1_000));

            repo.reset_cursor(&key, Some(10)).await.unwrap();
            assert_eq!(repo.get_last_processed_block(&key).await.unwrap(), Some(10));

            repo.reset_cursor(&key, None).await.unwrap();
            assert_eq!(repo.get_last_processed_block(&key).await.unwrap(), None);
        })
        .await;
    }

    #[tokio::test]
    pub async fn claims_each_job_once() {
        test_runner::run_postgres_test(|repo, _database_url| async move {
            let job_type = unique_name("claim");
            let job = repo.create_job(&UnsavedJob::new(&job_type, json!({}))).await.unwrap();
            let now = Utc::now();

            let (first_claim, second_claim) =
                tokio::join!(repo.claim_job(job.id, &now), repo.claim_job(job.id, &now));
            let claims = [first_claim.unwrap(), second_claim.unwrap()];

            assert_eq!(claims.iter().filter(|claim| claim.is_some()).count(), 1);
            assert!(repo.get_job(job.id).await.unwrap().unwrap().is_claimed());
        })
        .await;
    }

    #[tokio::test]
    pub async fn records_completions_with_audit_records_and_successors() {
        test_runner::run_postgres_test(|repo, _database_url| async move {
            let job_type = unique_name("complete");
            let data = json!({ "chain": "mainnet" });
            let unsaved_job =
                UnsavedJob::new(&job_type, data.clone()).with_cron_schedule("0 0 * * * *");
            let job = repo.create_job(&unsaved_job).await.unwrap();
            let job = repo.claim_job(job.id, &Utc::now()).await.unwrap().unwrap();
            let finished_at = Utc::now();
            let successor_due = finished_at + chrono::Duration::hours(1);

            let successors = repo
                .record_job_completion(&JobCompletion {
                    job_id: job.id,
                    finished_at,
                    audit_record: UnsavedJobAuditRecord::completed(
                        &job,
                        job.started.unwrap(),
                        finished_at,
                        json!({ "ok": true }),
                    ),
                    successors: vec![UnsavedJob::successor_of(
                        &job,
                        successor_due,
                        Duration::from_secs(3_600),
                    )],
                })
                .await
                .unwrap();

            let finished_job = repo.get_job(job.id).await.unwrap().unwrap();
            assert!(finished_job.is_finished());
            assert_eq!(finished_job.success, Some(true));
            assert_eq!(finished_job.result, Some(json!({ "ok": true })));

            let audit_records = repo.get_audit_records(job.id).await.unwrap();
            assert_eq!(audit_records.len(), 1);
            assert!(audit_records[0].is_completed());

            assert_eq!(successors.len(), 1);
            assert_eq!(successors[0].rescheduled_from_job, Some(job.id));
            assert_eq!(successors[0].cron_schedule.as_deref(), Some("0 0 * * * *"));
            assert!(repo.has_unfinished_job(&job_type, &data).await.unwrap());
            let other_chain = json!({ "chain": "base" });
            assert!(!repo.has_unfinished_job(&job_type, &other_chain).await.unwrap());
        })
        .await;
    }

    #[tokio::test]
    pub async fn removes_only_finished_jobs_past_their_remove_at() {
        test_runner::run_postgres_test(|repo, _database_url| async move {
            let job_type = unique_name("old");
            let two_hours_ago = Utc::now() - chrono::Duration::hours(2);
            let unsaved_job = UnsavedJob::new(&job_type, json!({})).due_at(two_hours_ago);
            let expired = repo.create_job(&unsaved_job).await.unwrap();
            let pending = repo.create_job(&unsaved_job).await.unwrap();

            let expired = repo.claim_job(expired.id, &Utc::now()).await.unwrap().unwrap();
            let finished_at = Utc::now();
            repo.record_job_completion(&JobCompletion {
                job_id: expired.id,
                finished_at,
                audit_record: UnsavedJobAuditRecord::failed(
                    &expired,
                    finished_at,
                    finished_at,
                    "rpc down".to_string(),
                ),
                successors: vec![],
            })
            .await
            .unwrap();

            assert!(repo.remove_old_jobs(&Utc::now()).await.unwrap() >= 1);

            assert!(repo.get_job(expired.id).await.unwrap().is_none());
            assert!(repo.get_job(pending.id).await.unwrap().is_some());
        })
        .await;
    }

    #[tokio::test]
    pub async fn keeps_audit_records_that_never_completed() {
        test_runner::run_postgres_test(|repo, database_url| async move {
            let job_type = unique_name("audited");
            for completed_at in ["NOW() - INTERVAL '8 days'", "NULL", "NOW() - INTERVAL '1 day'"] {
                db::execute(
                    &database_url,
                    &format!(
                        "INSERT INTO chainwatch_job_audit_records
                        (job_id, job_type, data, status, started_at, completed_at, duration_ms)
                        VALUES (0, '{job_type}', '{{}}', 'completed',
                        NOW() - INTERVAL '30 days', {completed_at}, 0)"
                    ),
                );
            }

            let cutoff = Utc::now() - chrono::Duration::days(7);
            assert!(repo.cleanup_audit_log(&cutoff).await.unwrap() >= 1);

            let remaining: Vec<_> = repo
                .get_audit_records(0)
                .await
                .unwrap()
                .into_iter()
                .filter(|record| record.job_type == job_type)
                .collect();
            assert_eq!(remaining.len(), 2);
            assert!(remaining.iter().any(|record| record.completed_at.is_none()));
        })
        .await;
    }

    #[tokio::test]
    pub async fn creates_each_notification_once() {
        test_runner::run_postgres_test(|repo, _database_url| async move {
            let wallet = "0xAbCdEf0000000000000000000000000000000009";
            let user_id = i64::from(rand::random::<u32>());
            repo.upsert_user_wallet(wallet, user_id).await.unwrap();
            assert_eq!(
                repo.find_user_id_by_wallet(&wallet.to_lowercase()).await.unwrap(),
                Some(user_id)
            );

            let notification = UnsavedNotification {
                user_id,
                kind: NotificationKind::TokenCreated.to_string(),
                data: json!({ "symbol": "TKN" }),
                idempotency_key: unique_name("TOKEN_CREATED:mainnet"),
                inserted_at: Utc::now(),
            };

            assert!(repo.create_notification(&notification).await.unwrap());
            assert!(!repo.create_notification(&notification).await.unwrap());
            assert_eq!(repo.get_notifications(user_id).await.unwrap().len(), 1);
        })
        .await;
    }

    #[tokio::test]
    pub async fn finds_stale_claims_and_finishes_jobs_once() {
        test_runner::run_postgres_test(|repo, _database_url| async move {
            let job_type = unique_name("stale");
            let unsaved_job = UnsavedJob::new(&job_type, json!({}));
            let stale = repo.create_job(&unsaved_job).await.unwrap();
            let fresh = repo.create_job(&unsaved_job).await.unwrap();
            let now = Utc::now();
            let an_hour_ago = now - chrono::Duration::hours(1);
            let stale = repo.claim_job(stale.id, &an_hour_ago).await.unwrap().unwrap();
            repo.claim_job(fresh.id, &now).await.unwrap().unwrap();

            let cutoff = now - chrono::Duration::minutes(5);
            let stale_jobs = repo.get_stale_jobs(&cutoff, 1_000).await.unwrap();
            let stale_ids: Vec<_> = stale_jobs
                .iter()
                .filter(|job| job.job_type == job_type)
                .map(|job| job.id)
                .collect();
            assert_eq!(stale_ids, vec![stale.id]);

            let completion = JobCompletion {
                job_id: stale.id,
                finished_at: now,
                audit_record: UnsavedJobAuditRecord::failed(
                    &stale,
                    an_hour_ago,
                    now,
                    "Interrupted before completion".to_string(),
                ),
                successors: vec![unsaved_job.clone()],
            };
            assert_eq!(repo.record_job_completion(&completion).await.unwrap().len(), 1);
            assert!(repo.record_job_completion(&completion).await.unwrap().is_empty());

            assert_eq!(repo.get_audit_records(stale.id).await.unwrap().len(), 1);
            let still_stale = repo.get_stale_jobs(&cutoff, 1_000).await.unwrap();
            assert!(still_stale.iter().all(|job| job.id != stale.id));
        })
        .await;
    }
}
