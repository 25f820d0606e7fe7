#[cfg(test)]
mod tests {
    use chainwatch::{NotificationKind, NotificationRepo, UnsavedNotification, UserRepo};
    use chrono::Utc;
    use serde_json::json;

    use crate::test_runner;

    fn notification(user_id: i64, idempotency_key: &str) -> UnsavedNotification {
        UnsavedNotification {
            user_id,
            kind: NotificationKind::TokenTransfer.to_string(),
            data: json!({ "amount": "1.5" }),
            idempotency_key: idempotency_key.to_string(),
            inserted_at: Utc::now(),
        }
    }

    #[tokio::test]
    pub async fn creates_each_notification_once_per_idempotency_key() {
        let repo = test_runner::new_memory_repo();

        let first_log = notification(7, "TOKEN_TRANSFER:mainnet:0xab:0");
        let second_log = notification(7, "TOKEN_TRANSFER:mainnet:0xab:1");

        assert!(repo.create_notification(&first_log).await.unwrap());
        assert!(!repo.create_notification(&first_log).await.unwrap());
        assert!(repo.create_notification(&second_log).await.unwrap());

        let notifications = repo.get_notifications(7).await.unwrap();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].kind, "TOKEN_TRANSFER");
        assert!(repo.get_notifications(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    pub async fn looks_up_wallets_ignoring_case() {
        let repo = test_runner::new_memory_repo();
        repo.add_user_wallet("0xAbCdEf0000000000000000000000000000000001", 3).await;

        let user_id = repo
            .find_user_id_by_wallet("0xabcdef0000000000000000000000000000000001")
            .await
            .unwrap();
        assert_eq!(user_id, Some(3));

        let user_id = repo
            .find_user_id_by_wallet("0xABCDEF0000000000000000000000000000000001")
            .await
            .unwrap();
        assert_eq!(user_id, Some(3));

        let unknown_wallet = "0x0000000000000000000000000000000000000002";
        assert_eq!(repo.find_user_id_by_wallet(unknown_wallet).await.unwrap(), None);
    }
}
