use chrono::{DateTime, Utc};
use derive_more::Display;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::diesel::schema::chainwatch_notifications;
use crate::events::LogEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum NotificationKind {
    #[display("TOKEN_CREATED")]
    #[serde(rename = "TOKEN_CREATED")]
    TokenCreated,
    #[display("TOKEN_TRANSFER")]
    #[serde(rename = "TOKEN_TRANSFER")]
    TokenTransfer,
}

/// A notification a filter wants delivered to a user.
///
/// `idempotency_key` is unique in the store, so handling the same log twice
/// (crash recovery re-scans a range) never creates a second notification.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = chainwatch_notifications)]
pub struct UnsavedNotification {
    pub user_id: i64,
    pub kind: String,
    pub data: serde_json::Value,
    pub idempotency_key: String,
    pub inserted_at: DateTime<Utc>,
}

impl UnsavedNotification {
    pub fn new(
        user_id: i64,
        kind: NotificationKind,
        log_event: &LogEvent,
        data: serde_json::Value,
    ) -> Self {
        Self {
            user_id,
            kind: kind.to_string(),
            data,
            idempotency_key: Self::idempotency_key(kind, log_event),
            inserted_at: Utc::now(),
        }
    }

    pub fn idempotency_key(kind: NotificationKind, log_event: &LogEvent) -> String {
        format!(
            "{kind}:{}:{}:{}",
            log_event.chain_name,
            log_event.get_transaction_hash_string(),
            log_event.log_index
        )
    }
}

/// N/B: The order has to match ./diesel.rs to stop diesel from mixing up fields
#[derive(Debug, Clone, PartialEq, Deserialize, Queryable)]
#[diesel(table_name = chainwatch_notifications)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub data: serde_json::Value,
    pub idempotency_key: String,
    pub inserted_at: DateTime<Utc>,
}
