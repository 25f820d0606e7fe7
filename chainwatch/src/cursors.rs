use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable};
use serde::Deserialize;

use crate::diesel::schema::chainwatch_filter_cursors;

/// Identifies one filter's progress on one chain.
/// Each `(chain_name, filter_name)` pair advances independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorKey {
    pub chain_name: String,
    pub filter_name: String,
}

impl CursorKey {
    pub fn new(chain_name: &str, filter_name: &str) -> Self {
        Self {
            chain_name: chain_name.to_string(),
            filter_name: filter_name.to_string(),
        }
    }
}

impl std::fmt::Display for CursorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chain_name, self.filter_name)
    }
}

/// N/B: The order has to match ./diesel.rs to stop diesel from mixing up fields
#[derive(Debug, Clone, PartialEq, Deserialize, Queryable, Insertable)]
#[diesel(table_name = chainwatch_filter_cursors)]
pub struct FilterCursor {
    pub chain_name: String,
    pub filter_name: String,
    pub(crate) last_processed_block: i64,
    pub updated_at: DateTime<Utc>,
}

impl FilterCursor {
    pub fn new(key: &CursorKey, last_processed_block: u64) -> Self {
        Self {
            chain_name: key.chain_name.clone(),
            filter_name: key.filter_name.clone(),
            last_processed_block: last_processed_block as i64,
            updated_at: Utc::now(),
        }
    }

    pub fn get_key(&self) -> CursorKey {
        CursorKey::new(&self.chain_name, &self.filter_name)
    }

    /// Inclusive
    pub fn get_last_processed_block(&self) -> u64 {
        self.last_processed_block as u64
    }
}
