mod token_created;
mod token_transfer;

pub use token_created::{TokenCreatedFilter, TOKEN_CREATED_EVENT_ABI};
pub use token_transfer::{format_token_amount, TokenTransferFilter, TOKEN_TRANSFER_EVENT_ABI};

use derive_more::Display;
use ethers::types::Address;
use serde::Serialize;
use tracing::warn;

use crate::chains::Chain;
use crate::contracts::ContractEvent;
use crate::events::{EventParamError, LogEvent};
use crate::poller::{Provider, ProviderError};
use crate::repos::{FilterRepo, RepoError};

#[derive(Debug, Display)]
pub enum FilterError {
    #[display("{_0}")]
    Param(EventParamError),
    #[display("{_0}")]
    Repo(RepoError),
    #[display("Provider error: {_0}")]
    Provider(ProviderError),
    #[display("{_0}")]
    Other(String),
}

impl std::error::Error for FilterError {}

impl From<EventParamError> for FilterError {
    fn from(value: EventParamError) -> Self {
        FilterError::Param(value)
    }
}

impl From<RepoError> for FilterError {
    fn from(value: RepoError) -> Self {
        FilterError::Repo(value)
    }
}

impl From<ProviderError> for FilterError {
    fn from(value: ProviderError) -> Self {
        FilterError::Provider(value)
    }
}

/// Everything a filter can reach while handling a batch of logs
pub struct FilterContext<'a> {
    pub chain: &'a Chain,
    pub repo: &'a dyn FilterRepo,
    pub provider: &'a dyn Provider,
}

impl<'a> FilterContext<'a> {
    pub fn new(chain: &'a Chain, repo: &'a dyn FilterRepo, provider: &'a dyn Provider) -> Self {
        Self {
            chain,
            repo,
            provider,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessedLogs {
    pub handled: u64,
    pub failed: u64,
}

/// A named subscription to one contract event.
///
/// Handling must tolerate seeing the same log twice: a crash between handling a
/// range and advancing the cursor re-scans that range.
#[async_trait::async_trait]
pub trait LogFilter: Send + Sync {
    /// Unique per chain; keys the filter's cursor
    fn name(&self) -> &str;

    fn event(&self) -> &ContractEvent;

    /// Restricts the log query to one emitter
    fn contract_address(&self) -> Option<Address> {
        None
    }

    async fn process_log(
        &self,
        context: &FilterContext<'_>,
        log_event: &LogEvent,
    ) -> Result<(), FilterError>;

    /// Handles logs in order. A failing log is logged and counted but does not stop the batch.
    async fn process_logs(
        &self,
        context: &FilterContext<'_>,
        log_events: &[LogEvent],
    ) -> ProcessedLogs {
        let mut processed = ProcessedLogs::default();

        for log_event in log_events {
            match self.process_log(context, log_event).await {
                Ok(()) => processed.handled += 1,
                Err(error) => {
                    warn!(
                        chain = %context.chain.name,
                        filter = self.name(),
                        block_number = log_event.block_number,
                        log_index = log_event.log_index,
                        transaction_hash = %log_event.get_transaction_hash_string(),
                        "Failed handling log: {error}"
                    );
                    processed.failed += 1;
                }
            }
        }

        processed
    }
}
