mod error;
mod provider;
mod ranges;

pub use error::PollerError;
pub use provider::{get as get_provider, Provider, ProviderError};
pub use ranges::{BlockRange, StartBlock, GENESIS_BLOCK};

use std::sync::Arc;

use ethers::types::Filter as EthersFilter;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::chains::Chain;
use crate::cursors::CursorKey;
use crate::events;
use crate::filters::{FilterContext, LogFilter, ProcessedLogs};
use crate::repos::Repo;

pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Upper bound on blocks scanned per filter per cycle
    pub max_block_range: u64,
    pub start_block: StartBlock,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            start_block: StartBlock::Head,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FilterOutcome {
    Scanned {
        range: BlockRange,
        processed: ProcessedLogs,
    },
    CaughtUp,
    /// The log query failed. The cursor stays, so the range is retried next cycle.
    RpcFailed { range: BlockRange, error: String },
    RepoFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub filter: String,
    pub outcome: FilterOutcome,
}

/// Summary of one poll cycle, stored as the watch-chain job's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub chain: String,
    pub head: u64,
    pub filters: Vec<FilterReport>,
}

impl PollReport {
    pub fn get_outcome(&self, filter_name: &str) -> Option<&FilterOutcome> {
        self.filters.iter().find(|f| f.filter == filter_name).map(|f| &f.outcome)
    }
}

/// Scans one chain for every registered filter's event, a bounded range per cycle.
/// Built once at startup and shared with the watch-chain job.
pub struct Poller<R: Repo> {
    chain: Chain,
    provider: Arc<dyn Provider>,
    filters: Vec<Arc<dyn LogFilter>>,
    repo: Arc<R>,
    config: PollerConfig,
}

impl<R: Repo> Poller<R> {
    pub fn new(chain: Chain, provider: Arc<dyn Provider>, repo: Arc<R>) -> Self {
        Self {
            chain,
            provider,
            filters: vec![],
            repo,
            config: PollerConfig::default(),
        }
    }

    pub fn add_filter(mut self, filter: Arc<dyn LogFilter>) -> Self {
        self.filters.push(filter);

        self
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;

        self
    }

    pub fn get_chain(&self) -> &Chain {
        &self.chain
    }

    pub fn get_filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Runs one cycle. Fails without touching any cursor when the head is unavailable.
    #[tracing::instrument(name = "poll", skip_all, fields(chain = %self.chain.name))]
    pub async fn poll(&self) -> Result<PollReport, PollerError> {
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(PollerError::HeadUnavailable)?
            .as_u64();

        let filters =
            join_all(self.filters.iter().map(|filter| self.poll_filter(filter.as_ref(), head)))
                .await;

        Ok(PollReport {
            chain: self.chain.name.clone(),
            head,
            filters,
        })
    }

    async fn poll_filter(&self, filter: &dyn LogFilter, head: u64) -> FilterReport {
        FilterReport {
            filter: filter.name().to_string(),
            outcome: self.scan(filter, head).await,
        }
    }

    async fn scan(&self, filter: &dyn LogFilter, head: u64) -> FilterOutcome {
        let cursor_key = CursorKey::new(&self.chain.name, filter.name());

        let last_processed_block = match self.repo.get_last_processed_block(&cursor_key).await {
            Ok(last_processed_block) => last_processed_block,
            Err(repo_error) => {
                error!(filter = filter.name(), "Could not read cursor: {repo_error}");
                return FilterOutcome::RepoFailed {
                    error: repo_error.to_string(),
                };
            }
        };

        let Some(range) = BlockRange::compute(
            last_processed_block,
            head,
            self.config.max_block_range,
            self.config.start_block,
        ) else {
            debug!(filter = filter.name(), head, "Caught up");
            return FilterOutcome::CaughtUp;
        };

        let logs = match self.provider.get_logs(&self.get_ethers_filter(filter, &range)).await {
            Ok(logs) => logs,
            Err(provider_error) => {
                warn!(
                    filter = filter.name(),
                    from_block = range.from,
                    to_block = range.to,
                    "Log query failed: {provider_error}"
                );
                return FilterOutcome::RpcFailed {
                    range,
                    error: provider_error.to_string(),
                };
            }
        };

        let log_events = events::get(&logs, filter.event(), &self.chain.name);
        let context = FilterContext::new(&self.chain, self.repo.as_ref(), self.provider.as_ref());
        let processed = filter.process_logs(&context, &log_events).await;

        if let Err(repo_error) = self.repo.set_last_processed_block(&cursor_key, range.to).await {
            error!(
                filter = filter.name(),
                from_block = range.from,
                to_block = range.to,
                "Could not advance cursor: {repo_error}"
            );
            return FilterOutcome::RepoFailed {
                error: repo_error.to_string(),
            };
        }

        info!(
            filter = filter.name(),
            from_block = range.from,
            to_block = range.to,
            handled = processed.handled,
            failed = processed.failed,
            "Scanned"
        );

        FilterOutcome::Scanned { range, processed }
    }

    fn get_ethers_filter(&self, filter: &dyn LogFilter, range: &BlockRange) -> EthersFilter {
        let ethers_filter = EthersFilter::new()
            .topic0(filter.event().topic())
            .from_block(range.from)
            .to_block(range.to);

        match filter.contract_address() {
            Some(address) => ethers_filter.address(address),
            None => ethers_filter,
        }
    }
}
