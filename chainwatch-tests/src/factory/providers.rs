use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chainwatch::{Provider, ProviderError};
use ethers::types::{Address, Filter, Log, ValueOrArray, H256, U64};

#[derive(Default)]
struct StubState {
    /// `None` makes `get_block_number` fail
    head: Option<u64>,
    logs: Vec<Log>,
    failing_topics: HashSet<H256>,
    decimals_by_token: HashMap<Address, u8>,
    log_queries: Vec<Filter>,
    decimals_calls: usize,
}

/// In-memory chain node. Answers log queries from the logs it was given,
/// honouring the query's topic0, address and block range.
#[derive(Clone, Default)]
pub struct StubProvider {
    state: Arc<Mutex<StubState>>,
}

impl StubProvider {
    pub fn new(head: u64) -> Self {
        let provider = Self::default();
        provider.set_head(head);

        provider
    }

    pub fn with_logs(self, logs: Vec<Log>) -> Self {
        self.state.lock().unwrap().logs.extend(logs);

        self
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = Some(head);
    }

    pub fn make_head_unavailable(&self) {
        self.state.lock().unwrap().head = None;
    }

    pub fn fail_logs_for(&self, topic: H256) {
        self.state.lock().unwrap().failing_topics.insert(topic);
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        self.state.lock().unwrap().decimals_by_token.insert(token, decimals);
    }

    pub fn get_log_queries(&self) -> Vec<Filter> {
        self.state.lock().unwrap().log_queries.clone()
    }

    /// `(from_block, to_block)` of every log query for `topic`, in call order
    pub fn get_queried_ranges(&self, topic: H256) -> Vec<(u64, u64)> {
        self.get_log_queries()
            .iter()
            .filter(|filter| get_topic0(filter) == Some(topic))
            .map(|filter| {
                (
                    filter.get_from_block().unwrap().as_u64(),
                    filter.get_to_block().unwrap().as_u64(),
                )
            })
            .collect()
    }

    pub fn get_decimals_calls(&self) -> usize {
        self.state.lock().unwrap().decimals_calls
    }
}

#[async_trait::async_trait]
impl Provider for StubProvider {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        match self.state.lock().unwrap().head {
            Some(head) => Ok(U64::from(head)),
            None => Err(ProviderError::CustomError("node unavailable".to_string())),
        }
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.log_queries.push(filter.clone());

        let topic0 = get_topic0(filter);
        if topic0.is_some_and(|topic| state.failing_topics.contains(&topic)) {
            return Err(ProviderError::CustomError("eth_getLogs failed".to_string()));
        }

        let from_block = filter.get_from_block().unwrap_or_default();
        let to_block = filter.get_to_block().unwrap_or(U64::from(u64::MAX));
        let address = match &filter.address {
            Some(ValueOrArray::Value(address)) => Some(*address),
            _ => None,
        };

        Ok(state
            .logs
            .iter()
            .filter(|log| topic0.is_none() || log.topics.first().copied() == topic0)
            .filter(|log| address.is_none() || Some(log.address) == address)
            .filter(|log| {
                let block_number = log.block_number.unwrap_or_default();
                from_block <= block_number && block_number <= to_block
            })
            .cloned()
            .collect())
    }

    async fn get_token_decimals(&self, token: Address) -> Result<u8, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.decimals_calls += 1;

        state
            .decimals_by_token
            .get(&token)
            .copied()
            .ok_or_else(|| ProviderError::CustomError("execution reverted".to_string()))
    }
}

fn get_topic0(filter: &Filter) -> Option<H256> {
    match &filter.topics[0] {
        Some(ValueOrArray::Value(Some(topic))) => Some(*topic),
        _ => None,
    }
}

/// Provider that hands every log query to `$filter_stubber` for inspection
#[macro_export]
macro_rules! provider_with_filter_stubber {
    ($current_block_number:expr, $filter_stubber:expr) => {{
        use chainwatch::{Provider, ProviderError};
        use ethers::types::{Address, Filter, Log, U64};

        struct FilterStubProvider;
        #[async_trait::async_trait]
        impl Provider for FilterStubProvider {
            async fn get_block_number(&self) -> Result<U64, ProviderError> {
                Ok(U64::from($current_block_number))
            }

            async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
                let filter_stubber = $filter_stubber;

                filter_stubber(filter);

                Ok(vec![])
            }

            async fn get_token_decimals(&self, _token: Address) -> Result<u8, ProviderError> {
                Ok(18)
            }
        }

        FilterStubProvider
    }};
}
