use std::sync::{Arc, Mutex};

use chainwatch::filters::{TOKEN_CREATED_EVENT_ABI, TOKEN_TRANSFER_EVENT_ABI};
use chainwatch::{ContractEvent, FilterContext, FilterError, LogEvent, LogFilter};

/// Remembers the `(block_number, log_index)` of every log it handles
pub struct RecordingFilter {
    name: String,
    event: ContractEvent,
    fails: bool,
    handled: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl RecordingFilter {
    pub fn new(name: &str, abi: &str) -> Self {
        Self {
            name: name.to_string(),
            event: ContractEvent::new(abi).unwrap(),
            fails: false,
            handled: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn token_created(name: &str) -> Self {
        Self::new(name, TOKEN_CREATED_EVENT_ABI)
    }

    pub fn token_transfer(name: &str) -> Self {
        Self::new(name, TOKEN_TRANSFER_EVENT_ABI)
    }

    /// Records every log, then fails handling it
    pub fn failing(mut self) -> Self {
        self.fails = true;

        self
    }

    pub fn get_handled(&self) -> Vec<(u64, u64)> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LogFilter for RecordingFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn event(&self) -> &ContractEvent {
        &self.event
    }

    async fn process_log(
        &self,
        _context: &FilterContext<'_>,
        log_event: &LogEvent,
    ) -> Result<(), FilterError> {
        self.handled.lock().unwrap().push((log_event.block_number, log_event.log_index));

        if self.fails {
            Err(FilterError::Other("handler blew up".to_string()))
        } else {
            Ok(())
        }
    }
}
