mod event;

pub use event::{EventParam, EventParamError, LogEvent};

use ethers::types::Log;
use tracing::warn;

use crate::contracts::ContractEvent;

/// Decodes raw logs returned for a filter's range query.
///
/// Logs the node flagged as `removed` (reorged out) are dropped, and so are logs that
/// do not decode against the event ABI. The result is in canonical chain order,
/// block number then log index ascending.
pub fn get(logs: &[Log], event: &ContractEvent, chain_name: &str) -> Vec<LogEvent> {
    let mut events: Vec<_> = logs
        .iter()
        .filter(|log| !log.removed.unwrap_or(false))
        .filter_map(|log| match LogEvent::new(log, event, chain_name) {
            Ok(log_event) => Some(log_event),
            Err(error) => {
                warn!(
                    chain = chain_name,
                    event = event.name(),
                    transaction_hash = ?log.transaction_hash,
                    "Skipping undecodable log: {error}"
                );
                None
            }
        })
        .collect();

    events.sort_by_key(|e| (e.block_number, e.log_index));

    events
}
