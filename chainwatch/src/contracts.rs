use derive_more::Display;
use ethers::{
    abi::{Event, HumanReadableParser},
    types::H256,
};

pub type ContractEventTopic = H256;

#[derive(Debug, Clone, PartialEq, Display)]
#[display("Invalid event ABI `{abi}`: {reason}")]
pub struct InvalidEventAbi {
    pub abi: String,
    pub reason: String,
}

impl std::error::Error for InvalidEventAbi {}

/// A contract event a filter watches, parsed from its human-readable ABI.
/// For example:
/// `event Transfer(address indexed from, address indexed to, uint256 value)`
#[derive(Debug, Clone)]
pub struct ContractEvent {
    pub abi: String,
    pub value: Event,
}

impl ContractEvent {
    pub fn new(abi: &str) -> Result<Self, InvalidEventAbi> {
        let value = HumanReadableParser::parse_event(abi).map_err(|error| InvalidEventAbi {
            abi: abi.to_string(),
            reason: error.to_string(),
        })?;

        Ok(Self {
            abi: abi.to_string(),
            value,
        })
    }

    /// topic0 of every log emitted for this event
    pub fn topic(&self) -> ContractEventTopic {
        self.value.signature()
    }

    pub fn name(&self) -> &str {
        &self.value.name
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn computes_topic_from_abi() {
        let event = ContractEvent::new(
            "event Transfer(address indexed from, address indexed to, uint256 value)",
        )
        .unwrap();

        assert_eq!(
            event.topic(),
            H256::from_str("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
                .unwrap()
        );
        assert_eq!(event.name(), "Transfer");
    }

    #[test]
    fn rejects_malformed_abi() {
        assert!(ContractEvent::new("event Transfer(address indexed").is_err());
    }
}
