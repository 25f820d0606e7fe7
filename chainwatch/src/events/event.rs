use std::collections::HashMap;

use derive_more::Display;
use ethers::abi::{LogParam, RawLog, Token};
use ethers::types::{Address, Log, H256, U256};

use crate::contracts::ContractEvent;
use crate::hashes;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum EventParamError {
    #[display("Log is missing {_0}")]
    MissingLogField(&'static str),
    #[display("Log does not match event ABI: {_0}")]
    Undecodable(String),
    #[display("Event has no parameter `{_0}`")]
    MissingParam(String),
    #[display("Event parameter `{_0}` is not of type {_1}")]
    WrongType(String, &'static str),
}

impl std::error::Error for EventParamError {}

/// A decoded on-chain event matched by a filter. Transient: it is handed to the
/// filter's handler and dropped afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub chain_name: String,
    pub contract_address: Address,
    pub block_hash: Option<H256>,
    pub block_number: u64,
    pub transaction_hash: H256,
    pub log_index: u64,
    params: EventParam,
}

impl LogEvent {
    pub fn new(
        log: &Log,
        event: &ContractEvent,
        chain_name: &str,
    ) -> Result<Self, EventParamError> {
        let raw_log = RawLog::from(log.clone());
        let log_params = event
            .value
            .parse_log(raw_log)
            .map_err(|error| EventParamError::Undecodable(error.to_string()))?
            .params;

        Ok(Self {
            chain_name: chain_name.to_string(),
            contract_address: log.address,
            block_hash: log.block_hash,
            block_number: log
                .block_number
                .ok_or(EventParamError::MissingLogField("block_number"))?
                .as_u64(),
            transaction_hash: log
                .transaction_hash
                .ok_or(EventParamError::MissingLogField("transaction_hash"))?,
            log_index: log.log_index.ok_or(EventParamError::MissingLogField("log_index"))?.as_u64(),
            params: EventParam::new(&log_params),
        })
    }

    pub fn get_params(&self) -> &EventParam {
        &self.params
    }

    pub fn get_contract_address_string(&self) -> String {
        hashes::address_to_string(&self.contract_address)
    }

    pub fn get_transaction_hash_string(&self) -> String {
        hashes::h256_to_string(&self.transaction_hash)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventParam {
    value: HashMap<String, Token>,
}

impl EventParam {
    pub(crate) fn new(log_params: &[LogParam]) -> EventParam {
        let value = log_params.iter().fold(HashMap::new(), |mut parameters, log_param| {
            parameters.insert(log_param.name.to_string(), log_param.value.clone());

            parameters
        });

        EventParam { value }
    }

    pub fn get_string(&self, key: &str) -> Result<String, EventParamError> {
        self.get_token(key)?
            .into_string()
            .ok_or_else(|| EventParamError::WrongType(key.to_string(), "string"))
    }

    /// Same as get_u256
    pub fn get_uint(&self, key: &str) -> Result<U256, EventParamError> {
        self.get_token(key)?
            .into_uint()
            .ok_or_else(|| EventParamError::WrongType(key.to_string(), "uint"))
    }

    pub fn get_address(&self, key: &str) -> Result<Address, EventParamError> {
        self.get_token(key)?
            .into_address()
            .ok_or_else(|| EventParamError::WrongType(key.to_string(), "address"))
    }

    pub fn get_address_string(&self, key: &str) -> Result<String, EventParamError> {
        self.get_address(key).map(|address| hashes::address_to_string(&address))
    }

    fn get_token(&self, key: &str) -> Result<Token, EventParamError> {
        self.value.get(key).cloned().ok_or_else(|| EventParamError::MissingParam(key.to_string()))
    }
}
