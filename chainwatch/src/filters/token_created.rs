use ethers::types::Address;
use serde_json::json;
use tracing::debug;

use crate::contracts::{ContractEvent, InvalidEventAbi};
use crate::events::LogEvent;
use crate::notifications::{NotificationKind, UnsavedNotification};

use super::{FilterContext, FilterError, LogFilter};

pub const TOKEN_CREATED_EVENT_ABI: &str = concat!(
    "event TokenCreated(address indexed token, address indexed creator, ",
    "string name, string symbol, uint256 initialSupply)"
);

/// Notifies a token's creator once the factory deploys it
#[derive(Debug, Clone)]
pub struct TokenCreatedFilter {
    event: ContractEvent,
    factory_address: Option<Address>,
}

impl TokenCreatedFilter {
    pub const NAME: &'static str = "TokenCreated";

    pub fn new() -> Result<Self, InvalidEventAbi> {
        Ok(Self {
            event: ContractEvent::new(TOKEN_CREATED_EVENT_ABI)?,
            factory_address: None,
        })
    }

    pub fn with_factory_address(mut self, factory_address: Address) -> Self {
        self.factory_address = Some(factory_address);

        self
    }
}

#[async_trait::async_trait]
impl LogFilter for TokenCreatedFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn event(&self) -> &ContractEvent {
        &self.event
    }

    fn contract_address(&self) -> Option<Address> {
        self.factory_address
    }

    async fn process_log(
        &self,
        context: &FilterContext<'_>,
        log_event: &LogEvent,
    ) -> Result<(), FilterError> {
        let params = log_event.get_params();
        let creator = params.get_address_string("creator")?;

        let Some(user_id) = context.repo.find_user_id_by_wallet(&creator).await? else {
            debug!(%creator, "Skipping token created by unknown wallet");
            return Ok(());
        };

        let data = json!({
            "chain": log_event.chain_name,
            "tokenAddress": params.get_address_string("token")?,
            "name": params.get_string("name")?,
            "symbol": params.get_string("symbol")?,
            "creator": creator,
            "initialSupply": params.get_uint("initialSupply")?.to_string(),
            "transactionHash": log_event.get_transaction_hash_string(),
            "blockNumber": log_event.block_number,
        });

        let notification =
            UnsavedNotification::new(user_id, NotificationKind::TokenCreated, log_event, data);
        context.repo.create_notification(&notification).await?;

        Ok(())
    }
}
