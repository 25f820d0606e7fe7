use std::collections::HashMap;

use ethers::types::{Address, U256};
use ethers::utils::format_units;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::contracts::{ContractEvent, InvalidEventAbi};
use crate::events::LogEvent;
use crate::notifications::{NotificationKind, UnsavedNotification};

use super::{FilterContext, FilterError, LogFilter};

pub const TOKEN_TRANSFER_EVENT_ABI: &str =
    "event TokenTransfer(address indexed from, address indexed to, uint256 amount)";

/// Notifies the sender of a transfer on any tracked token.
/// Token decimals are fetched once per token and cached for the filter's lifetime.
#[derive(Debug)]
pub struct TokenTransferFilter {
    event: ContractEvent,
    decimals_by_token: RwLock<HashMap<Address, u8>>,
}

impl TokenTransferFilter {
    pub const NAME: &'static str = "TokenTransfer";

    pub fn new() -> Result<Self, InvalidEventAbi> {
        Ok(Self {
            event: ContractEvent::new(TOKEN_TRANSFER_EVENT_ABI)?,
            decimals_by_token: RwLock::new(HashMap::new()),
        })
    }

    async fn get_decimals(
        &self,
        context: &FilterContext<'_>,
        token: Address,
    ) -> Result<u8, FilterError> {
        if let Some(decimals) = self.decimals_by_token.read().await.get(&token) {
            return Ok(*decimals);
        }

        let decimals = context.provider.get_token_decimals(token).await?;
        self.decimals_by_token.write().await.insert(token, decimals);

        Ok(decimals)
    }
}

#[async_trait::async_trait]
impl LogFilter for TokenTransferFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn event(&self) -> &ContractEvent {
        &self.event
    }

    async fn process_log(
        &self,
        context: &FilterContext<'_>,
        log_event: &LogEvent,
    ) -> Result<(), FilterError> {
        let params = log_event.get_params();
        let from = params.get_address_string("from")?;

        let Some(user_id) = context.repo.find_user_id_by_wallet(&from).await? else {
            debug!(%from, "Skipping transfer from unknown wallet");
            return Ok(());
        };

        let amount = params.get_uint("amount")?;
        let decimals = self.get_decimals(context, log_event.contract_address).await?;

        let data = json!({
            "chain": log_event.chain_name,
            "tokenAddress": log_event.get_contract_address_string(),
            "from": from,
            "to": params.get_address_string("to")?,
            "amount": format_token_amount(amount, decimals)?,
            "rawAmount": amount.to_string(),
            "decimals": decimals,
            "transactionHash": log_event.get_transaction_hash_string(),
            "blockNumber": log_event.block_number,
        });

        let notification =
            UnsavedNotification::new(user_id, NotificationKind::TokenTransfer, log_event, data);
        context.repo.create_notification(&notification).await?;

        Ok(())
    }
}

/// Human-readable decimal amount without trailing zeros, e.g. `1.5` for
/// 1_500_000 base units of a 6-decimals token
pub fn format_token_amount(amount: U256, decimals: u8) -> Result<String, FilterError> {
    let formatted = format_units(amount, decimals as u32)
        .map_err(|error| FilterError::Other(error.to_string()))?;

    if formatted.contains('.') {
        Ok(formatted.trim_end_matches('0').trim_end_matches('.').to_string())
    } else {
        Ok(formatted)
    }
}
