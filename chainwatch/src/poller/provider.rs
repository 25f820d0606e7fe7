use std::sync::Arc;

use ethers::abi::{ParamType, Token};
use ethers::prelude::Middleware;
use ethers::providers::{Http, Provider as EthersProvider, ProviderError as EthersProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Filter as EthersFilter, Log, TransactionRequest, U256, U64};

pub type ProviderError = EthersProviderError;

/// `decimals()`
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// JSON-RPC surface the poller and filters need. Every error is treated as
/// retryable on the next cycle.
#[async_trait::async_trait]
pub trait Provider: Sync + Send {
    async fn get_block_number(&self) -> Result<U64, ProviderError>;
    async fn get_logs(&self, filter: &EthersFilter) -> Result<Vec<Log>, ProviderError>;
    async fn get_token_decimals(&self, token: Address) -> Result<u8, ProviderError>;
}

#[async_trait::async_trait]
impl Provider for EthersProvider<Http> {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        Middleware::get_block_number(self).await
    }

    async fn get_logs(&self, filter: &EthersFilter) -> Result<Vec<Log>, ProviderError> {
        Middleware::get_logs(self, filter).await
    }

    async fn get_token_decimals(&self, token: Address) -> Result<u8, ProviderError> {
        let call: TypedTransaction = TransactionRequest::new()
            .to(token)
            .data(Bytes::from(DECIMALS_SELECTOR.to_vec()))
            .into();

        let output = Middleware::call(self, &call, None).await?;

        decode_decimals(&output)
    }
}

fn decode_decimals(output: &[u8]) -> Result<u8, ProviderError> {
    let tokens = ethers::abi::decode(&[ParamType::Uint(8)], output)
        .map_err(|error| ProviderError::CustomError(error.to_string()))?;

    match tokens.first() {
        Some(Token::Uint(decimals)) if *decimals <= U256::from(u8::MAX) => {
            Ok(decimals.low_u32() as u8)
        }
        _ => Err(ProviderError::CustomError(format!(
            "Unexpected decimals() output: 0x{}",
            ethers::utils::hex::encode(output)
        ))),
    }
}

pub fn get(json_rpc_url: &str) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider = EthersProvider::<Http>::try_from(json_rpc_url)
        .map_err(|error| ProviderError::CustomError(format!("{json_rpc_url}: {error}")))?;

    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_decimals_output() {
        let output = ethers::abi::encode(&[Token::Uint(U256::from(18))]);

        assert_eq!(decode_decimals(&output).unwrap(), 18);
    }

    #[test]
    fn rejects_empty_decimals_output() {
        assert!(decode_decimals(&[]).is_err());
    }
}
