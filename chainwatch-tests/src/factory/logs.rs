use std::str::FromStr;

use chainwatch::filters::{TOKEN_CREATED_EVENT_ABI, TOKEN_TRANSFER_EVENT_ABI};
use chainwatch::ContractEvent;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, Log, H256, U256};

pub const TOKEN_FACTORY_ADDRESS: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
pub const TOKEN_ADDRESS: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";
pub const CREATOR_WALLET: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const SENDER_WALLET: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
pub const RECIPIENT_WALLET: &str = "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc";

pub fn address(address: &str) -> Address {
    Address::from_str(address).unwrap()
}

pub fn token_created_topic() -> H256 {
    ContractEvent::new(TOKEN_CREATED_EVENT_ABI).unwrap().topic()
}

pub fn token_transfer_topic() -> H256 {
    ContractEvent::new(TOKEN_TRANSFER_EVENT_ABI).unwrap().topic()
}

pub fn token_created_log(
    token: &str,
    creator: &str,
    name: &str,
    symbol: &str,
    block_number: u64,
    log_index: u64,
) -> Log {
    Log {
        address: address(TOKEN_FACTORY_ADDRESS),
        topics: vec![
            token_created_topic(),
            address_topic(token),
            address_topic(creator),
        ],
        data: Bytes::from(ethers::abi::encode(&[
            Token::String(name.to_string()),
            Token::String(symbol.to_string()),
            Token::Uint(U256::exp10(24)),
        ])),
        ..log_at(block_number, log_index)
    }
}

pub fn token_transfer_log(
    token: &str,
    from: &str,
    to: &str,
    amount: U256,
    block_number: u64,
    log_index: u64,
) -> Log {
    Log {
        address: address(token),
        topics: vec![token_transfer_topic(), address_topic(from), address_topic(to)],
        data: Bytes::from(ethers::abi::encode(&[Token::Uint(amount)])),
        ..log_at(block_number, log_index)
    }
}

/// A log whose data does not decode against either shipped event
pub fn malformed_transfer_log(block_number: u64, log_index: u64) -> Log {
    Log {
        address: address(TOKEN_ADDRESS),
        topics: vec![token_transfer_topic()],
        data: Bytes::from(vec![1, 2, 3]),
        ..log_at(block_number, log_index)
    }
}

pub fn log_at(block_number: u64, log_index: u64) -> Log {
    Log {
        block_hash: Some(H256::from_low_u64_be(block_number)),
        block_number: Some(block_number.into()),
        transaction_hash: Some(H256::from_low_u64_be(block_number * 10_000 + log_index)),
        transaction_index: Some(0.into()),
        log_index: Some(log_index.into()),
        removed: Some(false),
        ..Default::default()
    }
}

fn address_topic(address_: &str) -> H256 {
    H256::from(address(address_))
}
