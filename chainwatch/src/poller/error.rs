use derive_more::Display;

use super::ProviderError;

#[derive(Debug, Display)]
pub enum PollerError {
    #[display("Chain head unavailable: {_0}")]
    HeadUnavailable(ProviderError),
}

impl std::error::Error for PollerError {}
