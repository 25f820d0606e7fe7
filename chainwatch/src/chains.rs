/// Represents an EVM chain network that gets watched
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    /// Name used to key cursors, for example `mainnet` or `base-sepolia`
    pub name: String,
    pub json_rpc_url: String,
}

impl Chain {
    /// Builds the chain network
    ///
    ///
    /// # Example
    /// ```
    /// use chainwatch::Chain;
    ///
    /// Chain::new("polygon", "https://polygon-mainnet.g.alchemy.com/v2/...");
    /// ```
    pub fn new(name: &str, json_rpc_url: &str) -> Self {
        Self {
            name: name.to_string(),
            json_rpc_url: json_rpc_url.to_string(),
        }
    }
}
