use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Native currency metadata as wallets expect it in `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything needed to talk to, and describe, one EVM network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub id: u64,
    pub name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub explorer_url: String,
    pub multicall3: Option<Address>,
    pub testnet: bool,
}

impl ChainSpec {
    /// A network we have no metadata for: only its id and an RPC endpoint.
    pub fn custom(id: u64, rpc_url: impl Into<String>) -> Self {
        Self {
            id,
            name: "Custom Chain".into(),
            native_currency: NativeCurrency {
                name: "Ether".into(),
                symbol: "ETH".into(),
                decimals: 18,
            },
            rpc_urls: vec![rpc_url.into()],
            explorer_url: String::new(),
            multicall3: None,
            testnet: false,
        }
    }

    /// Chain id as the `0x`-prefixed hex quantity wallets use.
    pub fn chain_id_hex(&self) -> String {
        format!("0x{:x}", self.id)
    }

    /// Primary RPC endpoint.
    pub fn default_rpc_url(&self) -> &str {
        self.rpc_urls.first().map(String::as_str).unwrap_or_default()
    }

    pub fn address_url(&self, address: &Address) -> String {
        format!("{}/address/{address}", self.explorer_url.trim_end_matches('/'))
    }

    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.trim_end_matches('/'))
    }

    /// Parameters for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> serde_json::Value {
        let explorers: Vec<&str> = if self.explorer_url.is_empty() {
            Vec::new()
        } else {
            vec![self.explorer_url.as_str()]
        };
        serde_json::json!([{
            "chainId": self.chain_id_hex(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": explorers,
        }])
    }
}

impl fmt::Display for ChainSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Monad Testnet, the only network the templates target.
pub fn monad_testnet() -> ChainSpec {
    ChainSpec {
        id: 10143,
        name: "Monad Testnet".into(),
        native_currency: NativeCurrency {
            name: "Monad".into(),
            symbol: "MON".into(),
            decimals: 18,
        },
        rpc_urls: vec!["https://testnet-rpc.monad.xyz".into()],
        explorer_url: "https://testnet.monadvision.com".into(),
        multicall3: "0xcA11bde05977b3631167028862bE2a173976CA11".parse().ok(),
        testnet: true,
    }
}

/// Look up a known chain by id.
pub fn get_chain_by_id(chain_id: u64) -> Option<ChainSpec> {
    let testnet = monad_testnet();
    (testnet.id == chain_id).then_some(testnet)
}
