use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chain::monad_testnet;

/// Configuration for a single RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub chain_id: u64,
    pub url: String,
    pub is_custom: bool,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

impl RpcConfig {
    fn new(chain_id: u64, url: String) -> Self {
        Self {
            chain_id,
            url,
            is_custom: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Manages per-chain RPC endpoint configuration with custom override support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfigStore {
    configs: HashMap<u64, RpcConfig>,
}

impl RpcConfigStore {
    /// Create a store populated with the default RPC URL of every known chain.
    pub fn with_defaults() -> Self {
        let chain = monad_testnet();
        let configs = HashMap::from([(
            chain.id,
            RpcConfig::new(chain.id, chain.default_rpc_url().to_string()),
        )]);
        Self { configs }
    }

    /// Get the RPC configuration for a chain.
    pub fn get_rpc(&self, chain_id: u64) -> Option<&RpcConfig> {
        self.configs.get(&chain_id)
    }

    /// Override the RPC URL for a chain with a custom endpoint.
    ///
    /// Returns `Err` if the URL fails validation.
    pub fn set_custom_rpc(&mut self, chain_id: u64, url: String) -> Result<(), String> {
        if !validate_url(&url) {
            return Err(format!("invalid RPC URL: {url}"));
        }

        let entry = self
            .configs
            .entry(chain_id)
            .or_insert_with(|| RpcConfig::new(chain_id, String::new()));
        entry.url = url;
        entry.is_custom = true;
        Ok(())
    }

    /// Override transport tuning for a chain that already has an endpoint.
    pub fn set_transport(
        &mut self,
        chain_id: u64,
        timeout: Duration,
        retry_count: u32,
        retry_delay: Duration,
    ) {
        if let Some(entry) = self.configs.get_mut(&chain_id) {
            entry.timeout_secs = timeout.as_secs().max(1);
            entry.retry_count = retry_count;
            entry.retry_delay_ms = retry_delay.as_millis() as u64;
        }
    }

    /// Reset a chain's RPC URL back to the built-in default. Custom chains
    /// with no built-in default are removed.
    pub fn reset_to_default(&mut self, chain_id: u64) {
        match Self::with_defaults().configs.remove(&chain_id) {
            Some(default_config) => {
                self.configs.insert(chain_id, default_config);
            }
            None => {
                self.configs.remove(&chain_id);
            }
        }
    }
}

impl Default for RpcConfigStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}
