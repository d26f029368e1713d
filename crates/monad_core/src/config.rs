use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable overriding [`SyncConfig::rpc_url`].
pub const ENV_RPC_URL: &str = "MONAD_SYNC_RPC_URL";
/// Environment variable overriding [`SyncConfig::counter_contract`].
pub const ENV_COUNTER_ADDRESS: &str = "MONAD_COUNTER_ADDRESS";

pub const DEFAULT_RPC_URL: &str = "https://testnet-rpc.monad.xyz";
pub const DEFAULT_CHAIN_ID: u64 = 10143;
pub const DEFAULT_COUNTER_ADDRESS: &str = "0x65138ffa2eC30375776627bFF6318D3e792Bd0B9";

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Application configuration stored at `~/.monad-sync/config.json`.
///
/// Contract addresses are plain hex strings here; they are parsed into typed
/// addresses by the chain layer. The staking addresses have no sensible
/// default and stay `None` until configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    // Network
    pub rpc_url: String,
    pub chain_id: u64,
    pub rpc_timeout_secs: u64,
    pub rpc_retry_count: u32,
    pub rpc_retry_delay_ms: u64,

    // Sync loop
    pub poll_interval_secs: u64,
    pub receipt_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,

    // Contracts
    pub staking_contract: Option<String>,
    pub staking_token: Option<String>,
    pub reward_token: Option<String>,
    pub counter_contract: String,

    // Wallet
    pub wallet_account: Option<String>,

    // General
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            chain_id: DEFAULT_CHAIN_ID,
            rpc_timeout_secs: 30,
            rpc_retry_count: 3,
            rpc_retry_delay_ms: 1_000,
            poll_interval_secs: 12,
            receipt_timeout_secs: 60,
            receipt_poll_interval_ms: 1_000,
            staking_contract: None,
            staking_token: None,
            reward_token: None,
            counter_contract: DEFAULT_COUNTER_ADDRESS.into(),
            wallet_account: None,
            log_level: "info".into(),
        }
    }
}

impl SyncConfig {
    /// Returns the base config directory: `~/.monad-sync/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".monad-sync"))
    }

    /// Returns the config file path: `~/.monad-sync/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.monad-sync/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Returns the transaction ledger path: `~/.monad-sync/ledger.json`
    pub fn ledger_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("ledger.json"))
    }

    /// Ensures all required directories exist.
    pub fn ensure_dirs() -> Result<()> {
        for dir in [Self::base_dir()?, Self::logs_dir()?] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }

    /// Loads config from the default location, or creates a default file if
    /// missing. Environment overrides are applied after loading.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        let mut config = Self::load_from_path(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Save config to a specific file path, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_RPC_URL).filter(|v| !v.trim().is_empty()) {
            self.rpc_url = url.trim().to_string();
        }
        if let Some(addr) = lookup(ENV_COUNTER_ADDRESS).filter(|v| !v.trim().is_empty()) {
            self.counter_contract = addr.trim().to_string();
        }
    }

    /// Check that every field holds a usable value.
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.rpc_url) {
            anyhow::bail!("invalid RPC URL: {}", self.rpc_url);
        }
        if self.chain_id == 0 {
            anyhow::bail!("chain_id must be non-zero");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        if self.receipt_timeout_secs == 0 {
            anyhow::bail!("receipt_timeout_secs must be at least 1");
        }

        let addresses = [
            ("staking_contract", self.staking_contract.as_deref()),
            ("staking_token", self.staking_token.as_deref()),
            ("reward_token", self.reward_token.as_deref()),
            ("counter_contract", Some(self.counter_contract.as_str())),
            ("wallet_account", self.wallet_account.as_deref()),
        ];
        for (field, value) in addresses {
            if let Some(v) = value
                && !is_hex_address(v)
            {
                anyhow::bail!("{field} is not a valid address: {v}");
            }
        }
        Ok(())
    }

    /// Whether all three staking dashboard addresses are configured.
    pub fn has_staking(&self) -> bool {
        self.staking_contract.is_some() && self.staking_token.is_some() && self.reward_token.is_some()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn rpc_retry_delay(&self) -> Duration {
        Duration::from_millis(self.rpc_retry_delay_ms)
    }
}

fn is_http_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

fn is_hex_address(value: &str) -> bool {
    let Some(body) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) else {
        return false;
    };
    body.len() == 40 && hex::decode(body).is_ok()
}
