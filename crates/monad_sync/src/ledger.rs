//! Reward transaction ledger and the leaderboard built from it.
//!
//! Records are keyed by transaction hash, so recording the same transaction
//! twice updates it instead of counting it twice.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Missing required fields")]
    MissingFields,

    #[error("Invalid action. Use scratch_reward or claim.")]
    InvalidAction(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    ScratchReward,
    Claim,
}

impl FromStr for LedgerAction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "scratch_reward" => Ok(Self::ScratchReward),
            "claim" => Ok(Self::Claim),
            other => Err(LedgerError::InvalidAction(other.to_string())),
        }
    }
}

/// Input for [`TransactionLedger::record`], as loosely typed as it arrives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTransaction {
    pub wallet_address: String,
    pub tx_hash: String,
    pub action: String,
    pub amount_wei: String,
    pub contract_address: String,
    pub chain_id: Option<u64>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub wallet_address: String,
    pub tx_hash: String,
    pub action: LedgerAction,
    /// Decimal wei amount.
    pub amount_wei: String,
    pub contract_address: String,
    pub chain_id: u64,
    pub occurred_at: DateTime<Utc>,
}

impl TransactionRecord {
    fn amount(&self) -> BigUint {
        BigUint::parse_bytes(self.amount_wei.as_bytes(), 10).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub wallet_address: String,
    pub total_won_wei: String,
    pub total_claimed_wei: String,
    pub scratch_count: u64,
    pub tx_count: u64,
    pub last_activity: DateTime<Utc>,
}

/// Clamp a requested leaderboard size to `1..=100`, defaulting to 10.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionLedger {
    records: BTreeMap<String, TransactionRecord>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, tx_hash: &str) -> Option<&TransactionRecord> {
        self.records.get(&tx_hash.trim().to_lowercase())
    }

    /// Validate and upsert a transaction.
    pub fn record(&mut self, tx: NewTransaction) -> Result<&TransactionRecord, LedgerError> {
        let wallet_address = tx.wallet_address.trim().to_lowercase();
        let tx_hash = tx.tx_hash.trim().to_lowercase();
        let amount_wei = tx.amount_wei.trim().to_string();
        let contract_address = tx.contract_address.trim().to_lowercase();

        let chain_id = match tx.chain_id {
            Some(id)
                if !wallet_address.is_empty()
                    && !tx_hash.is_empty()
                    && !amount_wei.is_empty()
                    && !contract_address.is_empty() =>
            {
                id
            }
            _ => return Err(LedgerError::MissingFields),
        };
        let action = tx.action.parse::<LedgerAction>()?;
        if !amount_wei.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidAmount(amount_wei));
        }

        let record = TransactionRecord {
            wallet_address,
            tx_hash: tx_hash.clone(),
            action,
            amount_wei,
            contract_address,
            chain_id,
            occurred_at: tx.occurred_at.unwrap_or_else(Utc::now),
        };
        self.records.insert(tx_hash.clone(), record);
        Ok(&self.records[&tx_hash])
    }

    /// Per-wallet totals, best first: most won, then most scratches, then
    /// most recent activity.
    pub fn leaderboard(&self, limit: Option<usize>) -> Vec<LeaderboardEntry> {
        struct Totals {
            won: BigUint,
            claimed: BigUint,
            scratch_count: u64,
            tx_count: u64,
            last_activity: DateTime<Utc>,
        }

        let mut by_wallet: HashMap<&str, Totals> = HashMap::new();
        for record in self.records.values() {
            let totals = by_wallet
                .entry(record.wallet_address.as_str())
                .or_insert_with(|| Totals {
                    won: BigUint::default(),
                    claimed: BigUint::default(),
                    scratch_count: 0,
                    tx_count: 0,
                    last_activity: record.occurred_at,
                });
            match record.action {
                LedgerAction::ScratchReward => {
                    totals.won += record.amount();
                    totals.scratch_count += 1;
                }
                LedgerAction::Claim => totals.claimed += record.amount(),
            }
            totals.tx_count += 1;
            totals.last_activity = totals.last_activity.max(record.occurred_at);
        }

        let mut rows: Vec<(&str, Totals)> = by_wallet.into_iter().collect();
        rows.sort_by(|(a_wallet, a), (b_wallet, b)| {
            b.won
                .cmp(&a.won)
                .then(b.scratch_count.cmp(&a.scratch_count))
                .then(b.last_activity.cmp(&a.last_activity))
                .then(a_wallet.cmp(b_wallet))
        });

        rows.into_iter()
            .take(clamp_limit(limit))
            .map(|(wallet, t)| LeaderboardEntry {
                wallet_address: wallet.to_string(),
                total_won_wei: t.won.to_string(),
                total_claimed_wei: t.claimed.to_string(),
                scratch_count: t.scratch_count,
                tx_count: t.tx_count,
                last_activity: t.last_activity,
            })
            .collect()
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create ledger directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize ledger")?;
        std::fs::write(path, json).context("failed to write ledger file")?;
        info!(path = %path.display(), count = self.records.len(), "ledger saved");
        Ok(())
    }

    /// Load a ledger from a JSON file. Returns an empty ledger if the file
    /// does not exist.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "ledger file not found, starting empty");
            return Ok(Self::new());
        }
        let json = std::fs::read_to_string(path).context("failed to read ledger file")?;
        let ledger: Self = serde_json::from_str(&json).context("failed to deserialize ledger")?;
        info!(path = %path.display(), count = ledger.records.len(), "ledger loaded");
        Ok(ledger)
    }
}
