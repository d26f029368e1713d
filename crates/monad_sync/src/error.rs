//! Sync-layer error types.

use monad_chain::{AbiError, ContractError, ProviderError};
use monad_core::{ClassifiedError, ErrorKind, classify_provider_error};

/// Errors from reading chain state or managing the wallet session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// A contract view call failed.
    #[error("Read failed: {0}")]
    Read(#[from] ContractError),

    /// A wallet request failed.
    #[error("Wallet request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The wallet returned no accounts after a connect request.
    #[error("Wallet exposed no accounts")]
    NoAccounts,

    /// A wallet event carried a value that could not be parsed.
    #[error("Invalid wallet event: {0}")]
    InvalidEvent(String),

    /// A required contract address is not configured.
    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),
}

impl SyncError {
    pub fn classify(&self) -> ClassifiedError {
        match self {
            Self::Provider(e) | Self::Read(ContractError::Provider(e)) => e.classify(),
            other => classify_provider_error(None, &other.to_string()),
        }
    }
}

/// Why a guarded write did not complete.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WriteError {
    /// A write for the same control is still in flight.
    #[error("A write for `{0}` is already in flight")]
    Busy(String),

    #[error("No wallet connected")]
    NotConnected,

    #[error("Wallet is on chain {actual:?}, expected {expected}")]
    WrongNetwork { expected: u64, actual: Option<u64> },

    /// Input rejected before any provider call. Carries the user-facing hint.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Only the contract owner can perform this action")]
    NotOwner,

    /// The transaction was mined with `status = 0x0`.
    #[error("Transaction {tx_hash} reverted ({step})")]
    Reverted { tx_hash: String, step: &'static str },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("Failed to encode call: {0}")]
    Encoding(#[from] AbiError),
}

impl WriteError {
    /// Rejections that happen before anything is sent to the wallet.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::Busy(_)
                | Self::NotConnected
                | Self::WrongNetwork { .. }
                | Self::InvalidInput(_)
                | Self::NotOwner
        )
    }

    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Provider(e) | Self::Contract(ContractError::Provider(e)) => {
                e.is_user_rejection()
            }
            _ => false,
        }
    }

    pub fn classify(&self) -> ClassifiedError {
        match self {
            Self::Provider(e) | Self::Contract(ContractError::Provider(e)) => e.classify(),
            Self::Reverted { .. } => ClassifiedError {
                kind: ErrorKind::Reverted,
                message: self.to_string(),
                user_message: "Transaction reverted by contract.".into(),
            },
            Self::WrongNetwork { expected, .. } => ClassifiedError {
                kind: ErrorKind::WrongNetwork,
                message: self.to_string(),
                user_message: format!("Switch wallet network to chain {expected}."),
            },
            Self::NotConnected => ClassifiedError {
                kind: ErrorKind::Internal,
                message: self.to_string(),
                user_message: "Connect wallet first.".into(),
            },
            Self::InvalidInput(hint) => ClassifiedError {
                kind: ErrorKind::Internal,
                message: self.to_string(),
                user_message: hint.clone(),
            },
            Self::NotOwner => ClassifiedError {
                kind: ErrorKind::Internal,
                message: self.to_string(),
                user_message: "Only the contract owner can do this.".into(),
            },
            other => classify_provider_error(None, &other.to_string()),
        }
    }
}
