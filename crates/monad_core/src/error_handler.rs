use serde::{Deserialize, Serialize};

/// EIP-1193 code for a request the user rejected in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 / MetaMask code for `wallet_switchEthereumChain` on a chain the
/// wallet does not know about yet.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Category of a failed wallet or RPC interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The user dismissed the signature prompt. Not a failure.
    Cancelled,
    /// The contract rejected the call.
    Reverted,
    /// Not enough native currency to pay for gas.
    InsufficientFunds,
    /// The wallet is connected to a different chain.
    WrongNetwork,
    /// RPC endpoint or wallet unreachable.
    Network,
    /// Anything else.
    Internal,
}

/// Classified error with a message fit for a toast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub user_message: String,
}

impl ClassifiedError {
    /// Whether this outcome should be reported as a failure. Cancellations
    /// are not.
    pub fn is_failure(&self) -> bool {
        self.kind != ErrorKind::Cancelled
    }
}

/// Classify a provider error from its EIP-1193 code (if any) and message.
pub fn classify_provider_error(code: Option<i64>, message: &str) -> ClassifiedError {
    let msg = message.to_lowercase();

    let (kind, user_msg) = if code == Some(USER_REJECTED_CODE)
        || msg.contains("user rejected")
        || msg.contains("user denied")
    {
        (ErrorKind::Cancelled, "Transaction was cancelled.")
    } else if msg.contains("insufficient funds") {
        (ErrorKind::InsufficientFunds, "Insufficient MON for gas.")
    } else if msg.contains("execution reverted") || msg.contains("reverted") {
        (ErrorKind::Reverted, "Transaction reverted by contract.")
    } else if code == Some(UNRECOGNIZED_CHAIN_CODE)
        || msg.contains("wrong network")
        || msg.contains("chain mismatch")
    {
        (
            ErrorKind::WrongNetwork,
            "Wrong network. Switch your wallet to the expected chain.",
        )
    } else if msg.contains("timeout")
        || msg.contains("timed out")
        || msg.contains("connection")
        || msg.contains("dns")
        || msg.contains("error sending request")
    {
        (ErrorKind::Network, "Network error. Check your connection.")
    } else {
        (ErrorKind::Internal, "Transaction failed. Please try again.")
    };

    ClassifiedError {
        kind,
        message: message.to_string(),
        user_message: user_msg.to_string(),
    }
}

/// Classify an `anyhow::Error` by inspecting its message.
pub fn classify_error(error: &anyhow::Error) -> ClassifiedError {
    classify_provider_error(None, &error.to_string())
}
