//! Typed helpers over an [`Eip1193Provider`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::abi::{from_hex, to_hex};
use crate::address::Address;
use crate::chain::ChainSpec;
use crate::provider::{Eip1193Provider, ProviderError};
use crate::units::{parse_quantity_u64, to_quantity};

/// A transaction handed to the wallet through `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: Option<BigUint>,
}

impl TxRequest {
    pub fn new(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to,
            data,
            value: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut tx = json!({
            "from": self.from.to_string(),
            "to": self.to.to_string(),
            "data": to_hex(&self.data),
        });
        if let Some(value) = &self.value {
            tx["value"] = Value::String(to_quantity(value));
        }
        tx
    }
}

/// The parts of a mined receipt the sync layer cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    /// `true` for `status = 0x1`.
    pub status: bool,
    pub block_number: u64,
    pub gas_used: u64,
}

impl TransactionReceipt {
    pub fn from_json(value: &Value) -> Result<Self, ProviderError> {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| ProviderError::InvalidResponse(format!("receipt missing {name}")))
        };
        let quantity = |name: &str| {
            field(name).and_then(|raw| {
                parse_quantity_u64(raw)
                    .map_err(|e| ProviderError::InvalidResponse(format!("receipt {name}: {e}")))
            })
        };

        Ok(Self {
            transaction_hash: field("transactionHash")?.to_string(),
            status: quantity("status")? == 1,
            block_number: quantity("blockNumber")?,
            gas_used: quantity("gasUsed")?,
        })
    }
}

/// Cheap-to-clone handle around a shared provider.
#[derive(Clone)]
pub struct RpcClient {
    provider: Arc<dyn Eip1193Provider>,
}

impl RpcClient {
    pub fn new(provider: Arc<dyn Eip1193Provider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn Eip1193Provider> {
        &self.provider
    }

    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let raw = self.provider.request("eth_chainId", json!([])).await?;
        parse_chain_id(&raw)
    }

    /// Accounts the wallet already exposes, without prompting.
    pub async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let raw = self.provider.request("eth_accounts", json!([])).await?;
        parse_accounts(&raw)
    }

    /// Ask the wallet to connect and expose its accounts.
    pub async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let raw = self
            .provider
            .request("eth_requestAccounts", json!([]))
            .await?;
        parse_accounts(&raw)
    }

    /// `eth_call` against the latest block. `from` matters for contracts
    /// that read `msg.sender` in view functions.
    pub async fn call(
        &self,
        to: &Address,
        data: &[u8],
        from: Option<&Address>,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut tx = json!({ "to": to.to_string(), "data": to_hex(data) });
        if let Some(from) = from {
            tx["from"] = Value::String(from.to_string());
        }
        let raw = self.provider.request("eth_call", json!([tx, "latest"])).await?;
        let hex = raw
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("eth_call returned {raw}")))?;
        from_hex(hex).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Submit a transaction for signing. Returns the transaction hash.
    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<String, ProviderError> {
        debug!(to = %tx.to, from = %tx.from, "eth_sendTransaction");
        let raw = self
            .provider
            .request("eth_sendTransaction", json!([tx.to_json()]))
            .await?;
        raw.as_str().map(str::to_string).ok_or_else(|| {
            ProviderError::InvalidResponse(format!("eth_sendTransaction returned {raw}"))
        })
    }

    /// `None` while the transaction is still pending.
    pub async fn get_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        let raw = self
            .provider
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if raw.is_null() {
            return Ok(None);
        }
        TransactionReceipt::from_json(&raw).map(Some)
    }

    /// Poll for the receipt until it appears or `timeout` elapses.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<TransactionReceipt, ProviderError> {
        let wait = async {
            loop {
                match self.get_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => tokio::time::sleep(poll_interval).await,
                    Err(e) => return Err(e),
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tx_hash, ?timeout, "Timed out waiting for receipt");
                Err(ProviderError::Timeout(timeout))
            }
        }
    }

    /// Switch the wallet to `chain`, registering it first when the wallet
    /// does not know it yet.
    pub async fn switch_chain(&self, chain: &ChainSpec) -> Result<(), ProviderError> {
        let params = json!([{ "chainId": chain.chain_id_hex() }]);
        match self
            .provider
            .request("wallet_switchEthereumChain", params)
            .await
        {
            Ok(_) => {
                info!(chain = %chain, "Switched wallet network");
                Ok(())
            }
            Err(e) if e.is_unrecognized_chain() => {
                info!(chain = %chain, "Wallet does not know the chain, adding it");
                self.provider
                    .request("wallet_addEthereumChain", chain.add_chain_params())
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn parse_chain_id(raw: &Value) -> Result<u64, ProviderError> {
    match raw {
        Value::String(s) => parse_quantity_u64(s)
            .map_err(|e| ProviderError::InvalidResponse(format!("chain id: {e}"))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("chain id: {n}"))),
        other => Err(ProviderError::InvalidResponse(format!("chain id: {other}"))),
    }
}

fn parse_accounts(raw: &Value) -> Result<Vec<Address>, ProviderError> {
    let list = raw
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse(format!("accounts: {raw}")))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| ProviderError::InvalidResponse(format!("account: {v}")))
                .and_then(|s| {
                    Address::from_str(s)
                        .map_err(|e| ProviderError::InvalidResponse(format!("account {s}: {e}")))
                })
        })
        .collect()
}
