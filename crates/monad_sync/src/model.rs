//! The seam between the generic sync engine and a concrete dApp screen.

use std::fmt;

use async_trait::async_trait;
use num_bigint::BigUint;

use monad_chain::{Address, ContractError, RpcClient, TxRequest, parse_units};

use crate::error::WriteError;
use crate::snapshot::{ChainStateSnapshot, SnapshotBody};

/// One transaction of a guarded write. Steps run in order and each must be
/// mined before the next is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStep {
    pub label: &'static str,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: Option<BigUint>,
}

impl TxStep {
    pub fn new(label: &'static str, to: Address, data: Vec<u8>) -> Self {
        Self {
            label,
            to,
            data,
            value: None,
        }
    }

    pub fn with_value(mut self, value: BigUint) -> Self {
        self.value = Some(value);
        self
    }

    pub fn into_request(self, from: Address) -> TxRequest {
        TxRequest {
            from,
            to: self.to,
            data: self.data,
            value: self.value,
        }
    }
}

/// A user action a read model knows how to turn into transactions.
pub trait WriteAction: fmt::Debug + Send + Sync {
    /// Contract function the action ends in.
    fn label(&self) -> &'static str;

    /// Arguments as entered, for display and logs.
    fn args(&self) -> Vec<String>;

    /// Toast text once every step is confirmed.
    fn success_message(&self) -> &'static str;
}

/// Reads a contract surface into a snapshot body and plans writes against it.
#[async_trait]
pub trait ReadModel: Send + Sync + 'static {
    type Action: WriteAction;

    fn name(&self) -> &'static str;

    /// Issue every view call and return the complete body. User-scoped views
    /// must be present (as zero) when `account` is `None`.
    async fn read(
        &self,
        rpc: &RpcClient,
        account: Option<Address>,
    ) -> Result<SnapshotBody, ContractError>;

    /// Input and permission checks. Must not touch the provider.
    fn validate(
        &self,
        action: &Self::Action,
        snapshot: &ChainStateSnapshot,
        account: Address,
    ) -> Result<(), WriteError>;

    /// Turn a validated action into transactions. May read chain state,
    /// e.g. an allowance, to decide which steps are needed.
    async fn plan(
        &self,
        rpc: &RpcClient,
        action: &Self::Action,
        snapshot: &ChainStateSnapshot,
        account: Address,
    ) -> Result<Vec<TxStep>, WriteError>;
}

/// Parse a strictly positive token amount, mapping any failure to `hint`.
pub(crate) fn positive_amount(input: &str, decimals: u8, hint: &str) -> Result<BigUint, WriteError> {
    match parse_units(input, decimals) {
        Ok(amount) if amount > BigUint::default() => Ok(amount),
        _ => Err(WriteError::InvalidInput(hint.to_string())),
    }
}
