//! The embedded-wallet counter: a global total plus a per-account count.

use std::str::FromStr;

use async_trait::async_trait;
use num_bigint::BigUint;

use monad_chain::{Address, ContractError, Counter, RpcClient};
use monad_core::SyncConfig;

use crate::error::{SyncError, WriteError};
use crate::model::{ReadModel, TxStep, WriteAction};
use crate::snapshot::{ChainStateSnapshot, SnapshotBody};

pub mod views {
    pub const TOTAL_COUNT: &str = "totalCount";
    /// `getMyCount()` evaluated with `from = account`.
    pub const MY_COUNT: &str = "myCount";
    /// `getCount(account)`.
    pub const DIRECT_COUNT: &str = "directCount";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAction {
    IncreaseCounter,
}

impl WriteAction for CounterAction {
    fn label(&self) -> &'static str {
        "increaseCounter"
    }

    fn args(&self) -> Vec<String> {
        Vec::new()
    }

    fn success_message(&self) -> &'static str {
        "Counter increased."
    }
}

#[derive(Debug, Clone)]
pub struct CounterModel {
    counter: Counter,
}

impl CounterModel {
    pub fn new(address: Address) -> Self {
        Self {
            counter: Counter::new(address),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let address = Address::from_str(config.counter_contract.trim())
            .map_err(|_| SyncError::MissingConfig("counter_contract"))?;
        Ok(Self::new(address))
    }

    pub fn address(&self) -> Address {
        self.counter.address()
    }
}

#[async_trait]
impl ReadModel for CounterModel {
    type Action = CounterAction;

    fn name(&self) -> &'static str {
        "counter"
    }

    async fn read(
        &self,
        rpc: &RpcClient,
        account: Option<Address>,
    ) -> Result<SnapshotBody, ContractError> {
        let mut body = SnapshotBody::new();
        match account {
            Some(account) => {
                let (total, mine, direct) = futures::try_join!(
                    self.counter.total_count(rpc),
                    self.counter.get_my_count(rpc, account),
                    self.counter.get_count(rpc, account),
                )?;
                body.contract(views::TOTAL_COUNT, total, 0)
                    .user(views::MY_COUNT, mine, 0)
                    .user(views::DIRECT_COUNT, direct, 0);
            }
            None => {
                let total = self.counter.total_count(rpc).await?;
                body.contract(views::TOTAL_COUNT, total, 0)
                    .user(views::MY_COUNT, BigUint::default(), 0)
                    .user(views::DIRECT_COUNT, BigUint::default(), 0);
            }
        }
        Ok(body)
    }

    fn validate(
        &self,
        _action: &CounterAction,
        _snapshot: &ChainStateSnapshot,
        _account: Address,
    ) -> Result<(), WriteError> {
        Ok(())
    }

    async fn plan(
        &self,
        _rpc: &RpcClient,
        action: &CounterAction,
        _snapshot: &ChainStateSnapshot,
        _account: Address,
    ) -> Result<Vec<TxStep>, WriteError> {
        match action {
            CounterAction::IncreaseCounter => Ok(vec![
                TxStep::new(
                    "increaseCounter",
                    self.counter.address(),
                    self.counter.increase_counter()?,
                )
                .with_value(BigUint::default()),
            ]),
        }
    }
}
