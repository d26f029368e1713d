//! Typed bindings for the contracts the templates talk to.
//!
//! Each binding knows its address, exposes the function signatures as
//! constants (so test doubles can match on selectors), builds calldata for
//! mutating functions and decodes view results through an [`RpcClient`].

use num_bigint::BigUint;

use crate::abi::{self, AbiError, Function, Token};
use crate::address::Address;
use crate::provider::ProviderError;
use crate::rpc::RpcClient;

/// A view call failed either at the provider or while decoding its result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContractError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{function}: {source}")]
    Decode {
        function: &'static str,
        #[source]
        source: AbiError,
    },
}

impl ContractError {
    fn decode(function: &Function, source: AbiError) -> Self {
        Self::Decode {
            function: function.signature(),
            source,
        }
    }
}

async fn view(
    rpc: &RpcClient,
    to: &Address,
    function: &Function,
    args: &[Token],
    from: Option<&Address>,
) -> Result<Vec<u8>, ContractError> {
    let data = function
        .encode(args)
        .map_err(|e| ContractError::decode(function, e))?;
    Ok(rpc.call(to, &data, from).await?)
}

async fn view_uint(
    rpc: &RpcClient,
    to: &Address,
    function: &Function,
    args: &[Token],
) -> Result<BigUint, ContractError> {
    let out = view(rpc, to, function, args, None).await?;
    abi::decode_uint(&out).map_err(|e| ContractError::decode(function, e))
}

// ---------------------------------------------------------------------------
// ERC-20
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20 {
    address: Address,
}

impl Erc20 {
    pub const SYMBOL: Function = Function::new("symbol()");
    pub const DECIMALS: Function = Function::new("decimals()");
    pub const BALANCE_OF: Function = Function::new("balanceOf(address)");
    pub const ALLOWANCE: Function = Function::new("allowance(address,address)");
    pub const APPROVE: Function = Function::new("approve(address,uint256)");
    pub const TRANSFER: Function = Function::new("transfer(address,uint256)");

    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn symbol(&self, rpc: &RpcClient) -> Result<String, ContractError> {
        let out = view(rpc, &self.address, &Self::SYMBOL, &[], None).await?;
        abi::decode_string(&out).map_err(|e| ContractError::decode(&Self::SYMBOL, e))
    }

    pub async fn decimals(&self, rpc: &RpcClient) -> Result<u8, ContractError> {
        let out = view(rpc, &self.address, &Self::DECIMALS, &[], None).await?;
        abi::decode_u8(&out).map_err(|e| ContractError::decode(&Self::DECIMALS, e))
    }

    pub async fn balance_of(
        &self,
        rpc: &RpcClient,
        owner: Address,
    ) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::BALANCE_OF, &[owner.into()]).await
    }

    pub async fn allowance(
        &self,
        rpc: &RpcClient,
        owner: Address,
        spender: Address,
    ) -> Result<BigUint, ContractError> {
        view_uint(
            rpc,
            &self.address,
            &Self::ALLOWANCE,
            &[owner.into(), spender.into()],
        )
        .await
    }

    pub fn approve(&self, spender: Address, amount: &BigUint) -> Result<Vec<u8>, AbiError> {
        Self::APPROVE.encode(&[spender.into(), amount.clone().into()])
    }

    pub fn transfer(&self, to: Address, amount: &BigUint) -> Result<Vec<u8>, AbiError> {
        Self::TRANSFER.encode(&[to.into(), amount.clone().into()])
    }
}

// ---------------------------------------------------------------------------
// StakingRewards
// ---------------------------------------------------------------------------

/// Synthetix-style `StakingRewards` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakingRewards {
    address: Address,
}

impl StakingRewards {
    pub const OWNER: Function = Function::new("owner()");
    pub const DURATION: Function = Function::new("duration()");
    pub const FINISH_AT: Function = Function::new("finishAt()");
    pub const REWARD_RATE: Function = Function::new("rewardRate()");
    pub const TOTAL_SUPPLY: Function = Function::new("totalSupply()");
    pub const REWARD_PER_TOKEN: Function = Function::new("rewardPerToken()");
    pub const BALANCE_OF: Function = Function::new("balanceOf(address)");
    pub const EARNED: Function = Function::new("earned(address)");
    pub const REWARDS: Function = Function::new("rewards(address)");
    pub const STAKE: Function = Function::new("stake(uint256)");
    pub const WITHDRAW: Function = Function::new("withdraw(uint256)");
    pub const GET_REWARD: Function = Function::new("getReward()");
    pub const SET_REWARDS_DURATION: Function = Function::new("setRewardsDuration(uint256)");
    pub const NOTIFY_REWARD_AMOUNT: Function = Function::new("notifyRewardAmount(uint256)");

    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn owner(&self, rpc: &RpcClient) -> Result<Address, ContractError> {
        let out = view(rpc, &self.address, &Self::OWNER, &[], None).await?;
        abi::decode_address(&out).map_err(|e| ContractError::decode(&Self::OWNER, e))
    }

    pub async fn duration(&self, rpc: &RpcClient) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::DURATION, &[]).await
    }

    pub async fn finish_at(&self, rpc: &RpcClient) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::FINISH_AT, &[]).await
    }

    pub async fn reward_rate(&self, rpc: &RpcClient) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::REWARD_RATE, &[]).await
    }

    pub async fn total_supply(&self, rpc: &RpcClient) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::TOTAL_SUPPLY, &[]).await
    }

    pub async fn reward_per_token(&self, rpc: &RpcClient) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::REWARD_PER_TOKEN, &[]).await
    }

    pub async fn balance_of(
        &self,
        rpc: &RpcClient,
        account: Address,
    ) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::BALANCE_OF, &[account.into()]).await
    }

    pub async fn earned(&self, rpc: &RpcClient, account: Address) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::EARNED, &[account.into()]).await
    }

    pub async fn rewards(
        &self,
        rpc: &RpcClient,
        account: Address,
    ) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::REWARDS, &[account.into()]).await
    }

    pub fn stake(&self, amount: &BigUint) -> Result<Vec<u8>, AbiError> {
        Self::STAKE.encode(&[amount.clone().into()])
    }

    pub fn withdraw(&self, amount: &BigUint) -> Result<Vec<u8>, AbiError> {
        Self::WITHDRAW.encode(&[amount.clone().into()])
    }

    pub fn get_reward(&self) -> Result<Vec<u8>, AbiError> {
        Self::GET_REWARD.encode(&[])
    }

    pub fn set_rewards_duration(&self, seconds: u64) -> Result<Vec<u8>, AbiError> {
        Self::SET_REWARDS_DURATION.encode(&[seconds.into()])
    }

    pub fn notify_reward_amount(&self, amount: &BigUint) -> Result<Vec<u8>, AbiError> {
        Self::NOTIFY_REWARD_AMOUNT.encode(&[amount.clone().into()])
    }
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// The embedded-wallet template's per-user counter contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    address: Address,
}

impl Counter {
    pub const TOTAL_COUNT: Function = Function::new("totalCount()");
    pub const GET_MY_COUNT: Function = Function::new("getMyCount()");
    pub const GET_COUNT: Function = Function::new("getCount(address)");
    pub const INCREASE_COUNTER: Function = Function::new("increaseCounter()");

    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn total_count(&self, rpc: &RpcClient) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::TOTAL_COUNT, &[]).await
    }

    /// `getMyCount()` reads `msg.sender`, so the call is made from `account`.
    pub async fn get_my_count(
        &self,
        rpc: &RpcClient,
        account: Address,
    ) -> Result<BigUint, ContractError> {
        let out = view(rpc, &self.address, &Self::GET_MY_COUNT, &[], Some(&account)).await?;
        abi::decode_uint(&out).map_err(|e| ContractError::decode(&Self::GET_MY_COUNT, e))
    }

    pub async fn get_count(
        &self,
        rpc: &RpcClient,
        account: Address,
    ) -> Result<BigUint, ContractError> {
        view_uint(rpc, &self.address, &Self::GET_COUNT, &[account.into()]).await
    }

    pub fn increase_counter(&self) -> Result<Vec<u8>, AbiError> {
        Self::INCREASE_COUNTER.encode(&[])
    }
}
