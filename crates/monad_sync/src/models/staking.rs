//! Staking dashboard: a `StakingRewards` contract plus its staking and
//! reward tokens.

use async_trait::async_trait;
use num_bigint::BigUint;
use tracing::debug;

use monad_chain::{Address, ContractError, Erc20, RpcClient, StakingRewards};
use monad_core::SyncConfig;

use crate::error::{SyncError, WriteError};
use crate::model::{ReadModel, TxStep, WriteAction, positive_amount};
use crate::models::configured_address;
use crate::snapshot::{ChainStateSnapshot, SnapshotBody, ViewScope};

/// View names published by [`StakingDashboard`].
pub mod views {
    pub const OWNER: &str = "owner";
    pub const DURATION: &str = "duration";
    pub const FINISH_AT: &str = "finishAt";
    pub const REWARD_RATE: &str = "rewardRate";
    pub const TOTAL_SUPPLY: &str = "totalSupply";
    pub const REWARD_PER_TOKEN: &str = "rewardPerToken";
    pub const STAKING_SYMBOL: &str = "stakingSymbol";
    pub const REWARD_SYMBOL: &str = "rewardSymbol";
    pub const STAKING_DECIMALS: &str = "stakingDecimals";
    pub const REWARD_DECIMALS: &str = "rewardDecimals";

    pub const STAKED: &str = "staked";
    pub const EARNED: &str = "earned";
    pub const REWARDS: &str = "rewards";
    pub const STAKING_WALLET_BALANCE: &str = "stakingWalletBalance";
    pub const REWARD_WALLET_BALANCE: &str = "rewardWalletBalance";
}

const DEFAULT_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingAction {
    Stake(String),
    Withdraw(String),
    ClaimReward,
    SetRewardsDuration(String),
    FundRewards(String),
    NotifyRewardAmount(String),
}

impl StakingAction {
    pub fn is_owner_only(&self) -> bool {
        matches!(
            self,
            Self::SetRewardsDuration(_) | Self::FundRewards(_) | Self::NotifyRewardAmount(_)
        )
    }
}

impl WriteAction for StakingAction {
    fn label(&self) -> &'static str {
        match self {
            Self::Stake(_) => "stake",
            Self::Withdraw(_) => "withdraw",
            Self::ClaimReward => "getReward",
            Self::SetRewardsDuration(_) => "setRewardsDuration",
            Self::FundRewards(_) => "transfer",
            Self::NotifyRewardAmount(_) => "notifyRewardAmount",
        }
    }

    fn args(&self) -> Vec<String> {
        match self {
            Self::Stake(a)
            | Self::Withdraw(a)
            | Self::SetRewardsDuration(a)
            | Self::FundRewards(a)
            | Self::NotifyRewardAmount(a) => vec![a.trim().to_string()],
            Self::ClaimReward => Vec::new(),
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            Self::Stake(_) => "Stake successful.",
            Self::Withdraw(_) => "Withdraw successful.",
            Self::ClaimReward => "Rewards claimed.",
            Self::SetRewardsDuration(_) => "Reward duration updated.",
            Self::FundRewards(_) => "Rewards funded to staking contract.",
            Self::NotifyRewardAmount(_) => "Reward amount notified.",
        }
    }
}

/// Read model for the staking template's dashboard.
#[derive(Debug, Clone)]
pub struct StakingDashboard {
    staking: StakingRewards,
    staking_token: Erc20,
    reward_token: Erc20,
}

impl StakingDashboard {
    pub fn new(staking: Address, staking_token: Address, reward_token: Address) -> Self {
        Self {
            staking: StakingRewards::new(staking),
            staking_token: Erc20::new(staking_token),
            reward_token: Erc20::new(reward_token),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        Ok(Self::new(
            configured_address(config.staking_contract.as_deref(), "staking_contract")?,
            configured_address(config.staking_token.as_deref(), "staking_token")?,
            configured_address(config.reward_token.as_deref(), "reward_token")?,
        ))
    }

    pub fn staking_address(&self) -> Address {
        self.staking.address()
    }

    fn staking_decimals(snapshot: &ChainStateSnapshot) -> u8 {
        snapshot.decimals(views::TOTAL_SUPPLY, DEFAULT_DECIMALS)
    }

    fn reward_decimals(snapshot: &ChainStateSnapshot) -> u8 {
        snapshot.decimals(views::REWARD_RATE, DEFAULT_DECIMALS)
    }

    /// Case-insensitive match of the cached owner against `account`.
    pub fn is_owner(snapshot: &ChainStateSnapshot, account: Address) -> bool {
        snapshot
            .text(views::OWNER)
            .filter(|owner| !owner.is_empty())
            .is_some_and(|owner| owner.eq_ignore_ascii_case(&account.to_string()))
    }

    fn duration_seconds(input: &str) -> Result<u64, WriteError> {
        match input.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(WriteError::InvalidInput(
                "Enter a valid duration in seconds.".into(),
            )),
        }
    }
}

#[async_trait]
impl ReadModel for StakingDashboard {
    type Action = StakingAction;

    fn name(&self) -> &'static str {
        "staking"
    }

    async fn read(
        &self,
        rpc: &RpcClient,
        account: Option<Address>,
    ) -> Result<SnapshotBody, ContractError> {
        let (
            owner,
            duration,
            finish_at,
            reward_rate,
            total_supply,
            reward_per_token,
            staking_symbol,
            reward_symbol,
            staking_decimals,
            reward_decimals,
        ) = futures::try_join!(
            self.staking.owner(rpc),
            self.staking.duration(rpc),
            self.staking.finish_at(rpc),
            self.staking.reward_rate(rpc),
            self.staking.total_supply(rpc),
            self.staking.reward_per_token(rpc),
            self.staking_token.symbol(rpc),
            self.reward_token.symbol(rpc),
            self.staking_token.decimals(rpc),
            self.reward_token.decimals(rpc),
        )?;

        let mut body = SnapshotBody::new();
        body.text(views::OWNER, owner.to_checksum(), ViewScope::Contract)
            .text(views::STAKING_SYMBOL, staking_symbol, ViewScope::Contract)
            .text(views::REWARD_SYMBOL, reward_symbol, ViewScope::Contract)
            .contract(views::DURATION, duration, 0)
            .contract(views::FINISH_AT, finish_at, 0)
            .contract(views::REWARD_RATE, reward_rate, reward_decimals)
            .contract(views::TOTAL_SUPPLY, total_supply, staking_decimals)
            .contract(views::REWARD_PER_TOKEN, reward_per_token, reward_decimals)
            .contract(views::STAKING_DECIMALS, BigUint::from(staking_decimals), 0)
            .contract(views::REWARD_DECIMALS, BigUint::from(reward_decimals), 0);

        let user = match account {
            Some(account) => {
                let (staked, earned, rewards, staking_balance, reward_balance) = futures::try_join!(
                    self.staking.balance_of(rpc, account),
                    self.staking.earned(rpc, account),
                    self.staking.rewards(rpc, account),
                    self.staking_token.balance_of(rpc, account),
                    self.reward_token.balance_of(rpc, account),
                )?;
                [staked, earned, rewards, staking_balance, reward_balance]
            }
            None => Default::default(),
        };
        let [staked, earned, rewards, staking_balance, reward_balance] = user;
        body.user(views::STAKED, staked, staking_decimals)
            .user(views::EARNED, earned, reward_decimals)
            .user(views::REWARDS, rewards, reward_decimals)
            .user(views::STAKING_WALLET_BALANCE, staking_balance, staking_decimals)
            .user(views::REWARD_WALLET_BALANCE, reward_balance, reward_decimals);

        Ok(body)
    }

    fn validate(
        &self,
        action: &StakingAction,
        snapshot: &ChainStateSnapshot,
        account: Address,
    ) -> Result<(), WriteError> {
        if action.is_owner_only() && !Self::is_owner(snapshot, account) {
            return Err(WriteError::NotOwner);
        }

        let staking_decimals = Self::staking_decimals(snapshot);
        let reward_decimals = Self::reward_decimals(snapshot);
        match action {
            StakingAction::Stake(input) => {
                positive_amount(input, staking_decimals, "Enter a valid stake amount.")?;
            }
            StakingAction::Withdraw(input) => {
                positive_amount(input, staking_decimals, "Enter a valid withdraw amount.")?;
            }
            StakingAction::ClaimReward => {}
            StakingAction::SetRewardsDuration(input) => {
                Self::duration_seconds(input)?;
            }
            StakingAction::FundRewards(input) | StakingAction::NotifyRewardAmount(input) => {
                positive_amount(input, reward_decimals, "Enter a valid reward amount.")?;
            }
        }
        Ok(())
    }

    async fn plan(
        &self,
        rpc: &RpcClient,
        action: &StakingAction,
        snapshot: &ChainStateSnapshot,
        account: Address,
    ) -> Result<Vec<TxStep>, WriteError> {
        let staking_decimals = Self::staking_decimals(snapshot);
        let reward_decimals = Self::reward_decimals(snapshot);
        let staking = self.staking.address();

        let steps = match action {
            StakingAction::Stake(input) => {
                let amount = positive_amount(input, staking_decimals, "Enter a valid stake amount.")?;
                let allowance = self.staking_token.allowance(rpc, account, staking).await?;
                let mut steps = Vec::with_capacity(2);
                if allowance < amount {
                    debug!(%allowance, %amount, "Allowance too low, approving first");
                    steps.push(TxStep::new(
                        "approve",
                        self.staking_token.address(),
                        self.staking_token.approve(staking, &amount)?,
                    ));
                }
                steps.push(TxStep::new("stake", staking, self.staking.stake(&amount)?));
                steps
            }
            StakingAction::Withdraw(input) => {
                let amount =
                    positive_amount(input, staking_decimals, "Enter a valid withdraw amount.")?;
                vec![TxStep::new("withdraw", staking, self.staking.withdraw(&amount)?)]
            }
            StakingAction::ClaimReward => {
                vec![TxStep::new("getReward", staking, self.staking.get_reward()?)]
            }
            StakingAction::SetRewardsDuration(input) => {
                let seconds = Self::duration_seconds(input)?;
                vec![TxStep::new(
                    "setRewardsDuration",
                    staking,
                    self.staking.set_rewards_duration(seconds)?,
                )]
            }
            StakingAction::FundRewards(input) => {
                let amount = positive_amount(input, reward_decimals, "Enter a valid reward amount.")?;
                vec![TxStep::new(
                    "transfer",
                    self.reward_token.address(),
                    self.reward_token.transfer(staking, &amount)?,
                )]
            }
            StakingAction::NotifyRewardAmount(input) => {
                let amount = positive_amount(input, reward_decimals, "Enter a valid reward amount.")?;
                vec![TxStep::new(
                    "notifyRewardAmount",
                    staking,
                    self.staking.notify_reward_amount(&amount)?,
                )]
            }
        };
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::from_bytes(bytes)
    }

    fn snapshot_with_owner(owner: &str, staking_decimals: u8) -> ChainStateSnapshot {
        let mut body = SnapshotBody::new();
        body.text(views::OWNER, owner, ViewScope::Contract)
            .contract(views::TOTAL_SUPPLY, BigUint::default(), staking_decimals)
            .contract(views::REWARD_RATE, BigUint::default(), 18);
        ChainStateSnapshot::from_body(1, Some(addr(1)), Some(10143), body)
    }

    #[test]
    fn owner_match_is_case_insensitive() {
        let owner = "0x00000000000000000000000000000000000000AB";
        let snap = snapshot_with_owner(owner, 18);
        assert!(StakingDashboard::is_owner(&snap, addr(0xab)));
        assert!(!StakingDashboard::is_owner(&snap, addr(0xac)));
        assert!(!StakingDashboard::is_owner(&ChainStateSnapshot::empty(), addr(0xab)));
    }

    #[test]
    fn validation_messages() {
        let model = StakingDashboard::new(addr(1), addr(2), addr(3));
        let snap = snapshot_with_owner("0x00000000000000000000000000000000000000ab", 6);

        let hint = |action: StakingAction, who: Address| match model.validate(&action, &snap, who) {
            Err(WriteError::InvalidInput(msg)) => msg,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(hint(StakingAction::Stake("0".into()), addr(9)), "Enter a valid stake amount.");
        assert_eq!(hint(StakingAction::Withdraw("".into()), addr(9)), "Enter a valid withdraw amount.");
        assert_eq!(
            hint(StakingAction::SetRewardsDuration("-5".into()), addr(0xab)),
            "Enter a valid duration in seconds."
        );
        assert_eq!(
            hint(StakingAction::NotifyRewardAmount("x".into()), addr(0xab)),
            "Enter a valid reward amount."
        );

        // more fractional digits than the token supports
        assert!(model
            .validate(&StakingAction::Stake("1.1234567".into()), &snap, addr(9))
            .is_err());
        assert!(model
            .validate(&StakingAction::Stake("1.123456".into()), &snap, addr(9))
            .is_ok());
        assert!(model.validate(&StakingAction::ClaimReward, &snap, addr(9)).is_ok());
    }

    #[test]
    fn owner_only_actions_are_gated() {
        let model = StakingDashboard::new(addr(1), addr(2), addr(3));
        let snap = snapshot_with_owner("0x00000000000000000000000000000000000000ab", 18);

        for action in [
            StakingAction::SetRewardsDuration("60".into()),
            StakingAction::FundRewards("1".into()),
            StakingAction::NotifyRewardAmount("1".into()),
        ] {
            assert!(matches!(
                model.validate(&action, &snap, addr(9)),
                Err(WriteError::NotOwner)
            ));
            assert!(model.validate(&action, &snap, addr(0xab)).is_ok());
        }
    }

    #[test]
    fn action_metadata() {
        let stake = StakingAction::Stake(" 100 ".into());
        assert_eq!(stake.label(), "stake");
        assert_eq!(stake.args(), vec!["100".to_string()]);
        assert_eq!(stake.success_message(), "Stake successful.");
        assert!(StakingAction::ClaimReward.args().is_empty());
        assert!(!StakingAction::Withdraw("1".into()).is_owner_only());
    }

    #[test]
    fn from_config_requires_all_addresses() {
        let mut config = SyncConfig::default();
        assert!(matches!(
            StakingDashboard::from_config(&config),
            Err(SyncError::MissingConfig("staking_contract"))
        ));

        config.staking_contract = Some("0x0000000000000000000000000000000000000001".into());
        config.staking_token = Some("0x0000000000000000000000000000000000000002".into());
        assert!(matches!(
            StakingDashboard::from_config(&config),
            Err(SyncError::MissingConfig("reward_token"))
        ));

        config.reward_token = Some("0x0000000000000000000000000000000000000003".into());
        let model = StakingDashboard::from_config(&config).unwrap();
        assert_eq!(model.staking_address(), addr(1));
    }
}
