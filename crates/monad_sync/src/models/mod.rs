pub mod counter;
pub mod staking;

pub use counter::{CounterAction, CounterModel};
pub use staking::{StakingAction, StakingDashboard};

use std::str::FromStr;

use monad_chain::Address;

use crate::error::SyncError;

/// Parse a configured contract address, naming the setting when absent.
pub(crate) fn configured_address(
    value: Option<&str>,
    setting: &'static str,
) -> Result<Address, SyncError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(SyncError::MissingConfig(setting))?;
    Address::from_str(raw).map_err(|_| SyncError::MissingConfig(setting))
}
