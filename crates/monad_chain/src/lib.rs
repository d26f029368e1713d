//! Chain layer: network description, ABI encoding, unit formatting, the
//! EIP-1193 provider seam and typed contract bindings.

pub mod abi;
pub mod address;
pub mod chain;
pub mod contracts;
pub mod provider;
pub mod rpc;
pub mod rpc_config;
pub mod units;

// Re-export primary types for convenient access.
pub use abi::{AbiError, Function, Token};
pub use address::{Address, AddressError};
pub use chain::{ChainSpec, NativeCurrency, get_chain_by_id, monad_testnet};
pub use contracts::{ContractError, Counter, Erc20, StakingRewards};
pub use provider::{Eip1193Provider, HttpProvider, ProviderError, WalletEvent, WalletEventHub};
pub use rpc::{RpcClient, TransactionReceipt, TxRequest};
pub use rpc_config::{RpcConfig, RpcConfigStore, validate_url};
pub use units::{UnitsError, format_token, format_units, parse_units, short_address};
