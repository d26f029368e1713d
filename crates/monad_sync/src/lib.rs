//! Chain-state sync: keeps a UI-facing snapshot of contract views fresh and
//! funnels every state-changing call through a guarded write path that
//! re-syncs afterwards.
//!
//! The main entry point is [`ChainStateSync`], parameterised by a
//! [`ReadModel`] describing one contract surface. Two models ship with the
//! crate: [`StakingDashboard`] and [`CounterModel`].

pub mod error;
pub mod ledger;
pub mod model;
pub mod models;
pub mod pending;
pub mod snapshot;
pub mod sync;

pub use error::{SyncError, WriteError};
pub use ledger::{LeaderboardEntry, LedgerAction, LedgerError, NewTransaction, TransactionLedger};
pub use model::{ReadModel, TxStep, WriteAction};
pub use models::{CounterAction, CounterModel, StakingAction, StakingDashboard};
pub use pending::{PendingAction, WriteState};
pub use snapshot::{ChainStateSnapshot, SnapshotBody, TextValue, ViewScope, ViewValue};
pub use sync::{ChainStateSync, SyncHandle, SyncSettings, WalletSession, WriteOutcome};
