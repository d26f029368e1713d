//! ChainStateSync: the owned container for one dApp screen's chain state.
//!
//! [`ChainStateSync`] keeps a snapshot of contract views fresh and is the
//! single path for state-changing calls:
//! - `refresh()` reads every view and swaps the snapshot in whole
//! - `run_guarded_write()` checks wallet and network, sends the
//!   transaction(s), waits for receipts, then refreshes exactly once
//! - `attach()` runs the poll ticker and wallet event listener until the
//!   returned [`SyncHandle`] is dropped

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use monad_chain::units::parse_quantity_u64;
use monad_chain::{Address, ChainSpec, RpcClient, WalletEvent, get_chain_by_id};
use monad_core::{SyncConfig, Toast, ToastKind, ToastStore};

use crate::error::{SyncError, WriteError};
use crate::model::{ReadModel, WriteAction};
use crate::pending::{PendingAction, WriteState};
use crate::snapshot::ChainStateSnapshot;

// ---------------------------------------------------------------------------
// Settings & session
// ---------------------------------------------------------------------------

/// Timing and network expectations for a [`ChainStateSync`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// The network writes are allowed on.
    pub chain: ChainSpec,
    pub poll_interval: Duration,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl SyncSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        let chain = match get_chain_by_id(config.chain_id) {
            Some(mut chain) => {
                if !chain.rpc_urls.iter().any(|u| u == &config.rpc_url) {
                    chain.rpc_urls.insert(0, config.rpc_url.clone());
                }
                chain
            }
            None => ChainSpec::custom(config.chain_id, config.rpc_url.clone()),
        };

        Self {
            chain,
            poll_interval: config.poll_interval(),
            receipt_timeout: config.receipt_timeout(),
            receipt_poll_interval: config.receipt_poll_interval(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// What the wallet last told us.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletSession {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
}

impl WalletSession {
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }
}

/// How a guarded write ended when it did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Every step was mined successfully.
    Confirmed { tx_hashes: Vec<String> },
    /// The user rejected a signature request.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Single-flight guard
// ---------------------------------------------------------------------------

/// Holds a control's slot in the in-flight set until dropped.
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    control: String,
}

impl<'a> FlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<String>>, control: &str) -> Option<Self> {
        in_flight.lock().insert(control.to_string()).then(|| Self {
            in_flight,
            control: control.to_string(),
        })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.control);
    }
}

// ---------------------------------------------------------------------------
// ChainStateSync
// ---------------------------------------------------------------------------

pub struct ChainStateSync<M: ReadModel> {
    model: M,
    rpc: RpcClient,
    settings: SyncSettings,
    session: Mutex<WalletSession>,
    /// Serializes read-and-swap so concurrent refreshes cannot interleave.
    refresh_lock: AsyncMutex<()>,
    snapshot_tx: watch::Sender<Arc<ChainStateSnapshot>>,
    generation: AtomicU64,
    refresh_count: AtomicU64,
    in_flight: Mutex<HashSet<String>>,
    pending: Mutex<HashMap<String, PendingAction>>,
    toasts: Mutex<ToastStore>,
}

impl<M: ReadModel> ChainStateSync<M> {
    pub fn new(model: M, rpc: RpcClient, settings: SyncSettings) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(ChainStateSnapshot::empty()));
        Self {
            model,
            rpc,
            settings,
            session: Mutex::new(WalletSession::default()),
            refresh_lock: AsyncMutex::new(()),
            snapshot_tx,
            generation: AtomicU64::new(0),
            refresh_count: AtomicU64::new(0),
            in_flight: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            toasts: Mutex::new(ToastStore::new()),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn session(&self) -> WalletSession {
        *self.session.lock()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<ChainStateSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver that observes every snapshot swap.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ChainStateSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Number of `refresh()` calls started so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    pub fn is_in_flight(&self, control: &str) -> bool {
        self.in_flight.lock().contains(control)
    }

    pub fn pending(&self, control: &str) -> Option<PendingAction> {
        self.pending.lock().get(control).cloned()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().all().to_vec()
    }

    /// Remove a toast. Any finished action it reported is discarded too.
    pub fn dismiss_toast(&self, id: &str) -> Option<Toast> {
        let toast = self.toasts.lock().dismiss(id)?;
        self.pending
            .lock()
            .retain(|_, action| action.toast_id.as_deref() != Some(id));
        Some(toast)
    }

    fn toast(&self, kind: ToastKind, message: impl Into<String>) -> String {
        self.toasts.lock().push(Toast::new(kind, message))
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    // -- Reads -------------------------------------------------------------

    /// Read every view and publish a new snapshot.
    ///
    /// On failure the previous snapshot stays published. There is no retry;
    /// the next poll tick tries again.
    pub async fn refresh(&self) -> Result<Arc<ChainStateSnapshot>, SyncError> {
        let _swap = self.refresh_lock.lock().await;
        self.refresh_count.fetch_add(1, Ordering::SeqCst);

        let session = self.session();
        let body = match self.model.read(&self.rpc, session.account).await {
            Ok(body) => body,
            Err(e) => {
                let err = SyncError::Read(e);
                warn!(model = self.model.name(), "Refresh failed: {err}");
                self.toast(ToastKind::Error, "Failed to fetch contract data.");
                return Err(err);
            }
        };

        let snapshot = Arc::new(ChainStateSnapshot::from_body(
            self.next_generation(),
            session.account,
            session.chain_id,
            body,
        ));
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        debug!(
            model = self.model.name(),
            generation = snapshot.generation(),
            "Snapshot refreshed"
        );
        Ok(snapshot)
    }

    /// Publish a copy of the current snapshot with user-scoped views zeroed.
    async fn clear_user_scope(&self) {
        let _swap = self.refresh_lock.lock().await;
        let cleared = self
            .snapshot()
            .with_user_scope_cleared(self.next_generation());
        self.snapshot_tx.send_replace(Arc::new(cleared));
    }

    // -- Wallet session ----------------------------------------------------

    /// Read accounts and chain from the wallet without prompting.
    pub async fn load_wallet_state(&self) -> Result<WalletSession, SyncError> {
        let result = async {
            let accounts = self.rpc.accounts().await?;
            let chain_id = self.rpc.chain_id().await?;
            Ok::<_, SyncError>(WalletSession {
                account: accounts.first().copied(),
                chain_id: Some(chain_id),
            })
        }
        .await;

        match result {
            Ok(session) => {
                *self.session.lock() = session;
                info!(account = ?session.account, chain_id = ?session.chain_id, "Wallet state loaded");
                Ok(session)
            }
            Err(e) => {
                warn!("Unable to read wallet state: {e}");
                self.toast(ToastKind::Error, "Unable to read wallet state.");
                Err(e)
            }
        }
    }

    /// Prompt the wallet for accounts, record the first one and refresh.
    pub async fn connect_wallet(&self) -> Result<Address, SyncError> {
        let connected = async {
            let account = self
                .rpc
                .request_accounts()
                .await?
                .first()
                .copied()
                .ok_or(SyncError::NoAccounts)?;
            let chain_id = self.rpc.chain_id().await?;
            Ok::<_, SyncError>((account, chain_id))
        }
        .await;

        let (account, chain_id) = match connected {
            Ok(pair) => pair,
            Err(e) => {
                self.report_session_error(&e, "Wallet connection failed.");
                return Err(e);
            }
        };

        *self.session.lock() = WalletSession {
            account: Some(account),
            chain_id: Some(chain_id),
        };
        info!(%account, chain_id, "Wallet connected");
        self.refresh().await?;
        Ok(account)
    }

    /// Ask the wallet to switch to the expected network, adding it first if
    /// the wallet does not know it.
    pub async fn switch_network(&self) -> Result<(), SyncError> {
        let switched = async {
            self.rpc.switch_chain(&self.settings.chain).await?;
            Ok::<_, SyncError>(self.rpc.chain_id().await?)
        }
        .await;

        match switched {
            Ok(chain_id) => {
                self.session.lock().chain_id = Some(chain_id);
                self.refresh().await?;
                Ok(())
            }
            Err(e) => {
                self.report_session_error(&e, "Network switch failed.");
                Err(e)
            }
        }
    }

    fn report_session_error(&self, error: &SyncError, fallback: &str) {
        let classified = error.classify();
        if classified.is_failure() {
            warn!("{fallback} {error}");
            self.toast(ToastKind::Error, fallback);
        } else {
            info!("Wallet request cancelled by user");
            self.toast(ToastKind::Info, classified.user_message);
        }
    }

    /// Apply a wallet event and refresh.
    pub async fn handle_event(&self, event: WalletEvent) -> Result<(), SyncError> {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(raw) => {
                    let account = Address::from_str(raw)
                        .map_err(|e| SyncError::InvalidEvent(format!("account {raw}: {e}")))?;
                    self.session.lock().account = Some(account);
                    info!(%account, "Wallet account changed");
                }
                None => self.disconnect().await,
            },
            WalletEvent::ChainChanged(hex) => {
                let chain_id = parse_quantity_u64(&hex)
                    .map_err(|e| SyncError::InvalidEvent(format!("chain {hex}: {e}")))?;
                self.session.lock().chain_id = Some(chain_id);
                info!(chain_id, "Wallet network changed");
            }
            WalletEvent::Disconnect => self.disconnect().await,
        }
        self.refresh().await.map(|_| ())
    }

    async fn disconnect(&self) {
        self.session.lock().account = None;
        self.clear_user_scope().await;
        info!("Wallet disconnected");
    }

    // -- Writes ------------------------------------------------------------

    /// Run a state-changing action for `control`.
    ///
    /// Pre-flight rejections (busy, no wallet, wrong network, bad input, not
    /// owner) make no provider call and do not refresh. Anything past them
    /// refreshes exactly once, whatever the outcome.
    pub async fn run_guarded_write(
        &self,
        control: &str,
        action: M::Action,
    ) -> Result<WriteOutcome, WriteError> {
        let Some(_flight) = FlightGuard::acquire(&self.in_flight, control) else {
            debug!(control, "Write already in flight, ignoring");
            return Err(WriteError::Busy(control.to_string()));
        };

        let session = self.session();
        let Some(account) = session.account else {
            return Err(self.reject(WriteError::NotConnected));
        };
        if session.chain_id != Some(self.settings.chain.id) {
            return Err(self.reject(WriteError::WrongNetwork {
                expected: self.settings.chain.id,
                actual: session.chain_id,
            }));
        }
        let snapshot = self.snapshot();
        if let Err(e) = self.model.validate(&action, &snapshot, account) {
            return Err(self.reject(e));
        }

        self.pending.lock().insert(
            control.to_string(),
            PendingAction::new(control, action.label(), action.args()),
        );
        info!(control, action = ?action, "Guarded write started");

        let result = self.execute(control, &action, &snapshot, account).await;

        if let Err(e) = self.refresh().await {
            warn!(control, "Refresh after write failed: {e}");
        }

        self.finish(control, &action, result)
    }

    async fn execute(
        &self,
        control: &str,
        action: &M::Action,
        snapshot: &ChainStateSnapshot,
        account: Address,
    ) -> Result<Vec<String>, WriteError> {
        let steps = self
            .model
            .plan(&self.rpc, action, snapshot, account)
            .await?;

        let mut tx_hashes = Vec::with_capacity(steps.len());
        for step in steps {
            let label = step.label;
            self.set_state(control, WriteState::AwaitingSignature);
            let tx_hash = self.rpc.send_transaction(&step.into_request(account)).await?;

            self.set_state(control, WriteState::Submitted);
            if let Some(pending) = self.pending.lock().get_mut(control) {
                pending.tx_hashes.push(tx_hash.clone());
            }
            info!(control, step = label, %tx_hash, "Transaction submitted");

            let receipt = self
                .rpc
                .wait_for_receipt(
                    &tx_hash,
                    self.settings.receipt_timeout,
                    self.settings.receipt_poll_interval,
                )
                .await?;
            if !receipt.status {
                return Err(WriteError::Reverted {
                    tx_hash,
                    step: label,
                });
            }
            debug!(control, step = label, block = receipt.block_number, "Step confirmed");
            tx_hashes.push(tx_hash);
        }
        Ok(tx_hashes)
    }

    fn set_state(&self, control: &str, next: WriteState) {
        if let Some(pending) = self.pending.lock().get_mut(control) {
            if !pending.advance(next) {
                warn!(control, from = ?pending.state, to = ?next, "Illegal write state transition");
            }
        }
    }

    fn finish(
        &self,
        control: &str,
        action: &M::Action,
        result: Result<Vec<String>, WriteError>,
    ) -> Result<WriteOutcome, WriteError> {
        let (state, toast_id, outcome) = match result {
            Ok(tx_hashes) => {
                info!(control, "Guarded write confirmed");
                let id = self.toast(ToastKind::Success, action.success_message());
                (WriteState::Confirmed, id, Ok(WriteOutcome::Confirmed { tx_hashes }))
            }
            Err(e) if e.is_cancellation() => {
                info!(control, "Guarded write cancelled by user");
                let id = self.toast(ToastKind::Info, e.classify().user_message);
                (WriteState::Cancelled, id, Ok(WriteOutcome::Cancelled))
            }
            Err(e) => {
                let classified = e.classify();
                warn!(control, kind = ?classified.kind, "Guarded write failed: {e}");
                let id = self.toast(ToastKind::Error, classified.user_message);
                let state = match e {
                    WriteError::Reverted { .. } => WriteState::Reverted,
                    _ => WriteState::Failed,
                };
                (state, id, Err(e))
            }
        };

        if let Some(pending) = self.pending.lock().get_mut(control) {
            let moved = match &outcome {
                Err(e) => pending.fail(state, e.to_string()),
                Ok(_) => pending.advance(state),
            };
            if !moved {
                // e.g. the plan failed before anything was signed
                pending.fail(WriteState::Failed, format!("ended in {state:?}"));
            }
            pending.toast_id = Some(toast_id);
        }
        outcome
    }

    /// Report a pre-flight rejection.
    fn reject(&self, error: WriteError) -> WriteError {
        let (kind, message) = match &error {
            WriteError::WrongNetwork { .. } => (
                ToastKind::Error,
                format!("Switch wallet network to {}.", self.settings.chain),
            ),
            WriteError::NotOwner => (ToastKind::Error, error.classify().user_message),
            _ => (ToastKind::Info, error.classify().user_message),
        };
        debug!("Write rejected before submission: {error}");
        self.toast(kind, message);
        error
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

impl<M: ReadModel> ChainStateSync<M> {
    /// Start polling and listening to wallet events. Both stop when the
    /// returned handle is shut down or dropped.
    pub fn attach(self: &Arc<Self>) -> SyncHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let events = self.rpc.provider().subscribe();
        let sync = Arc::clone(self);
        let task = tokio::spawn(async move {
            sync.event_loop(events, shutdown_rx).await;
        });
        info!(
            model = self.model.name(),
            interval = ?self.settings.poll_interval,
            "Sync loop attached"
        );
        SyncHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    async fn event_loop(
        self: Arc<Self>,
        mut events: broadcast::Receiver<WalletEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        debug!("Poll refresh failed: {e}");
                    }
                }
                event = events.recv(), if events_open => match event {
                    Ok(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            warn!("Wallet event handling failed: {e}");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed wallet events, refreshing");
                        let _ = self.refresh().await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("Wallet event stream closed, polling only");
                        events_open = false;
                    }
                },
                _ = shutdown.recv() => {
                    debug!("Sync loop shutting down");
                    break;
                }
            }
        }
    }
}

/// Keeps a sync loop alive. Dropping it stops the loop and releases the
/// wallet event subscription.
pub struct SyncHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
