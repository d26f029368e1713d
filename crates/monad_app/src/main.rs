use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use monad_chain::{HttpProvider, RpcClient, RpcConfigStore, WalletEvent};
use monad_core::SyncConfig;
use monad_core::logging;
use monad_sync::{
    ChainStateSnapshot, ChainStateSync, CounterModel, ReadModel, StakingDashboard,
    SyncSettings, TransactionLedger,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config from the path given as the first argument, or the default location.
fn load_config() -> Result<SyncConfig> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            let mut config = SyncConfig::load_from_path(&path)?;
            config.apply_env_overrides();
            config
        }
        None => SyncConfig::load()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_provider(config: &SyncConfig) -> Result<Arc<HttpProvider>> {
    let mut store = RpcConfigStore::with_defaults();
    store
        .set_custom_rpc(config.chain_id, config.rpc_url.clone())
        .map_err(anyhow::Error::msg)?;
    store.set_transport(
        config.chain_id,
        config.rpc_timeout(),
        config.rpc_retry_count,
        config.rpc_retry_delay(),
    );
    let rpc = store
        .get_rpc(config.chain_id)
        .context("No RPC endpoint configured")?;
    let provider = HttpProvider::new(rpc).context("Failed to build RPC provider")?;
    info!(url = provider.url(), chain_id = config.chain_id, "RPC provider ready");
    Ok(Arc::new(provider))
}

async fn log_snapshots(mut rx: watch::Receiver<Arc<ChainStateSnapshot>>) {
    while rx.changed().await.is_ok() {
        let snapshot = Arc::clone(&rx.borrow_and_update());
        let views = snapshot
            .values()
            .map(|(name, value)| format!("{name}={}", value.display_truncated(4)))
            .collect::<Vec<_>>()
            .join(" ");
        info!(
            generation = snapshot.generation(),
            account = ?snapshot.account(),
            chain_id = ?snapshot.chain_id(),
            "{views}"
        );
    }
}

fn log_ledger() {
    let path = match SyncConfig::ledger_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("Ledger path unavailable: {e:#}");
            return;
        }
    };
    match TransactionLedger::load_from_file(&path) {
        Ok(ledger) if !ledger.is_empty() => {
            for (rank, entry) in ledger.leaderboard(Some(5)).iter().enumerate() {
                info!(
                    rank = rank + 1,
                    wallet = %entry.wallet_address,
                    won_wei = %entry.total_won_wei,
                    scratches = entry.scratch_count,
                    "Leaderboard"
                );
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to load ledger: {e:#}"),
    }
}

async fn run<M: ReadModel>(
    model: M,
    provider: Arc<HttpProvider>,
    config: &SyncConfig,
) -> Result<()> {
    let sync = Arc::new(ChainStateSync::new(
        model,
        RpcClient::new(provider.clone()),
        SyncSettings::from_config(config),
    ));
    info!(model = sync.model().name(), "Read model selected");

    if let Err(e) = sync.load_wallet_state().await {
        warn!("Continuing without wallet state: {e}");
    }
    let logger = tokio::spawn(log_snapshots(sync.subscribe()));
    let handle = sync.attach();

    // Watch-only session: no signer, the account just scopes user views.
    if let Some(account) = config.wallet_account.as_deref() {
        provider
            .events()
            .emit(WalletEvent::AccountsChanged(vec![account.trim().to_string()]));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    handle.shutdown().await;
    logger.abort();
    for toast in sync.toasts() {
        info!(kind = ?toast.kind, "{}", toast.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = logging::init_logging(&config.log_level)?;
    info!("Starting monad-sync v{VERSION}");

    log_ledger();
    let provider = build_provider(&config)?;

    let result = if config.has_staking() {
        run(StakingDashboard::from_config(&config)?, provider, &config).await
    } else {
        run(CounterModel::from_config(&config)?, provider, &config).await
    };
    if let Err(e) = &result {
        error!("monad-sync exited with error: {e:#}");
    }
    result
}
