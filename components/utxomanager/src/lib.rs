//! Live pools of spendable outputs, one per asset type, kept in sync with the ledger.
//!
//! The [`UtxoManager`] watches a set of addresses per asset type. A background
//! [`ReconciliationLoop`] periodically asks the ledger for their unspent outputs and pools
//! every output it has not seen before. Consumers withdraw outputs from the pools and may
//! put them back when they end up not spending them.

pub mod asset;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod model;
pub mod pool;
pub mod reconcile;
pub mod registry;
pub mod snapshot;
pub mod test_helpers;

pub use asset::AssetType;
pub use config::{Config, SnapshotPolicy};
pub use errors::{UtxoManagerError, UtxoManagerResult};
pub use ledger::{AddressSource, AssetLedgers, DynLedgerProvider, LedgerError, LedgerProvider, LedgerResult};
pub use model::{AddressEntry, UtxoRecord};
pub use pool::UtxoReceiver;
pub use reconcile::{AssetOutcome, LoopState, ReconciliationLoop, TickReport};

use crate::{
    pool::Pools,
    registry::WatchRegistry,
    snapshot::{Snapshot, SnapshotStore},
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use triggered::Listener;
use utxopool_core::{
    info,
    task::service::{AsyncService, AsyncServiceError, AsyncServiceFuture},
};

pub const IDENT: &str = "UtxoManager";
const SERVICE: &str = "utxo-manager";

/// Entry point to the pools.
///
/// Construct one per process, share it as an `Arc` with every component needing outputs,
/// and run [`UtxoManager::start`] (or [`UtxoManager::spawn`]) in a dedicated task.
pub struct UtxoManager {
    config: Config,
    registry: Arc<WatchRegistry>,
    snapshots: Arc<SnapshotStore>,
    pools: Arc<Pools>,
    reconciler: Arc<ReconciliationLoop>,
}

impl UtxoManager {
    /// Creates the registries and pools of every configured asset type and seeds the
    /// registries with the addresses `address_source` holds.
    pub fn new(config: Config, ledger: DynLedgerProvider, address_source: &dyn AddressSource) -> UtxoManagerResult<Arc<Self>> {
        config.validate()?;

        let assets = config.assets.clone();
        let registry = Arc::new(WatchRegistry::new(assets.iter().copied()));
        let snapshots = Arc::new(SnapshotStore::new(assets.iter().copied(), config.snapshot_policy));
        let pools = Arc::new(Pools::new(assets.iter().copied(), config.pool_capacity));
        let reconciler = Arc::new(ReconciliationLoop::new(
            ledger,
            registry.clone(),
            snapshots.clone(),
            pools.clone(),
            config.tick_interval(),
        ));
        let manager = Arc::new(Self { config, registry, snapshots, pools, reconciler });

        for asset in address_source.asset_types() {
            for entry in address_source.address_entries(asset) {
                manager.add_watch_address(asset, entry.address)?;
            }
        }
        Ok(manager)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn assets(&self) -> Vec<AssetType> {
        self.registry.assets()
    }

    /// Runs reconciliation until `cancellation` fires or [`Self::shutdown`] is called.
    ///
    /// A manager reconciles at most once over its lifetime: calling this again fails with
    /// [`UtxoManagerError::AlreadyStarted`] while running and [`UtxoManagerError::Stopped`] afterwards.
    pub async fn start(&self, cancellation: Listener) -> UtxoManagerResult<()> {
        info!("[{IDENT}] starting with {} pools of capacity {}", self.config.assets.len(), self.config.pool_capacity);
        self.reconciler.run(cancellation).await
    }

    pub fn spawn(self: &Arc<Self>, cancellation: Listener) -> JoinHandle<UtxoManagerResult<()>> {
        let manager = self.clone();
        tokio::spawn(async move { UtxoManager::start(&manager, cancellation).await })
    }

    /// Runs a single reconciliation pass right away, independently of the tick schedule.
    pub async fn tick(&self) -> UtxoManagerResult<TickReport> {
        self.reconciler.tick().await
    }

    pub fn state(&self) -> LoopState {
        self.reconciler.state()
    }

    /// Returns the receiving end of the `asset` pool.
    pub fn get_utxo(&self, asset: AssetType) -> UtxoManagerResult<UtxoReceiver> {
        Ok(self.pools.get(asset)?.receiver())
    }

    /// Takes the oldest pooled output of `asset`, waiting for one if the pool is empty.
    pub async fn withdraw(&self, asset: AssetType) -> UtxoManagerResult<UtxoRecord> {
        self.pools.get(asset)?.withdraw().await
    }

    pub fn try_withdraw(&self, asset: AssetType) -> UtxoManagerResult<Option<UtxoRecord>> {
        Ok(self.pools.get(asset)?.try_withdraw())
    }

    /// Returns an output to the `asset` pool, e.g. after a transaction could not be built.
    /// Waits for a free slot if the pool is full.
    pub async fn put_utxo(&self, asset: AssetType, record: UtxoRecord) -> UtxoManagerResult<()> {
        let pool = self.pools.get(asset)?;
        info!("[{IDENT}] {asset} utxo put back: {record}");
        pool.deposit(record).await
    }

    pub fn add_watch_address(&self, asset: AssetType, address: impl Into<String>) -> UtxoManagerResult<()> {
        let address = address.into();
        info!("[{IDENT}] watch {asset} address: {address}");
        self.registry.add(asset, address)
    }

    pub fn addresses_for(&self, asset: AssetType) -> UtxoManagerResult<Vec<String>> {
        self.registry.addresses_for(asset)
    }

    /// Outputs known as of the last successful reconciliation of `asset`
    pub fn known_utxos(&self, asset: AssetType) -> UtxoManagerResult<Snapshot> {
        self.snapshots.known(asset)
    }

    pub fn pool_len(&self, asset: AssetType) -> UtxoManagerResult<usize> {
        Ok(self.pools.get(asset)?.len())
    }

    /// Stops reconciliation before its next tick and closes every pool. Parties waiting
    /// on a pool are released with [`UtxoManagerError::PoolClosed`].
    pub fn shutdown(&self) {
        info!("[{IDENT}] shutting down");
        self.reconciler.signal_exit();
        self.pools.close_all();
    }
}

impl AsyncService for UtxoManager {
    fn ident(self: Arc<Self>) -> &'static str {
        SERVICE
    }

    fn start(self: Arc<Self>) -> AsyncServiceFuture {
        Box::pin(async move {
            let exit = self.reconciler.exit_listener();
            UtxoManager::start(&self, exit).await.map_err(|err| AsyncServiceError::Service(err.to_string()))
        })
    }

    fn signal_exit(self: Arc<Self>) {
        self.reconciler.signal_exit();
    }

    fn stop(self: Arc<Self>) -> AsyncServiceFuture {
        Box::pin(async move {
            self.shutdown();
            Ok(())
        })
    }
}
