use crate::{
    IDENT,
    asset::AssetType,
    errors::{UtxoManagerError, UtxoManagerResult},
    ledger::{DynLedgerProvider, LedgerError},
    pool::Pools,
    registry::WatchRegistry,
    snapshot::SnapshotStore,
};
use duration_string::DurationString;
use itertools::Itertools;
use std::{
    fmt::Display,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::Duration,
};
use tokio::{
    select,
    sync::Mutex as TokioMutex,
    time::{Instant, MissedTickBehavior, interval_at},
};
use triggered::{Listener, Trigger};
use utxopool_core::{debug, info, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    /// Waiting for the next tick
    Idle = 0,
    /// A reconciliation pass is in progress
    Ticking = 1,
    /// Terminal
    Stopped = 2,
}

impl From<u8> for LoopState {
    fn from(value: u8) -> Self {
        match value {
            0 => LoopState::Idle,
            1 => LoopState::Ticking,
            _ => LoopState::Stopped,
        }
    }
}

/// What a reconciliation pass did for one asset type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetOutcome {
    /// The ledger answered; `discovered` outputs were new and got pooled, `known` is the size of the baseline afterwards
    Reconciled { discovered: usize, known: usize },
    /// Nothing is watched yet, the ledger was not consulted
    NoAddresses,
    /// No ledger backend exists for the asset type yet
    Unsupported,
    /// The pass was abandoned, baseline and pool are as they were before (unless the pool was closed mid-delivery)
    Failed(String),
}

impl Display for AssetOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetOutcome::Reconciled { discovered, known } => write!(f, "{discovered} new, {known} known"),
            AssetOutcome::NoAddresses => f.write_str("no watched addresses"),
            AssetOutcome::Unsupported => f.write_str("not yet implemented"),
            AssetOutcome::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub outcomes: Vec<(AssetType, AssetOutcome)>,
}

impl TickReport {
    pub fn outcome(&self, asset: AssetType) -> Option<&AssetOutcome> {
        self.outcomes.iter().find(|(x, _)| *x == asset).map(|(_, outcome)| outcome)
    }

    /// Total number of outputs pooled by the pass
    pub fn discovered(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                AssetOutcome::Reconciled { discovered, .. } => *discovered,
                _ => 0,
            })
            .sum()
    }
}

impl Display for TickReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.outcomes.iter().map(|(asset, outcome)| format!("{asset}: {outcome}")).join(", "))
    }
}

/// Periodically brings the pools in line with the ledger.
///
/// Every tick queries the ledger for the watched addresses of each asset type, diffs the
/// answer against the known-outputs baseline and pools whatever is new. Ledger failures
/// are absorbed per asset type and only surface in logs and in the [`TickReport`].
///
/// Cancellation is observed between ticks only: a pass that has started always runs to
/// completion, including waiting on the ledger and on full pools.
pub struct ReconciliationLoop {
    ledger: DynLedgerProvider,
    registry: Arc<WatchRegistry>,
    snapshots: Arc<SnapshotStore>,
    pools: Arc<Pools>,
    tick_interval: Duration,

    state: AtomicU8,
    is_started: AtomicBool,
    // Serializes passes, whether driven by the loop or requested directly
    tick_lock: TokioMutex<()>,

    shutdown_trigger: Trigger,
    shutdown_listener: Listener,
}

impl ReconciliationLoop {
    pub fn new(
        ledger: DynLedgerProvider,
        registry: Arc<WatchRegistry>,
        snapshots: Arc<SnapshotStore>,
        pools: Arc<Pools>,
        tick_interval: Duration,
    ) -> Self {
        let (shutdown_trigger, shutdown_listener) = triggered::trigger();
        Self {
            ledger,
            registry,
            snapshots,
            pools,
            tick_interval,
            state: AtomicU8::new(LoopState::Idle as u8),
            is_started: AtomicBool::new(false),
            tick_lock: TokioMutex::new(()),
            shutdown_trigger,
            shutdown_listener,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state.load(Ordering::SeqCst).into()
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Asks the loop to stop before its next tick.
    pub fn signal_exit(&self) {
        self.shutdown_trigger.trigger();
    }

    pub fn exit_listener(&self) -> Listener {
        self.shutdown_listener.clone()
    }

    /// Runs the loop until either `cancellation` or [`Self::signal_exit`] fires.
    ///
    /// The first pass happens one full tick interval after the call. A loop can only be
    /// run once; once it returned the loop is [`LoopState::Stopped`] for good.
    pub async fn run(&self, cancellation: Listener) -> UtxoManagerResult<()> {
        if self.is_started.swap(true, Ordering::SeqCst) {
            return Err(match self.state() {
                LoopState::Stopped => UtxoManagerError::Stopped,
                _ => UtxoManagerError::AlreadyStarted,
            });
        }
        info!("[{IDENT}] reconciliation loop starting, ticking every {}", DurationString::from(self.tick_interval));

        let shutdown = self.shutdown_listener.clone();
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.is_triggered() || cancellation.is_triggered() {
                break;
            }
            select! {
                biased;
                _ = shutdown.clone() => break,
                _ = cancellation.clone() => break,
                _ = ticker.tick() => {}
            }
            if let Err(err) = self.tick().await {
                warn!("[{IDENT}] reconciliation loop interrupted: {err}");
                break;
            }
        }

        {
            let _guard = self.tick_lock.lock().await;
            self.set_state(LoopState::Stopped);
        }
        info!("[{IDENT}] reconciliation loop stopped");
        Ok(())
    }

    /// Performs a single reconciliation pass over every managed asset type, in asset type order.
    pub async fn tick(&self) -> UtxoManagerResult<TickReport> {
        let _guard = self.tick_lock.lock().await;
        if self.state() == LoopState::Stopped {
            return Err(UtxoManagerError::Stopped);
        }
        self.set_state(LoopState::Ticking);

        let mut report = TickReport::default();
        for asset in self.registry.assets() {
            let outcome = self.reconcile(asset).await.unwrap_or_else(|err| {
                warn!("[{IDENT}] {asset} reconciliation abandoned: {err}");
                AssetOutcome::Failed(err.to_string())
            });
            report.outcomes.push((asset, outcome));
        }

        self.set_state(LoopState::Idle);
        debug!("[{IDENT}] tick completed: {report}");
        Ok(report)
    }

    async fn reconcile(&self, asset: AssetType) -> UtxoManagerResult<AssetOutcome> {
        let addresses = self.registry.addresses_for(asset)?;
        if addresses.is_empty() {
            trace!("[{IDENT}] no {asset} addresses to watch");
            return Ok(AssetOutcome::NoAddresses);
        }

        let outputs = match self.ledger.fetch_unspent_outputs(asset, &addresses).await {
            Ok(outputs) => outputs,
            Err(LedgerError::NotSupported(_)) => {
                debug!("[{IDENT}] {asset} reconciliation is not yet implemented");
                return Ok(AssetOutcome::Unsupported);
            }
            Err(err) => {
                warn!("[{IDENT}] {asset} ledger query failed, keeping the previous state: {err}");
                return Ok(AssetOutcome::Failed(err.to_string()));
            }
        };

        let discovered = self.snapshots.reconcile(asset, outputs)?;
        let known = self.snapshots.len(asset)?;
        let pool = self.pools.get(asset)?;
        let count = discovered.len();
        for record in discovered {
            info!("[{IDENT}] new {asset} utxo: {record}");
            pool.deposit(record).await?;
        }
        Ok(AssetOutcome::Reconciled { discovered: count, known })
    }
}
