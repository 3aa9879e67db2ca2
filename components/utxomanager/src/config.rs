use crate::{
    asset::AssetType,
    errors::{UtxoManagerError, UtxoManagerResult},
};
use duration_string::DurationString;
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_POOL_CAPACITY: usize = 100;

/// How a successful ledger snapshot is folded into the known-outputs baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotPolicy {
    /// The baseline becomes exactly the latest snapshot. Outputs missing from it
    /// are forgotten and delivered again should they reappear.
    #[default]
    Replace,
    /// The latest snapshot is added on top of the baseline. Outputs are never forgotten.
    Merge,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Pause between two reconciliation passes, e.g. `"10s"` or `"1m"`
    #[serde_as(as = "DisplayFromStr")]
    pub tick_interval: DurationString,
    /// Maximum number of queued outputs per asset type
    pub pool_capacity: usize,
    /// Asset types the manager keeps a registry, snapshot and pool for
    pub assets: Vec<AssetType>,
    pub snapshot_policy: SnapshotPolicy,
}

impl Config {
    pub fn new(tick_interval: Duration, pool_capacity: usize) -> Self {
        Self { tick_interval: tick_interval.into(), pool_capacity, ..Default::default() }
    }

    pub fn with_assets(mut self, assets: impl IntoIterator<Item = AssetType>) -> Self {
        self.assets = assets.into_iter().collect();
        self
    }

    pub fn with_snapshot_policy(mut self, snapshot_policy: SnapshotPolicy) -> Self {
        self.snapshot_policy = snapshot_policy;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval.into()
    }

    /// Parses and validates a TOML configuration. Missing keys take their default value.
    pub fn from_toml(toml: &str) -> UtxoManagerResult<Self> {
        let config = toml::from_str::<Config>(toml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> UtxoManagerResult<()> {
        if self.tick_interval().is_zero() {
            return Err(UtxoManagerError::Config("tick-interval must be greater than zero".to_string()));
        }
        if self.pool_capacity == 0 {
            return Err(UtxoManagerError::Config("pool-capacity must be greater than zero".to_string()));
        }
        if self.assets.is_empty() {
            return Err(UtxoManagerError::Config("at least one asset type must be managed".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL.into(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            assets: AssetType::ALL.to_vec(),
            snapshot_policy: SnapshotPolicy::default(),
        }
    }
}
