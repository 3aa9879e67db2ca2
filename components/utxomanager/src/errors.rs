use crate::{IDENT, asset::AssetType};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UtxoManagerError {
    #[error("[{IDENT}]: asset type {0} is not managed")]
    UnknownAssetType(AssetType),

    #[error("[{IDENT}]: the {0} pool is closed")]
    PoolClosed(AssetType),

    #[error("[{IDENT}]: reconciliation is already running")]
    AlreadyStarted,

    #[error("[{IDENT}]: reconciliation has stopped, a new manager must be constructed")]
    Stopped,

    #[error("[{IDENT}]: invalid configuration: {0}")]
    Config(String),
}

impl From<toml::de::Error> for UtxoManagerError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type UtxoManagerResult<T> = std::result::Result<T, UtxoManagerError>;
