//! Interfaces of the collaborators the manager consumes: the ledger which reports
//! unspent outputs, and the wallet which supplies the initial watch addresses.

use crate::{
    asset::AssetType,
    model::{AddressEntry, UtxoRecord},
};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// No ledger backend exists for this asset type yet
    #[error("{0} ledger queries are not supported yet")]
    NotSupported(AssetType),

    #[error("ledger request failed: {0}")]
    Request(String),

    #[error("malformed ledger response: {0}")]
    Parse(String),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Source of truth for the unspent outputs of a set of addresses.
///
/// Implementations are expected to be network-backed and may fail. A failure must leave
/// no trace: the manager only acts on a complete, successful result.
#[async_trait]
pub trait LedgerProvider: Send + Sync {
    async fn fetch_unspent_outputs(&self, asset: AssetType, addresses: &[String]) -> LedgerResult<Vec<UtxoRecord>>;
}

pub type DynLedgerProvider = Arc<dyn LedgerProvider>;

/// Routes each asset type to its own ledger backend.
///
/// Asset types without a registered backend answer [`LedgerError::NotSupported`].
#[derive(Clone, Default)]
pub struct AssetLedgers {
    providers: HashMap<AssetType, DynLedgerProvider>,
}

impl AssetLedgers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, asset: AssetType, provider: DynLedgerProvider) -> Self {
        self.providers.insert(asset, provider);
        self
    }

    pub fn supports(&self, asset: AssetType) -> bool {
        self.providers.contains_key(&asset)
    }
}

#[async_trait]
impl LedgerProvider for AssetLedgers {
    async fn fetch_unspent_outputs(&self, asset: AssetType, addresses: &[String]) -> LedgerResult<Vec<UtxoRecord>> {
        match self.providers.get(&asset) {
            Some(provider) => provider.fetch_unspent_outputs(asset, addresses).await,
            None => Err(LedgerError::NotSupported(asset)),
        }
    }
}

/// The wallet side: which asset types it holds and which addresses belong to each.
pub trait AddressSource: Send + Sync {
    fn asset_types(&self) -> Vec<AssetType>;
    fn address_entries(&self, asset: AssetType) -> Vec<AddressEntry>;
}
