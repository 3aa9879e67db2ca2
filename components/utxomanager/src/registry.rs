use crate::{
    asset::AssetType,
    errors::{UtxoManagerError, UtxoManagerResult},
};
use itertools::Itertools;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Addresses watched for each managed asset type.
///
/// The set of asset types is fixed at construction. Address lists are append-only;
/// duplicates are kept since reconciliation works on output identity, not addresses.
#[derive(Debug)]
pub struct WatchRegistry {
    addresses: HashMap<AssetType, Mutex<Vec<String>>>,
}

impl WatchRegistry {
    pub fn new(assets: impl IntoIterator<Item = AssetType>) -> Self {
        Self { addresses: assets.into_iter().map(|asset| (asset, Mutex::new(vec![]))).collect() }
    }

    pub fn assets(&self) -> Vec<AssetType> {
        self.addresses.keys().copied().sorted().collect()
    }

    pub fn contains(&self, asset: AssetType) -> bool {
        self.addresses.contains_key(&asset)
    }

    pub fn add(&self, asset: AssetType, address: String) -> UtxoManagerResult<()> {
        self.list(asset)?.lock().push(address);
        Ok(())
    }

    /// A copy of the current list, so the caller never holds the lock across a ledger query.
    pub fn addresses_for(&self, asset: AssetType) -> UtxoManagerResult<Vec<String>> {
        Ok(self.list(asset)?.lock().clone())
    }

    fn list(&self, asset: AssetType) -> UtxoManagerResult<&Mutex<Vec<String>>> {
        self.addresses.get(&asset).ok_or(UtxoManagerError::UnknownAssetType(asset))
    }
}
