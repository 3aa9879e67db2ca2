//! In-memory collaborators for exercising the manager without a ledger backend or a wallet.

use crate::{
    asset::AssetType,
    ledger::{AddressSource, LedgerError, LedgerProvider, LedgerResult},
    model::{AddressEntry, UtxoRecord},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::HashMap, time::Duration};

/// Scriptable [`LedgerProvider`]. Each asset type answers with its last configured
/// response, or [`LedgerError::NotSupported`] when none was configured.
#[derive(Debug, Default)]
pub struct LedgerMock {
    responses: Mutex<HashMap<AssetType, LedgerResult<Vec<UtxoRecord>>>>,
    calls: Mutex<HashMap<AssetType, Vec<Vec<String>>>>,
    latency: Mutex<Option<Duration>>,
}

impl LedgerMock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outputs(&self, asset: AssetType, outputs: Vec<UtxoRecord>) {
        self.responses.lock().insert(asset, Ok(outputs));
    }

    pub fn set_error(&self, asset: AssetType, error: LedgerError) {
        self.responses.lock().insert(asset, Err(error));
    }

    /// Delays every subsequent answer, as a slow network would
    pub fn set_latency(&self, latency: Duration) {
        self.latency.lock().replace(latency);
    }

    /// Address lists received so far for `asset`, oldest first.
    pub fn calls(&self, asset: AssetType) -> Vec<Vec<String>> {
        self.calls.lock().get(&asset).cloned().unwrap_or_default()
    }

    pub fn call_count(&self, asset: AssetType) -> usize {
        self.calls.lock().get(&asset).map_or(0, |calls| calls.len())
    }
}

#[async_trait]
impl LedgerProvider for LedgerMock {
    async fn fetch_unspent_outputs(&self, asset: AssetType, addresses: &[String]) -> LedgerResult<Vec<UtxoRecord>> {
        self.calls.lock().entry(asset).or_default().push(addresses.to_vec());
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.responses.lock().get(&asset).cloned().unwrap_or(Err(LedgerError::NotSupported(asset)))
    }
}

/// Fixed [`AddressSource`].
#[derive(Clone, Debug, Default)]
pub struct StaticAddressSource {
    entries: HashMap<AssetType, Vec<AddressEntry>>,
}

impl StaticAddressSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addresses(mut self, asset: AssetType, addresses: &[&str]) -> Self {
        self.entries.entry(asset).or_default().extend(addresses.iter().map(|address| AddressEntry::new(*address)));
        self
    }
}

impl AddressSource for StaticAddressSource {
    fn asset_types(&self) -> Vec<AssetType> {
        let mut assets = self.entries.keys().copied().collect::<Vec<_>>();
        assets.sort();
        assets
    }

    fn address_entries(&self, asset: AssetType) -> Vec<AddressEntry> {
        self.entries.get(&asset).cloned().unwrap_or_default()
    }
}
