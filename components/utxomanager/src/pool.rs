use crate::{
    asset::AssetType,
    errors::{UtxoManagerError, UtxoManagerResult},
    model::UtxoRecord,
};
use async_channel::{Receiver, Sender, bounded};
use std::collections::HashMap;

/// Receiving end of a pool. Clones share the same queue: every record goes to exactly one receiver.
pub type UtxoReceiver = Receiver<UtxoRecord>;

/// Bounded FIFO of spendable outputs of one asset type.
///
/// Depositing into a full pool waits for a withdrawal and withdrawing from an empty
/// pool waits for a deposit. Records are neither validated nor deduplicated here.
#[derive(Clone, Debug)]
pub struct UtxoPool {
    asset: AssetType,
    sender: Sender<UtxoRecord>,
    receiver: Receiver<UtxoRecord>,
}

impl UtxoPool {
    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn new(asset: AssetType, capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { asset, sender, receiver }
    }

    pub fn asset(&self) -> AssetType {
        self.asset
    }

    pub async fn deposit(&self, record: UtxoRecord) -> UtxoManagerResult<()> {
        self.sender.send(record).await.map_err(|_| UtxoManagerError::PoolClosed(self.asset))
    }

    pub async fn withdraw(&self) -> UtxoManagerResult<UtxoRecord> {
        self.receiver.recv().await.map_err(|_| UtxoManagerError::PoolClosed(self.asset))
    }

    /// Takes the head of the queue if one is available right away.
    pub fn try_withdraw(&self) -> Option<UtxoRecord> {
        self.receiver.try_recv().ok()
    }

    pub fn receiver(&self) -> UtxoReceiver {
        self.receiver.clone()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.receiver.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.receiver.capacity().unwrap_or(usize::MAX)
    }

    /// Rejects any further deposit and wakes every waiting party. Queued records
    /// can still be withdrawn until the pool runs dry.
    pub fn close(&self) -> bool {
        self.receiver.close()
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

/// One [`UtxoPool`] per managed asset type, all sharing the same capacity.
#[derive(Debug)]
pub struct Pools {
    pools: HashMap<AssetType, UtxoPool>,
}

impl Pools {
    pub fn new(assets: impl IntoIterator<Item = AssetType>, capacity: usize) -> Self {
        Self { pools: assets.into_iter().map(|asset| (asset, UtxoPool::new(asset, capacity))).collect() }
    }

    pub fn get(&self, asset: AssetType) -> UtxoManagerResult<&UtxoPool> {
        self.pools.get(&asset).ok_or(UtxoManagerError::UnknownAssetType(asset))
    }

    pub fn close_all(&self) {
        self.pools.values().for_each(|pool| {
            pool.close();
        });
    }
}
