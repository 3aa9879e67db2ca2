use crate::{
    asset::AssetType,
    config::SnapshotPolicy,
    errors::{UtxoManagerError, UtxoManagerResult},
    model::{UtxoKey, UtxoRecord},
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Outputs keyed by identity
pub type Snapshot = HashMap<UtxoKey, UtxoRecord>;

/// Indexes a ledger result by output identity. When the same output is reported more than
/// once, the last occurrence wins.
pub fn build_snapshot(outputs: impl IntoIterator<Item = UtxoRecord>) -> Snapshot {
    outputs.into_iter().map(|record| (record.key(), record)).collect()
}

/// Outputs of `fresh` which are not part of `known`, in no particular order.
pub fn diff(known: &Snapshot, fresh: &Snapshot) -> Vec<UtxoRecord> {
    fresh.iter().filter(|(key, _)| !known.contains_key(*key)).map(|(_, record)| record.clone()).collect()
}

/// Outputs known to the pool as of the last successful reconciliation, per asset type.
///
/// This is the baseline fresh ledger results are diffed against: an output is delivered
/// to the pool only when it is absent from the baseline.
#[derive(Debug)]
pub struct SnapshotStore {
    snapshots: HashMap<AssetType, Mutex<Snapshot>>,
    policy: SnapshotPolicy,
}

impl SnapshotStore {
    pub fn new(assets: impl IntoIterator<Item = AssetType>, policy: SnapshotPolicy) -> Self {
        Self { snapshots: assets.into_iter().map(|asset| (asset, Mutex::new(Snapshot::new()))).collect(), policy }
    }

    pub fn policy(&self) -> SnapshotPolicy {
        self.policy
    }

    /// Folds a successful ledger result into the baseline of `asset` and returns the
    /// outputs it did not contain.
    ///
    /// Diffing and updating happen under one lock acquisition, so concurrent readers
    /// observe either the previous or the new baseline.
    pub fn reconcile(&self, asset: AssetType, outputs: Vec<UtxoRecord>) -> UtxoManagerResult<Vec<UtxoRecord>> {
        let fresh = build_snapshot(outputs);
        let mut known = self.snapshot(asset)?.lock();
        let discovered = diff(&known, &fresh);
        match self.policy {
            SnapshotPolicy::Replace => *known = fresh,
            SnapshotPolicy::Merge => known.extend(fresh),
        }
        Ok(discovered)
    }

    pub fn known(&self, asset: AssetType) -> UtxoManagerResult<Snapshot> {
        Ok(self.snapshot(asset)?.lock().clone())
    }

    pub fn len(&self, asset: AssetType) -> UtxoManagerResult<usize> {
        Ok(self.snapshot(asset)?.lock().len())
    }

    fn snapshot(&self, asset: AssetType) -> UtxoManagerResult<&Mutex<Snapshot>> {
        self.snapshots.get(&asset).ok_or(UtxoManagerError::UnknownAssetType(asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn utxo(txid: &str, index: u32, amount: u64) -> UtxoRecord {
        UtxoRecord::new(txid, index, "addr", amount)
    }

    fn keys(records: &[UtxoRecord]) -> HashSet<UtxoKey> {
        records.iter().map(|x| x.key()).collect()
    }

    #[test]
    fn test_diff_yields_only_unknown_outputs() {
        let a = utxo("tx1", 0, 10);
        let b = utxo("tx2", 1, 20);
        let known = build_snapshot([a.clone()]);
        let fresh = build_snapshot([a, b.clone()]);
        assert_eq!(diff(&known, &fresh), vec![b]);
        assert!(diff(&fresh, &fresh).is_empty());
        assert!(diff(&fresh, &Snapshot::new()).is_empty());
    }

    #[test]
    fn test_duplicate_keys_last_write_wins() {
        let snapshot = build_snapshot([utxo("tx1", 0, 10), utxo("tx2", 0, 5), utxo("tx1", 0, 99)]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["tx1:0"].amount, 99);
    }

    #[test]
    fn test_replace_policy() {
        let store = SnapshotStore::new([AssetType::Bitcoin], SnapshotPolicy::Replace);
        let (a, b, c) = (utxo("tx1", 0, 10), utxo("tx2", 1, 20), utxo("tx3", 0, 30));

        let discovered = store.reconcile(AssetType::Bitcoin, vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(keys(&discovered), keys(&[a.clone(), b.clone()]));

        // unchanged ledger, nothing new
        assert!(store.reconcile(AssetType::Bitcoin, vec![b.clone(), a.clone()]).unwrap().is_empty());

        // a is spent elsewhere, c arrives
        assert_eq!(store.reconcile(AssetType::Bitcoin, vec![b.clone(), c.clone()]).unwrap(), vec![c.clone()]);
        assert_eq!(store.known(AssetType::Bitcoin).unwrap(), build_snapshot([b.clone(), c.clone()]));

        // an empty result empties the baseline without reporting anything
        assert!(store.reconcile(AssetType::Bitcoin, vec![]).unwrap().is_empty());
        assert_eq!(store.len(AssetType::Bitcoin).unwrap(), 0);

        // and a reappearing output is new again
        assert_eq!(store.reconcile(AssetType::Bitcoin, vec![a.clone()]).unwrap(), vec![a]);
    }

    #[test]
    fn test_merge_policy() {
        let store = SnapshotStore::new([AssetType::Bitcoin], SnapshotPolicy::Merge);
        let (a, b) = (utxo("tx1", 0, 10), utxo("tx2", 1, 20));

        assert_eq!(store.reconcile(AssetType::Bitcoin, vec![a.clone()]).unwrap(), vec![a.clone()]);
        assert!(store.reconcile(AssetType::Bitcoin, vec![]).unwrap().is_empty());
        assert_eq!(store.known(AssetType::Bitcoin).unwrap(), build_snapshot([a.clone()]));

        // a is remembered, so it is not delivered twice
        let updated = utxo("tx1", 0, 11);
        assert_eq!(store.reconcile(AssetType::Bitcoin, vec![updated.clone(), b.clone()]).unwrap(), vec![b.clone()]);
        assert_eq!(store.known(AssetType::Bitcoin).unwrap(), build_snapshot([updated, b]));
    }

    #[test]
    fn test_unknown_asset_type() {
        let store = SnapshotStore::new([AssetType::Bitcoin], SnapshotPolicy::Replace);
        assert_eq!(
            store.reconcile(AssetType::Skycoin, vec![utxo("tx1", 0, 1)]),
            Err(UtxoManagerError::UnknownAssetType(AssetType::Skycoin))
        );
        assert_eq!(store.known(AssetType::Skycoin), Err(UtxoManagerError::UnknownAssetType(AssetType::Skycoin)));
    }
}
