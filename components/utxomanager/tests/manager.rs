use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::time::{sleep, timeout};
use utxopool_core::task::service::AsyncService;
use utxopool_utxomanager::{
    AssetLedgers, AssetOutcome, AssetType, Config, LedgerError, LoopState, SnapshotPolicy, UtxoManager, UtxoManagerError, UtxoRecord,
    test_helpers::{LedgerMock, StaticAddressSource},
};

const PATIENCE: Duration = Duration::from_millis(50);
const DEADLINE: Duration = Duration::from_secs(5);

fn utxo(txid: &str, index: u32) -> UtxoRecord {
    UtxoRecord::new(txid, index, "1BitcoinAddr", 50_000)
}

fn manager_with(config: Config, source: StaticAddressSource) -> (Arc<UtxoManager>, Arc<LedgerMock>) {
    utxopool_core::log::try_init_logger("info,utxopool_utxomanager=debug");
    let ledger = Arc::new(LedgerMock::new());
    let manager = UtxoManager::new(config, ledger.clone(), &source).unwrap();
    (manager, ledger)
}

#[tokio::test]
async fn test_construction_seeds_watch_addresses() {
    let source = StaticAddressSource::new()
        .with_addresses(AssetType::Bitcoin, &["btc-1", "btc-2"])
        .with_addresses(AssetType::Skycoin, &["sky-1"]);
    let (manager, _) = manager_with(Config::default(), source);

    assert_eq!(manager.assets(), vec![AssetType::Bitcoin, AssetType::Skycoin]);
    assert_eq!(manager.addresses_for(AssetType::Bitcoin).unwrap(), vec!["btc-1", "btc-2"]);
    assert_eq!(manager.addresses_for(AssetType::Skycoin).unwrap(), vec!["sky-1"]);
    assert_eq!(manager.state(), LoopState::Idle);

    manager.add_watch_address(AssetType::Bitcoin, "btc-3").unwrap();
    assert_eq!(manager.addresses_for(AssetType::Bitcoin).unwrap(), vec!["btc-1", "btc-2", "btc-3"]);
}

#[tokio::test]
async fn test_construction_rejects_unmanaged_and_invalid() {
    let ledger = Arc::new(LedgerMock::new());
    let source = StaticAddressSource::new().with_addresses(AssetType::Skycoin, &["sky-1"]);
    let config = Config::default().with_assets([AssetType::Bitcoin]);
    assert_eq!(
        UtxoManager::new(config, ledger.clone(), &source).err(),
        Some(UtxoManagerError::UnknownAssetType(AssetType::Skycoin))
    );

    let config = Config::new(Duration::from_secs(1), 0);
    assert!(matches!(UtxoManager::new(config, ledger, &StaticAddressSource::new()), Err(UtxoManagerError::Config(_))));
}

#[tokio::test]
async fn test_unknown_asset_type_rejection() {
    let config = Config::default().with_assets([AssetType::Bitcoin]);
    let (manager, _) = manager_with(config, StaticAddressSource::new());
    let unknown = Err::<(), _>(UtxoManagerError::UnknownAssetType(AssetType::Skycoin));

    assert_eq!(manager.get_utxo(AssetType::Skycoin).map(|_| ()), unknown);
    assert_eq!(manager.withdraw(AssetType::Skycoin).await.map(|_| ()), unknown);
    assert_eq!(manager.try_withdraw(AssetType::Skycoin).map(|_| ()), unknown);
    assert_eq!(manager.put_utxo(AssetType::Skycoin, utxo("tx1", 0)).await, unknown);
    assert_eq!(manager.add_watch_address(AssetType::Skycoin, "sky-1"), unknown);
    assert_eq!(manager.known_utxos(AssetType::Skycoin).map(|_| ()), unknown);

    // nothing was created on the fly
    assert_eq!(manager.assets(), vec![AssetType::Bitcoin]);
    assert_eq!(manager.tick().await.unwrap().outcomes.len(), 1);
}

#[tokio::test]
async fn test_put_back_and_withdraw_fifo() {
    let (manager, _) = manager_with(Config::new(Duration::from_secs(60), 4), StaticAddressSource::new());

    manager.put_utxo(AssetType::Bitcoin, utxo("x", 0)).await.unwrap();
    manager.put_utxo(AssetType::Bitcoin, utxo("y", 0)).await.unwrap();
    assert_eq!(manager.pool_len(AssetType::Bitcoin).unwrap(), 2);
    assert_eq!(manager.pool_len(AssetType::Skycoin).unwrap(), 0);

    let receiver = manager.get_utxo(AssetType::Bitcoin).unwrap();
    assert_eq!(receiver.recv().await.unwrap(), utxo("x", 0));
    assert_eq!(manager.withdraw(AssetType::Bitcoin).await.unwrap(), utxo("y", 0));
    assert_eq!(manager.try_withdraw(AssetType::Bitcoin).unwrap(), None);

    // put back outputs are not checked against the ledger
    manager.put_utxo(AssetType::Bitcoin, utxo("never-seen", 7)).await.unwrap();
    assert_eq!(manager.try_withdraw(AssetType::Bitcoin).unwrap(), Some(utxo("never-seen", 7)));
}

#[tokio::test]
async fn test_put_back_waits_when_full() {
    let (manager, _) = manager_with(Config::new(Duration::from_secs(60), 1), StaticAddressSource::new());
    manager.put_utxo(AssetType::Skycoin, utxo("x", 0)).await.unwrap();
    assert!(timeout(PATIENCE, manager.put_utxo(AssetType::Skycoin, utxo("y", 0))).await.is_err());

    let producer = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.put_utxo(AssetType::Skycoin, utxo("y", 0)).await })
    };
    sleep(PATIENCE).await;
    assert!(!producer.is_finished());
    assert_eq!(manager.pool_len(AssetType::Skycoin).unwrap(), 1);

    assert_eq!(manager.withdraw(AssetType::Skycoin).await.unwrap(), utxo("x", 0));
    producer.await.unwrap().unwrap();
    assert_eq!(manager.withdraw(AssetType::Skycoin).await.unwrap(), utxo("y", 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_reconciliation() {
    let source = StaticAddressSource::new().with_addresses(AssetType::Bitcoin, &["btc-1"]);
    let (manager, ledger) = manager_with(Config::new(Duration::from_millis(10), 8), source);
    ledger.set_outputs(AssetType::Bitcoin, vec![utxo("tx1", 0), utxo("tx1", 1)]);

    let (cancel, cancellation) = triggered::trigger();
    let task = manager.spawn(cancellation);

    let receiver = manager.get_utxo(AssetType::Bitcoin).unwrap();
    let mut seen = HashSet::new();
    for _ in 0..2 {
        seen.insert(timeout(DEADLINE, receiver.recv()).await.unwrap().unwrap().key());
    }
    assert_eq!(seen, HashSet::from(["tx1:0".to_string(), "tx1:1".to_string()]));

    // an address added while running is part of later ledger queries
    manager.add_watch_address(AssetType::Bitcoin, "btc-2").unwrap();
    ledger.set_outputs(AssetType::Bitcoin, vec![utxo("tx1", 0), utxo("tx1", 1), UtxoRecord::new("tx2", 0, "btc-2", 1)]);
    assert_eq!(timeout(DEADLINE, receiver.recv()).await.unwrap().unwrap().key(), "tx2:0");
    assert!(ledger.calls(AssetType::Bitcoin).iter().any(|addresses| addresses == &vec!["btc-1".to_string(), "btc-2".to_string()]));

    // nothing is delivered twice while the ledger is unchanged
    sleep(PATIENCE).await;
    assert_eq!(manager.pool_len(AssetType::Bitcoin).unwrap(), 0);
    assert_eq!(manager.known_utxos(AssetType::Bitcoin).unwrap().len(), 3);

    cancel.trigger();
    timeout(DEADLINE, task).await.unwrap().unwrap().unwrap();
    assert_eq!(manager.state(), LoopState::Stopped);

    // a stopped manager cannot be restarted
    let (_cancel, cancellation) = triggered::trigger();
    assert_eq!(UtxoManager::start(&manager, cancellation).await, Err(UtxoManagerError::Stopped));
}

#[tokio::test]
async fn test_partial_asset_support() {
    let bitcoin = Arc::new(LedgerMock::new());
    bitcoin.set_outputs(AssetType::Bitcoin, vec![utxo("tx1", 0)]);
    let ledgers = AssetLedgers::new().with_provider(AssetType::Bitcoin, bitcoin.clone());
    let source = StaticAddressSource::new().with_addresses(AssetType::Bitcoin, &["btc-1"]).with_addresses(AssetType::Skycoin, &["sky-1"]);
    let manager = UtxoManager::new(Config::default(), Arc::new(ledgers), &source).unwrap();

    let report = manager.tick().await.unwrap();
    assert_eq!(report.outcome(AssetType::Bitcoin), Some(&AssetOutcome::Reconciled { discovered: 1, known: 1 }));
    assert_eq!(report.outcome(AssetType::Skycoin), Some(&AssetOutcome::Unsupported));
    assert_eq!(manager.pool_len(AssetType::Skycoin).unwrap(), 0);
    assert!(manager.known_utxos(AssetType::Skycoin).unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_failure_keeps_state() {
    let source = StaticAddressSource::new().with_addresses(AssetType::Bitcoin, &["btc-1"]);
    let (manager, ledger) = manager_with(Config::default(), source);
    ledger.set_outputs(AssetType::Bitcoin, vec![utxo("tx1", 0)]);
    manager.tick().await.unwrap();

    ledger.set_error(AssetType::Bitcoin, LedgerError::Parse("unexpected token".to_string()));
    let report = manager.tick().await.unwrap();
    assert!(matches!(report.outcome(AssetType::Bitcoin), Some(AssetOutcome::Failed(_))));
    assert_eq!(manager.known_utxos(AssetType::Bitcoin).unwrap().len(), 1);
    assert_eq!(manager.pool_len(AssetType::Bitcoin).unwrap(), 1);

    // once the ledger recovers nothing already known is delivered again
    ledger.set_outputs(AssetType::Bitcoin, vec![utxo("tx1", 0), utxo("tx2", 0)]);
    assert_eq!(manager.tick().await.unwrap().discovered(), 1);
    assert_eq!(manager.pool_len(AssetType::Bitcoin).unwrap(), 2);
}

#[tokio::test]
async fn test_merge_policy_remembers_outputs() {
    let source = StaticAddressSource::new().with_addresses(AssetType::Bitcoin, &["btc-1"]);
    let config = Config::default().with_snapshot_policy(SnapshotPolicy::Merge);
    let (manager, ledger) = manager_with(config, source);

    ledger.set_outputs(AssetType::Bitcoin, vec![utxo("tx1", 0)]);
    assert_eq!(manager.tick().await.unwrap().discovered(), 1);
    ledger.set_outputs(AssetType::Bitcoin, vec![]);
    assert_eq!(manager.tick().await.unwrap().discovered(), 0);
    ledger.set_outputs(AssetType::Bitcoin, vec![utxo("tx1", 0)]);
    assert_eq!(manager.tick().await.unwrap().discovered(), 0);
    assert_eq!(manager.pool_len(AssetType::Bitcoin).unwrap(), 1);
}

#[tokio::test]
async fn test_shutdown_releases_consumers() {
    let (manager, _) = manager_with(Config::new(Duration::from_secs(60), 2), StaticAddressSource::new());
    let (_cancel, cancellation) = triggered::trigger();
    let task = manager.spawn(cancellation);

    let consumer = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.withdraw(AssetType::Bitcoin).await })
    };
    sleep(PATIENCE).await;
    assert!(!consumer.is_finished());

    manager.shutdown();
    assert_eq!(consumer.await.unwrap(), Err(UtxoManagerError::PoolClosed(AssetType::Bitcoin)));
    timeout(DEADLINE, task).await.unwrap().unwrap().unwrap();
    assert_eq!(manager.state(), LoopState::Stopped);
    assert_eq!(manager.put_utxo(AssetType::Bitcoin, utxo("x", 0)).await, Err(UtxoManagerError::PoolClosed(AssetType::Bitcoin)));
}

#[tokio::test]
async fn test_async_service_lifecycle() {
    let (manager, _) = manager_with(Config::new(Duration::from_secs(60), 2), StaticAddressSource::new());
    assert_eq!(manager.clone().ident(), "utxo-manager");

    let service = tokio::spawn(AsyncService::start(manager.clone()));
    sleep(PATIENCE).await;
    assert!(!service.is_finished());

    AsyncService::signal_exit(manager.clone());
    timeout(DEADLINE, service).await.unwrap().unwrap().unwrap();
    assert_eq!(manager.state(), LoopState::Stopped);

    AsyncService::stop(manager.clone()).await.unwrap();
    assert_eq!(manager.withdraw(AssetType::Skycoin).await, Err(UtxoManagerError::PoolClosed(AssetType::Skycoin)));
}
