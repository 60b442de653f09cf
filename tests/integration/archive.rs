//! Whole-store archives, including moving a store between backends.

use pilot_bridge::error::StoreError;
use pilot_bridge::store::InstallFile;

use crate::common::fixtures::{sample_app, sample_memos};
use crate::common::init_test_logging;
use crate::common::stores::{ALL_FLAVORS, Flavor, TestStore};

async fn populate(store: &TestStore) {
    store.create_device("alice").await.unwrap();
    store.create_device("bob").await.unwrap();
    store
        .write_database_buffer("alice", "MemoDB.pdb", &sample_memos("MemoDB"))
        .await
        .unwrap();
    store
        .stage_for_install("alice", &InstallFile::new("sol.prc", sample_app("Solitaire")))
        .await
        .unwrap();
}

/// Export from each backend and import into each other backend.
#[tokio::test]
async fn test_migrate_between_backends() {
    init_test_logging();
    for from in ALL_FLAVORS {
        let source = TestStore::new(from);
        populate(&source).await;
        let archive = source.export_archive().await.unwrap();

        for to in ALL_FLAVORS {
            let target = TestStore::new(to);
            let summary = target.import_archive(&archive).await.unwrap();
            assert_eq!(summary.devices, 2, "{from:?} -> {to:?}");
            assert_eq!(summary.files, 2, "{from:?} -> {to:?}");

            assert_eq!(
                target.list_devices().await.unwrap(),
                vec!["alice".to_string(), "bob".to_string()]
            );
            // bob had no files; his empty partitions still exist.
            assert!(target.device_exists("bob").await.unwrap());
            assert!(target.list_install_queue("bob").await.unwrap().is_empty());

            assert_eq!(
                target.read_database_buffer("alice", "MemoDB.pdb").await.unwrap(),
                sample_memos("MemoDB")
            );
            let queue = target.list_install_queue("alice").await.unwrap();
            assert_eq!(queue.filenames, vec!["sol.prc".to_string()]);
        }
    }
}

/// Import replaces devices that are not in the archive.
#[tokio::test]
async fn test_import_replaces_contents() {
    let source = TestStore::new(Flavor::Memory);
    populate(&source).await;
    let archive = source.export_archive().await.unwrap();

    let target = TestStore::new(Flavor::Sqlite);
    target.create_device("carol").await.unwrap();
    target.import_archive(&archive).await.unwrap();
    assert!(!target.device_exists("carol").await.unwrap());
}

/// The client id lives outside the root namespace and is not exported.
#[tokio::test]
async fn test_import_keeps_local_identity() {
    let source = TestStore::new(Flavor::Fs);
    populate(&source).await;
    source.computer_id().await.unwrap();
    let archive = source.export_archive().await.unwrap();

    let target = TestStore::new(Flavor::Fs);
    let id = target.computer_id().await.unwrap();
    target.import_archive(&archive).await.unwrap();
    assert_eq!(target.reopen().computer_id().await.unwrap(), id);
    assert!(!target.list_devices().await.unwrap().contains(&"device_id".to_string()));
}

/// A file that is not a ZIP is rejected before anything is cleared.
#[tokio::test]
async fn test_import_garbage_keeps_store() {
    let store = TestStore::new(Flavor::Fs);
    populate(&store).await;
    let result = store.import_archive(b"PK but not really").await;
    assert!(matches!(result, Err(StoreError::Archive(_))));
    assert_eq!(store.list_devices().await.unwrap().len(), 2);
}
