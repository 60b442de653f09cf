//! Store scenarios that must behave identically on every backend.

use pilot_bridge::error::StoreError;
use pilot_bridge::store::InstallFile;
use pilot_bridge::sync::DatabaseStorage;

use crate::common::fixtures::{sample_app, sample_memos};
use crate::common::init_test_logging;
use crate::common::stores::{ALL_FLAVORS, Flavor, TestStore};

/// Create, list and remove devices.
#[tokio::test]
async fn test_device_lifecycle() {
    init_test_logging();
    for flavor in ALL_FLAVORS {
        let store = TestStore::new(flavor);
        assert!(store.list_devices().await.unwrap().is_empty(), "{flavor:?}");

        store.create_device("bob").await.unwrap();
        store.create_device("alice").await.unwrap();
        // idempotent
        store.create_device("alice").await.unwrap();

        assert_eq!(
            store.list_devices().await.unwrap(),
            vec!["alice".to_string(), "bob".to_string()],
            "{flavor:?}"
        );
        assert!(store.device_exists("alice").await.unwrap());
        assert!(!store.device_exists("carol").await.unwrap());

        store.remove_device("bob").await.unwrap();
        assert!(!store.device_exists("bob").await.unwrap(), "{flavor:?}");
        assert!(matches!(
            store.remove_device("bob").await,
            Err(StoreError::DeviceNotFound { .. })
        ));
    }
}

/// Writing a database under its header-derived name and reading it back.
#[tokio::test]
async fn test_backup_round_trip() {
    init_test_logging();
    for flavor in ALL_FLAVORS {
        let store = TestStore::new(flavor);
        store.create_device("alice").await.unwrap();

        let memos = sample_memos("MemoDB");
        store
            .write_database_buffer("alice", "MemoDB.pdb", &memos)
            .await
            .unwrap();
        let db = store.read_database("alice", "MemoDB.pdb").await.unwrap();
        assert_eq!(db.records().len(), 2, "{flavor:?}");

        let written = store.write_database("alice", &db).await.unwrap();
        assert_eq!(written, "MemoDB.pdb");
        assert_eq!(
            store.read_database_buffer("alice", "MemoDB.pdb").await.unwrap(),
            memos,
            "{flavor:?}: serialization must reproduce the original bytes"
        );

        assert!(store.database_exists("alice", "MemoDB.pdb").await.unwrap());
        assert!(!store.database_exists("alice", "AddressDB.pdb").await.unwrap());
        assert_eq!(
            store.list_backup_files("alice").await.unwrap(),
            vec!["MemoDB.pdb".to_string()]
        );
    }
}

/// A later write replaces the earlier content.
#[tokio::test]
async fn test_overwrite_replaces_content() {
    for flavor in ALL_FLAVORS {
        let store = TestStore::new(flavor);
        store.create_device("alice").await.unwrap();
        store
            .write_database_buffer("alice", "MemoDB.pdb", &[1, 2, 3, 4])
            .await
            .unwrap();
        store
            .write_database_buffer("alice", "MemoDB.pdb", &[9])
            .await
            .unwrap();
        assert_eq!(
            store.read_database_buffer("alice", "MemoDB.pdb").await.unwrap(),
            vec![9],
            "{flavor:?}"
        );
    }
}

/// An empty placeholder counts as absent.
#[tokio::test]
async fn test_empty_file_does_not_exist() {
    for flavor in ALL_FLAVORS {
        let store = TestStore::new(flavor);
        store.create_device("alice").await.unwrap();
        store
            .write_database_buffer("alice", "Empty.pdb", &[])
            .await
            .unwrap();
        assert!(
            !store.database_exists("alice", "Empty.pdb").await.unwrap(),
            "{flavor:?}"
        );
    }
}

/// Operations on a device that was never created.
#[tokio::test]
async fn test_unknown_device_errors() {
    for flavor in ALL_FLAVORS {
        let store = TestStore::new(flavor);
        assert!(matches!(
            store.write_database_buffer("ghost", "A.pdb", &[1]).await,
            Err(StoreError::DeviceNotFound { .. })
        ));
        assert!(matches!(
            store.read_database_buffer("ghost", "A.pdb").await,
            Err(StoreError::DeviceNotFound { .. })
        ));
        assert!(matches!(
            store.database_exists("ghost", "A.pdb").await,
            Err(StoreError::DeviceNotFound { .. })
        ));
        assert!(matches!(
            store.list_install_queue("ghost").await,
            Err(StoreError::DeviceNotFound { .. })
        ));
        // Nothing was created as a side effect.
        assert!(!store.device_exists("ghost").await.unwrap(), "{flavor:?}");
    }
}

/// A missing database reports both partitions were searched.
#[tokio::test]
async fn test_missing_database() {
    for flavor in ALL_FLAVORS {
        let store = TestStore::new(flavor);
        store.create_device("alice").await.unwrap();
        let err = store
            .read_database_buffer("alice", "Nope.pdb")
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{flavor:?}");
        assert!(err.to_string().contains("[Nope.pdb]"));
    }
}

/// Reads fall back to the install partition.
#[tokio::test]
async fn test_read_falls_back_to_install_partition() {
    for flavor in ALL_FLAVORS {
        let store = TestStore::new(flavor);
        store.create_device("alice").await.unwrap();
        store
            .stage_for_install("alice", &InstallFile::new("solitaire.prc", sample_app("Solitaire")))
            .await
            .unwrap();

        let db = store.read_database("alice", "solitaire.prc").await.unwrap();
        assert_eq!(db.header.name, "Solitaire", "{flavor:?}");
        assert!(!store.database_exists("alice", "solitaire.prc").await.unwrap());
    }
}

/// Devices are isolated from each other.
#[tokio::test]
async fn test_device_isolation() {
    for flavor in ALL_FLAVORS {
        let store = TestStore::new(flavor);
        store.create_device("alice").await.unwrap();
        store.create_device("bob").await.unwrap();
        store
            .write_database_buffer("alice", "MemoDB.pdb", &sample_memos("MemoDB"))
            .await
            .unwrap();

        assert!(store.list_all_databases("bob").await.unwrap().is_empty(), "{flavor:?}");
        store.remove_device("bob").await.unwrap();
        assert_eq!(store.list_all_databases("alice").await.unwrap().len(), 1);
    }
}

/// Persisted backends keep databases and the client id across reopen.
#[tokio::test]
async fn test_state_survives_reopen() {
    for flavor in [Flavor::Fs, Flavor::Sqlite] {
        let store = TestStore::new(flavor);
        store.create_device("alice").await.unwrap();
        store
            .write_database_buffer("alice", "MemoDB.pdb", &sample_memos("MemoDB"))
            .await
            .unwrap();
        let id = store.computer_id().await.unwrap();

        let reopened = store.reopen();
        assert_eq!(reopened.list_devices().await.unwrap(), vec!["alice".to_string()]);
        assert!(reopened.database_exists("alice", "MemoDB.pdb").await.unwrap());
        assert_eq!(reopened.computer_id().await.unwrap(), id, "{flavor:?}");
    }
}

/// The persistence contract a sync engine uses on first contact with a device.
#[tokio::test]
async fn test_first_sync_through_contract() {
    for flavor in ALL_FLAVORS {
        let test_store = TestStore::new(flavor);
        let storage: &dyn DatabaseStorage = &*test_store;

        assert!(!storage.user_exists("alice").await.unwrap());
        storage.create_user("alice").await.unwrap();
        assert!(storage.user_exists("alice").await.unwrap());

        let db = pilot_bridge::pdb::Database::parse(&sample_memos("MemoDB")).unwrap();
        storage.write_database("alice", &db).await.unwrap();
        assert!(storage.database_exists("alice", "MemoDB.pdb").await.unwrap());

        let all = storage.all_databases("alice").await.unwrap();
        assert_eq!(all.len(), 1, "{flavor:?}");
        assert_eq!(all[0], db);
        assert_eq!(
            storage.computer_id().await.unwrap(),
            storage.computer_id().await.unwrap()
        );
    }
}
