//! PDB/PRC parsing of files assembled byte by byte.

use pilot_bridge::error::StoreError;
use pilot_bridge::pdb::{Database, Entries, TypeCode, palm_time};
use pilot_bridge::store::InstallFile;

use crate::common::fixtures::{PALM_2001, pdb_bytes, prc_bytes, sample_app, sample_memos};

#[test]
fn test_parse_data_database() {
    let db = Database::parse(&sample_memos("MemoDB")).unwrap();

    assert_eq!(db.header.name, "MemoDB");
    assert!(!db.is_resource_db());
    assert_eq!(db.header.type_code, TypeCode::new(*b"DATA"));
    assert_eq!(db.header.creator, TypeCode::new(*b"test"));
    assert_eq!(db.header.version, 3);
    assert_eq!(db.header.modification_number, 7);
    assert_eq!(db.header.created_at(), palm_time(PALM_2001));
    assert_eq!(
        db.header.created_at().unwrap().to_rfc3339(),
        "2001-09-09T01:46:40+00:00"
    );
    assert_eq!(db.app_info.as_deref(), Some(&b"categories"[..]));
    assert_eq!(db.sort_info, None);

    let records = db.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].attributes, 0x40);
    assert_eq!(records[0].unique_id, 0x00_10_01);
    assert_eq!(records[0].data, b"Buy milk\0");
    assert_eq!(records[1].data, b"Call Bob\0");
    assert_eq!(db.file_name(), "MemoDB.pdb");
}

#[test]
fn test_parse_resource_database() {
    let db = Database::parse(&sample_app("Solitaire")).unwrap();

    assert!(db.is_resource_db());
    assert_eq!(db.file_name(), "Solitaire.prc");
    let Entries::Resources(resources) = db.entries() else {
        panic!("expected resources");
    };
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].type_code.to_string(), "code");
    assert_eq!(resources[0].data, vec![0x4e, 0x75]);
    assert_eq!(resources[1].type_code.to_string(), "tAIB");
    assert_eq!(resources[1].resource_id, 1000);
    assert_eq!(resources[1].data.len(), 12 + 88);
}

#[test]
fn test_empty_database() {
    let bytes = pdb_bytes("Empty", None, &[]);
    assert_eq!(bytes.len(), 80);
    let db = Database::parse(&bytes).unwrap();
    assert!(db.entries().is_empty());
    assert_eq!(db.serialize().unwrap(), bytes);
}

/// Zero-length records sit at the same offset as their successor.
#[test]
fn test_zero_length_records() {
    let bytes = pdb_bytes("Sparse", None, &[(0, 1, b""), (0, 2, b"x"), (0, 3, b"")]);
    let db = Database::parse(&bytes).unwrap();
    let sizes: Vec<usize> = db.records().iter().map(|r| r.data.len()).collect();
    assert_eq!(sizes, vec![0, 1, 0]);
    assert_eq!(db.serialize().unwrap(), bytes);
}

#[test]
fn test_truncated_header() {
    let bytes = sample_memos("MemoDB");
    assert!(matches!(
        Database::parse(&bytes[..40]),
        Err(StoreError::InvalidDatabase(_))
    ));
}

#[test]
fn test_truncated_entry_table() {
    let bytes = prc_bytes("App", &[(b"code", 0, b"abc"), (b"code", 1, b"def")]);
    // Header plus half of the first entry.
    assert!(matches!(
        Database::parse(&bytes[..83]),
        Err(StoreError::InvalidDatabase(_))
    ));
}

#[test]
fn test_offset_past_end() {
    let mut bytes = pdb_bytes("Bad", None, &[(0, 1, b"data")]);
    bytes[78..82].copy_from_slice(&10_000u32.to_be_bytes());
    let err = Database::parse(&bytes).unwrap_err();
    assert!(matches!(err, StoreError::InvalidDatabase(_)));
}

#[test]
fn test_offset_inside_entry_table() {
    let mut bytes = pdb_bytes("Bad", None, &[(0, 1, b"data")]);
    bytes[78..82].copy_from_slice(&4u32.to_be_bytes());
    assert!(Database::parse(&bytes).is_err());
}

/// Parse errors from staged files name the offending file.
#[test]
fn test_install_file_error_names_file() {
    let file = InstallFile::new("broken.prc", vec![0; 10]);
    let err = file.parse().unwrap_err();
    assert!(matches!(err, StoreError::InvalidDatabase(_)));
    assert!(err.to_string().contains("broken.prc"), "{err}");
}

#[test]
fn test_summary_json() {
    let db = Database::parse(&sample_app("Solitaire")).unwrap();
    let json = serde_json::to_value(db.summary()).unwrap();
    assert_eq!(json["name"], "Solitaire");
    assert_eq!(json["file_name"], "Solitaire.prc");
    assert_eq!(json["kind"], "prc");
    assert_eq!(json["entry_count"], 2);
}
