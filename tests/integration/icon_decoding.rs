//! Application icon extraction from stored databases.

use pilot_bridge::icon::{self, IconBitmap};
use pilot_bridge::pdb::Database;
use pilot_bridge::store::InstallFile;
use tempfile::TempDir;

use crate::common::fixtures::{
    SAMPLE_ICON_ROWS, bitmap_v1, bitmap_v2, prc_bytes, sample_app, sample_memos,
};
use crate::common::stores::{Flavor, TestStore};

fn app_with_icon(icon: &[u8]) -> Database {
    Database::parse(&prc_bytes("App", &[(b"tAIB", 1000, icon)])).unwrap()
}

/// The sample icon decodes from a database read back out of the store.
#[tokio::test]
async fn test_decode_stored_application_icon() {
    let store = TestStore::new(Flavor::Fs);
    store.create_device("alice").await.unwrap();
    store
        .write_database_buffer("alice", "Solitaire.prc", &sample_app("Solitaire"))
        .await
        .unwrap();

    let db = store.read_database("alice", "Solitaire.prc").await.unwrap();
    let bitmap = icon::decode_icon(&db);
    assert!(!bitmap.is_fallback());
    assert_eq!((bitmap.width, bitmap.height), (22, 22));
    assert_eq!(bitmap.row_bytes, 4);
    assert_eq!(bitmap.pixel_size, 1);
    assert_eq!(bitmap.version, 1);
    assert_eq!(bitmap.data, SAMPLE_ICON_ROWS);

    let art = icon::ascii_art(&bitmap).unwrap();
    let rows: Vec<&str> = art.lines().collect();
    assert_eq!(rows.len(), 22);
    assert_eq!(rows[0], "......................");
    assert_eq!(rows[2], ".......#########......");
    assert_eq!(rows[14], ".###############..####");
}

/// Staged apps expose their icon before installation.
#[tokio::test]
async fn test_decode_staged_icon() {
    let store = TestStore::new(Flavor::Memory);
    store.create_device("alice").await.unwrap();
    let staged = store
        .stage_for_install("alice", &InstallFile::new("sol.prc", sample_app("Solitaire")))
        .await
        .unwrap();
    assert_eq!(icon::decode_icon(staged.database()).data.len(), 88);
}

#[test]
fn test_render_sample_at_double_size() {
    let db = Database::parse(&sample_app("Solitaire")).unwrap();
    let img = icon::render_icon(&icon::decode_icon(&db)).unwrap();
    assert_eq!(img.dimensions(), (44, 44));
    // Row 2, column 7 is the first set pixel.
    assert_eq!(img.get_pixel(14, 4).0, [0, 0, 0, 255]);
    assert_eq!(img.get_pixel(15, 5).0, [0, 0, 0, 255]);
    assert_eq!(img.get_pixel(12, 4).0, [255, 255, 255, 255]);
    assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
}

#[test]
fn test_save_png() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("icon.png");
    let db = Database::parse(&sample_app("Solitaire")).unwrap();
    icon::save_icon_png(&icon::decode_icon(&db), &path).unwrap();

    let reloaded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(reloaded.dimensions(), (44, 44));
    assert_eq!(reloaded.get_pixel(14, 4).0, [0, 0, 0, 255]);
}

/// Data databases and apps without an icon get the placeholder.
#[test]
fn test_missing_icon_falls_back() {
    let memos = Database::parse(&sample_memos("MemoDB")).unwrap();
    assert!(icon::decode_icon(&memos).is_fallback());

    let no_icon = Database::parse(&prc_bytes("App", &[(b"code", 0, b"\x4e\x75")])).unwrap();
    assert!(icon::decode_icon(&no_icon).is_fallback());

    // Wrong resource id.
    let small = Database::parse(&prc_bytes(
        "App",
        &[(b"tAIB", 1001, &bitmap_v1(8, 1, 2, 1, 0, &[0xff, 0]))],
    ))
    .unwrap();
    assert!(icon::decode_icon(&small).is_fallback());
}

/// A pixel area shorter than `row_bytes * height` is malformed.
#[test]
fn test_truncated_icon_falls_back() {
    let mut icon_bytes = bitmap_v1(22, 22, 4, 1, 0, &SAMPLE_ICON_ROWS);
    icon_bytes.truncate(50);
    let bitmap = icon::decode_icon(&app_with_icon(&icon_bytes));
    assert_eq!(bitmap, IconBitmap::fallback());

    let img = icon::render_icon(&bitmap).unwrap();
    assert_eq!(img.dimensions(), (44, 44));
    assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
}

#[test]
fn test_version_two_header() {
    let payload = bitmap_v2(4, 2, 2, 2, 5, &[0b0001_1011, 0, 0xff, 0]);
    let bitmap = icon::decode_icon(&app_with_icon(&payload));
    assert_eq!(bitmap.version, 2);
    assert_eq!(bitmap.transparent_index, Some(5));
    assert_eq!(bitmap.compression_type, Some(0));
    assert_eq!(bitmap.data, vec![0b0001_1011, 0, 0xff, 0]);

    let img = icon::render_icon(&bitmap).unwrap();
    let grays: Vec<u8> = (0..4).map(|x| img.get_pixel(x * 2, 0).0[0]).collect();
    assert_eq!(grays, vec![255, 170, 85, 0]);
}

/// `nextDepthOffset` counts 4-byte words from the current bitmap.
#[test]
fn test_depth_chain() {
    // 12-byte header + 4 data bytes = 4 words.
    let mut chain = bitmap_v1(8, 2, 2, 1, 4, &[0xff, 0, 0, 0]);
    chain.extend(bitmap_v2(8, 2, 2, 2, 0, &[0xaa, 0xaa, 0, 0]));
    let db = app_with_icon(&chain);

    let depths = icon::decode_icon_depths(&db);
    assert_eq!(depths.len(), 2);
    assert_eq!(depths[0].pixel_size, 1);
    assert_eq!(depths[1].pixel_size, 2);
    assert_eq!(depths[1].version, 2);

    // Only the first depth by default.
    assert_eq!(icon::decode_icon(&db), depths[0]);
}

/// The walk stops at the high-density separator record.
#[test]
fn test_depth_chain_stops_at_separator() {
    let mut chain = bitmap_v1(8, 2, 2, 1, 4, &[0xff, 0, 0, 0]);
    chain.extend(bitmap_v1(0, 0, 0, 0xff, 0, &[]));
    let depths = icon::decode_icon_depths(&app_with_icon(&chain));
    assert_eq!(depths.len(), 1);
    assert_eq!(depths[0].pixel_size, 1);
}

/// An offset past the payload ends the walk with what was decoded so far.
#[test]
fn test_depth_chain_offset_out_of_range() {
    let chain = bitmap_v1(8, 2, 2, 1, 200, &[0xff, 0, 0, 0]);
    assert_eq!(icon::decode_icon_depths(&app_with_icon(&chain)).len(), 1);
}

/// Metadata serializes without the raw pixel rows.
#[test]
fn test_bitmap_json() {
    let db = Database::parse(&sample_app("Solitaire")).unwrap();
    let json = serde_json::to_value(icon::decode_icon(&db)).unwrap();
    assert_eq!(json["width"], 22);
    assert_eq!(json["row_bytes"], 4);
    assert!(json.get("data").is_none());
    assert!(json.get("transparent_index").is_none());
}
