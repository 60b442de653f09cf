//! Byte-level fixtures.
//!
//! Containers are assembled field by field rather than through
//! `Database::serialize`, so parser tests do not depend on the writer.

/// Header attribute bit marking a resource database.
pub const RESOURCE_ATTR: u16 = 0x0001;

/// A 22x22 monochrome application icon, 4 bytes per row, taken from a real
/// handheld backup.
pub const SAMPLE_ICON_ROWS: [u8; 88] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 255, 0, 0, 2, 0, 192, 0, 12, 0, 96, 0, 24, 0, 176, 0, 31, 255, 48,
    0, 56, 1, 56, 0, 56, 1, 56, 0, 120, 249, 60, 0, 121, 9, 60, 0, 121, 249, 60, 0, 120, 1, 60, 0,
    120, 1, 60, 0, 127, 255, 60, 0, 120, 1, 60, 0, 56, 1, 56, 0, 56, 249, 56, 0, 25, 9, 48, 0, 9,
    249, 112, 0, 8, 1, 96, 0, 8, 1, 128, 0,
];

/// PalmOS timestamp for 2001-09-09 01:46:40 UTC.
pub const PALM_2001: u32 = 3_082_844_800;

fn push_name(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; 32];
    field[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&field);
}

fn header(
    name: &str,
    attributes: u16,
    type_code: &[u8; 4],
    creator: &[u8; 4],
    app_info_offset: u32,
    count: u16,
) -> Vec<u8> {
    let mut out = Vec::new();
    push_name(&mut out, name);
    out.extend_from_slice(&attributes.to_be_bytes());
    out.extend_from_slice(&3u16.to_be_bytes()); // version
    out.extend_from_slice(&PALM_2001.to_be_bytes()); // created
    out.extend_from_slice(&PALM_2001.to_be_bytes()); // modified
    out.extend_from_slice(&0u32.to_be_bytes()); // last backup
    out.extend_from_slice(&7u32.to_be_bytes()); // modification number
    out.extend_from_slice(&app_info_offset.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // sortInfo
    out.extend_from_slice(type_code);
    out.extend_from_slice(creator);
    out.extend_from_slice(&0u32.to_be_bytes()); // unique id seed
    out.extend_from_slice(&0u32.to_be_bytes()); // next record list
    out.extend_from_slice(&count.to_be_bytes());
    assert_eq!(out.len(), 78);
    out
}

fn offset(at: usize) -> u32 {
    u32::try_from(at).unwrap()
}

/// A data database: `(attributes, unique_id, payload)` per record, with an
/// optional appInfo block ahead of the payloads.
pub fn pdb_bytes(name: &str, app_info: Option<&[u8]>, records: &[(u8, u32, &[u8])]) -> Vec<u8> {
    let count = u16::try_from(records.len()).unwrap();
    let mut at = 78 + records.len() * 8 + 2;
    let app_info_offset = app_info.map_or(0, |block| {
        let start = at;
        at += block.len();
        offset(start)
    });

    let mut out = header(name, 0, b"DATA", b"test", app_info_offset, count);
    for (attributes, unique_id, data) in records {
        out.extend_from_slice(&offset(at).to_be_bytes());
        out.push(*attributes);
        out.extend_from_slice(&unique_id.to_be_bytes()[1..]);
        at += data.len();
    }
    out.extend_from_slice(&[0, 0]);
    if let Some(block) = app_info {
        out.extend_from_slice(block);
    }
    for (_, _, data) in records {
        out.extend_from_slice(data);
    }
    out
}

/// A resource database: `(type, id, payload)` per resource.
pub fn prc_bytes(name: &str, resources: &[(&[u8; 4], u16, &[u8])]) -> Vec<u8> {
    let count = u16::try_from(resources.len()).unwrap();
    let mut out = header(name, RESOURCE_ATTR, b"appl", b"TEST", 0, count);
    let mut at = 78 + resources.len() * 10 + 2;
    for (type_code, id, data) in resources {
        out.extend_from_slice(*type_code);
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(&offset(at).to_be_bytes());
        at += data.len();
    }
    out.extend_from_slice(&[0, 0]);
    for (_, _, data) in resources {
        out.extend_from_slice(data);
    }
    out
}

/// Version 1 `BitmapType`: 12-byte header followed by `data`.
pub fn bitmap_v1(
    width: u16,
    height: u16,
    row_bytes: u16,
    pixel_size: u8,
    next_depth_words: u16,
    data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&row_bytes.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // flags
    out.push(pixel_size);
    out.push(1);
    out.extend_from_slice(&next_depth_words.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Version 2 `BitmapType`: 16-byte header with transparency and
/// compression bytes.
pub fn bitmap_v2(
    width: u16,
    height: u16,
    row_bytes: u16,
    pixel_size: u8,
    transparent_index: u8,
    data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&row_bytes.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.push(pixel_size);
    out.push(2);
    out.extend_from_slice(&0u16.to_be_bytes());
    out.push(transparent_index);
    out.push(0); // compression type
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// An application whose icon is the sample 22x22 bitmap.
pub fn sample_app(name: &str) -> Vec<u8> {
    let icon = bitmap_v1(22, 22, 4, 1, 0, &SAMPLE_ICON_ROWS);
    prc_bytes(
        name,
        &[(b"code", 0, &[0x4e_u8, 0x75]), (b"tAIB", 1000, &icon)],
    )
}

/// A small memo-style data database.
pub fn sample_memos(name: &str) -> Vec<u8> {
    pdb_bytes(
        name,
        Some(b"categories".as_slice()),
        &[(0x40, 0x00_10_01, b"Buy milk\0"), (0x41, 0x00_10_02, b"Call Bob\0")],
    )
}
