//! Application icon (`tAIB` #1000) decoding.
//!
//! The icon resource holds one or more PalmOS `BitmapType` records. Only the
//! first record is decoded by [`decode_icon`]; [`decode_icon_depths`] walks
//! the `nextDepthOffset` chain for callers that want the other depths.
//!
//! Decoding is best-effort: a missing or malformed icon yields
//! [`IconBitmap::fallback`], never an error.

mod render;

pub use render::{ascii_art, render_icon, save_icon_png};

use serde::Serialize;
use tracing::debug;

use crate::pdb::{Database, TypeCode};

/// Resource type of the application icon.
pub const ICON_RESOURCE_TYPE: TypeCode = TypeCode::new(*b"tAIB");

/// Resource ID of the large application icon.
pub const ICON_RESOURCE_ID: u16 = 1000;

const HEADER_LEN_V1: usize = 12;
const HEADER_LEN_V2: usize = 16;

/// `pixelSize` value marking the V1 "dummy" separator before high-density
/// bitmaps.
const DEPTH_SEPARATOR: u8 = 0xFF;

/// A decoded bitmap header plus its packed pixel rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconBitmap {
    pub width: u16,
    pub height: u16,
    pub row_bytes: u16,
    pub flags: u16,
    pub pixel_size: u8,
    pub version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparent_index: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_type: Option<u8>,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl IconBitmap {
    /// Placeholder returned when no usable icon exists: 22x22, 1 bpp, no
    /// pixel data (renders blank).
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            width: 22,
            height: 22,
            row_bytes: 3,
            flags: 0,
            pixel_size: 1,
            version: 1,
            transparent_index: Some(0),
            compression_type: Some(0),
            data: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }

    /// Parse one bitmap record at the start of `buf`.
    ///
    /// Returns `None` when the header or the `row_bytes * height` pixel area
    /// is truncated.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let header = buf.get(..HEADER_LEN_V1)?;
        let width = u16::from_be_bytes([header[0], header[1]]);
        let height = u16::from_be_bytes([header[2], header[3]]);
        let row_bytes = u16::from_be_bytes([header[4], header[5]]);
        let flags = u16::from_be_bytes([header[6], header[7]]);
        let pixel_size = header[8];
        let version = header[9];

        let (header_len, transparent_index, compression_type) = if version >= 2 {
            let ext = buf.get(..HEADER_LEN_V2)?;
            (HEADER_LEN_V2, Some(ext[12]), Some(ext[13]))
        } else {
            (HEADER_LEN_V1, None, None)
        };

        let data_len = usize::from(row_bytes) * usize::from(height);
        let data = buf.get(header_len..header_len + data_len)?.to_vec();

        Some(Self {
            width,
            height,
            row_bytes,
            flags,
            pixel_size,
            version,
            transparent_index,
            compression_type,
            data,
        })
    }
}

/// Payload of the first `tAIB` #1000 resource, if any.
#[must_use]
pub fn find_icon_resource(db: &Database) -> Option<&[u8]> {
    db.resources()
        .iter()
        .find(|r| r.type_code == ICON_RESOURCE_TYPE && r.resource_id == ICON_RESOURCE_ID)
        .map(|r| r.data.as_slice())
}

/// Decode the first bitmap of a database's application icon.
#[must_use]
pub fn decode_icon(db: &Database) -> IconBitmap {
    let Some(payload) = find_icon_resource(db) else {
        debug!(db = %db.header.name, "No tAIB resource, using fallback icon");
        return IconBitmap::fallback();
    };
    IconBitmap::parse(payload).unwrap_or_else(|| {
        debug!(
            db = %db.header.name,
            len = payload.len(),
            "Malformed tAIB resource, using fallback icon"
        );
        IconBitmap::fallback()
    })
}

/// Decode every bitmap depth in the icon's `nextDepthOffset` chain.
///
/// The offset (header bytes 10-11) counts 4-byte words from the start of the
/// current bitmap. The walk stops at a zero offset, an offset past the
/// payload, a separator record or a V3 header. Returns the fallback alone
/// when not even the first bitmap decodes.
#[must_use]
pub fn decode_icon_depths(db: &Database) -> Vec<IconBitmap> {
    let Some(payload) = find_icon_resource(db) else {
        return vec![IconBitmap::fallback()];
    };

    let mut depths = Vec::new();
    let mut offset = 0usize;
    while let Some(bitmap) = payload.get(offset..).and_then(IconBitmap::parse) {
        if bitmap.pixel_size == DEPTH_SEPARATOR || bitmap.version >= 3 {
            break;
        }
        let next = usize::from(u16::from_be_bytes([
            payload[offset + 10],
            payload[offset + 11],
        ]));
        depths.push(bitmap);
        if next == 0 {
            break;
        }
        offset += next * 4;
    }

    if depths.is_empty() {
        debug!(db = %db.header.name, "Malformed tAIB resource, using fallback icon");
        depths.push(IconBitmap::fallback());
    }
    depths
}
