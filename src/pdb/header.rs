//! The universal database header shared by PDB and PRC containers.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};

use crate::error::{Result, StoreError};

/// Size of the fixed header, including the record list header.
pub const HEADER_LEN: usize = 78;

/// Size of the NUL-padded name field.
pub const NAME_LEN: usize = 32;

// Field offsets within the header.
const ATTRIBUTES_OFFSET: usize = 32;
const VERSION_OFFSET: usize = 34;
const CREATION_OFFSET: usize = 36;
const MODIFICATION_OFFSET: usize = 40;
const LAST_BACKUP_OFFSET: usize = 44;
const MOD_NUMBER_OFFSET: usize = 48;
pub(super) const APP_INFO_OFFSET: usize = 52;
pub(super) const SORT_INFO_OFFSET: usize = 56;
const TYPE_OFFSET: usize = 60;
const CREATOR_OFFSET: usize = 64;
const UNIQUE_ID_SEED_OFFSET: usize = 68;
pub(super) const RECORD_COUNT_OFFSET: usize = 76;

/// Seconds between 1904-01-01 (PalmOS epoch) and 1970-01-01.
const PALM_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Four-character code used for database types, creators and resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeCode(pub [u8; 4]);

impl TypeCode {
    /// Build a code from a 4-byte literal such as `*b"appl"`.
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Parse a code from a 4-character string.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes: [u8; 4] = s.as_bytes().try_into().map_err(|_| {
            StoreError::InvalidDatabase(format!("type code must be 4 bytes, got {s:?}"))
        })?;
        Ok(Self(bytes))
    }

    /// Raw bytes of the code.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for TypeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Database attribute bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct DatabaseAttributes(pub u16);

impl DatabaseAttributes {
    /// Resource database (PRC) rather than record database (PDB).
    pub const RESOURCE: u16 = 0x0001;
    pub const READ_ONLY: u16 = 0x0002;
    pub const APP_INFO_DIRTY: u16 = 0x0004;
    pub const BACKUP: u16 = 0x0008;
    pub const OK_TO_INSTALL_NEWER: u16 = 0x0010;
    pub const RESET_AFTER_INSTALL: u16 = 0x0020;
    pub const COPY_PREVENTION: u16 = 0x0040;
    pub const STREAM: u16 = 0x0080;
    pub const HIDDEN: u16 = 0x0100;
    pub const LAUNCHABLE_DATA: u16 = 0x0200;
    pub const RECYCLABLE: u16 = 0x0400;
    pub const BUNDLE: u16 = 0x0800;
    pub const OPEN: u16 = 0x8000;

    #[must_use]
    pub const fn contains(self, bit: u16) -> bool {
        self.0 & bit == bit
    }

    #[must_use]
    pub const fn is_resource_db(self) -> bool {
        self.contains(Self::RESOURCE)
    }

    #[must_use]
    pub const fn with(self, bit: u16, on: bool) -> Self {
        if on { Self(self.0 | bit) } else { Self(self.0 & !bit) }
    }
}

/// Parsed database header.
///
/// Layout-derived fields (appInfo/sortInfo offsets, record count, next record
/// list) are not stored; they are recomputed on serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHeader {
    pub name: String,
    pub attributes: DatabaseAttributes,
    pub version: u16,
    pub creation_date: u32,
    pub modification_date: u32,
    pub last_backup_date: u32,
    pub modification_number: u32,
    pub type_code: TypeCode,
    pub creator: TypeCode,
    pub unique_id_seed: u32,
}

impl DatabaseHeader {
    /// Create a header with zeroed dates and counters.
    #[must_use]
    pub fn new(name: impl Into<String>, type_code: TypeCode, creator: TypeCode) -> Self {
        Self {
            name: name.into(),
            attributes: DatabaseAttributes::default(),
            version: 0,
            creation_date: 0,
            modification_date: 0,
            last_backup_date: 0,
            modification_number: 0,
            type_code,
            creator,
            unique_id_seed: 0,
        }
    }

    /// Parse the fixed-offset header at the start of a PDB or PRC buffer.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(StoreError::InvalidDatabase(format!(
                "buffer is {} bytes, header needs {HEADER_LEN}",
                buf.len()
            )));
        }

        Ok(Self {
            name: decode_name(&buf[..NAME_LEN]),
            attributes: DatabaseAttributes(be_u16(buf, ATTRIBUTES_OFFSET)),
            version: be_u16(buf, VERSION_OFFSET),
            creation_date: be_u32(buf, CREATION_OFFSET),
            modification_date: be_u32(buf, MODIFICATION_OFFSET),
            last_backup_date: be_u32(buf, LAST_BACKUP_OFFSET),
            modification_number: be_u32(buf, MOD_NUMBER_OFFSET),
            type_code: TypeCode(four_cc(buf, TYPE_OFFSET)),
            creator: TypeCode(four_cc(buf, CREATOR_OFFSET)),
            unique_id_seed: be_u32(buf, UNIQUE_ID_SEED_OFFSET),
        })
    }

    #[must_use]
    pub const fn is_resource_db(&self) -> bool {
        self.attributes.is_resource_db()
    }

    /// `prc` for resource databases, `pdb` otherwise.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        if self.is_resource_db() { "prc" } else { "pdb" }
    }

    /// Canonical backup filename: `<name>.<ext>`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.extension())
    }

    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        palm_time(self.creation_date)
    }

    #[must_use]
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        palm_time(self.modification_date)
    }

    #[must_use]
    pub fn backed_up_at(&self) -> Option<DateTime<Utc>> {
        palm_time(self.last_backup_date)
    }

    /// Write the 78-byte header with the given layout fields.
    pub(super) fn write_to(
        &self,
        out: &mut Vec<u8>,
        app_info_offset: u32,
        sort_info_offset: u32,
        record_count: u16,
    ) {
        out.extend_from_slice(&encode_name(&self.name));
        out.extend_from_slice(&self.attributes.0.to_be_bytes());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.creation_date.to_be_bytes());
        out.extend_from_slice(&self.modification_date.to_be_bytes());
        out.extend_from_slice(&self.last_backup_date.to_be_bytes());
        out.extend_from_slice(&self.modification_number.to_be_bytes());
        out.extend_from_slice(&app_info_offset.to_be_bytes());
        out.extend_from_slice(&sort_info_offset.to_be_bytes());
        out.extend_from_slice(self.type_code.as_bytes());
        out.extend_from_slice(self.creator.as_bytes());
        out.extend_from_slice(&self.unique_id_seed.to_be_bytes());
        // nextRecordListID, always 0 in files
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&record_count.to_be_bytes());
    }
}

/// Convert a PalmOS timestamp (seconds since 1904) to UTC. Zero means unset.
#[must_use]
pub fn palm_time(secs: u32) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    Utc.timestamp_opt(i64::from(secs) - PALM_EPOCH_OFFSET, 0).single()
}

/// Convert a UTC instant to a PalmOS timestamp, clamping to the u32 range.
#[must_use]
pub fn to_palm_time(at: DateTime<Utc>) -> u32 {
    let secs = at.timestamp() + PALM_EPOCH_OFFSET;
    u32::try_from(secs.max(0)).unwrap_or(u32::MAX)
}

// Callers guarantee `off + N <= buf.len()`.
pub(super) fn be_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

pub(super) fn be_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub(super) fn four_cc(buf: &[u8], off: usize) -> [u8; 4] {
    [buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]
}

/// Names are NUL-terminated Latin-1.
fn decode_name(field: &[u8]) -> String {
    field
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}

/// Encode to Latin-1, truncated to 31 bytes so a terminator always fits.
fn encode_name(name: &str) -> [u8; NAME_LEN] {
    let mut field = [0u8; NAME_LEN];
    for (slot, ch) in field.iter_mut().take(NAME_LEN - 1).zip(name.chars()) {
        *slot = u8::try_from(u32::from(ch)).unwrap_or(b'?');
    }
    field
}
