//! PalmOS PDB (data) and PRC (resource) container formats.
//!
//! Both formats share a 78-byte big-endian header whose attribute bit
//! `0x0001` marks a resource database. The header is followed by an entry
//! table (8-byte record entries or 10-byte resource entries), two bytes of
//! padding, and the appInfo, sortInfo and entry payload blocks.
//!
//! ```text
//! +--------------------+ 0
//! | name[32]           |
//! | attributes, ...    |
//! | type, creator      |
//! | numRecords         |
//! +--------------------+ 78
//! | entry table        |
//! +--------------------+
//! | 00 00              |
//! | appInfo | sortInfo |
//! | payloads...        |
//! +--------------------+
//! ```

mod database;
mod header;

pub use database::{DataRecord, Database, DatabaseSummary, Entries, MAX_ENTRIES, ResourceEntry};
pub use header::{
    DatabaseAttributes, DatabaseHeader, HEADER_LEN, NAME_LEN, TypeCode, palm_time, to_palm_time,
};
