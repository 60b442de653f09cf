//! Whole-container parsing and serialization for PDB and PRC databases.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::trace;

use super::header::{
    APP_INFO_OFFSET, DatabaseAttributes, DatabaseHeader, HEADER_LEN, RECORD_COUNT_OFFSET,
    SORT_INFO_OFFSET, TypeCode, be_u16, be_u32, four_cc,
};
use crate::error::{Result, StoreError};

const RECORD_ENTRY_LEN: usize = 8;
const RESOURCE_ENTRY_LEN: usize = 10;
/// Zero bytes between the entry table and the first data block.
const TABLE_PADDING: usize = 2;
/// The header's entry count is a u16.
pub const MAX_ENTRIES: usize = u16::MAX as usize;

/// One record of a data database (PDB).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    /// Record attribute byte (delete/dirty/busy/secret bits + category).
    pub attributes: u8,
    /// 24-bit unique record ID.
    pub unique_id: u32,
    pub data: Vec<u8>,
}

/// One typed resource of a resource database (PRC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub type_code: TypeCode,
    pub resource_id: u16,
    pub data: Vec<u8>,
}

impl ResourceEntry {
    #[must_use]
    pub fn new(type_code: TypeCode, resource_id: u16, data: Vec<u8>) -> Self {
        Self {
            type_code,
            resource_id,
            data,
        }
    }
}

/// Entries of a database. A container holds one kind or the other, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entries {
    Records(Vec<DataRecord>),
    Resources(Vec<ResourceEntry>),
}

impl Entries {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Records(r) => r.len(),
            Self::Resources(r) => r.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory PDB or PRC database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub header: DatabaseHeader,
    pub app_info: Option<Vec<u8>>,
    pub sort_info: Option<Vec<u8>>,
    entries: Entries,
}

impl Database {
    /// Create an empty data database (PDB).
    #[must_use]
    pub fn new_pdb(mut header: DatabaseHeader) -> Self {
        header.attributes = header.attributes.with(DatabaseAttributes::RESOURCE, false);
        Self {
            header,
            app_info: None,
            sort_info: None,
            entries: Entries::Records(Vec::new()),
        }
    }

    /// Create an empty resource database (PRC).
    #[must_use]
    pub fn new_prc(mut header: DatabaseHeader) -> Self {
        header.attributes = header.attributes.with(DatabaseAttributes::RESOURCE, true);
        Self {
            header,
            app_info: None,
            sort_info: None,
            entries: Entries::Resources(Vec::new()),
        }
    }

    /// Parse a full container, selecting the PDB or PRC entry layout from
    /// the header's resource bit.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header = DatabaseHeader::parse(buf)?;
        let resource = header.is_resource_db();
        let count = usize::from(be_u16(buf, RECORD_COUNT_OFFSET));
        let entry_len = if resource {
            RESOURCE_ENTRY_LEN
        } else {
            RECORD_ENTRY_LEN
        };
        let table_end = HEADER_LEN + count * entry_len;
        if table_end > buf.len() {
            return Err(StoreError::InvalidDatabase(format!(
                "entry table for {count} entries overruns {}-byte buffer",
                buf.len()
            )));
        }

        trace!(name = %header.name, resource, count, "Parsing database");

        // Blocks in file order: appInfo, sortInfo, then each entry's payload.
        let app_info_offset = be_u32(buf, APP_INFO_OFFSET);
        let sort_info_offset = be_u32(buf, SORT_INFO_OFFSET);
        let mut starts: Vec<usize> = Vec::with_capacity(count + 2);
        if app_info_offset != 0 {
            starts.push(app_info_offset as usize);
        }
        if sort_info_offset != 0 {
            starts.push(sort_info_offset as usize);
        }
        let entry_base = starts.len();
        for i in 0..count {
            let at = HEADER_LEN + i * entry_len;
            let offset = if resource {
                be_u32(buf, at + 6)
            } else {
                be_u32(buf, at)
            };
            starts.push(offset as usize);
        }

        for &start in &starts {
            if start < table_end || start > buf.len() {
                return Err(StoreError::InvalidDatabase(format!(
                    "data offset {start} outside {table_end}..={}",
                    buf.len()
                )));
            }
        }

        let blocks = BlockLayout::new(&starts, buf.len());
        let mut next_block = 0;
        let app_info = (app_info_offset != 0).then(|| {
            next_block += 1;
            blocks.slice(buf, next_block - 1).to_vec()
        });
        let sort_info = (sort_info_offset != 0).then(|| {
            next_block += 1;
            blocks.slice(buf, next_block - 1).to_vec()
        });

        let entries = if resource {
            Entries::Resources(
                (0..count)
                    .map(|i| {
                        let at = HEADER_LEN + i * entry_len;
                        ResourceEntry {
                            type_code: TypeCode(four_cc(buf, at)),
                            resource_id: be_u16(buf, at + 4),
                            data: blocks.slice(buf, entry_base + i).to_vec(),
                        }
                    })
                    .collect(),
            )
        } else {
            Entries::Records(
                (0..count)
                    .map(|i| {
                        let at = HEADER_LEN + i * entry_len;
                        DataRecord {
                            attributes: buf[at + 4],
                            unique_id: u32::from_be_bytes([0, buf[at + 5], buf[at + 6], buf[at + 7]]),
                            data: blocks.slice(buf, entry_base + i).to_vec(),
                        }
                    })
                    .collect(),
            )
        };

        Ok(Self {
            header,
            app_info,
            sort_info,
            entries,
        })
    }

    /// Serialize the whole container.
    ///
    /// The resource bit, block offsets and entry count are derived from the
    /// in-memory contents, so the output is deterministic. Fails when the
    /// entry count or a block offset does not fit its header field.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let entry_len = if self.is_resource_db() {
            RESOURCE_ENTRY_LEN
        } else {
            RECORD_ENTRY_LEN
        };
        let count = self.entries.len();
        let count_field = u16::try_from(count).map_err(|_| {
            StoreError::InvalidDatabase(format!(
                "{} has {count} entries, more than the {MAX_ENTRIES} a container can hold",
                self.header.name
            ))
        })?;
        let mut offset = HEADER_LEN + count * entry_len + TABLE_PADDING;

        let mut place = |block: Option<&[u8]>| -> Result<u32> {
            block.map_or(Ok(0), |data| {
                let at = offset;
                offset += data.len();
                to_offset(at)
            })
        };
        let app_info_offset = place(self.app_info.as_deref())?;
        let sort_info_offset = place(self.sort_info.as_deref())?;
        let payload_offsets = self
            .payloads()
            .map(|data| place(Some(data)))
            .collect::<Result<Vec<u32>>>()?;

        let mut header = self.header.clone();
        header.attributes = header
            .attributes
            .with(DatabaseAttributes::RESOURCE, self.is_resource_db());

        let mut out = Vec::with_capacity(offset);
        header.write_to(
            &mut out,
            app_info_offset,
            sort_info_offset,
            count_field,
        );

        match &self.entries {
            Entries::Records(records) => {
                for (record, at) in records.iter().zip(&payload_offsets) {
                    out.extend_from_slice(&at.to_be_bytes());
                    out.push(record.attributes);
                    out.extend_from_slice(&record.unique_id.to_be_bytes()[1..]);
                }
            }
            Entries::Resources(resources) => {
                for (resource, at) in resources.iter().zip(&payload_offsets) {
                    out.extend_from_slice(resource.type_code.as_bytes());
                    out.extend_from_slice(&resource.resource_id.to_be_bytes());
                    out.extend_from_slice(&at.to_be_bytes());
                }
            }
        }
        out.extend_from_slice(&[0u8; TABLE_PADDING]);

        if let Some(app_info) = &self.app_info {
            out.extend_from_slice(app_info);
        }
        if let Some(sort_info) = &self.sort_info {
            out.extend_from_slice(sort_info);
        }
        for data in self.payloads() {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    fn payloads(&self) -> Box<dyn Iterator<Item = &[u8]> + '_> {
        match &self.entries {
            Entries::Records(r) => Box::new(r.iter().map(|e| e.data.as_slice())),
            Entries::Resources(r) => Box::new(r.iter().map(|e| e.data.as_slice())),
        }
    }

    #[must_use]
    pub const fn is_resource_db(&self) -> bool {
        matches!(self.entries, Entries::Resources(_))
    }

    /// Canonical backup filename, `<name>.prc` or `<name>.pdb`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let ext = if self.is_resource_db() { "prc" } else { "pdb" };
        format!("{}.{ext}", self.header.name)
    }

    #[must_use]
    pub const fn entries(&self) -> &Entries {
        &self.entries
    }

    /// Data records; empty for resource databases.
    #[must_use]
    pub fn records(&self) -> &[DataRecord] {
        match &self.entries {
            Entries::Records(r) => r,
            Entries::Resources(_) => &[],
        }
    }

    /// Resource entries; empty for data databases.
    #[must_use]
    pub fn resources(&self) -> &[ResourceEntry] {
        match &self.entries {
            Entries::Resources(r) => r,
            Entries::Records(_) => &[],
        }
    }

    /// Append a data record. Fails on a resource database or a full one.
    pub fn push_record(&mut self, record: DataRecord) -> Result<()> {
        self.ensure_room()?;
        match &mut self.entries {
            Entries::Records(r) => {
                r.push(record);
                Ok(())
            }
            Entries::Resources(_) => Err(StoreError::InvalidDatabase(format!(
                "{} is a resource database and cannot hold data records",
                self.header.name
            ))),
        }
    }

    /// Append a resource. Fails on a data database or a full one.
    pub fn push_resource(&mut self, resource: ResourceEntry) -> Result<()> {
        self.ensure_room()?;
        match &mut self.entries {
            Entries::Resources(r) => {
                r.push(resource);
                Ok(())
            }
            Entries::Records(_) => Err(StoreError::InvalidDatabase(format!(
                "{} is a data database and cannot hold resources",
                self.header.name
            ))),
        }
    }

    fn ensure_room(&self) -> Result<()> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(StoreError::InvalidDatabase(format!(
                "{} already holds the maximum of {MAX_ENTRIES} entries",
                self.header.name
            )));
        }
        Ok(())
    }

    /// Summary suitable for listings and JSON output.
    #[must_use]
    pub fn summary(&self) -> DatabaseSummary {
        DatabaseSummary {
            name: self.header.name.clone(),
            file_name: self.file_name(),
            kind: if self.is_resource_db() { "prc" } else { "pdb" },
            type_code: self.header.type_code,
            creator: self.header.creator,
            version: self.header.version,
            attributes: self.header.attributes,
            entry_count: self.entries.len(),
            created_at: self.header.created_at(),
            modified_at: self.header.modified_at(),
        }
    }
}

fn to_offset(at: usize) -> Result<u32> {
    u32::try_from(at).map_err(|_| {
        StoreError::InvalidDatabase(format!("data offset {at} does not fit in 32 bits"))
    })
}

/// Resolves block extents: a block runs to the next block's start in file
/// order, or, for out-of-order layouts, to the nearest greater start.
struct BlockLayout {
    ranges: Vec<(usize, usize)>,
}

impl BlockLayout {
    fn new(starts: &[usize], total: usize) -> Self {
        let mut sorted = starts.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let ranges = starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = match starts.get(i + 1) {
                    Some(&next) if next >= start => next,
                    _ => sorted
                        .iter()
                        .copied()
                        .find(|&s| s > start)
                        .unwrap_or(total),
                };
                (start, end)
            })
            .collect();
        Self { ranges }
    }

    fn slice<'a>(&self, buf: &'a [u8], index: usize) -> &'a [u8] {
        let (start, end) = self.ranges[index];
        &buf[start..end]
    }
}

/// Listing view of a database.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSummary {
    pub name: String,
    pub file_name: String,
    pub kind: &'static str,
    #[serde(rename = "type")]
    pub type_code: TypeCode,
    pub creator: TypeCode,
    pub version: u16,
    pub attributes: DatabaseAttributes,
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}
