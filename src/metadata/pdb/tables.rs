//! The `#~` stream of a Portable PDB.
//!
//! Portable PDBs reuse the ECMA-335 table stream layout but only carry the debug
//! tables (`0x30` and up). Of those, only `Document` (0x30) and
//! `MethodDebugInformation` (0x31) are read; both come first in table order, so
//! no schema for the remaining debug tables is needed.

use strum::{EnumIter, IntoEnumIterator};

use crate::{
    file::{
        io::{read_le_at, read_le_at_dyn},
        parser::Parser,
    },
    metadata::pdb::blob::Blob,
    Result,
};

/// Debug table ids defined by the Portable PDB format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum TableId {
    /// Source documents
    Document = 0x30,
    /// Sequence points per method, row-aligned with `MethodDef`
    MethodDebugInformation = 0x31,
    /// Lexical scopes
    LocalScope = 0x32,
    /// Local variables
    LocalVariable = 0x33,
    /// Local constants
    LocalConstant = 0x34,
    /// Import scopes
    ImportScope = 0x35,
    /// Async and iterator state machines
    StateMachineMethod = 0x36,
    /// Custom debug information
    CustomDebugInformation = 0x37,
}

/// `heap_sizes` bit for 4-byte `#GUID` indices.
const HEAP_GUID_LARGE: u8 = 0x02;
/// `heap_sizes` bit for 4-byte `#Blob` indices.
const HEAP_BLOB_LARGE: u8 = 0x04;

/// A row of the `Document` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentRow {
    /// Blob index of the encoded document name
    pub name: u32,
    /// Guid index of the hash algorithm
    pub hash_algorithm: u32,
    /// Blob index of the document hash
    pub hash: u32,
    /// Guid index of the source language
    pub language: u32,
}

/// A row of the `MethodDebugInformation` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDebugRow {
    /// Row of the `Document` table, 0 if the blob names its own initial document
    pub document: u32,
    /// Blob index of the sequence points, 0 if the method has none
    pub sequence_points: u32,
}

/// Decoded header and the two tables the reader needs.
#[derive(Debug, Clone)]
pub struct TablesHeader {
    /// Major version of the table schema
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// `Document` rows in table order
    pub documents: Vec<DocumentRow>,
    /// `MethodDebugInformation` rows in table order
    pub methods: Vec<MethodDebugRow>,
}

impl TablesHeader {
    /// Parses the `#~` stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the stream carries type system
    /// tables and [`crate::Error::OutOfBounds`] for truncated input.
    pub fn from(data: &[u8]) -> Result<TablesHeader> {
        if data.len() < 24 {
            return Err(out_of_bounds_error!());
        }

        let mut offset = 4;
        let major_version = read_le_at::<u8>(data, &mut offset)?;
        let minor_version = read_le_at::<u8>(data, &mut offset)?;
        let heap_sizes = read_le_at::<u8>(data, &mut offset)?;
        offset += 1;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let _sorted = read_le_at::<u64>(data, &mut offset)?;

        if valid & ((1_u64 << TableId::Document as u8) - 1) != 0 {
            return Err(malformed_error!(
                "Type system tables in a Portable PDB tables stream - {:#x}",
                valid
            ));
        }

        let mut row_counts = [0_u32; 64];
        for (table, count) in row_counts.iter_mut().enumerate() {
            if valid & (1_u64 << table) != 0 {
                *count = read_le_at::<u32>(data, &mut offset)?;
            }
        }

        let unknown = TableId::iter().fold(valid, |mask, table| mask & !(1_u64 << table as u8));
        if unknown != 0 {
            return Err(malformed_error!("Unknown debug tables present - {:#x}", unknown));
        }

        let guid_large = heap_sizes & HEAP_GUID_LARGE != 0;
        let blob_large = heap_sizes & HEAP_BLOB_LARGE != 0;

        let index_size = |large: bool| if large { 4 } else { 2 };

        let document_count = row_counts[TableId::Document as usize];
        let document_row_size = 2 * index_size(blob_large) + 2 * index_size(guid_large);
        check_rows(data, offset, document_count, document_row_size)?;
        let mut documents = Vec::with_capacity(document_count as usize);
        for _ in 0..document_count {
            documents.push(DocumentRow {
                name: read_le_at_dyn(data, &mut offset, blob_large)?,
                hash_algorithm: read_le_at_dyn(data, &mut offset, guid_large)?,
                hash: read_le_at_dyn(data, &mut offset, blob_large)?,
                language: read_le_at_dyn(data, &mut offset, guid_large)?,
            });
        }

        let document_index_large = document_count > u32::from(u16::MAX);
        let method_count = row_counts[TableId::MethodDebugInformation as usize];
        let method_row_size = index_size(document_index_large) + index_size(blob_large);
        check_rows(data, offset, method_count, method_row_size)?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(MethodDebugRow {
                document: read_le_at_dyn(data, &mut offset, document_index_large)?,
                sequence_points: read_le_at_dyn(data, &mut offset, blob_large)?,
            });
        }

        Ok(TablesHeader {
            major_version,
            minor_version,
            valid,
            documents,
            methods,
        })
    }

    /// `true` if `table` is present in the stream.
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.valid & (1_u64 << table as u8) != 0
    }
}

/// Fails unless `count` rows of `row_size` bytes fit into `data` after `offset`.
fn check_rows(data: &[u8], offset: usize, count: u32, row_size: usize) -> Result<()> {
    let remaining = data.len().saturating_sub(offset);
    match (count as usize).checked_mul(row_size) {
        Some(needed) if needed <= remaining => Ok(()),
        _ => Err(out_of_bounds_error!()),
    }
}

/// Decodes a document name blob.
///
/// The blob holds a separator byte followed by blob indices of UTF-8 name
/// parts; the name is the parts joined by the separator. A separator of 0 means
/// the parts are concatenated as is.
///
/// # Errors
/// Returns an error if the blob or one of its parts cannot be read.
pub fn document_name(blob: &Blob<'_>, name_index: u32) -> Result<String> {
    let encoded = blob.get(name_index as usize)?;
    if encoded.is_empty() {
        return Ok(String::new());
    }

    let mut parser = Parser::new(encoded);
    let separator = parser.read_le::<u8>()?;

    let mut parts = Vec::new();
    while parser.has_more_data() {
        let part_index = parser.read_compressed_uint()?;
        let part = blob.get(part_index as usize)?;
        parts.push(String::from_utf8_lossy(part).into_owned());
    }

    if separator == 0 {
        Ok(parts.concat())
    } else {
        Ok(parts.join(&char::from(separator).to_string()))
    }
}
