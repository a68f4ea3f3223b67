//! Portable PDB companion files.
//!
//! Source attribution comes from the standalone Portable PDB a compiler writes
//! next to the module. The reader resolves document names eagerly (there are
//! few of them) and decodes sequence point blobs on demand, per method.
//!
//! `MethodDebugInformation` rows are aligned with `MethodDef` rows of the
//! module: row *n* describes method token `0x06000000 | n`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use allocscope::metadata::pdb::PortablePdb;
//! use allocscope::ModuleBuilder;
//!
//! let pdb = PortablePdb::from_path("Program.pdb")?;
//! let mut module = ModuleBuilder::new("Program").build();
//! let attached = pdb.apply(&mut module)?;
//! println!("{} instructions carry a source line", attached);
//! # Ok::<(), allocscope::Error>(())
//! ```

mod blob;
mod root;
mod sequencepoints;
mod tables;

pub use root::{Root, StreamHeader, CIL_HEADER_MAGIC};
pub use sequencepoints::{parse_sequence_points, SequencePoint, HIDDEN_LINE};
pub use tables::{document_name, DocumentRow, MethodDebugRow, TableId, TablesHeader};

use std::path::Path;

use log::debug;

use crate::{
    file::{Backend, Memory, Physical},
    metadata::{
        method::SourcePosition, module::Module, token::Token,
    },
    Error, Result,
};

use blob::Blob;

/// Size of the PDB id at the start of the `#Pdb` stream.
const PDB_ID_LEN: usize = 20;

/// A parsed Portable PDB file.
pub struct PortablePdb {
    data: Box<dyn Backend>,
    blob_offset: usize,
    blob_size: usize,
    id: [u8; PDB_ID_LEN],
    entry_point: Option<Token>,
    documents: Vec<String>,
    methods: Vec<MethodDebugRow>,
}

impl PortablePdb {
    /// Memory-maps and parses the file at `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file cannot be opened, and the
    /// errors of [`PortablePdb::from_mem`] for its content.
    pub fn from_path(path: impl AsRef<Path>) -> Result<PortablePdb> {
        Self::load(Physical::new(path)?)
    }

    /// Parses a Portable PDB image held in memory.
    ///
    /// # Errors
    /// Returns [`Error::Empty`] for empty input, [`Error::NotSupported`] if the
    /// data is not a Portable PDB and [`Error::Malformed`] or
    /// [`Error::OutOfBounds`] for damaged files.
    pub fn from_mem(data: Vec<u8>) -> Result<PortablePdb> {
        Self::load(Memory::new(data))
    }

    fn load<T: Backend + 'static>(backend: T) -> Result<PortablePdb> {
        if backend.len() == 0 {
            return Err(Error::Empty);
        }

        let data = backend.data();
        let root = Root::read(data)?;

        let Some(pdb_stream) = root.stream_data(data, "#Pdb") else {
            return Err(Error::NotSupported);
        };
        if pdb_stream.len() < PDB_ID_LEN + 4 {
            return Err(out_of_bounds_error!());
        }
        let mut id = [0_u8; PDB_ID_LEN];
        id.copy_from_slice(&pdb_stream[..PDB_ID_LEN]);
        let entry_point = Token::new(crate::file::io::read_le::<u32>(&pdb_stream[PDB_ID_LEN..])?);

        let Some(tables_stream) = root.stream_data(data, "#~") else {
            return Err(malformed_error!("Portable PDB without #~ stream"));
        };
        let tables = TablesHeader::from(tables_stream)?;

        let (blob_offset, blob_size) = match root.stream("#Blob") {
            Some(stream) => (stream.offset as usize, stream.size as usize),
            None if tables.documents.is_empty() && tables.methods.is_empty() => (0, 0),
            None => return Err(malformed_error!("Portable PDB without #Blob stream")),
        };

        let mut pdb = PortablePdb {
            data: Box::new(backend),
            blob_offset,
            blob_size,
            id,
            entry_point: (!entry_point.is_null()).then_some(entry_point),
            documents: Vec::new(),
            methods: tables.methods,
        };

        let documents = match pdb.blob()? {
            Some(blob) => tables
                .documents
                .iter()
                .map(|row| document_name(&blob, row.name))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        pdb.documents = documents;

        debug!(
            "Loaded Portable PDB: {} documents, {} method rows",
            pdb.documents.len(),
            pdb.methods.len()
        );

        Ok(pdb)
    }

    fn blob(&self) -> Result<Option<Blob<'_>>> {
        if self.blob_size == 0 {
            return Ok(None);
        }

        let data = self.data.data_slice(self.blob_offset, self.blob_size)?;
        Ok(Some(Blob::from(data)?))
    }

    /// The 20-byte PDB id matching the module's debug directory entry.
    #[must_use]
    pub fn id(&self) -> &[u8; PDB_ID_LEN] {
        &self.id
    }

    /// The entry point method recorded in the PDB, if any.
    #[must_use]
    pub fn entry_point(&self) -> Option<Token> {
        self.entry_point
    }

    /// Document names, indexed by `Document` row - 1.
    #[must_use]
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Number of `MethodDebugInformation` rows.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Decodes all sequence points of `method`, hidden ones included.
    ///
    /// Methods without a row or without sequence points yield an empty list.
    ///
    /// # Errors
    /// Returns an error if the sequence point blob is damaged.
    pub fn sequence_points(&self, method: Token) -> Result<Vec<SequencePoint>> {
        if !method.is_method_def() || method.row() == 0 {
            return Ok(Vec::new());
        }
        let Some(row) = self.methods.get(method.row() as usize - 1) else {
            return Ok(Vec::new());
        };
        if row.sequence_points == 0 {
            return Ok(Vec::new());
        }
        let Some(blob) = self.blob()? else {
            return Ok(Vec::new());
        };

        parse_sequence_points(blob.get(row.sequence_points as usize)?, row.document)
    }

    /// The visible sequence points of `method` as `(il_offset, position)` pairs.
    ///
    /// Hidden points are dropped; they carry no line to report.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if a point references an unknown document,
    /// and the errors of [`PortablePdb::sequence_points`].
    pub fn positions(&self, method: Token) -> Result<Vec<(u32, SourcePosition)>> {
        let mut positions = Vec::new();
        for point in self.sequence_points(method)? {
            if point.is_hidden() {
                continue;
            }

            let document = point
                .document
                .checked_sub(1)
                .and_then(|index| self.documents.get(index as usize))
                .ok_or_else(|| {
                    malformed_error!(
                        "Sequence point of {} references unknown document {}",
                        method,
                        point.document
                    )
                })?;
            positions.push((point.il_offset, SourcePosition::new(document.clone(), point.start_line)));
        }

        Ok(positions)
    }

    /// Attaches source positions to every method body of `module`.
    ///
    /// Returns the number of instructions that received a position.
    ///
    /// # Errors
    /// Returns the first error hit while decoding a method's sequence points.
    pub fn apply(&self, module: &mut Module) -> Result<usize> {
        let tokens: Vec<Token> = module
            .methods()
            .filter(|method| method.has_body())
            .map(|method| method.token)
            .collect();

        let mut attached = 0;
        for token in tokens {
            let positions = self.positions(token)?;
            if !positions.is_empty() {
                attached += module.attach_positions(token, positions)?;
            }
        }

        debug!("Attached {} source positions", attached);
        Ok(attached)
    }
}
