//! Raw byte access for symbol files.
//!
//! Symbol files are either memory-mapped from disk ([`physical::Physical`]) or
//! handed over as an owned buffer ([`memory::Memory`]). Both implement
//! [`Backend`], so the readers on top never care where the bytes live.

pub mod io;
pub mod parser;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use crate::Result;

/// Read-only access to the bytes of a loaded file.
pub trait Backend: Send + Sync {
    /// The complete file contents.
    fn data(&self) -> &[u8];

    /// Bounds-checked sub-slice of the file.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the file.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let data = self.data();
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if offset_end > data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&data[offset..offset_end])
    }

    /// Size of the file in bytes.
    fn len(&self) -> usize {
        self.data().len()
    }
}
