//! Metadata root and stream headers of a Portable PDB.
//!
//! A Portable PDB starts directly with an ECMA-335 metadata root (`BSJB`),
//! followed by the headers of its streams. Offsets in the stream headers are
//! relative to the start of the root.

use crate::{
    file::io::{read_le, read_le_at},
    Result,
};

/// Magic signature of an ECMA-335 metadata root, `BSJB`.
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Stream names a Portable PDB may carry.
const VALID_STREAM_NAMES: [&str; 6] = ["#Pdb", "#~", "#Strings", "#US", "#Blob", "#GUID"];

/// Location and name of one metadata stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Stream name, e.g. `#Pdb`
    pub name: String,
}

impl StreamHeader {
    /// Reads one stream header from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for truncated input and
    /// [`crate::Error::Malformed`] for unknown stream names.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(out_of_bounds_error!());
        }

        let name_bytes = &data[8..std::cmp::min(data.len(), 8 + 32)];
        let name_len = name_bytes
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(name_bytes.len());
        let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

        if !VALID_STREAM_NAMES.iter().any(|valid_name| name == *valid_name) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Number of bytes this header occupies, including the 4-byte aligned name.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        8 + (((self.name.len() + 1) + 3) & !3)
    }
}

/// The metadata root: version information and the stream directory.
#[derive(Debug, Clone)]
pub struct Root {
    /// Major version, 1 for all current files
    pub major_version: u16,
    /// Minor version, 1 for all current files
    pub minor_version: u16,
    /// Version string with its zero padding removed
    pub version: String,
    /// Stream headers in file order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parses the metadata root at the start of `data`.
    ///
    /// Every stream range is validated against `data`, so callers may slice
    /// streams without further checks.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if the magic does not match,
    /// [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`] for damaged
    /// headers.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 32 {
            return Err(out_of_bounds_error!());
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(crate::Error::NotSupported);
        }

        let version_string_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(version_end) = version_string_length.checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                version_string_length
            ));
        };
        if version_end + 4 > data.len() {
            return Err(out_of_bounds_error!());
        }

        let version_bytes = &data[16..version_end];
        let version_len = version_bytes
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(version_bytes.len());
        let version = String::from_utf8_lossy(&version_bytes[..version_len]).into_owned();

        let stream_count = read_le_at::<u16>(data, &mut (version_end + 2))?;
        if stream_count == 0 || stream_count as usize > VALID_STREAM_NAMES.len() {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut streams: Vec<StreamHeader> = Vec::with_capacity(stream_count as usize);
        let mut stream_offset = version_end + 4;
        for _ in 0..stream_count {
            if stream_offset > data.len() {
                return Err(out_of_bounds_error!());
            }

            let new_stream = StreamHeader::from(&data[stream_offset..])?;
            match new_stream.offset.checked_add(new_stream.size) {
                Some(range) if range as usize <= data.len() => {}
                Some(_) => return Err(out_of_bounds_error!()),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        new_stream.offset,
                        new_stream.size
                    ))
                }
            }

            if streams.iter().any(|stream| stream.name == new_stream.name) {
                return Err(malformed_error!("Duplicate stream - {}", new_stream.name));
            }

            stream_offset += new_stream.encoded_len();
            streams.push(new_stream);
        }

        Ok(Root {
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            version,
            stream_headers: streams,
        })
    }

    /// The header of the stream called `name`.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }

    /// The bytes of the stream called `name` within `data`.
    ///
    /// `data` must be the buffer this root was read from.
    #[must_use]
    pub fn stream_data<'a>(&self, data: &'a [u8], name: &str) -> Option<&'a [u8]> {
        let stream = self.stream(name)?;
        let start = stream.offset as usize;
        data.get(start..start + stream.size as usize)
    }
}
