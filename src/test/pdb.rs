//! Synthesizes Portable PDB images for reader tests.

/// A sequence point as `(il_offset, Some((line, column)))`, or `None` for hidden.
pub type PointSpec = (u32, Option<(u32, u32)>);

fn write_compressed_uint(out: &mut Vec<u8>, value: u32) {
    if value <= 0x7F {
        out.push(value as u8);
    } else if value <= 0x3FFF {
        out.push(0x80 | (value >> 8) as u8);
        out.push(value as u8);
    } else {
        out.push(0xC0 | (value >> 24) as u8);
        out.push((value >> 16) as u8);
        out.push((value >> 8) as u8);
        out.push(value as u8);
    }
}

fn write_compressed_int(out: &mut Vec<u8>, value: i32) {
    if value >= 0 {
        write_compressed_uint(out, (value as u32) << 1);
    } else if value >= -0x40 {
        out.push((((value + 0x40) as u8) << 1) | 1);
    } else if value >= -0x2000 {
        let rotated = (((value + 0x2000) as u32) << 1) | 1;
        out.push(0x80 | (rotated >> 8) as u8);
        out.push(rotated as u8);
    } else {
        let rotated = (((value + 0x1000_0000) as u32) << 1) | 1;
        out.push(0xC0 | (rotated >> 24) as u8);
        out.push((rotated >> 16) as u8);
        out.push((rotated >> 8) as u8);
        out.push(rotated as u8);
    }
}

fn pad4(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

/// Builder for a minimal but well-formed Portable PDB.
pub struct PdbImage {
    blob: Vec<u8>,
    documents: Vec<u32>,
    methods: Vec<(u32, u32)>,
}

impl PdbImage {
    pub fn new() -> Self {
        PdbImage {
            blob: vec![0],
            documents: Vec::new(),
            methods: Vec::new(),
        }
    }

    fn add_blob(&mut self, bytes: &[u8]) -> u32 {
        if bytes.is_empty() {
            return 0;
        }

        let index = self.blob.len() as u32;
        write_compressed_uint(&mut self.blob, bytes.len() as u32);
        self.blob.extend_from_slice(bytes);
        index
    }

    /// Adds a `/`-separated document and returns its row.
    pub fn add_document(&mut self, name: &str) -> u32 {
        let mut encoded = vec![b'/'];
        for part in name.split('/') {
            let index = self.add_blob(part.as_bytes());
            write_compressed_uint(&mut encoded, index);
        }

        let name_index = self.add_blob(&encoded);
        self.documents.push(name_index);
        self.documents.len() as u32
    }

    /// Adds the next `MethodDebugInformation` row; an empty point list gets no blob.
    pub fn add_method(&mut self, document: u32, points: &[PointSpec]) {
        if points.is_empty() {
            self.methods.push((document, 0));
            return;
        }

        let mut encoded = vec![0x00];
        let mut previous_offset = 0;
        let mut previous_visible: Option<(u32, u32)> = None;
        for (index, (offset, point)) in points.iter().enumerate() {
            let delta = if index == 0 { *offset } else { offset - previous_offset };
            write_compressed_uint(&mut encoded, delta);
            previous_offset = *offset;

            match point {
                None => encoded.extend_from_slice(&[0x00, 0x00]),
                Some((line, column)) => {
                    // single line, four columns wide
                    encoded.extend_from_slice(&[0x00, 0x04]);
                    match previous_visible {
                        None => {
                            write_compressed_uint(&mut encoded, *line);
                            write_compressed_uint(&mut encoded, *column);
                        }
                        Some((previous_line, previous_column)) => {
                            write_compressed_int(&mut encoded, *line as i32 - previous_line as i32);
                            write_compressed_int(&mut encoded, *column as i32 - previous_column as i32);
                        }
                    }
                    previous_visible = Some((*line, *column));
                }
            }
        }

        let index = self.add_blob(&encoded);
        self.methods.push((document, index));
    }

    /// Serializes the image. Entry point is method 1, the PDB id is all `0xAB`.
    pub fn build(&self) -> Vec<u8> {
        let mut pdb = vec![0xAB; 20];
        pdb.extend_from_slice(&0x0600_0001_u32.to_le_bytes());
        pdb.extend_from_slice(&0_u64.to_le_bytes());

        let mut tables = Vec::new();
        tables.extend_from_slice(&0_u32.to_le_bytes());
        tables.extend_from_slice(&[0x02, 0x00, 0x00, 0x01]);
        tables.extend_from_slice(&((1_u64 << 0x30) | (1_u64 << 0x31)).to_le_bytes());
        tables.extend_from_slice(&0_u64.to_le_bytes());
        tables.extend_from_slice(&(self.documents.len() as u32).to_le_bytes());
        tables.extend_from_slice(&(self.methods.len() as u32).to_le_bytes());
        for name in &self.documents {
            tables.extend_from_slice(&(*name as u16).to_le_bytes());
            tables.extend_from_slice(&0_u16.to_le_bytes());
            tables.extend_from_slice(&0_u16.to_le_bytes());
            tables.extend_from_slice(&1_u16.to_le_bytes());
        }
        for (document, points) in &self.methods {
            tables.extend_from_slice(&(*document as u16).to_le_bytes());
            tables.extend_from_slice(&(*points as u16).to_le_bytes());
        }
        pad4(&mut tables);

        let strings = vec![0_u8; 4];
        let guid = vec![0x11_u8; 16];
        let mut blob = self.blob.clone();
        pad4(&mut blob);

        let streams: [(&str, Vec<u8>); 5] = [
            ("#Pdb", pdb),
            ("#~", tables),
            ("#Strings", strings),
            ("#GUID", guid),
            ("#Blob", blob),
        ];

        let version = b"PDB v1.0\0\0\0\0";
        let headers_len: usize = streams
            .iter()
            .map(|(name, _)| 8 + ((name.len() + 1 + 3) & !3))
            .sum();
        let mut offset = 16 + version.len() + 4 + headers_len;

        let mut image = Vec::new();
        image.extend_from_slice(&0x424A_5342_u32.to_le_bytes());
        image.extend_from_slice(&1_u16.to_le_bytes());
        image.extend_from_slice(&1_u16.to_le_bytes());
        image.extend_from_slice(&0_u32.to_le_bytes());
        image.extend_from_slice(&(version.len() as u32).to_le_bytes());
        image.extend_from_slice(version);
        image.extend_from_slice(&0_u16.to_le_bytes());
        image.extend_from_slice(&(streams.len() as u16).to_le_bytes());

        for (name, data) in &streams {
            image.extend_from_slice(&(offset as u32).to_le_bytes());
            image.extend_from_slice(&(data.len() as u32).to_le_bytes());
            image.extend_from_slice(name.as_bytes());
            image.push(0);
            pad4(&mut image);
            offset += data.len();
        }

        for (_, data) in &streams {
            image.extend_from_slice(data);
        }

        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::parser::Parser;

    #[test]
    fn compressed_encoders_match_parser() {
        let mut out = Vec::new();
        for value in [0, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1FFF_FFFF] {
            write_compressed_uint(&mut out, value);
        }
        for value in [0, 3, -3, 63, -64, 64, -65, 8191, -8192, 8192, -8193] {
            write_compressed_int(&mut out, value);
        }

        let mut parser = Parser::new(&out);
        for value in [0, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1FFF_FFFF] {
            assert_eq!(parser.read_compressed_uint().unwrap(), value);
        }
        for value in [0, 3, -3, 63, -64, 64, -65, 8191, -8192, 8192, -8193] {
            assert_eq!(parser.read_compressed_int().unwrap(), value);
        }
        assert!(!parser.has_more_data());
    }
}
