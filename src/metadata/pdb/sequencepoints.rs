//! Sequence point blobs of the `MethodDebugInformation` table.
//!
//! A sequence point maps an IL offset to a span of source text. The blob is
//! delta-encoded with ECMA-335 compressed integers:
//!
//! ```text
//! header:   LocalSignature            compressed uint
//!           InitialDocument           compressed uint, only if the row's Document is nil
//! records:  δIL                       compressed uint, absolute in the first record
//!           δIL == 0 (not first)      document record, followed by a Document row
//!           ΔLines                    compressed uint
//!           ΔColumns                  compressed uint if ΔLines == 0, signed otherwise
//!           ΔLines == ΔColumns == 0   hidden point, nothing follows
//!           δStartLine                compressed uint on the first visible point, signed after
//!           δStartColumn              compressed uint on the first visible point, signed after
//! ```
//!
//! Visible points are delta-encoded against the previous *visible* point;
//! hidden points and document records do not take part in the line deltas.
//!
//! See the Portable PDB format description, section "Sequence Points Blob".

use crate::{file::parser::Parser, Result};

/// Start line value reported for hidden sequence points.
pub const HIDDEN_LINE: u32 = 0x00FE_EFEE;

/// One decoded sequence point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePoint {
    /// Offset in the method's IL stream
    pub il_offset: u32,
    /// Row of the `Document` table this point belongs to
    pub document: u32,
    /// Starting line (1-based), [`HIDDEN_LINE`] for hidden points
    pub start_line: u32,
    /// Starting column (1-based)
    pub start_column: u32,
    /// Ending line
    pub end_line: u32,
    /// Ending column, exclusive
    pub end_column: u32,
}

impl SequencePoint {
    /// `true` if this point hides compiler-generated code from the debugger.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.start_line == HIDDEN_LINE
    }
}

fn apply_delta(base: u32, delta: i32) -> Result<u32> {
    match base.checked_add_signed(delta) {
        Some(value) => Ok(value),
        None => Err(malformed_error!(
            "Sequence point delta {} moves {} out of range",
            delta,
            base
        )),
    }
}

/// Decodes a sequence points blob.
///
/// `row_document` is the `Document` column of the owning `MethodDebugInformation`
/// row; when it is 0 the blob names its initial document itself.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for inconsistent deltas and
/// [`crate::Error::OutOfBounds`] for truncated blobs.
pub fn parse_sequence_points(blob: &[u8], row_document: u32) -> Result<Vec<SequencePoint>> {
    let mut parser = Parser::new(blob);
    let mut points = Vec::new();

    let _local_signature = parser.read_compressed_uint()?;
    let mut document = if row_document == 0 {
        parser.read_compressed_uint()?
    } else {
        row_document
    };

    let mut il_offset = 0_u32;
    let mut first_record = true;
    let mut previous_visible: Option<(u32, u32)> = None;

    while parser.has_more_data() {
        let delta_il = parser.read_compressed_uint()?;
        if !first_record && delta_il == 0 {
            document = parser.read_compressed_uint()?;
            continue;
        }

        il_offset = if first_record {
            delta_il
        } else {
            match il_offset.checked_add(delta_il) {
                Some(offset) => offset,
                None => return Err(malformed_error!("IL offset overflow in sequence points")),
            }
        };
        first_record = false;

        let delta_lines = parser.read_compressed_uint()?;
        let delta_columns = if delta_lines == 0 {
            i64::from(parser.read_compressed_uint()?)
        } else {
            i64::from(parser.read_compressed_int()?)
        };

        if delta_lines == 0 && delta_columns == 0 {
            points.push(SequencePoint {
                il_offset,
                document,
                start_line: HIDDEN_LINE,
                start_column: 0,
                end_line: HIDDEN_LINE,
                end_column: 0,
            });
            continue;
        }

        let (start_line, start_column) = match previous_visible {
            None => (parser.read_compressed_uint()?, parser.read_compressed_uint()?),
            Some((line, column)) => (
                apply_delta(line, parser.read_compressed_int()?)?,
                apply_delta(column, parser.read_compressed_int()?)?,
            ),
        };

        let end_line = start_line
            .checked_add(delta_lines)
            .ok_or_else(|| malformed_error!("End line overflow in sequence points"))?;
        let end_column = u32::try_from(i64::from(start_column) + delta_columns)
            .map_err(|_| malformed_error!("End column out of range in sequence points"))?;

        previous_visible = Some((start_line, start_column));
        points.push(SequencePoint {
            il_offset,
            document,
            start_line,
            start_column,
            end_line,
            end_column,
        });
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn single_point() {
        // signature 0, offset 0, ΔLines 0, ΔColumns 9, line 10, column 5
        let blob = [0x00, 0x00, 0x00, 0x09, 0x0A, 0x05];
        let points = parse_sequence_points(&blob, 1).unwrap();

        assert_eq!(
            points,
            vec![SequencePoint {
                il_offset: 0,
                document: 1,
                start_line: 10,
                start_column: 5,
                end_line: 10,
                end_column: 14,
            }]
        );
    }

    #[test]
    fn deltas_hidden_and_documents() {
        #[rustfmt::skip]
        let blob = [
            0x00,                   // local signature
            0x02,                   // initial document (row document is nil)
            0x01, 0x00, 0x04, 0x0A, 0x09,   // il 1: line 10, col 9..13
            0x05, 0x02, 0x04, 0x06, 0x7F,   // il 6: ΔLines 2, ΔCols +2, line +3, col -1
            0x03, 0x00, 0x00,               // il 9: hidden
            0x00, 0x03,                     // switch to document 3
            0x02, 0x00, 0x01, 0x7B, 0x00,   // il 11: line -3, col +0
        ];
        let points = parse_sequence_points(&blob, 0).unwrap();
        assert_eq!(points.len(), 4);

        assert_eq!((points[0].il_offset, points[0].document), (1, 2));
        assert_eq!((points[0].start_line, points[0].start_column), (10, 9));
        assert_eq!((points[0].end_line, points[0].end_column), (10, 13));

        assert_eq!(points[1].il_offset, 6);
        assert_eq!((points[1].start_line, points[1].start_column), (13, 8));
        assert_eq!((points[1].end_line, points[1].end_column), (15, 10));

        assert_eq!(points[2].il_offset, 9);
        assert!(points[2].is_hidden());

        // deltas continue from the last visible point, not the hidden one
        assert_eq!((points[3].il_offset, points[3].document), (11, 3));
        assert_eq!((points[3].start_line, points[3].start_column), (10, 8));
        assert!(!points[3].is_hidden());
    }

    #[test]
    fn empty_body() {
        assert!(parse_sequence_points(&[0x00], 1).unwrap().is_empty());
    }

    #[test]
    fn negative_line_rejected() {
        #[rustfmt::skip]
        let blob = [
            0x00,
            0x00, 0x00, 0x01, 0x02, 0x01,   // line 2
            0x01, 0x00, 0x01, 0x79, 0x00,   // line 2 - 4
        ];
        assert!(matches!(
            parse_sequence_points(&blob, 1),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn truncated() {
        let blob = [0x00, 0x00, 0x00, 0x09];
        assert!(matches!(
            parse_sequence_points(&blob, 1),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
