//! Allocation site classification.
//!
//! Three instructions obtain heap memory in CIL: `newobj` on a reference type,
//! `newarr` and `box`. [`classify`] turns one of them into an
//! [`AllocationRecord`]; every other instruction, and a malformed operand on one
//! of the three, yields nothing.
//!
//! Sequence points are sparse (typically one per statement), so the source
//! position of an allocation is the one of the nearest instruction at or before
//! it that carries a position.

use strum::{Display, EnumIter};

use crate::metadata::{
    method::{Instruction, OpCode, Operand, SourcePosition},
    provider::MetadataProvider,
};

/// The kind of heap allocation an instruction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum AllocationKind {
    /// `newobj` of a reference type
    #[strum(serialize = "new")]
    ConstructObject,
    /// `newarr`
    #[strum(serialize = "new[]")]
    AllocateArray,
    /// `box` of a value type
    #[strum(serialize = "box")]
    BoxValue,
}

/// One allocation site inside a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRecord {
    /// What kind of allocation this is
    pub kind: AllocationKind,
    /// Full name of the constructed, element or boxed type
    pub type_name: String,
    /// IL offset of the allocating instruction
    pub offset: u32,
    /// Source position, if the debug symbols cover this instruction
    pub position: Option<SourcePosition>,
}

impl AllocationRecord {
    /// The source line used for ordering; 0 when the position is unknown.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.position.as_ref().map_or(0, |position| position.line)
    }
}

/// Finds the source position of `body[index]` by walking back to the nearest
/// instruction that carries one.
#[must_use]
pub fn attribute(body: &[Instruction], index: usize) -> Option<SourcePosition> {
    let end = index.checked_add(1)?.min(body.len());
    body[..end]
        .iter()
        .rev()
        .find_map(|instruction| instruction.position.clone())
}

/// Classifies `body[index]`.
///
/// Value types constructed with `newobj` live on the stack and are not
/// reported. Whether the constructed type is a value type is taken from its
/// definition when the module defines it, and from the reference otherwise.
pub fn classify<P>(provider: &P, body: &[Instruction], index: usize) -> Option<AllocationRecord>
where
    P: MetadataProvider + ?Sized,
{
    let instruction = body.get(index)?;

    let (kind, type_name) = match (instruction.opcode, &instruction.operand) {
        (OpCode::Newobj, Operand::Method(ctor)) => {
            let constructed = &ctor.declaring_type;
            let is_value_type = provider
                .resolve_type(constructed)
                .map_or(constructed.is_value_type, |definition| {
                    definition.is_value_type()
                });
            if is_value_type {
                return None;
            }
            (AllocationKind::ConstructObject, constructed.full_name())
        }
        (OpCode::Newarr, Operand::Type(element)) => {
            (AllocationKind::AllocateArray, element.full_name())
        }
        (OpCode::Box, Operand::Type(boxed)) => (AllocationKind::BoxValue, boxed.full_name()),
        _ => return None,
    };

    Some(AllocationRecord {
        kind,
        type_name,
        offset: instruction.offset,
        position: attribute(body, index),
    })
}
