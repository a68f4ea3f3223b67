//! Method definitions, method references and decoded instructions.
//!
//! Only the handful of opcodes the allocation scan cares about are told apart;
//! every other instruction is kept as [`OpCode::Other`] so IL offsets and
//! source positions stay intact for the backward attribution walk.

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumString};

use crate::metadata::{
    token::Token,
    typesystem::{full_name, TypeReference},
};

bitflags! {
    /// Dispatch-relevant attributes of a method definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u32 {
        /// Method occupies a virtual slot
        const VIRTUAL = 0x0000_0001;
        /// Method has no implementation
        const ABSTRACT = 0x0000_0002;
        /// Method has no `this` argument
        const STATIC = 0x0000_0004;
    }
}

/// Instruction kinds that matter to the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum OpCode {
    /// `call`: direct call
    Call,
    /// `callvirt`: virtual call
    Callvirt,
    /// `calli`: indirect call through a function pointer
    Calli,
    /// `box`: value type to heap object
    Box,
    /// `newarr`: single-dimensional array allocation
    Newarr,
    /// `newobj`: object construction
    Newobj,
    /// Anything else
    Other,
}

impl OpCode {
    /// Maps an instruction mnemonic onto the opcode kinds the scan distinguishes.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Self {
        mnemonic.parse().unwrap_or(OpCode::Other)
    }
}

/// A source location attached to an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Document path or URL as recorded in the debug symbols
    pub document: String,
    /// 1-based start line
    pub line: u32,
}

impl SourcePosition {
    /// Creates a new position.
    #[must_use]
    pub fn new(document: impl Into<String>, line: u32) -> Self {
        SourcePosition {
            document: document.into(),
            line,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.document, self.line)
    }
}

/// Return and parameter types of a method, rendered as type names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Return type name
    pub return_type: String,
    /// Parameter type names in declaration order
    pub params: Vec<String>,
}

impl MethodSignature {
    /// Creates a signature from a return type and parameter type names.
    #[must_use]
    pub fn new<S: Into<String>>(return_type: impl Into<String>, params: impl IntoIterator<Item = S>) -> Self {
        MethodSignature {
            return_type: return_type.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// `System.Void` return, no parameters.
    #[must_use]
    pub fn void() -> Self {
        Self::new("System.Void", Vec::<String>::new())
    }
}

impl Default for MethodSignature {
    fn default() -> Self {
        Self::void()
    }
}

/// A reference to a method at a call or construction site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodReference {
    /// Type that declares the referenced method
    pub declaring_type: TypeReference,
    /// Method name
    pub name: String,
    /// The `MethodDef` token, if the method is defined in the loaded module
    pub definition: Option<Token>,
}

impl MethodReference {
    /// A reference to a method outside the loaded module.
    #[must_use]
    pub fn new(declaring_type: TypeReference, name: impl Into<String>) -> Self {
        MethodReference {
            declaring_type,
            name: name.into(),
            definition: None,
        }
    }

    /// Marks this reference as resolving to `token` in the loaded module.
    #[must_use]
    pub fn defined_as(mut self, token: Token) -> Self {
        self.definition = Some(token);
        self
    }
}

impl fmt::Display for MethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

/// An instruction operand, reduced to what the scan inspects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Operand {
    /// No operand, or one the scan ignores
    #[default]
    None,
    /// A method operand (`call`, `callvirt`, `newobj`)
    Method(MethodReference),
    /// A type operand (`box`, `newarr`)
    Type(TypeReference),
}

/// One decoded instruction of a method body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Offset of the instruction within the method's IL stream
    pub offset: u32,
    /// Instruction kind
    pub opcode: OpCode,
    /// Operand
    pub operand: Operand,
    /// Source position, present only where the debug symbols put a sequence point
    pub position: Option<SourcePosition>,
}

impl Instruction {
    /// Creates an instruction without a source position.
    #[must_use]
    pub fn new(offset: u32, opcode: OpCode, operand: Operand) -> Self {
        Instruction {
            offset,
            opcode,
            operand,
            position: None,
        }
    }

    /// A `call` to `target`.
    #[must_use]
    pub fn call(offset: u32, target: MethodReference) -> Self {
        Self::new(offset, OpCode::Call, Operand::Method(target))
    }

    /// A `callvirt` to `target`.
    #[must_use]
    pub fn callvirt(offset: u32, target: MethodReference) -> Self {
        Self::new(offset, OpCode::Callvirt, Operand::Method(target))
    }

    /// A `newobj` of the type declaring `ctor`.
    #[must_use]
    pub fn newobj(offset: u32, ctor: MethodReference) -> Self {
        Self::new(offset, OpCode::Newobj, Operand::Method(ctor))
    }

    /// A `newarr` of `element`.
    #[must_use]
    pub fn newarr(offset: u32, element: TypeReference) -> Self {
        Self::new(offset, OpCode::Newarr, Operand::Type(element))
    }

    /// A `box` of `value_type`.
    #[must_use]
    pub fn boxing(offset: u32, value_type: TypeReference) -> Self {
        Self::new(offset, OpCode::Box, Operand::Type(value_type))
    }

    /// Any instruction the scan does not inspect.
    #[must_use]
    pub fn other(offset: u32) -> Self {
        Self::new(offset, OpCode::Other, Operand::None)
    }

    /// Attaches a source position.
    #[must_use]
    pub fn at(mut self, document: impl Into<String>, line: u32) -> Self {
        self.position = Some(SourcePosition::new(document, line));
        self
    }
}

/// A method declared by the loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefinition {
    /// The `MethodDef` token of this method
    pub token: Token,
    /// Method name
    pub name: String,
    /// `TypeDef` token of the declaring type
    pub declaring_type: Token,
    /// Return and parameter types
    pub signature: MethodSignature,
    /// Virtual / abstract / static attributes
    pub flags: MethodFlags,
    /// Decoded body; `None` for abstract, extern and runtime-implemented methods
    pub body: Option<Vec<Instruction>>,
}

impl MethodDefinition {
    /// `true` if the method has a decoded body to scan.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// The body's instructions, empty for methods without a body.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        self.body.as_deref().unwrap_or(&[])
    }

    /// A [`MethodReference`] resolving back to this definition.
    #[must_use]
    pub fn reference(&self, declaring_type: TypeReference) -> MethodReference {
        MethodReference::new(declaring_type, self.name.clone()).defined_as(self.token)
    }

    /// Renders the canonical `Return Namespace.Type::Name(Params)` form.
    #[must_use]
    pub fn full_name(&self, namespace: &str, type_name: &str) -> String {
        format!(
            "{} {}::{}({})",
            self.signature.return_type,
            full_name(namespace, type_name),
            self.name,
            self.signature.params.join(",")
        )
    }
}
