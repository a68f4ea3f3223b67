//! # allocscope Prelude
//!
//! The types needed to build or load a module, run a scan and render the result.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all allocscope operations
pub use crate::Error;

/// The result type used throughout allocscope
pub use crate::Result;

// ================================================================================================
// Module Model
// ================================================================================================

/// Metadata token type for referencing definitions
pub use crate::metadata::token::Token;

/// Types and type references
pub use crate::metadata::typesystem::{TypeDefinition, TypeFlags, TypeReference};

/// Methods, method references and instructions
pub use crate::metadata::method::{
    Instruction, MethodDefinition, MethodFlags, MethodReference, MethodSignature, OpCode, Operand,
    SourcePosition,
};

/// Canonical method identity
pub use crate::metadata::identity::MethodIdentity;

/// The in-memory module and its builder
pub use crate::metadata::module::{Module, ModuleBuilder};

/// Read-only access used by the analysis
pub use crate::metadata::provider::MetadataProvider;

/// Portable PDB reader
pub use crate::metadata::pdb::PortablePdb;

// ================================================================================================
// Analysis
// ================================================================================================

/// Traversal configuration
pub use crate::config::ScanConfig;

/// Traversal and results
pub use crate::analysis::{
    AllocationKind, AllocationRecord, MethodRecord, ScanReport, ScanStats, Worklist,
};

// ================================================================================================
// Reporting
// ================================================================================================

/// Text and structured rendering
pub use crate::report::{ReportAllocation, ReportEntry, Reporter};
