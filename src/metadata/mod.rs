//! The module model the analysis runs against.
//!
//! A loaded module is reduced to what a call-graph walk needs: type definitions
//! with their hierarchy, method definitions with signatures and decoded bodies,
//! and the tokens tying them together. Everything here is read-only once
//! [`module::ModuleBuilder::build`] has run.
//!
//! # Key Components
//!
//! - [`token::Token`] - ECMA-335 metadata tokens used as handles
//! - [`typesystem`] - Type definitions and type references
//! - [`method`] - Method definitions, references and decoded instructions
//! - [`identity::MethodIdentity`] - Canonical signature strings used as traversal keys
//! - [`provider::MetadataProvider`] - The read-only seam the analysis uses
//! - [`module`] - The in-memory [`module::Module`] and its builder
//! - [`pdb`] - Portable PDB reader for source positions

/// Method identities
pub mod identity;
/// Methods, instructions and method references
pub mod method;
/// The in-memory module model
pub mod module;
/// Portable PDB companion files
pub mod pdb;
/// The read-only metadata seam
pub mod provider;
/// Metadata tokens
pub mod token;
/// Types and type references
pub mod typesystem;
