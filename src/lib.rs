// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # allocscope
//!
//! Static heap-allocation auditing for .NET (ECMA-335) modules. Starting from one
//! entry method, `allocscope` follows every statically resolvable call through
//! the module's method bodies and reports each instruction that obtains heap
//! memory: object construction (`newobj`), array creation (`newarr`) and boxing
//! (`box`), together with its source line and the chain of callers leading to it.
//!
//! ## Features
//!
//! - **Deterministic traversal** - Methods are processed in identity order, so two runs render the same report
//! - **Override expansion** - Virtual and interface calls reach every type sharing the method slot
//! - **Namespace pruning** - Framework namespaces (`System` by default) are never traversed
//! - **Source attribution** - Positions come from standalone Portable PDB files
//! - **Model-agnostic** - The analysis runs against the [`MetadataProvider`] trait
//!
//! ## Quick Start
//!
//! ```rust
//! use allocscope::prelude::*;
//!
//! let mut builder = ModuleBuilder::new("Demo");
//! let program = builder.add_class("Demo", "Program");
//! let widget = builder.add_class("Demo", "Widget");
//! let ctor = builder.add_method(widget, ".ctor", MethodSignature::void(), MethodFlags::empty())?;
//! let main = builder.add_method(program, "Main", MethodSignature::void(), MethodFlags::STATIC)?;
//! builder.set_body(main, vec![
//!     Instruction::newobj(0, builder.method_ref(ctor)?).at("Program.cs", 7),
//! ])?;
//! let module = builder.build();
//!
//! let report = Worklist::new(&module, ScanConfig::default()).run("Program", "Main")?;
//! let text = Reporter::new(&report).render();
//! assert!(text.ends_with("Program.cs:7: new Demo.Widget\n"));
//! # Ok::<(), allocscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - The module model, the [`MetadataProvider`] seam and the Portable PDB reader
//! - [`analysis`] - Allocation classification, dispatch resolution and the traversal
//! - [`report`] - Text and structured rendering of a [`ScanReport`]
//! - [`config`] - [`ScanConfig`]
//!
//! Loading a module from a PE file is left to the `allocscope` command line
//! tool, which builds a [`Module`] from `dotscope`'s metadata model.
#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use allocscope::prelude::*;
///
/// let module = ModuleBuilder::new("Empty").build();
/// assert!(module.find_type("Program").is_none());
/// ```
pub mod prelude;

/// The allocation analysis
///
/// Classification of allocation instructions, resolution of call sites and
/// the worklist traversal over the call graph.
///
/// # Key Types
///
/// - [`analysis::Worklist`] - Runs the traversal from a root method
/// - [`analysis::ScanReport`] - The scanned methods and their allocations
/// - [`analysis::DispatchResolver`] - Call target resolution with override expansion
/// - [`analysis::AllocationRecord`] - One allocation site
pub mod analysis;

/// Scan configuration
pub mod config;

/// The module model and Portable PDB reader
pub mod metadata;

/// Rendering of scan reports
pub mod report;

/// `allocscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `allocscope` Error type
///
/// # Examples
///
/// ```rust
/// use allocscope::{Error, ModuleBuilder, ScanConfig, Worklist};
///
/// let module = ModuleBuilder::new("Demo").build();
/// match Worklist::new(&module, ScanConfig::default()).run("Demo.Program", "Main") {
///     Ok(report) => println!("{} methods scanned", report.len()),
///     Err(Error::TypeNotFound(name)) => println!("No type {}", name),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

pub use analysis::{ScanReport, ScanStats, Worklist};
pub use config::ScanConfig;
pub use metadata::{
    module::{Module, ModuleBuilder},
    pdb::PortablePdb,
    provider::MetadataProvider,
};
pub use report::{ReportAllocation, ReportEntry, Reporter};
