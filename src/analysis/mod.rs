//! Static allocation analysis.
//!
//! The analysis starts from one root method and follows every call it can
//! resolve statically, collecting the allocation sites of each method it
//! reaches. It is built from four layers, each usable on its own:
//!
//! - [`allocation`] - Classifies `newobj`, `newarr` and `box` and attributes them to source lines
//! - [`dispatch`] - Resolves call sites, expanding virtual and interface calls to overriders
//! - [`scanner`] - Walks one method body, combining the two above
//! - [`worklist`] - Drives the traversal over the whole call graph
//!
//! # Usage
//!
//! ```rust,no_run
//! use allocscope::prelude::*;
//!
//! # fn module() -> Module { ModuleBuilder::new("Demo").build() }
//! let module = module();
//! let report = Worklist::new(&module, ScanConfig::default()).run("Program", "Main")?;
//! for record in report.records().filter(|record| record.has_allocations()) {
//!     println!("{}: {} allocation sites", record.identity, record.allocations.len());
//! }
//! # Ok::<(), allocscope::Error>(())
//! ```

pub mod allocation;
pub mod dispatch;
pub mod record;
pub mod scanner;
pub mod worklist;

pub use allocation::{AllocationKind, AllocationRecord};
pub use dispatch::{CallKind, DispatchResolver, Resolution};
pub use record::MethodRecord;
pub use scanner::{MethodScanner, ScanOutcome};
pub use worklist::{ScanReport, ScanStats, Worklist};
