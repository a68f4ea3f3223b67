mod fixtures;
pub mod pdb;

pub use fixtures::*;
