//! Per-method results of a scan.
//!
//! A [`MethodRecord`] ties a reached method to the caller that discovered it
//! and the allocation sites found in its body.

use crate::{
    analysis::allocation::AllocationRecord,
    metadata::{identity::MethodIdentity, token::Token},
};

/// A method discovered by the traversal.
///
/// Records are created when a method is first reached and filled with
/// allocations once it has been scanned. The caller is the identity of the
/// record whose scan discovered this one, so following callers always ends at
/// the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRecord {
    /// Canonical identity of the method
    pub identity: MethodIdentity,
    /// `MethodDef` token of the method
    pub token: Token,
    /// Identity of the method that first discovered this one, `None` for the root
    pub caller: Option<MethodIdentity>,
    /// Allocation sites in instruction order
    pub allocations: Vec<AllocationRecord>,
}

impl MethodRecord {
    /// Creates a record that has not been scanned yet.
    #[must_use]
    pub fn new(identity: MethodIdentity, token: Token, caller: Option<MethodIdentity>) -> Self {
        MethodRecord {
            identity,
            token,
            caller,
            allocations: Vec::new(),
        }
    }

    /// `true` if the scan found at least one allocation.
    #[must_use]
    pub fn has_allocations(&self) -> bool {
        !self.allocations.is_empty()
    }

    /// Allocations ordered by source line; unknown lines sort first and ties
    /// keep instruction order.
    #[must_use]
    pub fn allocations_by_line(&self) -> Vec<&AllocationRecord> {
        let mut ordered: Vec<&AllocationRecord> = self.allocations.iter().collect();
        ordered.sort_by_key(|allocation| allocation.line());
        ordered
    }
}
