//! The read-only view of a module the analysis runs against.
//!
//! [`MetadataProvider`] is the only seam between the traversal and whatever
//! produced the type and method model. The analysis never mutates the model and
//! only holds tokens, identities and borrows into it.

use crate::metadata::{
    identity::MethodIdentity,
    method::{MethodDefinition, MethodReference},
    token::Token,
    typesystem::{TypeDefinition, TypeReference},
};

/// Read-only access to the types, methods and identities of one module.
pub trait MetadataProvider {
    /// All type definitions, in module order.
    fn types(&self) -> &[TypeDefinition];

    /// The type definition behind `token`.
    fn type_def(&self, token: Token) -> Option<&TypeDefinition>;

    /// The method definition behind `token`.
    fn method_def(&self, token: Token) -> Option<&MethodDefinition>;

    /// The canonical identity of the method definition behind `token`.
    fn method_identity(&self, token: Token) -> Option<&MethodIdentity>;

    /// Looks up a type by name.
    ///
    /// A name containing a `.` is compared against full names, anything else
    /// against the bare type name. The first match in module order wins.
    fn find_type(&self, name: &str) -> Option<&TypeDefinition> {
        if name.contains('.') {
            self.types().iter().find(|t| t.full_name() == name)
        } else {
            self.types().iter().find(|t| t.name == name)
        }
    }

    /// The first method named `name` declared directly on the type behind `type_token`.
    fn find_method(&self, type_token: Token, name: &str) -> Option<&MethodDefinition> {
        self.type_def(type_token)?
            .methods
            .iter()
            .filter_map(|token| self.method_def(*token))
            .find(|method| method.name == name)
    }

    /// Resolves a type reference to its definition in this module.
    fn resolve_type(&self, reference: &TypeReference) -> Option<&TypeDefinition> {
        self.type_def(reference.definition?)
    }

    /// Resolves a method reference to its definition in this module.
    fn resolve_method(&self, reference: &MethodReference) -> Option<&MethodDefinition> {
        self.method_def(reference.definition?)
    }
}
