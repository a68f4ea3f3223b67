//! Type definitions and type references.
//!
//! A [`TypeDefinition`] is a type declared by the loaded module and owns the list
//! of its method tokens. A [`TypeReference`] is what an instruction operand or a
//! base-type slot points at; it may name a type from another module, in which
//! case it carries no definition token and the traversal treats it as opaque.

use std::fmt;

use bitflags::bitflags;

use crate::metadata::token::Token;

/// Full name of the universal root type; base chains stop here.
pub const SYSTEM_OBJECT: &str = "System.Object";

bitflags! {
    /// Classification bits of a type definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u32 {
        /// The type is an interface
        const INTERFACE = 0x0000_0001;
        /// The type is a value type (struct or enum)
        const VALUE_TYPE = 0x0000_0002;
        /// The type is abstract
        const ABSTRACT = 0x0000_0004;
        /// The type is sealed
        const SEALED = 0x0000_0008;
    }
}

/// Joins a namespace and a type name the way metadata full names are written.
#[must_use]
pub fn full_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// A reference to a type, as it appears in operands, base types and interface lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeReference {
    /// Namespace, empty for the global namespace.
    pub namespace: String,
    /// Type name. Nested types are written `Outer/Inner`.
    pub name: String,
    /// Whether the referenced type is known to be a value type
    pub is_value_type: bool,
    /// The `TypeDef` token, if the type is defined in the loaded module
    pub definition: Option<Token>,
}

impl TypeReference {
    /// A reference to a reference type outside the loaded module.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeReference {
            namespace: namespace.into(),
            name: name.into(),
            is_value_type: false,
            definition: None,
        }
    }

    /// A reference to a value type outside the loaded module.
    #[must_use]
    pub fn value_type(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        TypeReference {
            is_value_type: true,
            ..Self::new(namespace, name)
        }
    }

    /// Marks this reference as resolving to `token` in the loaded module.
    #[must_use]
    pub fn defined_as(mut self, token: Token) -> Self {
        self.definition = Some(token);
        self
    }

    /// `Namespace.Name`, or just `Name` in the global namespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        full_name(&self.namespace, &self.name)
    }

    /// `true` if this names the universal root type.
    #[must_use]
    pub fn is_system_object(&self) -> bool {
        self.namespace == "System" && self.name == "Object"
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// A type declared by the loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// The `TypeDef` token of this type
    pub token: Token,
    /// Namespace. Nested types carry the namespace of their outermost enclosing type.
    pub namespace: String,
    /// Type name. Nested types are written `Outer/Inner`.
    pub name: String,
    /// Interface / value type / abstract / sealed classification
    pub flags: TypeFlags,
    /// Direct base type; `None` for interfaces and the root type itself
    pub base: Option<TypeReference>,
    /// Directly declared interfaces, in declaration order
    pub interfaces: Vec<TypeReference>,
    /// Declared methods, in declaration order
    pub methods: Vec<Token>,
}

impl TypeDefinition {
    /// Creates an empty definition without base type, interfaces or methods.
    #[must_use]
    pub fn new(
        token: Token,
        namespace: impl Into<String>,
        name: impl Into<String>,
        flags: TypeFlags,
    ) -> Self {
        TypeDefinition {
            token,
            namespace: namespace.into(),
            name: name.into(),
            flags,
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// `Namespace.Name`, or just `Name` in the global namespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        full_name(&self.namespace, &self.name)
    }

    /// `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeFlags::INTERFACE)
    }

    /// `true` for value types, whether flagged directly or derived from
    /// `System.ValueType` / `System.Enum`.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        if self.flags.contains(TypeFlags::VALUE_TYPE) {
            return true;
        }

        self.base.as_ref().is_some_and(|base| {
            base.namespace == "System" && (base.name == "ValueType" || base.name == "Enum")
        })
    }

    /// A [`TypeReference`] that resolves back to this definition.
    #[must_use]
    pub fn reference(&self) -> TypeReference {
        TypeReference {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            is_value_type: self.is_value_type(),
            definition: Some(self.token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_names() {
        assert_eq!(TypeReference::new("Demo", "Widget").full_name(), "Demo.Widget");
        assert_eq!(TypeReference::new("", "Program").full_name(), "Program");
        assert_eq!(
            TypeReference::new("Demo", "Outer/Inner").to_string(),
            "Demo.Outer/Inner"
        );
    }

    #[test]
    fn value_type_detection() {
        let mut point = TypeDefinition::new(Token::type_def(1), "Demo", "Point", TypeFlags::empty());
        assert!(!point.is_value_type());

        point.base = Some(TypeReference::new("System", "ValueType"));
        assert!(point.is_value_type());
        assert!(point.reference().is_value_type);

        let flagged = TypeDefinition::new(Token::type_def(2), "Demo", "Id", TypeFlags::VALUE_TYPE);
        assert!(flagged.is_value_type());

        let mut color = TypeDefinition::new(Token::type_def(3), "Demo", "Color", TypeFlags::SEALED);
        color.base = Some(TypeReference::new("System", "Enum"));
        assert!(color.is_value_type());
    }

    #[test]
    fn reference_points_back() {
        let widget = TypeDefinition::new(Token::type_def(7), "Demo", "Widget", TypeFlags::empty());
        let reference = widget.reference();

        assert_eq!(reference.definition, Some(Token::type_def(7)));
        assert_eq!(reference.full_name(), widget.full_name());
        assert!(TypeReference::new("System", "Object").is_system_object());
        assert!(!reference.is_system_object());
    }
}
