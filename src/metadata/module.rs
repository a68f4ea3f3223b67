//! The in-memory module model.
//!
//! [`Module`] owns every type definition, method definition and decoded body of
//! one compiled module and implements [`MetadataProvider`] over them. Modules
//! are assembled with [`ModuleBuilder`], which checks that every method belongs
//! to a known type and computes the canonical method identities once, up front.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::{
    metadata::{
        identity::MethodIdentity,
        method::{
            Instruction, MethodDefinition, MethodFlags, MethodReference, MethodSignature,
            SourcePosition,
        },
        provider::MetadataProvider,
        token::Token,
        typesystem::{TypeDefinition, TypeFlags, TypeReference},
    },
    Error, Result,
};

/// A fully decoded module.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    types: Vec<TypeDefinition>,
    type_index: HashMap<Token, usize>,
    methods: BTreeMap<Token, MethodDefinition>,
    identities: HashMap<Token, MethodIdentity>,
}

impl Module {
    /// The module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All method definitions in token order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDefinition> {
        self.methods.values()
    }

    /// Number of method definitions.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Attaches source positions to the instructions of one method body.
    ///
    /// Each `(il_offset, position)` pair is matched against the instruction
    /// starting at exactly that offset; pairs that do not land on an instruction
    /// boundary are ignored. Returns how many instructions received a position.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if `method` is not defined in this module.
    pub fn attach_positions(
        &mut self,
        method: Token,
        points: impl IntoIterator<Item = (u32, SourcePosition)>,
    ) -> Result<usize> {
        let Some(definition) = self.methods.get_mut(&method) else {
            return Err(Error::TokenNotFound(method));
        };
        let Some(body) = definition.body.as_mut() else {
            return Ok(0);
        };

        let mut attached = 0;
        for (offset, position) in points {
            if let Ok(index) = body.binary_search_by_key(&offset, |i| i.offset) {
                body[index].position = Some(position);
                attached += 1;
            }
        }

        Ok(attached)
    }
}

impl MetadataProvider for Module {
    fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    fn type_def(&self, token: Token) -> Option<&TypeDefinition> {
        self.type_index.get(&token).map(|index| &self.types[*index])
    }

    fn method_def(&self, token: Token) -> Option<&MethodDefinition> {
        self.methods.get(&token)
    }

    fn method_identity(&self, token: Token) -> Option<&MethodIdentity> {
        self.identities.get(&token)
    }
}

/// Incrementally assembles a [`Module`].
///
/// Types and methods can either be added with generated tokens (`add_*`) or
/// inserted with the tokens of a real module (`insert_*`); generated rows
/// always continue after the highest row seen so far.
///
/// # Examples
///
/// ```rust
/// use allocscope::prelude::*;
///
/// let mut builder = ModuleBuilder::new("Demo");
/// let program = builder.add_class("Demo", "Program");
/// let main = builder.add_method(program, "Main", MethodSignature::void(), MethodFlags::STATIC)?;
/// builder.set_body(main, vec![Instruction::other(0)])?;
///
/// let module = builder.build();
/// assert_eq!(
///     module.method_identity(main).map(|id| id.as_str()),
///     Some("System.Void Demo.Program::Main()")
/// );
/// # Ok::<(), allocscope::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    name: String,
    types: Vec<TypeDefinition>,
    type_index: HashMap<Token, usize>,
    methods: BTreeMap<Token, MethodDefinition>,
    next_type_row: u32,
    next_method_row: u32,
}

impl ModuleBuilder {
    /// Starts an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        ModuleBuilder {
            name: name.into(),
            next_type_row: 1,
            next_method_row: 1,
            ..Default::default()
        }
    }

    /// Adds a type with a generated token.
    pub fn add_type(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        flags: TypeFlags,
        base: Option<TypeReference>,
    ) -> Token {
        let token = Token::type_def(self.next_type_row);
        let mut definition = TypeDefinition::new(token, namespace, name, flags);
        definition.base = base;
        self.push_type(definition);
        token
    }

    /// Adds a class deriving from `System.Object`.
    pub fn add_class(&mut self, namespace: impl Into<String>, name: impl Into<String>) -> Token {
        self.add_type(
            namespace,
            name,
            TypeFlags::empty(),
            Some(TypeReference::new("System", "Object")),
        )
    }

    /// Adds a struct deriving from `System.ValueType`.
    pub fn add_struct(&mut self, namespace: impl Into<String>, name: impl Into<String>) -> Token {
        self.add_type(
            namespace,
            name,
            TypeFlags::VALUE_TYPE | TypeFlags::SEALED,
            Some(TypeReference::value_type("System", "ValueType")),
        )
    }

    /// Adds an interface.
    pub fn add_interface(&mut self, namespace: impl Into<String>, name: impl Into<String>) -> Token {
        self.add_type(
            namespace,
            name,
            TypeFlags::INTERFACE | TypeFlags::ABSTRACT,
            None,
        )
    }

    /// Inserts a type definition under its own token.
    ///
    /// The definition's method list is rebuilt from the methods inserted later.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateToken`] if the token is already taken.
    pub fn insert_type(&mut self, mut definition: TypeDefinition) -> Result<()> {
        if self.type_index.contains_key(&definition.token) {
            return Err(Error::DuplicateToken(definition.token));
        }

        definition.methods.clear();
        self.push_type(definition);
        Ok(())
    }

    /// Replaces the base type of `ty`.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if `ty` is unknown.
    pub fn set_base(&mut self, ty: Token, base: TypeReference) -> Result<()> {
        self.type_mut(ty)?.base = Some(base);
        Ok(())
    }

    /// Declares that `ty` implements `interface`.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if `ty` is unknown.
    pub fn add_interface_impl(&mut self, ty: Token, interface: TypeReference) -> Result<()> {
        self.type_mut(ty)?.interfaces.push(interface);
        Ok(())
    }

    /// Adds a method without body to `declaring_type`, with a generated token.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if `declaring_type` is unknown.
    pub fn add_method(
        &mut self,
        declaring_type: Token,
        name: impl Into<String>,
        signature: MethodSignature,
        flags: MethodFlags,
    ) -> Result<Token> {
        let token = Token::method_def(self.next_method_row);
        self.insert_method(MethodDefinition {
            token,
            name: name.into(),
            declaring_type,
            signature,
            flags,
            body: None,
        })?;
        Ok(token)
    }

    /// Inserts a method definition under its own token.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if the declaring type is unknown and
    /// [`Error::DuplicateToken`] if the token is already taken.
    pub fn insert_method(&mut self, definition: MethodDefinition) -> Result<()> {
        if self.methods.contains_key(&definition.token) {
            return Err(Error::DuplicateToken(definition.token));
        }

        let token = definition.token;
        self.type_mut(definition.declaring_type)?.methods.push(token);
        self.next_method_row = self.next_method_row.max(token.row() + 1);
        self.methods.insert(token, definition);
        Ok(())
    }

    /// Sets the decoded body of `method`.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if `method` is unknown.
    pub fn set_body(&mut self, method: Token, body: Vec<Instruction>) -> Result<()> {
        let Some(definition) = self.methods.get_mut(&method) else {
            return Err(Error::TokenNotFound(method));
        };

        definition.body = Some(body);
        Ok(())
    }

    /// A reference resolving to the type behind `ty`.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if `ty` is unknown.
    pub fn type_ref(&self, ty: Token) -> Result<TypeReference> {
        match self.type_index.get(&ty) {
            Some(index) => Ok(self.types[*index].reference()),
            None => Err(Error::TokenNotFound(ty)),
        }
    }

    /// A reference resolving to the method behind `method`.
    ///
    /// # Errors
    /// Returns [`Error::TokenNotFound`] if `method` or its declaring type is unknown.
    pub fn method_ref(&self, method: Token) -> Result<MethodReference> {
        let Some(definition) = self.methods.get(&method) else {
            return Err(Error::TokenNotFound(method));
        };

        Ok(definition.reference(self.type_ref(definition.declaring_type)?))
    }

    /// Finishes the module and computes method identities.
    ///
    /// Two definitions rendering to the same signature string would be
    /// indistinguishable to the traversal; the later one (in token order) gets
    /// its token appended to keep identities unique.
    #[must_use]
    pub fn build(self) -> Module {
        let mut identities = HashMap::with_capacity(self.methods.len());
        let mut seen: HashMap<String, Token> = HashMap::with_capacity(self.methods.len());

        for method in self.methods.values() {
            let Some(declaring) = self.type_index.get(&method.declaring_type) else {
                continue;
            };
            let declaring = &self.types[*declaring];

            let mut rendered = method.full_name(&declaring.namespace, &declaring.name);
            if let Some(first) = seen.get(&rendered) {
                warn!(
                    "Method identity `{}` of {} collides with {}, disambiguating",
                    rendered, method.token, first
                );
                rendered = format!("{rendered} [{}]", method.token);
            }

            seen.insert(rendered.clone(), method.token);
            identities.insert(method.token, MethodIdentity::new(rendered));
        }

        Module {
            name: self.name,
            types: self.types,
            type_index: self.type_index,
            methods: self.methods,
            identities,
        }
    }

    fn push_type(&mut self, definition: TypeDefinition) {
        self.next_type_row = self.next_type_row.max(definition.token.row() + 1);
        self.type_index.insert(definition.token, self.types.len());
        self.types.push(definition);
    }

    fn type_mut(&mut self, ty: Token) -> Result<&mut TypeDefinition> {
        match self.type_index.get(&ty) {
            Some(index) => Ok(&mut self.types[*index]),
            None => Err(Error::TokenNotFound(ty)),
        }
    }
}
