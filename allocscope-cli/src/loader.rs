//! Converts a dotscope `CilObject` into the allocscope module model.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use log::{debug, warn};

use allocscope::{
    metadata::{
        method::{
            Instruction, MethodDefinition, MethodFlags, MethodReference, MethodSignature, OpCode,
            Operand,
        },
        module::{Module, ModuleBuilder},
        token::Token,
        typesystem::{full_name, TypeDefinition, TypeFlags, TypeReference},
    },
    PortablePdb,
};
use dotscope::{
    assembly::{Instruction as CilInstruction, Operand as CilOperand},
    metadata::{
        method::Method,
        signatures::TypeSignature,
        tables::{MemberRefSignature, TypeAttributes},
        token::Token as CilToken,
        typesystem::{CilTypeRc, CilTypeReference},
    },
    CilObject,
};

const TABLE_TYPE_DEF: u8 = 0x02;
const TABLE_METHOD_DEF: u8 = 0x06;
const TABLE_MEMBER_REF: u8 = 0x0A;
const TABLE_METHOD_SPEC: u8 = 0x2B;

/// Loads `path`, converts it and attaches source positions from the PDB at `pdb`.
///
/// A missing PDB at the default location only costs source positions; an
/// explicitly requested PDB must exist and parse.
pub fn load_module(path: &Path, pdb: (PathBuf, bool)) -> anyhow::Result<Module> {
    let assembly = CilObject::from_path(path)
        .with_context(|| format!("failed to load module: {}", path.display()))?;

    let name = path
        .file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().to_string());
    let mut module = Converter::new(&assembly).convert(name)?;

    let (pdb_path, explicit) = pdb;
    if explicit || pdb_path.is_file() {
        let symbols = PortablePdb::from_path(&pdb_path)
            .with_context(|| format!("failed to load debug symbols: {}", pdb_path.display()))?;
        let attached = symbols
            .apply(&mut module)
            .with_context(|| format!("failed to read sequence points: {}", pdb_path.display()))?;
        debug!("{} source positions from {}", attached, pdb_path.display());
    } else {
        warn!(
            "No debug symbols at {}, allocations are reported without source lines",
            pdb_path.display()
        );
    }

    Ok(module)
}

fn local_token(token: CilToken) -> Token {
    Token::new(token.value())
}

/// Name of a signature type in `Namespace.Name` form.
fn primitive_name(signature: &TypeSignature) -> Option<&'static str> {
    let name = match signature {
        TypeSignature::Void => "System.Void",
        TypeSignature::Boolean => "System.Boolean",
        TypeSignature::Char => "System.Char",
        TypeSignature::I1 => "System.SByte",
        TypeSignature::U1 => "System.Byte",
        TypeSignature::I2 => "System.Int16",
        TypeSignature::U2 => "System.UInt16",
        TypeSignature::I4 => "System.Int32",
        TypeSignature::U4 => "System.UInt32",
        TypeSignature::I8 => "System.Int64",
        TypeSignature::U8 => "System.UInt64",
        TypeSignature::R4 => "System.Single",
        TypeSignature::R8 => "System.Double",
        TypeSignature::String => "System.String",
        TypeSignature::I => "System.IntPtr",
        TypeSignature::U => "System.UIntPtr",
        TypeSignature::Object => "System.Object",
        TypeSignature::TypedByRef => "System.TypedReference",
        _ => return None,
    };
    Some(name)
}

fn is_value_type(ty: &CilTypeRc) -> bool {
    if ty.flavor().as_str() == "valuetype" {
        return true;
    }
    ty.base()
        .is_some_and(|base| base.namespace == "System" && (base.name == "ValueType" || base.name == "Enum"))
}

/// The type a `MemberRef` parent points at.
fn declaring_type(parent: &CilTypeReference) -> Option<CilTypeRc> {
    match parent {
        CilTypeReference::TypeRef(ty) | CilTypeReference::TypeDef(ty) | CilTypeReference::TypeSpec(ty) => {
            ty.upgrade()
        }
        _ => None,
    }
}

struct Converter<'a> {
    assembly: &'a CilObject,
    /// TypeDef token to (namespace, name), nested types as `Outer/Inner`
    names: HashMap<Token, (String, String)>,
    /// Full name to TypeDef token, first definition wins
    by_full_name: HashMap<String, Token>,
    /// Declared methods per type: token, name, parameter count
    members: HashMap<Token, Vec<(Token, String, usize)>>,
}

impl<'a> Converter<'a> {
    fn new(assembly: &'a CilObject) -> Self {
        Converter {
            assembly,
            names: HashMap::new(),
            by_full_name: HashMap::new(),
            members: HashMap::new(),
        }
    }

    fn convert(mut self, name: String) -> anyhow::Result<Module> {
        let defined: Vec<CilTypeRc> = self
            .assembly
            .types()
            .all_types()
            .into_iter()
            .filter(|ty| ty.token.table() == TABLE_TYPE_DEF)
            .collect();

        self.collect_names(&defined);
        self.collect_members();

        let mut builder = ModuleBuilder::new(name);
        for ty in &defined {
            builder.insert_type(self.type_definition(ty))?;
        }

        let mut skipped = 0usize;
        for entry in self.assembly.methods().iter() {
            let method = entry.value();
            match self.method_definition(method) {
                Some(definition) => builder.insert_method(definition)?,
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!("{} methods without a declaring type were skipped", skipped);
        }

        let module = builder.build();
        debug!(
            "Converted {} types and {} methods",
            self.names.len(),
            module.method_count()
        );
        Ok(module)
    }

    fn collect_names(&mut self, defined: &[CilTypeRc]) {
        let raw: Vec<(Token, String, String)> = defined
            .iter()
            .map(|ty| (local_token(ty.token), ty.namespace.clone(), ty.name.clone()))
            .collect();

        let mut enclosing: HashMap<Token, Token> = HashMap::new();
        for ty in defined {
            for (_, nested) in ty.nested_types.iter() {
                if let Some(nested) = nested.upgrade() {
                    enclosing.insert(local_token(nested.token), local_token(ty.token));
                }
            }
        }

        for (token, namespace, name) in qualified_names(&raw, &enclosing) {
            self.by_full_name
                .entry(full_name(&namespace, &name))
                .or_insert(token);
            self.names.insert(token, (namespace, name));
        }
    }

    fn collect_members(&mut self) {
        for entry in self.assembly.methods().iter() {
            let method = entry.value();
            let Some(owner) = method.declaring_type_rc() else {
                continue;
            };
            self.members.entry(local_token(owner.token)).or_default().push((
                local_token(method.token),
                method.name.clone(),
                method.signature.params.len(),
            ));
        }
    }

    fn type_definition(&self, ty: &CilTypeRc) -> TypeDefinition {
        let token = local_token(ty.token);
        let (namespace, name) = self
            .names
            .get(&token)
            .cloned()
            .unwrap_or_else(|| (ty.namespace.clone(), ty.name.clone()));

        let mut flags = TypeFlags::empty();
        if ty.flags & TypeAttributes::INTERFACE != 0 {
            flags |= TypeFlags::INTERFACE;
        }
        if ty.flags & TypeAttributes::ABSTRACT != 0 {
            flags |= TypeFlags::ABSTRACT;
        }
        if ty.flags & TypeAttributes::SEALED != 0 {
            flags |= TypeFlags::SEALED;
        }
        if is_value_type(ty) {
            flags |= TypeFlags::VALUE_TYPE;
        }

        let mut definition = TypeDefinition::new(token, namespace, name, flags);
        definition.base = ty.base().map(|base| self.type_reference(&base));
        for (_, interface) in ty.interfaces.iter() {
            if let Some(interface) = interface.upgrade() {
                definition.interfaces.push(self.type_reference(&interface));
            }
        }
        definition
    }

    fn type_reference(&self, ty: &CilTypeRc) -> TypeReference {
        let token = local_token(ty.token);
        let reference = match self.names.get(&token) {
            Some((namespace, name)) => TypeReference::new(namespace.clone(), name.clone()).defined_as(token),
            None => TypeReference::new(ty.namespace.clone(), ty.name.clone()),
        };

        TypeReference {
            is_value_type: is_value_type(ty),
            ..reference
        }
    }

    fn type_reference_for(&self, token: CilToken) -> Option<TypeReference> {
        self.assembly
            .types()
            .get(&token)
            .map(|ty| self.type_reference(&ty))
    }

    fn type_name(&self, signature: &TypeSignature) -> String {
        if let Some(name) = primitive_name(signature) {
            return name.to_string();
        }

        match signature {
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => self
                .type_reference_for(*token)
                .map_or_else(|| format!("{token}"), |reference| reference.full_name()),
            TypeSignature::ByRef(inner) => format!("{}&", self.type_name(inner)),
            TypeSignature::Ptr(pointer) => format!("{}*", self.type_name(&pointer.base)),
            TypeSignature::SzArray(array) => format!("{}[]", self.type_name(&array.base)),
            TypeSignature::Array(array) => format!(
                "{}[{}]",
                self.type_name(&array.base),
                ",".repeat(array.rank.saturating_sub(1) as usize)
            ),
            TypeSignature::GenericInst(base, args) => format!(
                "{}<{}>",
                self.type_name(base),
                args.iter()
                    .map(|arg| self.type_name(arg))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            TypeSignature::GenericParamType(index) => format!("!{index}"),
            TypeSignature::GenericParamMethod(index) => format!("!!{index}"),
            _ => "?".to_string(),
        }
    }

    fn method_definition(&self, method: &Method) -> Option<MethodDefinition> {
        let owner = method.declaring_type_rc()?;

        let params = method.signature.params.iter().map(|param| {
            let name = self.type_name(&param.base);
            if param.by_ref {
                format!("{name}&")
            } else {
                name
            }
        });
        let signature = MethodSignature::new(self.type_name(&method.signature.return_type.base), params);

        let mut flags = MethodFlags::empty();
        if method.is_virtual() {
            flags |= MethodFlags::VIRTUAL;
        }
        if method.is_abstract() {
            flags |= MethodFlags::ABSTRACT;
        }
        if method.is_static() {
            flags |= MethodFlags::STATIC;
        }

        Some(MethodDefinition {
            token: local_token(method.token),
            name: method.name.clone(),
            declaring_type: local_token(owner.token),
            signature,
            flags,
            body: self.body(method),
        })
    }

    fn body(&self, method: &Method) -> Option<Vec<Instruction>> {
        let body = method.body.get()?;
        let code_start = u64::from(method.rva.unwrap_or(0)) + body.size_header as u64;

        let mut instructions = Vec::new();
        for instruction in method.instructions() {
            instructions.push(self.instruction(instruction, code_start));
        }
        instructions.sort_by_key(|instruction| instruction.offset);
        Some(instructions)
    }

    fn instruction(&self, instruction: &CilInstruction, code_start: u64) -> Instruction {
        let offset = u32::try_from(instruction.rva.saturating_sub(code_start)).unwrap_or(u32::MAX);
        let opcode = OpCode::from_mnemonic(&instruction.mnemonic);

        let operand = match (&instruction.operand, opcode) {
            (CilOperand::Token(token), OpCode::Call | OpCode::Callvirt | OpCode::Newobj) => self
                .method_reference(*token)
                .map_or(Operand::None, Operand::Method),
            (CilOperand::Token(token), OpCode::Newarr | OpCode::Box) => self
                .type_reference_for(*token)
                .map_or(Operand::None, Operand::Type),
            _ => Operand::None,
        };

        Instruction::new(offset, opcode, operand)
    }

    fn method_reference(&self, token: CilToken) -> Option<MethodReference> {
        match token.table() {
            TABLE_METHOD_DEF => {
                let method = self.assembly.method(&token)?;
                let owner = method.declaring_type_rc()?;
                Some(
                    MethodReference::new(self.type_reference(&owner), method.name.clone())
                        .defined_as(local_token(token)),
                )
            }
            TABLE_MEMBER_REF => {
                let member = self.assembly.member_ref(&token)?;
                let MemberRefSignature::Method(signature) = &member.signature else {
                    return None;
                };
                let owner = declaring_type(&member.declaredby)?;
                let declaring = self.type_reference(&owner);
                let definition =
                    self.lookup(&declaring.full_name(), &member.name, signature.params.len());

                let reference = MethodReference::new(declaring, member.name.clone());
                Some(match definition {
                    Some(definition) => reference.defined_as(definition),
                    None => reference,
                })
            }
            TABLE_METHOD_SPEC => {
                let spec = self.assembly.method_spec(&token)?;
                let generic = spec.method.token()?;
                if generic.table() == TABLE_METHOD_SPEC {
                    return None;
                }
                self.method_reference(generic)
            }
            _ => None,
        }
    }

    fn lookup(&self, type_name: &str, method: &str, params: usize) -> Option<Token> {
        find_member(&self.by_full_name, &self.members, type_name, method, params)
    }
}

/// Names every type `Outer/Inner` after its enclosing chain, taking the
/// namespace of the outermost type. Keeps the order of `types`.
fn qualified_names(
    types: &[(Token, String, String)],
    enclosing: &HashMap<Token, Token>,
) -> Vec<(Token, String, String)> {
    let raw: HashMap<Token, (&str, &str)> = types
        .iter()
        .map(|(token, namespace, name)| (*token, (namespace.as_str(), name.as_str())))
        .collect();

    types
        .iter()
        .map(|(token, namespace, name)| {
            let mut namespace = namespace.clone();
            let mut name = name.clone();

            let mut current = *token;
            let mut depth = 0;
            while let Some(outer) = enclosing.get(&current) {
                let Some((outer_namespace, outer_name)) = raw.get(outer) else {
                    break;
                };
                // a malformed nesting cycle must not loop forever
                depth += 1;
                if depth > types.len() {
                    break;
                }
                name = format!("{outer_name}/{name}");
                namespace = (*outer_namespace).to_string();
                current = *outer;
            }

            (*token, namespace, name)
        })
        .collect()
}

/// Resolves a member reference to a definition of this module by type name,
/// method name and parameter count.
fn find_member(
    by_full_name: &HashMap<String, Token>,
    members: &HashMap<Token, Vec<(Token, String, usize)>>,
    type_name: &str,
    method: &str,
    params: usize,
) -> Option<Token> {
    let ty = by_full_name.get(type_name)?;
    members
        .get(ty)?
        .iter()
        .find(|(_, name, count)| name == method && *count == params)
        .map(|(token, _, _)| *token)
}
