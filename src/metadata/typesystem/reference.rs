//! References: named pointers to entities that may live in another module.
//!
//! A reference records the module it was minted into ([`TypeReference::module`]) and
//! enough structure to be resolved or imported later. It never holds the module that
//! defines the named entity; cross-module edges go through a [`ResolutionScope`] that names
//! the other side.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use crate::{
    metadata::{
        identity::AssemblyNameRc,
        module::{Module, ModuleId, ModuleReferenceRc},
        tables::TableId,
        token::Token,
        typesystem::{
            placeholder_names, GenericOwner, GenericParam, GenericParamKind, MethodHandle,
            MethodSig, TypeSig,
        },
    },
};

/// Reference counted [`ModuleScope`]
pub type ModuleScopeRc = Arc<ModuleScope>;
/// Reference counted [`TypeReference`]
pub type TypeReferenceRc = Arc<TypeReference>;
/// Reference counted [`FieldReference`]
pub type FieldReferenceRc = Arc<FieldReference>;
/// Reference counted [`MethodReference`]
pub type MethodReferenceRc = Arc<MethodReference>;
/// Reference counted [`GenericInstanceMethod`]
pub type GenericInstanceMethodRc = Arc<GenericInstanceMethod>;

/// Identity of a module as seen from the entities it owns.
///
/// The link back to the [`Module`] is weak: a module can be dropped while definitions and
/// references naming it are still alive elsewhere; they then become inert descriptors.
#[derive(Debug)]
pub struct ModuleScope {
    /// Id of the module
    pub id: ModuleId,
    /// Module name (`Lib.dll`)
    pub name: String,
    /// Name of the assembly the module is the manifest module of
    pub assembly: Option<AssemblyNameRc>,
    pub(crate) module: Weak<Module>,
}

impl ModuleScope {
    /// The module, if it is still alive
    #[must_use]
    pub fn module(&self) -> Option<Arc<Module>> {
        self.module.upgrade()
    }
}

/// Where the type named by a [`TypeReference`] is defined
#[derive(Debug, Clone)]
pub enum ResolutionScope {
    /// The module the reference was minted into
    Module(ModuleScopeRc),
    /// Another module of the same assembly
    ModuleRef(ModuleReferenceRc),
    /// Another assembly
    AssemblyRef(AssemblyNameRc),
}

impl ResolutionScope {
    /// The name used to match scopes textually: module or simple assembly name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ResolutionScope::Module(scope) => &scope.name,
            ResolutionScope::ModuleRef(module_ref) => &module_ref.name,
            ResolutionScope::AssemblyRef(assembly) => &assembly.name,
        }
    }
}

impl PartialEq for ResolutionScope {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResolutionScope::Module(a), ResolutionScope::Module(b)) => a.id == b.id,
            (ResolutionScope::ModuleRef(a), ResolutionScope::ModuleRef(b)) => a.name == b.name,
            (ResolutionScope::AssemblyRef(a), ResolutionScope::AssemblyRef(b)) => {
                a.full_name() == b.full_name()
            }
            _ => false,
        }
    }
}

/// A reference to a type by scope, namespace and name
#[derive(Debug)]
pub struct TypeReference {
    /// Module this reference was minted into
    pub module: ModuleId,
    /// `TypeRef` token, nil for references minted by an import
    pub token: Token,
    /// Where the type lives
    pub scope: ResolutionScope,
    /// Namespace, empty for nested types
    pub namespace: String,
    /// Name, including the generic arity suffix (`` List`1 ``)
    pub name: String,
    /// Enclosing type of a nested type
    pub declaring_type: Option<TypeReferenceRc>,
    /// Generic parameter names
    pub generic_parameters: Vec<String>,
    value_type: AtomicBool,
}

impl TypeReference {
    /// Create a reference minted into `module`.
    ///
    /// Generic parameters are derived from the arity suffix of `name`.
    #[must_use]
    pub fn new(
        module: ModuleId,
        scope: ResolutionScope,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let generic_parameters = placeholder_names(GenericParamKind::Type, arity_of(&name));

        TypeReference {
            module,
            token: Token::nil(TableId::TypeRef),
            scope,
            namespace: namespace.into(),
            name,
            declaring_type: None,
            generic_parameters,
            value_type: AtomicBool::new(false),
        }
    }

    /// Set the token
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    /// Set the enclosing type
    #[must_use]
    pub fn with_declaring_type(mut self, declaring_type: TypeReferenceRc) -> Self {
        self.declaring_type = Some(declaring_type);
        self
    }

    /// Set whether the referenced type is a value type
    #[must_use]
    pub fn with_value_type(self, value_type: bool) -> Self {
        self.value_type.store(value_type, Ordering::Release);
        self
    }

    /// Replace the generic parameter names
    #[must_use]
    pub fn with_generic_parameters(mut self, names: Vec<String>) -> Self {
        self.generic_parameters = names;
        self
    }

    /// True if a signature has referred to this type as a value type
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.value_type.load(Ordering::Acquire)
    }

    /// Record that a `VALUETYPE` signature referred to this type
    pub fn mark_value_type(&self) {
        self.value_type.store(true, Ordering::Release);
    }

    /// True for references to nested types
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.declaring_type.is_some()
    }

    /// `Namespace.Name`, or `Outer/Inner` for nested types
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.declaring_type {
            Some(declaring) => format!("{}/{}", declaring.full_name(), self.name),
            None => join_full_name(&self.namespace, &self.name),
        }
    }

    /// The generic parameters, owned by this reference
    #[must_use]
    pub fn generic_params(&self) -> Vec<GenericParam> {
        GenericParam::list(
            GenericParamKind::Type,
            &self.generic_parameters,
            GenericOwner {
                module: Some(self.module),
                name: self.full_name(),
            },
        )
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A reference to a field by declaring type, name and type
#[derive(Debug)]
pub struct FieldReference {
    /// Module this reference was minted into
    pub module: ModuleId,
    /// `MemberRef` token, nil for references minted by an import
    pub token: Token,
    /// Field name
    pub name: String,
    /// Declaring type, possibly a generic instance
    pub declaring_type: TypeSig,
    /// Field type
    pub field_type: TypeSig,
}

impl FieldReference {
    /// `FieldType DeclaringType::Name`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}::{}", self.field_type, self.declaring_type, self.name)
    }
}

/// A reference to a method by declaring type, name and signature
#[derive(Debug)]
pub struct MethodReference {
    /// Module this reference was minted into
    pub module: ModuleId,
    /// `MemberRef` token, nil for references minted by an import
    pub token: Token,
    /// Method name
    pub name: String,
    /// Declaring type, possibly a generic instance
    pub declaring_type: TypeSig,
    /// Signature
    pub signature: MethodSig,
    /// Generic parameter names, one per unit of `signature.generic_arity`
    pub generic_parameters: Vec<String>,
}

impl MethodReference {
    /// Normalized name used to match generic method owners:
    /// `DeclaringType.FullName + "." + Name`, ignoring any instantiation of the declaring type
    #[must_use]
    pub fn normalized_name(&self) -> String {
        normalized_method_name(&self.declaring_type, &self.name)
    }

    /// The generic parameters, owned by this reference
    #[must_use]
    pub fn generic_params(&self) -> Vec<GenericParam> {
        GenericParam::list(
            GenericParamKind::Method,
            &self.generic_parameters,
            GenericOwner {
                module: Some(self.module),
                name: self.normalized_name(),
            },
        )
    }

    /// `ReturnType DeclaringType::Name(Params)`
    #[must_use]
    pub fn full_name(&self) -> String {
        method_full_name(&self.declaring_type, &self.name, &self.signature)
    }
}

/// An instantiation of a generic method (`MethodSpec`)
#[derive(Debug)]
pub struct GenericInstanceMethod {
    /// Module this instantiation was minted into
    pub module: ModuleId,
    /// `MethodSpec` token, nil for instantiations minted by an import
    pub token: Token,
    /// The generic method
    pub element: MethodHandle,
    /// Type arguments
    pub arguments: Vec<TypeSig>,
}

pub(crate) fn join_full_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

pub(crate) fn normalized_method_name(declaring_type: &TypeSig, name: &str) -> String {
    match declaring_type.element_handle() {
        Some(handle) => format!("{}.{}", handle.full_name(), name),
        None => format!("{declaring_type}.{name}"),
    }
}

pub(crate) fn method_full_name(declaring_type: &TypeSig, name: &str, sig: &MethodSig) -> String {
    let params = sig
        .params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{} {}::{}({})", sig.return_type, declaring_type, name, params)
}

/// Generic arity encoded in a type name (`` Dictionary`2 `` has arity 2)
pub(crate) fn arity_of(name: &str) -> u32 {
    name.rsplit_once('`')
        .and_then(|(_, arity)| arity.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::identity::{AssemblyNameReference, AssemblyVersion};

    fn lib_scope() -> ResolutionScope {
        ResolutionScope::AssemblyRef(Arc::new(AssemblyNameReference::new(
            "Lib",
            AssemblyVersion::new(1, 0, 0, 0),
        )))
    }

    #[test]
    fn arity_from_name() {
        assert_eq!(arity_of("List`1"), 1);
        assert_eq!(arity_of("Dictionary`2"), 2);
        assert_eq!(arity_of("Plain"), 0);
        assert_eq!(arity_of("Broken`x"), 0);
    }

    #[test]
    fn nested_full_name() {
        let id = ModuleId::next();
        let outer = Arc::new(TypeReference::new(id, lib_scope(), "N", "Outer"));
        let inner = TypeReference::new(id, lib_scope(), "", "Inner").with_declaring_type(outer);

        assert!(inner.is_nested());
        assert_eq!(inner.full_name(), "N.Outer/Inner");
        assert_eq!(inner.scope.name(), "Lib");
    }

    #[test]
    fn generic_params_owned_by_reference() {
        let id = ModuleId::next();
        let list = TypeReference::new(id, lib_scope(), "System.Collections.Generic", "List`1");
        let params = list.generic_params();

        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "!0");
        let owner = params[0].owner.as_ref().unwrap();
        assert_eq!(owner.module, Some(id));
        assert_eq!(owner.name, "System.Collections.Generic.List`1");
    }

    #[test]
    fn value_type_marking() {
        let reference = TypeReference::new(ModuleId::next(), lib_scope(), "N", "S");
        assert!(!reference.is_value_type());
        reference.mark_value_type();
        assert!(reference.is_value_type());
    }
}
