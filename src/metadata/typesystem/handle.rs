use std::sync::Arc;

use crate::metadata::{
    module::ModuleId,
    token::Token,
    typesystem::{
        FieldDefRc, FieldReferenceRc, GenericInstanceMethodRc, GenericParam, MethodDefRc,
        MethodReferenceRc, MethodSig, TypeDefRc, TypeReferenceRc, TypeSig,
    },
};

/// A named type: either a definition or a reference.
///
/// Equality is identity: two handles are equal if they point at the same entity.
/// Structural comparison lives in [`crate::metadata::typesystem::are_same_handle`].
#[derive(Debug, Clone)]
pub enum TypeHandle {
    /// A type defined by a module
    Definition(TypeDefRc),
    /// A reference to a type
    Reference(TypeReferenceRc),
}

impl TypeHandle {
    /// Module owning the definition, or module the reference was minted into
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        match self {
            TypeHandle::Definition(def) => def.module_id(),
            TypeHandle::Reference(reference) => Some(reference.module),
        }
    }

    /// Token of the row this entity was realized from
    #[must_use]
    pub fn token(&self) -> Token {
        match self {
            TypeHandle::Definition(def) => def.token,
            TypeHandle::Reference(reference) => reference.token,
        }
    }

    /// Namespace
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            TypeHandle::Definition(def) => &def.namespace,
            TypeHandle::Reference(reference) => &reference.namespace,
        }
    }

    /// Name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TypeHandle::Definition(def) => &def.name,
            TypeHandle::Reference(reference) => &reference.name,
        }
    }

    /// `Namespace.Name`, or `Outer/Inner` for nested types
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeHandle::Definition(def) => def.full_name(),
            TypeHandle::Reference(reference) => reference.full_name(),
        }
    }

    /// The enclosing type of a nested type
    #[must_use]
    pub fn declaring_type(&self) -> Option<TypeHandle> {
        match self {
            TypeHandle::Definition(def) => def.declaring_type().map(TypeHandle::Definition),
            TypeHandle::Reference(reference) => reference
                .declaring_type
                .clone()
                .map(TypeHandle::Reference),
        }
    }

    /// True for value types
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self {
            TypeHandle::Definition(def) => def.is_value_type(),
            TypeHandle::Reference(reference) => reference.is_value_type(),
        }
    }

    /// The generic parameters of the type
    #[must_use]
    pub fn generic_params(&self) -> Vec<GenericParam> {
        match self {
            TypeHandle::Definition(def) => def.generic_params(),
            TypeHandle::Reference(reference) => reference.generic_params(),
        }
    }

    /// The definition, if this handle is one
    #[must_use]
    pub fn as_definition(&self) -> Option<&TypeDefRc> {
        match self {
            TypeHandle::Definition(def) => Some(def),
            TypeHandle::Reference(_) => None,
        }
    }

    /// The reference, if this handle is one
    #[must_use]
    pub fn as_reference(&self) -> Option<&TypeReferenceRc> {
        match self {
            TypeHandle::Definition(_) => None,
            TypeHandle::Reference(reference) => Some(reference),
        }
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeHandle::Definition(a), TypeHandle::Definition(b)) => Arc::ptr_eq(a, b),
            (TypeHandle::Reference(a), TypeHandle::Reference(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<TypeDefRc> for TypeHandle {
    fn from(def: TypeDefRc) -> Self {
        TypeHandle::Definition(def)
    }
}

impl From<TypeReferenceRc> for TypeHandle {
    fn from(reference: TypeReferenceRc) -> Self {
        TypeHandle::Reference(reference)
    }
}

/// A field: either a definition or a reference
#[derive(Debug, Clone)]
pub enum FieldHandle {
    /// A field defined by a type
    Definition(FieldDefRc),
    /// A reference to a field
    Reference(FieldReferenceRc),
}

impl FieldHandle {
    /// Module owning the definition, or module the reference was minted into
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        match self {
            FieldHandle::Definition(def) => def.module_id(),
            FieldHandle::Reference(reference) => Some(reference.module),
        }
    }

    /// Name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            FieldHandle::Definition(def) => &def.name,
            FieldHandle::Reference(reference) => &reference.name,
        }
    }

    /// Field type
    #[must_use]
    pub fn field_type(&self) -> &TypeSig {
        match self {
            FieldHandle::Definition(def) => &def.field_type,
            FieldHandle::Reference(reference) => &reference.field_type,
        }
    }

    /// Declaring type, `None` for a definition that was never added to a type
    #[must_use]
    pub fn declaring_type(&self) -> Option<TypeSig> {
        match self {
            FieldHandle::Definition(def) => def
                .declaring_type()
                .map(|declaring| TypeSig::Named(TypeHandle::Definition(declaring))),
            FieldHandle::Reference(reference) => Some(reference.declaring_type.clone()),
        }
    }
}

impl PartialEq for FieldHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldHandle::Definition(a), FieldHandle::Definition(b)) => Arc::ptr_eq(a, b),
            (FieldHandle::Reference(a), FieldHandle::Reference(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A method: a definition, a reference or a generic instantiation of either
#[derive(Debug, Clone)]
pub enum MethodHandle {
    /// A method defined by a type
    Definition(MethodDefRc),
    /// A reference to a method
    Reference(MethodReferenceRc),
    /// An instantiation of a generic method
    Instance(GenericInstanceMethodRc),
}

impl MethodHandle {
    /// Module owning the definition, or module the reference was minted into
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        match self {
            MethodHandle::Definition(def) => def.module_id(),
            MethodHandle::Reference(reference) => Some(reference.module),
            MethodHandle::Instance(instance) => Some(instance.module),
        }
    }

    /// Name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MethodHandle::Definition(def) => &def.name,
            MethodHandle::Reference(reference) => &reference.name,
            MethodHandle::Instance(instance) => instance.element.name(),
        }
    }

    /// Signature of the method (of the generic method for instantiations)
    #[must_use]
    pub fn signature(&self) -> &MethodSig {
        match self {
            MethodHandle::Definition(def) => &def.signature,
            MethodHandle::Reference(reference) => &reference.signature,
            MethodHandle::Instance(instance) => instance.element.signature(),
        }
    }

    /// Declaring type, `None` for a definition that was never added to a type
    #[must_use]
    pub fn declaring_type(&self) -> Option<TypeSig> {
        match self {
            MethodHandle::Definition(def) => def
                .declaring_type()
                .map(|declaring| TypeSig::Named(TypeHandle::Definition(declaring))),
            MethodHandle::Reference(reference) => Some(reference.declaring_type.clone()),
            MethodHandle::Instance(instance) => instance.element.declaring_type(),
        }
    }

    /// Generic parameters of the method (of the generic method for instantiations)
    #[must_use]
    pub fn generic_params(&self) -> Vec<GenericParam> {
        match self {
            MethodHandle::Definition(def) => def.generic_params(),
            MethodHandle::Reference(reference) => reference.generic_params(),
            MethodHandle::Instance(instance) => instance.element.generic_params(),
        }
    }

    /// `DeclaringType.FullName + "." + Name`
    #[must_use]
    pub fn normalized_name(&self) -> String {
        match self {
            MethodHandle::Definition(def) => def.normalized_name(),
            MethodHandle::Reference(reference) => reference.normalized_name(),
            MethodHandle::Instance(instance) => instance.element.normalized_name(),
        }
    }

    /// The generic method of an instantiation, the method itself otherwise
    #[must_use]
    pub fn element_method(&self) -> &MethodHandle {
        match self {
            MethodHandle::Instance(instance) => instance.element.element_method(),
            _ => self,
        }
    }
}

impl PartialEq for MethodHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MethodHandle::Definition(a), MethodHandle::Definition(b)) => Arc::ptr_eq(a, b),
            (MethodHandle::Reference(a), MethodHandle::Reference(b)) => Arc::ptr_eq(a, b),
            (MethodHandle::Instance(a), MethodHandle::Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
