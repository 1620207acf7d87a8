//! Host-side descriptions of types and members.
//!
//! A descriptor names a type the way a host runtime sees it: by assembly display name,
//! namespace and name, with generic parameters identified by owner and position. The
//! [`super::ReflectionImporter`] turns descriptors into references owned by a module.

use crate::metadata::typesystem::{join_full_name, GenericParamKind, PrimitiveKind};

/// A named (non-generic or open generic) type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTypeDescriptor {
    /// Display name of the defining assembly (`Lib, Version=1.0.0.0, ...`)
    pub assembly: String,
    /// Namespace, ignored for nested types
    pub namespace: String,
    /// Name, including the generic arity suffix
    pub name: String,
    /// Enclosing type of a nested type
    pub declaring_type: Option<Box<NamedTypeDescriptor>>,
    /// Value type
    pub is_value_type: bool,
    /// Generic parameter names; placeholders are derived from the arity suffix if empty
    pub generic_parameters: Vec<String>,
}

impl NamedTypeDescriptor {
    /// A top-level type of `assembly`
    #[must_use]
    pub fn new(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        NamedTypeDescriptor {
            assembly: assembly.into(),
            namespace: namespace.into(),
            name: name.into(),
            declaring_type: None,
            is_value_type: false,
            generic_parameters: Vec::new(),
        }
    }

    /// A type nested in `declaring`, in the same assembly
    #[must_use]
    pub fn nested(declaring: NamedTypeDescriptor, name: impl Into<String>) -> Self {
        NamedTypeDescriptor {
            assembly: declaring.assembly.clone(),
            namespace: String::new(),
            name: name.into(),
            declaring_type: Some(Box::new(declaring)),
            is_value_type: false,
            generic_parameters: Vec::new(),
        }
    }

    /// Mark as value type
    #[must_use]
    pub fn value_type(mut self) -> Self {
        self.is_value_type = true;
        self
    }

    /// Set the generic parameter names
    #[must_use]
    pub fn with_generic_parameters<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.generic_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// `Namespace.Name`, or `Outer/Inner` for nested types
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.declaring_type {
            Some(declaring) => format!("{}/{}", declaring.full_name(), self.name),
            None => join_full_name(&self.namespace, &self.name),
        }
    }
}

/// A host-described type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// A built-in type
    Primitive(PrimitiveKind),
    /// A named type
    Named(NamedTypeDescriptor),
    /// A generic type instantiated with type arguments
    GenericInstance(NamedTypeDescriptor, Vec<TypeDescriptor>),
    /// A generic parameter
    GenericParameter {
        /// Type or method parameter
        kind: GenericParamKind,
        /// Position in the owner's parameter list
        position: u32,
        /// Type full name or normalized method name of the owner
        owner: String,
    },
    /// Single-dimensional, zero-based array
    SzArray(Box<TypeDescriptor>),
    /// Array of the given rank
    Array(Box<TypeDescriptor>, u32),
    /// Unmanaged pointer
    Pointer(Box<TypeDescriptor>),
    /// Managed reference
    ByRef(Box<TypeDescriptor>),
}

impl From<NamedTypeDescriptor> for TypeDescriptor {
    fn from(named: NamedTypeDescriptor) -> Self {
        TypeDescriptor::Named(named)
    }
}

impl From<PrimitiveKind> for TypeDescriptor {
    fn from(kind: PrimitiveKind) -> Self {
        TypeDescriptor::Primitive(kind)
    }
}

/// A host-described field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Declaring type, possibly a generic instance
    pub declaring_type: TypeDescriptor,
    /// Name
    pub name: String,
    /// Field type as declared, in terms of the declaring type's generic parameters
    pub field_type: TypeDescriptor,
}

/// A host-described method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Declaring type, possibly a generic instance
    pub declaring_type: TypeDescriptor,
    /// Name
    pub name: String,
    /// Instance method
    pub has_this: bool,
    /// Generic parameter names of a generic method
    pub generic_parameters: Vec<String>,
    /// Return type as declared
    pub return_type: TypeDescriptor,
    /// Parameter types as declared
    pub params: Vec<TypeDescriptor>,
    /// Type arguments of an instantiated generic method, empty otherwise
    pub generic_arguments: Vec<TypeDescriptor>,
}

impl MethodDescriptor {
    /// A static, non-generic method
    #[must_use]
    pub fn new(
        declaring_type: impl Into<TypeDescriptor>,
        name: impl Into<String>,
        return_type: impl Into<TypeDescriptor>,
        params: Vec<TypeDescriptor>,
    ) -> Self {
        MethodDescriptor {
            declaring_type: declaring_type.into(),
            name: name.into(),
            has_this: false,
            generic_parameters: Vec::new(),
            return_type: return_type.into(),
            params,
            generic_arguments: Vec::new(),
        }
    }

    /// Same method as an instance method
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.has_this = true;
        self
    }

    /// Set the generic parameter names
    #[must_use]
    pub fn with_generic_parameters<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.generic_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Instantiate the generic method
    #[must_use]
    pub fn with_generic_arguments(mut self, arguments: Vec<TypeDescriptor>) -> Self {
        self.generic_arguments = arguments;
        self
    }
}
