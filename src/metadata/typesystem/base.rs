//! Realized type signatures.
//!
//! A [`TypeSig`] is the in-memory form of a signature after every token has been turned
//! into a [`TypeHandle`] and every generic index has been bound to a [`GenericParam`]. It is
//! a tree: wrappers (arrays, pointers, by-refs, pinned, modifiers) own their element, so
//! the wrapping order is the nesting order of the tree.

use std::fmt;

use strum::{EnumCount, EnumIter};

use crate::metadata::{module::ModuleId, typesystem::TypeHandle};

/// Built-in element types that need no token (`ELEMENT_TYPE_VOID` .. `ELEMENT_TYPE_OBJECT`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
#[allow(missing_docs)]
pub enum PrimitiveKind {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    IntPtr,
    UIntPtr,
    String,
    Object,
    TypedReference,
}

impl PrimitiveKind {
    /// Name of the corresponding type in the `System` namespace of the core library
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "Void",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::SByte => "SByte",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::UInt16 => "UInt16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::UInt32 => "UInt32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::UInt64 => "UInt64",
            PrimitiveKind::Single => "Single",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::IntPtr => "IntPtr",
            PrimitiveKind::UIntPtr => "UIntPtr",
            PrimitiveKind::String => "String",
            PrimitiveKind::Object => "Object",
            PrimitiveKind::TypedReference => "TypedReference",
        }
    }

    /// True for everything but `String` and `Object`
    #[must_use]
    pub fn is_value_type(self) -> bool {
        !matches!(self, PrimitiveKind::String | PrimitiveKind::Object)
    }
}

/// Whether a generic parameter belongs to a type (`!n`) or to a method (`!!n`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericParamKind {
    /// Parameter of the enclosing generic type
    Type,
    /// Parameter of the enclosing generic method
    Method,
}

/// The generic declaration a parameter belongs to.
///
/// Owners are identified by name: the full name of the generic type, or
/// `DeclaringType.FullName + "." + MethodName` for generic methods. Together with the module
/// that minted the owner this is enough to rebind the parameter in another module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericOwner {
    /// Module the owning declaration belongs to, `None` for unattached definitions
    pub module: Option<ModuleId>,
    /// Normalized owner name
    pub name: String,
}

/// A generic parameter bound to its position within its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericParam {
    /// Type or method parameter
    pub kind: GenericParamKind,
    /// 0-based position within the owner's parameter list
    pub position: u32,
    /// Declared name (`T`), or `!n` / `!!n` when the owner only carries an arity
    pub name: String,
    /// The owning declaration, `None` if the signature was decoded without a context
    pub owner: Option<GenericOwner>,
}

impl GenericParam {
    /// A parameter that is not bound to any owner
    #[must_use]
    pub fn unbound(kind: GenericParamKind, position: u32) -> Self {
        GenericParam {
            kind,
            position,
            name: placeholder_name(kind, position),
            owner: None,
        }
    }

    /// Build the parameter list of an owner from its declared names
    #[must_use]
    pub fn list(kind: GenericParamKind, names: &[String], owner: GenericOwner) -> Vec<Self> {
        names
            .iter()
            .enumerate()
            .map(|(position, name)| GenericParam {
                kind,
                position: u32::try_from(position).unwrap_or(u32::MAX),
                name: name.clone(),
                owner: Some(owner.clone()),
            })
            .collect()
    }
}

/// `!0`, `!1`, ... for type parameters, `!!0`, ... for method parameters
#[must_use]
pub fn placeholder_name(kind: GenericParamKind, position: u32) -> String {
    match kind {
        GenericParamKind::Type => format!("!{position}"),
        GenericParamKind::Method => format!("!!{position}"),
    }
}

/// Placeholder names for an owner that only declares its arity
#[must_use]
pub fn placeholder_names(kind: GenericParamKind, arity: u32) -> Vec<String> {
    (0..arity).map(|i| placeholder_name(kind, i)).collect()
}

/// Rank, sizes and lower bounds of a general array
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ArrayShape {
    /// Number of dimensions
    pub rank: u32,
    /// Sizes of the leading dimensions that have one
    pub sizes: Vec<u32>,
    /// Lower bounds of the leading dimensions that have one
    pub lower_bounds: Vec<i32>,
}

/// A realized type signature
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSig {
    /// A built-in element type
    Primitive(PrimitiveKind),
    /// A named type definition or reference
    Named(TypeHandle),
    /// An instantiation of a generic type
    GenericInstance(TypeHandle, Vec<TypeSig>),
    /// A generic parameter of the enclosing type or method
    GenericParam(GenericParam),
    /// Single-dimensional, zero-based array
    SzArray(Box<TypeSig>),
    /// General array
    Array(Box<TypeSig>, ArrayShape),
    /// Unmanaged pointer
    Pointer(Box<TypeSig>),
    /// Managed reference
    ByRef(Box<TypeSig>),
    /// Pinned local
    Pinned(Box<TypeSig>),
    /// Element carrying a required (`modreq`) or optional (`modopt`) custom modifier
    Modified {
        /// `modreq` if true, `modopt` otherwise
        required: bool,
        /// The modifier type
        modifier: TypeHandle,
        /// The modified type
        element: Box<TypeSig>,
    },
    /// Function pointer
    FnPtr(Box<MethodSig>),
}

impl TypeSig {
    /// The named type at the core of this signature, looking through every wrapper and
    /// generic instantiation
    #[must_use]
    pub fn element_handle(&self) -> Option<&TypeHandle> {
        match self {
            TypeSig::Named(handle) | TypeSig::GenericInstance(handle, _) => Some(handle),
            TypeSig::SzArray(element)
            | TypeSig::Array(element, _)
            | TypeSig::Pointer(element)
            | TypeSig::ByRef(element)
            | TypeSig::Pinned(element)
            | TypeSig::Modified { element, .. } => element.element_handle(),
            TypeSig::Primitive(_) | TypeSig::GenericParam(_) | TypeSig::FnPtr(_) => None,
        }
    }

    /// True for value types: value primitives and named value types
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self {
            TypeSig::Primitive(kind) => kind.is_value_type(),
            TypeSig::Named(handle) | TypeSig::GenericInstance(handle, _) => {
                handle.is_value_type()
            }
            TypeSig::Modified { element, .. } | TypeSig::Pinned(element) => {
                element.is_value_type()
            }
            _ => false,
        }
    }

    /// Visit every named type and generic parameter inside this signature
    pub fn walk(&self, visit: &mut impl FnMut(SigLeaf<'_>)) {
        match self {
            TypeSig::Primitive(_) => {}
            TypeSig::Named(handle) => visit(SigLeaf::Type(handle)),
            TypeSig::GenericInstance(handle, arguments) => {
                visit(SigLeaf::Type(handle));
                for argument in arguments {
                    argument.walk(visit);
                }
            }
            TypeSig::GenericParam(param) => visit(SigLeaf::GenericParam(param)),
            TypeSig::SzArray(element)
            | TypeSig::Array(element, _)
            | TypeSig::Pointer(element)
            | TypeSig::ByRef(element)
            | TypeSig::Pinned(element) => element.walk(visit),
            TypeSig::Modified {
                modifier, element, ..
            } => {
                visit(SigLeaf::Type(modifier));
                element.walk(visit);
            }
            TypeSig::FnPtr(method) => method.walk(visit),
        }
    }
}

/// A leaf reached by [`TypeSig::walk`]
pub enum SigLeaf<'a> {
    /// A named type
    Type(&'a TypeHandle),
    /// A generic parameter
    GenericParam(&'a GenericParam),
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Primitive(kind) => write!(f, "System.{}", kind.name()),
            TypeSig::Named(handle) => f.write_str(&handle.full_name()),
            TypeSig::GenericInstance(handle, arguments) => {
                write!(f, "{}<", handle.full_name())?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(">")
            }
            TypeSig::GenericParam(param) => f.write_str(&param.name),
            TypeSig::SzArray(element) => write!(f, "{element}[]"),
            TypeSig::Array(element, shape) => {
                let commas = ",".repeat(shape.rank.saturating_sub(1) as usize);
                write!(f, "{element}[{commas}]")
            }
            TypeSig::Pointer(element) => write!(f, "{element}*"),
            TypeSig::ByRef(element) => write!(f, "{element}&"),
            TypeSig::Pinned(element) => write!(f, "{element} pinned"),
            TypeSig::Modified {
                required,
                modifier,
                element,
            } => {
                let keyword = if *required { "modreq" } else { "modopt" };
                write!(f, "{element} {keyword}({})", modifier.full_name())
            }
            TypeSig::FnPtr(method) => write!(f, "method {}", method),
        }
    }
}

/// A realized method signature
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    /// Instance method (`this` is passed implicitly)
    pub has_this: bool,
    /// `this` is passed explicitly as the first parameter
    pub explicit_this: bool,
    /// `vararg` calling convention
    pub vararg: bool,
    /// Number of generic parameters
    pub generic_arity: u32,
    /// Return type
    pub return_type: TypeSig,
    /// Fixed parameters
    pub params: Vec<TypeSig>,
    /// Parameters after the sentinel of a vararg call site
    pub sentinel_params: Vec<TypeSig>,
}

impl MethodSig {
    /// A static, non-generic method signature
    #[must_use]
    pub fn new(return_type: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSig {
            has_this: false,
            explicit_this: false,
            vararg: false,
            generic_arity: 0,
            return_type,
            params,
            sentinel_params: Vec::new(),
        }
    }

    /// Same signature with `has_this` set
    #[must_use]
    pub fn instance(mut self) -> Self {
        self.has_this = true;
        self
    }

    /// Visit every named type and generic parameter of return type and parameters
    pub fn walk(&self, visit: &mut impl FnMut(SigLeaf<'_>)) {
        self.return_type.walk(visit);
        for param in self.params.iter().chain(&self.sentinel_params) {
            param.walk(visit);
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.return_type)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{param}")?;
        }
        if !self.sentinel_params.is_empty() {
            f.write_str(",...")?;
            for param in &self.sentinel_params {
                write!(f, ",{param}")?;
            }
        }
        f.write_str(")")
    }
}
