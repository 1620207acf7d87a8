//! The entity model: definitions, references, handles and realized signatures.
//!
//! # Key Components
//!
//! - [`TypeDefinition`], [`FieldDefinition`], [`MethodDefinition`]: entities owned by exactly
//!   one module
//! - [`TypeReference`], [`FieldReference`], [`MethodReference`], [`GenericInstanceMethod`]:
//!   named pointers that may cross module boundaries
//! - [`TypeHandle`], [`FieldHandle`], [`MethodHandle`]: "definition or reference"
//! - [`TypeSig`] / [`MethodSig`]: signatures with every token realized and every generic
//!   index bound to a [`GenericParam`]
//! - [`TypeSystem`]: per-module references to the core library's built-in types
//!
//! # Ownership
//!
//! Definitions hold their enclosing type weakly and their owning module through a
//! [`ModuleScope`], which itself only holds the module weakly. Nothing in this module keeps
//! a [`crate::Module`] alive.

mod base;
mod comparer;
mod corlib;
mod definition;
mod handle;
mod reference;

pub use base::{
    placeholder_name, placeholder_names, ArrayShape, GenericOwner, GenericParam,
    GenericParamKind, MethodSig, PrimitiveKind, SigLeaf, TypeSig,
};
pub use comparer::{are_same_handle, are_same_list, are_same_method_sig, are_same_type};
pub use corlib::{TypeSystem, CORE_LIBRARY_NAMES};
pub use definition::{
    FieldDefRc, FieldDefinition, MethodDefRc, MethodDefinition, ParamDefRc,
    ParameterDefinition, TypeDefRc, TypeDefinition,
};
pub use handle::{FieldHandle, MethodHandle, TypeHandle};
pub use reference::{
    FieldReference, FieldReferenceRc, GenericInstanceMethod, GenericInstanceMethodRc,
    MethodReference, MethodReferenceRc, ModuleScope, ModuleScopeRc, ResolutionScope,
    TypeReference, TypeReferenceRc,
};

pub(crate) use corlib::primitive_reference;
pub(crate) use reference::{join_full_name, normalized_method_name};
