//! # dotlink Prelude
//!
//! The types most programs touch: modules and their parameters, the type system, the
//! resolvers and the importers.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotlink operations
pub use crate::Error;

/// The result type used throughout dotlink
pub use crate::Result;

// ================================================================================================
// Modules
// ================================================================================================

/// Modules, their options and collections
pub use crate::metadata::module::{
    Entity, Module, ModuleId, ModuleParameters, ReaderParameters, ReadingMode, TargetRuntime,
    TypeCollection,
};

/// Decoder boundary
pub use crate::metadata::image::{Image, ImageHeader, MemoryImage, ModuleKind, SymbolReader};

/// Assembly identity
pub use crate::metadata::identity::{AssemblyNameReference, AssemblyVersion};

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// Table identifiers
pub use crate::metadata::tables::TableId;

// ================================================================================================
// Type System
// ================================================================================================

/// Definitions, references and signatures
pub use crate::metadata::typesystem::{
    FieldDefinition, FieldHandle, GenericParam, GenericParamKind, MethodDefinition,
    MethodHandle, MethodSig, PrimitiveKind, ResolutionScope, TypeDefRc, TypeDefinition,
    TypeHandle, TypeReference, TypeSig,
};

// ================================================================================================
// Resolution and Import
// ================================================================================================

/// Resolvers
pub use crate::metadata::resolver::{
    AssemblyCache, AssemblyResolver, MetadataResolver, MetadataResolverConfig,
};

/// Importers and descriptors
pub use crate::metadata::import::{
    FieldDescriptor, GenericProvider, MetadataImporter, MethodDescriptor, NamedTypeDescriptor,
    ReflectionImporter, TypeDescriptor,
};
