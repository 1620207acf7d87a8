//! Cross-module import.
//!
//! Importing makes a type, field or method usable inside a target module. Entities the
//! target already owns come back unchanged; everything else is rebuilt as references
//! minted into the target, with assembly references added to it as needed and generic
//! parameters re-bound to the owners named by an [`ImportGenericContext`].
//!
//! Two importers exist: [`MetadataImporter`] for entities of other [`crate::Module`]s and
//! [`ReflectionImporter`] for host-described types ([`TypeDescriptor`] and friends). Both
//! are replaceable through [`crate::ReaderParameters`] and [`crate::ModuleParameters`].

mod context;
mod descriptor;
mod metadata;
mod reflection;

pub use context::{GenericProvider, GenericScope, ImportGenericContext};
pub use descriptor::{FieldDescriptor, MethodDescriptor, NamedTypeDescriptor, TypeDescriptor};
pub use metadata::{DefaultMetadataImporter, MetadataImporter};
pub use reflection::{DefaultReflectionImporter, ReflectionImporter};
