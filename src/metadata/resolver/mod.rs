//! Resolution of references to the definitions they name.
//!
//! # Key Components
//!
//! - [`AssemblyResolver`]: pluggable lookup of assemblies and modules by name
//! - [`AssemblyCache`]: an in-memory [`AssemblyResolver`]
//! - [`ResolverHandle`]: an owned or borrowed assembly resolver
//! - [`MetadataResolver`] / [`DefaultMetadataResolver`]: reference to definition resolution
//!   for types, fields and methods, including type forwarders and base-type walks

mod assembly;
mod metadata;

pub use assembly::{AssemblyCache, AssemblyResolver, ResolverHandle};
pub use metadata::{DefaultMetadataResolver, MetadataResolver, MetadataResolverConfig};
