//! Lazy metadata model of ECMA-335 modules.
//!
//! A [`module::Module`] sits on top of an [`image::Image`], the decoder that exposes the
//! metadata tables of one module as [`tables::RawRow`]s. Collections (types, assembly and
//! module references, resources, exported types, custom attributes) are realized on first
//! access and memoized; tokens resolve to realized entities on demand.
//!
//! # Key Components
//!
//! - [`module`] - The module, its reader cursor and lazily realized collections
//! - [`typesystem`] - Definitions, references, signatures and the core-library type system
//! - [`resolver`] - Assembly location and reference-to-definition resolution
//! - [`import`] - Rewriting entities of other modules into references of a target module
//! - [`identity`] - Assembly names and versions
//! - [`token`] - Metadata table row references
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotlink::{Module, ModuleParameters};
//!
//! let module = Module::create("App.exe", ModuleParameters::new())?;
//! let global = module.get_type("<Module>")?;
//! assert!(global.is_some());
//! # Ok::<(), dotlink::Error>(())
//! ```

/// Assembly names, versions and flags
pub mod identity;
/// The decoder boundary: images, headers and symbol readers
pub mod image;
/// Cross-module import of types and members
pub mod import;
/// Modules and their lazily realized collections
pub mod module;
/// Assembly resolvers and the metadata resolver
pub mod resolver;
/// Decoded, unrealized signature shapes
pub mod signatures;
/// Table identifiers and decoded rows
pub mod tables;
/// Commonly used metadata token type
pub mod token;
/// Definitions, references and signatures
pub mod typesystem;
