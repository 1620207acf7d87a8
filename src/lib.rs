// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dotlink
//!
//! Lazy metadata resolution and cross-module reference import for .NET (ECMA-335) modules.
//!
//! `dotlink` models a loaded module the way linkers and rewriters need it: collections are
//! realized from the metadata tables on first access, tokens resolve to live entities,
//! references resolve to their definitions across assemblies, and entities of one module can
//! be imported into another as properly scoped references.
//!
//! ## Features
//!
//! - **Deferred or immediate reading** - Types, references, resources and attributes are
//!   decoded when first needed, or all at once
//! - **One cursor per module** - Every nested decode saves and restores the reader state, so
//!   realizing one collection never disturbs another
//! - **Token lookup** - Any row of any table resolves to its realized entity
//! - **Cross-assembly resolution** - References follow assembly resolvers, type forwarders
//!   and base-type chains to their definitions
//! - **Import** - Types, fields and methods of other modules (or described by a host)
//!   become references owned by the target, generic parameters included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dotlink::prelude::*;
//!
//! let cache = Arc::new(AssemblyCache::new());
//! let lib = Module::create("Lib.dll", ModuleParameters::new())?;
//! let widget = Arc::new(TypeDefinition::new("Lib", "Widget", 0));
//! lib.add_type(widget.clone())?;
//! cache.register(lib.clone());
//!
//! let app = Module::create(
//!     "App.exe",
//!     ModuleParameters::new().with_assembly_resolver(cache),
//! )?;
//!
//! // Lib.Widget, as a reference owned by App scoped to an assembly reference to Lib
//! let imported = app.import_type(&TypeSig::Named(widget.clone().into()), None)?;
//! let resolved = app.resolve_type(&imported)?;
//! assert!(resolved.is_some_and(|def| Arc::ptr_eq(&def, &widget)));
//! # Ok::<(), dotlink::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata::image`] - The decoder boundary; anything implementing [`Image`] can back
//!   a module
//! - [`metadata::module`] - [`Module`], its reader cursor and lazy collections
//! - [`metadata::typesystem`] - Definitions, references and realized signatures
//! - [`metadata::resolver`] - [`AssemblyResolver`] and [`MetadataResolver`]
//! - [`metadata::import`] - [`MetadataImporter`] and [`ReflectionImporter`]
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`]. Failing to find something during resolution is
//! not an error (`Ok(None)`); malformed metadata, disposed modules and missing resolvers are.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: realizations and resolution misses at `debug`,
//! decode failures at `warn`. Install any subscriber to see them.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use dotlink::prelude::*;
///
/// let module = Module::create("App.exe", ModuleParameters::new())?;
/// println!("{} types", module.types()?.len());
/// # Ok::<(), dotlink::Error>(())
/// ```
pub mod prelude;

/// Lazily realized ECMA-335 metadata: modules, type system, resolution and import
pub mod metadata;

/// `dotlink` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotlink` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use dotlink::{Error, Module, ReaderParameters};
/// use dotlink::metadata::image::MemoryImage;
///
/// match Module::read(MemoryImage::builder().build(), ReaderParameters::new()) {
///     Ok(module) => println!("Loaded {}", module.name()),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// A loaded or created module
///
/// See [`metadata::module::Module`].
pub use metadata::module::{Module, ModuleParameters, ReaderParameters, ReadingMode};

/// The decoder boundary
pub use metadata::image::Image;

/// Resolution of references to definitions
pub use metadata::resolver::{
    AssemblyCache, AssemblyResolver, DefaultMetadataResolver, MetadataResolver,
};

/// Import of foreign entities into a module
pub use metadata::import::{GenericProvider, MetadataImporter, ReflectionImporter};

/// Metadata tokens
pub use metadata::token::Token;
