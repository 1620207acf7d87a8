//! The module: owner of one entity graph and the entry point of this crate.
//!
//! A [`Module`] is either read from an [`Image`] or created empty. A module read from an
//! image realizes its collections lazily: every collection lives in a memo slot that is
//! decoded on first access, under the module's reader lock and inside a cursor frame, and
//! then handed out as the same `Arc` forever.
//!
//! # Architecture
//!
//! - **Lazy collections**: types, assembly references, module references, resources,
//!   exported types, module custom attributes and the entry point
//! - **Token cache**: an ordered [`crossbeam_skiplist::SkipMap`] from [`Token`] to
//!   [`Entity`], filled as entities are realized
//! - **Collaborators**: an optional [`AssemblyResolver`] (owned or borrowed), plus a
//!   [`MetadataResolver`], a [`MetadataImporter`] and a [`ReflectionImporter`] that are
//!   built on first use unless supplied through the parameters
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use dotlink::prelude::*;
//!
//! let module = Module::read(image, ReaderParameters::new())?;
//! if let Some(outer) = module.get_type("N.Outer/Inner")? {
//!     println!("{} has {} methods", outer.full_name(), outer.methods.count());
//! }
//!
//! let token = Token::new(TableId::TypeRef, 1);
//! if let Some(Entity::TypeReference(reference)) = module.lookup_token(token)? {
//!     let definition = module.resolve_type(&TypeSig::Named(reference.into()))?;
//! }
//! # Ok::<(), dotlink::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`Module`] is `Send + Sync`. Concurrent first accesses of a collection serialize on the
//! reader lock and observe a single decoded value.

mod items;
mod lazy;
mod parameters;
mod reader;
mod types;

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, OnceLock, RwLock,
    },
};

use crossbeam_skiplist::SkipMap;
use sha1::{Digest, Sha1};
use tracing::debug;
use uguid::Guid;

use crate::{
    metadata::{
        identity::{AssemblyNameRc, AssemblyNameReference, AssemblyVersion},
        image::{
            DebugHeader, Image, ModuleAttributes, ModuleCharacteristics, ModuleKind,
            SymbolReader, TargetArchitecture,
        },
        import::{
            DefaultMetadataImporter, DefaultReflectionImporter, FieldDescriptor,
            GenericProvider, ImportGenericContext, MetadataImporter, MethodDescriptor,
            ReflectionImporter, TypeDescriptor,
        },
        resolver::{
            AssemblyResolver, DefaultMetadataResolver, MetadataResolver, MetadataResolverConfig,
            ResolverHandle,
        },
        tables::TableId,
        token::Token,
        typesystem::{
            FieldDefRc, FieldHandle, GenericInstanceMethodRc, GenericParam, MethodDefRc,
            MethodHandle, ModuleScope, ModuleScopeRc, ParamDefRc, ResolutionScope, TypeDefRc,
            TypeDefinition, TypeReferenceRc, TypeSig, TypeSystem, CORE_LIBRARY_NAMES,
        },
    },
    Error, Result,
};

use lazy::LazyCell;

pub use items::{
    CustomAttribute, CustomAttributeRc, ExportedType, ExportedTypeImplementation,
    ExportedTypeRc, ManifestResourceAttributes, MemberReference, ModuleReference,
    ModuleReferenceRc, Resource, ResourceKind, ResourceRc,
};
pub use parameters::{ModuleParameters, ReaderParameters, ReadingMode, TargetRuntime};
pub use reader::{CursorState, DecodeContext, ModuleReader};
pub use types::TypeCollection;

/// Assembly references of a module, in table order
pub type AssemblyReferenceList = Arc<boxcar::Vec<AssemblyNameRc>>;
/// Module references of a module, in table order
pub type ModuleReferenceList = Arc<boxcar::Vec<ModuleReferenceRc>>;
/// Manifest resources of a module, in table order
pub type ResourceList = Arc<boxcar::Vec<ResourceRc>>;
/// Exported types of a module, in table order
pub type ExportedTypeList = Arc<boxcar::Vec<ExportedTypeRc>>;
/// Custom attributes of a module, in table order
pub type CustomAttributeList = Arc<boxcar::Vec<CustomAttributeRc>>;

/// Public key token of the ECMA standard public key used by `mscorlib`
const CORLIB_PUBLIC_KEY_TOKEN: [u8; 8] = [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];

/// Process-unique identity of a [`Module`].
///
/// References record the id of the module they were created in; cross-module links are
/// made through ids and weak pointers, never through owning pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(u64);

impl ModuleId {
    /// Mint a fresh id
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ModuleId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Any entity a [`Token`] can address
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum Entity {
    Module(ModuleScopeRc),
    TypeDefinition(TypeDefRc),
    TypeReference(TypeReferenceRc),
    TypeSpecification(TypeSig),
    Field(FieldDefRc),
    Method(MethodDefRc),
    Parameter(ParamDefRc),
    MemberReference(MemberReference),
    MethodSpecification(GenericInstanceMethodRc),
    GenericParameter(GenericParam),
    CustomAttribute(CustomAttributeRc),
    ModuleReference(ModuleReferenceRc),
    Assembly(AssemblyNameRc),
    AssemblyReference(AssemblyNameRc),
    ExportedType(ExportedTypeRc),
    Resource(ResourceRc),
}

impl Entity {
    /// The type definition, if this is one
    #[must_use]
    pub fn as_type_definition(&self) -> Option<&TypeDefRc> {
        match self {
            Entity::TypeDefinition(def) => Some(def),
            _ => None,
        }
    }

    /// The method definition, if this is one
    #[must_use]
    pub fn as_method(&self) -> Option<&MethodDefRc> {
        match self {
            Entity::Method(def) => Some(def),
            _ => None,
        }
    }

    /// The field definition, if this is one
    #[must_use]
    pub fn as_field(&self) -> Option<&FieldDefRc> {
        match self {
            Entity::Field(def) => Some(def),
            _ => None,
        }
    }
}

/// A metadata module and its lazily realized entity graph.
pub struct Module {
    id: ModuleId,
    scope: ModuleScopeRc,
    name: String,
    mvid: Guid,
    file_name: String,
    kind: ModuleKind,
    runtime: TargetRuntime,
    runtime_version: String,
    architecture: TargetArchitecture,
    attributes: ModuleAttributes,
    characteristics: ModuleCharacteristics,
    reading_mode: ReadingMode,
    entry_point_token: Token,
    debug_header: Option<DebugHeader>,
    assembly: Option<AssemblyNameRc>,
    has_image: bool,
    disposed: AtomicBool,

    reader: Mutex<ModuleReader>,
    tokens: SkipMap<Token, Entity>,

    types: LazyCell<TypeCollection>,
    assembly_references: LazyCell<boxcar::Vec<AssemblyNameRc>>,
    module_references: LazyCell<boxcar::Vec<ModuleReferenceRc>>,
    resources: LazyCell<boxcar::Vec<ResourceRc>>,
    exported_types: LazyCell<boxcar::Vec<ExportedTypeRc>>,
    custom_attributes: LazyCell<boxcar::Vec<CustomAttributeRc>>,
    entry_point: LazyCell<RwLock<Option<MethodDefRc>>>,

    assembly_resolver: Option<ResolverHandle>,
    metadata_resolver: OnceLock<Arc<dyn MetadataResolver>>,
    metadata_importer: OnceLock<Arc<dyn MetadataImporter>>,
    reflection_importer: OnceLock<Arc<dyn ReflectionImporter>>,
    resolver_config: MetadataResolverConfig,
    type_system: OnceLock<Arc<TypeSystem>>,
    symbol_reader: RwLock<Option<Box<dyn SymbolReader>>>,
}

fn preset<T>(value: Option<T>) -> OnceLock<T> {
    value.map_or_else(OnceLock::new, OnceLock::from)
}

fn assembly_name_of(module_name: &str) -> &str {
    let lower = module_name.to_ascii_lowercase();
    if lower.ends_with(".dll") || lower.ends_with(".exe") {
        &module_name[..module_name.len() - 4]
    } else {
        module_name
    }
}

impl Module {
    /// Open a module over `image`.
    ///
    /// Only the `Module` and `Assembly` rows are decoded here. With
    /// [`ReadingMode::Immediate`] every collection is realized before this returns.
    ///
    /// # Arguments
    /// * `image` - The decodable image, owned by the module from now on
    /// * `parameters` - Reading mode and collaborators
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the image has no `Module` row,
    /// [`crate::Error::InvalidOperation`] if a supplied symbol reader rejects the image,
    /// or any decode error raised while realizing collections in immediate mode
    pub fn read<I: Image + 'static>(image: I, parameters: ReaderParameters) -> Result<Arc<Module>> {
        let mut image: Box<dyn Image> = Box::new(image);
        let header = image.header().clone();

        if !image.has_table(TableId::Module) {
            return Err(malformed_error!("The image has no Module row"));
        }
        let module_row = image.decode_row(TableId::Module, 1)?.into_module()?;
        let assembly = if image.has_table(TableId::Assembly) {
            let row = image.decode_row(TableId::Assembly, 1)?.into_assembly()?;
            Some(Arc::new(AssemblyNameReference::from_assembly(
                &row,
                Token::new(TableId::Assembly, 1),
            )))
        } else {
            None
        };

        let ReaderParameters {
            reading_mode,
            assembly_resolver,
            metadata_resolver,
            metadata_importer,
            reflection_importer,
            symbol_reader,
            resolver_config,
        } = parameters;

        let id = ModuleId::next();
        let module = Arc::new_cyclic(|weak| Module {
            id,
            scope: Arc::new(ModuleScope {
                id,
                name: module_row.name.clone(),
                assembly: assembly.clone(),
                module: weak.clone(),
            }),
            name: module_row.name,
            mvid: module_row.mvid,
            file_name: header.file_name,
            kind: header.kind,
            runtime: TargetRuntime::from_version_string(&header.runtime_version),
            runtime_version: header.runtime_version,
            architecture: header.architecture,
            attributes: header.attributes,
            characteristics: header.characteristics,
            reading_mode,
            entry_point_token: header.entry_point,
            debug_header: header.debug_header,
            assembly,
            has_image: true,
            disposed: AtomicBool::new(false),
            reader: Mutex::new(ModuleReader::new(Some(image))),
            tokens: SkipMap::new(),
            types: LazyCell::new("types"),
            assembly_references: LazyCell::new("assembly references"),
            module_references: LazyCell::new("module references"),
            resources: LazyCell::new("resources"),
            exported_types: LazyCell::new("exported types"),
            custom_attributes: LazyCell::new("custom attributes"),
            entry_point: LazyCell::new("entry point"),
            assembly_resolver,
            metadata_resolver: preset(metadata_resolver),
            metadata_importer: preset(metadata_importer),
            reflection_importer: preset(reflection_importer),
            resolver_config,
            type_system: OnceLock::new(),
            symbol_reader: RwLock::new(None),
        });

        if let Some(symbol_reader) = symbol_reader {
            module.read_symbols(symbol_reader)?;
        }
        if reading_mode == ReadingMode::Immediate {
            module.realize_all()?;
        }

        debug!(module = %module.name, id = %module.id, mode = ?reading_mode, "opened module");
        Ok(module)
    }

    /// Create an empty module without an image.
    ///
    /// The module contains the `<Module>` type. Unless `parameters.kind` is
    /// [`ModuleKind::NetModule`] it also gets an assembly named after the module, without a
    /// `.dll` / `.exe` extension, at version `0.0.0.0`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `name` is empty
    pub fn create(name: &str, parameters: ModuleParameters) -> Result<Arc<Module>> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("module name must not be empty".into()));
        }

        let ModuleParameters {
            kind,
            runtime,
            architecture,
            assembly_resolver,
            metadata_resolver,
            metadata_importer,
            reflection_importer,
            resolver_config,
        } = parameters;

        let assembly = (kind != ModuleKind::NetModule).then(|| {
            let mut assembly =
                AssemblyNameReference::new(assembly_name_of(name), AssemblyVersion::ZERO);
            assembly.token = Token::new(TableId::Assembly, 1);
            Arc::new(assembly)
        });

        let id = ModuleId::next();
        let digest = Sha1::new()
            .chain_update(name.as_bytes())
            .chain_update(id.value().to_le_bytes())
            .finalize();
        let mut mvid = [0u8; 16];
        mvid.copy_from_slice(&digest[..16]);

        let module = Arc::new_cyclic(|weak| Module {
            id,
            scope: Arc::new(ModuleScope {
                id,
                name: name.to_string(),
                assembly: assembly.clone(),
                module: weak.clone(),
            }),
            name: name.to_string(),
            mvid: Guid::from_bytes(mvid),
            file_name: String::new(),
            kind,
            runtime,
            runtime_version: runtime.version_string().to_string(),
            architecture,
            attributes: ModuleAttributes::IL_ONLY,
            characteristics: ModuleCharacteristics::empty(),
            reading_mode: ReadingMode::Deferred,
            entry_point_token: Token::nil(TableId::MethodDef),
            debug_header: None,
            assembly,
            has_image: false,
            disposed: AtomicBool::new(false),
            reader: Mutex::new(ModuleReader::new(None)),
            tokens: SkipMap::new(),
            types: LazyCell::ready("types", TypeCollection::default()),
            assembly_references: LazyCell::ready("assembly references", boxcar::Vec::new()),
            module_references: LazyCell::ready("module references", boxcar::Vec::new()),
            resources: LazyCell::ready("resources", boxcar::Vec::new()),
            exported_types: LazyCell::ready("exported types", boxcar::Vec::new()),
            custom_attributes: LazyCell::ready("custom attributes", boxcar::Vec::new()),
            entry_point: LazyCell::ready("entry point", RwLock::new(None)),
            assembly_resolver,
            metadata_resolver: preset(metadata_resolver),
            metadata_importer: preset(metadata_importer),
            reflection_importer: preset(reflection_importer),
            resolver_config,
            type_system: OnceLock::new(),
            symbol_reader: RwLock::new(None),
        });

        let global = TypeDefinition::new("", "<Module>", 0).with_token(Token::new(TableId::TypeDef, 1));
        module.add_type(Arc::new(global))?;

        debug!(module = %module.name, id = %module.id, "created module");
        Ok(module)
    }

    fn realize_all(&self) -> Result<()> {
        self.types()?;
        self.assembly_references()?;
        self.module_references()?;
        self.resources()?;
        self.exported_types()?;
        self.custom_attributes()?;
        self.entry_point()?;
        self.type_references()?;
        self.member_references()?;
        Ok(())
    }

    /// Process-unique id of this module
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// The scope that definitions of this module record as their owner
    #[must_use]
    pub fn scope(&self) -> &ModuleScopeRc {
        &self.scope
    }

    /// Module name from the `Module` row
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version id
    #[must_use]
    pub fn mvid(&self) -> Guid {
        self.mvid
    }

    /// File the image was read from, empty if unknown
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Module kind
    #[must_use]
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Target runtime derived from the runtime version string
    #[must_use]
    pub fn runtime(&self) -> TargetRuntime {
        self.runtime
    }

    /// Runtime version string
    #[must_use]
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// Target architecture
    #[must_use]
    pub fn architecture(&self) -> TargetArchitecture {
        self.architecture
    }

    /// CLI header flags
    #[must_use]
    pub fn attributes(&self) -> ModuleAttributes {
        self.attributes
    }

    /// PE DLL characteristics
    #[must_use]
    pub fn characteristics(&self) -> ModuleCharacteristics {
        self.characteristics
    }

    /// Reading mode the module was opened with
    #[must_use]
    pub fn reading_mode(&self) -> ReadingMode {
        self.reading_mode
    }

    /// The assembly this module is the manifest module of, `None` for netmodules
    #[must_use]
    pub fn assembly(&self) -> Option<&AssemblyNameRc> {
        self.assembly.as_ref()
    }

    /// True if the module was read from an image that has not been released yet
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.has_image && !self.is_disposed()
    }

    /// True if this module carries the assembly manifest
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.kind != ModuleKind::NetModule
    }

    /// The assembly resolver, if one is configured and still alive
    #[must_use]
    pub fn assembly_resolver(&self) -> Option<Arc<dyn AssemblyResolver>> {
        self.assembly_resolver.as_ref().and_then(ResolverHandle::get)
    }

    /// The metadata resolver, built on first use
    pub fn metadata_resolver(&self) -> Arc<dyn MetadataResolver> {
        self.metadata_resolver
            .get_or_init(|| Arc::new(DefaultMetadataResolver::new(self.resolver_config.clone())))
            .clone()
    }

    /// The metadata importer, built on first use
    pub fn metadata_importer(&self) -> Arc<dyn MetadataImporter> {
        self.metadata_importer
            .get_or_init(|| Arc::new(DefaultMetadataImporter))
            .clone()
    }

    /// The descriptor importer, built on first use
    pub fn reflection_importer(&self) -> Arc<dyn ReflectionImporter> {
        self.reflection_importer
            .get_or_init(|| Arc::new(DefaultReflectionImporter))
            .clone()
    }

    /// Limits of the default metadata resolver
    #[must_use]
    pub fn resolver_config(&self) -> &MetadataResolverConfig {
        &self.resolver_config
    }

    /// Row count of `table` in the image, `0` for image-less or disposed modules
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the reader lock is poisoned
    pub fn table_length(&self, table: TableId) -> Result<u32> {
        if self.is_disposed() {
            return Ok(0);
        }
        Ok(lock!(self.reader).table_length(table))
    }

    /// Answer a probe from a realized collection, or from the image without realizing it
    fn probe(&self, realized: Option<bool>, table: TableId) -> Result<bool> {
        match realized {
            Some(answer) => Ok(answer),
            None => Ok(self.table_length(table)? > 0),
        }
    }

    /// True if the module defines any type
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the reader lock is poisoned
    pub fn has_types(&self) -> Result<bool> {
        self.probe(self.types.get().map(|types| !types.is_empty()), TableId::TypeDef)
    }

    /// True if the module references other assemblies
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the reader lock is poisoned
    pub fn has_assembly_references(&self) -> Result<bool> {
        self.probe(
            self.assembly_references.get().map(|refs| refs.count() > 0),
            TableId::AssemblyRef,
        )
    }

    /// True if the module references other modules
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the reader lock is poisoned
    pub fn has_module_references(&self) -> Result<bool> {
        self.probe(
            self.module_references.get().map(|refs| refs.count() > 0),
            TableId::ModuleRef,
        )
    }

    /// True if the module exports or forwards types
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the reader lock is poisoned
    pub fn has_exported_types(&self) -> Result<bool> {
        self.probe(
            self.exported_types.get().map(|exported| exported.count() > 0),
            TableId::ExportedType,
        )
    }

    /// True if the module references any type
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the reader lock is poisoned
    pub fn has_type_references(&self) -> Result<bool> {
        self.probe(None, TableId::TypeRef)
    }

    /// True if the module references any member
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the reader lock is poisoned
    pub fn has_member_references(&self) -> Result<bool> {
        self.probe(None, TableId::MemberRef)
    }

    /// True if the module has manifest resources or a linked resource file
    ///
    /// # Errors
    /// Returns an error if the `File` table cannot be decoded
    pub fn has_resources(&self) -> Result<bool> {
        if let Some(resources) = self.resources.get() {
            return Ok(resources.count() > 0);
        }
        if self.table_length(TableId::ManifestResource)? > 0 {
            return Ok(true);
        }
        self.read_with(Module::read_has_file_resource)
    }

    /// True if custom attributes are attached to the module
    ///
    /// # Errors
    /// Returns an error if the `CustomAttribute` table cannot be decoded
    pub fn has_custom_attributes(&self) -> Result<bool> {
        if let Some(attributes) = self.custom_attributes.get() {
            return Ok(attributes.count() > 0);
        }
        self.read_with(Module::read_has_module_custom_attributes)
    }

    /// Top-level types
    ///
    /// # Errors
    /// Returns a decode error if the type tables are corrupt, or [`crate::Error::Disposed`]
    pub fn types(&self) -> Result<Arc<TypeCollection>> {
        self.types.get_or_read(self, Module::read_types)
    }

    /// Assembly references
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn assembly_references(&self) -> Result<AssemblyReferenceList> {
        self.assembly_references
            .get_or_read(self, Module::read_assembly_references)
    }

    /// Module references
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn module_references(&self) -> Result<ModuleReferenceList> {
        self.module_references
            .get_or_read(self, Module::read_module_references)
    }

    /// Manifest resources
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn resources(&self) -> Result<ResourceList> {
        self.resources.get_or_read(self, Module::read_resources)
    }

    /// Exported and forwarded types
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn exported_types(&self) -> Result<ExportedTypeList> {
        self.exported_types
            .get_or_read(self, Module::read_exported_types)
    }

    /// Custom attributes attached to the module itself
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn custom_attributes(&self) -> Result<CustomAttributeList> {
        self.custom_attributes
            .get_or_read(self, Module::read_module_custom_attributes)
    }

    /// Add a top-level type; the type and its nested types become owned by this module
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if the type already belongs to another
    /// module
    pub fn add_type(&self, def: TypeDefRc) -> Result<()> {
        let types = self.types()?;
        def.attach(&self.scope)?;
        if !def.token.is_nil() {
            self.tokens
                .get_or_insert(def.token, Entity::TypeDefinition(def.clone()));
        }
        types.push(def);
        Ok(())
    }

    /// Find a type by full name.
    ///
    /// `Namespace.Name` names a top-level type; `Namespace.Outer/Inner/Deepest` walks the
    /// nested types segment by segment and stops at the first segment that is missing.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] for an empty name or an empty path segment
    pub fn get_type(&self, full_name: &str) -> Result<Option<TypeDefRc>> {
        if full_name.is_empty() {
            return Err(Error::InvalidArgument("type name must not be empty".into()));
        }

        let mut segments = full_name.split('/');
        if full_name.split('/').any(str::is_empty) {
            return Err(Error::InvalidArgument(format!(
                "'{full_name}' has an empty nested type segment"
            )));
        }

        let types = self.types()?;
        let Some(mut current) = segments.next().and_then(|top| types.get_by_full_name(top))
        else {
            return Ok(None);
        };
        for segment in segments {
            match current.nested_type(segment) {
                Some(nested) => current = nested,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Find a top-level type by namespace and name
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `name` is empty
    pub fn get_type_by_name(&self, namespace: &str, name: &str) -> Result<Option<TypeDefRc>> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("type name must not be empty".into()));
        }
        Ok(self.types()?.get(namespace, name))
    }

    /// All types, nested ones included, depth first
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn get_types(&self) -> Result<Vec<TypeDefRc>> {
        fn visit(def: &TypeDefRc, out: &mut Vec<TypeDefRc>) {
            out.push(def.clone());
            for (_, nested) in def.nested_types.iter() {
                visit(nested, out);
            }
        }

        let mut out = Vec::new();
        for def in self.types()?.iter() {
            visit(def, &mut out);
        }
        Ok(out)
    }

    /// True if the image references `full_name` in the scope named `scope`
    ///
    /// # Errors
    /// See [`Module::type_reference`]
    pub fn has_type_reference(&self, scope: &str, full_name: &str) -> Result<bool> {
        Ok(self.type_reference(scope, full_name)?.is_some())
    }

    /// The type reference of the image for `full_name` in the scope named `scope`.
    ///
    /// Image-less modules have no type references and always answer `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `full_name` is empty, or a decode error
    pub fn type_reference(&self, scope: &str, full_name: &str) -> Result<Option<TypeReferenceRc>> {
        if full_name.is_empty() {
            return Err(Error::InvalidArgument("type name must not be empty".into()));
        }
        if !self.has_image {
            return Ok(None);
        }

        Ok(self
            .type_references()?
            .into_iter()
            .find(|reference| reference.scope.name() == scope && reference.full_name() == full_name))
    }

    /// Every `TypeRef` row of the image, in table order
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn type_references(&self) -> Result<Vec<TypeReferenceRc>> {
        self.read_with(|module, reader| {
            (1..=reader.table_length(TableId::TypeRef))
                .map(|row| module.type_reference_row(reader, row))
                .collect()
        })
    }

    /// Every `MemberRef` row of the image, in table order
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn member_references(&self) -> Result<Vec<MemberReference>> {
        self.read_with(|module, reader| {
            (1..=reader.table_length(TableId::MemberRef))
                .map(|row| module.member_reference(reader, row))
                .collect()
        })
    }

    /// Every custom attribute of the image, decoded afresh on each call
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn all_custom_attributes(&self) -> Result<Vec<CustomAttributeRc>> {
        self.read_with(|module, reader| {
            let attributes = module.read_custom_attributes_of(reader, None)?;
            Ok(attributes.iter().map(|(_, attribute)| attribute.clone()).collect())
        })
    }

    /// Add an assembly reference unless one with the same full name exists
    ///
    /// # Errors
    /// Returns a decode error while realizing the references, or [`crate::Error::LockError`]
    pub fn add_assembly_reference(&self, name: &AssemblyNameReference) -> Result<AssemblyNameRc> {
        let references = self.assembly_references()?;
        let _reader = lock!(self.reader);

        let full_name = name.full_name();
        if let Some((_, existing)) = references
            .iter()
            .find(|(_, existing)| existing.full_name() == full_name)
        {
            return Ok(existing.clone());
        }

        let mut added = name.detached();
        let row = u32::try_from(references.count() + 1)
            .map_err(|_| Error::InvalidOperation("too many assembly references".into()))?;
        added.token = Token::new(TableId::AssemblyRef, row);

        let added = Arc::new(added);
        references.push(added.clone());
        self.tokens
            .insert(added.token, Entity::AssemblyReference(added.clone()));

        debug!(module = %self.name, assembly = %full_name, "added assembly reference");
        Ok(added)
    }

    /// The managed entry point
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn entry_point(&self) -> Result<Option<MethodDefRc>> {
        let entry = self.entry_point.get_or_read(self, Module::read_entry_point)?;
        let entry = read_lock!(entry);
        Ok(entry.clone())
    }

    /// Replace the managed entry point
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `method` belongs to another module
    pub fn set_entry_point(&self, method: Option<MethodDefRc>) -> Result<()> {
        if let Some(method) = &method {
            if method.module_id() != Some(self.id) {
                return Err(Error::InvalidArgument(format!(
                    "entry point {} is not defined in module {}",
                    method.full_name(),
                    self.name
                )));
            }
        }

        let entry = self.entry_point.get_or_read(self, Module::read_entry_point)?;
        *write_lock!(entry) = method;
        Ok(())
    }

    /// Resolve `token` to the entity it addresses.
    ///
    /// Realizes whatever collection the entity belongs to. Row `0` and rows past the end of
    /// the table answer `None`, as do tables without an entity model.
    ///
    /// # Errors
    /// Returns a decode error or [`crate::Error::Disposed`]
    pub fn lookup_token(&self, token: Token) -> Result<Option<Entity>> {
        if token.is_nil() {
            return Ok(None);
        }

        self.ensure_live()?;
        let mut reader = lock!(self.reader);
        if let Some(entry) = self.tokens.get(&token) {
            if self.types.get().is_some() || !is_definition_table(token.table()) {
                return Ok(Some(entry.value().clone()));
            }
        }
        if token.row() > reader.table_length(token.table()) {
            return Ok(None);
        }

        self.lookup_token_locked(&mut reader, token)
    }

    /// References to the core library's built-in types.
    ///
    /// The core library is this module if it is one, otherwise the first core library
    /// among the assembly references. If there is none an `mscorlib` reference matching the
    /// target runtime is added.
    ///
    /// # Errors
    /// Returns a decode error while realizing the assembly references
    pub fn type_system(&self) -> Result<Arc<TypeSystem>> {
        if let Some(type_system) = self.type_system.get() {
            return Ok(type_system.clone());
        }

        let corlib = match self.find_core_library()? {
            Some(scope) => scope,
            None => ResolutionScope::AssemblyRef(self.add_assembly_reference(&self.detached_mscorlib())?),
        };

        let built = Arc::new(TypeSystem::new(self.id, corlib));
        Ok(self.type_system.get_or_init(|| built).clone())
    }

    /// Scope of the core library as seen from this module. Unlike [`Module::type_system`]
    /// this never adds an assembly reference; without one the scope is a detached
    /// `mscorlib` name.
    pub(crate) fn core_library_scope(&self) -> Result<ResolutionScope> {
        if let Some(type_system) = self.type_system.get() {
            return Ok(type_system.corlib().clone());
        }
        Ok(self
            .find_core_library()?
            .unwrap_or_else(|| ResolutionScope::AssemblyRef(Arc::new(self.detached_mscorlib()))))
    }

    fn find_core_library(&self) -> Result<Option<ResolutionScope>> {
        if self.is_core_library()? {
            return Ok(Some(ResolutionScope::Module(self.scope.clone())));
        }
        Ok(self
            .assembly_references()?
            .iter()
            .map(|(_, reference)| reference.clone())
            .find(|reference| CORE_LIBRARY_NAMES.contains(&reference.name.as_str()))
            .map(ResolutionScope::AssemblyRef))
    }

    fn detached_mscorlib(&self) -> AssemblyNameReference {
        let mut mscorlib = AssemblyNameReference::new("mscorlib", self.runtime.corlib_version());
        mscorlib.public_key_token = CORLIB_PUBLIC_KEY_TOKEN.to_vec();
        mscorlib
    }

    /// True if this module is the core library: it carries a core library assembly name and
    /// references no other assembly
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the reader lock is poisoned
    pub fn is_core_library(&self) -> Result<bool> {
        let Some(assembly) = &self.assembly else {
            return Ok(false);
        };
        if !CORE_LIBRARY_NAMES.contains(&assembly.name.as_str()) {
            return Ok(false);
        }
        Ok(!self.has_image() || self.table_length(TableId::AssemblyRef)? == 0)
    }

    /// The debug directory entries of the image, empty if there are none
    #[must_use]
    pub fn debug_header(&self) -> DebugHeader {
        self.debug_header.clone().unwrap_or_default()
    }

    /// True if the image carries debug directory entries
    #[must_use]
    pub fn has_debug_header(&self) -> bool {
        self.debug_header
            .as_ref()
            .is_some_and(DebugHeader::has_entries)
    }

    /// Attach a symbol reader after handing it the debug header
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperation`] if the reader does not accept the debug
    /// header; the previous reader, if any, stays attached
    pub fn read_symbols(&self, mut reader: Box<dyn SymbolReader>) -> Result<()> {
        self.ensure_live()?;
        if !reader.process_debug_header(&self.debug_header()) {
            return Err(Error::InvalidOperation(format!(
                "symbols do not match module {}",
                self.name
            )));
        }

        let mut slot = write_lock!(self.symbol_reader);
        if let Some(mut previous) = slot.replace(reader) {
            previous.dispose();
        }
        Ok(())
    }

    /// True if a symbol reader is attached
    #[must_use]
    pub fn has_symbols(&self) -> bool {
        self.symbol_reader
            .read()
            .map(|reader| reader.is_some())
            .unwrap_or(false)
    }

    fn check_context(&self, context: Option<&GenericProvider>) -> Result<ImportGenericContext> {
        if let Some(provider) = context {
            if provider.module_id() != Some(self.id) {
                return Err(Error::InvalidArgument(format!(
                    "generic context {} does not belong to module {}",
                    provider.name(),
                    self.name
                )));
            }
        }
        Ok(ImportGenericContext::new(context))
    }

    /// Import a type signature so it can be used in this module.
    ///
    /// A signature already owned by this module is returned unchanged. `context` is the
    /// generic type or method of this module the signature will be used in.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if `context` belongs to another module or a
    /// generic parameter has no counterpart in `context`
    pub fn import_type(&self, sig: &TypeSig, context: Option<&GenericProvider>) -> Result<TypeSig> {
        self.ensure_live()?;
        let mut context = self.check_context(context)?;
        self.metadata_importer().import_type(self, sig, &mut context)
    }

    /// Import a field so it can be used in this module
    ///
    /// # Errors
    /// See [`Module::import_type`]
    pub fn import_field(&self, field: &FieldHandle, context: Option<&GenericProvider>) -> Result<FieldHandle> {
        self.ensure_live()?;
        let mut context = self.check_context(context)?;
        self.metadata_importer().import_field(self, field, &mut context)
    }

    /// Import a method so it can be used in this module
    ///
    /// # Errors
    /// See [`Module::import_type`]
    pub fn import_method(
        &self,
        method: &MethodHandle,
        context: Option<&GenericProvider>,
    ) -> Result<MethodHandle> {
        self.ensure_live()?;
        let mut context = self.check_context(context)?;
        self.metadata_importer().import_method(self, method, &mut context)
    }

    /// Import a host-described type
    ///
    /// # Errors
    /// See [`Module::import_type`]
    pub fn import_type_descriptor(
        &self,
        descriptor: &TypeDescriptor,
        context: Option<&GenericProvider>,
    ) -> Result<TypeSig> {
        self.ensure_live()?;
        let mut context = self.check_context(context)?;
        self.reflection_importer()
            .import_type(self, descriptor, &mut context)
    }

    /// Import a host-described field
    ///
    /// # Errors
    /// See [`Module::import_type`]
    pub fn import_field_descriptor(
        &self,
        descriptor: &FieldDescriptor,
        context: Option<&GenericProvider>,
    ) -> Result<FieldHandle> {
        self.ensure_live()?;
        let mut context = self.check_context(context)?;
        self.reflection_importer()
            .import_field(self, descriptor, &mut context)
    }

    /// Import a host-described method
    ///
    /// # Errors
    /// See [`Module::import_type`]
    pub fn import_method_descriptor(
        &self,
        descriptor: &MethodDescriptor,
        context: Option<&GenericProvider>,
    ) -> Result<MethodHandle> {
        self.ensure_live()?;
        let mut context = self.check_context(context)?;
        self.reflection_importer()
            .import_method(self, descriptor, &mut context)
    }

    /// Resolve a type to its definition, `None` if it cannot be located
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if the type lives in another assembly and no
    /// assembly resolver is configured, or a decode error of this module
    pub fn resolve_type(&self, sig: &TypeSig) -> Result<Option<TypeDefRc>> {
        self.ensure_live()?;
        self.metadata_resolver().resolve_type(self, sig)
    }

    /// Resolve a field to its definition, `None` if it cannot be located
    ///
    /// # Errors
    /// See [`Module::resolve_type`]
    pub fn resolve_field(&self, field: &FieldHandle) -> Result<Option<FieldDefRc>> {
        self.ensure_live()?;
        self.metadata_resolver().resolve_field(self, field)
    }

    /// Resolve a method to its definition, `None` if it cannot be located
    ///
    /// # Errors
    /// See [`Module::resolve_type`]
    pub fn resolve_method(&self, method: &MethodHandle) -> Result<Option<MethodDefRc>> {
        self.ensure_live()?;
        self.metadata_resolver().resolve_method(self, method)
    }

    /// Release the image, the symbol reader and an owned assembly resolver.
    ///
    /// Calling this more than once has no further effect. Afterwards collection accessors,
    /// token lookup, import and resolution fail with [`crate::Error::Disposed`].
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        match self.reader.lock() {
            Ok(mut reader) => reader.release(),
            Err(poisoned) => poisoned.into_inner().release(),
        }
        let mut symbols = match self.symbol_reader.write() {
            Ok(symbols) => symbols,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut symbols) = symbols.take() {
            symbols.dispose();
        }
        if let Some(resolver) = &self.assembly_resolver {
            resolver.dispose();
        }

        debug!(module = %self.name, id = %self.id, "disposed module");
    }

    /// True once [`Module::dispose`] has run
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }

    /// Run `read` under the reader lock in a cursor frame, without memoizing the result
    pub(crate) fn read_with<T>(
        &self,
        read: impl FnOnce(&Module, &mut ModuleReader) -> Result<T>,
    ) -> Result<T> {
        self.ensure_live()?;
        let mut reader = lock!(self.reader);
        reader.frame(|reader| read(self, reader))
    }
}

fn is_definition_table(table: TableId) -> bool {
    matches!(
        table,
        TableId::TypeDef | TableId::Field | TableId::MethodDef | TableId::Param
    )
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("has_image", &self.has_image())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metadata::image::MemoryImage, test::lib_image};

    #[test]
    fn module_ids_are_unique() {
        let a = ModuleId::next();
        let b = ModuleId::next();
        assert_ne!(a, b);
        assert!(b.value() > a.value());
    }

    #[test]
    fn assembly_name_strips_extension() {
        assert_eq!(assembly_name_of("Lib.dll"), "Lib");
        assert_eq!(assembly_name_of("App.EXE"), "App");
        assert_eq!(assembly_name_of("Lib"), "Lib");
        assert_eq!(assembly_name_of("Lib.netmodule"), "Lib.netmodule");
    }

    #[test]
    fn create_rejects_empty_name() {
        assert!(matches!(
            Module::create("", ModuleParameters::new()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn created_module_has_global_type_and_assembly() {
        let module = Module::create("Lib.dll", ModuleParameters::new()).unwrap();

        assert!(!module.has_image());
        assert!(module.is_main());
        assert_eq!(module.assembly().unwrap().name, "Lib");
        assert!(module.has_types().unwrap());
        assert!(module.get_type("<Module>").unwrap().is_some());
        assert!(!module.has_resources().unwrap());
        assert!(module.type_references().unwrap().is_empty());

        let global = module
            .lookup_token(Token::new(TableId::TypeDef, 1))
            .unwrap()
            .unwrap();
        assert_eq!(global.as_type_definition().unwrap().name, "<Module>");
    }

    #[test]
    fn netmodule_has_no_assembly() {
        let module = Module::create(
            "Part.netmodule",
            ModuleParameters::new().with_kind(ModuleKind::NetModule),
        )
        .unwrap();
        assert!(module.assembly().is_none());
        assert!(!module.is_main());
    }

    #[test]
    fn type_system_adds_mscorlib_once() {
        let module = Module::create(
            "App.exe",
            ModuleParameters::new().with_runtime(TargetRuntime::Net2_0),
        )
        .unwrap();

        let first = module.type_system().unwrap();
        let second = module.type_system().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let references = module.assembly_references().unwrap();
        assert_eq!(references.count(), 1);
        assert_eq!(
            references[0].full_name(),
            "mscorlib, Version=2.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
    }

    #[test]
    fn core_library_scope_leaves_the_module_alone() {
        let module = Module::create("App.exe", ModuleParameters::new()).unwrap();

        let scope = module.core_library_scope().unwrap();
        assert_eq!(scope.name(), "mscorlib");
        assert_eq!(module.assembly_references().unwrap().count(), 0);

        let system = module.type_system().unwrap();
        assert_eq!(module.assembly_references().unwrap().count(), 1);
        assert_eq!(
            module.core_library_scope().unwrap().name(),
            system.corlib().name()
        );
    }

    #[test]
    fn add_assembly_reference_deduplicates() {
        let module = Module::create("App.dll", ModuleParameters::new()).unwrap();
        let lib = AssemblyNameReference::new("Lib", AssemblyVersion::new(1, 0, 0, 0));

        let first = module.add_assembly_reference(&lib).unwrap();
        let second = module.add_assembly_reference(&lib).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.token, Token::new(TableId::AssemblyRef, 1));
    }

    #[test]
    fn get_type_rejects_empty_segments() {
        let module = Module::create("Lib.dll", ModuleParameters::new()).unwrap();
        assert!(matches!(module.get_type(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(module.get_type("A//B"), Err(Error::InvalidArgument(_))));
        assert!(module.get_type("N.Missing/Inner").unwrap().is_none());
    }

    #[test]
    fn dispose_is_idempotent() {
        let module = Module::create("Lib.dll", ModuleParameters::new()).unwrap();
        module.dispose();
        module.dispose();

        assert!(module.is_disposed());
        assert!(matches!(module.types(), Err(Error::Disposed)));
        assert!(matches!(
            module.lookup_token(Token::new(TableId::TypeDef, 1)),
            Err(Error::Disposed)
        ));
    }

    #[test]
    fn read_requires_module_row() {
        let empty = MemoryImage::builder().build();
        assert!(matches!(
            Module::read(empty, ReaderParameters::new()),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn read_decodes_only_module_and_assembly() {
        let image = lib_image().build();
        let probe = image.probe();

        let module = Module::read(image, ReaderParameters::new()).unwrap();
        assert_eq!(module.name(), "Lib.dll");
        assert_eq!(module.assembly().unwrap().name, "Lib");
        assert_eq!(probe.total_decodes(), 2);
        assert_eq!(probe.decodes(TableId::TypeDef), 0);

        assert!(module.has_types().unwrap());
        assert!(module.has_type_references().unwrap());
        assert_eq!(probe.decodes(TableId::TypeDef), 0);
    }

    #[test]
    fn types_are_realized_once() {
        let image = lib_image().build();
        let probe = image.probe();
        let module = Module::read(image, ReaderParameters::new()).unwrap();

        let first = module.types().unwrap();
        let decoded = probe.decodes(TableId::TypeDef);
        let second = module.types().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(probe.decodes(TableId::TypeDef), decoded);
        // <Module>, Base, T, Outer and List`1; Inner and Deepest are nested
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn failed_realization_is_retried() {
        let image = lib_image().build();
        let probe = image.probe();
        let module = Module::read(image, ReaderParameters::new()).unwrap();

        probe.fail(TableId::TypeDef);
        assert!(module.types().is_err());
        assert!(module
            .lookup_token(Token::new(TableId::TypeDef, 3))
            .is_err());

        probe.heal(TableId::TypeDef);
        let deepest = module.get_type("N.Outer/Inner/Deepest").unwrap().unwrap();
        assert_eq!(deepest.full_name(), "N.Outer/Inner/Deepest");
    }

    #[test]
    fn members_follow_their_list_runs() {
        let module = Module::read(lib_image().build(), ReaderParameters::new()).unwrap();

        let base = module.get_type("N.Base").unwrap().unwrap();
        assert_eq!(base.fields.count(), 1);
        assert_eq!(base.methods[0].name, "Run");

        let t = module.get_type_by_name("N", "T").unwrap().unwrap();
        assert_eq!(t.fields[0].name, "value");
        assert_eq!(t.methods[0].parameters[0].name, "x");

        let list = module.get_type("N.List`1").unwrap().unwrap();
        assert_eq!(list.generic_parameters, vec!["E".to_string()]);
        assert_eq!(list.fields[0].name, "items");
        assert_eq!(list.methods.count(), 0);
    }

    #[test]
    fn lookup_token_bounds() {
        let module = Module::read(lib_image().build(), ReaderParameters::new()).unwrap();

        let field = module
            .lookup_token(Token::new(TableId::Field, 2))
            .unwrap()
            .unwrap();
        assert_eq!(field.as_field().unwrap().name, "value");

        assert!(module
            .lookup_token(Token::new(TableId::Field, 0))
            .unwrap()
            .is_none());
        assert!(module
            .lookup_token(Token::new(TableId::Field, 4))
            .unwrap()
            .is_none());
    }

    #[test]
    fn immediate_mode_realizes_everything() {
        let image = lib_image().build();
        let probe = image.probe();
        let module = Module::read(
            image,
            ReaderParameters::new().with_reading_mode(ReadingMode::Immediate),
        )
        .unwrap();

        let decoded = probe.total_decodes();
        module.types().unwrap();
        module.assembly_references().unwrap();
        assert_eq!(probe.total_decodes(), decoded);
        assert!(probe.decodes(TableId::TypeDef) > 0);
    }

    #[test]
    fn foreign_entry_point_is_rejected() {
        use crate::metadata::typesystem::{MethodDefinition, MethodSig, PrimitiveKind};

        let app = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let lib = Module::create("Lib.dll", ModuleParameters::new()).unwrap();

        let program = Arc::new(TypeDefinition::new("", "Program", 0));
        lib.add_type(program.clone()).unwrap();
        let main = Arc::new(MethodDefinition::new(
            "Main",
            0x0016,
            MethodSig::new(TypeSig::Primitive(PrimitiveKind::Void), Vec::new()),
        ));
        program.add_method(main.clone()).unwrap();

        assert!(matches!(
            app.set_entry_point(Some(main.clone())),
            Err(Error::InvalidArgument(_))
        ));
        lib.set_entry_point(Some(main.clone())).unwrap();
        assert!(Arc::ptr_eq(&lib.entry_point().unwrap().unwrap(), &main));
    }
}
