use std::{fmt, sync::Arc};

use crate::metadata::{
    image::{ModuleKind, SymbolReader, TargetArchitecture},
    identity::AssemblyVersion,
    import::{MetadataImporter, ReflectionImporter},
    resolver::{AssemblyResolver, MetadataResolver, MetadataResolverConfig, ResolverHandle},
};

/// When the collections of a module are realized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingMode {
    /// Everything is realized while the module is opened
    Immediate,
    /// Each collection is realized on first access
    #[default]
    Deferred,
}

/// The runtime generation a module targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TargetRuntime {
    /// .NET Framework 1.0
    Net1_0,
    /// .NET Framework 1.1
    Net1_1,
    /// .NET Framework 2.0 to 3.5
    Net2_0,
    /// .NET Framework 4.0 and later, .NET Core
    #[default]
    Net4_0,
}

impl TargetRuntime {
    /// Classify a metadata version string such as `v4.0.30319`
    #[must_use]
    pub fn from_version_string(version: &str) -> Self {
        let trimmed = version.trim_start_matches('v');
        match trimmed.chars().next() {
            Some('1') if trimmed.starts_with("1.0") => TargetRuntime::Net1_0,
            Some('1') => TargetRuntime::Net1_1,
            Some('2') => TargetRuntime::Net2_0,
            _ => TargetRuntime::Net4_0,
        }
    }

    /// The metadata version string written for this runtime
    #[must_use]
    pub fn version_string(self) -> &'static str {
        match self {
            TargetRuntime::Net1_0 => "v1.0.3705",
            TargetRuntime::Net1_1 => "v1.1.4322",
            TargetRuntime::Net2_0 => "v2.0.50727",
            TargetRuntime::Net4_0 => "v4.0.30319",
        }
    }

    /// Version of `mscorlib` shipped with this runtime
    #[must_use]
    pub fn corlib_version(self) -> AssemblyVersion {
        match self {
            TargetRuntime::Net1_0 => AssemblyVersion::new(1, 0, 0, 0),
            TargetRuntime::Net1_1 => AssemblyVersion::new(1, 0, 5000, 0),
            TargetRuntime::Net2_0 => AssemblyVersion::new(2, 0, 0, 0),
            TargetRuntime::Net4_0 => AssemblyVersion::new(4, 0, 0, 0),
        }
    }
}

/// Options for [`crate::Module::open`]
#[derive(Default)]
pub struct ReaderParameters {
    /// When collections are realized
    pub reading_mode: ReadingMode,
    /// Locates other assemblies, `None` to resolve only within the module itself
    pub assembly_resolver: Option<ResolverHandle>,
    /// Replaces the default metadata resolver
    pub metadata_resolver: Option<Arc<dyn MetadataResolver>>,
    /// Replaces the default metadata importer
    pub metadata_importer: Option<Arc<dyn MetadataImporter>>,
    /// Replaces the default descriptor importer
    pub reflection_importer: Option<Arc<dyn ReflectionImporter>>,
    /// Debug symbol reader, handed the module's debug header on open
    pub symbol_reader: Option<Box<dyn SymbolReader>>,
    /// Limits of the default metadata resolver
    pub resolver_config: MetadataResolverConfig,
}

impl ReaderParameters {
    /// Default parameters: deferred reading, no assembly resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reading mode
    #[must_use]
    pub fn with_reading_mode(mut self, mode: ReadingMode) -> Self {
        self.reading_mode = mode;
        self
    }

    /// Use `resolver` and dispose it together with the module
    #[must_use]
    pub fn with_assembly_resolver(mut self, resolver: Arc<dyn AssemblyResolver>) -> Self {
        self.assembly_resolver = Some(ResolverHandle::Owned(resolver));
        self
    }

    /// Use `resolver` without taking ownership; the caller keeps it alive and disposes it
    #[must_use]
    pub fn with_borrowed_assembly_resolver(mut self, resolver: &Arc<dyn AssemblyResolver>) -> Self {
        self.assembly_resolver = Some(ResolverHandle::NotOwned(Arc::downgrade(resolver)));
        self
    }

    /// Replace the metadata resolver
    #[must_use]
    pub fn with_metadata_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.metadata_resolver = Some(resolver);
        self
    }

    /// Replace the metadata importer
    #[must_use]
    pub fn with_metadata_importer(mut self, importer: Arc<dyn MetadataImporter>) -> Self {
        self.metadata_importer = Some(importer);
        self
    }

    /// Replace the descriptor importer
    #[must_use]
    pub fn with_reflection_importer(mut self, importer: Arc<dyn ReflectionImporter>) -> Self {
        self.reflection_importer = Some(importer);
        self
    }

    /// Attach a symbol reader
    #[must_use]
    pub fn with_symbol_reader(mut self, reader: Box<dyn SymbolReader>) -> Self {
        self.symbol_reader = Some(reader);
        self
    }

    /// Set the limits of the default metadata resolver
    #[must_use]
    pub fn with_resolver_config(mut self, config: MetadataResolverConfig) -> Self {
        self.resolver_config = config;
        self
    }
}

impl fmt::Debug for ReaderParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderParameters")
            .field("reading_mode", &self.reading_mode)
            .field("assembly_resolver", &self.assembly_resolver.is_some())
            .field("symbol_reader", &self.symbol_reader.is_some())
            .field("resolver_config", &self.resolver_config)
            .finish_non_exhaustive()
    }
}

/// Options for [`crate::Module::create`]
#[derive(Default)]
pub struct ModuleParameters {
    /// Kind of module
    pub kind: ModuleKind,
    /// Target runtime
    pub runtime: TargetRuntime,
    /// Target architecture
    pub architecture: TargetArchitecture,
    /// Locates other assemblies
    pub assembly_resolver: Option<ResolverHandle>,
    /// Replaces the default metadata resolver
    pub metadata_resolver: Option<Arc<dyn MetadataResolver>>,
    /// Replaces the default metadata importer
    pub metadata_importer: Option<Arc<dyn MetadataImporter>>,
    /// Replaces the default descriptor importer
    pub reflection_importer: Option<Arc<dyn ReflectionImporter>>,
    /// Limits of the default metadata resolver
    pub resolver_config: MetadataResolverConfig,
}

impl ModuleParameters {
    /// A library targeting the current runtime
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the module kind
    #[must_use]
    pub fn with_kind(mut self, kind: ModuleKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the target runtime
    #[must_use]
    pub fn with_runtime(mut self, runtime: TargetRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Set the target architecture
    #[must_use]
    pub fn with_architecture(mut self, architecture: TargetArchitecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Use `resolver` and dispose it together with the module
    #[must_use]
    pub fn with_assembly_resolver(mut self, resolver: Arc<dyn AssemblyResolver>) -> Self {
        self.assembly_resolver = Some(ResolverHandle::Owned(resolver));
        self
    }

    /// Use `resolver` without taking ownership
    #[must_use]
    pub fn with_borrowed_assembly_resolver(mut self, resolver: &Arc<dyn AssemblyResolver>) -> Self {
        self.assembly_resolver = Some(ResolverHandle::NotOwned(Arc::downgrade(resolver)));
        self
    }

    /// Replace the metadata resolver
    #[must_use]
    pub fn with_metadata_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.metadata_resolver = Some(resolver);
        self
    }

    /// Replace the metadata importer
    #[must_use]
    pub fn with_metadata_importer(mut self, importer: Arc<dyn MetadataImporter>) -> Self {
        self.metadata_importer = Some(importer);
        self
    }
}

impl fmt::Debug for ModuleParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleParameters")
            .field("kind", &self.kind)
            .field("runtime", &self.runtime)
            .field("architecture", &self.architecture)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_from_version_string() {
        assert_eq!(TargetRuntime::from_version_string("v1.0.3705"), TargetRuntime::Net1_0);
        assert_eq!(TargetRuntime::from_version_string("v1.1.4322"), TargetRuntime::Net1_1);
        assert_eq!(TargetRuntime::from_version_string("v2.0.50727"), TargetRuntime::Net2_0);
        assert_eq!(TargetRuntime::from_version_string("v4.0.30319"), TargetRuntime::Net4_0);
        assert_eq!(TargetRuntime::from_version_string(""), TargetRuntime::Net4_0);
    }

    #[test]
    fn runtime_round_trips_its_version_string() {
        for runtime in [
            TargetRuntime::Net1_0,
            TargetRuntime::Net1_1,
            TargetRuntime::Net2_0,
            TargetRuntime::Net4_0,
        ] {
            assert_eq!(TargetRuntime::from_version_string(runtime.version_string()), runtime);
        }
        assert_eq!(TargetRuntime::Net1_1.corlib_version().to_string(), "1.0.5000.0");
    }

    #[test]
    fn reader_parameters_builder() {
        let parameters = ReaderParameters::new().with_reading_mode(ReadingMode::Immediate);
        assert_eq!(parameters.reading_mode, ReadingMode::Immediate);
        assert!(parameters.assembly_resolver.is_none());
    }
}
