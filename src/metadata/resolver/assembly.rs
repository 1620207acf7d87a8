use std::{
    fmt,
    sync::{Arc, Weak},
};

use dashmap::DashMap;
use tracing::debug;

use crate::metadata::{identity::AssemblyNameReference, module::Module};

/// Locates the module that implements an assembly.
///
/// How names turn into images (search paths, GAC, package caches) is up to the
/// implementation. A miss is `None`; retry policy, if any, belongs here as well.
pub trait AssemblyResolver: Send + Sync {
    /// The manifest module of the assembly `name`
    fn resolve(&self, name: &AssemblyNameReference) -> Option<Arc<Module>>;

    /// A module of a multi-module assembly.
    ///
    /// `assembly` is the assembly of the module making the request, `None` for a netmodule.
    fn resolve_module(
        &self,
        assembly: Option<&AssemblyNameReference>,
        module_name: &str,
    ) -> Option<Arc<Module>> {
        let _ = (assembly, module_name);
        None
    }

    /// Release cached modules
    fn dispose(&self) {}
}

/// How a module holds its assembly resolver
#[derive(Clone)]
pub enum ResolverHandle {
    /// The module owns the resolver and disposes it when it is disposed
    Owned(Arc<dyn AssemblyResolver>),
    /// The caller owns the resolver; the module only borrows it
    NotOwned(Weak<dyn AssemblyResolver>),
}

impl ResolverHandle {
    /// The resolver, `None` if a borrowed resolver has been dropped
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn AssemblyResolver>> {
        match self {
            ResolverHandle::Owned(resolver) => Some(resolver.clone()),
            ResolverHandle::NotOwned(resolver) => resolver.upgrade(),
        }
    }

    /// True if the module owns the resolver
    #[must_use]
    pub fn is_owned(&self) -> bool {
        matches!(self, ResolverHandle::Owned(_))
    }

    /// Dispose the resolver if it is owned; borrowed resolvers are left alone
    pub fn dispose(&self) {
        if let ResolverHandle::Owned(resolver) = self {
            resolver.dispose();
        }
    }
}

impl fmt::Debug for ResolverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverHandle::Owned(_) => f.write_str("ResolverHandle::Owned"),
            ResolverHandle::NotOwned(_) => f.write_str("ResolverHandle::NotOwned"),
        }
    }
}

/// An [`AssemblyResolver`] over modules registered in memory.
///
/// Assemblies are keyed by simple name; versions and public key tokens are not compared.
/// Modules of multi-module assemblies are keyed by module name.
#[derive(Default)]
pub struct AssemblyCache {
    assemblies: DashMap<String, Arc<Module>>,
    modules: DashMap<String, Arc<Module>>,
}

impl AssemblyCache {
    /// An empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the manifest module of an assembly; replaces an earlier registration
    /// under the same name. Netmodules without an assembly are registered by module name.
    pub fn register(&self, module: Arc<Module>) {
        match module.assembly() {
            Some(assembly) => {
                self.assemblies.insert(assembly.name.clone(), module);
            }
            None => self.register_module(module),
        }
    }

    /// Register a module under its module name
    pub fn register_module(&self, module: Arc<Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Remove the assembly `name`, returning its module
    pub fn remove(&self, name: &str) -> Option<Arc<Module>> {
        self.assemblies.remove(name).map(|(_, module)| module)
    }

    /// Number of registered assemblies
    #[must_use]
    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    /// True if no assembly is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}

impl AssemblyResolver for AssemblyCache {
    fn resolve(&self, name: &AssemblyNameReference) -> Option<Arc<Module>> {
        let found = self
            .assemblies
            .get(&name.name)
            .map(|entry| entry.value().clone());
        if found.is_none() {
            debug!(assembly = %name.full_name(), "assembly not registered");
        }
        found
    }

    fn resolve_module(
        &self,
        _assembly: Option<&AssemblyNameReference>,
        module_name: &str,
    ) -> Option<Arc<Module>> {
        self.modules
            .get(module_name)
            .map(|entry| entry.value().clone())
    }

    fn dispose(&self) {
        self.assemblies.clear();
        self.modules.clear();
    }
}

impl fmt::Debug for AssemblyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyCache")
            .field("assemblies", &self.assemblies.len())
            .field("modules", &self.modules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        identity::AssemblyVersion,
        image::ModuleKind,
        module::ModuleParameters,
    };

    #[test]
    fn cache_resolves_by_simple_name() {
        let cache = AssemblyCache::new();
        let lib = Module::create("Lib.dll", ModuleParameters::new()).unwrap();
        cache.register(lib.clone());

        let name = AssemblyNameReference::new("Lib", AssemblyVersion::new(9, 9, 9, 9));
        assert!(Arc::ptr_eq(&cache.resolve(&name).unwrap(), &lib));
        assert!(cache
            .resolve(&AssemblyNameReference::new("Other", AssemblyVersion::ZERO))
            .is_none());

        assert!(cache.remove("Lib").is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn netmodules_resolve_by_module_name() {
        let cache = AssemblyCache::new();
        let part = Module::create(
            "Part.netmodule",
            ModuleParameters::new().with_kind(ModuleKind::NetModule),
        )
        .unwrap();
        cache.register(part.clone());

        assert!(cache.is_empty());
        assert!(Arc::ptr_eq(
            &cache.resolve_module(None, "Part.netmodule").unwrap(),
            &part
        ));
    }

    #[test]
    fn borrowed_handle_does_not_dispose() {
        let cache = Arc::new(AssemblyCache::new());
        cache.register(Module::create("Lib.dll", ModuleParameters::new()).unwrap());
        let resolver: Arc<dyn AssemblyResolver> = cache.clone();

        let borrowed = ResolverHandle::NotOwned(Arc::downgrade(&resolver));
        borrowed.dispose();
        assert_eq!(cache.len(), 1);
        assert!(!borrowed.is_owned());

        let owned = ResolverHandle::Owned(resolver);
        owned.dispose();
        assert!(cache.is_empty());
    }

    #[test]
    fn dropped_borrowed_resolver_is_gone() {
        let resolver: Arc<dyn AssemblyResolver> = Arc::new(AssemblyCache::new());
        let handle = ResolverHandle::NotOwned(Arc::downgrade(&resolver));
        assert!(handle.get().is_some());
        drop(resolver);
        assert!(handle.get().is_none());
    }
}
