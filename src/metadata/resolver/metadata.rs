use std::sync::Arc;

use tracing::debug;

use crate::{
    metadata::{
        module::{ExportedTypeImplementation, Module},
        typesystem::{
            are_same_method_sig, are_same_type, primitive_reference, FieldDefRc, FieldHandle,
            MethodDefRc, MethodHandle, MethodSig, ResolutionScope, TypeDefRc, TypeHandle,
            TypeReference, TypeSig,
        },
    },
    Error, Result,
};

use super::assembly::ResolverHandle;

/// Turns references into the definitions they name.
///
/// `home` is the module asking; it supplies the assembly resolver and the core library for
/// primitive types. A miss is `Ok(None)`.
pub trait MetadataResolver: Send + Sync {
    /// The definition of the type `sig` names; wrappers and generic instances resolve to
    /// their element type
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] if the type lives in another assembly and no
    /// assembly resolver is available, or a decode error of `home`
    fn resolve_type(&self, home: &Module, sig: &TypeSig) -> Result<Option<TypeDefRc>>;

    /// The definition of a field
    ///
    /// # Errors
    /// See [`MetadataResolver::resolve_type`]
    fn resolve_field(&self, home: &Module, field: &FieldHandle) -> Result<Option<FieldDefRc>>;

    /// The definition of a method; generic instances resolve to the generic definition
    ///
    /// # Errors
    /// See [`MetadataResolver::resolve_type`]
    fn resolve_method(&self, home: &Module, method: &MethodHandle) -> Result<Option<MethodDefRc>>;
}

/// Limits of the [`DefaultMetadataResolver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResolverConfig {
    /// Maximum number of base types, enclosing types and forwarders followed in one
    /// resolution
    pub max_depth: usize,
}

impl Default for MetadataResolverConfig {
    fn default() -> Self {
        MetadataResolverConfig { max_depth: 64 }
    }
}

/// Resolution by name and signature shape across the modules an [`AssemblyResolver`]
/// locates.
///
/// - Types are found by namespace and name, nested types by walking the enclosing chain.
///   A type missing from its module is looked up among the module's exported types and
///   followed to the assembly it is forwarded to.
/// - Fields and methods are found on the resolved declaring type, then on its base types.
///   The first match in table order wins.
/// - Decode errors of modules other than `home` count as misses.
///
/// [`AssemblyResolver`]: super::AssemblyResolver
#[derive(Debug, Default)]
pub struct DefaultMetadataResolver {
    assembly_resolver: Option<ResolverHandle>,
    config: MetadataResolverConfig,
}

impl DefaultMetadataResolver {
    /// A resolver that uses the assembly resolver of the home module
    #[must_use]
    pub fn new(config: MetadataResolverConfig) -> Self {
        DefaultMetadataResolver {
            assembly_resolver: None,
            config,
        }
    }

    /// Use `resolver` instead of the home module's assembly resolver
    #[must_use]
    pub fn with_assembly_resolver(mut self, resolver: ResolverHandle) -> Self {
        self.assembly_resolver = Some(resolver);
        self
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            Err(Error::RecursionLimit(self.config.max_depth))
        } else {
            Ok(())
        }
    }

    fn assembly_resolver(&self, home: &Module) -> Result<Arc<dyn super::AssemblyResolver>> {
        let resolver = match &self.assembly_resolver {
            Some(handle) => handle.get(),
            None => home.assembly_resolver(),
        };
        resolver.ok_or_else(|| {
            Error::NotSupported(format!(
                "module {} has no assembly resolver to locate other assemblies",
                home.name()
            ))
        })
    }

    /// The module a resolution scope points to
    fn scope_module(&self, home: &Module, scope: &ResolutionScope) -> Result<Option<Arc<Module>>> {
        match scope {
            ResolutionScope::Module(scope) => Ok(scope.module()),
            ResolutionScope::ModuleRef(module_ref) => {
                if module_ref.name == home.name() {
                    return Ok(home.scope().module());
                }
                Ok(self
                    .assembly_resolver(home)?
                    .resolve_module(home.assembly().map(|name| &**name), &module_ref.name))
            }
            ResolutionScope::AssemblyRef(name) => {
                if home.assembly().is_some_and(|own| own.name == name.name) {
                    return Ok(home.scope().module());
                }
                let found = self.assembly_resolver(home)?.resolve(name);
                if found.is_none() {
                    debug!(home = %home.name(), assembly = %name.full_name(), "assembly not located");
                }
                Ok(found)
            }
        }
    }

    fn resolve_handle(&self, home: &Module, handle: &TypeHandle, depth: usize) -> Result<Option<TypeDefRc>> {
        match handle {
            TypeHandle::Definition(def) => Ok(Some(def.clone())),
            TypeHandle::Reference(reference) => self.resolve_reference(home, reference, depth),
        }
    }

    fn resolve_reference(
        &self,
        home: &Module,
        reference: &TypeReference,
        depth: usize,
    ) -> Result<Option<TypeDefRc>> {
        self.check_depth(depth)?;

        if let Some(declaring) = &reference.declaring_type {
            let Some(outer) = self.resolve_reference(home, declaring, depth + 1)? else {
                return Ok(None);
            };
            return Ok(outer.nested_type(&reference.name));
        }

        let Some(module) = self.scope_module(home, &reference.scope)? else {
            return Ok(None);
        };
        let found = self.find_type(home, &module, &reference.namespace, &reference.name, depth);
        let found = tolerate_foreign(home, &module, found)?;
        if found.is_none() {
            debug!(
                home = %home.name(),
                module = %module.name(),
                type_name = %reference.full_name(),
                "type not found"
            );
        }
        Ok(found)
    }

    /// A top-level type of `module`, following type forwarders
    fn find_type(
        &self,
        home: &Module,
        module: &Arc<Module>,
        namespace: &str,
        name: &str,
        depth: usize,
    ) -> Result<Option<TypeDefRc>> {
        self.check_depth(depth)?;

        if let Some(def) = module.types()?.get(namespace, name) {
            return Ok(Some(def));
        }
        if !module.has_exported_types()? {
            return Ok(None);
        }

        let exported = module.exported_types()?;
        let Some((_, exported)) = exported.iter().find(|(_, exported)| {
            exported.declaring_type().is_none()
                && exported.name == name
                && exported.namespace == namespace
        }) else {
            return Ok(None);
        };

        let target = match exported.scope() {
            ExportedTypeImplementation::Assembly(assembly) => {
                self.scope_module(home, &ResolutionScope::AssemblyRef(assembly.clone()))?
            }
            ExportedTypeImplementation::File(file) => self
                .assembly_resolver(home)?
                .resolve_module(module.assembly().map(|name| &**name), file),
            ExportedTypeImplementation::Declaring(_) => None,
        };
        let Some(target) = target else {
            return Ok(None);
        };
        if Arc::ptr_eq(&target, module) {
            return Ok(None);
        }

        let found = self.find_type(home, &target, namespace, name, depth + 1);
        tolerate_foreign(home, &target, found)
    }

    fn resolve_sig(&self, home: &Module, sig: &TypeSig, depth: usize) -> Result<Option<TypeDefRc>> {
        if let TypeSig::Primitive(kind) = sig {
            let primitive = primitive_reference(home.id(), home.core_library_scope()?, *kind);
            return self.resolve_reference(home, &primitive, depth);
        }

        match sig.element_handle() {
            Some(handle) => self.resolve_handle(home, handle, depth),
            None => Ok(None),
        }
    }

    /// Search `start` and its base types for a member
    fn walk_bases<T>(
        &self,
        home: &Module,
        start: TypeDefRc,
        find: impl Fn(&TypeDefRc) -> Option<T>,
    ) -> Result<Option<T>> {
        let mut current = start;
        for depth in 0..=self.config.max_depth {
            if let Some(found) = find(&current) {
                return Ok(Some(found));
            }

            let Some(base) = current.base_type().cloned() else {
                return Ok(None);
            };
            let owner = current.module().and_then(|scope| scope.module());
            let base_home = owner.as_deref().unwrap_or(home);
            match self.resolve_sig(base_home, &base, depth + 1)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Err(Error::RecursionLimit(self.config.max_depth))
    }

    fn resolve_method_reference(
        &self,
        home: &Module,
        declaring: &TypeSig,
        name: &str,
        signature: &MethodSig,
    ) -> Result<Option<MethodDefRc>> {
        let Some(declaring) = self.resolve_sig(home, declaring, 0)? else {
            return Ok(None);
        };

        self.walk_bases(home, declaring, |def| {
            def.methods
                .iter()
                .map(|(_, method)| method)
                .find(|method| {
                    method.name == name && are_same_method_sig(&method.signature, signature)
                })
                .cloned()
        })
    }
}

/// Decode failures of a foreign module are misses; those of the home module propagate
fn tolerate_foreign<T>(home: &Module, module: &Module, result: Result<Option<T>>) -> Result<Option<T>> {
    match result {
        Err(error @ (Error::Malformed { .. } | Error::OutOfBounds | Error::Disposed))
            if module.id() != home.id() =>
        {
            debug!(home = %home.name(), module = %module.name(), %error, "treating unreadable module as a miss");
            Ok(None)
        }
        other => other,
    }
}

impl MetadataResolver for DefaultMetadataResolver {
    fn resolve_type(&self, home: &Module, sig: &TypeSig) -> Result<Option<TypeDefRc>> {
        self.resolve_sig(home, sig, 0)
    }

    fn resolve_field(&self, home: &Module, field: &FieldHandle) -> Result<Option<FieldDefRc>> {
        let reference = match field {
            FieldHandle::Definition(def) => return Ok(Some(def.clone())),
            FieldHandle::Reference(reference) => reference,
        };
        let Some(declaring) = self.resolve_sig(home, &reference.declaring_type, 0)? else {
            return Ok(None);
        };

        let found = self.walk_bases(home, declaring, |def| {
            def.fields
                .iter()
                .map(|(_, field)| field)
                .find(|field| {
                    field.name == reference.name
                        && are_same_type(&field.field_type, &reference.field_type)
                })
                .cloned()
        })?;
        if found.is_none() {
            debug!(home = %home.name(), field = %reference.full_name(), "field not found");
        }
        Ok(found)
    }

    fn resolve_method(&self, home: &Module, method: &MethodHandle) -> Result<Option<MethodDefRc>> {
        match method.element_method() {
            MethodHandle::Definition(def) => Ok(Some(def.clone())),
            MethodHandle::Reference(reference) => {
                let found = self.resolve_method_reference(
                    home,
                    &reference.declaring_type,
                    &reference.name,
                    &reference.signature,
                )?;
                if found.is_none() {
                    debug!(home = %home.name(), method = %reference.full_name(), "method not found");
                }
                Ok(found)
            }
            MethodHandle::Instance(_) => Ok(None),
        }
    }
}
