use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::metadata::{
    module::ModuleId,
    typesystem::{PrimitiveKind, ResolutionScope, TypeReference, TypeReferenceRc, TypeSig},
};

/// Simple names of assemblies that can play the role of the core library
pub const CORE_LIBRARY_NAMES: [&str; 4] = [
    "mscorlib",
    "System.Runtime",
    "System.Private.CoreLib",
    "netstandard",
];

/// References to the built-in types of the core library, minted into one module.
///
/// The references are built once per module; the scope is the module itself when the module
/// is the core library, and an assembly reference to the core library otherwise.
pub struct TypeSystem {
    corlib: ResolutionScope,
    primitives: Vec<TypeReferenceRc>,
}

impl TypeSystem {
    pub(crate) fn new(module: ModuleId, corlib: ResolutionScope) -> Self {
        let primitives = PrimitiveKind::iter()
            .map(|kind| Arc::new(primitive_reference(module, corlib.clone(), kind)))
            .collect();

        TypeSystem { corlib, primitives }
    }

    /// Scope of the core library
    #[must_use]
    pub fn corlib(&self) -> &ResolutionScope {
        &self.corlib
    }

    /// Reference to the core library type behind a primitive
    #[must_use]
    pub fn primitive(&self, kind: PrimitiveKind) -> TypeReferenceRc {
        self.primitives[kind as usize].clone()
    }

    /// `System.Object`
    #[must_use]
    pub fn object(&self) -> TypeReferenceRc {
        self.primitive(PrimitiveKind::Object)
    }

    /// `System.String`
    #[must_use]
    pub fn string(&self) -> TypeReferenceRc {
        self.primitive(PrimitiveKind::String)
    }

    /// `System.Void`
    #[must_use]
    pub fn void(&self) -> TypeReferenceRc {
        self.primitive(PrimitiveKind::Void)
    }

    /// `System.Int32`
    #[must_use]
    pub fn int32(&self) -> TypeReferenceRc {
        self.primitive(PrimitiveKind::Int32)
    }

    /// The primitive a named core library type stands for, if any
    #[must_use]
    pub fn as_primitive(sig: &TypeSig) -> Option<PrimitiveKind> {
        let TypeSig::Named(handle) = sig else {
            return None;
        };
        if handle.namespace() != "System" || handle.declaring_type().is_some() {
            return None;
        }
        PrimitiveKind::iter().find(|kind| kind.name() == handle.name())
    }
}

/// Reference to the core library type behind `kind`, minted into `module` under `corlib`
pub(crate) fn primitive_reference(
    module: ModuleId,
    corlib: ResolutionScope,
    kind: PrimitiveKind,
) -> TypeReference {
    TypeReference::new(module, corlib, "System", kind.name()).with_value_type(kind.is_value_type())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        identity::{AssemblyNameReference, AssemblyVersion},
        typesystem::TypeHandle,
    };

    #[test]
    fn primitives_are_corlib_references() {
        let scope = ResolutionScope::AssemblyRef(Arc::new(AssemblyNameReference::new(
            "mscorlib",
            AssemblyVersion::new(4, 0, 0, 0),
        )));
        let module = ModuleId::next();
        let system = TypeSystem::new(module, scope);

        let int32 = system.int32();
        assert_eq!(int32.full_name(), "System.Int32");
        assert_eq!(int32.module, module);
        assert_eq!(int32.scope.name(), "mscorlib");
        assert!(int32.is_value_type());
        assert!(!system.string().is_value_type());
        assert!(Arc::ptr_eq(&system.object(), &system.object()));

        let sig = TypeSig::Named(TypeHandle::Reference(system.void()));
        assert_eq!(TypeSystem::as_primitive(&sig), Some(PrimitiveKind::Void));
    }
}
