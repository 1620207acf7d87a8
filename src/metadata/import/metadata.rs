use std::sync::Arc;

use tracing::debug;

use super::context::{GenericScope, ImportGenericContext};
use crate::{
    metadata::{
        identity::{AssemblyFlags, AssemblyNameRc, AssemblyNameReference},
        module::{Module, ModuleId},
        tables::TableId,
        token::Token,
        typesystem::{
            normalized_method_name, FieldHandle, FieldReference, GenericInstanceMethod,
            GenericOwner, GenericParam, GenericParamKind, MethodHandle, MethodReference,
            MethodSig, ModuleScopeRc, ResolutionScope, SigLeaf, TypeHandle, TypeReference,
            TypeReferenceRc, TypeSig,
        },
    },
    Error, Result,
};

/// Rewrites types and members of other modules into references owned by a target module.
///
/// Implementations receive the target module and the generic context of the import; the
/// context has already been checked to belong to the target.
pub trait MetadataImporter: Send + Sync {
    /// Import a type signature
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for generic parameters the context cannot map,
    /// or [`Error::NotSupported`] for scopes that cannot be expressed in the target
    fn import_type(
        &self,
        target: &Module,
        sig: &TypeSig,
        context: &mut ImportGenericContext,
    ) -> Result<TypeSig>;

    /// Import a field
    ///
    /// # Errors
    /// See [`MetadataImporter::import_type`]
    fn import_field(
        &self,
        target: &Module,
        field: &FieldHandle,
        context: &mut ImportGenericContext,
    ) -> Result<FieldHandle>;

    /// Import a method or generic method instantiation
    ///
    /// # Errors
    /// See [`MetadataImporter::import_type`]
    fn import_method(
        &self,
        target: &Module,
        method: &MethodHandle,
        context: &mut ImportGenericContext,
    ) -> Result<MethodHandle>;

    /// Find or add the assembly reference for `name` in the target
    ///
    /// # Errors
    /// Returns an error if the target's references cannot be realized
    fn import_assembly_name(
        &self,
        target: &Module,
        name: &AssemblyNameReference,
    ) -> Result<AssemblyNameRc> {
        import_assembly_name(target, name)
    }
}

/// The default [`MetadataImporter`].
///
/// Signatures whose types and generic parameters are all owned by the target come back
/// unchanged. Everything else is rebuilt from fresh references minted into the target:
/// wrappers keep their order, generic parameters map by position onto the owners found in
/// the context and assembly scopes become assembly references of the target, added once
/// per full name.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMetadataImporter;

impl DefaultMetadataImporter {
    fn import_handle(&self, target: &Module, handle: &TypeHandle) -> Result<TypeHandle> {
        if handle.module_id() == Some(target.id()) {
            return Ok(handle.clone());
        }
        Ok(TypeHandle::Reference(self.import_reference(target, handle)?))
    }

    fn import_reference(&self, target: &Module, handle: &TypeHandle) -> Result<TypeReferenceRc> {
        let declaring = match handle.declaring_type() {
            Some(declaring) => Some(self.import_reference(target, &declaring)?),
            None => None,
        };
        let scope = match &declaring {
            Some(declaring) => declaring.scope.clone(),
            None => self.import_scope(target, handle)?,
        };

        let names = handle
            .generic_params()
            .into_iter()
            .map(|param| param.name)
            .collect();
        let mut reference = TypeReference::new(target.id(), scope, handle.namespace(), handle.name())
            .with_value_type(handle.is_value_type())
            .with_generic_parameters(names);
        if let Some(declaring) = declaring {
            reference = reference.with_declaring_type(declaring);
        }

        debug!(
            module = %target.name(),
            type_name = %reference.full_name(),
            scope = reference.scope.name(),
            "imported type reference"
        );
        Ok(Arc::new(reference))
    }

    fn import_scope(&self, target: &Module, handle: &TypeHandle) -> Result<ResolutionScope> {
        match handle {
            TypeHandle::Definition(def) => match def.module() {
                Some(scope) => self.import_module_scope(target, scope),
                None => Err(Error::InvalidArgument(format!(
                    "type {} does not belong to a module",
                    def.full_name()
                ))),
            },
            TypeHandle::Reference(reference) => match &reference.scope {
                ResolutionScope::Module(scope) => self.import_module_scope(target, scope),
                ResolutionScope::AssemblyRef(name) => Ok(ResolutionScope::AssemblyRef(
                    self.import_assembly_name(target, name)?,
                )),
                ResolutionScope::ModuleRef(module_ref) => Err(Error::NotSupported(format!(
                    "cannot import {} scoped to module reference {}",
                    reference.full_name(),
                    module_ref.name
                ))),
            },
        }
    }

    fn import_module_scope(&self, target: &Module, scope: &ModuleScopeRc) -> Result<ResolutionScope> {
        if scope.id == target.id() {
            return Ok(ResolutionScope::Module(target.scope().clone()));
        }
        match &scope.assembly {
            Some(assembly) => Ok(ResolutionScope::AssemblyRef(
                self.import_assembly_name(target, assembly)?,
            )),
            None => Err(Error::NotSupported(format!(
                "module {} has no assembly to reference",
                scope.name
            ))),
        }
    }

    fn import_method_sig(
        &self,
        target: &Module,
        sig: &MethodSig,
        context: &mut ImportGenericContext,
    ) -> Result<MethodSig> {
        Ok(MethodSig {
            has_this: sig.has_this,
            explicit_this: sig.explicit_this,
            vararg: sig.vararg,
            generic_arity: sig.generic_arity,
            return_type: self.import_type(target, &sig.return_type, context)?,
            params: self.import_list(target, &sig.params, context)?,
            sentinel_params: self.import_list(target, &sig.sentinel_params, context)?,
        })
    }

    fn import_list(
        &self,
        target: &Module,
        sigs: &[TypeSig],
        context: &mut ImportGenericContext,
    ) -> Result<Vec<TypeSig>> {
        sigs.iter()
            .map(|sig| self.import_type(target, sig, context))
            .collect()
    }

    fn import_element(
        &self,
        target: &Module,
        element: &TypeSig,
        context: &mut ImportGenericContext,
    ) -> Result<Box<TypeSig>> {
        Ok(Box::new(self.import_type(target, element, context)?))
    }
}

impl MetadataImporter for DefaultMetadataImporter {
    fn import_type(
        &self,
        target: &Module,
        sig: &TypeSig,
        context: &mut ImportGenericContext,
    ) -> Result<TypeSig> {
        if is_owned_by(target.id(), sig) {
            return Ok(sig.clone());
        }

        Ok(match sig {
            TypeSig::Primitive(kind) => TypeSig::Primitive(*kind),
            TypeSig::Named(handle) => TypeSig::Named(self.import_handle(target, handle)?),
            TypeSig::GenericInstance(handle, arguments) => TypeSig::GenericInstance(
                self.import_handle(target, handle)?,
                self.import_list(target, arguments, context)?,
            ),
            TypeSig::GenericParam(param) => {
                TypeSig::GenericParam(import_generic_param(target.id(), param, context)?)
            }
            TypeSig::SzArray(element) => {
                TypeSig::SzArray(self.import_element(target, element, context)?)
            }
            TypeSig::Array(element, shape) => {
                TypeSig::Array(self.import_element(target, element, context)?, shape.clone())
            }
            TypeSig::Pointer(element) => {
                TypeSig::Pointer(self.import_element(target, element, context)?)
            }
            TypeSig::ByRef(element) => TypeSig::ByRef(self.import_element(target, element, context)?),
            TypeSig::Pinned(element) => {
                TypeSig::Pinned(self.import_element(target, element, context)?)
            }
            TypeSig::Modified {
                required,
                modifier,
                element,
            } => TypeSig::Modified {
                required: *required,
                modifier: self.import_handle(target, modifier)?,
                element: self.import_element(target, element, context)?,
            },
            TypeSig::FnPtr(method) => {
                TypeSig::FnPtr(Box::new(self.import_method_sig(target, method, context)?))
            }
        })
    }

    fn import_field(
        &self,
        target: &Module,
        field: &FieldHandle,
        context: &mut ImportGenericContext,
    ) -> Result<FieldHandle> {
        if field.module_id() == Some(target.id()) {
            return Ok(field.clone());
        }

        let declaring = field.declaring_type().ok_or_else(|| {
            Error::InvalidArgument(format!("field {} has no declaring type", field.name()))
        })?;
        let declaring = self.import_type(target, &declaring, context)?;
        let scope = declaring
            .element_handle()
            .map(GenericScope::for_type)
            .unwrap_or_default();
        let field_type =
            context.with_scope(scope, |context| self.import_type(target, field.field_type(), context))?;

        Ok(FieldHandle::Reference(Arc::new(FieldReference {
            module: target.id(),
            token: Token::nil(TableId::MemberRef),
            name: field.name().to_string(),
            declaring_type: declaring,
            field_type,
        })))
    }

    fn import_method(
        &self,
        target: &Module,
        method: &MethodHandle,
        context: &mut ImportGenericContext,
    ) -> Result<MethodHandle> {
        if method.module_id() == Some(target.id()) {
            return Ok(method.clone());
        }

        if let MethodHandle::Instance(instance) = method {
            let element = self.import_method(target, &instance.element, context)?;
            let arguments = self.import_list(target, &instance.arguments, context)?;
            return Ok(MethodHandle::Instance(Arc::new(GenericInstanceMethod {
                module: target.id(),
                token: Token::nil(TableId::MethodSpec),
                element,
                arguments,
            })));
        }

        let declaring = method.declaring_type().ok_or_else(|| {
            Error::InvalidArgument(format!("method {} has no declaring type", method.name()))
        })?;
        let declaring = self.import_type(target, &declaring, context)?;

        let names: Vec<String> = method
            .generic_params()
            .into_iter()
            .map(|param| param.name)
            .collect();
        let normalized = normalized_method_name(&declaring, method.name());
        let params = GenericParam::list(
            GenericParamKind::Method,
            &names,
            GenericOwner {
                module: Some(target.id()),
                name: normalized.clone(),
            },
        );
        let scope = GenericScope::for_method(normalized, params, declaring.element_handle());
        let signature = context.with_scope(scope, |context| {
            self.import_method_sig(target, method.signature(), context)
        })?;

        Ok(MethodHandle::Reference(Arc::new(MethodReference {
            module: target.id(),
            token: Token::nil(TableId::MemberRef),
            name: method.name().to_string(),
            declaring_type: declaring,
            signature,
            generic_parameters: names,
        })))
    }
}

/// True if every type and bound generic parameter in `sig` belongs to `module`
pub(crate) fn is_owned_by(module: ModuleId, sig: &TypeSig) -> bool {
    let mut owned = true;
    sig.walk(&mut |leaf| match leaf {
        SigLeaf::Type(handle) => owned &= handle.module_id() == Some(module),
        SigLeaf::GenericParam(param) => {
            owned &= param
                .owner
                .as_ref()
                .map_or(true, |owner| owner.module == Some(module));
        }
    });
    owned
}

/// Map a generic parameter onto the parameter at the same position of the matching owner
/// in `context`. Unbound parameters and parameters already owned by `module` are kept.
pub(crate) fn import_generic_param(
    module: ModuleId,
    param: &GenericParam,
    context: &ImportGenericContext,
) -> Result<GenericParam> {
    let Some(owner) = &param.owner else {
        return Ok(param.clone());
    };
    if owner.module == Some(module) {
        return Ok(param.clone());
    }

    match param.kind {
        GenericParamKind::Type => context.type_parameter(&owner.name, param.position),
        GenericParamKind::Method => context.method_parameter(&owner.name, param.position),
    }
}

/// Add the reference form of `name` to `target` unless an equal one exists: the public key
/// is reduced to its token and the hash value is dropped
pub(crate) fn import_assembly_name(
    target: &Module,
    name: &AssemblyNameReference,
) -> Result<AssemblyNameRc> {
    let mut reference = name.detached();
    reference.public_key = Vec::new();
    reference.hash_value = Vec::new();
    reference.flags.remove(AssemblyFlags::PUBLIC_KEY);
    target.add_assembly_reference(&reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        module::ModuleParameters,
        typesystem::{PrimitiveKind, TypeDefinition},
    };

    fn int32() -> TypeSig {
        TypeSig::Primitive(PrimitiveKind::Int32)
    }

    #[test]
    fn own_signature_is_returned_unchanged() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let def = Arc::new(TypeDefinition::new("App", "Program", 0));
        target.add_type(def.clone()).unwrap();

        let sig = TypeSig::SzArray(Box::new(TypeSig::Named(def.into())));
        let imported = target.import_type(&sig, None).unwrap();
        assert_eq!(imported, sig);
        assert!(target.assembly_references().unwrap().iter().next().is_none());
    }

    #[test]
    fn primitives_are_module_neutral() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        assert!(is_owned_by(target.id(), &int32()));
        assert_eq!(target.import_type(&int32(), None).unwrap(), int32());
    }

    #[test]
    fn foreign_definition_becomes_assembly_scoped_reference() {
        let source = Module::create("Lib.dll", ModuleParameters::new()).unwrap();
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let def = Arc::new(TypeDefinition::new("N", "T", 0));
        source.add_type(def.clone()).unwrap();

        let sig = TypeSig::ByRef(Box::new(TypeSig::SzArray(Box::new(TypeSig::Named(
            def.into(),
        )))));
        let imported = target.import_type(&sig, None).unwrap();

        let TypeSig::ByRef(inner) = &imported else {
            panic!("expected by-ref, got {imported:?}");
        };
        let TypeSig::SzArray(element) = inner.as_ref() else {
            panic!("expected array, got {inner:?}");
        };
        let TypeSig::Named(TypeHandle::Reference(reference)) = element.as_ref() else {
            panic!("expected reference, got {element:?}");
        };
        assert_eq!(reference.module, target.id());
        assert_eq!(reference.full_name(), "N.T");
        assert_eq!(reference.scope.name(), "Lib");
        assert!(is_owned_by(target.id(), &imported));

        // a second import reuses the assembly reference
        target.import_type(&sig, None).unwrap();
        assert_eq!(target.assembly_references().unwrap().count(), 1);
    }

    #[test]
    fn netmodule_scope_is_not_supported() {
        let source = Module::create(
            "Part.netmodule",
            ModuleParameters::new().with_kind(crate::metadata::image::ModuleKind::NetModule),
        )
        .unwrap();
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let def = Arc::new(TypeDefinition::new("N", "T", 0));
        source.add_type(def.clone()).unwrap();

        assert!(matches!(
            target.import_type(&TypeSig::Named(def.into()), None),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn unbound_parameter_is_kept() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let param = GenericParam::unbound(GenericParamKind::Method, 2);
        let context = ImportGenericContext::default();
        assert_eq!(import_generic_param(target.id(), &param, &context).unwrap(), param);
    }

    #[test]
    fn assembly_name_keeps_only_the_token() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let mut name = AssemblyNameReference::parse(
            "Lib, Version=1.2.3.4, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();
        name.public_key = vec![1, 2, 3];
        name.flags |= AssemblyFlags::PUBLIC_KEY;

        let imported = import_assembly_name(&target, &name).unwrap();
        assert!(imported.public_key.is_empty());
        assert!(!imported.flags.contains(AssemblyFlags::PUBLIC_KEY));
        assert_eq!(imported.full_name(), name.full_name());
        assert_eq!(imported.token, Token::new(TableId::AssemblyRef, 1));
    }
}
