use std::sync::Arc;

use tracing::debug;

use super::{
    context::{GenericProvider, GenericScope, ImportGenericContext},
    descriptor::{FieldDescriptor, MethodDescriptor, NamedTypeDescriptor, TypeDescriptor},
    metadata::import_assembly_name,
};
use crate::{
    metadata::{
        identity::AssemblyNameReference,
        module::Module,
        tables::TableId,
        token::Token,
        typesystem::{
            normalized_method_name, ArrayShape, FieldHandle, FieldReference,
            GenericInstanceMethod, GenericOwner, GenericParam, GenericParamKind, MethodHandle,
            MethodReference, MethodSig, ResolutionScope, TypeHandle, TypeReference,
            TypeReferenceRc, TypeSig,
        },
    },
    Error, Result,
};

/// Turns host-described types and members into references owned by a target module
pub trait ReflectionImporter: Send + Sync {
    /// Import a type descriptor
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for unparsable assembly names or generic
    /// parameters the context cannot map
    fn import_type(
        &self,
        target: &Module,
        descriptor: &TypeDescriptor,
        context: &mut ImportGenericContext,
    ) -> Result<TypeSig>;

    /// Import a field descriptor
    ///
    /// # Errors
    /// See [`ReflectionImporter::import_type`]
    fn import_field(
        &self,
        target: &Module,
        descriptor: &FieldDescriptor,
        context: &mut ImportGenericContext,
    ) -> Result<FieldHandle>;

    /// Import a method descriptor
    ///
    /// # Errors
    /// See [`ReflectionImporter::import_type`]
    fn import_method(
        &self,
        target: &Module,
        descriptor: &MethodDescriptor,
        context: &mut ImportGenericContext,
    ) -> Result<MethodHandle>;
}

/// The default [`ReflectionImporter`].
///
/// Types of the target's own assembly are scoped to the target module; other assemblies
/// become assembly references of the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultReflectionImporter;

impl DefaultReflectionImporter {
    fn import_named(&self, target: &Module, named: &NamedTypeDescriptor) -> Result<TypeReferenceRc> {
        let declaring = match &named.declaring_type {
            Some(declaring) => Some(self.import_named(target, declaring)?),
            None => None,
        };
        let (scope, namespace) = match &declaring {
            Some(declaring) => (declaring.scope.clone(), ""),
            None => (self.import_scope(target, &named.assembly)?, named.namespace.as_str()),
        };

        let mut reference = TypeReference::new(target.id(), scope, namespace, named.name.as_str())
            .with_value_type(named.is_value_type);
        if !named.generic_parameters.is_empty() {
            reference = reference.with_generic_parameters(named.generic_parameters.clone());
        }
        if let Some(declaring) = declaring {
            reference = reference.with_declaring_type(declaring);
        }

        debug!(
            module = %target.name(),
            type_name = %reference.full_name(),
            "imported host type"
        );
        Ok(Arc::new(reference))
    }

    fn import_scope(&self, target: &Module, assembly: &str) -> Result<ResolutionScope> {
        let name = AssemblyNameReference::parse(assembly).map_err(|error| {
            Error::InvalidArgument(format!("invalid assembly name '{assembly}': {error}"))
        })?;

        if target.assembly().map_or(false, |own| own.name == name.name) {
            return Ok(ResolutionScope::Module(target.scope().clone()));
        }
        Ok(ResolutionScope::AssemblyRef(import_assembly_name(target, &name)?))
    }

    fn import_list(
        &self,
        target: &Module,
        descriptors: &[TypeDescriptor],
        context: &mut ImportGenericContext,
    ) -> Result<Vec<TypeSig>> {
        descriptors
            .iter()
            .map(|descriptor| self.import_type(target, descriptor, context))
            .collect()
    }

    fn import_method_reference(
        &self,
        target: &Module,
        descriptor: &MethodDescriptor,
        context: &mut ImportGenericContext,
    ) -> Result<MethodHandle> {
        let declaring = self.import_type(target, &descriptor.declaring_type, context)?;

        let names = descriptor.generic_parameters.clone();
        let generic_arity = u32::try_from(names.len()).map_err(|_| {
            Error::InvalidArgument(format!("too many generic parameters on {}", descriptor.name))
        })?;
        let normalized = normalized_method_name(&declaring, &descriptor.name);
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
            Ok(MethodSig {
                has_this: descriptor.has_this,
                explicit_this: false,
                vararg: false,
                generic_arity,
                return_type: self.import_type(target, &descriptor.return_type, context)?,
                params: self.import_list(target, &descriptor.params, context)?,
                sentinel_params: Vec::new(),
            })
        })?;

        Ok(MethodHandle::Reference(Arc::new(MethodReference {
            module: target.id(),
            token: Token::nil(TableId::MemberRef),
            name: descriptor.name.clone(),
            declaring_type: declaring,
            signature,
            generic_parameters: names,
        })))
    }
}

impl ReflectionImporter for DefaultReflectionImporter {
    fn import_type(
        &self,
        target: &Module,
        descriptor: &TypeDescriptor,
        context: &mut ImportGenericContext,
    ) -> Result<TypeSig> {
        Ok(match descriptor {
            TypeDescriptor::Primitive(kind) => TypeSig::Primitive(*kind),
            TypeDescriptor::Named(named) => {
                TypeSig::Named(TypeHandle::Reference(self.import_named(target, named)?))
            }
            TypeDescriptor::GenericInstance(named, arguments) => TypeSig::GenericInstance(
                TypeHandle::Reference(self.import_named(target, named)?),
                self.import_list(target, arguments, context)?,
            ),
            TypeDescriptor::GenericParameter {
                kind,
                position,
                owner,
            } => TypeSig::GenericParam(match kind {
                GenericParamKind::Type => context.type_parameter(owner, *position)?,
                GenericParamKind::Method => context.method_parameter(owner, *position)?,
            }),
            TypeDescriptor::SzArray(element) => {
                TypeSig::SzArray(Box::new(self.import_type(target, element, context)?))
            }
            TypeDescriptor::Array(element, rank) => TypeSig::Array(
                Box::new(self.import_type(target, element, context)?),
                ArrayShape {
                    rank: *rank,
                    sizes: Vec::new(),
                    lower_bounds: Vec::new(),
                },
            ),
            TypeDescriptor::Pointer(element) => {
                TypeSig::Pointer(Box::new(self.import_type(target, element, context)?))
            }
            TypeDescriptor::ByRef(element) => {
                TypeSig::ByRef(Box::new(self.import_type(target, element, context)?))
            }
        })
    }

    fn import_field(
        &self,
        target: &Module,
        descriptor: &FieldDescriptor,
        context: &mut ImportGenericContext,
    ) -> Result<FieldHandle> {
        let declaring = self.import_type(target, &descriptor.declaring_type, context)?;
        let scope = declaring
            .element_handle()
            .map(GenericScope::for_type)
            .unwrap_or_default();
        let field_type = context.with_scope(scope, |context| {
            self.import_type(target, &descriptor.field_type, context)
        })?;

        Ok(FieldHandle::Reference(Arc::new(FieldReference {
            module: target.id(),
            token: Token::nil(TableId::MemberRef),
            name: descriptor.name.clone(),
            declaring_type: declaring,
            field_type,
        })))
    }

    fn import_method(
        &self,
        target: &Module,
        descriptor: &MethodDescriptor,
        context: &mut ImportGenericContext,
    ) -> Result<MethodHandle> {
        let element = self.import_method_reference(target, descriptor, context)?;
        if descriptor.generic_arguments.is_empty() {
            return Ok(element);
        }

        let scope = GenericScope::for_provider(&GenericProvider::Method(element.clone()));
        let arguments = context.with_scope(scope, |context| {
            self.import_list(target, &descriptor.generic_arguments, context)
        })?;

        Ok(MethodHandle::Instance(Arc::new(GenericInstanceMethod {
            module: target.id(),
            token: Token::nil(TableId::MethodSpec),
            element,
            arguments,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{module::ModuleParameters, typesystem::PrimitiveKind};

    const LIB: &str = "Lib, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null";

    #[test]
    fn own_assembly_maps_to_module_scope() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let named = NamedTypeDescriptor::new("App, Version=0.0.0.0", "App", "Program");

        let sig = target.import_type_descriptor(&named.into(), None).unwrap();
        let TypeSig::Named(TypeHandle::Reference(reference)) = sig else {
            panic!("expected reference");
        };
        assert!(matches!(reference.scope, ResolutionScope::Module(_)));
        assert_eq!(target.assembly_references().unwrap().count(), 0);
    }

    #[test]
    fn nested_type_shares_the_outer_scope() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let outer = NamedTypeDescriptor::new(LIB, "N", "Outer");
        let inner = NamedTypeDescriptor::nested(outer, "Inner").value_type();

        let sig = target.import_type_descriptor(&inner.into(), None).unwrap();
        let TypeSig::Named(TypeHandle::Reference(reference)) = &sig else {
            panic!("expected reference");
        };
        assert_eq!(reference.full_name(), "N.Outer/Inner");
        assert!(reference.namespace.is_empty());
        assert!(sig.is_value_type());
        assert_eq!(reference.scope.name(), "Lib");
    }

    #[test]
    fn generic_method_instance_imports_arguments() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let declaring = NamedTypeDescriptor::new(LIB, "N", "Util");
        let method = MethodDescriptor::new(
            declaring,
            "Id",
            TypeDescriptor::GenericParameter {
                kind: GenericParamKind::Method,
                position: 0,
                owner: "N.Util.Id".into(),
            },
            vec![TypeDescriptor::GenericParameter {
                kind: GenericParamKind::Method,
                position: 0,
                owner: "N.Util.Id".into(),
            }],
        )
        .with_generic_parameters(["T"])
        .with_generic_arguments(vec![PrimitiveKind::Int32.into()]);

        let imported = target.import_method_descriptor(&method, None).unwrap();
        let MethodHandle::Instance(instance) = &imported else {
            panic!("expected instance");
        };
        assert_eq!(instance.arguments, vec![TypeSig::Primitive(PrimitiveKind::Int32)]);

        let TypeSig::GenericParam(param) = &instance.element.signature().return_type else {
            panic!("expected generic parameter");
        };
        assert_eq!(param.name, "T");
        assert_eq!(param.owner.as_ref().unwrap().module, Some(target.id()));
    }

    #[test]
    fn unknown_owner_is_rejected() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let descriptor = TypeDescriptor::GenericParameter {
            kind: GenericParamKind::Type,
            position: 0,
            owner: "N.List`1".into(),
        };
        assert!(matches!(
            target.import_type_descriptor(&descriptor, None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn bad_assembly_name_is_invalid_argument() {
        let target = Module::create("App.exe", ModuleParameters::new()).unwrap();
        let named = NamedTypeDescriptor::new("Lib, Version=x", "N", "T");
        assert!(matches!(
            target.import_type_descriptor(&named.into(), None),
            Err(Error::InvalidArgument(_))
        ));
    }
}
