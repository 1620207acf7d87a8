//! Resolution of references read from one image to definitions in another.
//!
//! `App.exe` references types and members of `Lib.dll`; every module borrows one
//! [`AssemblyCache`] as its assembly resolver. A reference that cannot be located is a
//! miss, not an error.

mod common;

use std::sync::Arc;

use common::{app_builder, fixture, lib_builder, token};
use dotlink::{
    metadata::{
        module::{Entity, MemberReference},
        typesystem::{FieldReference, ResolutionScope},
    },
    prelude::*,
};

fn type_ref(module: &Module, row: u32) -> TypeSig {
    match module.lookup_token(token(TableId::TypeRef, row)).unwrap() {
        Some(Entity::TypeReference(reference)) => TypeSig::Named(reference.into()),
        other => panic!("TypeRef {row} realized as {other:?}"),
    }
}

fn member_ref(module: &Module, row: u32) -> MemberReference {
    match module.lookup_token(token(TableId::MemberRef, row)).unwrap() {
        Some(Entity::MemberReference(member)) => member,
        other => panic!("MemberRef {row} realized as {other:?}"),
    }
}

fn field(member: MemberReference) -> FieldHandle {
    match member {
        MemberReference::Field(field) => FieldHandle::Reference(field),
        MemberReference::Method(method) => panic!("{} is a method", method.name),
    }
}

fn method(member: MemberReference) -> MethodHandle {
    match member {
        MemberReference::Method(method) => MethodHandle::Reference(method),
        MemberReference::Field(field) => panic!("{} is a field", field.name),
    }
}

#[test]
fn type_reference_resolves_across_assemblies() {
    let fx = fixture();

    let resolved = fx.app.resolve_type(&type_ref(&fx.app, 1)).unwrap().unwrap();
    let defined = fx.lib.get_type("N.T").unwrap().unwrap();
    assert!(Arc::ptr_eq(&resolved, &defined));
    assert_eq!(resolved.module_id(), Some(fx.lib.id()));
}

#[test]
fn nested_reference_resolves_through_its_declaring_chain() {
    let fx = fixture();

    let resolved = fx.app.resolve_type(&type_ref(&fx.app, 4)).unwrap().unwrap();
    assert_eq!(resolved.full_name(), "N.Outer/Inner/Deepest");
    assert!(Arc::ptr_eq(
        &resolved,
        &fx.lib.get_type("N.Outer/Inner/Deepest").unwrap().unwrap()
    ));
}

#[test]
fn missing_type_is_a_miss() {
    let fx = fixture();
    assert!(fx.app.resolve_type(&type_ref(&fx.app, 5)).unwrap().is_none());
}

#[test]
fn unlocatable_assembly_is_a_miss() {
    let fx = fixture();

    // System.Object lives in mscorlib, which the cache does not know
    assert!(fx.app.resolve_type(&type_ref(&fx.app, 7)).unwrap().is_none());
    assert!(fx.cache.remove("Lib").is_some());
    assert!(fx.app.resolve_type(&type_ref(&fx.app, 1)).unwrap().is_none());
}

#[test]
fn reference_resolves_once_its_assembly_becomes_locatable() {
    let cache = Arc::new(AssemblyCache::new());
    let app = Module::read(
        app_builder().build(),
        ReaderParameters::new().with_assembly_resolver(cache.clone()),
    )
    .unwrap();
    let t = type_ref(&app, 1);

    assert!(app.resolve_type(&t).unwrap().is_none());

    let lib = Module::read(lib_builder().build(), ReaderParameters::new()).unwrap();
    cache.register(lib.clone());
    let defined = lib.get_type("N.T").unwrap().unwrap();

    let first = app.resolve_type(&t).unwrap().unwrap();
    let second = app.resolve_type(&t).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &defined));
    assert!(Arc::ptr_eq(&second, &defined));
}

#[test]
fn forwarded_type_follows_the_exported_type() {
    let fx = fixture();

    let resolved = fx.app.resolve_type(&type_ref(&fx.app, 6)).unwrap().unwrap();
    assert_eq!(resolved.full_name(), "Moved.Thing");
    assert_eq!(resolved.module_id(), Some(fx.far.id()));
}

#[test]
fn wrappers_and_instances_resolve_to_the_element() {
    let fx = fixture();
    let t = type_ref(&fx.app, 1);

    let array = TypeSig::SzArray(Box::new(TypeSig::ByRef(Box::new(t.clone()))));
    let resolved = fx.app.resolve_type(&array).unwrap().unwrap();
    assert_eq!(resolved.full_name(), "N.T");

    let Some(Entity::TypeSpecification(list_of_int)) =
        fx.app.lookup_token(token(TableId::TypeSpec, 1)).unwrap()
    else {
        panic!("expected a type specification");
    };
    let resolved = fx.app.resolve_type(&list_of_int).unwrap().unwrap();
    assert_eq!(resolved.full_name(), "N.List`1");
    assert_eq!(resolved.generic_parameters, vec!["T".to_string()]);
}

#[test]
fn field_resolves_on_a_base_type() {
    let fx = fixture();

    let count = field(member_ref(&fx.app, 1));
    let resolved = fx.app.resolve_field(&count).unwrap().unwrap();
    assert_eq!(resolved.name, "count");
    assert_eq!(resolved.declaring_type().unwrap().full_name(), "N.Base");
}

#[test]
fn field_on_generic_instance_matches_the_open_definition() {
    let fx = fixture();

    let items = field(member_ref(&fx.app, 6));
    let resolved = fx.app.resolve_field(&items).unwrap().unwrap();
    assert_eq!(resolved.declaring_type().unwrap().full_name(), "N.List`1");
}

#[test]
fn method_resolves_by_shape() {
    let fx = fixture();

    let get = method(member_ref(&fx.app, 2));
    let resolved = fx.app.resolve_method(&get).unwrap().unwrap();
    assert_eq!(resolved.name, "Get");
    assert_eq!(resolved.parameters[0].name, "x");

    // Get(string) shares the name but not the parameter list; the walk ends at
    // System.Object, whose assembly is not available
    let wrong_shape = method(member_ref(&fx.app, 3));
    assert!(fx.app.resolve_method(&wrong_shape).unwrap().is_none());
}

#[test]
fn generic_instance_method_resolves_to_the_generic_definition() {
    let fx = fixture();

    let Some(Entity::MethodSpecification(instance)) =
        fx.app.lookup_token(token(TableId::MethodSpec, 1)).unwrap()
    else {
        panic!("expected a method specification");
    };
    let resolved = fx
        .app
        .resolve_method(&MethodHandle::Instance(instance))
        .unwrap()
        .unwrap();
    assert_eq!(resolved.name, "Id");
    assert_eq!(resolved.generic_parameters, vec!["M".to_string()]);

    let add = method(member_ref(&fx.app, 5));
    let resolved = fx.app.resolve_method(&add).unwrap().unwrap();
    assert_eq!(resolved.declaring_type().unwrap().full_name(), "N.List`1");
}

#[test]
fn definitions_resolve_to_themselves() {
    let fx = fixture();
    let point = fx.lib.get_type("N.Point").unwrap().unwrap();

    let resolved = fx
        .app
        .resolve_type(&TypeSig::Named(point.clone().into()))
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&resolved, &point));
    assert!(point.is_value_type());
}

#[test]
fn foreign_reference_without_resolver_is_not_supported() {
    let fx = fixture();
    let lonely = Module::create("Lonely.dll", ModuleParameters::new()).unwrap();

    let reference = TypeReference::new(
        lonely.id(),
        ResolutionScope::AssemblyRef(fx.lib.assembly().unwrap().clone()),
        "N",
        "T",
    );
    assert!(matches!(
        lonely.resolve_type(&TypeSig::Named(Arc::new(reference).into())),
        Err(Error::NotSupported(_))
    ));

    let count = FieldReference {
        module: lonely.id(),
        token: Token::nil(TableId::MemberRef),
        name: "count".to_string(),
        declaring_type: type_ref(&fx.app, 1),
        field_type: TypeSig::Primitive(PrimitiveKind::Int32),
    };
    assert!(matches!(
        lonely.resolve_field(&FieldHandle::Reference(Arc::new(count))),
        Err(Error::NotSupported(_))
    ));
}

#[test]
fn dropped_borrowed_resolver_is_not_supported() {
    let fx = fixture();
    let common::Fixture {
        cache,
        resolver,
        app,
        ..
    } = fx;
    drop(cache);
    drop(resolver);

    assert!(app.assembly_resolver().is_none());
    assert!(matches!(
        app.resolve_type(&type_ref(&app, 1)),
        Err(Error::NotSupported(_))
    ));
}

#[test]
fn unreadable_foreign_module_is_a_miss() {
    let fx = fixture();

    fx.lib_probe.fail(TableId::TypeDef);
    assert!(fx.app.resolve_type(&type_ref(&fx.app, 1)).unwrap().is_none());

    fx.lib_probe.heal(TableId::TypeDef);
    assert!(fx.app.resolve_type(&type_ref(&fx.app, 1)).unwrap().is_some());
}

#[test]
fn unreadable_home_module_is_an_error() {
    let fx = fixture();
    let reference = type_ref(&fx.lib, 1);

    fx.lib_probe.fail(TableId::TypeDef);
    let own = TypeReference::new(
        fx.lib.id(),
        ResolutionScope::Module(fx.lib.scope().clone()),
        "N",
        "T",
    );
    assert!(fx
        .lib
        .resolve_type(&TypeSig::Named(Arc::new(own).into()))
        .is_err());
    fx.lib_probe.heal(TableId::TypeDef);

    // System.Object is out of reach from Lib as well
    assert!(fx.lib.resolve_type(&reference).unwrap().is_none());
}

#[test]
fn primitives_resolve_through_the_core_library() {
    let fx = fixture();

    // mscorlib is not in the cache: the primitive is a miss, and looking it up does not
    // add a second mscorlib reference to App
    assert!(fx
        .app
        .resolve_type(&TypeSig::Primitive(PrimitiveKind::Int32))
        .unwrap()
        .is_none());
    assert_eq!(fx.app.assembly_references().unwrap().count(), 2);

    let corlib = Module::create("mscorlib.dll", ModuleParameters::new()).unwrap();
    corlib
        .add_type(Arc::new(TypeDefinition::new("System", "Int32", 0x0101)))
        .unwrap();
    fx.cache.register(corlib);

    let int32 = fx
        .app
        .resolve_type(&TypeSig::Primitive(PrimitiveKind::Int32))
        .unwrap()
        .unwrap();
    assert_eq!(int32.full_name(), "System.Int32");
}

#[test]
fn resolving_a_primitive_adds_no_assembly_reference() {
    let cache = Arc::new(AssemblyCache::new());
    let app = Module::create(
        "App.exe",
        ModuleParameters::new().with_assembly_resolver(cache.clone()),
    )
    .unwrap();
    let int32 = TypeSig::Primitive(PrimitiveKind::Int32);

    assert!(app.resolve_type(&int32).unwrap().is_none());
    assert_eq!(app.assembly_references().unwrap().count(), 0);

    let corlib = Module::create("mscorlib.dll", ModuleParameters::new()).unwrap();
    corlib
        .add_type(Arc::new(TypeDefinition::new("System", "Int32", 0x0101)))
        .unwrap();
    cache.register(corlib);

    let resolved = app.resolve_type(&int32).unwrap().unwrap();
    assert_eq!(resolved.full_name(), "System.Int32");
    assert_eq!(app.assembly_references().unwrap().count(), 0);
}
