//! Shared fixtures for the integration tests.
//!
//! Two images and one created module, wired together through an [`AssemblyCache`]:
//!
//! ```csharp
//! // Lib.dll
//! [module: CLSCompliant(true)]
//! namespace N {
//!     public class Base { public int count; public void Run() {} }
//!     public class T : Base {
//!         public string value;
//!         public int Get(int x) => x;
//!         public M Id<M>(M m) => m;
//!     }
//!     public class Outer { public class Inner { public class Deepest {} } }
//!     public class List<T> { public T[] items; public void Add(T item) {} }
//!     public struct Point { public int x; }
//! }
//! [assembly: TypeForwardedTo(typeof(Moved.Thing))] // to Far
//!
//! // App.exe
//! class Program {
//!     static void Main() {
//!         var t = new N.T();
//!         _ = t.count; t.Get(1); t.Id<string>("");
//!         var list = new N.List<int>(); list.Add(1); _ = list.items;
//!         _ = typeof(N.Outer.Inner.Deepest); _ = typeof(Moved.Thing);
//!     }
//! }
//! ```
//!
//! App additionally references `N.Missing` and `N.T::Get(string)`, neither of which exists.

#![allow(dead_code)]

use std::sync::Arc;

use dotlink::{
    metadata::{
        image::{ImageHeader, ImageProbe, MemoryImage, MemoryImageBuilder, ModuleKind},
        signatures::{SignatureMember, SignatureMethod, SignatureType},
        tables::{
            AssemblyRefRow, AssemblyRow, CustomAttributeRow, ExportedTypeRow, FieldRow,
            GenericParamRow, ManifestResourceRow, MemberRefRow, MethodDefRow, MethodSpecRow,
            ModuleRow, NestedClassRow, ParamRow, RawRow, TableId, TypeDefRow, TypeRefRow,
            TypeSpecRow,
        },
        typesystem::TypeDefinition,
    },
    AssemblyCache, AssemblyResolver, Module, ModuleParameters, ReaderParameters, Token,
};
use uguid::Guid;

pub const PUBLIC: u32 = 0x0001;
pub const NESTED_PUBLIC: u32 = 0x0002;
pub const SEALED: u32 = 0x0100;
pub const FORWARDER: u32 = 0x0020_0000;

pub const PUBLIC_METHOD: u16 = 0x0086;
pub const PUBLIC_STATIC_METHOD: u16 = 0x0096;

pub const LIB_FULL_NAME: &str = "Lib, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null";

const MSCORLIB_TOKEN: [u8; 8] = [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];

pub fn token(table: TableId, row: u32) -> Token {
    Token::new(table, row)
}

pub fn module_row(name: &str) -> RawRow {
    RawRow::Module(ModuleRow {
        generation: 0,
        name: name.to_string(),
        mvid: Guid::ZERO,
    })
}

pub fn assembly_row(name: &str) -> RawRow {
    RawRow::Assembly(AssemblyRow {
        hash_alg_id: 0x8004,
        version: (1, 0, 0, 0),
        flags: 0,
        public_key: Vec::new(),
        name: name.to_string(),
        culture: String::new(),
    })
}

pub fn assembly_ref_row(name: &str, version: (u16, u16, u16, u16), token: &[u8]) -> RawRow {
    RawRow::AssemblyRef(AssemblyRefRow {
        version,
        flags: 0,
        public_key_or_token: token.to_vec(),
        name: name.to_string(),
        culture: String::new(),
        hash_value: Vec::new(),
    })
}

pub fn type_ref_row(scope: Token, namespace: &str, name: &str) -> RawRow {
    RawRow::TypeRef(TypeRefRow {
        resolution_scope: scope,
        name: name.to_string(),
        namespace: namespace.to_string(),
    })
}

pub fn type_def_row(
    flags: u32,
    namespace: &str,
    name: &str,
    extends: Token,
    field_list: u32,
    method_list: u32,
) -> RawRow {
    RawRow::TypeDef(TypeDefRow {
        flags,
        name: name.to_string(),
        namespace: namespace.to_string(),
        extends,
        field_list,
        method_list,
    })
}

pub fn field_row(name: &str, signature: SignatureType) -> RawRow {
    RawRow::Field(FieldRow {
        flags: 0x0006,
        name: name.to_string(),
        signature,
    })
}

pub fn method_row(name: &str, flags: u16, signature: SignatureMethod, param_list: u32) -> RawRow {
    RawRow::MethodDef(MethodDefRow {
        rva: 0x2050,
        impl_flags: 0,
        flags,
        name: name.to_string(),
        signature,
        param_list,
    })
}

pub fn param_row(sequence: u16, name: &str) -> RawRow {
    RawRow::Param(ParamRow {
        flags: 0,
        sequence,
        name: name.to_string(),
    })
}

pub fn member_ref_row(class: Token, name: &str, signature: SignatureMember) -> RawRow {
    RawRow::MemberRef(MemberRefRow {
        class,
        name: name.to_string(),
        signature,
    })
}

pub fn instance(return_type: SignatureType, params: Vec<SignatureType>) -> SignatureMethod {
    SignatureMethod {
        has_this: true,
        return_type,
        params,
        ..SignatureMethod::default()
    }
}

/// `M Id<M>(M)`
pub fn generic_identity() -> SignatureMethod {
    SignatureMethod {
        has_this: true,
        generic_param_count: 1,
        return_type: SignatureType::MVar(0),
        params: vec![SignatureType::MVar(0)],
        ..SignatureMethod::default()
    }
}

pub fn lib_builder() -> MemoryImageBuilder {
    let mscorlib = token(TableId::AssemblyRef, 1);
    let object = token(TableId::TypeRef, 1);
    let nil = Token::nil(TableId::TypeDef);

    MemoryImage::builder()
        .header(ImageHeader {
            file_name: "Lib.dll".to_string(),
            ..ImageHeader::default()
        })
        .row(module_row("Lib.dll"))
        .row(assembly_row("Lib"))
        .row(assembly_ref_row("mscorlib", (4, 0, 0, 0), &MSCORLIB_TOKEN))
        .row(assembly_ref_row("Far", (1, 0, 0, 0), &[]))
        .row(type_ref_row(mscorlib, "System", "Object"))
        .row(type_ref_row(mscorlib, "System", "ValueType"))
        .row(type_ref_row(mscorlib, "System", "CLSCompliantAttribute"))
        .row(type_def_row(0, "", "<Module>", nil, 1, 1))
        .row(type_def_row(PUBLIC, "N", "Base", object, 1, 1))
        .row(type_def_row(PUBLIC, "N", "T", token(TableId::TypeDef, 2), 2, 2))
        .row(type_def_row(PUBLIC, "N", "Outer", object, 3, 4))
        .row(type_def_row(NESTED_PUBLIC, "", "Inner", object, 3, 4))
        .row(type_def_row(NESTED_PUBLIC, "", "Deepest", object, 3, 4))
        .row(type_def_row(PUBLIC, "N", "List`1", object, 3, 4))
        .row(type_def_row(
            PUBLIC | SEALED,
            "N",
            "Point",
            token(TableId::TypeRef, 2),
            4,
            5,
        ))
        .row(field_row("count", SignatureType::I4))
        .row(field_row("value", SignatureType::String))
        .row(field_row(
            "items",
            SignatureType::SzArray(Box::new(SignatureType::Var(0))),
        ))
        .row(field_row("x", SignatureType::I4))
        .row(method_row(
            "Run",
            PUBLIC_METHOD,
            instance(SignatureType::Void, Vec::new()),
            1,
        ))
        .row(method_row(
            "Get",
            PUBLIC_METHOD,
            instance(SignatureType::I4, vec![SignatureType::I4]),
            1,
        ))
        .row(method_row("Id", PUBLIC_METHOD, generic_identity(), 2))
        .row(method_row(
            "Add",
            PUBLIC_METHOD,
            instance(SignatureType::Void, vec![SignatureType::Var(0)]),
            3,
        ))
        .row(param_row(1, "x"))
        .row(param_row(1, "m"))
        .row(param_row(1, "item"))
        .row(member_ref_row(
            token(TableId::TypeRef, 3),
            ".ctor",
            SignatureMember::Method(instance(SignatureType::Void, vec![SignatureType::Boolean])),
        ))
        .row(RawRow::CustomAttribute(CustomAttributeRow {
            parent: token(TableId::Module, 1),
            constructor: token(TableId::MemberRef, 1),
            value: vec![0x01, 0x00, 0x01, 0x00, 0x00],
        }))
        .row(RawRow::NestedClass(NestedClassRow {
            nested_class: 5,
            enclosing_class: 4,
        }))
        .row(RawRow::NestedClass(NestedClassRow {
            nested_class: 6,
            enclosing_class: 5,
        }))
        .row(RawRow::GenericParam(GenericParamRow {
            number: 0,
            flags: 0,
            owner: token(TableId::TypeDef, 7),
            name: "T".to_string(),
        }))
        .row(RawRow::GenericParam(GenericParamRow {
            number: 0,
            flags: 0,
            owner: token(TableId::MethodDef, 3),
            name: "M".to_string(),
        }))
        .row(RawRow::ExportedType(ExportedTypeRow {
            flags: FORWARDER,
            type_def_id: 0,
            name: "Thing".to_string(),
            namespace: "Moved".to_string(),
            implementation: token(TableId::AssemblyRef, 2),
        }))
        .row(RawRow::ManifestResource(ManifestResourceRow {
            offset: 0,
            flags: 0x0001,
            name: "Lib.Strings.resources".to_string(),
            implementation: Token::nil(TableId::File),
        }))
}

pub fn app_builder() -> MemoryImageBuilder {
    let lib = token(TableId::AssemblyRef, 1);
    let list = token(TableId::TypeSpec, 1);
    let t = token(TableId::TypeRef, 1);

    MemoryImage::builder()
        .header(ImageHeader {
            file_name: "App.exe".to_string(),
            kind: ModuleKind::Console,
            entry_point: token(TableId::MethodDef, 1),
            ..ImageHeader::default()
        })
        .row(module_row("App.exe"))
        .row(assembly_row("App"))
        .row(assembly_ref_row("Lib", (1, 0, 0, 0), &[]))
        .row(assembly_ref_row("mscorlib", (4, 0, 0, 0), &MSCORLIB_TOKEN))
        .row(type_ref_row(lib, "N", "T"))
        .row(type_ref_row(lib, "N", "Outer"))
        .row(type_ref_row(token(TableId::TypeRef, 2), "", "Inner"))
        .row(type_ref_row(token(TableId::TypeRef, 3), "", "Deepest"))
        .row(type_ref_row(lib, "N", "Missing"))
        .row(type_ref_row(lib, "Moved", "Thing"))
        .row(type_ref_row(token(TableId::AssemblyRef, 2), "System", "Object"))
        .row(type_ref_row(lib, "N", "List`1"))
        .row(type_def_row(0, "", "<Module>", Token::nil(TableId::TypeDef), 1, 1))
        .row(type_def_row(
            PUBLIC,
            "",
            "Program",
            token(TableId::TypeRef, 7),
            1,
            1,
        ))
        .row(method_row(
            "Main",
            PUBLIC_STATIC_METHOD,
            SignatureMethod::default(),
            1,
        ))
        .row(RawRow::TypeSpec(TypeSpecRow {
            signature: SignatureType::GenericInst(
                Box::new(SignatureType::Class(token(TableId::TypeRef, 8))),
                vec![SignatureType::I4],
            ),
        }))
        .row(member_ref_row(t, "count", SignatureMember::Field(SignatureType::I4)))
        .row(member_ref_row(
            t,
            "Get",
            SignatureMember::Method(instance(SignatureType::I4, vec![SignatureType::I4])),
        ))
        .row(member_ref_row(
            t,
            "Get",
            SignatureMember::Method(instance(SignatureType::I4, vec![SignatureType::String])),
        ))
        .row(member_ref_row(t, "Id", SignatureMember::Method(generic_identity())))
        .row(member_ref_row(
            list,
            "Add",
            SignatureMember::Method(instance(SignatureType::Void, vec![SignatureType::Var(0)])),
        ))
        .row(member_ref_row(
            list,
            "items",
            SignatureMember::Field(SignatureType::SzArray(Box::new(SignatureType::Var(0)))),
        ))
        .row(RawRow::MethodSpec(MethodSpecRow {
            method: token(TableId::MemberRef, 4),
            instantiation: vec![SignatureType::String],
        }))
}

/// Lib, App and Far registered in one cache that every module borrows
pub struct Fixture {
    pub cache: Arc<AssemblyCache>,
    pub resolver: Arc<dyn AssemblyResolver>,
    pub lib: Arc<Module>,
    pub app: Arc<Module>,
    pub far: Arc<Module>,
    pub lib_probe: Arc<ImageProbe>,
    pub app_probe: Arc<ImageProbe>,
}

pub fn fixture() -> Fixture {
    let cache = Arc::new(AssemblyCache::new());
    let resolver: Arc<dyn AssemblyResolver> = cache.clone();

    let lib_image = lib_builder().build();
    let lib_probe = lib_image.probe();
    let lib = Module::read(
        lib_image,
        ReaderParameters::new().with_borrowed_assembly_resolver(&resolver),
    )
    .unwrap();

    let app_image = app_builder().build();
    let app_probe = app_image.probe();
    let app = Module::read(
        app_image,
        ReaderParameters::new().with_borrowed_assembly_resolver(&resolver),
    )
    .unwrap();

    let far = Module::create(
        "Far.dll",
        ModuleParameters::new().with_borrowed_assembly_resolver(&resolver),
    )
    .unwrap();
    far.add_type(Arc::new(TypeDefinition::new("Moved", "Thing", PUBLIC)))
        .unwrap();

    cache.register(lib.clone());
    cache.register(app.clone());
    cache.register(far.clone());

    Fixture {
        cache,
        resolver,
        lib,
        app,
        far,
        lib_probe,
        app_probe,
    }
}
