use uguid::Guid;

use crate::metadata::{
    image::{ImageHeader, MemoryImage, MemoryImageBuilder, ModuleKind},
    signatures::{SignatureMember, SignatureMethod, SignatureType},
    tables::{
        AssemblyRefRow, AssemblyRow, FieldRow, GenericParamRow, MemberRefRow, MethodDefRow,
        ModuleRow, NestedClassRow, ParamRow, RawRow, TableId, TypeDefRow, TypeRefRow,
    },
    token::Token,
};

/// `TypeAttributes.Public`
pub const PUBLIC: u32 = 0x0001;
/// `TypeAttributes.NestedPublic`
pub const NESTED_PUBLIC: u32 = 0x0002;
/// `MethodAttributes.Public | HideBySig`
pub const PUBLIC_METHOD: u16 = 0x0086;

// Helper function to create a Module row
pub fn create_module(name: &str) -> RawRow {
    RawRow::Module(ModuleRow {
        generation: 0,
        name: name.to_string(),
        mvid: Guid::ZERO,
    })
}

// Helper function to create an Assembly row
pub fn create_assembly(name: &str) -> RawRow {
    RawRow::Assembly(AssemblyRow {
        hash_alg_id: 0x8004,
        version: (1, 0, 0, 0),
        flags: 0,
        public_key: Vec::new(),
        name: name.to_string(),
        culture: String::new(),
    })
}

// Helper function to create an AssemblyRef row
pub fn create_assembly_ref(name: &str, version: (u16, u16, u16, u16)) -> RawRow {
    RawRow::AssemblyRef(AssemblyRefRow {
        version,
        flags: 0,
        public_key_or_token: Vec::new(),
        name: name.to_string(),
        culture: String::new(),
        hash_value: Vec::new(),
    })
}

// Helper function to create a TypeRef row
pub fn create_type_ref(scope: Token, namespace: &str, name: &str) -> RawRow {
    RawRow::TypeRef(TypeRefRow {
        resolution_scope: scope,
        name: name.to_string(),
        namespace: namespace.to_string(),
    })
}

// Helper function to create a TypeDef row
pub fn create_type_def(
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

// Helper function to create a Field row
pub fn create_field(name: &str, signature: SignatureType) -> RawRow {
    RawRow::Field(FieldRow {
        flags: 0x0006,
        name: name.to_string(),
        signature,
    })
}

// Helper function to create a MethodDef row
pub fn create_method(name: &str, signature: SignatureMethod, param_list: u32) -> RawRow {
    RawRow::MethodDef(MethodDefRow {
        rva: 0x2050,
        impl_flags: 0,
        flags: PUBLIC_METHOD,
        name: name.to_string(),
        signature,
        param_list,
    })
}

// Helper function to create a Param row
pub fn create_param(sequence: u16, name: &str) -> RawRow {
    RawRow::Param(ParamRow {
        flags: 0,
        sequence,
        name: name.to_string(),
    })
}

// Helper function to create a MemberRef row
pub fn create_member_ref(class: Token, name: &str, signature: SignatureMember) -> RawRow {
    RawRow::MemberRef(MemberRefRow {
        class,
        name: name.to_string(),
        signature,
    })
}

// Helper function to create a NestedClass row
pub fn create_nested_class(nested: u32, enclosing: u32) -> RawRow {
    RawRow::NestedClass(NestedClassRow {
        nested_class: nested,
        enclosing_class: enclosing,
    })
}

// Helper function to create a GenericParam row
pub fn create_generic_param(number: u16, owner: Token, name: &str) -> RawRow {
    RawRow::GenericParam(GenericParamRow {
        number,
        flags: 0,
        owner,
        name: name.to_string(),
    })
}

/// An instance method signature
pub fn instance_sig(return_type: SignatureType, params: Vec<SignatureType>) -> SignatureMethod {
    SignatureMethod {
        has_this: true,
        return_type,
        params,
        ..SignatureMethod::default()
    }
}

/// `Lib.dll` as a C# compiler would emit it:
///
/// ```csharp
/// namespace N {
///     public class Base { public int count; public void Run() {} }
///     public class T : Base { public string value; public int Get(int x) => x; }
///     public class Outer { public class Inner { public class Deepest {} } }
///     public class List<E> { public E[] items; }
/// }
/// ```
pub fn lib_image() -> MemoryImageBuilder {
    let object = Token::new(TableId::TypeRef, 1);
    let nil = Token::nil(TableId::TypeDef);

    MemoryImage::builder()
        .header(ImageHeader {
            file_name: "Lib.dll".to_string(),
            kind: ModuleKind::Dll,
            ..ImageHeader::default()
        })
        .row(create_module("Lib.dll"))
        .row(create_assembly("Lib"))
        .row(create_assembly_ref("mscorlib", (4, 0, 0, 0)))
        .row(create_type_ref(
            Token::new(TableId::AssemblyRef, 1),
            "System",
            "Object",
        ))
        // 1: <Module>, 2: N.Base, 3: N.T, 4: N.Outer, 5: Inner, 6: Deepest, 7: N.List`1
        .row(create_type_def(0, "", "<Module>", nil, 1, 1))
        .row(create_type_def(PUBLIC, "N", "Base", object, 1, 1))
        .row(create_type_def(PUBLIC, "N", "T", Token::new(TableId::TypeDef, 2), 2, 2))
        .row(create_type_def(PUBLIC, "N", "Outer", object, 3, 3))
        .row(create_type_def(NESTED_PUBLIC, "", "Inner", object, 3, 3))
        .row(create_type_def(NESTED_PUBLIC, "", "Deepest", object, 3, 3))
        .row(create_type_def(PUBLIC, "N", "List`1", object, 3, 3))
        .row(create_field("count", SignatureType::I4))
        .row(create_field("value", SignatureType::String))
        .row(create_field("items", SignatureType::SzArray(Box::new(SignatureType::Var(0)))))
        .row(create_method("Run", instance_sig(SignatureType::Void, Vec::new()), 1))
        .row(create_method(
            "Get",
            instance_sig(SignatureType::I4, vec![SignatureType::I4]),
            1,
        ))
        .row(create_param(1, "x"))
        .row(create_nested_class(5, 4))
        .row(create_nested_class(6, 5))
        .row(create_generic_param(0, Token::new(TableId::TypeDef, 7), "E"))
}
