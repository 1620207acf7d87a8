//! Decoded table rows as handed over by the image decoder.
//!
//! Heap indices are already resolved (names are strings, blobs are byte vectors or
//! decoded signatures); every cross-table reference is still a [`Token`]. Rows are
//! plain data and own nothing beyond themselves.

use uguid::Guid;

use crate::metadata::{
    signatures::{SignatureMember, SignatureMethod, SignatureType},
    tables::TableId,
    token::Token,
};

/// The `Module` table row (0x00), §II.22.30
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRow {
    /// Generation, reserved (always 0)
    pub generation: u16,
    /// Module name
    pub name: String,
    /// Module version id
    pub mvid: Guid,
}

/// The `TypeRef` table row (0x01), §II.22.38
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRefRow {
    /// `ResolutionScope` coded index: Module, ModuleRef, AssemblyRef or TypeRef (nested)
    pub resolution_scope: Token,
    /// Type name
    pub name: String,
    /// Type namespace
    pub namespace: String,
}

/// The `TypeDef` table row (0x02), §II.22.37
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefRow {
    /// `TypeAttributes` bitmask
    pub flags: u32,
    /// Type name
    pub name: String,
    /// Type namespace
    pub namespace: String,
    /// `TypeDefOrRef` coded index of the base type (nil for interfaces and `System.Object`)
    pub extends: Token,
    /// First row of this type's run in the `Field` table
    pub field_list: u32,
    /// First row of this type's run in the `MethodDef` table
    pub method_list: u32,
}

/// The `Field` table row (0x04), §II.22.15
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    /// `FieldAttributes` bitmask
    pub flags: u16,
    /// Field name
    pub name: String,
    /// `FieldSig`
    pub signature: SignatureType,
}

/// The `MethodDef` table row (0x06), §II.22.26
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefRow {
    /// Relative virtual address of the body, 0 if there is none
    pub rva: u32,
    /// `MethodImplAttributes` bitmask
    pub impl_flags: u16,
    /// `MethodAttributes` bitmask
    pub flags: u16,
    /// Method name
    pub name: String,
    /// `MethodDefSig`
    pub signature: SignatureMethod,
    /// First row of this method's run in the `Param` table
    pub param_list: u32,
}

/// The `Param` table row (0x08), §II.22.33
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRow {
    /// `ParamAttributes` bitmask
    pub flags: u16,
    /// 0 for the return value, 1.. for parameters
    pub sequence: u16,
    /// Parameter name
    pub name: String,
}

/// The `MemberRef` table row (0x0A), §II.22.25
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRefRow {
    /// `MemberRefParent` coded index: TypeDef, TypeRef, ModuleRef, MethodDef or TypeSpec
    pub class: Token,
    /// Member name
    pub name: String,
    /// Field or method signature
    pub signature: SignatureMember,
}

/// The `CustomAttribute` table row (0x0C), §II.22.10
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeRow {
    /// `HasCustomAttribute` coded index of the attributed entity
    pub parent: Token,
    /// `CustomAttributeType` coded index: MethodDef or MemberRef of the constructor
    pub constructor: Token,
    /// The undecoded value blob
    pub value: Vec<u8>,
}

/// The `ModuleRef` table row (0x1A), §II.22.31
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRefRow {
    /// Module name
    pub name: String,
}

/// The `TypeSpec` table row (0x1B), §II.22.39
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpecRow {
    /// The specified type
    pub signature: SignatureType,
}

/// The `Assembly` table row (0x20), §II.22.2
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyRow {
    /// `AssemblyHashAlgorithm`
    pub hash_alg_id: u32,
    /// Major, minor, build and revision number
    pub version: (u16, u16, u16, u16),
    /// `AssemblyFlags` bitmask
    pub flags: u32,
    /// Full public key, empty if the assembly is not strong-named
    pub public_key: Vec<u8>,
    /// Assembly name
    pub name: String,
    /// Culture, empty for culture-neutral assemblies
    pub culture: String,
}

/// The `AssemblyRef` table row (0x23), §II.22.5
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyRefRow {
    /// Major, minor, build and revision number
    pub version: (u16, u16, u16, u16),
    /// `AssemblyFlags` bitmask
    pub flags: u32,
    /// Full public key (if flag `PublicKey` is set) or public key token
    pub public_key_or_token: Vec<u8>,
    /// Assembly name
    pub name: String,
    /// Culture, empty for culture-neutral assemblies
    pub culture: String,
    /// Hash of the referenced assembly
    pub hash_value: Vec<u8>,
}

/// The `File` table row (0x26), §II.22.19
#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    /// `FileAttributes` bitmask
    pub flags: u32,
    /// File name
    pub name: String,
    /// Hash of the file
    pub hash_value: Vec<u8>,
}

/// The `ExportedType` table row (0x27), §II.22.14
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedTypeRow {
    /// `TypeAttributes` bitmask
    pub flags: u32,
    /// Hint into the `TypeDef` table of the implementing module
    pub type_def_id: u32,
    /// Type name
    pub name: String,
    /// Type namespace
    pub namespace: String,
    /// `Implementation` coded index: File, AssemblyRef or ExportedType (nested)
    pub implementation: Token,
}

/// The `ManifestResource` table row (0x28), §II.22.24
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestResourceRow {
    /// Offset of the resource within the resources directory
    pub offset: u32,
    /// `ManifestResourceAttributes` bitmask
    pub flags: u32,
    /// Resource name
    pub name: String,
    /// `Implementation` coded index, nil for embedded resources
    pub implementation: Token,
}

/// The `NestedClass` table row (0x29), §II.22.32
#[derive(Debug, Clone, PartialEq)]
pub struct NestedClassRow {
    /// `TypeDef` row of the nested type
    pub nested_class: u32,
    /// `TypeDef` row of the enclosing type
    pub enclosing_class: u32,
}

/// The `GenericParam` table row (0x2A), §II.22.20
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParamRow {
    /// 0-based position within the owner's generic parameter list
    pub number: u16,
    /// `GenericParamAttributes` bitmask
    pub flags: u16,
    /// `TypeOrMethodDef` coded index of the owner
    pub owner: Token,
    /// Parameter name
    pub name: String,
}

/// The `MethodSpec` table row (0x2B), §II.22.29
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSpecRow {
    /// `MethodDefOrRef` coded index of the generic method
    pub method: Token,
    /// The instantiation arguments
    pub instantiation: Vec<SignatureType>,
}

/// A decoded row of any table this layer realizes entities from.
///
/// Rows of tables without an entity model here (layouts, marshalling, semantics,
/// debug tables, ...) are never requested from the image.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum RawRow {
    Module(ModuleRow),
    TypeRef(TypeRefRow),
    TypeDef(TypeDefRow),
    Field(FieldRow),
    MethodDef(MethodDefRow),
    Param(ParamRow),
    MemberRef(MemberRefRow),
    CustomAttribute(CustomAttributeRow),
    ModuleRef(ModuleRefRow),
    TypeSpec(TypeSpecRow),
    Assembly(AssemblyRow),
    AssemblyRef(AssemblyRefRow),
    File(FileRow),
    ExportedType(ExportedTypeRow),
    ManifestResource(ManifestResourceRow),
    NestedClass(NestedClassRow),
    GenericParam(GenericParamRow),
    MethodSpec(MethodSpecRow),
}

impl RawRow {
    /// The table this row belongs to
    #[must_use]
    pub fn table(&self) -> TableId {
        match self {
            RawRow::Module(_) => TableId::Module,
            RawRow::TypeRef(_) => TableId::TypeRef,
            RawRow::TypeDef(_) => TableId::TypeDef,
            RawRow::Field(_) => TableId::Field,
            RawRow::MethodDef(_) => TableId::MethodDef,
            RawRow::Param(_) => TableId::Param,
            RawRow::MemberRef(_) => TableId::MemberRef,
            RawRow::CustomAttribute(_) => TableId::CustomAttribute,
            RawRow::ModuleRef(_) => TableId::ModuleRef,
            RawRow::TypeSpec(_) => TableId::TypeSpec,
            RawRow::Assembly(_) => TableId::Assembly,
            RawRow::AssemblyRef(_) => TableId::AssemblyRef,
            RawRow::File(_) => TableId::File,
            RawRow::ExportedType(_) => TableId::ExportedType,
            RawRow::ManifestResource(_) => TableId::ManifestResource,
            RawRow::NestedClass(_) => TableId::NestedClass,
            RawRow::GenericParam(_) => TableId::GenericParam,
            RawRow::MethodSpec(_) => TableId::MethodSpec,
        }
    }
}

macro_rules! row_accessor {
    ($fn_name:ident, $variant:ident, $row:ty) => {
        impl RawRow {
            #[doc = concat!("Unwraps a `", stringify!($variant), "` row, failing with `Malformed` for any other table")]
            pub fn $fn_name(self) -> crate::Result<$row> {
                match self {
                    RawRow::$variant(row) => Ok(row),
                    other => Err(malformed_error!(
                        "Expected a {} row, the image returned a {} row",
                        stringify!($variant),
                        other.table()
                    )),
                }
            }
        }
    };
}

row_accessor!(into_module, Module, ModuleRow);
row_accessor!(into_type_ref, TypeRef, TypeRefRow);
row_accessor!(into_type_def, TypeDef, TypeDefRow);
row_accessor!(into_field, Field, FieldRow);
row_accessor!(into_method_def, MethodDef, MethodDefRow);
row_accessor!(into_param, Param, ParamRow);
row_accessor!(into_member_ref, MemberRef, MemberRefRow);
row_accessor!(into_custom_attribute, CustomAttribute, CustomAttributeRow);
row_accessor!(into_module_ref, ModuleRef, ModuleRefRow);
row_accessor!(into_type_spec, TypeSpec, TypeSpecRow);
row_accessor!(into_assembly, Assembly, AssemblyRow);
row_accessor!(into_assembly_ref, AssemblyRef, AssemblyRefRow);
row_accessor!(into_file, File, FileRow);
row_accessor!(into_exported_type, ExportedType, ExportedTypeRow);
row_accessor!(into_manifest_resource, ManifestResource, ManifestResourceRow);
row_accessor!(into_nested_class, NestedClass, NestedClassRow);
row_accessor!(into_generic_param, GenericParam, GenericParamRow);
row_accessor!(into_method_spec, MethodSpec, MethodSpecRow);
