//! Metadata table identifiers and decoded row shapes.
//!
//! The byte layout of tables is owned by the image decoder. This layer consumes
//! tables exclusively through [`TableId`] and the decoded [`RawRow`] variants.
//!
//! ## ECMA-335 Specification
//! From ECMA-335, Partition II, Section 22 (Metadata logical format: tables).

mod rows;
mod tableid;

pub use rows::{
    AssemblyRefRow, AssemblyRow, CustomAttributeRow, ExportedTypeRow, FieldRow, FileRow,
    GenericParamRow, ManifestResourceRow, MemberRefRow, MethodDefRow, MethodSpecRow, ModuleRefRow,
    ModuleRow, NestedClassRow, ParamRow, RawRow, TypeDefRow, TypeRefRow, TypeSpecRow,
};
pub use tableid::TableId;
