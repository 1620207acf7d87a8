use strum::{EnumCount, EnumIter, FromRepr, IntoStaticStr};

/// Identifiers for the different metadata tables defined in the ECMA-335 specification.
///
/// The numeric values correspond to the table IDs as defined in the CLI specification
/// and form the high byte of a raw metadata token. The set is closed: every place that
/// dispatches on a table kind matches exhaustively over this enum.
///
/// ## Table Categories
///
/// ### Core Type System
/// - **`Module`**, **`TypeRef`**, **`TypeDef`**, **`Field`**, **`MethodDef`**, **`Param`**
///
/// ### Type Relationships
/// - **`InterfaceImpl`**, **`NestedClass`**, **`ClassLayout`**, **`FieldLayout`**
///
/// ### Member References
/// - **`MemberRef`**, **`MethodImpl`**, **`MethodSemantics`**
///
/// ### Signatures and Generics
/// - **`StandAloneSig`**, **`TypeSpec`**, **`MethodSpec`**, **`GenericParam`**,
///   **`GenericParamConstraint`**
///
/// ### Assembly Information
/// - **`Assembly`**, **`AssemblyRef`** and their processor / OS companions
///
/// ### Files and Resources
/// - **`File`**, **`ExportedType`**, **`ManifestResource`**
///
/// ### Portable PDB
/// - **`Document`** through **`CustomDebugInformation`** (0x30 - 0x37)
///
/// ## Reference
/// * [ECMA-335 Partition II, Section 22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Metadata Tables
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Hash,
    EnumIter,
    EnumCount,
    FromRepr,
    IntoStaticStr,
)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
    Document = 0x30,
    MethodDebugInformation = 0x31,
    LocalScope = 0x32,
    LocalVariable = 0x33,
    LocalConstant = 0x34,
    ImportScope = 0x35,
    StateMachineMethod = 0x36,
    CustomDebugInformation = 0x37,
}

impl TableId {
    /// Returns the table id encoded by the high byte of a raw token, if it names a known table.
    #[must_use]
    pub fn from_token_byte(byte: u8) -> Option<TableId> {
        TableId::from_repr(byte)
    }

    /// The byte used for this table in the high byte of a raw token
    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// The table name as used in ECMA-335 (e.g. `"TypeDef"`)
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn byte_roundtrip_for_every_table() {
        for table in TableId::iter() {
            assert_eq!(TableId::from_token_byte(table.as_byte()), Some(table));
        }
    }

    #[test]
    fn gaps_are_rejected() {
        assert_eq!(TableId::from_token_byte(0x2D), None);
        assert_eq!(TableId::from_token_byte(0x2F), None);
        assert_eq!(TableId::from_token_byte(0x38), None);
        assert_eq!(TableId::from_token_byte(0xFF), None);
    }

    #[test]
    fn names() {
        assert_eq!(TableId::TypeDef.name(), "TypeDef");
        assert_eq!(TableId::AssemblyRef.to_string(), "AssemblyRef");
        assert_eq!(TableId::COUNT, 53);
    }
}
