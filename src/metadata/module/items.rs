//! Module-level entities that are not part of the type graph: module references,
//! manifest resources, exported types, custom attributes and member references.

use std::sync::Arc;

use bitflags::bitflags;

use crate::metadata::{
    identity::AssemblyNameRc,
    token::Token,
    typesystem::{join_full_name, FieldReferenceRc, MethodHandle, MethodReferenceRc, TypeSig},
};

/// Reference counted [`ModuleReference`]
pub type ModuleReferenceRc = Arc<ModuleReference>;
/// Reference counted [`Resource`]
pub type ResourceRc = Arc<Resource>;
/// Reference counted [`ExportedType`]
pub type ExportedTypeRc = Arc<ExportedType>;
/// Reference counted [`CustomAttribute`]
pub type CustomAttributeRc = Arc<CustomAttribute>;

/// `FileAttributes.ContainsNoMetaData`
pub(crate) const FILE_CONTAINS_NO_METADATA: u32 = 0x0001;
/// `TypeAttributes.Forwarder`
const TYPE_ATTRIBUTES_FORWARDER: u32 = 0x0020_0000;

/// A reference to another module of the same assembly (`ModuleRef` row)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    /// `ModuleRef` token
    pub token: Token,
    /// Module name
    pub name: String,
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    /// All possible flags for ManifestResourceAttributes
    pub struct ManifestResourceAttributes : u32 {
        /// The Resource is exported from the Assembly
        const PUBLIC = 0x0001;
        /// The Resource is private to the Assembly
        const PRIVATE = 0x0002;
    }
}

/// Where the data of a [`Resource`] lives
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceKind {
    /// Embedded in this image at `offset` of the resources directory
    Embedded {
        /// Offset within the resources directory
        offset: u32,
    },
    /// A separate file of this assembly
    LinkedFile {
        /// File name
        file: String,
        /// Hash of the file
        hash: Vec<u8>,
    },
    /// Provided by another assembly
    AssemblyLinked(AssemblyNameRc),
}

/// A manifest resource (`ManifestResource` row)
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// `ManifestResource` token
    pub token: Token,
    /// Resource name
    pub name: String,
    /// Visibility
    pub flags: ManifestResourceAttributes,
    /// Location of the data
    pub kind: ResourceKind,
}

impl Resource {
    /// True if the resource is visible outside its assembly
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags.contains(ManifestResourceAttributes::PUBLIC)
    }
}

/// Where an [`ExportedType`] is implemented
#[derive(Debug, Clone)]
pub enum ExportedTypeImplementation {
    /// Another module of this assembly
    File(String),
    /// Another assembly (a type forwarder)
    Assembly(AssemblyNameRc),
    /// Nested in another exported type
    Declaring(ExportedTypeRc),
}

/// A type exported or forwarded by this assembly (`ExportedType` row)
#[derive(Debug, Clone)]
pub struct ExportedType {
    /// `ExportedType` token
    pub token: Token,
    /// `TypeAttributes` bitmask
    pub flags: u32,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
    /// Hint into the `TypeDef` table of the implementing module
    pub type_def_id: u32,
    /// Implementation
    pub implementation: ExportedTypeImplementation,
}

impl ExportedType {
    /// True if the row forwards the type to another assembly
    #[must_use]
    pub fn is_forwarder(&self) -> bool {
        self.flags & TYPE_ATTRIBUTES_FORWARDER != 0
    }

    /// The enclosing exported type of a nested export
    #[must_use]
    pub fn declaring_type(&self) -> Option<&ExportedTypeRc> {
        match &self.implementation {
            ExportedTypeImplementation::Declaring(declaring) => Some(declaring),
            _ => None,
        }
    }

    /// `Namespace.Name`, or `Outer/Inner` for nested exports
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.declaring_type() {
            Some(declaring) => format!("{}/{}", declaring.full_name(), self.name),
            None => join_full_name(&self.namespace, &self.name),
        }
    }

    /// The implementation of the outermost enclosing export
    #[must_use]
    pub fn scope(&self) -> &ExportedTypeImplementation {
        match &self.implementation {
            ExportedTypeImplementation::Declaring(declaring) => declaring.scope(),
            other => other,
        }
    }
}

/// A custom attribute (`CustomAttribute` row); the value blob is kept undecoded
#[derive(Debug, Clone)]
pub struct CustomAttribute {
    /// `CustomAttribute` token
    pub token: Token,
    /// Token of the attributed entity
    pub parent: Token,
    /// The attribute constructor
    pub constructor: MethodHandle,
    /// The value blob
    pub blob: Vec<u8>,
}

impl CustomAttribute {
    /// The attribute type: the declaring type of the constructor
    #[must_use]
    pub fn attribute_type(&self) -> Option<TypeSig> {
        self.constructor.declaring_type()
    }
}

/// A member reference (`MemberRef` row): a field or a method
#[derive(Debug, Clone)]
pub enum MemberReference {
    /// Field reference
    Field(FieldReferenceRc),
    /// Method reference
    Method(MethodReferenceRc),
}

impl MemberReference {
    /// Member name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MemberReference::Field(field) => &field.name,
            MemberReference::Method(method) => &method.name,
        }
    }

    /// `MemberRef` token
    #[must_use]
    pub fn token(&self) -> Token {
        match self {
            MemberReference::Field(field) => field.token,
            MemberReference::Method(method) => method.token,
        }
    }

    /// Declaring type
    #[must_use]
    pub fn declaring_type(&self) -> &TypeSig {
        match self {
            MemberReference::Field(field) => &field.declaring_type,
            MemberReference::Method(method) => &method.declaring_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        identity::{AssemblyNameReference, AssemblyVersion},
        tables::TableId,
    };

    fn exported(name: &str, implementation: ExportedTypeImplementation) -> ExportedType {
        ExportedType {
            token: Token::new(TableId::ExportedType, 1),
            flags: TYPE_ATTRIBUTES_FORWARDER,
            namespace: "N".into(),
            name: name.into(),
            type_def_id: 0,
            implementation,
        }
    }

    #[test]
    fn nested_export_inherits_scope() {
        let lib = Arc::new(AssemblyNameReference::new("Lib", AssemblyVersion::ZERO));
        let outer = Arc::new(exported(
            "Outer",
            ExportedTypeImplementation::Assembly(lib.clone()),
        ));
        let mut inner = exported("Inner", ExportedTypeImplementation::Declaring(outer));
        inner.namespace = String::new();

        assert_eq!(inner.full_name(), "N.Outer/Inner");
        assert!(inner.is_forwarder());
        match inner.scope() {
            ExportedTypeImplementation::Assembly(name) => assert_eq!(name.name, "Lib"),
            other => panic!("unexpected scope {other:?}"),
        }
    }

    #[test]
    fn resource_visibility() {
        let resource = Resource {
            token: Token::new(TableId::ManifestResource, 1),
            name: "data.bin".into(),
            flags: ManifestResourceAttributes::PUBLIC,
            kind: ResourceKind::Embedded { offset: 0 },
        };
        assert!(resource.is_public());
    }
}
