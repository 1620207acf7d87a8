//! Definitions: entities owned by exactly one module.
//!
//! A definition is either realized from a row of its module's image or constructed by a
//! client and added to an image-less module. The owning module is recorded exactly once;
//! adding an owned definition to a second module is rejected.

use std::sync::{Arc, OnceLock, Weak};

use crate::{
    metadata::{
        module::ModuleId,
        tables::TableId,
        token::Token,
        typesystem::{
            join_full_name, GenericOwner, GenericParam, GenericParamKind, MethodSig,
            ModuleScopeRc, TypeSig,
        },
    },
    Error, Result,
};

/// Reference counted [`TypeDefinition`]
pub type TypeDefRc = Arc<TypeDefinition>;
/// Reference counted [`FieldDefinition`]
pub type FieldDefRc = Arc<FieldDefinition>;
/// Reference counted [`MethodDefinition`]
pub type MethodDefRc = Arc<MethodDefinition>;
/// Reference counted [`ParameterDefinition`]
pub type ParamDefRc = Arc<ParameterDefinition>;

/// `TypeAttributes.Interface`
const TYPE_ATTRIBUTES_INTERFACE: u32 = 0x0000_0020;
/// `FieldAttributes.Static`
const FIELD_ATTRIBUTES_STATIC: u16 = 0x0010;
/// `MethodAttributes.Static`
const METHOD_ATTRIBUTES_STATIC: u16 = 0x0010;

/// A type defined by a module (`TypeDef` row)
#[derive(Debug)]
pub struct TypeDefinition {
    /// `TypeDef` token, nil until the type is written
    pub token: Token,
    /// `TypeAttributes` bitmask
    pub flags: u32,
    /// Namespace, empty for nested types
    pub namespace: String,
    /// Name
    pub name: String,
    /// Names of the generic parameters, in order
    pub generic_parameters: Vec<String>,
    /// Directly nested types
    pub nested_types: boxcar::Vec<TypeDefRc>,
    /// Fields
    pub fields: boxcar::Vec<FieldDefRc>,
    /// Methods
    pub methods: boxcar::Vec<MethodDefRc>,
    owner: OnceLock<ModuleScopeRc>,
    declaring_type: OnceLock<Weak<TypeDefinition>>,
    base_type: OnceLock<TypeSig>,
}

impl TypeDefinition {
    /// Create an unattached type definition
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, flags: u32) -> Self {
        TypeDefinition {
            token: Token::nil(TableId::TypeDef),
            flags,
            namespace: namespace.into(),
            name: name.into(),
            generic_parameters: Vec::new(),
            nested_types: boxcar::Vec::new(),
            fields: boxcar::Vec::new(),
            methods: boxcar::Vec::new(),
            owner: OnceLock::new(),
            declaring_type: OnceLock::new(),
            base_type: OnceLock::new(),
        }
    }

    /// Set the token
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    /// Set the generic parameter names
    #[must_use]
    pub fn with_generic_parameters<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.generic_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the base type of a type that has not been shared yet
    #[must_use]
    pub fn with_base_type(self, base: TypeSig) -> Self {
        let _ = self.base_type.set(base);
        self
    }

    /// The owning module, `None` while the definition is unattached
    #[must_use]
    pub fn module(&self) -> Option<&ModuleScopeRc> {
        self.owner.get()
    }

    /// Id of the owning module
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        self.owner.get().map(|scope| scope.id)
    }

    /// Attach this type and everything nested in it to `scope`
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the type already belongs to another module
    pub fn attach(&self, scope: &ModuleScopeRc) -> Result<()> {
        let owner = self.owner.get_or_init(|| scope.clone());
        if owner.id != scope.id {
            return Err(Error::InvalidArgument(format!(
                "Type {} already belongs to module {}",
                self.full_name(),
                owner.name
            )));
        }

        for (_, nested) in self.nested_types.iter() {
            nested.attach(scope)?;
        }
        Ok(())
    }

    /// The enclosing type of a nested type
    #[must_use]
    pub fn declaring_type(&self) -> Option<TypeDefRc> {
        self.declaring_type.get().and_then(Weak::upgrade)
    }

    /// True if this type is nested in another type
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.declaring_type.get().is_some()
    }

    /// `Namespace.Name`, or `Outer/Inner` for nested types
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.declaring_type() {
            Some(declaring) => format!("{}/{}", declaring.full_name(), self.name),
            None => join_full_name(&self.namespace, &self.name),
        }
    }

    /// The base type, `None` for interfaces, `System.Object` and `<Module>`
    #[must_use]
    pub fn base_type(&self) -> Option<&TypeSig> {
        self.base_type.get()
    }

    /// Set the base type once
    ///
    /// # Errors
    /// Returns [`Error::InvalidOperation`] if a base type is already set
    pub fn set_base_type(&self, base: TypeSig) -> Result<()> {
        self.base_type.set(base).map_err(|_| {
            Error::InvalidOperation(format!("Base type of {} is already set", self.full_name()))
        })
    }

    /// True for interfaces
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags & TYPE_ATTRIBUTES_INTERFACE != 0
    }

    /// True if the type derives from `System.ValueType` or `System.Enum`
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        let Some(base) = self.base_type().and_then(TypeSig::element_handle) else {
            return false;
        };

        match base.full_name().as_str() {
            "System.Enum" => true,
            "System.ValueType" => self.full_name() != "System.Enum",
            _ => false,
        }
    }

    /// The generic parameters, owned by this type
    #[must_use]
    pub fn generic_params(&self) -> Vec<GenericParam> {
        GenericParam::list(
            GenericParamKind::Type,
            &self.generic_parameters,
            GenericOwner {
                module: self.module_id(),
                name: self.full_name(),
            },
        )
    }

    /// Direct nested type by name
    #[must_use]
    pub fn nested_type(&self, name: &str) -> Option<TypeDefRc> {
        self.nested_types
            .iter()
            .map(|(_, nested)| nested)
            .find(|nested| nested.name == name)
            .cloned()
    }

    /// Nest `nested` in this type
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if `nested` is already nested elsewhere or belongs
    /// to another module
    pub fn add_nested_type(self: &Arc<Self>, nested: TypeDefRc) -> Result<()> {
        let declaring = nested.declaring_type.get_or_init(|| Arc::downgrade(self));
        if !Weak::ptr_eq(declaring, &Arc::downgrade(self)) {
            return Err(Error::InvalidArgument(format!(
                "Type {} is already nested in another type",
                nested.name
            )));
        }

        if let Some(scope) = self.module() {
            nested.attach(scope)?;
        }
        self.nested_types.push(nested);
        Ok(())
    }

    /// Add a field to this type
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the field already belongs to another type
    pub fn add_field(self: &Arc<Self>, field: FieldDefRc) -> Result<()> {
        claim(&field.declaring_type, self, &field.name)?;
        self.fields.push(field);
        Ok(())
    }

    /// Add a method to this type
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if the method already belongs to another type
    pub fn add_method(self: &Arc<Self>, method: MethodDefRc) -> Result<()> {
        claim(&method.declaring_type, self, &method.name)?;
        self.methods.push(method);
        Ok(())
    }

    /// Link a nested type read from the image
    pub(crate) fn nest(self: &Arc<Self>, nested: &TypeDefRc) -> bool {
        if nested.declaring_type.set(Arc::downgrade(self)).is_err() {
            return false;
        }
        self.nested_types.push(nested.clone());
        true
    }
}

fn claim(slot: &OnceLock<Weak<TypeDefinition>>, owner: &Arc<TypeDefinition>, name: &str) -> Result<()> {
    let declaring = slot.get_or_init(|| Arc::downgrade(owner));
    if Weak::ptr_eq(declaring, &Arc::downgrade(owner)) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "Member {name} already belongs to another type"
        )))
    }
}

/// A field defined by a type (`Field` row)
#[derive(Debug)]
pub struct FieldDefinition {
    /// `Field` token, nil until the field is written
    pub token: Token,
    /// `FieldAttributes` bitmask
    pub flags: u16,
    /// Name
    pub name: String,
    /// Field type
    pub field_type: TypeSig,
    declaring_type: OnceLock<Weak<TypeDefinition>>,
}

impl FieldDefinition {
    /// Create a field that is not yet added to a type
    #[must_use]
    pub fn new(name: impl Into<String>, flags: u16, field_type: TypeSig) -> Self {
        FieldDefinition {
            token: Token::nil(TableId::Field),
            flags,
            name: name.into(),
            field_type,
            declaring_type: OnceLock::new(),
        }
    }

    /// Set the token
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    /// The declaring type
    #[must_use]
    pub fn declaring_type(&self) -> Option<TypeDefRc> {
        self.declaring_type.get().and_then(Weak::upgrade)
    }

    /// Id of the module owning the declaring type
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        self.declaring_type().and_then(|declaring| declaring.module_id())
    }

    /// True for static fields
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags & FIELD_ATTRIBUTES_STATIC != 0
    }
}

/// A parameter of a method (`Param` row)
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    /// `Param` token
    pub token: Token,
    /// `ParamAttributes` bitmask
    pub flags: u16,
    /// 0 for the return value, 1.. for parameters
    pub sequence: u16,
    /// Name
    pub name: String,
}

/// A method defined by a type (`MethodDef` row)
#[derive(Debug)]
pub struct MethodDefinition {
    /// `MethodDef` token, nil until the method is written
    pub token: Token,
    /// `MethodAttributes` bitmask
    pub flags: u16,
    /// `MethodImplAttributes` bitmask
    pub impl_flags: u16,
    /// RVA of the body, 0 if there is none
    pub rva: u32,
    /// Name
    pub name: String,
    /// Signature
    pub signature: MethodSig,
    /// Names of the generic parameters, in order
    pub generic_parameters: Vec<String>,
    /// Parameter rows
    pub parameters: Vec<ParamDefRc>,
    declaring_type: OnceLock<Weak<TypeDefinition>>,
}

impl MethodDefinition {
    /// Create a method that is not yet added to a type
    #[must_use]
    pub fn new(name: impl Into<String>, flags: u16, signature: MethodSig) -> Self {
        MethodDefinition {
            token: Token::nil(TableId::MethodDef),
            flags,
            impl_flags: 0,
            rva: 0,
            name: name.into(),
            signature,
            generic_parameters: Vec::new(),
            parameters: Vec::new(),
            declaring_type: OnceLock::new(),
        }
    }

    /// Set the token
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    /// Set the generic parameter names; the signature's arity follows
    #[must_use]
    pub fn with_generic_parameters<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.generic_parameters = names.into_iter().map(Into::into).collect();
        self.signature.generic_arity = u32::try_from(self.generic_parameters.len()).unwrap_or(0);
        self
    }

    /// The declaring type
    #[must_use]
    pub fn declaring_type(&self) -> Option<TypeDefRc> {
        self.declaring_type.get().and_then(Weak::upgrade)
    }

    /// Id of the module owning the declaring type
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        self.declaring_type().and_then(|declaring| declaring.module_id())
    }

    /// True for static methods
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags & METHOD_ATTRIBUTES_STATIC != 0
    }

    /// `DeclaringType.FullName + "." + Name`
    #[must_use]
    pub fn normalized_name(&self) -> String {
        match self.declaring_type() {
            Some(declaring) => format!("{}.{}", declaring.full_name(), self.name),
            None => self.name.clone(),
        }
    }

    /// The generic parameters, owned by this method
    #[must_use]
    pub fn generic_params(&self) -> Vec<GenericParam> {
        GenericParam::list(
            GenericParamKind::Method,
            &self.generic_parameters,
            GenericOwner {
                module: self.module_id(),
                name: self.normalized_name(),
            },
        )
    }

    /// `ReturnType DeclaringType::Name(Params)`
    #[must_use]
    pub fn full_name(&self) -> String {
        let declaring = match self.declaring_type() {
            Some(declaring) => declaring.full_name(),
            None => String::new(),
        };
        let params = self
            .signature
            .params
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{} {}::{}({})",
            self.signature.return_type, declaring, self.name, params
        )
    }
}
