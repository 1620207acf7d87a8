//! Decoding of entities from the module's image.
//!
//! Everything here runs with the module's reader lock held and receives the
//! [`ModuleReader`] explicitly. Any routine that moves the image cursor or changes the
//! [`DecodeContext`] does so inside [`ModuleReader::frame`], which puts both back on every
//! exit path. That makes nested loads (realizing an assembly reference while walking the
//! `Field` table, say) invisible to the routine that triggered them.

use std::{collections::HashMap, sync::Arc};

use tracing::trace;

use crate::{
    metadata::{
        identity::{AssemblyNameReference, AssemblyNameRc},
        image::Image,
        module::{
            items::{
                CustomAttribute, CustomAttributeRc, ExportedType, ExportedTypeImplementation,
                ExportedTypeRc, ManifestResourceAttributes, MemberReference, ModuleReference,
                ModuleReferenceRc, Resource, ResourceKind, ResourceRc, FILE_CONTAINS_NO_METADATA,
            },
            types::TypeCollection,
            Entity, Module,
        },
        signatures::{SignatureMember, SignatureMethod, SignatureType},
        tables::{ExportedTypeRow, RawRow, TableId, TypeDefRow},
        token::Token,
        typesystem::{
            normalized_method_name, placeholder_names, ArrayShape, FieldDefinition,
            FieldReference, GenericInstanceMethod, GenericInstanceMethodRc, GenericOwner,
            GenericParam, GenericParamKind, MethodDefRc, MethodDefinition, MethodHandle,
            MethodReference, MethodSig, ParameterDefinition, PrimitiveKind, ResolutionScope,
            TypeDefRc, TypeDefinition, TypeHandle, TypeReference, TypeReferenceRc, TypeSig,
        },
    },
    Error, Result,
};

/// Maximum nesting of cursor frames before a decode is considered cyclic
const MAX_FRAME_DEPTH: usize = 256;

/// Generic parameters that `VAR` / `MVAR` indices bind to while a signature is realized
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    /// Parameters of the enclosing generic type
    pub type_params: Arc<[GenericParam]>,
    /// Parameters of the enclosing generic method
    pub method_params: Arc<[GenericParam]>,
}

/// A snapshot of everything a nested load could disturb
#[derive(Debug, Clone)]
pub struct CursorState {
    position: Option<u64>,
    context: DecodeContext,
}

/// The image of a module together with its decode state.
///
/// Owned by the module behind its reader lock. The image is released on disposal.
pub struct ModuleReader {
    image: Option<Box<dyn Image>>,
    context: DecodeContext,
    depth: usize,
    realizing_types: bool,
}

impl ModuleReader {
    pub(crate) fn new(image: Option<Box<dyn Image>>) -> Self {
        ModuleReader {
            image,
            context: DecodeContext::default(),
            depth: 0,
            realizing_types: false,
        }
    }

    /// True while the reader still holds an image
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Drop the image; later decodes fail with [`Error::Disposed`]
    pub(crate) fn release(&mut self) {
        self.image = None;
    }

    /// The image
    ///
    /// # Errors
    /// Returns [`Error::Disposed`] once the image has been released
    pub fn image(&mut self) -> Result<&mut (dyn Image + 'static)> {
        self.image.as_deref_mut().ok_or(Error::Disposed)
    }

    /// Number of rows in `table`, `0` without an image
    #[must_use]
    pub fn table_length(&self, table: TableId) -> u32 {
        self.image
            .as_deref()
            .map_or(0, |image| image.table_length(table))
    }

    /// The active decode context
    #[must_use]
    pub fn context(&self) -> &DecodeContext {
        &self.context
    }

    /// Bind `VAR` indices to `params`
    pub fn set_type_params(&mut self, params: Vec<GenericParam>) {
        self.context.type_params = params.into();
    }

    /// Bind `MVAR` indices to `params`
    pub fn set_method_params(&mut self, params: Vec<GenericParam>) {
        self.context.method_params = params.into();
    }

    /// Snapshot cursor position and decode context
    #[must_use]
    pub fn save(&self) -> CursorState {
        CursorState {
            position: self.image.as_deref().map(Image::position),
            context: self.context.clone(),
        }
    }

    /// Return to a snapshot taken by [`ModuleReader::save`]
    ///
    /// # Errors
    /// Returns an error if the image rejects the saved position
    pub fn restore(&mut self, state: CursorState) -> Result<()> {
        self.context = state.context;
        match (state.position, self.image.as_deref_mut()) {
            (Some(position), Some(image)) => image.set_position(position),
            _ => Ok(()),
        }
    }

    /// Run `f` and put cursor and decode context back afterwards, whether `f` succeeded
    /// or not.
    ///
    /// # Errors
    /// Returns the error of `f`, an error restoring the cursor, or
    /// [`Error::RecursionLimit`] if frames nest deeper than any well-formed image needs
    pub fn frame<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_FRAME_DEPTH {
            return Err(Error::RecursionLimit(MAX_FRAME_DEPTH));
        }

        let state = self.save();
        trace!(depth = self.depth, position = ?state.position, "enter cursor frame");
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        let restored = self.restore(state);

        let value = result?;
        restored?;
        Ok(value)
    }

    /// Decode a single row without disturbing the cursor
    ///
    /// # Errors
    /// Returns an error if the row does not exist or cannot be decoded
    pub fn decode_at(&mut self, table: TableId, row: u32) -> Result<RawRow> {
        self.frame(|reader| reader.image()?.decode_row(table, row))
    }

    /// Decode `count` consecutive rows starting at `start`, calling `f` for each with the
    /// cursor positioned after the row
    fn for_each_row(
        &mut self,
        table: TableId,
        start: u32,
        end: u32,
        mut f: impl FnMut(&mut Self, u32, RawRow) -> Result<()>,
    ) -> Result<()> {
        if start == 0 || start >= end {
            return Ok(());
        }

        self.image()?.seek(table, start)?;
        for row in start..end {
            let raw = self.image()?.read_row()?;
            f(self, row, raw)?;
        }
        Ok(())
    }

    /// [`ModuleReader::for_each_row`] over the whole table
    fn for_each_table_row(
        &mut self,
        table: TableId,
        f: impl FnMut(&mut Self, u32, RawRow) -> Result<()>,
    ) -> Result<()> {
        let end = self.table_length(table) + 1;
        self.for_each_row(table, 1, end, f)
    }
}

/// End of a member run: the next owner's list start, or one past the last row
fn run_end(next: Option<u32>, table_length: u32) -> u32 {
    next.unwrap_or(table_length + 1).min(table_length + 1)
}

impl Module {
    /// Realize all type definitions with their nesting, generic parameters, base types,
    /// fields, methods and parameters.
    pub(crate) fn read_types(&self, reader: &mut ModuleReader) -> Result<TypeCollection> {
        reader.realizing_types = true;
        let types = self.read_types_inner(reader);
        reader.realizing_types = false;

        if types.is_err() {
            for table in [TableId::TypeDef, TableId::Field, TableId::MethodDef, TableId::Param] {
                let first = Token::new(table, 1);
                let last = Token::new(table, Token::MAX_ROW);
                for entry in self.tokens.range(first..=last) {
                    entry.remove();
                }
            }
        }
        types
    }

    fn read_types_inner(&self, reader: &mut ModuleReader) -> Result<TypeCollection> {
        let mut generic_names: HashMap<Token, Vec<(u16, String)>> = HashMap::new();
        reader.for_each_table_row(TableId::GenericParam, |_, _, raw| {
            let row = raw.into_generic_param()?;
            generic_names
                .entry(row.owner)
                .or_default()
                .push((row.number, row.name));
            Ok(())
        })?;
        let mut generic_names: HashMap<Token, Vec<String>> = generic_names
            .into_iter()
            .map(|(owner, mut params)| {
                params.sort_by_key(|(number, _)| *number);
                (owner, params.into_iter().map(|(_, name)| name).collect())
            })
            .collect();

        let mut rows: Vec<TypeDefRow> = Vec::new();
        let mut defs: Vec<TypeDefRc> = Vec::new();
        reader.for_each_table_row(TableId::TypeDef, |_, row, raw| {
            let raw = raw.into_type_def()?;
            let token = Token::new(TableId::TypeDef, row);
            let def = Arc::new(
                TypeDefinition::new(raw.namespace.clone(), raw.name.clone(), raw.flags)
                    .with_token(token)
                    .with_generic_parameters(generic_names.remove(&token).unwrap_or_default()),
            );
            def.attach(&self.scope)?;
            self.tokens.insert(token, Entity::TypeDefinition(def.clone()));

            rows.push(raw);
            defs.push(def);
            Ok(())
        })?;

        reader.for_each_table_row(TableId::NestedClass, |_, _, raw| {
            let row = raw.into_nested_class()?;
            let nested = type_at(&defs, row.nested_class)?;
            let enclosing = type_at(&defs, row.enclosing_class)?;
            if row.nested_class == row.enclosing_class || !enclosing.nest(nested) {
                return Err(malformed_error!(
                    "TypeDef row {} is nested more than once",
                    row.nested_class
                ));
            }
            Ok(())
        })?;

        let field_count = reader.table_length(TableId::Field);
        let method_count = reader.table_length(TableId::MethodDef);
        for (index, (row, def)) in rows.iter().zip(&defs).enumerate() {
            let next = rows.get(index + 1);
            reader.set_type_params(def.generic_params());
            reader.set_method_params(Vec::new());

            if !row.extends.is_nil() {
                let base = self.type_sig_from_token(reader, row.extends, false)?;
                def.set_base_type(base)?;
            }

            let field_end = run_end(next.map(|next| next.field_list), field_count);
            reader.for_each_row(TableId::Field, row.field_list, field_end, |reader, row, raw| {
                let raw = raw.into_field()?;
                let field_type = self.realize_type(reader, &raw.signature)?;
                let field = Arc::new(
                    FieldDefinition::new(raw.name, raw.flags, field_type)
                        .with_token(Token::new(TableId::Field, row)),
                );
                def.add_field(field.clone())?;
                self.tokens.insert(field.token, Entity::Field(field));
                Ok(())
            })?;

            let method_end = run_end(next.map(|next| next.method_list), method_count);
            let mut method_rows = Vec::new();
            reader.for_each_row(TableId::MethodDef, row.method_list, method_end, |_, row, raw| {
                method_rows.push((row, raw.into_method_def()?));
                Ok(())
            })?;

            let param_count = reader.table_length(TableId::Param);
            for (position, (method_row, raw)) in method_rows.iter().enumerate() {
                let token = Token::new(TableId::MethodDef, *method_row);
                let names = generic_names.remove(&token).unwrap_or_default();
                reader.set_method_params(GenericParam::list(
                    GenericParamKind::Method,
                    &names,
                    GenericOwner {
                        module: Some(self.id),
                        name: format!("{}.{}", def.full_name(), raw.name),
                    },
                ));

                let signature = self.realize_method_sig(reader, &raw.signature)?;
                let param_end = match method_rows.get(position + 1) {
                    Some((_, next)) => run_end(Some(next.param_list), param_count),
                    None => self.param_end_after(reader, *method_row, param_count)?,
                };
                let parameters = reader.frame(|reader| {
                    let mut parameters = Vec::new();
                    reader.for_each_row(TableId::Param, raw.param_list, param_end, |_, row, raw| {
                        let raw = raw.into_param()?;
                        parameters.push(Arc::new(ParameterDefinition {
                            token: Token::new(TableId::Param, row),
                            flags: raw.flags,
                            sequence: raw.sequence,
                            name: raw.name,
                        }));
                        Ok(())
                    })?;
                    Ok(parameters)
                })?;

                let mut method = MethodDefinition::new(raw.name.clone(), raw.flags, signature)
                    .with_token(token)
                    .with_generic_parameters(names);
                method.impl_flags = raw.impl_flags;
                method.rva = raw.rva;
                method.parameters = parameters;

                let method = Arc::new(method);
                for param in &method.parameters {
                    self.tokens
                        .insert(param.token, Entity::Parameter(param.clone()));
                }
                def.add_method(method.clone())?;
                self.tokens.insert(token, Entity::Method(method));
            }
        }

        Ok(TypeCollection::from_types(
            defs.into_iter().filter(|def| !def.is_nested()),
        ))
    }

    /// End of the parameter run of the last method of a type: the param list of the next
    /// `MethodDef` row, wherever that row belongs
    fn param_end_after(&self, reader: &mut ModuleReader, method_row: u32, param_count: u32) -> Result<u32> {
        if method_row >= reader.table_length(TableId::MethodDef) {
            return Ok(param_count + 1);
        }

        let next = reader
            .decode_at(TableId::MethodDef, method_row + 1)?
            .into_method_def()?;
        Ok(run_end(Some(next.param_list), param_count))
    }

    fn types_locked(&self, reader: &mut ModuleReader) -> Result<Arc<TypeCollection>> {
        self.types.get_or_read_locked(self, reader, Module::read_types)
    }

    /// A `TypeDef`, `Field`, `MethodDef` or `Param` entity, realizing the types first
    fn definition_locked(&self, reader: &mut ModuleReader, token: Token) -> Result<Option<Entity>> {
        if let Some(entry) = self.tokens.get(&token) {
            return Ok(Some(entry.value().clone()));
        }
        if reader.realizing_types {
            return Err(malformed_error!(
                "{} is referenced before its definition is decoded",
                token
            ));
        }

        self.types_locked(reader)?;
        Ok(self.tokens.get(&token).map(|entry| entry.value().clone()))
    }

    pub(crate) fn type_definition_locked(
        &self,
        reader: &mut ModuleReader,
        token: Token,
    ) -> Result<TypeDefRc> {
        match self.definition_locked(reader, token)? {
            Some(Entity::TypeDefinition(def)) => Ok(def),
            _ => Err(malformed_error!("No type definition for token {}", token)),
        }
    }

    pub(crate) fn method_definition_locked(
        &self,
        reader: &mut ModuleReader,
        token: Token,
    ) -> Result<MethodDefRc> {
        match self.definition_locked(reader, token)? {
            Some(Entity::Method(def)) => Ok(def),
            _ => Err(malformed_error!("No method definition for token {}", token)),
        }
    }

    /// A `TypeDef` or `TypeRef` as a handle
    pub(crate) fn type_handle(&self, reader: &mut ModuleReader, token: Token) -> Result<TypeHandle> {
        match token.table() {
            TableId::TypeDef => Ok(TypeHandle::Definition(
                self.type_definition_locked(reader, token)?,
            )),
            TableId::TypeRef => Ok(TypeHandle::Reference(
                self.type_reference_row(reader, token.row())?,
            )),
            other => Err(malformed_error!(
                "Expected a TypeDef or TypeRef token, got a {} token",
                other
            )),
        }
    }

    /// A `TypeDefOrRefOrSpec` token as a signature
    pub(crate) fn type_sig_from_token(
        &self,
        reader: &mut ModuleReader,
        token: Token,
        value_type: bool,
    ) -> Result<TypeSig> {
        if token.is_table(TableId::TypeSpec) {
            return self.type_specification(reader, token.row());
        }

        let handle = self.type_handle(reader, token)?;
        if let (true, TypeHandle::Reference(reference)) = (value_type, &handle) {
            reference.mark_value_type();
        }
        Ok(TypeSig::Named(handle))
    }

    /// Realize a raw type signature in the active decode context
    pub(crate) fn realize_type(&self, reader: &mut ModuleReader, sig: &SignatureType) -> Result<TypeSig> {
        let boxed = |reader: &mut ModuleReader, inner: &SignatureType| -> Result<Box<TypeSig>> {
            Ok(Box::new(self.realize_type(reader, inner)?))
        };

        Ok(match sig {
            SignatureType::Void => TypeSig::Primitive(PrimitiveKind::Void),
            SignatureType::Boolean => TypeSig::Primitive(PrimitiveKind::Boolean),
            SignatureType::Char => TypeSig::Primitive(PrimitiveKind::Char),
            SignatureType::I1 => TypeSig::Primitive(PrimitiveKind::SByte),
            SignatureType::U1 => TypeSig::Primitive(PrimitiveKind::Byte),
            SignatureType::I2 => TypeSig::Primitive(PrimitiveKind::Int16),
            SignatureType::U2 => TypeSig::Primitive(PrimitiveKind::UInt16),
            SignatureType::I4 => TypeSig::Primitive(PrimitiveKind::Int32),
            SignatureType::U4 => TypeSig::Primitive(PrimitiveKind::UInt32),
            SignatureType::I8 => TypeSig::Primitive(PrimitiveKind::Int64),
            SignatureType::U8 => TypeSig::Primitive(PrimitiveKind::UInt64),
            SignatureType::R4 => TypeSig::Primitive(PrimitiveKind::Single),
            SignatureType::R8 => TypeSig::Primitive(PrimitiveKind::Double),
            SignatureType::I => TypeSig::Primitive(PrimitiveKind::IntPtr),
            SignatureType::U => TypeSig::Primitive(PrimitiveKind::UIntPtr),
            SignatureType::String => TypeSig::Primitive(PrimitiveKind::String),
            SignatureType::Object => TypeSig::Primitive(PrimitiveKind::Object),
            SignatureType::TypedByRef => TypeSig::Primitive(PrimitiveKind::TypedReference),
            SignatureType::Class(token) => self.type_sig_from_token(reader, *token, false)?,
            SignatureType::ValueType(token) => self.type_sig_from_token(reader, *token, true)?,
            SignatureType::Var(index) => TypeSig::GenericParam(bind(
                &reader.context().type_params,
                GenericParamKind::Type,
                *index,
            )),
            SignatureType::MVar(index) => TypeSig::GenericParam(bind(
                &reader.context().method_params,
                GenericParamKind::Method,
                *index,
            )),
            SignatureType::SzArray(inner) => TypeSig::SzArray(boxed(reader, inner)?),
            SignatureType::Array(inner, shape) => TypeSig::Array(
                boxed(reader, inner)?,
                ArrayShape {
                    rank: shape.rank,
                    sizes: shape.sizes.clone(),
                    lower_bounds: shape.lower_bounds.clone(),
                },
            ),
            SignatureType::Ptr(inner) => TypeSig::Pointer(boxed(reader, inner)?),
            SignatureType::ByRef(inner) => TypeSig::ByRef(boxed(reader, inner)?),
            SignatureType::Pinned(inner) => TypeSig::Pinned(boxed(reader, inner)?),
            SignatureType::Modified(required, modifier, inner) => TypeSig::Modified {
                required: *required,
                modifier: self.type_handle(reader, *modifier)?,
                element: boxed(reader, inner)?,
            },
            SignatureType::GenericInst(base, arguments) => {
                let handle = match self.realize_type(reader, base)? {
                    TypeSig::Named(handle) => handle,
                    other => {
                        return Err(malformed_error!(
                            "Generic instantiation of a non-named type {}",
                            other
                        ))
                    }
                };
                let arguments = arguments
                    .iter()
                    .map(|argument| self.realize_type(reader, argument))
                    .collect::<Result<Vec<_>>>()?;
                TypeSig::GenericInstance(handle, arguments)
            }
            SignatureType::FnPtr(method) => {
                TypeSig::FnPtr(Box::new(self.realize_method_sig(reader, method)?))
            }
        })
    }

    pub(crate) fn realize_method_sig(
        &self,
        reader: &mut ModuleReader,
        sig: &SignatureMethod,
    ) -> Result<MethodSig> {
        let realize_all = |reader: &mut ModuleReader, types: &[SignatureType]| {
            types
                .iter()
                .map(|sig| self.realize_type(reader, sig))
                .collect::<Result<Vec<_>>>()
        };

        Ok(MethodSig {
            has_this: sig.has_this,
            explicit_this: sig.explicit_this,
            vararg: sig.vararg,
            generic_arity: sig.generic_param_count,
            return_type: self.realize_type(reader, &sig.return_type)?,
            params: realize_all(reader, &sig.params)?,
            sentinel_params: realize_all(reader, &sig.varargs)?,
        })
    }

    /// The `TypeRef` at `row`, realized once per module
    pub(crate) fn type_reference_row(&self, reader: &mut ModuleReader, row: u32) -> Result<TypeReferenceRc> {
        let token = Token::new(TableId::TypeRef, row);
        if let Some(Entity::TypeReference(reference)) =
            self.tokens.get(&token).map(|entry| entry.value().clone())
        {
            return Ok(reference);
        }

        let raw = reader.decode_at(TableId::TypeRef, row)?.into_type_ref()?;
        let scope_token = raw.resolution_scope;
        let (scope, declaring) = match scope_token.table() {
            _ if scope_token.is_nil() => (ResolutionScope::Module(self.scope.clone()), None),
            TableId::Module => (ResolutionScope::Module(self.scope.clone()), None),
            TableId::ModuleRef => (
                ResolutionScope::ModuleRef(self.module_reference_locked(reader, scope_token)?),
                None,
            ),
            TableId::AssemblyRef => (
                ResolutionScope::AssemblyRef(self.assembly_reference_locked(reader, scope_token)?),
                None,
            ),
            TableId::TypeRef => {
                let declaring = reader.frame(|reader| self.type_reference_row(reader, scope_token.row()))?;
                (declaring.scope.clone(), Some(declaring))
            }
            other => {
                return Err(malformed_error!(
                    "TypeRef row {} has a {} resolution scope",
                    row,
                    other
                ))
            }
        };

        let mut reference =
            TypeReference::new(self.id, scope, raw.namespace, raw.name).with_token(token);
        if let Some(declaring) = declaring {
            reference = reference.with_declaring_type(declaring);
        }

        let reference = Arc::new(reference);
        self.tokens
            .insert(token, Entity::TypeReference(reference.clone()));
        Ok(reference)
    }

    /// The `TypeSpec` at `row`, realized in the active decode context
    pub(crate) fn type_specification(&self, reader: &mut ModuleReader, row: u32) -> Result<TypeSig> {
        let raw = reader.decode_at(TableId::TypeSpec, row)?.into_type_spec()?;
        reader.frame(|reader| self.realize_type(reader, &raw.signature))
    }

    /// The `MemberRef` at `row`, realized once per module
    pub(crate) fn member_reference(&self, reader: &mut ModuleReader, row: u32) -> Result<MemberReference> {
        let token = Token::new(TableId::MemberRef, row);
        if let Some(Entity::MemberReference(reference)) =
            self.tokens.get(&token).map(|entry| entry.value().clone())
        {
            return Ok(reference);
        }

        let raw = reader.decode_at(TableId::MemberRef, row)?.into_member_ref()?;
        let reference = reader.frame(|reader| {
            reader.set_type_params(Vec::new());
            reader.set_method_params(Vec::new());

            let declaring_type = self.member_parent(reader, raw.class)?;
            reader.set_type_params(
                declaring_type
                    .element_handle()
                    .map(TypeHandle::generic_params)
                    .unwrap_or_default(),
            );

            Ok(match &raw.signature {
                SignatureMember::Field(field_type) => {
                    let field_type = self.realize_type(reader, field_type)?;
                    MemberReference::Field(Arc::new(FieldReference {
                        module: self.id,
                        token,
                        name: raw.name.clone(),
                        declaring_type,
                        field_type,
                    }))
                }
                SignatureMember::Method(sig) => {
                    let generic_parameters =
                        placeholder_names(GenericParamKind::Method, sig.generic_param_count);
                    reader.set_method_params(GenericParam::list(
                        GenericParamKind::Method,
                        &generic_parameters,
                        GenericOwner {
                            module: Some(self.id),
                            name: normalized_method_name(&declaring_type, &raw.name),
                        },
                    ));
                    let signature = self.realize_method_sig(reader, sig)?;
                    MemberReference::Method(Arc::new(MethodReference {
                        module: self.id,
                        token,
                        name: raw.name.clone(),
                        declaring_type,
                        signature,
                        generic_parameters,
                    }))
                }
            })
        })?;

        self.tokens
            .insert(token, Entity::MemberReference(reference.clone()));
        Ok(reference)
    }

    /// The declaring type named by a `MemberRefParent` coded index
    fn member_parent(&self, reader: &mut ModuleReader, class: Token) -> Result<TypeSig> {
        match class.table() {
            TableId::TypeDef | TableId::TypeRef | TableId::TypeSpec => {
                self.type_sig_from_token(reader, class, false)
            }
            TableId::ModuleRef => {
                let module_ref = self.module_reference_locked(reader, class)?;
                let global = TypeReference::new(
                    self.id,
                    ResolutionScope::ModuleRef(module_ref),
                    "",
                    "<Module>",
                );
                Ok(TypeSig::Named(TypeHandle::Reference(Arc::new(global))))
            }
            TableId::MethodDef => {
                let method = self.method_definition_locked(reader, class)?;
                method
                    .declaring_type()
                    .map(|declaring| TypeSig::Named(TypeHandle::Definition(declaring)))
                    .ok_or_else(|| malformed_error!("Method {} has no declaring type", class))
            }
            other => Err(malformed_error!("Invalid MemberRef parent table {}", other)),
        }
    }

    /// The `MethodSpec` at `row`, realized once per module
    pub(crate) fn method_specification(
        &self,
        reader: &mut ModuleReader,
        row: u32,
    ) -> Result<GenericInstanceMethodRc> {
        let token = Token::new(TableId::MethodSpec, row);
        if let Some(Entity::MethodSpecification(instance)) =
            self.tokens.get(&token).map(|entry| entry.value().clone())
        {
            return Ok(instance);
        }

        let raw = reader.decode_at(TableId::MethodSpec, row)?.into_method_spec()?;
        let instance = reader.frame(|reader| {
            let element = self.method_handle(reader, raw.method)?;
            if matches!(element, MethodHandle::Instance(_)) {
                return Err(malformed_error!("MethodSpec {} instantiates a MethodSpec", token));
            }

            reader.set_method_params(element.generic_params());
            let arguments = raw
                .instantiation
                .iter()
                .map(|argument| self.realize_type(reader, argument))
                .collect::<Result<Vec<_>>>()?;

            Ok(Arc::new(GenericInstanceMethod {
                module: self.id,
                token,
                element,
                arguments,
            }))
        })?;

        self.tokens
            .insert(token, Entity::MethodSpecification(instance.clone()));
        Ok(instance)
    }

    /// A `MethodDef`, method `MemberRef` or `MethodSpec` as a handle
    pub(crate) fn method_handle(&self, reader: &mut ModuleReader, token: Token) -> Result<MethodHandle> {
        match token.table() {
            TableId::MethodDef => Ok(MethodHandle::Definition(
                self.method_definition_locked(reader, token)?,
            )),
            TableId::MemberRef => match self.member_reference(reader, token.row())? {
                MemberReference::Method(method) => Ok(MethodHandle::Reference(method)),
                MemberReference::Field(_) => Err(malformed_error!(
                    "MemberRef {} is a field where a method was expected",
                    token
                )),
            },
            TableId::MethodSpec => Ok(MethodHandle::Instance(
                self.method_specification(reader, token.row())?,
            )),
            other => Err(malformed_error!("Expected a method token, got a {} token", other)),
        }
    }

    pub(crate) fn read_assembly_references(
        &self,
        reader: &mut ModuleReader,
    ) -> Result<boxcar::Vec<AssemblyNameRc>> {
        let references = boxcar::Vec::new();
        reader.for_each_table_row(TableId::AssemblyRef, |_, row, raw| {
            let raw = raw.into_assembly_ref()?;
            let token = Token::new(TableId::AssemblyRef, row);
            references.push(Arc::new(AssemblyNameReference::from_assembly_ref(&raw, token)));
            Ok(())
        })?;
        Ok(references)
    }

    pub(crate) fn assembly_reference_locked(
        &self,
        reader: &mut ModuleReader,
        token: Token,
    ) -> Result<AssemblyNameRc> {
        let references =
            self.assembly_references
                .get_or_read_locked(self, reader, Module::read_assembly_references)?;
        find_by_token(&references, token, |reference| reference.token)
    }

    pub(crate) fn read_module_references(
        &self,
        reader: &mut ModuleReader,
    ) -> Result<boxcar::Vec<ModuleReferenceRc>> {
        let references = boxcar::Vec::new();
        reader.for_each_table_row(TableId::ModuleRef, |_, row, raw| {
            references.push(Arc::new(ModuleReference {
                token: Token::new(TableId::ModuleRef, row),
                name: raw.into_module_ref()?.name,
            }));
            Ok(())
        })?;
        Ok(references)
    }

    pub(crate) fn module_reference_locked(
        &self,
        reader: &mut ModuleReader,
        token: Token,
    ) -> Result<ModuleReferenceRc> {
        let references =
            self.module_references
                .get_or_read_locked(self, reader, Module::read_module_references)?;
        find_by_token(&references, token, |reference| reference.token)
    }

    pub(crate) fn read_resources(&self, reader: &mut ModuleReader) -> Result<boxcar::Vec<ResourceRc>> {
        let resources = boxcar::Vec::new();
        reader.for_each_table_row(TableId::ManifestResource, |reader, row, raw| {
            let raw = raw.into_manifest_resource()?;
            let implementation = raw.implementation;
            let kind = match implementation.table() {
                _ if implementation.is_nil() => ResourceKind::Embedded { offset: raw.offset },
                TableId::File => {
                    let file = reader
                        .decode_at(TableId::File, implementation.row())?
                        .into_file()?;
                    ResourceKind::LinkedFile {
                        file: file.name,
                        hash: file.hash_value,
                    }
                }
                TableId::AssemblyRef => ResourceKind::AssemblyLinked(
                    self.assembly_reference_locked(reader, implementation)?,
                ),
                other => {
                    return Err(malformed_error!(
                        "ManifestResource row {} is implemented by a {} row",
                        row,
                        other
                    ))
                }
            };

            resources.push(Arc::new(Resource {
                token: Token::new(TableId::ManifestResource, row),
                name: raw.name,
                flags: ManifestResourceAttributes::from_bits_retain(raw.flags),
                kind,
            }));
            Ok(())
        })?;
        Ok(resources)
    }

    /// True if the `File` table lists a file without metadata (a linked resource file)
    pub(crate) fn read_has_file_resource(&self, reader: &mut ModuleReader) -> Result<bool> {
        let mut found = false;
        reader.for_each_table_row(TableId::File, |_, _, raw| {
            found |= raw.into_file()?.flags & FILE_CONTAINS_NO_METADATA != 0;
            Ok(())
        })?;
        Ok(found)
    }

    pub(crate) fn read_exported_types(
        &self,
        reader: &mut ModuleReader,
    ) -> Result<boxcar::Vec<ExportedTypeRc>> {
        let mut rows = Vec::new();
        reader.for_each_table_row(TableId::ExportedType, |_, _, raw| {
            rows.push(raw.into_exported_type()?);
            Ok(())
        })?;

        let mut built: Vec<Option<ExportedTypeRc>> = vec![None; rows.len()];
        for index in 0..rows.len() {
            self.build_exported_type(reader, &rows, &mut built, index, 0)?;
        }

        let exported = boxcar::Vec::new();
        for entry in built.into_iter().flatten() {
            exported.push(entry);
        }
        Ok(exported)
    }

    fn build_exported_type(
        &self,
        reader: &mut ModuleReader,
        rows: &[ExportedTypeRow],
        built: &mut [Option<ExportedTypeRc>],
        index: usize,
        depth: usize,
    ) -> Result<ExportedTypeRc> {
        if let Some(existing) = &built[index] {
            return Ok(existing.clone());
        }
        if depth > rows.len() {
            return Err(malformed_error!("ExportedType nesting forms a cycle"));
        }

        let row = &rows[index];
        let implementation = match row.implementation.table() {
            TableId::File => {
                let file = reader
                    .decode_at(TableId::File, row.implementation.row())?
                    .into_file()?;
                ExportedTypeImplementation::File(file.name)
            }
            TableId::AssemblyRef => ExportedTypeImplementation::Assembly(
                self.assembly_reference_locked(reader, row.implementation)?,
            ),
            TableId::ExportedType => {
                let declaring = (row.implementation.row() as usize)
                    .checked_sub(1)
                    .filter(|declaring| *declaring < rows.len())
                    .ok_or_else(|| malformed_error!("Invalid ExportedType {}", row.implementation))?;
                ExportedTypeImplementation::Declaring(
                    self.build_exported_type(reader, rows, built, declaring, depth + 1)?,
                )
            }
            other => {
                return Err(malformed_error!(
                    "ExportedType row {} is implemented by a {} row",
                    index + 1,
                    other
                ))
            }
        };

        let exported = Arc::new(ExportedType {
            token: Token::new(TableId::ExportedType, u32::try_from(index + 1).unwrap_or(u32::MAX)),
            flags: row.flags,
            namespace: row.namespace.clone(),
            name: row.name.clone(),
            type_def_id: row.type_def_id,
            implementation,
        });
        built[index] = Some(exported.clone());
        Ok(exported)
    }

    /// The `CustomAttribute` at `row`
    pub(crate) fn custom_attribute(&self, reader: &mut ModuleReader, row: u32) -> Result<CustomAttributeRc> {
        let raw = reader
            .decode_at(TableId::CustomAttribute, row)?
            .into_custom_attribute()?;
        self.realize_custom_attribute(reader, row, raw.parent, raw.constructor, raw.value)
    }

    fn realize_custom_attribute(
        &self,
        reader: &mut ModuleReader,
        row: u32,
        parent: Token,
        constructor: Token,
        blob: Vec<u8>,
    ) -> Result<CustomAttributeRc> {
        let constructor = reader.frame(|reader| self.method_handle(reader, constructor))?;
        Ok(Arc::new(CustomAttribute {
            token: Token::new(TableId::CustomAttribute, row),
            parent,
            constructor,
            blob,
        }))
    }

    /// Custom attributes whose parent is `parent`, or all of them
    pub(crate) fn read_custom_attributes_of(
        &self,
        reader: &mut ModuleReader,
        parent: Option<Token>,
    ) -> Result<boxcar::Vec<CustomAttributeRc>> {
        let attributes = boxcar::Vec::new();
        reader.for_each_table_row(TableId::CustomAttribute, |reader, row, raw| {
            let raw = raw.into_custom_attribute()?;
            if parent.map_or(true, |parent| parent == raw.parent) {
                attributes.push(self.realize_custom_attribute(
                    reader,
                    row,
                    raw.parent,
                    raw.constructor,
                    raw.value,
                )?);
            }
            Ok(())
        })?;
        Ok(attributes)
    }

    /// True if any `CustomAttribute` row is attached to the module, without realizing
    /// constructors
    pub(crate) fn read_has_module_custom_attributes(&self, reader: &mut ModuleReader) -> Result<bool> {
        let module = Token::new(TableId::Module, 1);
        let mut found = false;
        reader.for_each_table_row(TableId::CustomAttribute, |_, _, raw| {
            found |= raw.into_custom_attribute()?.parent == module;
            Ok(())
        })?;
        Ok(found)
    }

    pub(crate) fn read_module_custom_attributes(
        &self,
        reader: &mut ModuleReader,
    ) -> Result<boxcar::Vec<CustomAttributeRc>> {
        self.read_custom_attributes_of(reader, Some(Token::new(TableId::Module, 1)))
    }

    pub(crate) fn read_entry_point(
        &self,
        reader: &mut ModuleReader,
    ) -> Result<std::sync::RwLock<Option<MethodDefRc>>> {
        let token = self.entry_point_token;
        let method = if token.is_table(TableId::MethodDef) && !token.is_nil() {
            Some(self.method_definition_locked(reader, token)?)
        } else {
            None
        };
        Ok(std::sync::RwLock::new(method))
    }

    /// The generic parameter at `row` of the `GenericParam` table
    fn generic_parameter(&self, reader: &mut ModuleReader, row: u32) -> Result<GenericParam> {
        let raw = reader
            .decode_at(TableId::GenericParam, row)?
            .into_generic_param()?;
        let params = match raw.owner.table() {
            TableId::TypeDef => self.type_definition_locked(reader, raw.owner)?.generic_params(),
            TableId::MethodDef => self.method_definition_locked(reader, raw.owner)?.generic_params(),
            other => return Err(malformed_error!("Invalid generic parameter owner {}", other)),
        };

        params
            .into_iter()
            .find(|param| param.position == u32::from(raw.number))
            .ok_or_else(|| malformed_error!("Generic parameter row {} is not bound", row))
    }

    /// Resolve a token to its entity; the caller has checked the row is in range
    pub(crate) fn lookup_token_locked(
        &self,
        reader: &mut ModuleReader,
        token: Token,
    ) -> Result<Option<Entity>> {
        trace!(module = %self.name, %token, "lookup token");
        let row = token.row();

        Ok(match token.table() {
            TableId::Module => Some(Entity::Module(self.scope.clone())),
            TableId::TypeDef | TableId::Field | TableId::MethodDef | TableId::Param => {
                self.definition_locked(reader, token)?
            }
            TableId::TypeRef => Some(Entity::TypeReference(self.type_reference_row(reader, row)?)),
            TableId::TypeSpec => Some(Entity::TypeSpecification(
                reader.frame(|reader| {
                    reader.set_type_params(Vec::new());
                    reader.set_method_params(Vec::new());
                    self.type_specification(reader, row)
                })?,
            )),
            TableId::MemberRef => Some(Entity::MemberReference(self.member_reference(reader, row)?)),
            TableId::MethodSpec => Some(Entity::MethodSpecification(
                self.method_specification(reader, row)?,
            )),
            TableId::CustomAttribute => {
                Some(Entity::CustomAttribute(self.custom_attribute(reader, row)?))
            }
            TableId::ModuleRef => Some(Entity::ModuleReference(
                self.module_reference_locked(reader, token)?,
            )),
            TableId::Assembly => self.assembly.clone().map(Entity::Assembly),
            TableId::AssemblyRef => Some(Entity::AssemblyReference(
                self.assembly_reference_locked(reader, token)?,
            )),
            TableId::ExportedType => {
                let exported = self.exported_types.get_or_read_locked(
                    self,
                    reader,
                    Module::read_exported_types,
                )?;
                Some(Entity::ExportedType(find_by_token(&exported, token, |e| e.token)?))
            }
            TableId::ManifestResource => {
                let resources =
                    self.resources
                        .get_or_read_locked(self, reader, Module::read_resources)?;
                Some(Entity::Resource(find_by_token(&resources, token, |r| r.token)?))
            }
            TableId::GenericParam => Some(Entity::GenericParameter(
                self.generic_parameter(reader, row)?,
            )),
            TableId::FieldPtr
            | TableId::MethodPtr
            | TableId::ParamPtr
            | TableId::InterfaceImpl
            | TableId::Constant
            | TableId::FieldMarshal
            | TableId::DeclSecurity
            | TableId::ClassLayout
            | TableId::FieldLayout
            | TableId::StandAloneSig
            | TableId::EventMap
            | TableId::EventPtr
            | TableId::Event
            | TableId::PropertyMap
            | TableId::PropertyPtr
            | TableId::Property
            | TableId::MethodSemantics
            | TableId::MethodImpl
            | TableId::ImplMap
            | TableId::FieldRVA
            | TableId::EncLog
            | TableId::EncMap
            | TableId::AssemblyProcessor
            | TableId::AssemblyOS
            | TableId::AssemblyRefProcessor
            | TableId::AssemblyRefOS
            | TableId::File
            | TableId::NestedClass
            | TableId::GenericParamConstraint
            | TableId::Document
            | TableId::MethodDebugInformation
            | TableId::LocalScope
            | TableId::LocalVariable
            | TableId::LocalConstant
            | TableId::ImportScope
            | TableId::StateMachineMethod
            | TableId::CustomDebugInformation => None,
        })
    }

}

fn type_at(defs: &[TypeDefRc], row: u32) -> Result<&TypeDefRc> {
    (row as usize)
        .checked_sub(1)
        .and_then(|index| defs.get(index))
        .ok_or_else(|| malformed_error!("NestedClass refers to missing TypeDef row {}", row))
}

fn bind(params: &[GenericParam], kind: GenericParamKind, index: u32) -> GenericParam {
    params
        .get(index as usize)
        .cloned()
        .unwrap_or_else(|| GenericParam::unbound(kind, index))
}

/// Entry of a collection realized from a table, by token; rows are stored in table order
fn find_by_token<T>(
    items: &boxcar::Vec<Arc<T>>,
    token: Token,
    token_of: impl Fn(&T) -> Token,
) -> Result<Arc<T>> {
    let by_position = (token.row() as usize)
        .checked_sub(1)
        .and_then(|index| items.get(index))
        .filter(|item| token_of(item) == token);

    by_position
        .or_else(|| items.iter().map(|(_, item)| item).find(|item| token_of(item) == token))
        .cloned()
        .ok_or_else(|| malformed_error!("No entity for token {}", token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        image::MemoryImage,
        tables::{ModuleRefRow, RawRow},
    };

    fn reader_with_module_refs() -> ModuleReader {
        let image = MemoryImage::builder()
            .row(RawRow::ModuleRef(ModuleRefRow { name: "a.dll".into() }))
            .row(RawRow::ModuleRef(ModuleRefRow { name: "b.dll".into() }))
            .row(RawRow::ModuleRef(ModuleRefRow { name: "c.dll".into() }))
            .build();
        ModuleReader::new(Some(Box::new(image)))
    }

    #[test]
    fn frame_restores_position_and_context() {
        let mut reader = reader_with_module_refs();
        reader.image().unwrap().seek(TableId::ModuleRef, 1).unwrap();
        reader.set_type_params(vec![GenericParam::unbound(GenericParamKind::Type, 0)]);

        let inner = reader
            .frame(|reader| {
                reader.set_type_params(Vec::new());
                reader.image()?.decode_row(TableId::ModuleRef, 3)
            })
            .unwrap();
        assert_eq!(inner.into_module_ref().unwrap().name, "c.dll");

        assert_eq!(reader.context().type_params.len(), 1);
        let next = reader.image().unwrap().read_row().unwrap();
        assert_eq!(next.into_module_ref().unwrap().name, "a.dll");
    }

    #[test]
    fn frame_restores_on_error() {
        let mut reader = reader_with_module_refs();
        reader.image().unwrap().seek(TableId::ModuleRef, 2).unwrap();

        let result: Result<()> = reader.frame(|reader| {
            reader.image()?.seek(TableId::ModuleRef, 3)?;
            Err(malformed_error!("broken"))
        });
        assert!(result.is_err());

        let next = reader.image().unwrap().read_row().unwrap();
        assert_eq!(next.into_module_ref().unwrap().name, "b.dll");
    }

    #[test]
    fn frame_depth_is_bounded() {
        fn recurse(reader: &mut ModuleReader) -> Result<()> {
            reader.frame(recurse)
        }

        let mut reader = reader_with_module_refs();
        assert!(matches!(
            recurse(&mut reader),
            Err(Error::RecursionLimit(MAX_FRAME_DEPTH))
        ));
        assert_eq!(reader.depth, 0);
    }

    #[test]
    fn run_end_clamps() {
        assert_eq!(run_end(None, 4), 5);
        assert_eq!(run_end(Some(3), 4), 3);
        assert_eq!(run_end(Some(9), 4), 5);
    }

    #[test]
    fn bind_falls_back_to_unbound() {
        let params = vec![GenericParam::unbound(GenericParamKind::Type, 0)];
        assert_eq!(bind(&params, GenericParamKind::Type, 0), params[0]);
        assert_eq!(bind(&params, GenericParamKind::Type, 1).name, "!1");
    }

    #[test]
    fn decode_without_image_is_disposed() {
        let mut reader = ModuleReader::new(None);
        assert!(!reader.has_image());
        assert!(matches!(
            reader.decode_at(TableId::TypeDef, 1),
            Err(Error::Disposed)
        ));
    }
}
