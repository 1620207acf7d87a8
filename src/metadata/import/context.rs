use crate::{
    metadata::{
        module::ModuleId,
        typesystem::{GenericParam, MethodHandle, TypeDefRc, TypeHandle},
    },
    Error, Result,
};

/// A generic type or method of the target module that imported signatures are used in
#[derive(Debug, Clone)]
pub enum GenericProvider {
    /// A generic type; `VAR` parameters bind to its parameters
    Type(TypeHandle),
    /// A generic method; `MVAR` parameters bind to its parameters and `VAR` parameters to
    /// those of its declaring type
    Method(MethodHandle),
}

impl GenericProvider {
    /// Module owning the provider
    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        match self {
            GenericProvider::Type(handle) => handle.module_id(),
            GenericProvider::Method(handle) => handle.module_id(),
        }
    }

    /// Type full name or normalized method name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            GenericProvider::Type(handle) => handle.full_name(),
            GenericProvider::Method(handle) => handle.normalized_name(),
        }
    }
}

impl From<TypeDefRc> for GenericProvider {
    fn from(def: TypeDefRc) -> Self {
        GenericProvider::Type(TypeHandle::Definition(def))
    }
}

impl From<TypeHandle> for GenericProvider {
    fn from(handle: TypeHandle) -> Self {
        GenericProvider::Type(handle)
    }
}

impl From<MethodHandle> for GenericProvider {
    fn from(handle: MethodHandle) -> Self {
        GenericProvider::Method(handle)
    }
}

/// Parameters of one owner, keyed by the owner's name
#[derive(Debug, Clone)]
struct Owner {
    name: String,
    params: Vec<GenericParam>,
}

impl Owner {
    fn of_type(handle: &TypeHandle) -> Self {
        Owner {
            name: handle.full_name(),
            params: handle.generic_params(),
        }
    }
}

/// One level of an [`ImportGenericContext`]: the type whose parameters `VAR` binds to and
/// the method whose parameters `MVAR` binds to
#[derive(Debug, Clone, Default)]
pub struct GenericScope {
    type_owner: Option<Owner>,
    method_owner: Option<Owner>,
}

impl GenericScope {
    /// A scope for a type of the target module
    #[must_use]
    pub fn for_type(handle: &TypeHandle) -> Self {
        GenericScope {
            type_owner: Some(Owner::of_type(handle)),
            method_owner: None,
        }
    }

    /// A scope for a method: `name` is its normalized name, `params` its generic parameters
    /// and `declaring` its declaring type, if known
    #[must_use]
    pub fn for_method(name: String, params: Vec<GenericParam>, declaring: Option<&TypeHandle>) -> Self {
        GenericScope {
            type_owner: declaring.map(Owner::of_type),
            method_owner: Some(Owner { name, params }),
        }
    }

    /// A scope for a provider
    #[must_use]
    pub fn for_provider(provider: &GenericProvider) -> Self {
        match provider {
            GenericProvider::Type(handle) => GenericScope::for_type(handle),
            GenericProvider::Method(method) => {
                let declaring = method.declaring_type();
                GenericScope::for_method(
                    method.normalized_name(),
                    method.generic_params(),
                    declaring.as_ref().and_then(|declaring| declaring.element_handle()),
                )
            }
        }
    }
}

/// Maps generic parameters of imported signatures to the parameters of the matching owner
/// in the target module.
///
/// A stack of [`GenericScope`]s; lookups search from the innermost scope out and match
/// owners by type full name or normalized method name. Lives for a single import.
#[derive(Debug, Clone, Default)]
pub struct ImportGenericContext {
    stack: Vec<GenericScope>,
}

impl ImportGenericContext {
    /// A context holding `provider`, or an empty one
    #[must_use]
    pub fn new(provider: Option<&GenericProvider>) -> Self {
        ImportGenericContext {
            stack: provider.map(GenericScope::for_provider).into_iter().collect(),
        }
    }

    /// True if no scope is active
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Enter a scope
    pub fn push(&mut self, scope: GenericScope) {
        self.stack.push(scope);
    }

    /// Leave the innermost scope
    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// Run `f` with `scope` pushed; the scope is popped whether `f` succeeds or not
    ///
    /// # Errors
    /// Returns the error of `f`
    pub fn with_scope<T>(&mut self, scope: GenericScope, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.push(scope);
        let result = f(self);
        self.pop();
        result
    }

    /// Type parameter `position` of the type named `owner`
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if no active scope provides the parameter
    pub fn type_parameter(&self, owner: &str, position: u32) -> Result<GenericParam> {
        self.find(owner, position, |scope| scope.type_owner.as_ref())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "no generic context provides type parameter {position} of {owner}"
                ))
            })
    }

    /// Method parameter `position` of the method with normalized name `owner`
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if no active scope provides the parameter
    pub fn method_parameter(&self, owner: &str, position: u32) -> Result<GenericParam> {
        self.find(owner, position, |scope| scope.method_owner.as_ref())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "no generic context provides method parameter {position} of {owner}"
                ))
            })
    }

    fn find(
        &self,
        owner: &str,
        position: u32,
        select: impl Fn(&GenericScope) -> Option<&Owner>,
    ) -> Option<GenericParam> {
        self.stack
            .iter()
            .rev()
            .filter_map(select)
            .find(|candidate| candidate.name == owner)
            .and_then(|candidate| candidate.params.get(position as usize).cloned())
    }
}
