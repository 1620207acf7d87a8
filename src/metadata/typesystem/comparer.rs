//! Structural signature equality across modules.
//!
//! Signatures realized in two different modules never share handles, so resolution
//! compares them by shape: element kind, names and namespaces of named types (including
//! their enclosing types), generic parameter positions, generic arguments, modifiers and
//! array shapes. Resolution scopes are deliberately not compared: a reference and the
//! definition it names live in different scopes by construction.

use crate::metadata::typesystem::{MethodSig, TypeHandle, TypeSig};

/// True if the two signatures denote the same type
#[must_use]
pub fn are_same_type(a: &TypeSig, b: &TypeSig) -> bool {
    match (a, b) {
        (TypeSig::Primitive(a), TypeSig::Primitive(b)) => a == b,
        (TypeSig::Named(a), TypeSig::Named(b)) => are_same_handle(a, b),
        (TypeSig::GenericInstance(a, a_args), TypeSig::GenericInstance(b, b_args)) => {
            are_same_handle(a, b) && are_same_list(a_args, b_args)
        }
        (TypeSig::GenericParam(a), TypeSig::GenericParam(b)) => {
            a.kind == b.kind && a.position == b.position
        }
        (TypeSig::SzArray(a), TypeSig::SzArray(b))
        | (TypeSig::Pointer(a), TypeSig::Pointer(b))
        | (TypeSig::ByRef(a), TypeSig::ByRef(b))
        | (TypeSig::Pinned(a), TypeSig::Pinned(b)) => are_same_type(a, b),
        (TypeSig::Array(a, a_shape), TypeSig::Array(b, b_shape)) => {
            a_shape.rank == b_shape.rank && are_same_type(a, b)
        }
        (
            TypeSig::Modified {
                required: a_required,
                modifier: a_modifier,
                element: a_element,
            },
            TypeSig::Modified {
                required: b_required,
                modifier: b_modifier,
                element: b_element,
            },
        ) => {
            a_required == b_required
                && are_same_handle(a_modifier, b_modifier)
                && are_same_type(a_element, b_element)
        }
        (TypeSig::FnPtr(a), TypeSig::FnPtr(b)) => are_same_method_sig(a, b),
        _ => false,
    }
}

/// True if the two handles name the same type
#[must_use]
pub fn are_same_handle(a: &TypeHandle, b: &TypeHandle) -> bool {
    if a == b {
        return true;
    }

    if a.name() != b.name() || a.namespace() != b.namespace() {
        return false;
    }

    match (a.declaring_type(), b.declaring_type()) {
        (None, None) => true,
        (Some(a), Some(b)) => are_same_handle(&a, &b),
        _ => false,
    }
}

/// Pairwise [`are_same_type`] over two lists of equal length
#[must_use]
pub fn are_same_list(a: &[TypeSig], b: &[TypeSig]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| are_same_type(a, b))
}

/// True if the two method signatures have the same calling convention, arity, return type
/// and parameters
#[must_use]
pub fn are_same_method_sig(a: &MethodSig, b: &MethodSig) -> bool {
    a.has_this == b.has_this
        && a.explicit_this == b.explicit_this
        && a.vararg == b.vararg
        && a.generic_arity == b.generic_arity
        && are_same_type(&a.return_type, &b.return_type)
        && are_same_list(&a.params, &b.params)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::{
        identity::{AssemblyNameReference, AssemblyVersion},
        module::ModuleId,
        typesystem::{
            ArrayShape, GenericParam, GenericParamKind, PrimitiveKind, ResolutionScope,
            TypeDefinition, TypeReference,
        },
    };

    fn reference(namespace: &str, name: &str) -> TypeHandle {
        let scope = ResolutionScope::AssemblyRef(Arc::new(AssemblyNameReference::new(
            "Lib",
            AssemblyVersion::ZERO,
        )));
        TypeHandle::Reference(Arc::new(TypeReference::new(
            ModuleId::next(),
            scope,
            namespace,
            name,
        )))
    }

    #[test]
    fn definition_matches_reference_by_name() {
        let def = TypeHandle::Definition(Arc::new(TypeDefinition::new("N", "T", 0)));
        assert!(are_same_handle(&def, &reference("N", "T")));
        assert!(!are_same_handle(&def, &reference("M", "T")));
        assert!(!are_same_handle(&def, &reference("N", "U")));
    }

    #[test]
    fn nested_must_match_declaring_type() {
        let outer = Arc::new(TypeDefinition::new("N", "Outer", 0));
        let inner = Arc::new(TypeDefinition::new("", "Inner", 0));
        outer.add_nested_type(inner.clone()).unwrap();

        let top_level = TypeHandle::Definition(Arc::new(TypeDefinition::new("", "Inner", 0)));
        assert!(!are_same_handle(&TypeHandle::Definition(inner), &top_level));
    }

    #[test]
    fn wrappers_must_line_up() {
        let int = || Box::new(TypeSig::Primitive(PrimitiveKind::Int32));
        let array_of_ptr = TypeSig::SzArray(Box::new(TypeSig::Pointer(int())));
        let ptr_to_array = TypeSig::Pointer(Box::new(TypeSig::SzArray(int())));

        assert!(are_same_type(&array_of_ptr, &array_of_ptr.clone()));
        assert!(!are_same_type(&array_of_ptr, &ptr_to_array));

        let rank2 = TypeSig::Array(int(), ArrayShape { rank: 2, ..Default::default() });
        let rank3 = TypeSig::Array(int(), ArrayShape { rank: 3, ..Default::default() });
        assert!(!are_same_type(&rank2, &rank3));
    }

    #[test]
    fn generic_params_compare_by_position() {
        let a = TypeSig::GenericParam(GenericParam::unbound(GenericParamKind::Type, 1));
        let mut named = GenericParam::unbound(GenericParamKind::Type, 1);
        named.name = "TValue".into();
        let b = TypeSig::GenericParam(named);
        let method = TypeSig::GenericParam(GenericParam::unbound(GenericParamKind::Method, 1));

        assert!(are_same_type(&a, &b));
        assert!(!are_same_type(&a, &method));
    }

    #[test]
    fn method_sig_calling_convention() {
        let static_sig = MethodSig::new(TypeSig::Primitive(PrimitiveKind::Void), vec![]);
        let instance_sig = static_sig.clone().instance();

        assert!(are_same_method_sig(&static_sig, &static_sig.clone()));
        assert!(!are_same_method_sig(&static_sig, &instance_sig));
    }
}
