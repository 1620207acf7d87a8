use dashmap::DashMap;

use crate::metadata::typesystem::TypeDefRc;

/// The top-level types of a module.
///
/// Types keep their insertion order (table order for types read from an image) and are
/// indexed by namespace and name. The collection stays appendable after it has been
/// realized; when two types share a name the first one keeps the index slot.
#[derive(Debug, Default)]
pub struct TypeCollection {
    types: boxcar::Vec<TypeDefRc>,
    index: DashMap<(String, String), TypeDefRc>,
}

impl TypeCollection {
    pub(crate) fn from_types(types: impl IntoIterator<Item = TypeDefRc>) -> Self {
        let collection = TypeCollection::default();
        for def in types {
            collection.push(def);
        }
        collection
    }

    pub(crate) fn push(&self, def: TypeDefRc) {
        self.index
            .entry((def.namespace.clone(), def.name.clone()))
            .or_insert_with(|| def.clone());
        self.types.push(def);
    }

    /// Number of top-level types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.count()
    }

    /// True if the module has no types at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-level types in order
    pub fn iter(&self) -> impl Iterator<Item = &TypeDefRc> {
        self.types.iter().map(|(_, def)| def)
    }

    /// Top-level type by namespace and name
    #[must_use]
    pub fn get(&self, namespace: &str, name: &str) -> Option<TypeDefRc> {
        self.index
            .get(&(namespace.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Top-level type by `Namespace.Name`
    #[must_use]
    pub fn get_by_full_name(&self, full_name: &str) -> Option<TypeDefRc> {
        match full_name.rsplit_once('.') {
            Some((namespace, name)) => self.get(namespace, name),
            None => self.get("", full_name),
        }
    }
}
