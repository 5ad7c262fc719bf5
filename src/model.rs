//! Domain model access
//!
//! The engine never inspects concrete domain types. It sees objects through
//! [`DomainObject`] (identity, variant, name, outgoing references) and finds
//! referenced objects through an [`ObjectSource`]. Scalar fields stay private
//! to the mapping rules that know the concrete type.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{BridgeError, Result};
use crate::handle::Handle;

/// A typed object in the source graph
pub trait DomainObject {
    /// Concrete variant discriminator. For a closed set this is a
    /// field-less enum; the generic domain uses a string.
    type Variant: Clone + Eq + Hash + Debug;

    fn handle(&self) -> Handle;

    fn variant(&self) -> Self::Variant;

    /// Preferred record name, if the object carries one
    fn name(&self) -> Option<&str>;

    /// Outgoing references: single-valued references first, then the
    /// members of ordered collections, each in declaration order.
    fn references(&self) -> Vec<Handle>;
}

/// Lookup of domain objects by handle
pub trait ObjectSource<O> {
    fn object(&self, handle: Handle) -> Option<&O>;
}

/// Insertion-ordered object container
#[derive(Debug, Clone)]
pub struct ObjectStore<O> {
    objects: Vec<O>,
    index: HashMap<Handle, usize>,
}

impl<O> Default for ObjectStore<O> {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<O: DomainObject> ObjectStore<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object. Handles are unique within a store.
    pub fn insert(&mut self, object: O) -> Result<Handle> {
        let handle = object.handle();
        if self.index.contains_key(&handle) {
            return Err(BridgeError::DuplicateHandle(handle));
        }
        self.index.insert(handle, self.objects.len());
        self.objects.push(object);
        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&O> {
        self.index.get(&handle).map(|&i| &self.objects[i])
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut O> {
        self.index.get(&handle).map(|&i| &mut self.objects[i])
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.index.contains_key(&handle)
    }

    /// Objects in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &O> {
        self.objects.iter()
    }

    /// Mutable access in insertion order. Handles must not change.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut O> {
        self.objects.iter_mut()
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.objects.iter().map(DomainObject::handle)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// First object whose name matches (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&O> {
        self.objects
            .iter()
            .find(|o| o.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn into_vec(self) -> Vec<O> {
        self.objects
    }
}

impl<O: DomainObject> ObjectSource<O> for ObjectStore<O> {
    fn object(&self, handle: Handle) -> Option<&O> {
        self.get(handle)
    }
}

impl<O: DomainObject> FromIterator<O> for ObjectStore<O> {
    /// Collects objects; a repeated handle keeps the first object
    fn from_iter<I: IntoIterator<Item = O>>(iter: I) -> Self {
        let mut store = Self::new();
        for object in iter {
            let _ = store.insert(object);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Node {
        handle: Handle,
        name: Option<String>,
        next: Option<Handle>,
    }

    impl DomainObject for Node {
        type Variant = &'static str;

        fn handle(&self) -> Handle {
            self.handle
        }

        fn variant(&self) -> Self::Variant {
            "Node"
        }

        fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        fn references(&self) -> Vec<Handle> {
            self.next.into_iter().collect()
        }
    }

    fn node(name: &str) -> Node {
        Node {
            handle: Handle::new(),
            name: Some(name.to_string()),
            next: None,
        }
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut store = ObjectStore::new();
        let a = store.insert(node("a")).unwrap();
        let b = store.insert(node("b")).unwrap();
        assert_eq!(store.handles().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(store.object(b).unwrap().name(), Some("b"));
    }

    #[test]
    fn test_duplicate_handle_rejected() {
        let mut store = ObjectStore::new();
        let a = node("a");
        store.insert(a.clone()).unwrap();
        assert!(matches!(store.insert(a), Err(BridgeError::DuplicateHandle(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_find_by_name_ignores_case() {
        let store: ObjectStore<Node> = vec![node("Office"), node("Lobby")].into_iter().collect();
        assert!(store.find_by_name("LOBBY").is_some());
        assert!(store.find_by_name("Attic").is_none());
    }
}
