//! Dispatch Table
//!
//! Maps a domain object's concrete variant to the record tag it produces and
//! the mapping rule that builds the record. Closed domains implement
//! [`Dispatch`] with an exhaustive `match`; open or data-driven domains use
//! [`DispatchTable`] and register rules at runtime.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::context::TranslationContext;
use crate::error::MappingError;
use crate::model::DomainObject;
use crate::record::TargetRecord;

/// Builds the record for one object, pulling referenced objects through the
/// context.
pub type MappingRule<O> =
    fn(&O, &mut TranslationContext<'_, O>) -> Result<TargetRecord, MappingError>;

/// Rule plus the tag its records are expected to carry
pub struct DispatchEntry<O: DomainObject> {
    pub tag: Cow<'static, str>,
    pub rule: MappingRule<O>,
}

impl<O: DomainObject> DispatchEntry<O> {
    pub fn new(tag: impl Into<Cow<'static, str>>, rule: MappingRule<O>) -> Self {
        Self {
            tag: tag.into(),
            rule,
        }
    }
}

impl<O: DomainObject> Clone for DispatchEntry<O> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            rule: self.rule,
        }
    }
}

impl<O: DomainObject> fmt::Debug for DispatchEntry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry").field("tag", &self.tag).finish()
    }
}

/// Variant -> rule lookup used by the translation context
pub trait Dispatch<O: DomainObject> {
    /// Entry for the object's variant; `None` means unsupported
    fn entry(&self, object: &O) -> Option<DispatchEntry<O>>;
}

/// Runtime-registered dispatch
pub struct DispatchTable<O: DomainObject> {
    entries: HashMap<O::Variant, DispatchEntry<O>>,
}

impl<O: DomainObject> Default for DispatchTable<O> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<O: DomainObject> DispatchTable<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rule for a variant. Returns the entry it replaced.
    pub fn register(
        &mut self,
        variant: O::Variant,
        tag: impl Into<Cow<'static, str>>,
        rule: MappingRule<O>,
    ) -> Option<DispatchEntry<O>> {
        let entry = DispatchEntry::new(tag, rule);
        tracing::trace!(variant = ?variant, tag = %entry.tag, "registered mapping rule");
        self.entries.insert(variant, entry)
    }

    /// Builder-style register
    pub fn with_rule(
        mut self,
        variant: O::Variant,
        tag: impl Into<Cow<'static, str>>,
        rule: MappingRule<O>,
    ) -> Self {
        self.register(variant, tag, rule);
        self
    }

    pub fn get(&self, variant: &O::Variant) -> Option<&DispatchEntry<O>> {
        self.entries.get(variant)
    }

    pub fn contains(&self, variant: &O::Variant) -> bool {
        self.entries.contains_key(variant)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<O: DomainObject> Dispatch<O> for DispatchTable<O> {
    fn entry(&self, object: &O) -> Option<DispatchEntry<O>> {
        self.entries.get(&object.variant()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;

    struct Thing {
        handle: Handle,
        kind: &'static str,
    }

    impl DomainObject for Thing {
        type Variant = &'static str;

        fn handle(&self) -> Handle {
            self.handle
        }

        fn variant(&self) -> Self::Variant {
            self.kind
        }

        fn name(&self) -> Option<&str> {
            None
        }

        fn references(&self) -> Vec<Handle> {
            Vec::new()
        }
    }

    fn rule(_: &Thing, ctx: &mut TranslationContext<'_, Thing>) -> Result<TargetRecord, MappingError> {
        Ok(ctx.create_record("Zone")?)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut table: DispatchTable<Thing> = DispatchTable::new();
        assert!(table.register("zone", "Zone", rule).is_none());
        assert!(table.register("zone", "Zone", rule).is_some());
        assert_eq!(table.len(), 1);

        let zone = Thing { handle: Handle::new(), kind: "zone" };
        let space = Thing { handle: Handle::new(), kind: "space" };
        assert_eq!(table.entry(&zone).unwrap().tag, "Zone");
        assert!(table.entry(&space).is_none());
    }
}
