//! Reverse direction: records -> domain objects
//!
//! Records may reference each other by name in any order, so the reverse
//! run works in two passes:
//!
//! 1. **allocate**: every record with a registered rule and its required
//!    fields present becomes a domain object with a fresh handle and its
//!    scalar fields set. Names are indexed as objects are allocated.
//! 2. **link**: each allocated object's link rule resolves its name
//!    references through a [`LinkResolver`]. Cycles need no special care
//!    because every target already exists.
//!
//! A record that fails allocation is skipped; references to it resolve to
//! nothing and are reported as unresolved.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, error, info, warn};

use crate::config::TranslationOptions;
use crate::error::{FailureKind, MappingError, Result, Severity};
use crate::handle::Handle;
use crate::model::{DomainObject, ObjectStore};
use crate::output::{FailureSubject, ObjectFailure};
use crate::record::{FieldValue, TargetRecord};

/// Builds an object (scalars only) from a record
pub type AllocateRule<O> = fn(&TargetRecord, Handle) -> std::result::Result<O, MappingError>;

/// Fills an allocated object's references
pub type LinkRule<O> =
    fn(&TargetRecord, &mut O, &mut LinkResolver) -> std::result::Result<(), MappingError>;

/// Rules for one record tag
pub struct ReverseEntry<O> {
    pub allocate: AllocateRule<O>,
    pub link: Option<LinkRule<O>>,
}

impl<O> Clone for ReverseEntry<O> {
    fn clone(&self) -> Self {
        Self {
            allocate: self.allocate,
            link: self.link,
        }
    }
}

impl<O> fmt::Debug for ReverseEntry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverseEntry")
            .field("links", &self.link.is_some())
            .finish()
    }
}

/// Tag -> reverse rules
pub trait ReverseDispatch<O> {
    fn entry(&self, tag: &str) -> Option<ReverseEntry<O>>;
}

/// Runtime-registered reverse rules
pub struct ReverseTable<O> {
    entries: HashMap<String, ReverseEntry<O>>,
}

impl<O> Default for ReverseTable<O> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<O> ReverseTable<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register allocate and link rules for a tag
    pub fn register(&mut self, tag: impl Into<String>, allocate: AllocateRule<O>, link: LinkRule<O>) {
        self.entries.insert(
            tag.into(),
            ReverseEntry {
                allocate,
                link: Some(link),
            },
        );
    }

    /// Register a tag whose records carry no references
    pub fn register_scalar(&mut self, tag: impl Into<String>, allocate: AllocateRule<O>) {
        self.entries
            .insert(tag.into(), ReverseEntry { allocate, link: None });
    }

    pub fn with_rules(mut self, tag: impl Into<String>, allocate: AllocateRule<O>, link: LinkRule<O>) -> Self {
        self.register(tag, allocate, link);
        self
    }

    pub fn with_scalar(mut self, tag: impl Into<String>, allocate: AllocateRule<O>) -> Self {
        self.register_scalar(tag, allocate);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<O> ReverseDispatch<O> for ReverseTable<O> {
    fn entry(&self, tag: &str) -> Option<ReverseEntry<O>> {
        self.entries.get(tag).cloned()
    }
}

// =============================================================================
// Link Resolver
// =============================================================================

/// Name -> handle index built during allocation
#[derive(Debug, Default)]
pub struct LinkResolver {
    by_tag: HashMap<(String, String), Handle>,
    global: HashMap<String, Handle>,
    case_insensitive: bool,
    misses: Vec<String>,
}

impl LinkResolver {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            ..Self::default()
        }
    }

    fn fold(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Index an allocated record's name. First record with a name wins.
    pub fn insert(&mut self, tag: &str, name: &str, handle: Handle) {
        let folded = self.fold(name);
        self.by_tag
            .entry((tag.to_string(), folded.clone()))
            .or_insert(handle);
        self.global.entry(folded).or_insert(handle);
    }

    /// Resolve a name in any tag. Blank names resolve to nothing silently.
    pub fn resolve(&mut self, name: &str) -> Option<Handle> {
        if name.trim().is_empty() {
            return None;
        }
        let found = self.global.get(&self.fold(name)).copied();
        if found.is_none() {
            self.misses.push(name.to_string());
        }
        found
    }

    /// Resolve a name among records of one tag
    pub fn resolve_in(&mut self, tag: &str, name: &str) -> Option<Handle> {
        if name.trim().is_empty() {
            return None;
        }
        let key = (tag.to_string(), self.fold(name));
        let found = self.by_tag.get(&key).copied();
        if found.is_none() {
            self.misses.push(format!("{} '{}'", tag, name));
        }
        found
    }

    fn resolve_value(&mut self, value: Option<&FieldValue>) -> Option<Handle> {
        match value? {
            FieldValue::Reference(name) | FieldValue::Text(name) => self.resolve(name),
            _ => None,
        }
    }

    /// Resolve a fixed reference field of a record
    pub fn resolve_field(&mut self, record: &TargetRecord, field: &str) -> Option<Handle> {
        self.resolve_value(record.get(field))
    }

    /// Resolve one field of every group tuple, in order. Misses are
    /// reported and dropped.
    pub fn resolve_group_field(&mut self, record: &TargetRecord, field: &str) -> Vec<Handle> {
        (0..record.group_count())
            .filter_map(|g| self.resolve_value(record.group_value(g, field)))
            .collect()
    }

    fn take_misses(&mut self) -> Vec<String> {
        std::mem::take(&mut self.misses)
    }
}

// =============================================================================
// Reverse Translator
// =============================================================================

/// Result of a reverse run
#[derive(Debug)]
pub struct ReverseReport<O> {
    pub store: ObjectStore<O>,
    pub failures: Vec<ObjectFailure>,
    /// `handles[i]` is the object allocated for input record `i`
    pub handles: Vec<Option<Handle>>,
}

impl<O: DomainObject> ReverseReport<O> {
    pub fn warnings(&self) -> impl Iterator<Item = &ObjectFailure> {
        self.failures
            .iter()
            .filter(|f| f.severity() == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ObjectFailure> {
        self.failures
            .iter()
            .filter(|f| f.severity() == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Object built from input record `index`
    pub fn object_for(&self, index: usize) -> Option<&O> {
        self.handles
            .get(index)
            .copied()
            .flatten()
            .and_then(|h| self.store.get(h))
    }
}

/// Two-pass records -> objects translator
pub struct ReverseTranslator<'a, O> {
    dispatch: &'a dyn ReverseDispatch<O>,
    options: TranslationOptions,
    case_insensitive: bool,
}

impl<'a, O: DomainObject> ReverseTranslator<'a, O> {
    pub fn new(dispatch: &'a dyn ReverseDispatch<O>) -> Self {
        Self {
            dispatch,
            options: TranslationOptions::default(),
            case_insensitive: true,
        }
    }

    pub fn with_options(mut self, options: TranslationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    pub fn translate(&self, records: &[TargetRecord]) -> Result<ReverseReport<O>> {
        let mut store = ObjectStore::new();
        let mut failures = Vec::new();
        let mut handles = Vec::with_capacity(records.len());
        let mut resolver = LinkResolver::new(self.case_insensitive);
        let mut allocated: Vec<(usize, Handle, ReverseEntry<O>)> = Vec::new();

        // Pass 1: allocate
        for (index, record) in records.iter().enumerate() {
            let subject = || FailureSubject::Record {
                index,
                tag: record.tag().to_string(),
                name: record.name().map(str::to_string),
            };

            let Some(entry) = self.dispatch.entry(record.tag()) else {
                warn!(index, tag = record.tag(), "no reverse rule for record tag");
                failures.push(ObjectFailure {
                    subject: subject(),
                    kind: FailureKind::UnsupportedType,
                    message: format!("no reverse rule for {}", record.tag()),
                });
                handles.push(None);
                continue;
            };

            if self.options.validate_required {
                let missing = record.missing_required();
                if !missing.is_empty() {
                    let message = format!(
                        "{} is missing required field(s): {}",
                        record.tag(),
                        missing.join(", ")
                    );
                    error!(index, "{}", message);
                    failures.push(ObjectFailure {
                        subject: subject(),
                        kind: FailureKind::MissingRequiredField,
                        message,
                    });
                    handles.push(None);
                    continue;
                }
            }

            match (entry.allocate)(record, Handle::new()) {
                Ok(object) => {
                    let handle = store.insert(object)?;
                    if let Some(name) = record.name() {
                        resolver.insert(record.tag(), name, handle);
                    }
                    handles.push(Some(handle));
                    allocated.push((index, handle, entry));
                }
                Err(err) => {
                    let (kind, message) = match err {
                        MappingError::Fatal(e) => return Err(e),
                        MappingError::MissingRequiredField { field } => (
                            FailureKind::MissingRequiredField,
                            format!("{} is missing required field '{}'", record.tag(), field),
                        ),
                        MappingError::Record(e) => (FailureKind::InvalidRecord, e.to_string()),
                    };
                    error!(index, kind = %kind, "{}", message);
                    failures.push(ObjectFailure {
                        subject: subject(),
                        kind,
                        message,
                    });
                    handles.push(None);
                }
            }
        }
        debug!(allocated = allocated.len(), "allocation pass finished");

        // Pass 2: link
        for (index, handle, entry) in allocated {
            let Some(link) = entry.link else {
                continue;
            };
            let record = &records[index];
            let Some(object) = store.get_mut(handle) else {
                continue;
            };
            let linked = link(record, object, &mut resolver);

            for name in resolver.take_misses() {
                let message = format!("{} references '{}', which has no object", record.tag(), name);
                warn!(handle = %handle, "{}", message);
                failures.push(ObjectFailure::object(
                    handle,
                    FailureKind::UnresolvedReference,
                    message,
                ));
            }

            match linked {
                Ok(()) => {}
                Err(MappingError::Fatal(e)) => return Err(e),
                Err(MappingError::MissingRequiredField { field }) => {
                    failures.push(ObjectFailure::object(
                        handle,
                        FailureKind::MissingRequiredField,
                        format!("{} could not link required field '{}'", record.tag(), field),
                    ));
                }
                Err(MappingError::Record(e)) => {
                    failures.push(ObjectFailure::object(
                        handle,
                        FailureKind::InvalidRecord,
                        e.to_string(),
                    ));
                }
            }
        }

        info!(
            records = records.len(),
            objects = store.len(),
            failures = failures.len(),
            "reverse translation finished"
        );
        Ok(ReverseReport {
            store,
            failures,
            handles,
        })
    }
}

/// Translate records back into domain objects
pub fn translate_reverse<O: DomainObject>(
    records: &[TargetRecord],
    dispatch: &dyn ReverseDispatch<O>,
    options: &TranslationOptions,
) -> Result<ReverseReport<O>> {
    ReverseTranslator::new(dispatch)
        .with_options(options.clone())
        .translate(records)
}
