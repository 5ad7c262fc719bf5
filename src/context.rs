//! Translation Context
//!
//! The façade mapping rules call back into. A context is one translation
//! run: it owns the handle registry, the name allocator, the output and the
//! failure list, and borrows the object source, schema source and dispatch
//! for the run's lifetime.
//!
//! Every reference a rule needs goes through [`TranslationContext::translate_and_map`],
//! which either returns the cached binding, translates the object now, or
//! (when the object is already on the pull stack) returns a reserved stub
//! name so the cycle terminates.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, trace, warn};

use crate::config::{NamingConfig, TranslationOptions};
use crate::dispatch::Dispatch;
use crate::error::{BridgeError, FailureKind, MappingError, Result};
use crate::handle::Handle;
use crate::model::{DomainObject, ObjectSource};
use crate::names::NameAllocator;
use crate::output::{ObjectFailure, OutputAssembly, TranslationReport};
use crate::record::{FieldValue, TargetRecord};
use crate::registry::{Binding, ForwardRef, HandleRegistry, Mapped};
use crate::schema::SchemaSource;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Started,
    Pulling,
    Finalized,
}

/// One forward translation run
pub struct TranslationContext<'a, O: DomainObject> {
    source: &'a dyn ObjectSource<O>,
    schemas: &'a dyn SchemaSource,
    dispatch: &'a dyn Dispatch<O>,
    options: TranslationOptions,
    registry: HandleRegistry,
    names: NameAllocator,
    output: OutputAssembly,
    failures: Vec<ObjectFailure>,
    excluded: Vec<Handle>,
    /// Pull stack: (handle, dispatch tag) of every rule currently running
    stack: Vec<(Handle, Cow<'static, str>)>,
    /// stub owner -> objects whose rules were handed its stub name
    stub_holders: HashMap<Handle, Vec<Handle>>,
    state: RunState,
    started_at: DateTime<Utc>,
}

impl<'a, O: DomainObject> TranslationContext<'a, O> {
    pub fn new(
        source: &'a dyn ObjectSource<O>,
        schemas: &'a dyn SchemaSource,
        dispatch: &'a dyn Dispatch<O>,
        options: TranslationOptions,
        naming: NamingConfig,
    ) -> Self {
        Self {
            source,
            schemas,
            dispatch,
            options,
            registry: HandleRegistry::new(),
            names: NameAllocator::new(naming),
            output: OutputAssembly::new(),
            failures: Vec::new(),
            excluded: Vec::new(),
            stack: Vec::new(),
            stub_holders: HashMap::new(),
            state: RunState::Started,
            started_at: Utc::now(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn options(&self) -> &TranslationOptions {
        &self.options
    }

    pub fn schemas(&self) -> &'a dyn SchemaSource {
        self.schemas
    }

    // =========================================================================
    // translate_and_map
    // =========================================================================

    /// Translate `object` at most once per run.
    ///
    /// `Ok(None)` means no record exists for the object (unsupported,
    /// excluded or failed); callers leave the reference empty. `Err` only
    /// carries fatal engine-contract violations.
    pub fn translate_and_map(&mut self, object: &O) -> Result<Option<Mapped>> {
        let handle = object.handle();
        if self.state == RunState::Started {
            self.state = RunState::Pulling;
        }

        if let Some(binding) = self.registry.lookup(handle) {
            return Ok(Some(Mapped::Bound(Rc::clone(binding))));
        }
        if self.registry.is_failed(handle) {
            return Ok(None);
        }
        if self.registry.is_in_progress(handle) {
            return Ok(Some(Mapped::Forward(self.forward_ref(object))));
        }

        let Some(entry) = self.dispatch.entry(object) else {
            let message = format!("no mapping rule for variant {:?}", object.variant());
            warn!(handle = %handle, "{}", message);
            self.failures.push(ObjectFailure::object(
                handle,
                FailureKind::UnsupportedType,
                message,
            ));
            self.registry.mark_failed(handle, None);
            return Ok(None);
        };

        if self.options.is_excluded(&entry.tag) {
            info!(handle = %handle, tag = %entry.tag, "skipping excluded record type");
            self.excluded.push(handle);
            self.registry.mark_failed(handle, None);
            return Ok(None);
        }

        self.registry.enter(handle);
        self.stack.push((handle, entry.tag.clone()));
        trace!(handle = %handle, tag = %entry.tag, depth = self.stack.len(), "translating");
        let result = (entry.rule)(object, self);
        self.stack.pop();

        match result {
            Ok(record) => self.complete(object, &entry.tag, record),
            Err(MappingError::MissingRequiredField { field }) => {
                self.fail(
                    handle,
                    FailureKind::MissingRequiredField,
                    format!("{} is missing required field '{}'", entry.tag, field),
                );
                Ok(None)
            }
            Err(MappingError::Record(err)) => {
                self.fail(handle, FailureKind::InvalidRecord, err.to_string());
                Ok(None)
            }
            Err(MappingError::Fatal(err)) => Err(err),
        }
    }

    /// Translate the object behind a handle. Handles with no object in the
    /// source are reported against the object currently being translated.
    pub fn translate_handle(&mut self, handle: Handle) -> Result<Option<Mapped>> {
        let source = self.source;
        match source.object(handle) {
            Some(object) => self.translate_and_map(object),
            None => {
                let owner = self.current().unwrap_or(handle);
                warn!(owner = %owner, target = %handle, "reference to unknown object");
                self.failures.push(ObjectFailure::object(
                    owner,
                    FailureKind::UnresolvedReference,
                    format!("referenced object {} does not exist", handle),
                ));
                Ok(None)
            }
        }
    }

    /// Reference field for an optional handle. Empty when the handle is
    /// absent or the target produced no record.
    pub fn reference(&mut self, handle: Option<Handle>) -> Result<FieldValue> {
        let Some(handle) = handle else {
            return Ok(FieldValue::Empty);
        };
        Ok(self
            .translate_handle(handle)?
            .map_or(FieldValue::Empty, |mapped| mapped.to_reference()))
    }

    /// Reference fields for an ordered collection, one per member
    pub fn references(&mut self, handles: &[Handle]) -> Result<Vec<FieldValue>> {
        handles.iter().map(|&h| self.reference(Some(h))).collect()
    }

    // =========================================================================
    // Rule helpers
    // =========================================================================

    /// Empty canonical record of a tag
    pub fn create_record(&self, tag: &str) -> std::result::Result<TargetRecord, BridgeError> {
        self.schemas
            .empty_record_of(tag)
            .ok_or_else(|| BridgeError::UnknownTag(tag.to_string()))
    }

    /// Empty record carrying the object's name as its preferred name. The
    /// final unique name is assigned when the record is bound.
    pub fn create_named_record(
        &self,
        tag: &str,
        object: &O,
    ) -> std::result::Result<TargetRecord, BridgeError> {
        let mut record = self.create_record(tag)?;
        if let Some(name) = object.name() {
            record.set_name(name);
        }
        Ok(record)
    }

    pub fn object(&self, handle: Handle) -> Option<&'a O> {
        let source = self.source;
        source.object(handle)
    }

    /// Binding of an already translated handle
    pub fn lookup(&self, handle: Handle) -> Option<Rc<Binding>> {
        self.registry.lookup(handle).cloned()
    }

    /// Emitted record of a binding
    pub fn record(&self, binding: &Binding) -> Option<&TargetRecord> {
        self.output.get(binding.position)
    }

    /// Handle whose rule is running
    pub fn current(&self) -> Option<Handle> {
        self.stack.last().map(|(handle, _)| *handle)
    }

    /// Tag of the record being built
    pub fn current_tag(&self) -> Option<&str> {
        self.stack.last().map(|(_, tag)| tag.as_ref())
    }

    /// Handles on the pull stack, outermost first
    pub fn chain(&self) -> Vec<Handle> {
        self.stack.iter().map(|(handle, _)| *handle).collect()
    }

    /// Every handle the run has reached: bound, failed or excluded
    pub fn visited(&self) -> HashSet<Handle> {
        self.registry.handles().collect()
    }

    pub fn record_count(&self) -> usize {
        self.output.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn forward_ref(&mut self, object: &O) -> ForwardRef {
        let handle = object.handle();
        let tag = self
            .stack
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, tag)| tag.to_string())
            .unwrap_or_default();
        let name = match self.registry.stub(handle) {
            Some(stub) => stub.to_string(),
            None => {
                let stub = self.names.reserve(object.name(), &tag);
                debug!(handle = %handle, tag = %tag, stub = %stub, "cycle detected, reserved stub");
                self.registry.reserve_stub(handle, stub.clone());
                stub
            }
        };
        if let Some(holder) = self.current() {
            let holders = self.stub_holders.entry(handle).or_default();
            if !holders.contains(&holder) {
                holders.push(holder);
            }
        }
        ForwardRef { handle, tag, name }
    }

    fn complete(
        &mut self,
        object: &O,
        entry_tag: &str,
        mut record: TargetRecord,
    ) -> Result<Option<Mapped>> {
        let handle = object.handle();

        if self.options.validate_required {
            let missing = record.missing_required();
            if !missing.is_empty() {
                self.fail(
                    handle,
                    FailureKind::MissingRequiredField,
                    format!(
                        "{} is missing required field(s): {}",
                        record.tag(),
                        missing.join(", ")
                    ),
                );
                return Ok(None);
            }
        }

        // A stub was reserved under the dispatch tag; the record must be able
        // to keep it under its own tag
        if let Some(stub) = self.registry.stub(handle).map(str::to_string) {
            if record.tag() != entry_tag && !self.names.claim_in(&stub, entry_tag, record.tag()) {
                self.fail(
                    handle,
                    FailureKind::InvalidRecord,
                    format!(
                        "{} record cannot take cycle name '{}', already used by another {}",
                        entry_tag,
                        stub,
                        record.tag()
                    ),
                );
                return Ok(None);
            }
        }

        let name = match self.registry.leave(handle) {
            Some(stub) => stub,
            None => {
                let preferred = record.name().or(object.name()).map(str::to_string);
                self.names.reserve(preferred.as_deref(), record.tag())
            }
        };
        record.set_name(name.clone());

        let tag = record.tag().to_string();
        let position = self.output.push(handle, record);
        let binding = Binding {
            handle,
            tag,
            name,
            position,
        };
        let binding = self.registry.bind(binding).map_err(|err| match err {
            BridgeError::DuplicateBinding { handle, .. } => {
                let mut chain = self.chain();
                chain.push(handle);
                BridgeError::DuplicateBinding { handle, chain }
            }
            other => other,
        })?;
        trace!(handle = %handle, name = %binding.name, position, "bound");
        Ok(Some(Mapped::Bound(binding)))
    }

    fn fail(&mut self, handle: Handle, kind: FailureKind, message: String) {
        let stub = self.registry.leave(handle);
        self.registry.mark_failed(handle, stub);
        error!(handle = %handle, kind = %kind, "{}", message);
        self.failures
            .push(ObjectFailure::object(handle, kind, message));
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Finalize the run: reject dangling stubs, empty the references that
    /// were handed a failed object's stub, then patch every reference that
    /// names no emitted record to empty.
    pub fn finish(mut self) -> Result<TranslationReport> {
        if let Some((handle, stub)) = self.registry.pending().into_iter().next() {
            return Err(BridgeError::DanglingCycleStub {
                handle,
                name: stub.unwrap_or_default(),
            });
        }

        let case_insensitive = self.names.config().case_insensitive;
        let fold = |name: &str| {
            if case_insensitive {
                name.to_ascii_lowercase()
            } else {
                name.to_string()
            }
        };
        let emitted: HashSet<String> = self
            .output
            .iter()
            .filter_map(|r| r.name())
            .map(|n| fold(n))
            .collect();

        // Stubs handed out for objects that then failed. Only the holders are
        // patched: another record may legitimately carry the same name.
        for (handle, stub) in self.registry.failed_stubs() {
            let Some(holders) = self.stub_holders.get(&handle) else {
                continue;
            };
            let mut patched = 0;
            for (owner, record) in self.output.records_mut() {
                if holders.contains(&owner) {
                    patched += record.clear_references_to(&stub, case_insensitive);
                }
            }
            debug!(handle = %handle, stub = %stub, patched, "patched failed cycle stub");
        }

        // Anything else that names nothing
        let mut unresolved = Vec::new();
        for (owner, record) in self.output.records_mut() {
            let dangling: Vec<(usize, String)> = record
                .references()
                .filter(|(_, name)| !emitted.contains(&fold(name)))
                .map(|(index, name)| (index, name.to_string()))
                .collect();
            for (index, name) in dangling {
                record.clear_index(index);
                unresolved.push((owner, record.tag().to_string(), name));
            }
        }
        for (owner, tag, name) in unresolved {
            let message = format!("{} references '{}', which was not emitted", tag, name);
            warn!(handle = %owner, "{}", message);
            self.failures.push(ObjectFailure::object(
                owner,
                FailureKind::UnresolvedReference,
                message,
            ));
        }

        self.state = RunState::Finalized;
        let (records, handles) = self.output.into_parts();
        let report = TranslationReport {
            records,
            handles,
            failures: self.failures,
            excluded: self.excluded,
            unvisited: Vec::new(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        info!("{}", report.summary());
        Ok(report)
    }
}
