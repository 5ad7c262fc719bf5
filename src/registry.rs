//! Handle Registry
//!
//! Tracks, per domain handle, where its translation stands within one run.
//! A single slot map drives the whole stub-and-fill protocol:
//!
//! ```text
//! unseen --enter--> InProgress { stub: None }
//!                     |  reserve_stub (cycle detected)
//!                     v
//!                   InProgress { stub: Some(name) }
//!                     |-- bind --------> Bound(binding)
//!                     `-- mark_failed -> Failed { stub }
//! ```
//!
//! Bindings are handed out as `Rc<Binding>`, so repeated lookups of one
//! handle return the same allocation.

use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{BridgeError, Result};
use crate::handle::Handle;
use crate::record::FieldValue;

/// The established handle -> record correspondence of one translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub handle: Handle,
    /// Tag of the emitted record
    pub tag: String,
    /// Final, namespace-unique record name
    pub name: String,
    /// Index of the record in the output sequence
    pub position: usize,
}

/// Name reserved for an object whose record is still being built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRef {
    pub handle: Handle,
    pub tag: String,
    pub name: String,
}

/// Outcome of a successful `translate_and_map`
#[derive(Debug, Clone)]
pub enum Mapped {
    /// Translation completed (now or earlier in the run)
    Bound(Rc<Binding>),
    /// Cycle: the record is pending, only its name is known
    Forward(ForwardRef),
}

impl Mapped {
    pub fn handle(&self) -> Handle {
        match self {
            Mapped::Bound(binding) => binding.handle,
            Mapped::Forward(forward) => forward.handle,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Mapped::Bound(binding) => &binding.name,
            Mapped::Forward(forward) => &forward.name,
        }
    }

    pub fn binding(&self) -> Option<&Rc<Binding>> {
        match self {
            Mapped::Bound(binding) => Some(binding),
            Mapped::Forward(_) => None,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Mapped::Forward(_))
    }

    /// Reference field naming this record
    pub fn to_reference(&self) -> FieldValue {
        FieldValue::reference(self.name())
    }
}

#[derive(Debug)]
enum Slot {
    InProgress { stub: Option<String> },
    Bound(Rc<Binding>),
    Failed { stub: Option<String> },
}

/// Run-scoped handle registry and in-progress tracker
#[derive(Debug, Default)]
pub struct HandleRegistry {
    slots: HashMap<Handle, Slot>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding for a handle, if its translation completed
    pub fn lookup(&self, handle: Handle) -> Option<&Rc<Binding>> {
        match self.slots.get(&handle) {
            Some(Slot::Bound(binding)) => Some(binding),
            _ => None,
        }
    }

    /// Store the binding for `binding.handle`. A handle binds once per run.
    pub fn bind(&mut self, binding: Binding) -> Result<Rc<Binding>> {
        let handle = binding.handle;
        if let Some(Slot::Bound(_)) = self.slots.get(&handle) {
            return Err(BridgeError::DuplicateBinding {
                handle,
                chain: vec![handle],
            });
        }
        let binding = Rc::new(binding);
        self.slots.insert(handle, Slot::Bound(Rc::clone(&binding)));
        Ok(binding)
    }

    /// Start translating a handle. False if it is already in progress or
    /// already settled.
    pub fn enter(&mut self, handle: Handle) -> bool {
        if self.slots.contains_key(&handle) {
            return false;
        }
        self.slots.insert(handle, Slot::InProgress { stub: None });
        true
    }

    /// End an in-progress translation, returning its stub name if one was
    /// reserved. Settled handles are left untouched.
    pub fn leave(&mut self, handle: Handle) -> Option<String> {
        if !self.is_in_progress(handle) {
            return None;
        }
        match self.slots.remove(&handle) {
            Some(Slot::InProgress { stub }) => stub,
            _ => None,
        }
    }

    pub fn is_in_progress(&self, handle: Handle) -> bool {
        matches!(self.slots.get(&handle), Some(Slot::InProgress { .. }))
    }

    /// Record the stub name handed out for a cyclic reference. The first
    /// reservation wins.
    pub fn reserve_stub(&mut self, handle: Handle, name: String) {
        if let Some(Slot::InProgress { stub }) = self.slots.get_mut(&handle) {
            stub.get_or_insert(name);
        }
    }

    /// Stub name of an in-progress or failed handle
    pub fn stub(&self, handle: Handle) -> Option<&str> {
        match self.slots.get(&handle) {
            Some(Slot::InProgress { stub }) | Some(Slot::Failed { stub }) => stub.as_deref(),
            _ => None,
        }
    }

    /// Settle a handle as failed, keeping its stub for the patch pass
    pub fn mark_failed(&mut self, handle: Handle, stub: Option<String>) {
        self.slots.insert(handle, Slot::Failed { stub });
    }

    pub fn is_failed(&self, handle: Handle) -> bool {
        matches!(self.slots.get(&handle), Some(Slot::Failed { .. }))
    }

    /// Handles still in progress, with their stubs, sorted by handle
    pub fn pending(&self) -> Vec<(Handle, Option<String>)> {
        let mut pending: Vec<_> = self
            .slots
            .iter()
            .filter_map(|(handle, slot)| match slot {
                Slot::InProgress { stub } => Some((*handle, stub.clone())),
                _ => None,
            })
            .collect();
        pending.sort_by_key(|(handle, _)| *handle);
        pending
    }

    /// Stub names of failed handles, sorted by handle
    pub fn failed_stubs(&self) -> Vec<(Handle, String)> {
        let mut stubs: Vec<_> = self
            .slots
            .iter()
            .filter_map(|(handle, slot)| match slot {
                Slot::Failed { stub: Some(stub) } => Some((*handle, stub.clone())),
                _ => None,
            })
            .collect();
        stubs.sort_by_key(|(handle, _)| *handle);
        stubs
    }

    /// Every handle the run has touched
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.slots.keys().copied()
    }

    pub fn bound_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Bound(_)))
            .count()
    }
}
