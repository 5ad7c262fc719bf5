//! Output Assembly
//!
//! The ordered record sequence of a run, the per-object failure list, and
//! the report handed back to the driver.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::checksum::Fingerprint;
use crate::error::{FailureKind, Severity};
use crate::handle::Handle;
use crate::record::{RecordDocument, TargetRecord};

// =============================================================================
// Failures
// =============================================================================

/// What a failure is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureSubject {
    /// A domain object (forward direction, or a reverse link)
    Object { handle: Handle },
    /// An input record (reverse direction), by position
    Record {
        index: usize,
        tag: String,
        name: Option<String>,
    },
}

/// A recovered, per-object failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectFailure {
    pub subject: FailureSubject,
    pub kind: FailureKind,
    pub message: String,
}

impl ObjectFailure {
    pub fn object(handle: Handle, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            subject: FailureSubject::Object { handle },
            kind,
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Handle of the object this failure is about
    pub fn handle(&self) -> Option<Handle> {
        match &self.subject {
            FailureSubject::Object { handle } => Some(*handle),
            FailureSubject::Record { .. } => None,
        }
    }
}

impl std::fmt::Display for ObjectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subject {
            FailureSubject::Object { handle } => {
                write!(f, "[{}] {}: {}", self.kind, handle, self.message)
            }
            FailureSubject::Record { index, tag, name } => write!(
                f,
                "[{}] record #{} {} '{}': {}",
                self.kind,
                index,
                tag,
                name.as_deref().unwrap_or(""),
                self.message
            ),
        }
    }
}

// =============================================================================
// Output Assembly
// =============================================================================

/// Records in completion order, each paired with its source handle
#[derive(Debug, Default)]
pub struct OutputAssembly {
    records: Vec<TargetRecord>,
    handles: Vec<Handle>,
}

impl OutputAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished record, returning its position
    pub fn push(&mut self, handle: Handle, record: TargetRecord) -> usize {
        self.records.push(record);
        self.handles.push(handle);
        self.records.len() - 1
    }

    pub fn get(&self, position: usize) -> Option<&TargetRecord> {
        self.records.get(position)
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = (Handle, &mut TargetRecord)> {
        self.handles.iter().copied().zip(self.records.iter_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_parts(self) -> (Vec<TargetRecord>, Vec<Handle>) {
        (self.records, self.handles)
    }
}

// =============================================================================
// Translation Report
// =============================================================================

/// Result of a forward run
#[derive(Debug, Serialize)]
pub struct TranslationReport {
    /// Emitted records, in completion order
    pub records: Vec<TargetRecord>,
    /// `handles[i]` is the source object of `records[i]`
    pub handles: Vec<Handle>,
    /// Recovered per-object failures, in the order they occurred
    pub failures: Vec<ObjectFailure>,
    /// Objects skipped because their tag is excluded
    pub excluded: Vec<Handle>,
    /// Objects reachable from the roots that no rule ever pulled
    pub unvisited: Vec<Handle>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TranslationReport {
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

    /// Failures reported for one object
    pub fn failures_for(&self, handle: Handle) -> Vec<&ObjectFailure> {
        self.failures
            .iter()
            .filter(|f| f.handle() == Some(handle))
            .collect()
    }

    /// Record emitted for an object
    pub fn record_for(&self, handle: Handle) -> Option<&TargetRecord> {
        self.handles
            .iter()
            .position(|&h| h == handle)
            .map(|i| &self.records[i])
    }

    /// Record by tag and name (case-insensitive)
    pub fn record_named(&self, tag: &str, name: &str) -> Option<&TargetRecord> {
        self.records.iter().find(|r| {
            r.tag() == tag && r.name().is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
    }

    /// Schema-free documents for an external writer
    pub fn documents(&self) -> Vec<RecordDocument> {
        self.records.iter().map(TargetRecord::to_document).collect()
    }

    /// Content fingerprint of the emitted records
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_records(&self.records)
    }

    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        format!(
            "{} records, {} warnings, {} errors, {} excluded, {} unvisited ({} ms)",
            self.records.len(),
            self.warnings().count(),
            self.errors().count(),
            self.excluded.len(),
            self.unvisited.len(),
            (self.finished_at - self.started_at).num_milliseconds()
        )
    }
}
