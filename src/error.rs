//! Error types for the translation engine

use serde::Serialize;
use thiserror::Error;

use crate::handle::Handle;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Engine errors
///
/// Only [`BridgeError::DuplicateBinding`] and [`BridgeError::DanglingCycleStub`]
/// abort a run. Everything else is either a setup problem (catalog, config, IO)
/// or a record-API misuse that the context downgrades to a per-object failure.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Unknown record tag: {0}")]
    UnknownTag(String),

    #[error("Unknown field '{field}' on {tag}")]
    UnknownField { tag: String, field: String },

    #[error("Field index {index} is out of range for {tag}")]
    FieldIndex { tag: String, index: usize },

    #[error("{tag} does not define an extensible group")]
    NotExtensible { tag: String },

    #[error("Extensible group arity mismatch on {tag}: expected {expected}, got {actual}")]
    GroupArity { tag: String, expected: usize, actual: usize },

    #[error("Schema already registered: {0}")]
    SchemaExists(String),

    #[error("Invalid schema for {tag}: {reason}")]
    InvalidSchema { tag: String, reason: String },

    #[error("Duplicate handle in object store: {0}")]
    DuplicateHandle(Handle),

    #[error("Duplicate binding for {handle} (chain: {})", format_chain(.chain))]
    DuplicateBinding { handle: Handle, chain: Vec<Handle> },

    #[error("Cycle stub '{name}' for {handle} was never filled")]
    DanglingCycleStub { handle: Handle, name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl BridgeError {
    /// Engine-contract violations. These abort the run instead of
    /// degrading a single object.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::DuplicateBinding { .. } | BridgeError::DanglingCycleStub { .. }
        )
    }
}

fn format_chain(chain: &[Handle]) -> String {
    if chain.is_empty() {
        return String::from("<root>");
    }
    chain.iter().map(|h| h.to_string()).collect::<Vec<_>>().join(" -> ")
}

/// Error returned by a mapping rule
#[derive(Error, Debug)]
pub enum MappingError {
    /// The rule could not populate a schema-required field
    #[error("missing required field '{field}'")]
    MissingRequiredField { field: String },

    /// The rule misused the record API (unknown field, bad group width, ...)
    #[error(transparent)]
    Record(BridgeError),

    /// An engine-contract violation surfaced while the rule was pulling
    #[error(transparent)]
    Fatal(BridgeError),
}

impl MappingError {
    pub fn missing(field: impl Into<String>) -> Self {
        MappingError::MissingRequiredField { field: field.into() }
    }
}

impl From<BridgeError> for MappingError {
    fn from(err: BridgeError) -> Self {
        if err.is_fatal() {
            MappingError::Fatal(err)
        } else {
            MappingError::Record(err)
        }
    }
}

/// Severity of a per-object failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Kind of a recovered, per-object failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No mapping rule for the object's variant (or record's tag)
    UnsupportedType,
    /// A schema-required field could not be populated
    MissingRequiredField,
    /// A rule produced a malformed record
    InvalidRecord,
    /// A name reference that no emitted record or object claims
    UnresolvedReference,
}

impl FailureKind {
    pub fn severity(&self) -> Severity {
        match self {
            FailureKind::UnsupportedType | FailureKind::UnresolvedReference => Severity::Warning,
            FailureKind::MissingRequiredField | FailureKind::InvalidRecord => Severity::Error,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::UnsupportedType => "unsupported type",
            FailureKind::MissingRequiredField => "missing required field",
            FailureKind::InvalidRecord => "invalid record",
            FailureKind::UnresolvedReference => "unresolved reference",
        };
        f.write_str(s)
    }
}
