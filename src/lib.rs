//! model-bridge
//!
//! A memoizing, cycle-safe translation engine between an in-memory domain
//! object graph and a schema-tagged record format.
//!
//! ## Features
//!
//! - **At-most-once translation**: every handle binds to one record per run
//! - **Cycle safety**: re-entrant pulls get a reserved stub name instead of recursing
//! - **Resolvable output**: every reference names an emitted record or is empty
//! - **Deterministic order**: records are emitted in post-order of pulls
//! - **Degrade, don't abort**: per-object failures are reported, not thrown
//! - **Reverse direction**: two-pass allocate/link back into domain objects
//!
//! ## Architecture
//!
//! ```text
//! driver ──roots──> PullScheduler ──> TranslationContext::translate_and_map
//!                                         │  HandleRegistry (slot per handle)
//!                                         │  Dispatch ──> MappingRule ──┐
//!                                         │  NameAllocator              │ pulls
//!                                         │  OutputAssembly  <──────────┘
//!                                         v
//!                                  TranslationReport { records, failures, ... }
//! ```

pub mod checksum;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod generic;
pub mod graph;
pub mod groups;
pub mod handle;
pub mod model;
pub mod names;
pub mod output;
pub mod record;
pub mod registry;
pub mod reverse;
pub mod scheduler;
pub mod schema;

pub use checksum::Fingerprint;
pub use config::{
    BridgeConfig, MappingConfig, NamingConfig, NamingScope, TagMapping, TranslationOptions,
};
pub use context::{RunState, TranslationContext};
pub use dispatch::{Dispatch, DispatchEntry, DispatchTable, MappingRule};
pub use error::{BridgeError, FailureKind, MappingError, Result, Severity};
pub use generic::{GenericDispatch, GenericModel, GenericObject, GenericValue};
pub use graph::ReferenceGraph;
pub use groups::{append_group, append_groups};
pub use handle::Handle;
pub use model::{DomainObject, ObjectSource, ObjectStore};
pub use names::NameAllocator;
pub use output::{FailureSubject, ObjectFailure, OutputAssembly, TranslationReport};
pub use record::{FieldValue, RecordDocument, TargetRecord};
pub use registry::{Binding, ForwardRef, HandleRegistry, Mapped};
pub use reverse::{
    translate_reverse, LinkResolver, ReverseDispatch, ReverseEntry, ReverseReport, ReverseTable,
    ReverseTranslator,
};
pub use scheduler::{translate_all, translate_forward, translate_single, PullScheduler};
pub use schema::{FieldSchema, SchemaCatalog, SchemaSource};
