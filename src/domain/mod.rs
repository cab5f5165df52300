//! Domain models for safeout
//!
//! Contains the message model, temporary-ID bookkeeping, the dependency
//! graph, and resolution state, without any I/O concerns.

mod graph;
mod id;
mod message;
mod resolution;

pub use graph::{DependencyGraph, DispatchPlan, DuplicateProvider};
pub use id::{replace_text_references, scan_text_references, IdError, TemporaryId, TEMPORARY_ID_PREFIX};
pub use message::{
    normalize_type_key, HandlerFamily, Message, MessageType, ID_REFERENCE_FIELDS,
    TEXT_REFERENCE_FIELDS,
};
pub use resolution::{
    resolve_reference, rewrite_references, MutableResolutionStore, ReadOnlyResolutionView,
    Reference, ResolutionSnapshot, ResolutionStore, ResolvedEntity, ResolvedMap,
};
