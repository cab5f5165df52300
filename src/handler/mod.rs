//! # Handlers
//!
//! Handlers perform the privileged effect for one message type. The
//! dispatcher never calls remote APIs itself; it routes each message to the
//! handler registered for its type and threads resolved temporary IDs
//! between them.
//!
//! ## Handler Families
//!
//! | Family | Trait | Resolution context |
//! |--------|-------|--------------------|
//! | Regular | [`RegularHandler`] | [`ResolutionSnapshot`], a copy taken at invocation time |
//! | Project | [`ProjectHandler`] | `&mut dyn MutableResolutionStore`, the live store |
//!
//! Project handlers share the live store so a create-then-update pair of the
//! same type observes in-place updates without an explicit dependency edge.
//! The family of each [`MessageType`] is fixed by [`MessageType::family`].
//!
//! ## Key Types
//!
//! - [`HandlerRegistry`] - Maps message types to handler instances
//! - [`HandlerFactory`] - Builds fresh handler instances per dispatch call
//! - [`HandlerResult`] - What a handler reports back
//! - [`StagedHandlerFactory`] - Built-in preview handlers with no remote effects

mod policy;
mod protocol;
mod registry;
mod staged;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{HandlerFamily, Message, MessageType, MutableResolutionStore, ResolutionSnapshot};
use crate::storage::HandlerConfig;

pub use policy::{PolicyGuard, PolicyViolation};
pub use protocol::{HandlerResult, MessageOutcome};
pub use registry::{HandlerRegistry, RegistryError};
pub use staged::{StagedHandlerFactory, DEFAULT_STAGED_REPO};

/// A handler that reads resolved IDs from an immutable snapshot
#[async_trait]
pub trait RegularHandler: Send {
    async fn handle(
        &mut self,
        message: &Message,
        resolved: &ResolutionSnapshot,
    ) -> Result<HandlerResult>;
}

/// A handler that reads and updates the live resolution store
#[async_trait]
pub trait ProjectHandler: Send {
    async fn handle(
        &mut self,
        message: &Message,
        store: &mut dyn MutableResolutionStore,
    ) -> Result<HandlerResult>;
}

/// A handler instance tagged with its family
pub enum HandlerEntry {
    Regular(Box<dyn RegularHandler>),
    Project(Box<dyn ProjectHandler>),
}

impl HandlerEntry {
    pub fn regular(handler: impl RegularHandler + 'static) -> Self {
        HandlerEntry::Regular(Box::new(handler))
    }

    pub fn project(handler: impl ProjectHandler + 'static) -> Self {
        HandlerEntry::Project(Box::new(handler))
    }

    /// Returns the family this handler belongs to
    pub fn family(&self) -> HandlerFamily {
        match self {
            HandlerEntry::Regular(_) => HandlerFamily::Regular,
            HandlerEntry::Project(_) => HandlerFamily::Project,
        }
    }
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HandlerEntry::{:?}", self.family())
    }
}

/// Builds handler instances for one dispatch call
pub trait HandlerFactory: Send + Sync {
    /// Returns true if this factory can build a handler for the type
    fn supports(&self, message_type: MessageType) -> bool;

    /// Builds a fresh handler instance with its own state
    fn create(&self, message_type: MessageType, config: &HandlerConfig) -> Option<HandlerEntry>;
}
