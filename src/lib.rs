//! safeout - dependency-ordered dispatch of agent safe outputs
//!
//! An agent emits a batch of "safe output" messages (create an issue, add a
//! comment, update a project board). Messages may reference entities that
//! earlier messages in the same batch create, through temporary IDs such as
//! `#aw_0123456789ab`. safeout orders the batch so providers run before the
//! messages that reference them, routes each message to its handler, and
//! threads the resolved IDs between handlers.

pub mod cli;
pub mod dispatch;
pub mod domain;
pub mod handler;
pub mod logging;
pub mod storage;

pub use dispatch::{process_messages, DispatchOutcome};
pub use domain::{Message, MessageType, ResolvedEntity, TemporaryId};
