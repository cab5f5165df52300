//! # Dispatch
//!
//! Runs a batch of messages through their handlers in dependency order.
//!
//! ## Flow
//!
//! 1. Partition the configuration blobs into regular and project buckets
//! 2. Build one fresh handler per configured type through a [`HandlerFactory`]
//! 3. Build the dependency graph and compute the dispatch plan
//! 4. Invoke handlers one at a time, recording resolved temporary IDs
//! 5. Return results in input order with the temporary ID map
//!
//! Only configuration errors escape [`process_messages`]. Every per-message
//! problem (unknown type, malformed ID, handler error, unresolved
//! dependency) becomes a failed result for that message alone.
//!
//! [`HandlerFactory`]: crate::handler::HandlerFactory

mod dispatcher;

pub use dispatcher::{process_messages, DispatchError, DispatchOutcome, Dispatcher};
