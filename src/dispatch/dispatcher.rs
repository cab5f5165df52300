//! Sequential dependency-ordered dispatcher

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    DependencyGraph, Message, MutableResolutionStore, ResolutionStore, ResolvedMap, TemporaryId,
};
use crate::handler::{
    HandlerEntry, HandlerFactory, HandlerRegistry, HandlerResult, MessageOutcome, RegistryError,
};
use crate::storage::{partition, ConfigError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The result of one dispatch call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    /// True only if every message succeeded
    pub success: bool,

    /// One result per message, in input order
    pub results: Vec<HandlerResult>,

    /// Seeded IDs plus IDs whose provider succeeded in this call
    pub temporary_id_map: ResolvedMap,
}

impl DispatchOutcome {
    /// Returns (succeeded, failed, deferred) counts
    pub fn counts(&self) -> (usize, usize, usize) {
        self.results
            .iter()
            .fold((0, 0, 0), |(ok, failed, deferred), r| match r.outcome() {
                MessageOutcome::Succeeded => (ok + 1, failed, deferred),
                MessageOutcome::Failed => (ok, failed + 1, deferred),
                MessageOutcome::Deferred => (ok, failed, deferred + 1),
            })
    }
}

/// Dispatches one batch against one set of handler instances
///
/// A dispatcher is built per call: handler state (such as `max` counters)
/// and the resolution store never carry over between calls.
pub struct Dispatcher {
    registry: HandlerRegistry,

    /// Live store handed to project handlers
    store: ResolutionStore,

    /// What the caller gets back: the seed plus recorded providers
    ledger: ResolvedMap,
}

impl Dispatcher {
    /// Creates a dispatcher seeded with IDs resolved by an earlier pass
    pub fn new(registry: HandlerRegistry, seed: ResolvedMap) -> Self {
        Self {
            registry,
            store: ResolutionStore::seeded(seed.clone()),
            ledger: seed,
        }
    }

    /// Validates configuration and builds the handler set, without awaiting
    ///
    /// Both blobs absent is an error, as is a configured type the factory
    /// cannot serve. No handler has run when this returns.
    pub fn prepare(
        primary: Option<&Value>,
        project: Option<&Value>,
        factory: &dyn HandlerFactory,
        seed: Option<ResolvedMap>,
    ) -> Result<Self, DispatchError> {
        let config = partition(primary, project)?;
        let registry = HandlerRegistry::from_config(&config, factory)?;
        Ok(Self::new(registry, seed.unwrap_or_default()))
    }

    /// Dispatches every message and returns results in input order
    pub async fn run(mut self, messages: &[Message]) -> DispatchOutcome {
        info!(
            messages = messages.len(),
            handlers = self.registry.len(),
            "dispatching batch"
        );

        let graph = DependencyGraph::from_messages(messages);
        let plan = graph.plan();
        debug!(
            messages = messages.len(),
            edges = graph.edge_count(),
            order = ?plan.order,
            "dispatch plan computed"
        );

        let mut slots: Vec<Option<HandlerResult>> = vec![None; messages.len()];
        for &index in &plan.order {
            let message = &messages[index];
            let result = self.dispatch_one(index, message, &graph).await;
            debug!(
                index,
                message_type = message.type_tag(),
                outcome = result.outcome().as_str(),
                "message dispatched"
            );
            slots[index] = Some(result);
        }

        let results: Vec<HandlerResult> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| HandlerResult::failure("message was not dispatched")))
            .collect();
        let success = results.iter().all(|r| r.success);

        let outcome = DispatchOutcome {
            success,
            results,
            temporary_id_map: self.ledger,
        };
        let (ok, failed, deferred) = outcome.counts();
        info!(succeeded = ok, failed, deferred, "dispatch finished");

        outcome
    }

    async fn dispatch_one(
        &mut self,
        index: usize,
        message: &Message,
        graph: &DependencyGraph,
    ) -> HandlerResult {
        let no_handler = || HandlerResult::failure(format!("no handler for type: {}", message.type_tag()));

        let Some(message_type) = message.message_type() else {
            return no_handler();
        };
        let Some(entry) = self.registry.get_mut(message_type) else {
            return no_handler();
        };

        // Checked before the handler so a malformed ID never reaches it
        let provided = match message.provided_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(index, error = %e, "rejecting message with malformed temporary id");
                return HandlerResult::failure(e.to_string());
            }
        };

        let handled = match entry {
            HandlerEntry::Regular(handler) => {
                let snapshot = self.store.snapshot();
                handler.handle(message, &snapshot).await
            }
            HandlerEntry::Project(handler) => handler.handle(message, &mut self.store).await,
        };

        let result = match handled {
            Ok(result) => result,
            Err(e) => {
                warn!(index, message_type = %message_type, error = %e, "handler failed");
                HandlerResult::failure(format!("{:#}", e))
            }
        };

        if result.success {
            if let Some(id) = provided {
                self.record(index, id, &result, graph);
            }
        }

        result
    }

    fn record(&mut self, index: usize, id: TemporaryId, result: &HandlerResult, graph: &DependencyGraph) {
        if graph.provider_of(&id) != Some(index) {
            debug!(index, id = %id, "not the registered provider, not recording");
            return;
        }

        match result.entity() {
            Some(entity) => {
                debug!(index, id = %id, entity = ?entity, "temporary id resolved");
                self.store.insert(id.clone(), entity.clone());
                self.ledger.insert(id, entity);
            }
            None => warn!(
                index,
                id = %id,
                "handler succeeded but returned nothing to resolve the temporary id to"
            ),
        }
    }
}

/// Dispatches a batch of messages
///
/// Configuration is validated before any handler runs; both blobs absent is
/// an error. `seed` carries IDs resolved by an earlier call. Callers that
/// need the configuration error without awaiting use [`Dispatcher::prepare`].
pub async fn process_messages(
    messages: &[Message],
    primary: Option<&Value>,
    project: Option<&Value>,
    factory: &dyn HandlerFactory,
    seed: Option<ResolvedMap>,
) -> Result<DispatchOutcome, DispatchError> {
    let dispatcher = Dispatcher::prepare(primary, project, factory, seed)?;
    Ok(dispatcher.run(messages).await)
}
