//! Handler registry
//!
//! Built once per dispatch call from the partitioned configuration. Only
//! configured message types get a handler; messages of any other type fail
//! with "no handler for type".

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use super::{HandlerEntry, HandlerFactory};
use crate::domain::{HandlerFamily, MessageType};
use crate::storage::PartitionedConfig;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Handler for {message_type} is a {actual:?} handler, expected {expected:?}")]
    FamilyMismatch {
        message_type: MessageType,
        expected: HandlerFamily,
        actual: HandlerFamily,
    },

    #[error("Handler already registered for {0}")]
    Duplicate(MessageType),

    #[error("No handler available for {0}")]
    MissingHandler(MessageType),
}

/// Maps message types to handler instances
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<MessageType, HandlerEntry>,
}

impl HandlerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry for every configured message type
    ///
    /// Fails if the factory cannot serve every known message type, so a
    /// missing handler is caught before any message is dispatched.
    /// Configuration keys that name no known type are skipped.
    pub fn from_config(
        config: &PartitionedConfig,
        factory: &dyn HandlerFactory,
    ) -> Result<Self, RegistryError> {
        Self::validate_factory(factory)?;

        let mut registry = Self::new();
        for (key, handler_config) in config.iter() {
            let message_type: MessageType = match key.parse() {
                Ok(t) => t,
                Err(_) => {
                    warn!(key = %key, "configuration names an unknown message type, skipping");
                    continue;
                }
            };

            let entry = factory
                .create(message_type, handler_config)
                .ok_or(RegistryError::MissingHandler(message_type))?;
            registry.register(message_type, entry)?;
            debug!(message_type = %message_type, "registered handler");
        }

        Ok(registry)
    }

    /// Checks that a factory covers every known message type
    pub fn validate_factory(factory: &dyn HandlerFactory) -> Result<(), RegistryError> {
        match MessageType::ALL.into_iter().find(|t| !factory.supports(*t)) {
            Some(missing) => Err(RegistryError::MissingHandler(missing)),
            None => Ok(()),
        }
    }

    /// Registers a handler, enforcing the static family classification
    pub fn register(
        &mut self,
        message_type: MessageType,
        entry: HandlerEntry,
    ) -> Result<(), RegistryError> {
        let expected = message_type.family();
        let actual = entry.family();
        if expected != actual {
            return Err(RegistryError::FamilyMismatch {
                message_type,
                expected,
                actual,
            });
        }

        if self.handlers.contains_key(&message_type) {
            return Err(RegistryError::Duplicate(message_type));
        }

        self.handlers.insert(message_type, entry);
        Ok(())
    }

    /// Checks that every known message type has a registered handler
    pub fn validate_complete(&self) -> Result<(), RegistryError> {
        match MessageType::ALL
            .into_iter()
            .find(|t| !self.handlers.contains_key(t))
        {
            Some(missing) => Err(RegistryError::MissingHandler(missing)),
            None => Ok(()),
        }
    }

    /// Returns the handler for a message type
    pub fn get_mut(&mut self, message_type: MessageType) -> Option<&mut HandlerEntry> {
        self.handlers.get_mut(&message_type)
    }

    /// Returns true if a handler is registered for the type
    pub fn contains(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// Lists registered message types
    pub fn message_types(&self) -> impl Iterator<Item = MessageType> + '_ {
        self.handlers.keys().copied()
    }

    /// Returns the number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, MutableResolutionStore, ResolutionSnapshot};
    use crate::handler::{HandlerResult, ProjectHandler, RegularHandler};
    use crate::storage::{partition, HandlerConfig};
    use async_trait::async_trait;
    use serde_json::json;

    struct Nop;

    #[async_trait]
    impl RegularHandler for Nop {
        async fn handle(
            &mut self,
            _message: &Message,
            _resolved: &ResolutionSnapshot,
        ) -> anyhow::Result<HandlerResult> {
            Ok(HandlerResult::success(json!({})))
        }
    }

    struct ProjectNop;

    #[async_trait]
    impl ProjectHandler for ProjectNop {
        async fn handle(
            &mut self,
            _message: &Message,
            _store: &mut dyn MutableResolutionStore,
        ) -> anyhow::Result<HandlerResult> {
            Ok(HandlerResult::success(json!({})))
        }
    }

    struct NopFactory {
        skip: Option<MessageType>,
    }

    impl HandlerFactory for NopFactory {
        fn supports(&self, message_type: MessageType) -> bool {
            Some(message_type) != self.skip
        }

        fn create(&self, message_type: MessageType, _config: &HandlerConfig) -> Option<HandlerEntry> {
            if !self.supports(message_type) {
                return None;
            }
            Some(match message_type.family() {
                HandlerFamily::Regular => HandlerEntry::regular(Nop),
                HandlerFamily::Project => HandlerEntry::project(ProjectNop),
            })
        }
    }

    #[test]
    fn register_enforces_family() {
        let mut registry = HandlerRegistry::new();

        let err = registry
            .register(MessageType::UpdateProject, HandlerEntry::regular(Nop))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::FamilyMismatch {
                message_type: MessageType::UpdateProject,
                expected: HandlerFamily::Project,
                actual: HandlerFamily::Regular,
            }
        );

        assert!(registry
            .register(MessageType::CreateIssue, HandlerEntry::project(ProjectNop))
            .is_err());
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(MessageType::CreateIssue, HandlerEntry::regular(Nop))
            .unwrap();

        assert_eq!(
            registry.register(MessageType::CreateIssue, HandlerEntry::regular(Nop)),
            Err(RegistryError::Duplicate(MessageType::CreateIssue))
        );
    }

    #[test]
    fn from_config_registers_configured_types_only() {
        let config = partition(
            Some(&json!({"create_issue": {}, "update-project": {}, "launch_rocket": {}})),
            None,
        )
        .unwrap();

        let registry = HandlerRegistry::from_config(&config, &NopFactory { skip: None }).unwrap();

        assert_eq!(
            registry.message_types().collect::<Vec<_>>(),
            vec![MessageType::CreateIssue, MessageType::UpdateProject]
        );
        assert!(!registry.contains(MessageType::AddComment));
        assert!(registry.validate_complete().is_err());
    }

    #[test]
    fn incomplete_factory_is_rejected() {
        let config = partition(Some(&json!({"create_issue": {}})), None).unwrap();
        let factory = NopFactory {
            skip: Some(MessageType::HideComment),
        };

        assert_eq!(
            HandlerRegistry::from_config(&config, &factory).unwrap_err(),
            RegistryError::MissingHandler(MessageType::HideComment)
        );
    }

    #[test]
    fn fully_configured_registry_is_complete() {
        let blob: serde_json::Map<String, serde_json::Value> = MessageType::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), json!({})))
            .collect();
        let config = partition(Some(&serde_json::Value::Object(blob)), None).unwrap();

        let registry = HandlerRegistry::from_config(&config, &NopFactory { skip: None }).unwrap();
        assert_eq!(registry.len(), MessageType::ALL.len());
        assert!(registry.validate_complete().is_ok());
    }
}
