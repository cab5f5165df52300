//! Handler result protocol
//!
//! Every handler invocation produces one [`HandlerResult`]:
//!
//! ```text
//! {"success": true, "repo": "octo/app", "number": 42}
//! {"success": false, "error": "..."}
//! {"success": false, "deferred": true, "error": "..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::ResolvedEntity;

/// Terminal state of one message within a dispatch pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOutcome {
    Succeeded,
    Failed,
    /// A dependency never resolved in this pass
    Deferred,
}

impl MessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOutcome::Succeeded => "succeeded",
            MessageOutcome::Failed => "failed",
            MessageOutcome::Deferred => "deferred",
        }
    }
}

/// The result of handling one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerResult {
    /// Whether the effect was applied
    pub success: bool,

    /// Error message (if failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set when the handler gave up waiting for an unresolved dependency
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deferred: bool,

    /// Type-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl HandlerResult {
    /// A successful result carrying the given fields
    ///
    /// Non-object data is stored under a `data` field.
    pub fn success(data: impl Into<Value>) -> Self {
        let fields = match data.into() {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };

        Self {
            success: true,
            error: None,
            deferred: false,
            fields,
        }
    }

    /// A failed result
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            deferred: false,
            fields: Map::new(),
        }
    }

    /// A deferred result: a dependency never resolved in this pass
    pub fn deferred(message: impl Into<String>) -> Self {
        Self {
            deferred: true,
            ..Self::failure(message)
        }
    }

    /// Adds a type-specific field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the terminal outcome
    pub fn outcome(&self) -> MessageOutcome {
        if self.success {
            MessageOutcome::Succeeded
        } else if self.deferred {
            MessageOutcome::Deferred
        } else {
            MessageOutcome::Failed
        }
    }

    /// Returns the entity this result resolves to, if any
    pub fn entity(&self) -> Option<ResolvedEntity> {
        ResolvedEntity::from_fields(&self.fields)
    }
}
