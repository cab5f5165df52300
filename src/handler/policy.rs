//! Per-handler policy state
//!
//! Each handler instance owns one [`PolicyGuard`], built from its
//! [`HandlerConfig`] when the handler is created for a dispatch call. The
//! processed counter therefore never leaks between dispatch calls.

use thiserror::Error;

use crate::storage::HandlerConfig;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyViolation {
    #[error("Too many {message_type} messages: max is {max}")]
    MaxExceeded { message_type: String, max: u32 },

    #[error("'{0}' is blocked by configuration")]
    Blocked(String),

    #[error("'{0}' is not in the allowed list")]
    NotAllowed(String),
}

/// Enforces `max`, `allowed`, and `blocked` for one handler instance
#[derive(Debug, Clone)]
pub struct PolicyGuard {
    message_type: String,
    max: Option<u32>,
    processed: u32,
    allowed: Vec<String>,
    blocked: Vec<String>,
    target: Option<String>,
}

impl PolicyGuard {
    /// Creates a guard from handler configuration
    pub fn from_config(message_type: impl Into<String>, config: &HandlerConfig) -> Self {
        Self {
            message_type: message_type.into(),
            max: config.max,
            processed: 0,
            allowed: config.allowed.clone(),
            blocked: config.blocked.clone(),
            target: config.target.clone(),
        }
    }

    /// Counts one message against `max`
    ///
    /// Rejected messages are not counted.
    pub fn admit(&mut self) -> Result<(), PolicyViolation> {
        if let Some(max) = self.max {
            if self.processed >= max {
                return Err(PolicyViolation::MaxExceeded {
                    message_type: self.message_type.clone(),
                    max,
                });
            }
        }
        self.processed += 1;
        Ok(())
    }

    /// Checks values (labels, reviewers, workflow names) against the lists
    ///
    /// Matching is case-insensitive; a pattern ending in `*` matches by prefix.
    /// `blocked` is checked before `allowed`.
    pub fn check_values<'a>(
        &self,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), PolicyViolation> {
        for value in values {
            if self.blocked.iter().any(|p| pattern_matches(p, value)) {
                return Err(PolicyViolation::Blocked(value.to_string()));
            }
            if !self.allowed.is_empty() && !self.allowed.iter().any(|p| pattern_matches(p, value)) {
                return Err(PolicyViolation::NotAllowed(value.to_string()));
            }
        }
        Ok(())
    }

    /// Returns the configured default target
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns how many messages have been admitted
    pub fn processed(&self) -> u32 {
        self.processed
    }
}

fn pattern_matches(pattern: &str, value: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    let value = value.trim().to_ascii_lowercase();

    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}
