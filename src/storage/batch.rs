//! Message batch files
//!
//! Accepts three layouts:
//! - a JSON array of messages
//! - an envelope object `{"items": [...]}` (the agent output format)
//! - JSONL, one message per line

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;

use crate::domain::Message;

#[derive(Debug, Error, PartialEq)]
pub enum BatchError {
    #[error("Invalid message at position {index}: {reason}")]
    InvalidMessage { index: usize, reason: String },

    #[error("Invalid JSON at line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    #[error("Batch envelope must contain an 'items' array")]
    MissingItems,
}

/// Parses batch content in any supported layout
pub fn parse_batch(content: &str) -> Result<Vec<Message>, BatchError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => decode_items(items),
        Ok(Value::Object(mut object)) if !object.contains_key("type") => {
            match object.remove("items") {
                Some(Value::Array(items)) => decode_items(items),
                _ => Err(BatchError::MissingItems),
            }
        }
        Ok(single @ Value::Object(_)) => decode_items(vec![single]),
        _ => parse_lines(content),
    }
}

/// Reads and parses a batch file
pub fn read_batch(path: &Path) -> Result<Vec<Message>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch: {}", path.display()))?;

    parse_batch(&content).with_context(|| format!("Failed to parse batch: {}", path.display()))
}

fn decode_items(items: Vec<Value>) -> Result<Vec<Message>, BatchError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|e| BatchError::InvalidMessage {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

fn parse_lines(content: &str) -> Result<Vec<Message>, BatchError> {
    let mut messages = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let message: Message = serde_json::from_str(line).map_err(|e| BatchError::InvalidLine {
            line: line_num + 1,
            reason: e.to_string(),
        })?;

        messages.push(message);
    }

    Ok(messages)
}
