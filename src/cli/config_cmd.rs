//! Config command

use std::path::Path;

use anyhow::Result;

use super::output::Output;
use crate::domain::MessageType;
use crate::storage::{load_config_file, partition, HandlerConfig};

pub fn run(file: &Path, project_config: Option<&Path>, output: &Output) -> Result<()> {
    let primary = load_config_file(file)?;
    let project = project_config.map(load_config_file).transpose()?;
    let config = partition(Some(&primary), project.as_ref())?;

    if output.is_json() {
        output.data(&config);
        return Ok(());
    }

    for (bucket, entries) in [("regular", &config.regular), ("project", &config.project)] {
        for (key, handler) in entries {
            if key.parse::<MessageType>().is_err() {
                output.warn(&format!("'{}' is not a known message type and will be ignored", key));
            }
            output.row(&[bucket, key, &describe(handler)]);
        }
    }

    Ok(())
}

fn describe(handler: &HandlerConfig) -> String {
    let mut parts = Vec::new();
    if let Some(max) = handler.max {
        parts.push(format!("max={}", max));
    }
    if !handler.allowed.is_empty() {
        parts.push(format!("allowed={}", handler.allowed.join(",")));
    }
    if !handler.blocked.is_empty() {
        parts.push(format!("blocked={}", handler.blocked.join(",")));
    }
    if let Some(target) = &handler.target {
        parts.push(format!("target={}", target));
    }

    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(" ")
    }
}
