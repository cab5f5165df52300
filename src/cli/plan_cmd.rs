//! Plan command

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::output::Output;
use crate::domain::{DependencyGraph, DispatchPlan, DuplicateProvider, Message};
use crate::storage::read_batch;

#[derive(Serialize)]
struct PlanStep<'a> {
    index: usize,
    #[serde(rename = "type")]
    type_tag: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    provides: Option<String>,
    depends_on: Vec<usize>,
}

#[derive(Serialize)]
struct PlanReport<'a> {
    #[serde(flatten)]
    plan: &'a DispatchPlan,
    duplicates: &'a [DuplicateProvider],
    steps: Vec<PlanStep<'a>>,
}

pub fn run(batch: &Path, output: &Output) -> Result<()> {
    let messages = read_batch(batch)?;
    let graph = DependencyGraph::from_messages(&messages);
    let plan = graph.plan();

    let steps: Vec<PlanStep> = plan
        .order
        .iter()
        .map(|&index| step(index, &messages[index], &graph))
        .collect();

    if output.is_json() {
        output.data(&PlanReport {
            plan: &plan,
            duplicates: graph.duplicates(),
            steps,
        });
        return Ok(());
    }

    if let Some(cycle) = &plan.cycle {
        let path: Vec<String> = cycle.iter().map(usize::to_string).collect();
        output.warn(&format!(
            "dependency cycle {} -> {}, dispatching in input order",
            path.join(" -> "),
            path.first().map(String::as_str).unwrap_or_default()
        ));
    }
    for duplicate in graph.duplicates() {
        output.warn(&format!(
            "message {} declares {} already provided by message {}, ignoring",
            duplicate.ignored, duplicate.id, duplicate.first
        ));
    }

    for (position, step) in steps.iter().enumerate() {
        let depends: Vec<String> = step.depends_on.iter().map(usize::to_string).collect();
        output.row(&[
            &(position + 1).to_string(),
            &step.index.to_string(),
            step.type_tag,
            step.provides.as_deref().unwrap_or("-"),
            &if depends.is_empty() { "-".to_string() } else { depends.join(",") },
        ]);
    }

    Ok(())
}

fn step<'a>(index: usize, message: &'a Message, graph: &DependencyGraph) -> PlanStep<'a> {
    let provides = message
        .provided_id()
        .ok()
        .flatten()
        .filter(|id| graph.provider_of(id) == Some(index))
        .map(|id| id.to_string());

    PlanStep {
        index,
        type_tag: message.type_tag(),
        provides,
        depends_on: graph.dependencies(index),
    }
}
