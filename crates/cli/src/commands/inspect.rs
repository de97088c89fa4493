use std::path::Path;

use anyhow::{Context, Result};
use gobuild_core::graph::{Artifact, BuildPlan};
use serde::Serialize;

use crate::read_plan;

/// One line of `inspect --json` output.
#[derive(Serialize)]
pub struct OperationSummary {
    pub digest: String,
    pub args: Vec<String>,
    pub mounts: usize,
    pub outputs: usize,
}

pub fn summarize(plan: &BuildPlan) -> Vec<OperationSummary> {
    plan.operations
        .iter()
        .map(|(digest, op)| OperationSummary {
            digest: digest.to_string(),
            args: op.args.clone(),
            mounts: op.mounts.len(),
            outputs: op.output_count(),
        })
        .collect()
}

fn describe(artifact: &Artifact) -> String {
    match artifact {
        Artifact::Scratch => "scratch".to_string(),
        Artifact::Image { reference } => format!("image {reference}"),
        Artifact::Source { name } => format!("source {name}"),
        Artifact::Output { op, index } => format!("{}[{}]", op.short(), index),
    }
}

/// List the operations of a written plan.
pub fn inspect_command(plan_path: &str, json: bool) -> Result<()> {
    let plan = read_plan(Path::new(plan_path))?;
    let summaries = summarize(&plan);

    if json {
        for summary in &summaries {
            let line = serde_json::to_string(summary)
                .context("Failed to serialize operation summary to JSON")?;
            println!("{line}");
        }
        return Ok(());
    }

    println!("Plan for {}", plan.package);
    println!("  Output: {}", describe(&plan.output));
    println!("Operations ({}):", summaries.len());
    if summaries.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for (digest, op) in plan.operations.iter() {
        println!("  - {} [{} mount(s)] {}", digest.short(), op.mounts.len(), op.args.join(" "));
    }
    Ok(())
}
