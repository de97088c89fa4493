//! Declarative operation graph handed to the execution engine.
//!
//! The graph only *describes* work: every [`Operation`] names the command
//! to run, the artifacts it mounts and the outputs it declares. Nothing
//! here executes anything. Operations are keyed by a content digest so an
//! engine can deduplicate and cache them across builds.

mod artifact;
mod operation;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use artifact::{Artifact, Digest};
pub use operation::{Exec, Mount, Operation, OutputSlot};

/// Digest-keyed set of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationGraph {
    operations: BTreeMap<Digest, Operation>,
}

impl OperationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation and return its digest.
    ///
    /// Adding an operation identical to one already present is a no-op.
    pub fn add(&mut self, op: Operation) -> Digest {
        let digest = op.digest();
        self.operations.entry(digest.clone()).or_insert(op);
        digest
    }

    /// Finalize `exec`, add it, and return the artifact for `slot`.
    pub fn run(&mut self, exec: Exec, slot: OutputSlot) -> Artifact {
        let digest = self.add(exec.build());
        Artifact::output(&digest, slot.index())
    }

    pub fn get(&self, digest: &Digest) -> Option<&Operation> {
        self.operations.get(digest)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Digest, &Operation)> {
        self.operations.iter()
    }

    /// The operation that produced `artifact`, if it was produced by one.
    pub fn producer(&self, artifact: &Artifact) -> Option<&Operation> {
        artifact.producer().and_then(|d| self.operations.get(d))
    }

    /// Operations whose program (first argv element) ends with `tool`.
    pub fn by_tool<'a>(&'a self, tool: &'a str) -> impl Iterator<Item = &'a Operation> + 'a {
        self.operations.values().filter(move |op| {
            op.args.first().map(|p| p.rsplit('/').next() == Some(tool)).unwrap_or(false)
        })
    }
}

/// A complete, internally consistent build plan for one executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Import path of the command package the plan builds.
    pub package: String,
    /// Artifact containing the linked executable.
    pub output: Artifact,
    pub operations: OperationGraph,
}

/// `path.Dir` for slash-separated import paths; `"."` when there is no slash.
pub fn dir_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => ".",
    }
}

/// `path.Base` for slash-separated import paths.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Replace the extension `old` on `file` with `new`.
pub fn with_ext(file: &str, old: &str, new: &str) -> String {
    let stem = file.strip_suffix(&format!(".{old}")).unwrap_or(file);
    format!("{stem}.{new}")
}
