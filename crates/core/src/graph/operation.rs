use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::artifact::{Artifact, Digest};

/// A filesystem mounted into an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Absolute path inside the operation's filesystem.
    pub target: String,
    /// Snapshot being mounted.
    pub source: Artifact,
    /// Sub-path of `source` to mount instead of its root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub readonly: bool,
    /// Content digest of the selected file, known for source-tree mounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Digest>,
}

/// A single toolchain invocation with declared inputs and outputs.
///
/// Output index `0` is the root filesystem after the command ran; each
/// writable mount contributes the next index, in mount order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub root: Artifact,
    pub args: Vec<String>,
    pub cwd: String,
    pub env: BTreeMap<String, String>,
    pub mounts: Vec<Mount>,
}

impl Operation {
    /// Content-derived identity of this operation.
    ///
    /// The hash covers the canonical JSON encoding, so two operations with
    /// the same command, environment and mounted inputs share a digest.
    pub fn digest(&self) -> Digest {
        // Serializing plain strings, maps and enums cannot fail.
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        Digest::of_bytes(&encoded)
    }

    /// Number of outputs this operation produces.
    pub fn output_count(&self) -> usize {
        1 + self.mounts.iter().filter(|m| !m.readonly).count()
    }

    /// Every artifact this operation reads from, including its root.
    pub fn inputs(&self) -> impl Iterator<Item = &Artifact> {
        std::iter::once(&self.root).chain(self.mounts.iter().map(|m| &m.source))
    }
}

/// Index of an output slot reserved while building an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSlot(usize);

impl OutputSlot {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Incrementally assembles an [`Operation`].
#[derive(Debug, Clone)]
pub struct Exec {
    op: Operation,
    outputs: usize,
}

impl Exec {
    pub fn new(root: Artifact, args: Vec<String>) -> Self {
        Self {
            op: Operation {
                root,
                args,
                cwd: "/".to_string(),
                env: BTreeMap::new(),
                mounts: Vec::new(),
            },
            outputs: 1,
        }
    }

    pub fn cwd(mut self, dir: impl Into<String>) -> Self {
        self.op.cwd = dir.into();
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.op.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Mount `source` (or its `selector` sub-path) read-only at `target`.
    pub fn readonly(
        &mut self,
        target: impl Into<String>,
        source: &Artifact,
        selector: Option<&str>,
    ) -> &mut Self {
        self.op.mounts.push(Mount {
            target: target.into(),
            source: source.clone(),
            selector: selector.map(str::to_string),
            readonly: true,
            content: None,
        });
        self
    }

    /// Mount a single source-tree file read-only, recording its content digest.
    pub fn readonly_file(
        &mut self,
        target: impl Into<String>,
        source: &Artifact,
        selector: String,
        content: Digest,
    ) -> &mut Self {
        self.op.mounts.push(Mount {
            target: target.into(),
            source: source.clone(),
            selector: Some(selector),
            readonly: true,
            content: Some(content),
        });
        self
    }

    /// Mount `source` writable at `target`; its post-run state becomes an output.
    pub fn writable(
        &mut self,
        target: impl Into<String>,
        source: &Artifact,
        selector: Option<&str>,
    ) -> OutputSlot {
        self.op.mounts.push(Mount {
            target: target.into(),
            source: source.clone(),
            selector: selector.map(str::to_string),
            readonly: false,
            content: None,
        });
        let slot = OutputSlot(self.outputs);
        self.outputs += 1;
        slot
    }

    /// Mount an empty directory at `target` and capture it as an output.
    pub fn output(&mut self, target: impl Into<String>) -> OutputSlot {
        self.writable(target, &Artifact::Scratch, None)
    }

    pub fn build(self) -> Operation {
        self.op
    }
}
