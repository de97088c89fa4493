use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Content-derived identity of an operation, rendered as `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Hash arbitrary bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Digest(format!("sha256:{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for logs and listings.
    pub fn short(&self) -> &str {
        let hex = self.0.strip_prefix("sha256:").unwrap_or(&self.0);
        hex.get(..12).unwrap_or(hex)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable handle to a filesystem snapshot.
///
/// Artifacts are never modified. An operation that mounts an artifact
/// writable produces a *new* artifact (one of its outputs); the input
/// handle keeps referring to the original snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// An empty filesystem.
    Scratch,
    /// A container image used as a root filesystem.
    Image { reference: String },
    /// The externally supplied source tree.
    Source { name: String },
    /// Output `index` of the operation identified by `op`.
    Output { op: Digest, index: usize },
}

impl Artifact {
    pub fn image(reference: impl Into<String>) -> Self {
        Artifact::Image { reference: reference.into() }
    }

    pub fn source(name: impl Into<String>) -> Self {
        Artifact::Source { name: name.into() }
    }

    pub fn output(op: &Digest, index: usize) -> Self {
        Artifact::Output { op: op.clone(), index }
    }

    /// The operation that produced this artifact, if any.
    pub fn producer(&self) -> Option<&Digest> {
        match self {
            Artifact::Output { op, .. } => Some(op),
            _ => None,
        }
    }
}
