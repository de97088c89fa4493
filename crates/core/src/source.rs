use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::graph::{Artifact, Digest};
use crate::synth::InconsistentGraphError;

/// The externally supplied source tree and where it is visible locally.
///
/// Files are addressed by absolute local path and exposed to operations
/// as selectors relative to the mount path. Content digests are computed
/// on first use and remembered for the rest of the pass.
#[derive(Debug, Clone)]
pub struct SourceTree {
    artifact: Artifact,
    mount_path: PathBuf,
    digests: HashMap<PathBuf, Digest>,
}

impl SourceTree {
    pub fn new(name: impl Into<String>, mount_path: impl Into<PathBuf>) -> Self {
        Self {
            artifact: Artifact::source(name),
            mount_path: mount_path.into(),
            digests: HashMap::new(),
        }
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    /// Selector of `path` inside the source artifact, slash-separated.
    pub fn selector(&self, path: &Path) -> Result<String, InconsistentGraphError> {
        let rel = path
            .strip_prefix(&self.mount_path)
            .map_err(|_| InconsistentGraphError::MissingInput { path: path.to_path_buf() })?;
        let parts: Vec<String> =
            rel.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
        Ok(parts.join("/"))
    }

    /// Selector and content digest of the file at `path`.
    pub fn file(&mut self, path: &Path) -> Result<(String, Digest), InconsistentGraphError> {
        let selector = self.selector(path)?;
        if let Some(digest) = self.digests.get(path) {
            return Ok((selector, digest.clone()));
        }
        let bytes = fs::read(path)
            .map_err(|_| InconsistentGraphError::MissingInput { path: path.to_path_buf() })?;
        let digest = Digest::of_bytes(&bytes);
        self.digests.insert(path.to_path_buf(), digest.clone());
        Ok((selector, digest))
    }
}
