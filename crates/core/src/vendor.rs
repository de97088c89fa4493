//! Discovery and ordering of `vendor` directories.
//!
//! Every directory loaded during a pass is probed, together with its
//! ancestors up to the configured root, for an adjacent `vendor`
//! directory. Probed directories are remembered so the upward walk is
//! amortized across the whole pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Vendor roots discovered during one resolution pass, deepest first.
#[derive(Debug, Clone)]
pub struct VendorDirs {
    root: PathBuf,
    dirs: Vec<PathBuf>,
    checked: HashSet<PathBuf>,
}

impl VendorDirs {
    /// `root` bounds the upward walk and is never probed itself.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), dirs: Vec::new(), checked: HashSet::new() }
    }

    /// Probe `dir` and its ancestors below the root for `vendor` directories.
    pub fn scan(&mut self, dir: &Path) {
        let mut current = Some(dir);
        while let Some(d) = current {
            if d == self.root || !d.starts_with(&self.root) {
                break;
            }
            if !self.checked.insert(d.to_path_buf()) {
                // Ancestors of a probed directory were probed with it.
                break;
            }
            let candidate = d.join("vendor");
            if candidate.is_dir() {
                log::debug!("found vendor directory {}", candidate.display());
                self.insert(candidate);
            }
            current = d.parent();
        }
    }

    fn insert(&mut self, dir: PathBuf) {
        let depth = dir.components().count();
        let pos = self
            .dirs
            .iter()
            .position(|d| {
                let d_depth = d.components().count();
                d_depth < depth || (d_depth == depth && d.as_path() < dir.as_path())
            })
            .unwrap_or(self.dirs.len());
        self.dirs.insert(pos, dir);
    }

    /// All discovered vendor roots, deepest first.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Vendor roots visible from `importer`, nearest first.
    ///
    /// A vendor directory is visible to code inside the directory that
    /// contains it, at any depth.
    pub fn candidates<'a>(
        &'a self,
        importer: &'a Path,
    ) -> impl Iterator<Item = &'a PathBuf> + 'a {
        self.dirs
            .iter()
            .filter(move |vd| vd.parent().map(|p| importer.starts_with(p)).unwrap_or(false))
    }

    /// First visible vendor root containing a directory for `import`.
    pub fn lookup(&self, importer: &Path, import: &str) -> Option<PathBuf> {
        self.candidates(importer).map(|vd| vd.join(import)).find(|d| d.is_dir())
    }

    pub fn probed(&self) -> usize {
        self.checked.len()
    }
}

/// Strip everything through the last `vendor/` component of an import path.
pub fn strip_vendor(import_path: &str) -> &str {
    if let Some(i) = import_path.rfind("/vendor/") {
        return &import_path[i + "/vendor/".len()..];
    }
    import_path.strip_prefix("vendor/").unwrap_or(import_path)
}
