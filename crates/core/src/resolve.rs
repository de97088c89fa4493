//! Recursive directory-to-package resolution.
//!
//! A [`Resolver`] is the context of one resolution pass. It owns the memo
//! table (absolute directory → [`BuildNode`]), the discovered vendor
//! directories, the synthesizer and the operation graph being built. A
//! package reachable through several import edges is classified and
//! synthesized once; every importer shares the same node.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::ResolvedOptions;
use crate::graph::{Artifact, OperationGraph};
use crate::package::{Classifier, Package};
use crate::source::SourceTree;
use crate::synth::{Archive, DirectDep, DirectDeps, Synthesizer, TransitiveDeps};
use crate::vendor::{strip_vendor, VendorDirs};
use crate::PlanError;

#[derive(Debug, Error)]
pub enum ImportResolutionError {
    #[error(
        "cannot find package {import:?} imported by {importer} (searched {})",
        display_paths(.searched)
    )]
    NotFound { import: String, importer: String, searched: Vec<PathBuf> },

    #[error("import cycle not allowed: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("local import {import:?} in {importer} is not supported")]
    LocalImport { import: String, importer: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

/// A resolved package together with its archive and dependency maps.
///
/// Written once when its directory is first resolved and shared by every
/// importer afterwards.
#[derive(Debug, Clone)]
pub struct BuildNode {
    pub package: Package,
    pub archive: Archive,
    pub direct_deps: DirectDeps,
    /// This package's dependencies and all of theirs, flattened.
    pub transitive_deps: TransitiveDeps,
    /// True when this package or anything it depends on contains cgo files.
    pub uses_foreign_functions: bool,
}

/// Context of one resolution pass.
pub struct Resolver<'a, C: Classifier + ?Sized> {
    options: &'a ResolvedOptions,
    classifier: &'a C,
    vendor: VendorDirs,
    memo: HashMap<PathBuf, Arc<BuildNode>>,
    loading: Vec<(PathBuf, String)>,
    synth: Synthesizer,
    graph: OperationGraph,
}

impl<'a, C: Classifier + ?Sized> Resolver<'a, C> {
    pub fn new(options: &'a ResolvedOptions, classifier: &'a C) -> Self {
        let source = SourceTree::new(options.source.clone(), options.mount_path.clone());
        Self {
            options,
            classifier,
            vendor: VendorDirs::new(options.gopath.clone()),
            memo: HashMap::new(),
            loading: Vec::new(),
            synth: Synthesizer::new(options.toolchain.clone(), options.platform.clone(), source),
            graph: OperationGraph::new(),
        }
    }

    /// Resolve the package at `<GOPATH>/src/<import_path>`.
    pub fn resolve_import_path(&mut self, import_path: &str) -> Result<Arc<BuildNode>, PlanError> {
        let dir = self.options.src_root().join(import_path);
        self.resolve(&dir)
    }

    /// Resolve the package in `dir`, reusing the node if already resolved.
    pub fn resolve(&mut self, dir: &Path) -> Result<Arc<BuildNode>, PlanError> {
        if let Some(node) = self.memo.get(dir) {
            return Ok(Arc::clone(node));
        }
        if let Some(start) = self.loading.iter().position(|(d, _)| d == dir) {
            let mut chain: Vec<String> =
                self.loading[start..].iter().map(|(_, ip)| ip.clone()).collect();
            chain.push(self.loading[start].1.clone());
            return Err(ImportResolutionError::Cycle { chain }.into());
        }

        let mut pkg = self.classifier.classify(dir, &self.options.platform)?;
        pkg.import_path = strip_vendor(&pkg.import_path).to_string();
        self.vendor.scan(dir);

        self.loading.push((dir.to_path_buf(), pkg.import_path.clone()));
        let result = self.load(pkg);
        self.loading.pop();

        let node = Arc::new(result?);
        self.memo.insert(dir.to_path_buf(), Arc::clone(&node));
        Ok(node)
    }

    fn load(&mut self, pkg: Package) -> Result<BuildNode, PlanError> {
        let mut direct = DirectDeps::new();
        let mut transitive = TransitiveDeps::new();
        let mut uses_foreign_functions = pkg.has_foreign_functions();

        for import in &pkg.imports {
            let Some(dep_dir) = self.locate(&pkg, import)? else {
                direct.insert(import.clone(), DirectDep::Toolchain);
                continue;
            };
            let dep = self.resolve(&dep_dir)?;
            transitive.extend(dep.transitive_deps.iter().map(|(k, v)| (k.clone(), v.clone())));
            direct.insert(import.clone(), DirectDep::archive(import, dep.archive.artifact.clone()));
            uses_foreign_functions |= dep.uses_foreign_functions;
        }
        // Direct dependencies win over same-named entries from other vendor scopes.
        for (import, dep) in &direct {
            if let DirectDep::Archive { artifact, .. } = dep {
                transitive.insert(import.clone(), artifact.clone());
            }
        }

        let archive = self.synth.synthesize(&mut self.graph, &pkg, &direct, &transitive)?;
        Ok(BuildNode {
            package: pkg,
            archive,
            direct_deps: direct,
            transitive_deps: transitive,
            uses_foreign_functions,
        })
    }

    /// Directory providing `import` for `pkg`, or `None` when the toolchain ships it.
    fn locate(
        &self,
        pkg: &Package,
        import: &str,
    ) -> Result<Option<PathBuf>, ImportResolutionError> {
        let local = import == "." || import == "..";
        if local || import.starts_with("./") || import.starts_with("../") {
            return Err(ImportResolutionError::LocalImport {
                import: import.to_string(),
                importer: pkg.import_path.clone(),
            });
        }
        if let Some(dir) = self.vendor.lookup(&pkg.dir, import) {
            return Ok(Some(dir));
        }
        let fallback = self.options.src_root().join(import);
        if fallback.is_dir() {
            return Ok(Some(fallback));
        }
        if is_toolchain_import(import) {
            return Ok(None);
        }

        let mut searched: Vec<PathBuf> =
            self.vendor.candidates(&pkg.dir).map(|vd| vd.join(import)).collect();
        searched.push(fallback);
        Err(ImportResolutionError::NotFound {
            import: import.to_string(),
            importer: pkg.import_path.clone(),
            searched,
        })
    }

    /// Emit the link step for a resolved command package.
    pub fn link(&mut self, node: &BuildNode) -> Result<Artifact, PlanError> {
        Ok(self.synth.link(&mut self.graph, node)?)
    }

    /// Every node resolved so far, keyed by absolute directory.
    pub fn nodes(&self) -> &HashMap<PathBuf, Arc<BuildNode>> {
        &self.memo
    }

    pub fn vendor_dirs(&self) -> &VendorDirs {
        &self.vendor
    }

    pub fn graph(&self) -> &OperationGraph {
        &self.graph
    }

    pub fn into_graph(self) -> OperationGraph {
        self.graph
    }
}

/// Standard-library style import path: first element has no dot.
pub fn is_toolchain_import(import: &str) -> bool {
    let first = import.split('/').next().unwrap_or(import);
    !first.is_empty() && !first.contains('.')
}
