#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use gobuild_core::config::{BuildOptions, PlatformConfig, ResolvedOptions};
use gobuild_core::graph::{Operation, OperationGraph};
use gobuild_core::package::{ClassificationError, Classifier, Package, SourceClassifier};
use tempfile::TempDir;

/// A throwaway GOPATH on disk.
pub struct GoTree {
    dir: TempDir,
}

impl GoTree {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("tempdir") }
    }

    pub fn gopath(&self) -> &Path {
        self.dir.path()
    }

    /// `<GOPATH>/src/<rel>`.
    pub fn src(&self, rel: &str) -> PathBuf {
        self.gopath().join("src").join(rel)
    }

    /// Write `contents` to `<GOPATH>/src/<rel>`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.src(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(&path, contents).expect("write source file");
        self
    }

    pub fn options(&self, pkg: &str) -> ResolvedOptions {
        self.build_options(pkg, false)
    }

    pub fn cgo_options(&self, pkg: &str) -> ResolvedOptions {
        self.build_options(pkg, true)
    }

    fn build_options(&self, pkg: &str, cgo: bool) -> ResolvedOptions {
        BuildOptions {
            pkg: Some(pkg.to_string()),
            gopath: Some(self.gopath().to_path_buf()),
            goos: Some("linux".to_string()),
            goarch: Some("amd64".to_string()),
            cgo_enabled: cgo,
            ..Default::default()
        }
        .resolve()
        .expect("valid options")
    }

    pub fn classifier(&self) -> SourceClassifier {
        SourceClassifier::new(self.gopath())
    }
}

pub fn linux_amd64() -> PlatformConfig {
    PlatformConfig::new("linux", "amd64")
}

/// Wraps the on-disk classifier and remembers every directory it was asked about.
pub struct RecordingClassifier {
    inner: SourceClassifier,
    pub seen: RefCell<Vec<PathBuf>>,
}

impl RecordingClassifier {
    pub fn new(inner: SourceClassifier) -> Self {
        Self { inner, seen: RefCell::new(Vec::new()) }
    }
}

impl Classifier for RecordingClassifier {
    fn classify(
        &self,
        dir: &Path,
        platform: &PlatformConfig,
    ) -> Result<Package, ClassificationError> {
        self.seen.borrow_mut().push(dir.to_path_buf());
        self.inner.classify(dir, platform)
    }
}

/// Operations whose argv contains `needle` as a whole argument.
pub fn ops_with<'a>(graph: &'a OperationGraph, needle: &str) -> Vec<&'a Operation> {
    graph.iter().map(|(_, op)| op).filter(|op| op.args.iter().any(|a| a == needle)).collect()
}

/// The Go compile operation writing `<base>.a`.
pub fn compile_op<'a>(graph: &'a OperationGraph, base: &str) -> &'a Operation {
    let out = format!("/out/{base}.a");
    graph
        .by_tool("compile")
        .find(|op| op.args.iter().any(|a| *a == out))
        .unwrap_or_else(|| panic!("no compile operation for {base}"))
}

pub fn mount_targets(op: &Operation) -> Vec<&str> {
    op.mounts.iter().map(|m| m.target.as_str()).collect()
}
