//! Classification of a source directory into a [`Package`].
//!
//! The resolver consumes classification through the [`Classifier`] trait.
//! [`SourceClassifier`] is the on-disk implementation: it lists a
//! directory, applies file-name and comment build constraints for the
//! target platform, and reads each surviving file's package clause,
//! imports and `#cgo` directives.

pub mod constraint;
pub mod scan;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PlatformConfig;
use constraint::{file_name_matches, TagSet};
use scan::{cgo_directives, read_header, Constraints};

/// A directory that cannot be described as a buildable package.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not under the import root {}", .dir.display(), .root.display())]
    OutsideRoot { dir: PathBuf, root: PathBuf },

    #[error("no buildable Go source files in {}", .dir.display())]
    NoGoFiles { dir: PathBuf },

    #[error("found packages {} in {}", .names.join(", "), .dir.display())]
    MultiplePackages { dir: PathBuf, names: Vec<String> },

    #[error("{}: {message}", .file.display())]
    Parse { file: PathBuf, message: String },

    #[error("C source files not allowed when not using cgo: {}", .dir.display())]
    NativeWithoutCgo { dir: PathBuf },
}

/// Resolved description of one compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Absolute source directory.
    pub dir: PathBuf,
    /// Declared package name.
    pub name: String,
    /// Dependency-graph key; vendor prefixes are stripped by the resolver.
    pub import_path: String,
    pub go_files: Vec<String>,
    /// Go files importing `"C"`.
    pub cgo_files: Vec<String>,
    pub c_files: Vec<String>,
    pub h_files: Vec<String>,
    /// Headers below `dir`, slash-separated and relative to it. Collected for
    /// cgo packages, whose native compiles may include them by subpath.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_headers: Vec<String>,
    pub s_files: Vec<String>,
    pub cgo_cflags: Vec<String>,
    pub cgo_ldflags: Vec<String>,
    /// Sorted, de-duplicated import paths, excluding `"C"`.
    pub imports: Vec<String>,
}

impl Package {
    /// An empty package description for `dir`.
    pub fn new(
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        import_path: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            import_path: import_path.into(),
            go_files: Vec::new(),
            cgo_files: Vec::new(),
            c_files: Vec::new(),
            h_files: Vec::new(),
            nested_headers: Vec::new(),
            s_files: Vec::new(),
            cgo_cflags: Vec::new(),
            cgo_ldflags: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Whether this package links into an executable.
    pub fn is_command(&self) -> bool {
        self.name == "main"
    }

    pub fn has_foreign_functions(&self) -> bool {
        !self.cgo_files.is_empty()
    }

    pub fn has_assembly(&self) -> bool {
        !self.s_files.is_empty()
    }

    /// Every file of this package read from the source tree.
    pub fn source_files(&self) -> impl Iterator<Item = &String> {
        self.go_files
            .iter()
            .chain(&self.cgo_files)
            .chain(&self.c_files)
            .chain(&self.h_files)
            .chain(&self.nested_headers)
            .chain(&self.s_files)
    }
}

/// Describes a directory as a package for a target platform.
pub trait Classifier {
    fn classify(&self, dir: &Path, platform: &PlatformConfig)
        -> Result<Package, ClassificationError>;
}

/// Classifies directories on the local filesystem below `<root>/src`.
#[derive(Debug, Clone)]
pub struct SourceClassifier {
    src_root: PathBuf,
}

impl SourceClassifier {
    /// `root` is the GOPATH-equivalent root; import paths are relative to `root/src`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { src_root: root.as_ref().join("src") }
    }

    fn import_path(&self, dir: &Path) -> Result<String, ClassificationError> {
        let rel = dir.strip_prefix(&self.src_root).map_err(|_| ClassificationError::OutsideRoot {
            dir: dir.to_path_buf(),
            root: self.src_root.clone(),
        })?;
        let parts: Vec<String> =
            rel.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
        if parts.is_empty() {
            return Err(ClassificationError::OutsideRoot {
                dir: dir.to_path_buf(),
                root: self.src_root.clone(),
            });
        }
        Ok(parts.join("/"))
    }
}

impl Classifier for SourceClassifier {
    fn classify(
        &self,
        dir: &Path,
        platform: &PlatformConfig,
    ) -> Result<Package, ClassificationError> {
        let import_path = self.import_path(dir)?;
        let tags = TagSet::new(platform);

        let entries = fs::read_dir(dir)
            .map_err(|source| ClassificationError::Io { path: dir.to_path_buf(), source })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|source| ClassificationError::Io { path: dir.to_path_buf(), source })?;
            let is_file = entry
                .file_type()
                .map_err(|source| ClassificationError::Io { path: entry.path(), source })?
                .is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();

        let mut pkg = Package::new(dir, "", import_path);
        let mut package_names = BTreeSet::new();
        let mut imports = BTreeSet::new();

        for name in names {
            if name.starts_with('_') || name.starts_with('.') || name.ends_with("_test.go") {
                continue;
            }
            let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
            if !matches!(ext, "go" | "c" | "h" | "s" | "S") {
                continue;
            }
            if !file_name_matches(&name, &tags) {
                log::debug!("skipping {name}: file name constraint");
                continue;
            }

            let path = dir.join(&name);
            let bytes = fs::read(&path)
                .map_err(|source| ClassificationError::Io { path: path.clone(), source })?;
            // Only Go sources must be UTF-8; native files may carry any encoding.
            let src = if ext == "go" {
                match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        return Err(ClassificationError::Parse {
                            file: path,
                            message: "invalid UTF-8 encoding".to_string(),
                        })
                    }
                }
            } else {
                String::from_utf8_lossy(&bytes).into_owned()
            };
            let satisfied = Constraints::read(&src)
                .satisfied(&tags)
                .map_err(|message| ClassificationError::Parse { file: path.clone(), message })?;
            if !satisfied {
                log::debug!("skipping {name}: build constraints");
                continue;
            }

            match ext {
                "go" => {}
                "c" => {
                    pkg.c_files.push(name);
                    continue;
                }
                "h" => {
                    pkg.h_files.push(name);
                    continue;
                }
                _ => {
                    pkg.s_files.push(name);
                    continue;
                }
            }

            let header = read_header(&src)
                .map_err(|message| ClassificationError::Parse { file: path.clone(), message })?;
            if header.uses_cgo {
                if !platform.cgo_enabled {
                    log::debug!("skipping {name}: cgo disabled");
                    continue;
                }
                let flags = cgo_directives(&header.cgo_preamble, &tags)
                    .map_err(|message| ClassificationError::Parse { file: path.clone(), message })?;
                pkg.cgo_cflags.extend(flags.cflags);
                pkg.cgo_ldflags.extend(flags.ldflags);
                pkg.cgo_files.push(name);
            } else {
                pkg.go_files.push(name);
            }
            if header.package != "documentation" {
                package_names.insert(header.package);
            }
            imports.extend(header.imports);
        }

        if pkg.go_files.is_empty() && pkg.cgo_files.is_empty() {
            return Err(ClassificationError::NoGoFiles { dir: dir.to_path_buf() });
        }
        if package_names.len() > 1 {
            return Err(ClassificationError::MultiplePackages {
                dir: dir.to_path_buf(),
                names: package_names.into_iter().collect(),
            });
        }
        if !pkg.c_files.is_empty() && pkg.cgo_files.is_empty() {
            return Err(ClassificationError::NativeWithoutCgo { dir: dir.to_path_buf() });
        }

        if pkg.has_foreign_functions() {
            pkg.nested_headers = nested_headers(dir)?;
        }
        pkg.name = package_names.into_iter().next().unwrap_or_else(|| "documentation".to_string());
        pkg.imports = imports.into_iter().collect();
        log::debug!(
            "classified {} as {} ({} go, {} cgo, {} c, {} asm, {} imports)",
            dir.display(),
            pkg.import_path,
            pkg.go_files.len(),
            pkg.cgo_files.len(),
            pkg.c_files.len(),
            pkg.s_files.len(),
            pkg.imports.len()
        );
        Ok(pkg)
    }
}

/// Header files in subdirectories of `dir`, skipping `vendor`, `testdata`
/// and hidden or underscore-prefixed directories.
fn nested_headers(dir: &Path) -> Result<Vec<String>, ClassificationError> {
    let mut found = Vec::new();
    let mut pending = vec![(dir.to_path_buf(), String::new())];
    while let Some((path, rel)) = pending.pop() {
        let entries = fs::read_dir(&path)
            .map_err(|source| ClassificationError::Io { path: path.clone(), source })?;
        for entry in entries {
            let entry =
                entry.map_err(|source| ClassificationError::Io { path: path.clone(), source })?;
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry
                .file_type()
                .map_err(|source| ClassificationError::Io { path: entry.path(), source })?;
            if file_type.is_dir() {
                let skipped = name == "vendor"
                    || name == "testdata"
                    || name.starts_with('.')
                    || name.starts_with('_');
                if !skipped {
                    pending.push((entry.path(), format!("{rel}{name}/")));
                }
            } else if file_type.is_file() && !rel.is_empty() && is_header(&name) {
                found.push(format!("{rel}{name}"));
            }
        }
    }
    found.sort();
    Ok(found)
}

fn is_header(name: &str) -> bool {
    matches!(name.rsplit_once('.'), Some((_, "h" | "hh" | "hpp" | "hxx")))
}
