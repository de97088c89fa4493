//! Per-package build-step synthesis.
//!
//! For each resolved package the synthesizer emits the operations that
//! turn its classified files into a compiled archive:
//!
//! - `compile` for the Go files, mounting every direct dependency's
//!   archive at `/work/<import path>.a`;
//! - for assembly packages, `asm` over the `.s` files using the header the
//!   compile step exported, then `pack r` to append the object;
//! - for cgo packages, the foreign-function pipeline in [`cgo`] followed
//!   by `pack r` of its combined object.
//!
//! Every archive artifact holds `<base>.a` at its root, where `<base>` is
//! the last element of the package's import path.

mod cgo;
mod link;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{PlatformConfig, Toolchain};
use crate::graph::{base_name, dir_name, Artifact, Exec, OperationGraph};
use crate::package::Package;
use crate::source::SourceTree;

pub use cgo::CgoOutputs;
pub use link::LinkError;

/// Archive member written by the Go compiler.
pub const GO_OBJECT: &str = "_go_.o";

/// Archive member holding the cgo pipeline's combined object.
pub const CGO_OBJECT: &str = "_all.o";

/// A synthesis-time contract violation between resolver and synthesizer.
#[derive(Debug, Error)]
pub enum InconsistentGraphError {
    #[error("missing input file {}", .path.display())]
    MissingInput { path: PathBuf },

    #[error("package {package} imports {import} but no dependency was resolved for it")]
    UndeclaredDependency { package: String, import: String },

    #[error("package {package} was given dependency {import} it does not import")]
    UnexpectedDependency { package: String, import: String },

    #[error("dependency {import} of {package} is missing from its transitive set")]
    TransitiveMismatch { package: String, import: String },
}

/// How a direct import is satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectDep {
    /// A package built in this pass.
    Archive {
        artifact: Artifact,
        /// Directory segment of the import path, `"."` for single-element paths.
        dir: String,
    },
    /// A package the toolchain ships precompiled.
    Toolchain,
}

/// Direct imports of a package, keyed by import path.
pub type DirectDeps = BTreeMap<String, DirectDep>;

/// Every archive a package needs to link, keyed by import path.
pub type TransitiveDeps = BTreeMap<String, Artifact>;

/// A package's compiled archive and the object names it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub artifact: Artifact,
    pub members: BTreeSet<String>,
}

/// Compile strategy selected from a package's file classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileRecipe {
    /// Pure Go; compiled with `-complete`.
    Go,
    /// Go plus Go assembly.
    Assembly,
    /// Go plus cgo files and optional native sources.
    ForeignFunctions,
    ForeignFunctionsAndAssembly,
}

impl CompileRecipe {
    pub fn for_package(pkg: &Package) -> Self {
        match (pkg.has_foreign_functions(), pkg.has_assembly()) {
            (false, false) => CompileRecipe::Go,
            (false, true) => CompileRecipe::Assembly,
            (true, false) => CompileRecipe::ForeignFunctions,
            (true, true) => CompileRecipe::ForeignFunctionsAndAssembly,
        }
    }

    pub fn assembly(self) -> bool {
        matches!(self, CompileRecipe::Assembly | CompileRecipe::ForeignFunctionsAndAssembly)
    }

    pub fn foreign_functions(self) -> bool {
        matches!(
            self,
            CompileRecipe::ForeignFunctions | CompileRecipe::ForeignFunctionsAndAssembly
        )
    }
}

/// Mount point of a dependency archive inside an operation.
pub fn archive_mount(import_path: &str) -> String {
    format!("/work/{import_path}.a")
}

/// File name of an archive inside its artifact.
pub fn archive_file(import_path: &str) -> String {
    format!("{}.a", base_name(import_path))
}

/// Scratch object directory for a package.
pub fn obj_dir(import_path: &str) -> String {
    format!("/work/{import_path}/_obj")
}

/// Name of the assembled object for a target platform.
pub fn asm_object(platform: &PlatformConfig) -> String {
    format!("asm_{}_{}.o", platform.goos, platform.goarch)
}

/// Emits build operations for packages of one resolution pass.
#[derive(Debug)]
pub struct Synthesizer {
    toolchain: Toolchain,
    platform: PlatformConfig,
    source: SourceTree,
    cgo_base: Option<Artifact>,
}

impl Synthesizer {
    pub fn new(toolchain: Toolchain, platform: PlatformConfig, source: SourceTree) -> Self {
        Self { toolchain, platform, source, cgo_base: None }
    }

    pub fn platform(&self) -> &PlatformConfig {
        &self.platform
    }

    fn go_base(&self) -> Artifact {
        Artifact::image(&self.toolchain.image)
    }

    /// Toolchain image with the native compiler installed, built once per pass.
    fn cgo_base(&mut self, graph: &mut OperationGraph) -> Artifact {
        if let Some(base) = &self.cgo_base {
            return base.clone();
        }
        let mut args: Vec<String> =
            ["apk", "add", "--no-cache"].iter().map(|s| s.to_string()).collect();
        args.extend(self.toolchain.native_packages.iter().cloned());
        let exec = Exec::new(self.go_base(), args).envs(&self.toolchain.env(&self.platform));
        let digest = graph.add(exec.build());
        let base = Artifact::output(&digest, 0);
        self.cgo_base = Some(base.clone());
        base
    }

    fn exec(&self, root: Artifact, args: Vec<String>) -> Exec {
        Exec::new(root, args).cwd("/root").envs(&self.toolchain.env(&self.platform))
    }

    /// Mount each named file of `pkg` from the source tree under `/root`.
    fn mount_sources<'f>(
        &mut self,
        exec: &mut Exec,
        pkg: &Package,
        files: impl IntoIterator<Item = &'f String>,
    ) -> Result<(), InconsistentGraphError> {
        for f in files {
            let (selector, digest) = self.source.file(&pkg.dir.join(f))?;
            exec.readonly_file(format!("/root/{f}"), self.source.artifact(), selector, digest);
        }
        Ok(())
    }

    /// Emit every operation needed to produce `pkg`'s archive.
    pub fn synthesize(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
        direct: &DirectDeps,
        transitive: &TransitiveDeps,
    ) -> Result<Archive, InconsistentGraphError> {
        check_deps(pkg, direct, transitive)?;
        let recipe = CompileRecipe::for_package(pkg);
        log::debug!("synthesizing {} with recipe {:?}", pkg.import_path, recipe);

        let cgo = if recipe.foreign_functions() {
            Some(self.cgo_pipeline(graph, pkg)?)
        } else {
            None
        };
        let (mut archive, header) = self.compile(graph, pkg, recipe, direct, cgo.as_ref())?;

        if let Some(header) = header {
            let object = self.assemble(graph, pkg, &header)?;
            let name = asm_object(&self.platform);
            archive = self.merge(graph, pkg, &archive, &object, &name);
        }
        if let Some(cgo) = &cgo {
            archive = self.merge(graph, pkg, &archive, &cgo.combined, CGO_OBJECT);
        }

        Ok(archive)
    }

    /// The Go compile step; also returns the assembly header output when requested.
    fn compile(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
        recipe: CompileRecipe,
        direct: &DirectDeps,
        cgo: Option<&CgoOutputs>,
    ) -> Result<(Archive, Option<Artifact>), InconsistentGraphError> {
        let ip = &pkg.import_path;
        let name = if pkg.is_command() { pkg.name.clone() } else { ip.clone() };
        let obj = obj_dir(ip);

        let mut args = vec![
            self.toolchain.tool("compile"),
            "-trimpath".to_string(),
            "/root".to_string(),
            "-o".to_string(),
            format!("/out/{}", archive_file(ip)),
            "-p".to_string(),
            name,
            "-I".to_string(),
            "/work".to_string(),
            "-pack".to_string(),
        ];
        if recipe == CompileRecipe::Go {
            args.push("-complete".to_string());
        }
        if recipe.assembly() {
            args.push("-asmhdr".to_string());
            args.push(format!("{obj}/go_asm.h"));
        }
        args.extend(pkg.go_files.iter().cloned());
        if cgo.is_some() {
            args.extend(cgo::go_sources(pkg));
        }

        let mut exec = self.exec(self.go_base(), args);
        for (import, dep) in direct {
            if let DirectDep::Archive { artifact, dir } = dep {
                let file = archive_file(import);
                let target = match dir.as_str() {
                    "." => format!("/work/{file}"),
                    dir => format!("/work/{dir}/{file}"),
                };
                exec.readonly(target, artifact, Some(&file));
            }
        }
        self.mount_sources(&mut exec, pkg, &pkg.go_files)?;
        if let Some(cgo) = cgo {
            for f in cgo::translated_go_files(pkg) {
                exec.readonly(format!("/root/{f}"), &cgo.generated, Some(&f));
            }
            exec.readonly("/root/_cgo_import.go", &cgo.dynimport, Some("_cgo_import.go"));
            exec.readonly("/root/_cgo_gotypes.go", &cgo.generated, Some("_cgo_gotypes.go"));
        }

        let header_slot = recipe.assembly().then(|| exec.output(obj.clone()));
        let archive_slot = exec.output("/out");
        let digest = graph.add(exec.build());

        let archive = Archive {
            artifact: Artifact::output(&digest, archive_slot.index()),
            members: BTreeSet::from([GO_OBJECT.to_string()]),
        };
        Ok((archive, header_slot.map(|slot| Artifact::output(&digest, slot.index()))))
    }

    /// Assemble the package's `.s` files against the exported Go header.
    fn assemble(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
        header: &Artifact,
    ) -> Result<Artifact, InconsistentGraphError> {
        let obj = obj_dir(&pkg.import_path);
        let mut args = vec![
            self.toolchain.tool("asm"),
            "-I".to_string(),
            format!("{obj}/"),
            "-I".to_string(),
            self.toolchain.include_dir.clone(),
            "-D".to_string(),
            format!("GOOS_{}", self.platform.goos),
            "-D".to_string(),
            format!("GOARCH_{}", self.platform.goarch),
            "-trimpath".to_string(),
            "/root".to_string(),
            "-o".to_string(),
            format!("/asm/{}", asm_object(&self.platform)),
        ];
        args.extend(pkg.s_files.iter().cloned());

        let mut exec = self.exec(self.go_base(), args);
        self.mount_sources(&mut exec, pkg, pkg.s_files.iter().chain(&pkg.h_files))?;
        exec.readonly(format!("{obj}/go_asm.h"), header, Some("go_asm.h"));
        let slot = exec.output("/asm");
        log::debug!("assembling {} file(s) for {}", pkg.s_files.len(), pkg.import_path);
        Ok(graph.run(exec, slot))
    }

    /// Append `object` to the archive as member `object_name`.
    ///
    /// Each merge targets the same archive file under a distinct member
    /// name, so merges commute.
    fn merge(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
        archive: &Archive,
        object: &Artifact,
        object_name: &str,
    ) -> Archive {
        let file = archive_file(&pkg.import_path);
        let args = vec![
            self.toolchain.tool("pack"),
            "r".to_string(),
            format!("/out/{file}"),
            format!("/obj/{object_name}"),
        ];
        let mut exec = self.exec(self.go_base(), args).cwd("/");
        let slot = exec.writable("/out", &archive.artifact, None);
        exec.readonly(format!("/obj/{object_name}"), object, Some(object_name));

        let mut members = archive.members.clone();
        members.insert(object_name.to_string());
        Archive { artifact: graph.run(exec, slot), members }
    }
}

/// Every import must have exactly one resolved dependency, and every built
/// dependency must also appear in the transitive set.
fn check_deps(
    pkg: &Package,
    direct: &DirectDeps,
    transitive: &TransitiveDeps,
) -> Result<(), InconsistentGraphError> {
    for import in &pkg.imports {
        if !direct.contains_key(import) {
            return Err(InconsistentGraphError::UndeclaredDependency {
                package: pkg.import_path.clone(),
                import: import.clone(),
            });
        }
    }
    for (import, dep) in direct {
        if !pkg.imports.contains(import) {
            return Err(InconsistentGraphError::UnexpectedDependency {
                package: pkg.import_path.clone(),
                import: import.clone(),
            });
        }
        if let DirectDep::Archive { artifact, .. } = dep {
            if transitive.get(import) != Some(artifact) {
                return Err(InconsistentGraphError::TransitiveMismatch {
                    package: pkg.import_path.clone(),
                    import: import.clone(),
                });
            }
        }
    }
    Ok(())
}

impl DirectDep {
    pub fn archive(import_path: &str, artifact: Artifact) -> Self {
        DirectDep::Archive { artifact, dir: dir_name(import_path).to_string() }
    }
}
