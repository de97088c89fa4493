//! The foreign-function (cgo) pipeline.
//!
//! Stages, each a separate operation:
//!
//! 1. `cgo` preprocesses every cgo file into `<f>.cgo1.go` / `<f>.cgo2.c`
//!    plus the shared `_cgo_gotypes.go`, `_cgo_export.{c,h}` and
//!    `_cgo_main.c`, all in one output.
//! 2. One `gcc -c` per native translation unit: the generated `.c` files
//!    and the package's own `.c` files. Units never read each other's
//!    objects, so each compile is cached on its own.
//! 3. `_cgo_.o`: all objects linked together.
//! 4. `cgo -dynimport` over `_cgo_.o` writes `_cgo_import.go`.
//! 5. `_all.o`: a relocatable link of every object except `_cgo_main.o`,
//!    which is what the package archive receives.

use crate::graph::{with_ext, Artifact, OperationGraph};
use crate::package::Package;

use super::{obj_dir, InconsistentGraphError, Synthesizer};

/// Generated glue translation units, compiled ahead of per-file sources.
const EXPORT_UNIT: &str = "_cgo_export.c";
const MAIN_UNIT: &str = "_cgo_main.c";

/// Artifacts the Go compile step consumes from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgoOutputs {
    /// Preprocess output: translated Go and C sources plus shared headers.
    pub generated: Artifact,
    /// Holds `_cgo_import.go`.
    pub dynimport: Artifact,
    /// Holds `_all.o`.
    pub combined: Artifact,
}

/// `<f>.cgo1.go` for every cgo file.
pub(super) fn translated_go_files(pkg: &Package) -> Vec<String> {
    pkg.cgo_files.iter().map(|f| with_ext(f, "go", "cgo1.go")).collect()
}

/// Go sources the compile step adds for a cgo package, in argv order.
pub(super) fn go_sources(pkg: &Package) -> Vec<String> {
    let mut files = translated_go_files(pkg);
    files.push("_cgo_import.go".to_string());
    files.push("_cgo_gotypes.go".to_string());
    files
}

/// Native compiler flags selecting the target word size.
fn arch_flags(goarch: &str) -> Vec<String> {
    match goarch {
        "amd64" => vec!["-m64".to_string()],
        "386" => vec!["-m32".to_string()],
        "arm" => vec!["-marm".to_string()],
        _ => Vec::new(),
    }
}

/// A translation unit and where it is read from.
struct Unit {
    file: String,
    generated: bool,
}

impl Unit {
    fn object(&self) -> String {
        with_ext(&self.file, "c", "o")
    }
}

impl Synthesizer {
    fn cflags(&self, pkg: &Package) -> Vec<String> {
        pkg.cgo_cflags.iter().map(|f| f.replace("${SRCDIR}", "/root")).collect()
    }

    fn ldflags(&self, pkg: &Package) -> Vec<String> {
        pkg.cgo_ldflags.iter().map(|f| f.replace("${SRCDIR}", "/root")).collect()
    }

    /// Emit the whole pipeline for `pkg`.
    pub(super) fn cgo_pipeline(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
    ) -> Result<CgoOutputs, InconsistentGraphError> {
        let base = self.cgo_base(graph);
        let generated = self.preprocess(graph, pkg, &base)?;

        let mut units = vec![
            Unit { file: EXPORT_UNIT.to_string(), generated: true },
            Unit { file: MAIN_UNIT.to_string(), generated: true },
        ];
        units.extend(
            pkg.cgo_files
                .iter()
                .map(|f| Unit { file: with_ext(f, "go", "cgo2.c"), generated: true }),
        );
        units.extend(pkg.c_files.iter().map(|f| Unit { file: f.clone(), generated: false }));

        let mut objects = Vec::with_capacity(units.len());
        for unit in &units {
            let object = self.compile_unit(graph, pkg, &base, &generated, unit)?;
            objects.push((unit.object(), object));
        }
        log::debug!("cgo: {} native compile(s) for {}", objects.len(), pkg.import_path);

        let main_object = with_ext(MAIN_UNIT, "c", "o");
        let mut link_args = vec!["-g".to_string(), "-O2".to_string()];
        link_args.extend(self.ldflags(pkg));
        let cgo_o = self.link_objects(graph, pkg, &base, &objects, "_cgo_.o", &link_args);
        let dynimport = self.dynimport(graph, pkg, &base, &cgo_o);

        let partial: Vec<(String, Artifact)> =
            objects.iter().filter(|(name, _)| *name != main_object).cloned().collect();
        let partial_args: Vec<String> =
            ["-g", "-O2", "-Wl,-r", "-nostdlib", "-no-pie", "-Wl,--build-id=none"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        let combined =
            self.link_objects(graph, pkg, &base, &partial, super::CGO_OBJECT, &partial_args);

        Ok(CgoOutputs { generated, dynimport, combined })
    }

    fn preprocess(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
        base: &Artifact,
    ) -> Result<Artifact, InconsistentGraphError> {
        let obj = obj_dir(&pkg.import_path);
        let mut args = vec![
            self.toolchain.tool("cgo"),
            "-objdir".to_string(),
            format!("{obj}/"),
            "-importpath".to_string(),
            pkg.import_path.clone(),
            "--".to_string(),
            "-I".to_string(),
            format!("{obj}/"),
            "-g".to_string(),
            "-O2".to_string(),
        ];
        args.extend(self.cflags(pkg));
        args.extend(pkg.cgo_files.iter().cloned());

        let mut exec = self.exec(base.clone(), args);
        let inputs = pkg.cgo_files.iter().chain(&pkg.h_files).chain(&pkg.nested_headers);
        self.mount_sources(&mut exec, pkg, inputs)?;
        let slot = exec.output(obj);
        Ok(graph.run(exec, slot))
    }

    fn compile_unit(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
        base: &Artifact,
        generated: &Artifact,
        unit: &Unit,
    ) -> Result<Artifact, InconsistentGraphError> {
        let obj = obj_dir(&pkg.import_path);
        let input = if unit.generated {
            format!("{obj}/{}", unit.file)
        } else {
            format!("/root/{}", unit.file)
        };

        let mut args =
            vec!["gcc".to_string(), "-I".to_string(), ".".to_string(), "-fPIC".to_string()];
        args.extend(arch_flags(&self.platform.goarch));
        args.extend(
            ["-pthread", "-gno-record-gcc-switches", "-fmessage-length=0", "-I"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(format!("{obj}/"));
        args.push("-g".to_string());
        args.push("-O2".to_string());
        args.extend(self.cflags(pkg));
        args.extend(["-o".to_string(), format!("/out/{}", unit.object()), "-c".to_string(), input]);

        let mut exec = self.exec(base.clone(), args);
        exec.readonly(obj, generated, None);
        if !unit.generated {
            self.mount_sources(&mut exec, pkg, std::iter::once(&unit.file))?;
        }
        self.mount_sources(&mut exec, pkg, pkg.h_files.iter().chain(&pkg.nested_headers))?;
        let slot = exec.output("/out");
        Ok(graph.run(exec, slot))
    }

    /// Link `objects` into `/out/<output>`.
    fn link_objects(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
        base: &Artifact,
        objects: &[(String, Artifact)],
        output: &str,
        trailing: &[String],
    ) -> Artifact {
        let mut args = vec!["gcc".to_string(), "-fPIC".to_string()];
        args.extend(arch_flags(&self.platform.goarch));
        args.extend(
            ["-pthread", "-fmessage-length=0", "-gno-record-gcc-switches", "-o"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(format!("/out/{output}"));
        args.extend(objects.iter().map(|(name, _)| format!("/root/{name}")));
        args.extend(trailing.iter().cloned());

        let mut exec = self.exec(base.clone(), args);
        for (name, artifact) in objects {
            exec.readonly(format!("/root/{name}"), artifact, Some(name));
        }
        let slot = exec.output("/out");
        log::debug!(
            "cgo: linking {} object(s) into {} for {}",
            objects.len(),
            output,
            pkg.import_path
        );
        graph.run(exec, slot)
    }

    fn dynimport(
        &mut self,
        graph: &mut OperationGraph,
        pkg: &Package,
        base: &Artifact,
        cgo_o: &Artifact,
    ) -> Artifact {
        let args = vec![
            self.toolchain.tool("cgo"),
            "-dynpackage".to_string(),
            pkg.name.clone(),
            "-dynimport".to_string(),
            "/root/_cgo_.o".to_string(),
            "-dynout".to_string(),
            "/out/_cgo_import.go".to_string(),
        ];
        let mut exec = self.exec(base.clone(), args);
        exec.readonly("/root/_cgo_.o", cgo_o, Some("_cgo_.o"));
        let slot = exec.output("/out");
        graph.run(exec, slot)
    }
}
