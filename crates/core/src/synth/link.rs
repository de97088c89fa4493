use thiserror::Error;

use crate::graph::{base_name, Artifact, OperationGraph};
use crate::resolve::BuildNode;

use super::{archive_file, archive_mount, Synthesizer};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{import_path} is package {name}, not a command; only package main can be linked")]
    NotCommand { import_path: String, name: String },
}

impl Synthesizer {
    /// Emit the link operation producing the executable for `node`.
    ///
    /// The node's transitive map already holds every archive the linker
    /// needs, so the graph is not walked again. The executable is written
    /// to the output artifact's root, named after the last import path
    /// element.
    pub fn link(
        &mut self,
        graph: &mut OperationGraph,
        node: &BuildNode,
    ) -> Result<Artifact, LinkError> {
        let pkg = &node.package;
        if !pkg.is_command() {
            return Err(LinkError::NotCommand {
                import_path: pkg.import_path.clone(),
                name: pkg.name.clone(),
            });
        }

        let ip = &pkg.import_path;
        let args = vec![
            self.toolchain.tool("link"),
            "-o".to_string(),
            format!("/out/{}", base_name(ip)),
            "-L".to_string(),
            "/work".to_string(),
            "-linkmode=internal".to_string(),
            "-extld=gcc".to_string(),
            "-extldflags".to_string(),
            "-static".to_string(),
            "-buildmode=exe".to_string(),
            archive_mount(ip),
        ];

        // Native code anywhere in the closure needs the native toolchain around.
        let base = if node.uses_foreign_functions { self.cgo_base(graph) } else { self.go_base() };
        let mut exec = self.exec(base, args).cwd("/");
        exec.readonly(archive_mount(ip), &node.archive.artifact, Some(&archive_file(ip)));
        for (import, artifact) in &node.transitive_deps {
            exec.readonly(archive_mount(import), artifact, Some(&archive_file(import)));
        }
        let slot = exec.output("/out");
        log::debug!("linking {} against {} archive(s)", ip, node.transitive_deps.len() + 1);
        Ok(graph.run(exec, slot))
    }
}
