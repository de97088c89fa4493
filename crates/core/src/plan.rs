use crate::config::ResolvedOptions;
use crate::graph::BuildPlan;
use crate::package::Classifier;
use crate::resolve::Resolver;
use crate::PlanError;

/// Plan the build of the command package named by `options.pkg`.
///
/// Resolves the package and everything it imports, synthesizes each
/// package's archive, and emits the final link step. The returned plan's
/// `output` artifact holds the executable at its root.
pub fn plan_executable<C: Classifier + ?Sized>(
    options: &ResolvedOptions,
    classifier: &C,
) -> Result<BuildPlan, PlanError> {
    let mut resolver = Resolver::new(options, classifier);
    let root = resolver.resolve_import_path(&options.pkg)?;
    let output = resolver.link(&root)?;

    log::info!(
        "planned {}: {} package(s), {} vendor dir(s), {} operation(s)",
        root.package.import_path,
        resolver.nodes().len(),
        resolver.vendor_dirs().dirs().len(),
        resolver.graph().len()
    );

    Ok(BuildPlan {
        package: root.package.import_path.clone(),
        output,
        operations: resolver.into_graph(),
    })
}
