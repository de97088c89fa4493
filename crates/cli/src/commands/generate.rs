use anyhow::{Context, Result};
use gobuild_core::config::ResolvedOptions;
use gobuild_core::graph::BuildPlan;
use gobuild_core::package::SourceClassifier;

use crate::{load_build_options_from_env, write_plan};

/// Plan the build described by `options` against the local source tree.
pub fn plan_from_options(options: &ResolvedOptions) -> Result<BuildPlan> {
    let classifier = SourceClassifier::new(&options.gopath);
    gobuild_core::plan_executable(options, &classifier)
        .with_context(|| format!("Failed to plan build of {}", options.pkg))
}

/// Read `GOOPT`, plan the executable and write the plan to `target`.
pub fn generate_command(target: &str) -> Result<()> {
    let options = load_build_options_from_env()?;
    log::info!(
        "planning {} for {}/{} (cgo: {})",
        options.pkg,
        options.platform.goos,
        options.platform.goarch,
        options.platform.cgo_enabled
    );

    let plan = plan_from_options(&options)?;
    write_plan(&plan, target)?;
    if target != "-" {
        println!("Wrote build plan:");
        println!("  Package: {}", plan.package);
        println!("  Operations: {}", plan.operations.len());
        println!("  Target: {target}");
    }
    Ok(())
}
