use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use gobuild_core::config::{BuildOptions, ResolvedOptions};
use gobuild_core::graph::BuildPlan;

pub mod commands;

/// Environment variable carrying the JSON build options.
pub const GOOPT_ENV: &str = "GOOPT";

/// Where the plan is written when `--target` is not given.
pub const DEFAULT_TARGET: &str = "/out/gobuild.plan.json";

/// Parse and validate build options from the raw `GOOPT` value.
///
/// An unset or blank value is treated as an empty record, which fails
/// validation because it names no package.
pub fn load_build_options(raw: Option<&str>) -> Result<ResolvedOptions> {
    let options = match raw.map(str::trim) {
        Some(json) if !json.is_empty() => BuildOptions::from_json(json)
            .with_context(|| format!("Failed to parse {GOOPT_ENV}"))?,
        _ => BuildOptions::default(),
    };
    options.resolve().context("Invalid build options")
}

/// Read build options from the process environment.
pub fn load_build_options_from_env() -> Result<ResolvedOptions> {
    let raw = std::env::var(GOOPT_ENV).ok();
    load_build_options(raw.as_deref())
}

/// Write `plan` as pretty JSON to `target`, or to stdout when `target` is `-`.
pub fn write_plan(plan: &BuildPlan, target: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(plan).context("Failed to serialize build plan")?;
    if target == "-" {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{json}").context("Failed to write build plan to stdout")?;
        return Ok(());
    }

    let path = Path::new(target);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create plan directory: {}", parent.display()))?;
    }
    fs::write(path, json)
        .with_context(|| format!("Failed to write build plan: {}", path.display()))?;
    Ok(())
}

/// Load a previously written plan.
pub fn read_plan(path: &Path) -> Result<BuildPlan> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read build plan: {}", path.display()))?;
    serde_json::from_str(&json).context("Failed to parse build plan JSON")
}
