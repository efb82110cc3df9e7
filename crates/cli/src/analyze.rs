use anyhow::{Context, Result};
use std::fs;
use tracing::{debug, info};

use crate::args::AnalyzeArgs;
use crate::config::load_config;
use crate::output;

/// Analyzes one file and prints the full result; returns whether the
/// `--fail-on` threshold was met.
pub fn run_analyze(args: AnalyzeArgs) -> Result<bool> {
    let cfg = load_config().context("failed to load configuration")?;
    let code = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    debug!(file = %args.file.display(), bytes = code.len(), "Analyzing file");
    let result = engine::analyze_with_options(
        &code,
        &args.source_url,
        args.force_script,
        &cfg.analysis,
    )
    .with_context(|| format!("failed to analyze {}", args.file.display()))?;
    info!(
        call_sites = result.fetch_call_sites.len(),
        findings = result.security_sinks.len() + result.dangerous_patterns.len(),
        "Analysis completed"
    );

    let name = args.file.display().to_string();
    output::print_result(&name, &result, args.format)?;
    let max_sev = output::max_severity(&result.security_sinks, &result.dangerous_patterns);
    Ok(output::threshold_reached(args.fail_on, max_sev))
}
