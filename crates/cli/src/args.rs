use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use regex::Regex;
use std::path::PathBuf;

use engine::Severity;

use crate::output::Format;

fn parse_severity(s: &str) -> Result<Severity, String> {
    s.parse()
}

fn parse_threads(s: &str) -> Result<usize, String> {
    let v: usize = s
        .parse()
        .map_err(|e: std::num::ParseIntError| e.to_string())?;
    if v == 0 {
        Err("threads must be greater than 0".into())
    } else {
        Ok(v)
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "jsrecon - static reconnaissance of JavaScript bundles",
    long_about = "jsrecon recovers the network API surface of a JavaScript bundle and reports \
client-side security findings.

Features:
• Network call sites (fetch, XMLHttpRequest, jQuery, beacons, sockets) with URL, method, headers and parameters
• Interprocedural resolution through wrappers and caller environments
• Value constraints mined from switch statements, comparisons and includes() checks
• Taint tracking from location, document and postMessage data into DOM, code and redirect sinks
• Dangerous patterns: postMessage origin checks, prototype pollution, dynamic regexes
• Multiple output formats (Text, JSON, SARIF)

Examples:
  jsrecon analyze app.js --format json     # Full analysis of one bundle
  jsrecon scan dist/ --fail-on high        # Security findings for a directory
  jsrecon cfg app.js --graph mermaid       # Top-level control flow graph",
    subcommand_required = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Show version information
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: Option<bool>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress log output
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a single bundle and print every result section
    Analyze(AnalyzeArgs),
    /// Scan a file or directory for security findings
    Scan(ScanArgs),
    /// Dump the lowered syntax tree of a file as JSON
    Ast(InspectArgs),
    /// Dump the control flow graph of a file
    Cfg(CfgArgs),
}

#[derive(ClapArgs)]
pub struct AnalyzeArgs {
    /// JavaScript file to analyze
    pub file: PathBuf,
    /// URL the bundle was served from; used to resolve its source map
    #[arg(long = "source-url", default_value = "")]
    pub source_url: String,
    /// Parse as a classic script instead of a module
    #[arg(long = "force-script")]
    pub force_script: bool,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
    /// Exit with error code if findings of this severity or higher are found
    #[arg(long = "fail-on", value_parser = parse_severity)]
    pub fail_on: Option<Severity>,
}

#[derive(ClapArgs)]
pub struct ScanArgs {
    /// Path to scan (file or directory)
    pub path: PathBuf,
    /// Output format for scan results
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
    /// Exit with error code if findings of this severity or higher are found
    #[arg(long = "fail-on", value_parser = parse_severity)]
    pub fail_on: Option<Severity>,
    /// Number of parallel threads to use for scanning
    #[arg(long, value_parser = parse_threads)]
    pub threads: Option<usize>,
    /// Exclude files matching these glob patterns
    #[arg(long, value_parser = crate::parse_exclude, value_delimiter = ',')]
    pub exclude: Vec<Regex>,
    /// Don't use default exclusion patterns
    #[arg(long)]
    pub no_default_exclude: bool,
    /// Maximum file size to scan (in bytes)
    #[arg(long)]
    pub max_file_size: Option<u64>,
    /// Base URL the scanned files are served under
    #[arg(long = "base-url", default_value = "")]
    pub base_url: String,
    /// Parse files as classic scripts instead of modules
    #[arg(long = "force-script")]
    pub force_script: bool,
}

#[derive(ClapArgs)]
pub struct InspectArgs {
    /// JavaScript file to inspect
    pub file: PathBuf,
    /// Parse as a classic script instead of a module
    #[arg(long = "force-script")]
    pub force_script: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Dot,
    Mermaid,
    Json,
}

#[derive(ClapArgs)]
pub struct CfgArgs {
    #[command(flatten)]
    pub input: InspectArgs,
    /// Graph output format
    #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
    pub graph: GraphFormat,
    /// Print the definitions reaching each node instead of the graph
    #[arg(long)]
    pub reaching: bool,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn parse_severity_rejects_invalid_input() {
        assert!(parse_severity("bogus").is_err());
        assert_eq!(parse_severity("HIGH"), Ok(Severity::High));
    }

    #[test]
    fn zero_threads_rejected() {
        assert!(parse_threads("0").is_err());
        assert_eq!(parse_threads("4"), Ok(4));
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
