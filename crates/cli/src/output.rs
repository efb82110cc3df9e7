use clap::ValueEnum;
use colored::Colorize;
use engine::{AnalysisResult, Severity};
use reporters::{self, FileReport, ScanInfo};

/// Supported output formats for results.
#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Sarif,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "sarif" => Ok(Format::Sarif),
            _ => Err("invalid format".into()),
        }
    }
}

impl From<Format> for reporters::Format {
    fn from(fmt: Format) -> Self {
        match fmt {
            Format::Text => reporters::Format::Text,
            Format::Json => reporters::Format::Json,
            Format::Sarif => reporters::Format::Sarif,
        }
    }
}

pub fn print_result(file: &str, result: &AnalysisResult, fmt: Format) -> anyhow::Result<()> {
    reporters::print_result(file, result, fmt.into())?;
    Ok(())
}

pub fn print_batch(reports: &[FileReport], fmt: Format, info: &ScanInfo) -> anyhow::Result<()> {
    reporters::print_batch(reports, fmt.into(), Some(info))?;
    Ok(())
}

/// Highest severity among security sinks and dangerous patterns.
pub fn max_severity<'a>(
    sinks: impl IntoIterator<Item = &'a engine::SecuritySink>,
    patterns: impl IntoIterator<Item = &'a engine::DangerousPattern>,
) -> Option<Severity> {
    sinks
        .into_iter()
        .map(|s| s.severity)
        .chain(patterns.into_iter().map(|p| p.severity))
        .max()
}

/// Whether `max` meets `threshold`; prints the verdict to stderr when it does.
pub fn threshold_reached(threshold: Option<Severity>, max: Option<Severity>) -> bool {
    let (Some(thr), Some(sev)) = (threshold, max) else {
        return false;
    };
    if sev < thr {
        return false;
    }
    eprintln!(
        "{} {} finding(s) at or above {}",
        "FAIL".red().bold(),
        sev.to_string().to_uppercase(),
        thr.to_string().to_uppercase()
    );
    true
}
