//! Formatters for analysis results in text, JSON and SARIF.
//! Provide human and tool-friendly output.

use engine::{
    AnalysisResult, BatchItem, CallSite, DangerousPattern, ParamLocation, SecuritySink, Severity,
};
use serde::Serialize;
use std::io::{self, Write};

mod sarif;

pub use sarif::{batch_to_sarif, result_to_sarif};

/// Returns the severity colored with simple ANSI codes.
fn color_severity(sev: Severity) -> String {
    let (code, text) = match sev {
        Severity::Info => ("\x1b[32m", "INFO"),
        Severity::Low => ("\x1b[32m", "LOW"),
        Severity::Medium => ("\x1b[33m", "MEDIUM"),
        Severity::High => ("\x1b[31m", "HIGH"),
    };
    format!("{code}{text}\x1b[0m")
}

fn simple_box(title: &str) -> String {
    let width = title.len() + 2;
    format!(
        "╭{}╮\n│ {} │\n╰{}╯\n",
        "─".repeat(width),
        title,
        "─".repeat(width)
    )
}

fn scan_stats(info: &ScanInfo) -> String {
    let mut output = String::new();
    output.push_str(&simple_box("Scan Status"));
    output.push('\n');
    output.push_str(&format!(
        "    Analyzed {} JavaScript files:\n\n",
        info.files_analyzed
    ));
    output.push_str("    Metric                    Value\n");
    output.push_str(
        "    ──────────────────────────────────────────────────────────────────────────────\n",
    );
    output.push_str(&format!(
        "    Duration                  {}ms\n",
        info.duration_ms
    ));
    output.push_str(&format!(
        "    Failed files              {}\n",
        info.failed_files
    ));
    output.push_str(&format!(
        "    Success rate              {:.1}%\n",
        if info.files_analyzed > 0 {
            ((info.files_analyzed - info.failed_files) as f64 / info.files_analyzed as f64) * 100.0
        } else {
            0.0
        }
    ));
    output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Supported output formats.
pub enum Format {
    /// Human-readable output in plain text.
    Text,
    /// JSON structure for integrations.
    Json,
    /// Report conforming to the SARIF specification.
    Sarif,
}

/// One scanned file and its batch outcome.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    #[serde(flatten)]
    pub item: BatchItem,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchOut<'a> {
    files: &'a [FileReport],
    total_findings: usize,
}

/// Additional information displayed above batch results.
pub struct ScanInfo {
    pub files_analyzed: usize,
    pub duration_ms: u64,
    pub failed_files: usize,
}

/// Prints the full analysis of one file.
///
/// # Example
/// ```
/// use reporters::{print_result, Format};
/// let result = engine::analyze("fetch('/api/users');", "", false).unwrap();
/// print_result("app.js", &result, Format::Json).unwrap();
/// ```
pub fn print_result(file: &str, result: &AnalysisResult, fmt: Format) -> io::Result<()> {
    let mut out = io::stdout();
    write_result(&mut out, file, result, fmt)
}

/// Prints the outcome of a multi-file scan.
pub fn print_batch(
    reports: &[FileReport],
    fmt: Format,
    scan_info: Option<&ScanInfo>,
) -> io::Result<()> {
    let mut out = io::stdout();
    write_batch(&mut out, reports, fmt, scan_info)
}

pub fn write_result<W: Write>(
    out: &mut W,
    file: &str,
    result: &AnalysisResult,
    fmt: Format,
) -> io::Result<()> {
    match fmt {
        Format::Text => {
            writeln!(out, "{}", simple_box(file))?;
            write_call_sites(out, &result.fetch_call_sites)?;
            if !result.value_constraints.is_empty() {
                writeln!(out, "Value constraints:")?;
                for c in &result.value_constraints {
                    let values: Vec<String> = c.values.iter().map(|v| v.to_string()).collect();
                    writeln!(out, "    {} ∈ {{{}}}", c.variable, values.join(", "))?;
                }
                writeln!(out)?;
            }
            if !result.proto_enums.is_empty() || !result.proto_field_maps.is_empty() {
                writeln!(out, "Protobuf:")?;
                for e in &result.proto_enums {
                    let values: Vec<String> =
                        e.values.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    writeln!(
                        out,
                        "    enum {} {{{}}}",
                        e.name.as_deref().unwrap_or("<anonymous>"),
                        values.join(", ")
                    )?;
                }
                for m in &result.proto_field_maps {
                    let fields: Vec<String> =
                        m.fields.iter().map(|(n, a)| format!("{n}:{a}")).collect();
                    writeln!(out, "    message {} [{}]", m.message, fields.join(", "))?;
                }
                writeln!(out)?;
            }
            if let Some(url) = &result.source_map_url {
                writeln!(out, "Source map: {url}\n")?;
            }
            write_findings(out, file, &result.security_sinks, &result.dangerous_patterns)?;
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, result)?;
            writeln!(out)?;
        }
        Format::Sarif => {
            let sarif = sarif::result_to_sarif(file, result);
            serde_json::to_writer_pretty(&mut *out, &sarif)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn write_batch<W: Write>(
    out: &mut W,
    reports: &[FileReport],
    fmt: Format,
    scan_info: Option<&ScanInfo>,
) -> io::Result<()> {
    match fmt {
        Format::Text => {
            if let Some(info) = scan_info {
                writeln!(out, "{}", scan_stats(info))?;
            }
            let mut total = 0;
            for r in reports {
                if let Some(err) = &r.item.error {
                    writeln!(out, "✘ {}: {err}", r.file)?;
                    continue;
                }
                let n = r.item.security_sinks.len() + r.item.dangerous_patterns.len();
                if n == 0 {
                    continue;
                }
                total += n;
                write_findings(out, &r.file, &r.item.security_sinks, &r.item.dangerous_patterns)?;
            }
            if total == 0 {
                writeln!(out, "{}", simple_box("Results"))?;
                writeln!(out, "✔ No issues found.")?;
            } else {
                writeln!(out, "Total: {total}")?;
            }
        }
        Format::Json => {
            let total_findings = reports
                .iter()
                .map(|r| r.item.security_sinks.len() + r.item.dangerous_patterns.len())
                .sum();
            let json = BatchOut {
                files: reports,
                total_findings,
            };
            serde_json::to_writer_pretty(&mut *out, &json)?;
            writeln!(out)?;
        }
        Format::Sarif => {
            let sarif = sarif::batch_to_sarif(reports);
            serde_json::to_writer_pretty(&mut *out, &sarif)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn write_call_sites<W: Write>(out: &mut W, sites: &[CallSite]) -> io::Result<()> {
    if sites.is_empty() {
        return Ok(());
    }
    writeln!(out, "Network call sites ({}):", sites.len())?;
    for s in sites {
        writeln!(out, "    {:<7} {} [{}]", s.method, s.url, s.kind)?;
        for (name, value) in &s.headers {
            writeln!(out, "        header {name}: {value}")?;
        }
        for p in &s.params {
            let mut line = format!("        {} {}: {}", location_name(p.location), p.name, p.ty);
            if !p.required {
                line.push('?');
            }
            if let Some(d) = &p.default_value {
                line.push_str(&format!(" = {d}"));
            }
            if let Some(v) = &p.valid_values {
                line.push_str(&format!(" one of [{}]", v.join(", ")));
            }
            writeln!(out, "{line}")?;
        }
    }
    writeln!(out)
}

fn location_name(l: ParamLocation) -> &'static str {
    match l {
        ParamLocation::Path => "path",
        ParamLocation::Query => "query",
        ParamLocation::Body => "body",
        ParamLocation::Header => "header",
    }
}

fn write_findings<W: Write>(
    out: &mut W,
    file: &str,
    sinks: &[SecuritySink],
    patterns: &[DangerousPattern],
) -> io::Result<()> {
    writeln!(out, "{}", simple_box("Results"))?;
    if sinks.is_empty() && patterns.is_empty() {
        writeln!(out, "✔ No issues found.")?;
        return Ok(());
    }
    writeln!(out, "⚠ Found {} issue(s):\n", sinks.len() + patterns.len())?;
    for s in sinks {
        let (line, column) = s.location.map_or((0, 0), |l| (l.line, l.column));
        writeln!(
            out,
            "{} {}:{}:{} {}/{}",
            color_severity(s.severity),
            file,
            line,
            column,
            s.kind,
            s.sink
        )?;
        writeln!(out, "    {}", sink_message(s))?;
        if let Some(ctx) = &s.code_context {
            writeln!(out, "    ↳  {}", ctx.trim())?;
        }
        writeln!(out)?;
    }
    for p in patterns {
        let (line, column) = p.location.map_or((0, 0), |l| (l.line, l.column));
        writeln!(
            out,
            "{} {}:{}:{} {}",
            color_severity(p.severity),
            file,
            line,
            column,
            p.kind
        )?;
        writeln!(out, "    {}", p.description)?;
        writeln!(out)?;
    }
    Ok(())
}

/// One-line description of a security sink.
pub(crate) fn sink_message(s: &SecuritySink) -> String {
    let source = s.source.as_deref().unwrap_or("user input");
    if s.sanitized {
        format!("{source} reaches {} after sanitization", s.sink)
    } else {
        format!("{source} reaches {} unsanitized", s.sink)
    }
}

#[cfg(test)]
mod tests;
