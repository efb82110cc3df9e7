//! Conversion of findings to SARIF 2.1.0 specification.

use engine::{AnalysisResult, DangerousPattern, Location, SecuritySink, Severity};
use serde_sarif::sarif;

use crate::{sink_message, FileReport};

fn level(sev: Severity) -> sarif::ResultLevel {
    match sev {
        Severity::Info | Severity::Low => sarif::ResultLevel::Note,
        Severity::Medium => sarif::ResultLevel::Warning,
        Severity::High => sarif::ResultLevel::Error,
    }
}

fn location(file: &str, loc: Option<Location>) -> sarif::Location {
    let artifact = sarif::ArtifactLocation::builder()
        .uri(file.to_string())
        .build();
    let physical = match loc {
        Some(l) => sarif::PhysicalLocation::builder()
            .artifact_location(artifact)
            .region(
                sarif::Region::builder()
                    .start_line(l.line as i64)
                    .start_column(l.column as i64)
                    .build(),
            )
            .build(),
        None => sarif::PhysicalLocation::builder()
            .artifact_location(artifact)
            .build(),
    };
    sarif::Location::builder()
        .physical_location(physical)
        .build()
}

fn sink_result(file: &str, s: &SecuritySink) -> sarif::Result {
    sarif::Result::builder()
        .rule_id(format!("{}/{}", s.kind, s.sink))
        .message(sarif::Message::builder().text(sink_message(s)).build())
        .level(level(s.severity))
        .locations(vec![location(file, s.location)])
        .build()
}

fn pattern_result(file: &str, p: &DangerousPattern) -> sarif::Result {
    sarif::Result::builder()
        .rule_id(p.kind.clone())
        .message(sarif::Message::builder().text(p.description.clone()).build())
        .level(level(p.severity))
        .locations(vec![location(file, p.location)])
        .build()
}

fn results_for(
    file: &str,
    sinks: &[SecuritySink],
    patterns: &[DangerousPattern],
) -> Vec<sarif::Result> {
    sinks
        .iter()
        .map(|s| sink_result(file, s))
        .chain(patterns.iter().map(|p| pattern_result(file, p)))
        .collect()
}

fn wrap(results: Vec<sarif::Result>) -> sarif::Sarif {
    sarif::Sarif::builder()
        .version(serde_json::json!("2.1.0"))
        .schema(sarif::SCHEMA_URL.to_string())
        .runs(vec![sarif::Run::builder()
            .tool(
                sarif::Tool::builder()
                    .driver(
                        sarif::ToolComponent::builder()
                            .name("jsrecon")
                            .version(env!("CARGO_PKG_VERSION").to_string())
                            .build(),
                    )
                    .build(),
            )
            .results(results)
            .build()])
        .build()
}

/// One SARIF result per security sink and dangerous pattern of `result`.
pub fn result_to_sarif(file: &str, result: &AnalysisResult) -> sarif::Sarif {
    wrap(results_for(
        file,
        &result.security_sinks,
        &result.dangerous_patterns,
    ))
}

/// Results of every successfully analyzed file in one run.
pub fn batch_to_sarif(reports: &[FileReport]) -> sarif::Sarif {
    let results = reports
        .iter()
        .flat_map(|r| {
            results_for(&r.file, &r.item.security_sinks, &r.item.dangerous_patterns)
        })
        .collect();
    wrap(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(kind: &str, name: &str, severity: Severity, line: usize) -> SecuritySink {
        SecuritySink {
            kind: kind.into(),
            sink: name.into(),
            severity,
            source: Some("location.hash".into()),
            source_type: Some("user-controlled".into()),
            code_context: None,
            location: Some(Location { line, column: 1 }),
            sanitized: severity == Severity::Info,
        }
    }

    #[test]
    fn one_result_per_finding() {
        let result = AnalysisResult {
            security_sinks: vec![
                sink("xss", "innerHTML", Severity::High, 3),
                sink("eval", "eval", Severity::Info, 7),
            ],
            dangerous_patterns: vec![DangerousPattern {
                kind: "postmessage-no-origin".into(),
                severity: Severity::Medium,
                description: "message handler without origin check".into(),
                location: Some(Location { line: 9, column: 5 }),
            }],
            ..AnalysisResult::default()
        };

        let sarif = result_to_sarif("static/app.js", &result);
        let json = serde_json::to_value(&sarif).expect("json");
        assert_eq!(json["version"], "2.1.0");
        let results = json["runs"][0]["results"].as_array().expect("results");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["ruleId"], "xss/innerHTML");
        assert_eq!(results[0]["level"], "error");
        assert_eq!(results[1]["level"], "note");
        assert_eq!(results[2]["ruleId"], "postmessage-no-origin");
        assert_eq!(results[2]["level"], "warning");
        let region = &results[2]["locations"][0]["physicalLocation"]["region"];
        assert_eq!(region["startLine"], 9);
        assert_eq!(region["startColumn"], 5);
        assert_eq!(
            json["runs"][0]["tool"]["driver"]["name"],
            serde_json::json!("jsrecon")
        );
    }

    #[test]
    fn failed_files_contribute_nothing() {
        let reports = vec![FileReport {
            file: "broken.js".into(),
            item: engine::BatchItem {
                error: Some("syntax error".into()),
                ..engine::BatchItem::default()
            },
        }];
        let json = serde_json::to_value(batch_to_sarif(&reports)).expect("json");
        assert!(json["runs"][0]["results"]
            .as_array()
            .map_or(true, |r| r.is_empty()));
    }
}
