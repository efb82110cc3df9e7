use crate::{write_batch, write_result, FileReport, Format, ScanInfo};
use engine::{AnalysisResult, BatchItem};

fn sample() -> AnalysisResult {
    engine::analyze(
        r#"
        function load(id) { return fetch("/api/users/" + id + "?expand=1", { method: "PUT" }); }
        document.body.innerHTML = location.hash;
        "#,
        "https://example.com/app.js",
        false,
    )
    .expect("analyze")
}

fn render<F: FnOnce(&mut Vec<u8>)>(f: F) -> String {
    let mut buf = Vec::new();
    f(&mut buf);
    String::from_utf8(buf).expect("utf8").replace("\r\n", "\n")
}

#[test]
fn json_is_the_result_itself() {
    let result = sample();
    let rendered = render(|b| write_result(b, "app.js", &result, Format::Json).expect("write"));
    let back: AnalysisResult = serde_json::from_str(&rendered).expect("parse back");
    assert_eq!(back, result);
    assert!(rendered.contains("\"fetchCallSites\""));
    assert!(rendered.contains("\"securitySinks\""));
}

#[test]
fn text_lists_call_sites_and_findings() {
    let result = sample();
    let rendered = render(|b| write_result(b, "app.js", &result, Format::Text).expect("write"));
    assert!(rendered.contains("PUT     /api/users/{id}?expand=1 [fetch]"));
    assert!(rendered.contains("path id: string"));
    assert!(rendered.contains("query expand: string? = \"1\""));
    assert!(rendered.contains("app.js:3:"));
    assert!(rendered.contains("xss/innerHTML"));
    assert!(rendered.contains("location.hash reaches innerHTML unsanitized"));
}

#[test]
fn empty_result_says_so() {
    let rendered = render(|b| {
        write_result(b, "empty.js", &AnalysisResult::default(), Format::Text).expect("write")
    });
    assert!(rendered.contains("No issues found"));
}

#[test]
fn batch_text_reports_failures_and_stats() {
    let reports = vec![
        FileReport {
            file: "ok.js".into(),
            item: BatchItem {
                success: true,
                security_sinks: sample().security_sinks,
                ..BatchItem::default()
            },
        },
        FileReport {
            file: "broken.js".into(),
            item: BatchItem {
                error: Some("unexpected token at line 1, column 4".into()),
                ..BatchItem::default()
            },
        },
    ];
    let info = ScanInfo {
        files_analyzed: 2,
        duration_ms: 12,
        failed_files: 1,
    };
    let rendered =
        render(|b| write_batch(b, &reports, Format::Text, Some(&info)).expect("write"));
    assert!(rendered.contains("Scan Status"));
    assert!(rendered.contains("Success rate              50.0%"));
    assert!(rendered.contains("✘ broken.js: unexpected token"));
    assert!(rendered.contains("ok.js:3:"));
    assert!(rendered.contains("Total: 1"));
}

#[test]
fn batch_json_flattens_items() {
    let reports = vec![FileReport {
        file: "broken.js".into(),
        item: BatchItem {
            error: Some("boom".into()),
            ..BatchItem::default()
        },
    }];
    let rendered = render(|b| write_batch(b, &reports, Format::Json, None).expect("write"));
    let json: serde_json::Value = serde_json::from_str(&rendered).expect("json");
    assert_eq!(json["totalFindings"], 0);
    assert_eq!(json["files"][0]["file"], "broken.js");
    assert_eq!(json["files"][0]["success"], false);
    assert_eq!(json["files"][0]["error"], "boom");
}
