use engine::{analyze_batch, AnalysisOptions, BatchRequest};

fn request(code: &str) -> BatchRequest {
    BatchRequest {
        code: code.to_string(),
        source_url: "https://cdn.example.com/chunk.js".to_string(),
        force_script: false,
    }
}

#[test]
fn one_bad_item_does_not_spoil_the_rest() {
    let items = analyze_batch(
        &[
            request("document.body.innerHTML = location.hash;"),
            request("var = ;"),
            request("eval(document.referrer);"),
        ],
        &AnalysisOptions::default(),
    );
    assert_eq!(items.len(), 3);

    assert!(items[0].success);
    assert_eq!(items[0].security_sinks.len(), 1);
    assert!(items[0].error.is_none());

    assert!(!items[1].success);
    assert!(items[1].security_sinks.is_empty());
    assert!(items[1].error.as_deref().is_some_and(|e| !e.is_empty()));

    assert!(items[2].success);
    assert_eq!(items[2].security_sinks[0].kind, "eval");
}

#[test]
fn empty_batch_is_empty() {
    assert!(analyze_batch(&[], &AnalysisOptions::default()).is_empty());
}

#[test]
fn items_serialize_in_camel_case() {
    let items = analyze_batch(&[request("var = ;")], &AnalysisOptions::default());
    let json = serde_json::to_value(&items[0]).expect("json");
    assert_eq!(json["success"], false);
    assert!(json.get("securitySinks").is_some());
    assert!(json.get("dangerousPatterns").is_some());
    assert!(json["error"].is_string());
}

#[test]
fn requests_deserialize_with_defaults() {
    let req: BatchRequest =
        serde_json::from_str(r#"{"code": "fetch('/x')", "sourceUrl": "https://a.com/x.js"}"#)
            .expect("request");
    assert!(!req.force_script);
    let items = analyze_batch(&[req], &AnalysisOptions::default());
    assert!(items[0].success);
}
