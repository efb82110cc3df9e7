use assert_cmd::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn project() -> Result<tempfile::TempDir, Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let root = tmp.path();
    fs::create_dir_all(root.join("dist/chunks"))?;
    fs::create_dir_all(root.join("node_modules/lib"))?;
    fs::write(
        root.join("dist/main.js"),
        "document.body.innerHTML = location.hash;\n",
    )?;
    fs::write(
        root.join("dist/chunks/worker.mjs"),
        "window.addEventListener('message', function (e) { console.log(e.data); });\n",
    )?;
    fs::write(root.join("dist/broken.js"), "var = ;\n")?;
    fs::write(root.join("dist/readme.txt"), "eval(location.hash)\n")?;
    fs::write(root.join("node_modules/lib/index.js"), "eval(location.hash);\n")?;
    Ok(tmp)
}

#[test]
fn scan_reports_each_file() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = project()?;
    let output = Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("scan")
        .arg(tmp.path())
        .arg("--format")
        .arg("json")
        .arg("--threads")
        .arg("2")
        .output()?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let files = json["files"].as_array().expect("files");
    let names: Vec<&str> = files.iter().filter_map(|f| f["file"].as_str()).collect();
    assert_eq!(
        names,
        vec!["dist/broken.js", "dist/chunks/worker.mjs", "dist/main.js"]
    );
    assert_eq!(files[0]["success"], false);
    assert!(files[0]["error"].is_string());
    assert_eq!(files[1]["dangerousPatterns"][0]["type"], "postmessage-no-origin");
    assert_eq!(files[2]["securitySinks"][0]["sink"], "innerHTML");
    assert_eq!(json["totalFindings"], 2);
    Ok(())
}

#[test]
fn exclusions_apply() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = project()?;
    let output = Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("scan")
        .arg(tmp.path())
        .arg("--format")
        .arg("json")
        .arg("--exclude")
        .arg("**/chunks/**")
        .arg("--no-default-exclude")
        .output()?;
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let names: Vec<&str> = json["files"]
        .as_array()
        .expect("files")
        .iter()
        .filter_map(|f| f["file"].as_str())
        .collect();
    assert!(names.contains(&"node_modules/lib/index.js"));
    assert!(!names.iter().any(|n| n.contains("chunks")));
    Ok(())
}

#[test]
fn oversized_files_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    fs::write(tmp.path().join("small.js"), "fetch('/a');\n")?;
    fs::write(
        tmp.path().join("big.js"),
        "eval(location.hash);\n".repeat(100),
    )?;
    let output = Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("scan")
        .arg(tmp.path())
        .arg("--format")
        .arg("json")
        .arg("--max-file-size")
        .arg("64")
        .output()?;
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["files"].as_array().map(|f| f.len()), Some(1));
    assert_eq!(json["files"][0]["file"], "small.js");
    Ok(())
}

#[test]
fn sarif_has_one_result_per_finding() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = project()?;
    let output = Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("scan")
        .arg(tmp.path())
        .arg("--format")
        .arg("sarif")
        .output()?;
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["version"], "2.1.0");
    let results = json["runs"][0]["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert!(results.iter().any(|r| r["ruleId"] == "xss/innerHTML"));
    Ok(())
}

#[test]
fn text_scan_shows_stats_and_logs() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = project()?;
    Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("scan")
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(
            contains("Scan Status")
                .and(contains("Failed files              1"))
                .and(contains("dist/main.js")),
        )
        .stderr(
            contains("Scan started")
                .and(contains("Files queued"))
                .and(contains("Scan completed")),
        );
    Ok(())
}

#[test]
fn invalid_format_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    Command::cargo_bin("jsrecon")?
        .arg("scan")
        .arg(tmp.path())
        .arg("--format")
        .arg("xml")
        .assert()
        .failure()
        .stderr(contains("invalid value"));
    Ok(())
}
