use assert_cmd::prelude::*;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn quiet_hides_logs() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let file = tmp.path().join("app.js");
    fs::write(&file, "fetch('/api/a');")?;

    Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("scan")
        .arg(&file)
        .arg("--quiet")
        .assert()
        .success()
        .stderr(contains("Scan started").not().and(contains("Scan completed").not()));
    Ok(())
}

#[test]
fn debug_shows_pass_details() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let file = tmp.path().join("app.js");
    fs::write(&file, "fetch('/api/a');")?;

    Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("--debug")
        .arg("analyze")
        .arg(&file)
        .assert()
        .success()
        .stderr(contains("analysis finished").and(contains("DEBUG")));

    Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("analyze")
        .arg(&file)
        .assert()
        .success()
        .stderr(contains("analysis finished").not());
    Ok(())
}
