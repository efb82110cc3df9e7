use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn fail_on_threshold_controls_exit_code() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let file = tmp.path().join("handler.js");
    fs::write(
        &file,
        "window.addEventListener('message', function (e) { console.log(e.data); });\n",
    )?;

    Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("scan")
        .arg(&file)
        .arg("--fail-on")
        .arg("medium")
        .assert()
        .failure()
        .stderr(contains("FAIL"));

    Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("scan")
        .arg(&file)
        .arg("--fail-on")
        .arg("high")
        .assert()
        .success();

    Command::cargo_bin("jsrecon")?
        .env("HOME", tmp.path())
        .arg("analyze")
        .arg(&file)
        .arg("--fail-on")
        .arg("low")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn unknown_severity_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    Command::cargo_bin("jsrecon")?
        .arg("scan")
        .arg(tmp.path())
        .arg("--fail-on")
        .arg("critical")
        .assert()
        .failure()
        .stderr(contains("unknown severity"));
    Ok(())
}
