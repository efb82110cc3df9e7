use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn config_excludes_and_limits_apply() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    let cfg_dir = home.path().join(".config").join("jsrecon");
    fs::create_dir_all(&cfg_dir)?;
    fs::write(
        cfg_dir.join("config.toml"),
        r#"
[analysis]
max_caller_depth = 0

[scan]
exclude = ["**/legacy/**"]
"#,
    )?;

    let project = tempdir()?;
    fs::create_dir_all(project.path().join("legacy"))?;
    fs::write(project.path().join("legacy/old.js"), "eval(location.hash);")?;
    fs::write(project.path().join("app.js"), "fetch('/api');")?;

    let output = Command::cargo_bin("jsrecon")?
        .env("HOME", home.path())
        .arg("scan")
        .arg(project.path())
        .arg("--format")
        .arg("json")
        .output()?;
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let files = json["files"].as_array().expect("files");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["file"], "app.js");
    Ok(())
}

#[test]
fn malformed_config_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempdir()?;
    let cfg_dir = home.path().join(".config").join("jsrecon");
    fs::create_dir_all(&cfg_dir)?;
    fs::write(cfg_dir.join("config.toml"), "[analysis\nmax_depth = ")?;
    let file = home.path().join("app.js");
    fs::write(&file, "fetch('/api');")?;

    Command::cargo_bin("jsrecon")?
        .env("HOME", home.path())
        .arg("analyze")
        .arg(&file)
        .assert()
        .failure();
    Ok(())
}
