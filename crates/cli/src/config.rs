use anyhow::{Context, Result};
use engine::AnalysisOptions;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

#[cfg(windows)]
pub fn config_dir() -> PathBuf {
    std::env::var("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("jsrecon")
}

#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".config")
        .join("jsrecon")
}

fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// `[scan]` table. Unset values fall back to command-line defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub exclude: Vec<String>,
    pub max_file_size: Option<u64>,
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisOptions,
    #[serde(default)]
    pub scan: ScanConfig,
}

pub fn load_config() -> Result<Config> {
    let path = config_file_path();
    if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tables_keep_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [analysis]
            max_depth = 12

            [scan]
            exclude = ["**/vendor/**"]
            "#,
        )
        .expect("config");
        assert_eq!(cfg.analysis.max_depth, 12);
        assert_eq!(
            cfg.analysis.max_values,
            AnalysisOptions::default().max_values
        );
        assert_eq!(cfg.scan.exclude, vec!["**/vendor/**".to_string()]);
        assert!(cfg.scan.max_file_size.is_none());
    }

    #[test]
    fn empty_file_is_default() {
        let cfg: Config = toml::from_str("").expect("config");
        assert_eq!(cfg.analysis, AnalysisOptions::default());
        assert!(cfg.scan.exclude.is_empty());
    }
}
