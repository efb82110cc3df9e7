//! Parser collaborator for **jsrecon**: turns JavaScript and JSX sources
//! into the typed [`ir::Program`] consumed by the analysis engine.

use anyhow::{Context, Result};
use ir::Program;
use serde::Serialize;
use std::{fs, path::Path};
use tracing::debug;

pub mod error;
pub mod languages;
pub mod source_map;

pub use error::ParseError;
pub use languages::*;
pub use source_map::extract_source_map_url;

#[derive(Debug, Default, Serialize)]
pub struct ParserMetrics {
    pub files_parsed: usize,
    pub parse_errors: usize,
}

/// Determines the supported file type from the extension.
///
/// # Example
/// ```
/// use parsers::detect_type;
/// assert_eq!(detect_type(std::path::Path::new("bundle.mjs")), Some("javascript"));
/// assert_eq!(detect_type(std::path::Path::new("style.css")), None);
/// ```
pub fn detect_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    let detected = match ext.as_deref() {
        Some("js") | Some("mjs") | Some("cjs") | Some("jsx") => Some("javascript"),
        _ => None,
    };
    if let Some(t) = detected {
        debug!(file = %path.display(), file_type = t, "File type detected");
    } else {
        debug!(file = %path.display(), "Unsupported file type");
    }
    detected
}

/// Reads a file and lowers it into a [`Program`].
///
/// Returns `Ok(None)` for files whose type is not supported.
///
/// # Example
/// ```
/// use parsers::parse_file;
/// let path = std::env::temp_dir().join("jsrecon_doc_example.js");
/// std::fs::write(&path, "let a = 1;").unwrap();
/// let program = parse_file(&path, false, None).unwrap().unwrap();
/// assert_eq!(program.body.len(), 1);
/// ```
pub fn parse_file(
    path: &Path,
    force_script: bool,
    mut metrics: Option<&mut ParserMetrics>,
) -> Result<Option<Program>> {
    let Some(ftype) = detect_type(path) else {
        return Ok(None);
    };
    debug!(file = %path.display(), file_type = ftype, "Parsing file");
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    match parse_javascript(&content, force_script) {
        Ok(program) => {
            if let Some(m) = metrics.as_deref_mut() {
                m.files_parsed += 1;
            }
            Ok(Some(program))
        }
        Err(e) => {
            if let Some(m) = metrics {
                m.parse_errors += 1;
            }
            Err(anyhow::Error::new(e).context(format!("Failed to parse {}", path.display())))
        }
    }
}
