use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

use engine::{AnalysisOptions, BatchItem, BatchRequest};
use reporters::{FileReport, ScanInfo};

use crate::args::ScanArgs;
use crate::config::{load_config, Config};
use crate::output::{self, Format};
use crate::{
    default_excludes, is_excluded, load_ignore_patterns, parse_exclude, ui, visit,
    DEFAULT_MAX_FILE_SIZE,
};

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Effective scan settings after merging flags over the config file.
struct Settings {
    threads: usize,
    max_file_size: u64,
    options: AnalysisOptions,
}

impl Settings {
    fn merge(args: &ScanArgs, cfg: &Config) -> Self {
        Self {
            threads: args
                .threads
                .or(cfg.scan.threads)
                .filter(|&n| n > 0)
                .unwrap_or_else(default_threads),
            max_file_size: args
                .max_file_size
                .or(cfg.scan.max_file_size)
                .unwrap_or(DEFAULT_MAX_FILE_SIZE),
            options: cfg.analysis.clone(),
        }
    }
}

/// JavaScript files under `root`, sorted, after exclusions.
pub fn collect_files(
    root: &Path,
    args: &ScanArgs,
    cfg: &Config,
    max_file_size: u64,
) -> Result<Vec<PathBuf>> {
    let mut patterns = args.exclude.clone();
    for p in &cfg.scan.exclude {
        match parse_exclude(p) {
            Ok(re) => patterns.push(re),
            Err(e) => warn!(pattern = %p, error = %e, "Ignoring invalid exclude pattern"),
        }
    }
    if !args.no_default_exclude {
        patterns.extend(default_excludes());
    }
    if root.is_dir() {
        patterns.extend(load_ignore_patterns(root));
    }
    let mut files = Vec::new();
    visit(
        root,
        &|p| is_excluded(p, &patterns, max_file_size),
        &mut |p| {
            if parsers::detect_type(p).is_some() {
                files.push(p.to_path_buf());
            }
            Ok(())
        },
    )?;
    files.sort();
    Ok(files)
}

/// `base_url` joined with the path of `file` relative to `root`.
fn source_url(base_url: &str, root: &Path, file: &Path) -> String {
    if base_url.is_empty() {
        return String::new();
    }
    let rel = file
        .strip_prefix(root)
        .ok()
        .filter(|r| !r.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new(file.file_name().unwrap_or_default()));
    let rel = rel.to_string_lossy().replace('\\', "/");
    format!("{}/{}", base_url.trim_end_matches('/'), rel)
}

fn analyze_file(
    path: &Path,
    req_url: String,
    force_script: bool,
    opts: &AnalysisOptions,
) -> BatchItem {
    let code = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Failed to read file");
            return BatchItem {
                error: Some(format!("failed to read file: {e}")),
                ..BatchItem::default()
            };
        }
    };
    let req = BatchRequest {
        code,
        source_url: req_url,
        force_script,
    };
    engine::analyze_batch(std::slice::from_ref(&req), opts)
        .pop()
        .unwrap_or_default()
}

/// Scans `args.path`; returns whether the `--fail-on` threshold was met.
pub fn run_scan(args: ScanArgs) -> Result<bool> {
    let cfg = load_config().context("failed to load configuration")?;
    let settings = Settings::merge(&args, &cfg);
    if args.format == Format::Text {
        ui::print_header();
    }

    let root = args
        .path
        .canonicalize()
        .with_context(|| format!("cannot access {}", args.path.display()))?;
    info!(target = %root.display(), "Scan started");
    debug!(
        threads = settings.threads,
        max_file_size = settings.max_file_size,
        "Scan settings"
    );

    let files = collect_files(&root, &args, &cfg, settings.max_file_size)?;
    info!(files = files.len(), "Files queued");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.threads)
        .build()
        .context("failed to build thread pool")?;
    let progress = Mutex::new(ui::ProgressBar::new(files.len()));
    let start = Instant::now();
    let reports: Vec<FileReport> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let url = source_url(&args.base_url, &root, path);
                let item = analyze_file(path, url, args.force_script, &settings.options);
                if let Ok(mut guard) = progress.lock() {
                    if let Some(bar) = guard.as_mut() {
                        bar.increment_files(1);
                    }
                }
                let file = path
                    .strip_prefix(&root)
                    .ok()
                    .filter(|r| !r.as_os_str().is_empty())
                    .unwrap_or(path.as_path())
                    .display()
                    .to_string();
                FileReport { file, item }
            })
            .collect()
    });
    if let Ok(mut guard) = progress.lock() {
        if let Some(bar) = guard.as_mut() {
            bar.finish();
        }
    }

    let failed_files = reports.iter().filter(|r| !r.item.success).count();
    for r in reports.iter().filter(|r| !r.item.success) {
        warn!(file = %r.file, error = r.item.error.as_deref().unwrap_or(""), "Analysis failed");
    }
    let info = ScanInfo {
        files_analyzed: reports.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        failed_files,
    };
    output::print_batch(&reports, args.format, &info)?;

    let findings: usize = reports
        .iter()
        .map(|r| r.item.security_sinks.len() + r.item.dangerous_patterns.len())
        .sum();
    info!(findings, failed_files, "Scan completed");

    let max_sev = output::max_severity(
        reports.iter().flat_map(|r| &r.item.security_sinks),
        reports.iter().flat_map(|r| &r.item.dangerous_patterns),
    );
    Ok(output::threshold_reached(args.fail_on, max_sev))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_urls_follow_the_tree() {
        let root = Path::new("/srv/site");
        assert_eq!(
            source_url("https://cdn.example.com/", root, Path::new("/srv/site/js/app.js")),
            "https://cdn.example.com/js/app.js"
        );
        assert_eq!(source_url("", root, Path::new("/srv/site/app.js")), "");
        assert_eq!(
            source_url(
                "https://a.com",
                Path::new("/srv/site/app.js"),
                Path::new("/srv/site/app.js")
            ),
            "https://a.com/app.js"
        );
    }
}
