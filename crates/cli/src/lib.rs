//! Common utilities for the command line interface.
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing::level_filters::LevelFilter;

pub mod analyze;
pub mod args;
pub mod config;
pub mod inspect;
pub mod output;
pub mod scan;
pub mod ui;

/// Default maximum size: 5 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Installs the stderr log subscriber. `quiet` wins over `debug`.
pub fn init_tracing(debug: bool, quiet: bool) {
    let level = if quiet {
        LevelFilter::OFF
    } else if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Converts a basic glob pattern to a regular expression.
///
/// # Example
///
/// ```
/// use jsrecon::glob_to_regex;
/// let re = glob_to_regex("dist/*.js").unwrap();
/// assert!(re.is_match("dist/main.js"));
/// assert!(!re.is_match("dist/chunks/a.js"));
/// ```
pub fn glob_to_regex(pat: &str) -> Result<Regex, regex::Error> {
    if pat.contains('[') || pat.contains(']') {
        // character classes are not supported
        return Regex::new("[");
    }
    let mut regex = String::from("^");
    let mut chars = pat.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push('.'),
            '.' => regex.push_str("\\."),
            '/' => regex.push('/'),
            '(' | ')' | '+' | '|' | '^' | '$' | '{' | '}' | '\\' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
    }
    regex.push('$');
    Regex::new(&regex)
}

/// Transforms a glob-style exclusion string into [`Regex`].
/// Accepts trailing slashes and expands to `**` automatically.
///
/// # Example
///
/// ```
/// use jsrecon::parse_exclude;
/// let re = parse_exclude("vendor/").unwrap();
/// assert!(re.is_match("vendor/jquery.min.js"));
/// ```
pub fn parse_exclude(s: &str) -> Result<Regex, String> {
    let glob_str = if s.ends_with('/') {
        format!("{s}**")
    } else {
        s.to_string()
    };
    glob_to_regex(&glob_str).map_err(|e| e.to_string())
}

/// Default exclusion patterns.
pub fn default_excludes() -> Vec<Regex> {
    ["**/node_modules/**", "**/.git/**"]
        .iter()
        .filter_map(|p| parse_exclude(p).ok())
        .collect()
}

/// Reads `.gitignore` and `.jsreconignore` from `root` and converts their
/// valid entries to regular expressions.
pub fn load_ignore_patterns(root: &Path) -> Vec<Regex> {
    let mut patterns = Vec::new();
    for name in [".gitignore", ".jsreconignore"] {
        let path = root.join(name);
        if let Ok(content) = fs::read_to_string(path) {
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let mut pat = line.trim_start_matches('/').to_string();
                if !pat.starts_with("**/") {
                    pat = format!("**/{pat}");
                }
                if let Ok(re) = parse_exclude(&pat) {
                    patterns.push(re);
                }
            }
        }
    }
    patterns
}

/// Indicates whether a path should be omitted according to patterns or size.
/// Separators are normalised to support Windows and Unix.
///
/// # Example
///
/// ```
/// use jsrecon::{is_excluded, parse_exclude};
/// use std::path::Path;
/// let patterns = vec![parse_exclude("build/**").unwrap()];
/// assert!(is_excluded(Path::new("build/app.js"), &patterns, 0));
/// ```
pub fn is_excluded(path: &Path, patterns: &[Regex], max_file_size: u64) -> bool {
    let path_str = path.to_string_lossy().replace('\\', "/");
    if patterns.iter().any(|re| re.is_match(&path_str)) {
        return true;
    }
    if max_file_size > 0 {
        if let Ok(meta) = fs::metadata(path) {
            if meta.is_file() && meta.len() > max_file_size {
                return true;
            }
        }
    }
    false
}

/// Breadth-first walk calling `callback` for every regular file under
/// `path`. Symlinks are skipped; unreadable entries are logged and skipped.
pub fn visit<F, C>(path: &Path, excludes: &F, callback: &mut C) -> anyhow::Result<()>
where
    F: Fn(&Path) -> bool,
    C: FnMut(&Path) -> anyhow::Result<()>,
{
    let mut pending: VecDeque<PathBuf> = VecDeque::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    pending.push_back(path.to_path_buf());

    while let Some(current) = pending.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        if excludes(&current) {
            debug!(path = %current.display(), "Path excluded");
            continue;
        }
        let metadata = match fs::symlink_metadata(&current) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %current.display(), "Permission denied");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            debug!(path = %current.display(), "Symlink skipped");
            continue;
        }
        if file_type.is_file() {
            callback(&current)?;
        } else if file_type.is_dir() {
            let entries = match fs::read_dir(&current) {
                Ok(e) => e,
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    debug!(path = %current.display(), "Permission denied");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let mut children: Vec<PathBuf> = Vec::new();
            for entry in entries {
                match entry {
                    Ok(e) => children.push(e.path()),
                    Err(e) if e.kind() == io::ErrorKind::PermissionDenied => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            children.sort();
            pending.extend(children);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    #[test]
    fn visits_nested_directories() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path();
        fs::create_dir_all(base.join("a/b")).unwrap();
        fs::write(base.join("root.js"), b"").unwrap();
        fs::write(base.join("a/file.js"), b"").unwrap();
        fs::write(base.join("a/b/leaf.mjs"), b"").unwrap();

        let mut seen = BTreeSet::new();
        let mut cb = |p: &Path| {
            seen.insert(p.strip_prefix(base).unwrap().to_path_buf());
            Ok(())
        };
        visit(base, &|_| false, &mut cb).unwrap();

        let expected: BTreeSet<PathBuf> = [
            PathBuf::from("root.js"),
            PathBuf::from("a/file.js"),
            PathBuf::from("a/b/leaf.mjs"),
        ]
        .into_iter()
        .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn excluded_directories_are_not_entered() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path();
        fs::create_dir_all(base.join("node_modules/pkg")).unwrap();
        fs::write(base.join("node_modules/pkg/index.js"), b"").unwrap();
        fs::write(base.join("app.js"), b"").unwrap();

        let patterns = default_excludes();
        let mut seen = Vec::new();
        visit(base, &|p| is_excluded(p, &patterns, 0), &mut |p: &Path| {
            seen.push(p.to_path_buf());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![base.join("app.js")]);
    }

    #[test]
    fn single_star_stays_in_one_directory() {
        let re = glob_to_regex("src/*.js").unwrap();
        assert!(re.is_match("src/a.js"));
        assert!(!re.is_match("src/lib/a.js"));
    }
}
