use regex::Regex;
use std::sync::OnceLock;
use url::Url;

static DIRECTIVE: OnceLock<Option<Regex>> = OnceLock::new();

fn directive() -> Option<&'static Regex> {
    DIRECTIVE
        .get_or_init(|| {
            Regex::new(r#"(?m)(?://[#@]|/\*[#@])[ \t]*sourceMappingURL=([^\s'"*]+)"#).ok()
        })
        .as_ref()
}

/// Returns the URL named by the last `sourceMappingURL` directive.
///
/// Relative references are resolved against `source_url` when it is an
/// absolute URL; `data:` URIs and references next to a relative
/// `source_url` are returned unchanged.
///
/// # Example
/// ```
/// use parsers::extract_source_map_url;
/// let src = "var a=1;\n//# sourceMappingURL=app.js.map";
/// assert_eq!(
///     extract_source_map_url(src, "https://cdn.example.com/js/app.js").as_deref(),
///     Some("https://cdn.example.com/js/app.js.map")
/// );
/// ```
pub fn extract_source_map_url(source: &str, source_url: &str) -> Option<String> {
    let re = directive()?;
    let found = re
        .captures_iter(source)
        .filter_map(|c| c.get(1))
        .last()?
        .as_str()
        .trim();
    if found.is_empty() {
        return None;
    }
    if found.starts_with("data:") {
        return Some(found.to_string());
    }
    if let Ok(abs) = Url::parse(found) {
        return Some(abs.to_string());
    }
    match Url::parse(source_url).and_then(|base| base.join(found)) {
        Ok(joined) => Some(joined.to_string()),
        Err(_) => Some(found.to_string()),
    }
}
