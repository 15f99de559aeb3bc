//! Advisory scan of the written templates for asset references that no
//! template tag wraps. Never fails: problems are logged and the scan moves on.

use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static UNWRAPPED_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bsrc="(/?\w+/[^{%"][^"]*)""#).expect("src scan pattern is valid")
});

static UNWRAPPED_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"\bhref="(/?\w+/[^{%#"][^"]*)""##).expect("href scan pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Src,
    Href,
}

impl Attribute {
    fn describe(self) -> &'static str {
        match self {
            Attribute::Src => "SRC attribute without static tag",
            Attribute::Href => "HREF attribute without static tag",
        }
    }
}

/// One suspicious reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Template path relative to the templates directory
    pub file: PathBuf,
    pub line: usize,
    pub attribute: Attribute,
    pub value: String,
    pub snippet: String,
}

impl Finding {
    pub fn message(&self) -> String {
        format!(
            "Issue in {}:{}: {} - {}",
            self.file.display(),
            self.line,
            self.attribute.describe(),
            self.snippet
        )
    }
}

/// Layout templates and partials are expected to carry raw paths
fn is_skipped(relative: &Path) -> bool {
    relative.file_name().is_some_and(|name| name == "_base.html")
        || relative.components().any(|c| c.as_os_str() == "partials")
}

fn is_ignored_value(value: &str) -> bool {
    value.starts_with("http") || value.contains("{% url") || value.contains('#')
}

/// Lazily walks `dir`, yielding the HTML files it contains
pub fn template_paths(dir: &Path) -> impl Iterator<Item = PathBuf> + use<> {
    ignore::WalkBuilder::new(dir)
        .standard_filters(false)
        .hidden(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
}

/// Checks one template's content
pub fn scan_content(relative: &Path, content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (attribute, pattern) in [
        (Attribute::Src, &*UNWRAPPED_SRC),
        (Attribute::Href, &*UNWRAPPED_HREF),
    ] {
        for capture in pattern.captures_iter(content) {
            let (Some(full), Some(value)) = (capture.get(0), capture.get(1)) else {
                continue;
            };
            if is_ignored_value(value.as_str()) {
                continue;
            }
            findings.push(Finding {
                file: relative.to_path_buf(),
                line: content[..full.start()].matches('\n').count() + 1,
                attribute,
                value: value.as_str().to_string(),
                snippet: full.as_str().to_string(),
            });
        }
    }

    findings.sort_by_key(|f| f.line);
    findings
}

/// Scans every template under `dir`
pub fn scan_templates(dir: &Path) -> Vec<Finding> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "templates directory does not exist");
        return Vec::new();
    }

    let mut findings = Vec::new();
    for path in template_paths(dir) {
        let relative = path.strip_prefix(dir).unwrap_or(&path).to_path_buf();
        if is_skipped(&relative) {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) => findings.extend(scan_content(&relative, &content)),
            Err(e) => tracing::warn!(file = %path.display(), "could not read template: {e}"),
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_content_finds_unwrapped() {
        let content = "<html>\n<img src=\"img/a.png\">\n<link href=\"/styles/site.css\">\n</html>";
        let findings = scan_content(Path::new("index.html"), content);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].attribute, Attribute::Src);
        assert_eq!(findings[0].line, 2);
        assert_eq!(findings[0].value, "img/a.png");
        assert_eq!(findings[1].attribute, Attribute::Href);
        assert_eq!(findings[1].line, 3);
    }

    #[test]
    fn test_scan_content_ignores_wrapped_and_external() {
        let content = r#"<img src="{% static 'images/a.png' %}">
<a href="{% url 'about' %}">
<a href="https://example.com/x">
<a href="docs/page#section">
<a href="about">"#;
        assert!(scan_content(Path::new("index.html"), content).is_empty());
    }

    #[test]
    fn test_finding_message() {
        let findings = scan_content(Path::new("pages/a.html"), r#"<script src="js/x.js">"#);
        assert_eq!(
            findings[0].message(),
            r#"Issue in pages/a.html:1: SRC attribute without static tag - src="js/x.js""#
        );
    }

    #[test]
    fn test_scan_templates_skips_layouts_and_partials() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("partials")).unwrap();
        fs::write(root.join("_base.html"), r#"<img src="img/a.png">"#).unwrap();
        fs::write(root.join("partials/nav.html"), r#"<img src="img/a.png">"#).unwrap();
        fs::write(root.join("index.html"), r#"<img src="img/a.png">"#).unwrap();
        fs::write(root.join("notes.txt"), r#"<img src="img/a.png">"#).unwrap();

        let findings = scan_templates(root);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, PathBuf::from("index.html"));
    }

    #[test]
    fn test_scan_templates_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan_templates(&temp_dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_findings_serialize() {
        let findings = scan_content(Path::new("a.html"), r#"<img src="img/a.png">"#);
        let json = serde_json::to_string(&findings).unwrap();
        assert!(json.contains(r#""attribute":"src""#));
        assert!(json.contains(r#""value":"img/a.png""#));
    }
}
