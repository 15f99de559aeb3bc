//! Template generation and the corrective pass over the written templates.

use crate::category::{Category, SourceFile};
use crate::collect::FileSet;
use crate::config::Config;
use crate::error::Result;
use crate::fs_utils::{read_file_contents, touch, write_file};
use crate::include::Includer;
use crate::rules::RuleTable;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expands includes and applies the primary rules to one template
///
/// # Errors
///
/// Returns include errors for the file's inclusion chain.
pub fn render_template(file: &SourceFile, includer: &Includer, rules: &RuleTable) -> Result<String> {
    let expanded = includer.expand(&file.content, &file.path)?;
    Ok(rules.rewrite(&expanded))
}

/// Renders every non-partial template under the source directory into the
/// templates directory, keeping relative paths. Returns the written files.
///
/// # Errors
///
/// Fails on the first unreadable template, bad include or unwritable output.
pub fn generate_templates(
    config: &Config,
    includer: &Includer,
    rules: &RuleTable,
) -> Result<Vec<PathBuf>> {
    let source_dir = config.source_dir();
    let output_dir = config.templates_dir();
    let files = FileSet::new(&config.source.templates, &config.source.partials)?;

    let mut written = Vec::new();
    for path in files.collect(&source_dir)? {
        let relative = path.strip_prefix(&source_dir).unwrap_or(&path);
        let source = SourceFile::load(&path, Category::Template)?;
        let rendered = render_template(&source, includer, rules)?;

        let target = output_dir.join(relative);
        write_file(&target, &rendered)?;
        tracing::debug!(source = %relative.display(), "template written");
        written.push(target);
    }

    Ok(written)
}

/// Every HTML file under `dir`, sorted
///
/// # Errors
///
/// Returns `PipelineError::WalkDir` if the tree cannot be walked.
pub fn html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "html") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Applies the corrective rules to every template already written. Files whose
/// content does not change are left alone. Returns the files that changed.
///
/// # Errors
///
/// Fails on the first file that cannot be read or rewritten.
pub fn correct_templates(config: &Config, rules: &RuleTable) -> Result<Vec<PathBuf>> {
    let mut changed = Vec::new();
    for path in html_files(&config.templates_dir())? {
        let original = read_file_contents(&path)?;
        let corrected = rules.correct(&original);
        if corrected != original {
            write_file(&path, &corrected)?;
            tracing::debug!(file = %path.display(), "corrected static references");
            changed.push(path);
        }
    }
    Ok(changed)
}

/// Bumps the modification time of every written template
///
/// # Errors
///
/// Fails on the first file whose timestamp cannot be set.
pub fn touch_templates(config: &Config) -> Result<usize> {
    let files = html_files(&config.templates_dir())?;
    for file in &files {
        touch(file)?;
    }
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_env() -> (TempDir, Config, Includer, RuleTable) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::default().with_root(temp_dir.path());
        let includer = Includer::new(&config.include.prefix, &config.source_dir()).unwrap();
        let rules = RuleTable::from_config(&config).unwrap();
        (temp_dir, config, includer, rules)
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_generate_expands_and_rewrites() {
        let (temp_dir, config, includer, rules) = create_test_env();
        let root = temp_dir.path();
        write(
            root,
            "src/partials/head.html",
            r#"<link href="assets/css/site.css" rel="stylesheet">"#,
        );
        write(
            root,
            "src/index.html",
            "<html>\n<head>@@include('partials/head.html')</head>\n<body><a href=\"about.html\">About</a></body>\n</html>",
        );

        let written = generate_templates(&config, &includer, &rules).unwrap();
        assert_eq!(written, vec![root.join("templates/index.html")]);

        let output = fs::read_to_string(root.join("templates/index.html")).unwrap();
        assert_eq!(
            output,
            "<html>\n{% load static %}\n<head><link href=\"{% static 'css/site.css' %}\" rel=\"stylesheet\"></head>\n<body><a href=\"{% url 'about' %}\">About</a></body>\n</html>"
        );
    }

    #[test]
    fn test_partials_not_emitted() {
        let (temp_dir, config, includer, rules) = create_test_env();
        let root = temp_dir.path();
        write(root, "src/partials/nav.html", "<nav></nav>");
        write(root, "src/pages/about.html", "@@include('../partials/nav.html')");

        let written = generate_templates(&config, &includer, &rules).unwrap();
        assert_eq!(written, vec![root.join("templates/pages/about.html")]);
        assert!(!root.join("templates/partials").exists());
    }

    #[test]
    fn test_generate_no_node_modules_left() {
        let (temp_dir, config, includer, rules) = create_test_env();
        let root = temp_dir.path();
        write(
            root,
            "src/partials/scripts.html",
            r#"<script src="../node_modules/chart.js/dist/chart.js"></script>"#,
        );
        write(
            root,
            "src/dashboard.html",
            r#"<link href="node_modules/a/dist/a.css">@@include('partials/scripts.html')"#,
        );

        generate_templates(&config, &includer, &rules).unwrap();
        for file in html_files(&config.templates_dir()).unwrap() {
            let output = fs::read_to_string(&file).unwrap();
            assert!(!output.contains("node_modules/"), "{}", file.display());
            assert!(output.contains("{% static 'libs/chart.js/dist/chart.js' %}"));
        }
    }

    #[test]
    fn test_generate_missing_source_dir() {
        let (_temp_dir, config, includer, rules) = create_test_env();
        let result = generate_templates(&config, &includer, &rules);
        assert!(matches!(result, Err(PipelineError::FileNotFound { .. })));
    }

    #[test]
    fn test_generate_cycle_is_fatal() {
        let (temp_dir, config, includer, rules) = create_test_env();
        let root = temp_dir.path();
        write(root, "src/partials/a.html", "@@include('b.html')");
        write(root, "src/partials/b.html", "@@include('a.html')");
        write(root, "src/index.html", "@@include('partials/a.html')");

        let result = generate_templates(&config, &includer, &rules);
        assert!(matches!(result, Err(PipelineError::IncludeCycle { .. })));
    }

    #[test]
    fn test_correct_templates() {
        let (temp_dir, config, _includer, rules) = create_test_env();
        let root = temp_dir.path();
        write(root, "templates/index.html", r#"<img src="/img/hero.webp"><link href="/site.css">"#);
        write(root, "templates/plain.html", "<p>nothing to do</p>");

        let changed = correct_templates(&config, &rules).unwrap();
        assert_eq!(changed, vec![root.join("templates/index.html")]);
        assert_eq!(
            fs::read_to_string(root.join("templates/index.html")).unwrap(),
            r#"<img src="{% static 'img/hero.webp' %}"><link href="{% static 'site.css' %}">"#
        );

        // A second pass finds nothing left to change
        assert!(correct_templates(&config, &rules).unwrap().is_empty());
    }

    #[test]
    fn test_correct_templates_without_output_dir() {
        let (_temp_dir, config, _includer, rules) = create_test_env();
        assert!(correct_templates(&config, &rules).unwrap().is_empty());
    }

    #[test]
    fn test_touch_templates() {
        let (temp_dir, config, _includer, _rules) = create_test_env();
        let root = temp_dir.path();
        write(root, "templates/a.html", "a");
        write(root, "templates/sub/b.html", "b");
        write(root, "templates/notes.txt", "not a template");

        assert_eq!(touch_templates(&config).unwrap(), 2);
    }
}
