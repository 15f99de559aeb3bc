//! Source file enumeration.

use crate::error::{PipelineError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Builds a glob set, naming the offending pattern on failure
///
/// # Errors
///
/// Returns `PipelineError::Glob` for an invalid pattern.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| PipelineError::Glob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| PipelineError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Inclusion and exclusion globs, both relative to the directory being walked
#[derive(Debug, Clone)]
pub struct FileSet {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileSet {
    /// # Errors
    ///
    /// Returns `PipelineError::Glob` if any pattern is invalid.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
        })
    }

    /// Whether a relative path is selected; an exclusion always wins
    pub fn matches(&self, relative: &Path) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }

    /// Walks `base` and returns every selected file, sorted by path
    ///
    /// # Errors
    ///
    /// - `PipelineError::FileNotFound` if `base` is not a directory.
    /// - `PipelineError::WalkDir` if any entry cannot be read.
    pub fn collect(&self, base: &Path) -> Result<Vec<PathBuf>> {
        if !base.is_dir() {
            return Err(PipelineError::FileNotFound {
                path: base.to_path_buf(),
            });
        }

        let mut files = BTreeSet::new();
        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
            if self.matches(relative) {
                files.insert(entry.path().to_path_buf());
            }
        }

        tracing::trace!(base = %base.display(), count = files.len(), "collected files");
        Ok(files.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn create_tree(root: &Path, files: &[&str]) {
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file).unwrap();
        }
    }

    #[test]
    fn test_collect_excludes_partials() {
        let temp_dir = TempDir::new().unwrap();
        create_tree(
            temp_dir.path(),
            &[
                "index.html",
                "pages/about.html",
                "partials/nav.html",
                "partials/deep/footer.html",
                "assets/css/site.css",
            ],
        );

        let set = FileSet::new(&strings(&["**/*.html"]), &strings(&["partials/**"])).unwrap();
        let files = set.collect(temp_dir.path()).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(temp_dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            vec![PathBuf::from("index.html"), PathBuf::from("pages/about.html")]
        );
    }

    #[test]
    fn test_exclusion_beats_more_specific_inclusion() {
        let set = FileSet::new(
            &strings(&["partials/nav.html", "**/*.html"]),
            &strings(&["partials/**"]),
        )
        .unwrap();
        assert!(!set.matches(Path::new("partials/nav.html")));
        assert!(set.matches(Path::new("contact.html")));
    }

    #[test]
    fn test_collect_is_sorted_and_unique() {
        let temp_dir = TempDir::new().unwrap();
        create_tree(temp_dir.path(), &["b.html", "a.html", "c/a.html", "a/z.html"]);

        // Overlapping include patterns must not produce duplicates
        let set = FileSet::new(&strings(&["**/*.html", "*.html", "a.html"]), &[]).unwrap();
        let files = set.collect(temp_dir.path()).unwrap();

        let mut sorted = files.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(files, sorted);
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_collect_missing_base() {
        let temp_dir = TempDir::new().unwrap();
        let set = FileSet::new(&strings(&["**/*"]), &[]).unwrap();
        let result = set.collect(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(PipelineError::FileNotFound { .. })));
    }

    #[test]
    fn test_invalid_glob() {
        let result = FileSet::new(&strings(&["src/[unclosed"]), &[]);
        match result {
            Err(PipelineError::Glob { pattern, .. }) => assert_eq!(pattern, "src/[unclosed"),
            other => panic!("expected glob error, got {other:?}"),
        }
    }
}
