use crate::error::{PipelineError, Result};
use crate::fs_utils::{identity_path, normalize_path, read_file_contents, resolve_include_path};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Represents an include directive found in a source file
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeDirective {
    /// The full match, e.g. `@@include('partials/nav.html')`
    pub full_match: String,
    /// The referenced path as written
    pub path: String,
    /// Starting position in the text
    pub start: usize,
    /// Ending position in the text
    pub end: usize,
}

/// A file on the current inclusion chain
#[derive(Debug)]
struct IncludeFrame {
    /// Lexical path, used to resolve relative includes and to report
    path: PathBuf,
    /// Resolved path, used to detect cycles
    identity: PathBuf,
}

/// Expands `<prefix>include('path')` directives by splicing in file contents
#[derive(Debug, Clone)]
pub struct Includer {
    pattern: Regex,
    root: PathBuf,
}

impl Includer {
    /// Creates an includer for directives starting with `prefix`, confined to `root`
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Regex` if the directive pattern cannot be compiled.
    pub fn new(prefix: &str, root: &Path) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r#"{}include\(\s*["']([^"']+)["']\s*\)"#,
            regex::escape(prefix)
        ))?;
        Ok(Self {
            pattern,
            root: normalize_path(root),
        })
    }

    /// Finds all include directives in the given text
    pub fn find_directives(&self, text: &str) -> Vec<IncludeDirective> {
        let mut directives = Vec::new();

        for capture in self.pattern.captures_iter(text) {
            if let Some(full_match) = capture.get(0)
                && let Some(path_match) = capture.get(1)
            {
                directives.push(IncludeDirective {
                    full_match: full_match.as_str().to_string(),
                    path: path_match.as_str().to_string(),
                    start: full_match.start(),
                    end: full_match.end(),
                });
            }
        }

        directives
    }

    /// Reads `path` and expands every directive in it, recursively
    ///
    /// # Errors
    ///
    /// - `PipelineError::FileNotFound` if `path` itself is missing.
    /// - `PipelineError::IncludeNotFound` if a directive points at a missing file.
    /// - `PipelineError::IncludeCycle` if a file transitively includes itself.
    /// - `PipelineError::PathTraversal` if a directive escapes the root.
    pub fn expand_file(&self, path: &Path) -> Result<String> {
        let contents = read_file_contents(path)?;
        self.expand(&contents, path)
    }

    /// Expands every directive in `text`, which was read from `file`
    ///
    /// # Errors
    ///
    /// Same as [`Includer::expand_file`].
    pub fn expand(&self, text: &str, file: &Path) -> Result<String> {
        let file = normalize_path(file);
        let mut stack = vec![IncludeFrame {
            identity: identity_path(&file),
            path: file,
        }];
        self.expand_inner(text, &mut stack)
    }

    fn expand_inner(&self, text: &str, stack: &mut Vec<IncludeFrame>) -> Result<String> {
        let directives = self.find_directives(text);
        if directives.is_empty() {
            return Ok(text.to_string());
        }

        let current = stack
            .last()
            .map_or_else(|| self.root.clone(), |frame| frame.path.clone());

        // Process from end to beginning to maintain correct positions
        let mut result = text.to_string();
        for directive in directives.iter().rev() {
            let target = resolve_include_path(&directive.path, &current, &self.root)?;

            // Symlinked folders can reach the same file under another name
            let identity = identity_path(&target);
            if stack.iter().any(|frame| frame.identity == identity) {
                let chain = stack
                    .iter()
                    .map(|frame| &frame.path)
                    .chain(std::iter::once(&target))
                    .map(|p| p.strip_prefix(&self.root).unwrap_or(p).display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(PipelineError::IncludeCycle { chain });
            }

            if !target.is_file() {
                return Err(PipelineError::IncludeNotFound {
                    path: target,
                    from: current,
                });
            }

            tracing::trace!(
                from = %current.display(),
                directive = %directive.full_match,
                include = %target.display(),
                "including"
            );
            let contents = read_file_contents(&target)?;
            stack.push(IncludeFrame {
                path: target,
                identity,
            });
            let expanded = self.expand_inner(&contents, stack)?;
            stack.pop();

            result.replace_range(directive.start..directive.end, &expanded);
        }

        Ok(result)
    }
}
