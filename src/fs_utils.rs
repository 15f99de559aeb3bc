use crate::error::{PipelineError, Result};
use filetime::FileTime;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Reads the contents of a file at the given path
///
/// # Errors
///
/// - `PipelineError::FileNotFound` if the path doesn't exist or isn't a file.
/// - `PipelineError::Read` if there's an error reading the file.
pub fn read_file_contents(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(PipelineError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `contents` to `path`, creating parent directories as needed
///
/// # Errors
///
/// Returns `PipelineError::Write` naming the path that could not be created or written.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Copies a single file, creating the destination's parent directories
///
/// # Errors
///
/// Returns `PipelineError::Copy` if the copy fails.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(from, to).map_err(|source| PipelineError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Creates `dir` and all of its parents if missing
///
/// # Errors
///
/// Returns `PipelineError::Write` if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| PipelineError::Write {
        path: dir.to_path_buf(),
        source,
    })
}

/// Removes a directory tree; a missing directory is not an error
///
/// # Errors
///
/// Returns `PipelineError::Write` if an existing tree cannot be removed.
pub fn remove_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PipelineError::Write {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Sets the modification time of `path` to now
///
/// # Errors
///
/// Returns `PipelineError::Write` if the timestamp cannot be updated.
pub fn touch(path: &Path) -> Result<()> {
    filetime::set_file_mtime(path, FileTime::now()).map_err(|source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Lexically normalizes a path, resolving `.` and `..` without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The path with symlinks resolved, or its lexical form if it cannot be resolved
pub fn identity_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| normalize_path(path))
}

/// Resolves an include path relative to the directory of the including file.
/// Ensures the result doesn't escape `root`.
///
/// # Errors
///
/// - `PipelineError::PathTraversal` if the resolved path escapes the root directory.
pub fn resolve_include_path(reference: &str, including_file: &Path, root: &Path) -> Result<PathBuf> {
    let reference = reference.trim();
    let base_dir = including_file.parent().unwrap_or(root);

    // A leading separator means "relative to the source root"
    let full_path = if let Some(stripped) = reference
        .strip_prefix('/')
        .or_else(|| reference.strip_prefix('\\'))
    {
        root.join(stripped)
    } else {
        base_dir.join(reference)
    };

    let resolved = normalize_path(&full_path);
    let root = normalize_path(root);
    if !resolved.starts_with(&root) {
        return Err(PipelineError::PathTraversal { path: resolved });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_file_contents() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.html");

        fs::write(&file_path, "<p>test content</p>").unwrap();
        let result = read_file_contents(&file_path);
        assert_eq!(result.unwrap(), "<p>test content</p>");

        // Non-existent file
        let non_existent = temp_dir.path().join("nonexistent.html");
        let result = read_file_contents(&non_existent);
        assert!(matches!(result, Err(PipelineError::FileNotFound { .. })));

        // Directory as file
        let dir_path = temp_dir.path().join("dir");
        fs::create_dir(&dir_path).unwrap();
        let result = read_file_contents(&dir_path);
        assert!(matches!(result, Err(PipelineError::FileNotFound { .. })));
    }

    #[test]
    fn test_read_file_contents_unicode() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("unicode.html");

        let content = "<h1>Привет, 世界</h1>";
        fs::write(&file_path, content).unwrap();
        assert_eq!(read_file_contents(&file_path).unwrap(), content);
    }

    #[test]
    fn test_write_file_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("templates/pages/deep/index.html");

        write_file(&target, "hello").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
    }

    #[test]
    fn test_copy_file_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("logo.png");
        let to = temp_dir.path().join("static/images/logo.png");
        let bytes: Vec<u8> = (0..=255u8).collect();
        fs::write(&from, &bytes).unwrap();

        copy_file(&from, &to).unwrap();
        assert_eq!(fs::read(&to).unwrap(), bytes);
    }

    #[test]
    fn test_remove_dir_missing_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        assert!(remove_dir(&temp_dir.path().join("nope")).is_ok());

        let existing = temp_dir.path().join("static/css");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("a.css"), "a{}").unwrap();
        remove_dir(&existing).unwrap();
        assert!(!existing.exists());
    }

    #[test]
    fn test_touch_updates_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("index.html");
        fs::write(&file, "x").unwrap();
        filetime::set_file_mtime(&file, FileTime::from_unix_time(1_000_000, 0)).unwrap();

        touch(&file).unwrap();
        let meta = fs::metadata(&file).unwrap();
        let mtime = FileTime::from_last_modification_time(&meta);
        assert!(mtime.unix_seconds() > 1_000_000);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("src/pages/../partials/./nav.html")),
            PathBuf::from("src/partials/nav.html")
        );
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_identity_path_resolves_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        fs::create_dir(&real).unwrap();
        fs::write(real.join("nav.html"), "x").unwrap();
        std::os::unix::fs::symlink(&real, temp_dir.path().join("link")).unwrap();

        assert_eq!(
            identity_path(&temp_dir.path().join("link/nav.html")),
            identity_path(&real.join("nav.html"))
        );
        // Missing paths fall back to the lexical form
        assert_eq!(
            identity_path(Path::new("/no/such/./dir/../x.html")),
            PathBuf::from("/no/such/x.html")
        );
    }

    #[test]
    fn test_resolve_include_path_relative_to_file() {
        let root = Path::new("/project/src");
        let including = Path::new("/project/src/pages/about.html");

        let result = resolve_include_path("../partials/nav.html", including, root).unwrap();
        assert_eq!(result, PathBuf::from("/project/src/partials/nav.html"));

        let result = resolve_include_path("./footer.html", including, root).unwrap();
        assert_eq!(result, PathBuf::from("/project/src/pages/footer.html"));
    }

    #[test]
    fn test_resolve_include_path_root_relative() {
        let root = Path::new("/project/src");
        let including = Path::new("/project/src/pages/about.html");

        let result = resolve_include_path("/partials/nav.html", including, root).unwrap();
        assert_eq!(result, PathBuf::from("/project/src/partials/nav.html"));
    }

    #[test]
    fn test_resolve_include_path_traversal_prevention() {
        let root = Path::new("/project/src");
        let including = Path::new("/project/src/index.html");

        let result = resolve_include_path("../secrets.html", including, root);
        assert!(matches!(result, Err(PipelineError::PathTraversal { .. })));

        let result = resolve_include_path("../../../../../../etc/passwd", including, root);
        assert!(matches!(result, Err(PipelineError::PathTraversal { .. })));
    }
}
