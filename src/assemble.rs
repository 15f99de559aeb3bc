//! Copying assets and third-party libraries into the static tree.

use crate::category::Category;
use crate::collect::{FileSet, build_globset};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::fs_utils::{copy_file, ensure_dir, read_file_contents, remove_dir};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// The part of `package.json` that matters here
#[derive(Debug, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// # Errors
    ///
    /// - `PipelineError::FileNotFound` if the manifest is missing.
    /// - `PipelineError::Manifest` if it is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_file_contents(path)?;
        serde_json::from_str(&text).map_err(|source| PipelineError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Package names are `name` or `@scope/name`; anything that could leave
/// `node_modules` or `static/libs` is refused
fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Creates every destination folder that does not exist yet
///
/// # Errors
///
/// Returns `PipelineError::Write` for the first folder that cannot be created.
pub fn create_folders(config: &Config) -> Result<()> {
    for folder in config.destination_folders() {
        ensure_dir(&folder)?;
    }
    Ok(())
}

/// Removes the static subtrees; the templates tree is left alone
///
/// # Errors
///
/// Returns `PipelineError::Write` if a subtree cannot be removed.
pub fn clean_static(config: &Config) -> Result<()> {
    for category in Category::STATIC {
        if let Some(dir) = config.destination(category) {
            tracing::debug!(dir = %dir.display(), "removing");
            remove_dir(&dir)?;
        }
    }
    Ok(())
}

/// Copies one asset category into its static subtree, keeping relative paths.
/// A missing source folder copies nothing.
///
/// # Errors
///
/// Fails on an invalid glob, an unreadable source tree or a failed copy.
pub fn copy_category(config: &Config, category: Category) -> Result<Vec<PathBuf>> {
    let (Some(source), Some(source_dir), Some(dest_dir)) = (
        config.asset_source(category),
        config.asset_dir(category),
        config.destination(category),
    ) else {
        return Ok(Vec::new());
    };

    if !source_dir.is_dir() {
        tracing::warn!(category = %category, dir = %source_dir.display(), "source folder missing, nothing to copy");
        return Ok(Vec::new());
    }

    let files = FileSet::new(&source.patterns, &[])?;
    let mut copied = Vec::new();
    for path in files.collect(&source_dir)? {
        let relative = path.strip_prefix(&source_dir).unwrap_or(&path);
        let target = dest_dir.join(relative);
        copy_file(&path, &target)?;
        copied.push(target);
    }

    tracing::debug!(category = %category, count = copied.len(), "copied");
    Ok(copied)
}

/// Copies the distributable files of every runtime dependency from
/// `node_modules` into `static/libs/<name>/`.
///
/// # Errors
///
/// - `PipelineError::FileNotFound` / `PipelineError::Manifest` for the manifest.
/// - `PipelineError::InvalidPackageName` for a name that escapes the libs folder.
/// - `PipelineError::MissingDependency` if a declared package is not installed.
/// - Copy errors for individual files.
pub fn copy_libs(config: &Config) -> Result<Vec<PathBuf>> {
    let manifest = PackageManifest::load(&config.manifest_path())?;
    let node_modules = config.node_modules_dir();
    let Some(libs_dir) = config.destination(Category::Library) else {
        return Ok(Vec::new());
    };

    let excludes: Vec<String> = config
        .lib_excludes()
        .iter()
        .map(|pattern| format!("**/{pattern}"))
        .collect();
    let excludes = build_globset(&excludes)?;

    let mut copied = Vec::new();
    for name in manifest.dependencies.keys() {
        if !is_valid_package_name(name) {
            return Err(PipelineError::InvalidPackageName { name: name.clone() });
        }
        let package_dir = node_modules.join(name);
        if !package_dir.is_dir() {
            return Err(PipelineError::MissingDependency {
                name: name.clone(),
                path: package_dir,
            });
        }

        let mut count = 0usize;
        for entry in WalkDir::new(&package_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&package_dir).unwrap_or(entry.path());
            if excludes.is_match(relative) {
                continue;
            }
            let target = libs_dir.join(name).join(relative);
            copy_file(entry.path(), &target)?;
            copied.push(target);
            count += 1;
        }
        tracing::debug!(package = %name, files = count, "library copied");
    }

    Ok(copied)
}
