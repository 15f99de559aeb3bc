use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// IO error without a more specific path context
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to read a source or output file
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    /// Failed to write an output file or create a directory
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    /// Failed to copy an asset into the static tree
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// File not found error with specific path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// An include directive points at a file that does not exist
    #[error("Included file not found: {path} (included from {from})")]
    IncludeNotFound { path: PathBuf, from: PathBuf },

    /// A file transitively includes itself
    #[error("Circular include: {chain}")]
    IncludeCycle { chain: String },

    /// Path traversal security error
    #[error("Path traversal detected (include escapes the source root): {path}")]
    PathTraversal { path: PathBuf },

    /// A rewrite rule whose replacement cannot be produced from its captures
    #[error("Malformed rewrite rule '{rule}': {reason}")]
    MalformedRule { rule: String, reason: String },

    /// Invalid glob pattern in the configuration
    #[error("Invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        source: globset::Error,
    },

    /// A manifest dependency name that is not a plain relative package path
    #[error("Invalid package name '{name}' in manifest")]
    InvalidPackageName { name: String },

    /// A declared runtime dependency is missing from node_modules
    #[error("Dependency '{name}' is declared but not installed at {path}")]
    MissingDependency { name: String, path: PathBuf },

    /// Configuration file could not be parsed
    #[error("Invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },

    /// Package manifest could not be parsed
    #[error("Invalid package manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A pipeline stage failed; wraps the underlying cause
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        source: Box<PipelineError>,
    },

    /// Regex compilation error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// `WalkDir` error when traversing directories
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// File watcher error
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Attach the name of the stage that produced this error
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            already @ PipelineError::Stage { .. } => already,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
