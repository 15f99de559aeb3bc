//! Project configuration.
//!
//! Every path in the configuration file is relative to the project root. The
//! loaded [`Config`] is never mutated afterwards; components receive it by
//! reference.

use crate::category::{Category, Subtree};
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the project root
pub const CONFIG_FILE_NAME: &str = "djbundle.toml";

/// Files inside an installed package that are never part of its distributable set
pub const DEFAULT_LIB_EXCLUDES: &[&str] = &[
    "*.map",
    "src/**/*",
    "examples/**/*",
    "example/**/*",
    "demo/**/*",
    "spec/**/*",
    "docs/**/*",
    "tests/**/*",
    "test/**/*",
    "Gruntfile.js",
    "gulpfile.js",
    "package.json",
    "package-lock.json",
    "bower.json",
    "composer.json",
    "yarn.lock",
    "webpack.config.js",
    "README",
    "LICENSE",
    "CHANGELOG",
    "*.yml",
    "*.md",
    "*.coffee",
    "*.ts",
    "*.scss",
    "*.less",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project root; every other path is resolved against it
    #[serde(skip)]
    pub root: PathBuf,
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub include: IncludeConfig,
    pub rewrite: RewriteConfig,
    pub libs: LibsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Directory holding the HTML sources and the asset folders
    pub dir: PathBuf,
    /// Globs (relative to `dir`) selecting template files
    pub templates: Vec<String>,
    /// Globs (relative to `dir`) selecting partials; never emitted directly
    pub partials: Vec<String>,
    pub css: AssetSource,
    pub js: AssetSource,
    pub images: AssetSource,
    pub fonts: AssetSource,
}

/// Where one asset category lives inside the source directory
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetSource {
    pub dir: PathBuf,
    #[serde(default = "all_files")]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub templates: PathBuf,
    #[serde(rename = "static")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncludeConfig {
    /// Marker preceding `include('...')`
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Folder name that marks a reference as pointing into the asset root
    pub asset_marker: String,
    /// Additional rules appended after the built-in ones
    pub rules: Vec<ExtraRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulePass {
    Primary,
    Corrective,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtraRule {
    pub name: String,
    pub pass: RulePass,
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibsConfig {
    pub node_modules: PathBuf,
    pub manifest: PathBuf,
    /// Extra exclude globs, relative to each package directory
    pub excludes: Vec<String>,
    /// Use `excludes` instead of, not in addition to, the defaults
    pub replace_default_excludes: bool,
}

fn parse(text: &str, path: &Path) -> Result<Config> {
    toml::from_str(text).map_err(|source| PipelineError::Config {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn all_files() -> Vec<String> {
    vec!["**/*".to_string()]
}

impl AssetSource {
    fn new(dir: &str, pattern: &str) -> Self {
        Self {
            dir: PathBuf::from(dir),
            patterns: vec![pattern.to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            source: SourceConfig::default(),
            output: OutputConfig::default(),
            include: IncludeConfig::default(),
            rewrite: RewriteConfig::default(),
            libs: LibsConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("src"),
            templates: vec!["**/*.html".to_string()],
            partials: vec!["partials/**".to_string()],
            css: AssetSource::new("assets/css", "**/*.css"),
            js: AssetSource::new("assets/js", "**/*.js"),
            images: AssetSource::new("assets/images", "**/*"),
            fonts: AssetSource::new("assets/fonts", "**/*"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            templates: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            prefix: "@@".to_string(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            asset_marker: "assets".to_string(),
            rules: Vec::new(),
        }
    }
}

impl Default for LibsConfig {
    fn default() -> Self {
        Self {
            node_modules: PathBuf::from("node_modules"),
            manifest: PathBuf::from("package.json"),
            excludes: Vec::new(),
            replace_default_excludes: false,
        }
    }
}

impl Config {
    /// Loads configuration for the project at `root`.
    ///
    /// An explicit `path` must exist. Without one, `<root>/djbundle.toml` is
    /// read when present and defaults are used otherwise.
    ///
    /// # Errors
    ///
    /// - `PipelineError::FileNotFound` if an explicit config file is missing.
    /// - `PipelineError::Config` if the file is not valid TOML for this schema.
    pub fn load(root: &Path, path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(PipelineError::FileNotFound {
                        path: explicit.to_path_buf(),
                    });
                }
                Some(explicit.to_path_buf())
            }
            None => Some(root.join(CONFIG_FILE_NAME)).filter(|p| p.is_file()),
        };

        let mut config = match candidate {
            Some(file) => {
                tracing::debug!(path = %file.display(), "loading configuration");
                let text = fs::read_to_string(&file).map_err(|source| PipelineError::Read {
                    path: file.clone(),
                    source,
                })?;
                parse(&text, &file)?
            }
            None => Self::default(),
        };
        config.root = root.to_path_buf();
        Ok(config)
    }

    /// Parses a configuration document; the root stays at its default
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` on a parse or schema error.
    pub fn from_toml(text: &str) -> Result<Self> {
        parse(text, Path::new(CONFIG_FILE_NAME))
    }

    /// Returns a copy of this configuration rooted at `root`
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.source.dir)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(&self.output.templates)
    }

    pub fn static_dir(&self) -> PathBuf {
        self.root.join(&self.output.static_dir)
    }

    pub fn node_modules_dir(&self) -> PathBuf {
        self.root.join(&self.libs.node_modules)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.libs.manifest)
    }

    /// Source settings for a copyable asset category
    pub fn asset_source(&self, category: Category) -> Option<&AssetSource> {
        match category {
            Category::Stylesheet => Some(&self.source.css),
            Category::Script => Some(&self.source.js),
            Category::Image => Some(&self.source.images),
            Category::Font => Some(&self.source.fonts),
            Category::Template | Category::Partial | Category::Library => None,
        }
    }

    /// Absolute source directory of an asset category
    pub fn asset_dir(&self, category: Category) -> Option<PathBuf> {
        self.asset_source(category)
            .map(|source| self.source_dir().join(&source.dir))
    }

    /// Output directory a category lands in, if it is emitted at all
    pub fn destination(&self, category: Category) -> Option<PathBuf> {
        match category.subtree()? {
            Subtree::Templates => Some(self.templates_dir()),
            Subtree::Static(name) => Some(self.static_dir().join(name)),
        }
    }

    /// Every folder the destination tree consists of
    pub fn destination_folders(&self) -> Vec<PathBuf> {
        let mut folders = vec![self.templates_dir(), self.static_dir()];
        folders.extend(
            Category::STATIC
                .iter()
                .filter_map(|category| self.destination(*category)),
        );
        folders
    }

    /// Exclude globs applied inside each third-party package
    pub fn lib_excludes(&self) -> Vec<String> {
        let mut excludes: Vec<String> = if self.libs.replace_default_excludes {
            Vec::new()
        } else {
            DEFAULT_LIB_EXCLUDES.iter().map(|s| (*s).to_string()).collect()
        };
        excludes.extend(self.libs.excludes.iter().cloned());
        excludes
    }
}
