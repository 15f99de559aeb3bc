use crate::error::Result;
use crate::fs_utils::read_file_contents;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Classification of a source file; decides which stage handles it and where it lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Template,
    Partial,
    Image,
    Font,
    Script,
    Stylesheet,
    Library,
}

/// Output location of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtree {
    /// The templates root
    Templates,
    /// A named folder under the static root
    Static(&'static str),
}

impl Category {
    /// Categories copied verbatim from a source folder
    pub const ASSETS: [Category; 4] = [
        Category::Stylesheet,
        Category::Script,
        Category::Image,
        Category::Font,
    ];

    /// Categories that land under the static root
    pub const STATIC: [Category; 5] = [
        Category::Stylesheet,
        Category::Script,
        Category::Image,
        Category::Font,
        Category::Library,
    ];

    /// The one subtree this category is written to. Partials are only reachable
    /// through inclusion and have none.
    pub fn subtree(self) -> Option<Subtree> {
        match self {
            Category::Template => Some(Subtree::Templates),
            Category::Partial => None,
            Category::Image => Some(Subtree::Static("images")),
            Category::Font => Some(Subtree::Static("fonts")),
            Category::Script => Some(Subtree::Static("js")),
            Category::Stylesheet => Some(Subtree::Static("css")),
            Category::Library => Some(Subtree::Static("libs")),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Template => "templates",
            Category::Partial => "partials",
            Category::Image => "images",
            Category::Font => "fonts",
            Category::Script => "js",
            Category::Stylesheet => "css",
            Category::Library => "libs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source file loaded for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
    pub category: Category,
}

impl SourceFile {
    /// Reads a text source file
    ///
    /// # Errors
    ///
    /// Returns errors from `read_file_contents`.
    pub fn load(path: &Path, category: Category) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            content: read_file_contents(path)?,
            category,
        })
    }
}
