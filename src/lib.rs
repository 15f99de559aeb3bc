//! # djbundle
//!
//! An asset pipeline that turns a folder of static HTML/CSS/JS sources into
//! the `templates/` and `static/` trees a Django project serves. Templates
//! have their `@@include('...')` directives expanded and their asset and page
//! references rewritten into `{% static %}` and `{% url %}` tags; assets and
//! runtime npm dependencies are copied across unchanged.
//!
//! ## Features
//!
//! - Recursive include expansion with cycle detection
//! - Ordered, idempotent reference rewriting with a corrective pass
//! - Byte-for-byte asset copying per category
//! - `package.json` driven library snapshot
//! - Develop mode that rebuilds on change
//! - Advisory scan for references left unwrapped
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use djbundle::{Config, Pipeline};
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("."), None)?;
//! let pipeline = Pipeline::new(&config)?;
//! for report in pipeline.build()? {
//!     println!("{}: {} files", report.stage, report.files);
//! }
//! # Ok::<(), djbundle::PipelineError>(())
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Production build
//! djbundle build
//!
//! # Rebuild on change
//! djbundle develop
//!
//! # Look for references the rules missed
//! djbundle check --format json
//! ```

pub mod assemble;
pub mod category;
pub mod collect;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod include;
pub mod pipeline;
pub mod rules;
pub mod scan;
pub mod templates;
pub mod watch;

pub use category::{Category, SourceFile};
pub use config::Config;
pub use error::{PipelineError, Result};
pub use include::Includer;
pub use pipeline::{Pipeline, Stage, StageReport};
pub use rules::{Pass, RewriteRule, RuleTable};
pub use scan::{Finding, scan_templates};
