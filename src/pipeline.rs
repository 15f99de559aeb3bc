//! Stage orchestration.
//!
//! ```text
//! build:   init → clean → [css | js | images | fonts | templates] → fix-refs → libs
//! develop: init →         [css | js | images | fonts | templates] → fix-refs → watch
//! ```
//!
//! The bracketed stages touch disjoint subtrees and run in parallel; all of
//! them finish before the corrective pass starts. The first failure stops the
//! run and nothing is rolled back.

use crate::assemble::{clean_static, copy_category, copy_libs, create_folders};
use crate::category::Category;
use crate::config::Config;
use crate::error::Result;
use crate::include::Includer;
use crate::rules::RuleTable;
use crate::templates::{correct_templates, generate_templates, touch_templates};
use rayon::prelude::*;
use std::fmt;

/// A named unit of pipeline work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    InitFolders,
    CleanStatic,
    Css,
    Js,
    Images,
    Fonts,
    Templates,
    FixRefs,
    TouchTemplates,
    Libs,
}

impl Stage {
    /// Stages that may run side by side
    pub const GENERATE: [Stage; 5] = [
        Stage::Css,
        Stage::Js,
        Stage::Images,
        Stage::Fonts,
        Stage::Templates,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::InitFolders => "init",
            Stage::CleanStatic => "clean",
            Stage::Css => "css",
            Stage::Js => "js",
            Stage::Images => "images",
            Stage::Fonts => "fonts",
            Stage::Templates => "templates",
            Stage::FixRefs => "fix-refs",
            Stage::TouchTemplates => "touch",
            Stage::Libs => "libs",
        }
    }

    /// The copy stage for an asset category
    pub fn for_asset(category: Category) -> Option<Stage> {
        match category {
            Category::Stylesheet => Some(Stage::Css),
            Category::Script => Some(Stage::Js),
            Category::Image => Some(Stage::Images),
            Category::Font => Some(Stage::Fonts),
            Category::Template | Category::Partial | Category::Library => None,
        }
    }

    /// Stages to rerun, in order, after sources of `category` change
    pub fn rebuild_plan(category: Category) -> Vec<Stage> {
        match category {
            Category::Template | Category::Partial => {
                vec![Stage::Templates, Stage::FixRefs, Stage::TouchTemplates]
            }
            Category::Library => vec![Stage::Libs],
            asset => Stage::for_asset(asset).into_iter().collect(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one finished stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub files: usize,
}

/// Shared, read-only state for every stage of a run
#[derive(Debug)]
pub struct Pipeline<'a> {
    config: &'a Config,
    rules: RuleTable,
    includer: Includer,
}

impl<'a> Pipeline<'a> {
    /// Builds the rule table and includer once for the whole run
    ///
    /// # Errors
    ///
    /// Returns rule table errors (bad extra rules or asset marker).
    pub fn new(config: &'a Config) -> Result<Self> {
        let rules = RuleTable::from_config(config)?;
        let includer = Includer::new(&config.include.prefix, &config.source_dir())?;
        Ok(Self {
            config,
            rules,
            includer,
        })
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Runs a single stage; errors carry the stage name
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Stage` wrapping the underlying failure.
    pub fn run_stage(&self, stage: Stage) -> Result<StageReport> {
        tracing::debug!(%stage, "starting");
        let files = self.execute(stage).map_err(|e| e.in_stage(stage.name()))?;
        tracing::info!(%stage, files, "finished");
        Ok(StageReport { stage, files })
    }

    fn execute(&self, stage: Stage) -> Result<usize> {
        let config = self.config;
        match stage {
            Stage::InitFolders => create_folders(config).map(|()| 0),
            Stage::CleanStatic => clean_static(config).map(|()| 0),
            Stage::Css => copy_category(config, Category::Stylesheet).map(|f| f.len()),
            Stage::Js => copy_category(config, Category::Script).map(|f| f.len()),
            Stage::Images => copy_category(config, Category::Image).map(|f| f.len()),
            Stage::Fonts => copy_category(config, Category::Font).map(|f| f.len()),
            Stage::Templates => {
                generate_templates(config, &self.includer, &self.rules).map(|f| f.len())
            }
            Stage::FixRefs => correct_templates(config, &self.rules).map(|f| f.len()),
            Stage::TouchTemplates => touch_templates(config),
            Stage::Libs => copy_libs(config).map(|f| f.len()),
        }
    }

    /// Runs stages one after another, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns the first stage error.
    pub fn run_sequence(&self, stages: &[Stage]) -> Result<Vec<StageReport>> {
        stages.iter().map(|stage| self.run_stage(*stage)).collect()
    }

    /// Runs stages in parallel and returns once all of them have finished
    ///
    /// # Errors
    ///
    /// Returns a stage error if any stage failed.
    pub fn run_parallel(&self, stages: &[Stage]) -> Result<Vec<StageReport>> {
        let results: Vec<Result<StageReport>> = stages
            .par_iter()
            .map(|stage| self.run_stage(*stage))
            .collect();
        results.into_iter().collect()
    }

    /// Copies assets and renders templates in parallel, then runs the corrective pass
    ///
    /// # Errors
    ///
    /// Returns the first stage error.
    pub fn generate(&self) -> Result<Vec<StageReport>> {
        let mut reports = self.run_parallel(&Stage::GENERATE)?;
        reports.push(self.run_stage(Stage::FixRefs)?);
        Ok(reports)
    }

    /// The full production build
    ///
    /// # Errors
    ///
    /// Returns the first stage error; later stages do not run.
    pub fn build(&self) -> Result<Vec<StageReport>> {
        let mut reports = self.run_sequence(&[Stage::InitFolders, Stage::CleanStatic])?;
        reports.extend(self.generate()?);
        reports.push(self.run_stage(Stage::Libs)?);
        Ok(reports)
    }

    /// Everything develop mode does before it starts watching
    ///
    /// # Errors
    ///
    /// Returns the first stage error.
    pub fn prepare_develop(&self) -> Result<Vec<StageReport>> {
        let mut reports = vec![self.run_stage(Stage::InitFolders)?];
        reports.extend(self.generate()?);
        Ok(reports)
    }
}
