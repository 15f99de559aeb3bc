//! Develop mode: regenerate the affected category whenever a source changes.
//!
//! Events are drained for a short debounce window, then the rebuilds they
//! call for run one after another on this thread. Events that arrive during a
//! rebuild wait for the next round.

use crate::category::Category;
use crate::collect::{FileSet, build_globset};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::pipeline::{Pipeline, Stage};
use globset::GlobSet;
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::Duration;

const DEBOUNCE_MS: u64 = 200;

/// Maps a changed source path to the category whose output depends on it
#[derive(Debug)]
pub struct ChangeClassifier {
    source_dir: PathBuf,
    templates: FileSet,
    partials: GlobSet,
    assets: Vec<(Category, PathBuf, GlobSet)>,
}

impl ChangeClassifier {
    /// # Errors
    ///
    /// Returns `PipelineError::Glob` for an invalid configured pattern.
    pub fn new(config: &Config) -> Result<Self> {
        let mut assets = Vec::new();
        for category in Category::ASSETS {
            if let (Some(source), Some(dir)) =
                (config.asset_source(category), config.asset_dir(category))
            {
                assets.push((category, dir, build_globset(&source.patterns)?));
            }
        }
        Ok(Self {
            source_dir: config.source_dir(),
            templates: FileSet::new(&config.source.templates, &[])?,
            partials: build_globset(&config.source.partials)?,
            assets,
        })
    }

    pub fn classify(&self, path: &Path) -> Option<Category> {
        for (category, dir, patterns) in &self.assets {
            if let Ok(relative) = path.strip_prefix(dir)
                && patterns.is_match(relative)
            {
                return Some(*category);
            }
        }

        let relative = path.strip_prefix(&self.source_dir).ok()?;
        if self.partials.is_match(relative) {
            Some(Category::Partial)
        } else if self.templates.matches(relative) {
            Some(Category::Template)
        } else {
            None
        }
    }
}

/// Content changes only; metadata and access noise would retrigger forever
fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(modify) => !matches!(modify, notify::event::ModifyKind::Metadata(_)),
        _ => false,
    }
}

/// Stages to run for a batch of changed categories, deduplicated, in order
pub fn plan(categories: &BTreeSet<Category>) -> Vec<Stage> {
    let mut stages = Vec::new();
    for category in categories {
        for stage in Stage::rebuild_plan(*category) {
            if !stages.contains(&stage) {
                stages.push(stage);
            }
        }
    }
    stages
}

/// Runs the initial generation, then watches the source tree until the
/// watcher goes away
///
/// # Errors
///
/// Returns errors from the initial generation or from starting the watcher.
/// Failed rebuilds while watching are logged and do not stop the loop.
pub fn develop(pipeline: &Pipeline<'_>) -> Result<()> {
    let config = pipeline.config();
    let classifier = ChangeClassifier::new(config)?;

    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    let source_dir = config.source_dir();
    watcher
        .watch(&source_dir, RecursiveMode::Recursive)
        .map_err(PipelineError::Watch)?;

    // The watcher is attached first so edits made during the first build are queued
    pipeline.prepare_develop()?;
    tracing::info!(dir = %source_dir.display(), "watching for changes (press Ctrl+C to stop)");

    let mut pending = BTreeSet::new();
    let note = |result: notify::Result<notify::Event>, pending: &mut BTreeSet<Category>| {
        match result {
            Ok(event) if is_relevant(&event.kind) => {
                pending.extend(event.paths.iter().filter_map(|p| classifier.classify(p)));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("watch error: {e}"),
        }
    };

    while let Ok(first) = rx.recv() {
        note(first, &mut pending);
        loop {
            match rx.recv_timeout(Duration::from_millis(DEBOUNCE_MS)) {
                Ok(next) => note(next, &mut pending),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }

        if pending.is_empty() {
            continue;
        }
        let categories = std::mem::take(&mut pending);
        tracing::info!(?categories, "change detected, rebuilding");
        if let Err(e) = pipeline.run_sequence(&plan(&categories)) {
            tracing::error!("rebuild failed: {e}");
        }
    }

    Ok(())
}
