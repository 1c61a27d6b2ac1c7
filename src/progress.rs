//! Progress channel for long running exports.
//!
//! The pipeline reports stage transitions, per-page progress and recoverable
//! warnings through [`ProgressReporter`]. The library default only logs; the
//! CLI prints a human readable trail to stdout.

use std::fmt;

use tracing::{info, warn};

use crate::tree::ChildFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingId,
    FetchingRoot,
    BuildingTree,
    RenderingPages,
    Saving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::ResolvingId => "Extracting page information",
            Stage::FetchingRoot => "Fetching root page",
            Stage::BuildingTree => "Building content hierarchy",
            Stage::RenderingPages => "Exporting page content",
            Stage::Saving => "Saving consolidated file",
        };
        f.write_str(label)
    }
}

pub trait ProgressReporter: Send + Sync {
    /// A stage finished; `detail` summarises its result.
    fn stage(&self, _stage: Stage, _detail: &str) {}

    /// Page `done` of `total` has been rendered.
    fn page(&self, _done: usize, _total: usize, _title: &str) {}

    /// A child page was skipped.
    fn warning(&self, _failure: &ChildFailure) {}
}

/// Reports through `tracing` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn stage(&self, stage: Stage, detail: &str) {
        info!(%stage, detail, "Stage complete");
    }

    fn page(&self, done: usize, total: usize, title: &str) {
        tracing::debug!(done, total, title, "Rendered page");
    }

    fn warning(&self, failure: &ChildFailure) {
        warn!(
            parent_id = %failure.parent_id,
            page_id = %failure.page_id,
            reason = %failure.reason,
            "Skipped child page"
        );
    }
}
