//! Export orchestration: URL in, consolidated markdown file out.
//!
//! One export runs these stages in order, aborting on the first fatal error:
//!
//! 1. resolve the page identifier from the URL,
//! 2. fetch the root page and settle the document name,
//! 3. build the page tree ([`TreeBuilder`]),
//! 4. render each page below the root in pre-order,
//! 5. consolidate and write `<output_dir>/<slug>-knowledge-base-<date>.md`.
//!
//! Batch runs call [`Exporter::export`] once per URL, sequentially, and turn
//! each failure into a [`BatchFailure`] entry instead of stopping.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ExportOptions;
use crate::consolidate::{Consolidator, Statistics};
use crate::contract::{list_all_blocks, NotionApi};
use crate::error::{ExportError, Result};
use crate::page_id::extract_page_id;
use crate::progress::{ProgressReporter, Stage, TracingProgress};
use crate::render::render_blocks;
use crate::tree::{ChildFailure, PageNode, TreeBuilder};

/// Exports larger than this are flagged; most LLM upload forms reject them.
pub const OVERSIZED_MB: f64 = 10.0;

#[derive(Debug)]
pub struct ExportReport {
    pub name: String,
    pub output_path: PathBuf,
    pub statistics: Statistics,
    pub page_count: usize,
    pub warnings: Vec<ChildFailure>,
}

impl ExportReport {
    pub fn is_oversized(&self) -> bool {
        self.statistics.estimated_size_mb > OVERSIZED_MB
    }
}

/// One page's rendered body, before consolidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub id: String,
    pub title: String,
    pub level: usize,
    pub content: String,
}

/// A fully assembled document that has not been written anywhere yet.
#[derive(Debug)]
pub struct Document {
    pub root: PageNode,
    pub pages: Vec<RenderedPage>,
    pub warnings: Vec<ChildFailure>,
    pub consolidator: Consolidator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSuccess {
    pub url: String,
    pub name: String,
    pub output_path: PathBuf,
    pub size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub successes: Vec<BatchSuccess>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Exporter<'a, A: ?Sized> {
    api: &'a A,
    options: ExportOptions,
    cancel: CancellationToken,
    progress: &'a dyn ProgressReporter,
}

impl<'a, A> Exporter<'a, A>
where
    A: NotionApi + ?Sized,
{
    pub fn new(api: &'a A, options: ExportOptions) -> Self {
        Self {
            api,
            options,
            cancel: CancellationToken::new(),
            progress: &TracingProgress,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Export the page tree under `url` to a file in the output directory.
    ///
    /// `custom_name` replaces the root page title in the header and filename.
    pub async fn export(&self, url: &str, custom_name: Option<&str>) -> Result<ExportReport> {
        let document = self.render_document(url, custom_name).await?;
        let consolidator = &document.consolidator;

        let dir = &self.options.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ExportError::io(dir.clone(), e))?;
        let output_path = dir.join(consolidator.generate_filename());
        tokio::fs::write(&output_path, consolidator.consolidated_content())
            .await
            .map_err(|e| ExportError::io(output_path.clone(), e))?;

        let statistics = consolidator.statistics();
        self.progress
            .stage(Stage::Saving, &output_path.display().to_string());
        if let Ok(json) = serde_json::to_string(&statistics) {
            debug!(statistics = %json, "[EXPORT] Document statistics");
        }

        let report = ExportReport {
            name: consolidator.title().to_string(),
            output_path,
            statistics,
            page_count: document.root.count_pages(),
            warnings: document.warnings,
        };
        if report.is_oversized() {
            warn!(
                size_mb = report.statistics.estimated_size_mb,
                limit_mb = OVERSIZED_MB,
                "[EXPORT] Exported file is larger than the usual upload limit"
            );
        }
        info!(
            output = %report.output_path.display(),
            pages = report.page_count,
            size_kb = report.statistics.estimated_size_kb,
            "[EXPORT] Export complete"
        );
        Ok(report)
    }

    /// Everything [`Exporter::export`] does except writing the file.
    pub async fn render_document(&self, url: &str, custom_name: Option<&str>) -> Result<Document> {
        let page_id = extract_page_id(url)?;
        self.progress.stage(Stage::ResolvingId, &page_id);

        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        let root = self.api.fetch_page(&page_id).await?;
        let name = match custom_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => root.title(),
        };
        self.progress.stage(Stage::FetchingRoot, &name);

        let outcome = TreeBuilder::new(self.api, self.options.max_depth)
            .with_cancellation(self.cancel.clone())
            .with_progress(self.progress)
            .build(&page_id, &name)
            .await?;
        let page_count = outcome.root.count_pages();
        self.progress
            .stage(Stage::BuildingTree, &format!("{page_count} pages found"));
        if let Ok(json) = serde_json::to_string(&outcome.root) {
            debug!(tree = %json, "[EXPORT] Page tree");
        }

        let pages = self.render_pages(&outcome.root).await?;
        self.progress
            .stage(Stage::RenderingPages, &format!("{} sections", pages.len()));

        let mut consolidator = Consolidator::new(name);
        consolidator.add_header();
        if self.options.table_of_contents {
            consolidator.add_table_of_contents(&outcome.root);
        }
        for page in &pages {
            let metadata = self.options.page_metadata.then(|| page_metadata(page));
            consolidator.add_page_content(&page.title, &page.content, page.level, metadata.as_deref());
        }

        Ok(Document {
            root: outcome.root,
            pages,
            warnings: outcome.warnings,
            consolidator,
        })
    }

    /// Render every page below the root, in pre-order. The root contributes
    /// the document header only.
    async fn render_pages(&self, root: &PageNode) -> Result<Vec<RenderedPage>> {
        let nodes: Vec<&PageNode> = root
            .pre_order()
            .into_iter()
            .filter(|node| node.level > 0)
            .collect();
        let total = nodes.len();
        let mut pages = Vec::with_capacity(total);

        for (index, node) in nodes.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            let blocks = list_all_blocks(self.api, &node.id, &self.cancel).await?;
            pages.push(RenderedPage {
                id: node.id.clone(),
                title: node.title.clone(),
                level: node.level,
                content: render_blocks(&blocks),
            });
            self.progress.page(index + 1, total, &node.title);
        }
        Ok(pages)
    }

    /// Export each URL in turn. A failing URL is recorded and the batch moves
    /// on; only cancellation stops it early.
    pub async fn batch_export(&self, urls: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        let total = urls.len();

        for (index, url) in urls.iter().enumerate() {
            info!(item = index + 1, total, url = %url, "[BATCH] Exporting");
            match self.export(url, None).await {
                Ok(done) => report.successes.push(BatchSuccess {
                    url: url.clone(),
                    name: done.name,
                    output_path: done.output_path,
                    size_mb: done.statistics.estimated_size_mb,
                }),
                Err(e) => {
                    error!(url = %url, error = %e, "[BATCH][ERROR] Export failed");
                    let cancelled = matches!(e, ExportError::Cancelled);
                    report.failures.push(BatchFailure {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                    if cancelled {
                        break;
                    }
                }
            }
        }

        info!(
            succeeded = report.successes.len(),
            failed = report.failures.len(),
            "[BATCH] Batch finished"
        );
        report
    }
}

fn page_metadata(page: &RenderedPage) -> Vec<(String, String)> {
    let section = match page.level {
        1 => "Project",
        2 => "Step",
        _ => "Sub-step",
    };
    vec![
        ("Section".to_string(), section.to_string()),
        ("Notion ID".to_string(), page.id.clone()),
    ]
}

/// URLs from a batch file: one per line, blank lines and `#` comments skipped.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub async fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ExportError::io(path, e))?;
    let urls = parse_url_list(&content);
    if urls.is_empty() {
        return Err(ExportError::Configuration(format!(
            "no URLs found in {}",
            path.display()
        )));
    }
    info!(count = urls.len(), file = %path.display(), "[BATCH] Loaded URL list");
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_list_skips_blanks_and_comments() {
        let urls = parse_url_list(
            "# externships\n\nhttps://notion.so/A-0123456789abcdef0123456789abcdef\n   \n  # old\n  https://notion.so/B  \n",
        );
        assert_eq!(
            urls,
            [
                "https://notion.so/A-0123456789abcdef0123456789abcdef",
                "https://notion.so/B"
            ]
        );
    }

    #[test]
    fn metadata_labels_follow_level() {
        let page = |level| RenderedPage {
            id: "abc".into(),
            title: "T".into(),
            level,
            content: String::new(),
        };
        assert_eq!(page_metadata(&page(1))[0].1, "Project");
        assert_eq!(page_metadata(&page(2))[0].1, "Step");
        assert_eq!(page_metadata(&page(3))[0].1, "Sub-step");
        assert_eq!(page_metadata(&page(3))[1], ("Notion ID".into(), "abc".into()));
    }

    #[test]
    fn oversized_threshold_is_ten_megabytes() {
        let report = |mb| ExportReport {
            name: "n".into(),
            output_path: PathBuf::from("x.md"),
            statistics: Statistics {
                character_count: 0,
                word_count: 0,
                line_count: 1,
                estimated_size_kb: 0.0,
                estimated_size_mb: mb,
            },
            page_count: 1,
            warnings: Vec::new(),
        };
        assert!(!report(10.0).is_oversized());
        assert!(report(10.01).is_oversized());
    }

    #[tokio::test]
    async fn empty_url_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        std::fs::write(&path, "# nothing yet\n\n").unwrap();
        let err = read_url_list(&path).await.unwrap_err();
        assert!(matches!(err, ExportError::Configuration(_)));
    }

    #[tokio::test]
    async fn missing_url_file_is_an_io_error() {
        let err = read_url_list(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }
}
