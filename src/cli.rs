//! Command line glue for `notion-kb-export`.
//!
//! Parses arguments, loads configuration, wires the HTTP client into the
//! [`Exporter`] and prints a human readable trail. All export behaviour lives
//! in the library modules; [`run`] is exposed so integration tests can drive
//! the CLI without spawning a process.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::client::NotionClient;
use crate::config::{AppConfig, MAX_DEPTH_LIMIT};
use crate::export::{read_url_list, ExportReport, Exporter, OVERSIZED_MB};
use crate::load_config::load_config;
use crate::progress::{ProgressReporter, Stage};
use crate::tree::ChildFailure;

/// Export Notion page trees into single markdown knowledge bases.
#[derive(Parser)]
#[clap(
    name = "notion-kb-export",
    version,
    about = "Export a Notion externship page tree into one consolidated markdown knowledge base"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the page tree under one Notion URL
    Export {
        /// Notion page URL or bare page ID
        #[clap(long)]
        url: String,
        /// Directory for the generated file
        #[clap(long)]
        output: Option<PathBuf>,
        /// Document name, replacing the root page title
        #[clap(long)]
        name: Option<String>,
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Deepest level to fetch (root is 0)
        #[clap(long)]
        max_depth: Option<usize>,
        /// Add a numbered table of contents
        #[clap(long)]
        toc: bool,
        /// Add section and page ID call-outs under each heading
        #[clap(long)]
        metadata: bool,
    },
    /// Export every URL listed in a file, one per line
    Batch {
        /// Text file with one Notion URL per line; `#` starts a comment
        file: PathBuf,
        /// Directory for the generated files
        #[clap(long)]
        output: Option<PathBuf>,
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Prints stage and page progress to stdout.
#[derive(Debug, Default)]
pub struct StdoutProgress;

impl ProgressReporter for StdoutProgress {
    fn stage(&self, stage: Stage, detail: &str) {
        println!("✓ {stage}: {detail}");
    }

    fn page(&self, done: usize, total: usize, title: &str) {
        println!("  [{done}/{total}] {title}");
    }

    fn warning(&self, failure: &ChildFailure) {
        println!(
            "  ⚠ skipped page {} under {}: {}",
            failure.page_id, failure.parent_id, failure.reason
        );
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling export");
            watcher.cancel();
        }
    });

    match cli.command {
        Commands::Export {
            url,
            output,
            name,
            config,
            max_depth,
            toc,
            metadata,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = output {
                config.export.output_dir = dir;
            }
            if let Some(depth) = max_depth {
                if depth > MAX_DEPTH_LIMIT {
                    bail!("--max-depth {depth} exceeds the limit of {MAX_DEPTH_LIMIT}");
                }
                config.export.max_depth = depth;
            }
            config.export.table_of_contents |= toc;
            config.export.page_metadata |= metadata;

            run_export(config, &url, name.as_deref(), cancel).await
        }
        Commands::Batch {
            file,
            output,
            config,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dir) = output {
                config.export.output_dir = dir;
            }
            run_batch(config, &file, cancel).await
        }
    }
}

async fn run_export(
    config: AppConfig,
    url: &str,
    name: Option<&str>,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!(command = "export", url, "Starting export");
    let client = NotionClient::new(config.notion)?.with_cancellation(cancel.clone());
    let progress = StdoutProgress;
    let exporter = Exporter::new(&client, config.export)
        .with_cancellation(cancel)
        .with_progress(&progress);

    match exporter.export(url, name).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "export", error = %e, "Export failed");
            Err(anyhow::Error::new(e).context(format!("export of {url} failed")))
        }
    }
}

async fn run_batch(config: AppConfig, file: &std::path::Path, cancel: CancellationToken) -> Result<()> {
    let urls = read_url_list(file)
        .await
        .with_context(|| format!("cannot read batch file {}", file.display()))?;
    tracing::info!(command = "batch", count = urls.len(), "Starting batch export");

    let client = NotionClient::new(config.notion)?.with_cancellation(cancel.clone());
    let progress = StdoutProgress;
    let exporter = Exporter::new(&client, config.export)
        .with_cancellation(cancel)
        .with_progress(&progress);

    let report = exporter.batch_export(&urls).await;

    println!("\nBatch summary: {} of {} succeeded", report.successes.len(), report.total());
    for done in &report.successes {
        println!("  ✓ {} -> {} ({:.2} MB)", done.name, done.output_path.display(), done.size_mb);
    }
    for failed in &report.failures {
        println!("  ✗ {}: {}", failed.url, failed.error);
    }

    if !report.all_succeeded() {
        bail!(
            "{} of {} exports failed",
            report.failures.len(),
            report.total()
        );
    }
    Ok(())
}

fn print_report(report: &ExportReport) {
    let stats = &report.statistics;
    println!("\nExport complete: {}", report.name);
    println!("  File:       {}", report.output_path.display());
    println!("  Pages:      {}", report.page_count);
    println!("  Words:      {}", stats.word_count);
    println!("  Characters: {}", stats.character_count);
    println!("  Lines:      {}", stats.line_count);
    println!("  Size:       {:.2} KB ({:.2} MB)", stats.estimated_size_kb, stats.estimated_size_mb);
    if !report.warnings.is_empty() {
        println!("  Skipped:    {} page(s), see warnings above", report.warnings.len());
    }
    if report.is_oversized() {
        println!(
            "  ⚠ File exceeds {OVERSIZED_MB} MB; split the export before uploading it"
        );
    }
}
