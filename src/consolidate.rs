//! Consolidation of rendered pages into one markdown document.
//!
//! The [`Consolidator`] is an append-only list of text sections. Output order
//! is exactly call order; the exporter calls it in pre-order over the page
//! tree, so the document mirrors the hierarchy (each project, then its steps,
//! then each step's sub-steps, before the next project).
//!
//! Statistics are recomputed from the concatenated content on every call
//! rather than maintained incrementally, so they can never drift from it.

use chrono::{DateTime, Local};
use deunicode::deunicode;
use serde::Serialize;

use crate::tree::PageNode;

/// Summary numbers for a consolidated document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    pub character_count: usize,
    /// Whitespace separated tokens.
    pub word_count: usize,
    pub line_count: usize,
    /// UTF-8 size in KiB, rounded to two decimals.
    pub estimated_size_kb: f64,
    /// UTF-8 size in MiB, rounded to two decimals.
    pub estimated_size_mb: f64,
}

impl Statistics {
    pub fn of(content: &str) -> Self {
        let bytes = content.len() as f64;
        Self {
            character_count: content.chars().count(),
            word_count: content.split_whitespace().count(),
            line_count: content.split('\n').count(),
            estimated_size_kb: round2(bytes / 1024.0),
            estimated_size_mb: round2(bytes / (1024.0 * 1024.0)),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct Consolidator {
    title: String,
    generated_at: DateTime<Local>,
    sections: Vec<String>,
}

impl Consolidator {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_timestamp(title, Local::now())
    }

    /// Use a fixed generation time for the header and filename.
    pub fn with_timestamp(title: impl Into<String>, generated_at: DateTime<Local>) -> Self {
        Self {
            title: title.into(),
            generated_at,
            sections: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    /// Document title, generation time and preamble. Call once, first.
    pub fn add_header(&mut self) {
        let name = &self.title;
        let generated = self.generated_at.format("%Y-%m-%d %H:%M:%S");
        self.sections.push(format!(
            "# {name} - Complete Knowledge Base\n\n\
             **Generated:** {generated}\n\n\
             **Purpose:** This document contains the complete curriculum and content for the {name}.\n\
             It is structured hierarchically: Projects → Steps → Sub-steps.\n\n\
             ---\n\n"
        ));
    }

    /// Numbered table of contents for everything below `root`.
    pub fn add_table_of_contents(&mut self, root: &PageNode) {
        let mut lines = vec!["## Table of Contents\n".to_string()];
        toc_lines(&root.children, "", 0, &mut lines);
        lines.push("\n---\n".to_string());
        self.sections.push(lines.join("\n") + "\n");
    }

    /// One page section: heading at depth `level + 1`, optional metadata
    /// call-out, then the body when it is not blank.
    pub fn add_page_content(
        &mut self,
        title: &str,
        content: &str,
        level: usize,
        metadata: Option<&[(String, String)]>,
    ) {
        let mut section = format!("{} {title}\n\n", "#".repeat(level + 1));
        if let Some(metadata) = metadata {
            section.push_str(&format_metadata(metadata));
        }
        if !content.trim().is_empty() {
            section.push_str(content);
            section.push_str("\n\n");
        }
        section.push('\n');
        self.sections.push(section);
    }

    pub fn add_section_separator(&mut self, name: Option<&str>) {
        let separator = match name {
            Some(name) => format!("\n---\n\n## {name}\n\n"),
            None => "\n---\n\n".to_string(),
        };
        self.sections.push(separator);
    }

    pub fn consolidated_content(&self) -> String {
        self.sections.concat()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::of(&self.consolidated_content())
    }

    /// `<slug>-knowledge-base-<YYYYMMDD>.md`
    pub fn generate_filename(&self) -> String {
        format!(
            "{}-knowledge-base-{}.md",
            slugify(&self.title),
            self.generated_at.format("%Y%m%d")
        )
    }
}

fn format_metadata(metadata: &[(String, String)]) -> String {
    let parts: Vec<String> = metadata
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| format!("**{key}:** {value}"))
        .collect();
    if parts.is_empty() {
        return String::new();
    }
    format!("> {}\n\n", parts.join(" | "))
}

fn toc_lines(nodes: &[PageNode], prefix: &str, depth: usize, lines: &mut Vec<String>) {
    for (i, node) in nodes.iter().enumerate() {
        let number = format!("{prefix}{}.", i + 1);
        lines.push(format!(
            "{}{number} [{}](#{})",
            "   ".repeat(depth),
            node.title,
            slugify(&node.title)
        ));
        toc_lines(&node.children, &number, depth + 1, lines);
    }
}

/// URL-safe slug: lowercase ASCII alphanumerics separated by single hyphens.
///
/// Non-ASCII text is transliterated first, so accented letters survive as
/// their base letter ("Résumé" becomes `resume`).
pub fn slugify(text: &str) -> String {
    let slug = deunicode(text)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}
