//! Block → markdown rendering.
//!
//! Pure functions, no I/O. Every block renders to a (possibly empty) string;
//! child page references and unknown kinds render to nothing because nested
//! pages get their own section from the tree walk.

use crate::blocks::{ContentBlock, InlineRun};

/// Render one block as a markdown fragment.
pub fn render_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Paragraph(runs) => render_rich_text(runs),
        ContentBlock::Heading { level, runs } => {
            let hashes = "#".repeat((*level).clamp(1, 3) as usize);
            format!("{hashes} {}", render_rich_text(runs))
        }
        ContentBlock::BulletedItem(runs) => format!("- {}", render_rich_text(runs)),
        // Numbering is visual only; markdown renderers renumber.
        ContentBlock::NumberedItem(runs) => format!("1. {}", render_rich_text(runs)),
        ContentBlock::ToDo { checked, runs } => {
            let mark = if *checked { "[x]" } else { "[ ]" };
            format!("- {mark} {}", render_rich_text(runs))
        }
        ContentBlock::Code { language, runs } => {
            let code: String = runs.iter().map(|r| r.text.as_str()).collect();
            format!("```{}\n{code}\n```", language.as_deref().unwrap_or_default())
        }
        ContentBlock::Quote(runs) => format!("> {}", render_rich_text(runs)),
        ContentBlock::Callout(runs) => format!("> **Note:** {}", render_rich_text(runs)),
        ContentBlock::Divider => "---".to_string(),
        ContentBlock::ChildPage { .. } | ContentBlock::LinkToPage { .. } => String::new(),
        ContentBlock::Unsupported { .. } => String::new(),
    }
}

/// Concatenate inline runs, applying bold, then italic, then code, so code
/// ends up as the outermost marker.
pub fn render_rich_text(runs: &[InlineRun]) -> String {
    runs.iter().map(render_run).collect()
}

fn render_run(run: &InlineRun) -> String {
    let mut text = run.text.clone();
    if run.bold {
        text = format!("**{text}**");
    }
    if run.italic {
        text = format!("*{text}*");
    }
    if run.code {
        text = format!("`{text}`");
    }
    text
}

/// Render a page body: non-empty fragments joined by newlines.
pub fn render_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(render_block)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
