//! Page identifier extraction from Notion URLs.
//!
//! A Notion page URL ends with `<Title-Words>-<32 hex id>`, optionally with a
//! query string, a fragment or trailing slashes. The identifier is what follows
//! the last `-` of the final path segment. Bare identifiers (dashed or not) are
//! accepted as well. Anything that does not yield a 32 digit hex identifier is
//! rejected up front.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ExportError, Result};

static NOTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{32}$").expect("static pattern compiles"));

/// Extract the page identifier from a URL-like string.
///
/// ```
/// use notion_kb_export::page_id::extract_page_id;
///
/// let id = extract_page_id(
///     "https://www.notion.so/acme/Marketing-Externship-0123456789abcdef0123456789abcdef?pvs=4",
/// )
/// .unwrap();
/// assert_eq!(id, "0123456789abcdef0123456789abcdef");
/// ```
pub fn extract_page_id(input: &str) -> Result<String> {
    let invalid = |reason: &str| ExportError::InvalidPageUrl {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty input"));
    }

    let without_query = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let segment = without_query.rsplit('/').next().unwrap_or_default();

    let undashed: String = segment.chars().filter(|c| *c != '-').collect();
    if NOTION_ID.is_match(&undashed) {
        return Ok(undashed.to_ascii_lowercase());
    }

    let Some((_, candidate)) = segment.rsplit_once('-') else {
        return Err(invalid("no '-' separated page identifier in the last path segment"));
    };
    if !NOTION_ID.is_match(candidate) {
        return Err(invalid("identifier after the last '-' is not a 32 digit hex id"));
    }
    Ok(candidate.to_ascii_lowercase())
}
