//! # contract: the seam between the export pipeline and the Notion API
//!
//! This module defines the [`NotionApi`] trait and the plain data types that
//! cross it. The pipeline (tree building, rendering, orchestration) only ever
//! talks to the trait, so it can run against the real HTTP client
//! ([`crate::client::NotionClient`]) or a generated mock.
//!
//! ## Physical calls vs. logical listings
//! - [`NotionApi::fetch_page`] and [`NotionApi::list_children_page`] are each
//!   exactly one remote request. Implementors apply rate limiting per call.
//! - [`list_all_blocks`] and [`list_child_refs`] follow the pagination cursor
//!   until `has_more` is false and return the concatenated result. Every
//!   continuation is another physical call, so it is rate limited too.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` (`MockNotionApi`), available in unit
//!   tests and, through the default `test-export-mocks` feature, in
//!   integration tests.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::blocks::{ChildRef, ContentBlock};
use crate::error::{ExportError, Result};

/// Title used when a page carries no usable title.
pub const UNTITLED: &str = "Untitled";

/// The parts of a page object needed to name it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub id: String,
    /// First run of the page's title-typed property, if non-empty.
    pub title_property: Option<String>,
    /// `child_page.title`, present when the page object is a child page block.
    pub child_page_title: Option<String>,
}

impl PageMetadata {
    /// Metadata for a page whose title lives in its title property.
    pub fn titled(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title_property: Some(title.into()),
            child_page_title: None,
        }
    }

    /// Extract metadata from a raw page object.
    pub fn from_value(id: &str, value: &Value) -> Self {
        let title_property = value
            .get("properties")
            .and_then(Value::as_object)
            .and_then(|props| {
                props.values().find_map(|prop| {
                    if prop.get("type").and_then(Value::as_str) != Some("title") {
                        return None;
                    }
                    prop.get("title")
                        .and_then(Value::as_array)
                        .and_then(|runs| runs.first())
                        .and_then(|run| run.get("plain_text"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
            });
        let child_page_title = value
            .get("child_page")
            .map(|cp| {
                cp.get("title")
                    .and_then(Value::as_str)
                    .unwrap_or(UNTITLED)
                    .to_string()
            });
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string();

        Self {
            id,
            title_property,
            child_page_title,
        }
    }

    /// Title property, then `child_page.title`, then [`UNTITLED`].
    pub fn title(&self) -> String {
        self.title_property
            .clone()
            .or_else(|| self.child_page_title.clone())
            .unwrap_or_else(|| UNTITLED.to_string())
    }
}

/// One page of a children listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildrenPage {
    pub blocks: Vec<ContentBlock>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct RawChildrenPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl ChildrenPage {
    /// Decode a `{results, has_more, next_cursor}` listing response.
    pub fn from_value(block_id: &str, value: Value) -> Result<Self> {
        let raw: RawChildrenPage =
            serde_json::from_value(value).map_err(|e| ExportError::Decode {
                id: block_id.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            blocks: raw.results.iter().map(ContentBlock::from_value).collect(),
            has_more: raw.has_more,
            next_cursor: raw.next_cursor,
        })
    }

    /// A final page holding `blocks`.
    pub fn last(blocks: Vec<ContentBlock>) -> Self {
        Self {
            blocks,
            has_more: false,
            next_cursor: None,
        }
    }
}

/// Remote operations the export pipeline needs.
///
/// Implementations must embed the requested identifier in every error they
/// return.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait NotionApi: Send + Sync {
    /// Fetch one page's metadata.
    async fn fetch_page(&self, page_id: &str) -> Result<PageMetadata>;

    /// Fetch one page of the children of a block or page.
    async fn list_children_page(
        &self,
        block_id: &str,
        start_cursor: Option<String>,
    ) -> Result<ChildrenPage>;
}

/// All children blocks of `block_id`, in listing order, across every page of
/// the listing.
pub async fn list_all_blocks<A>(
    api: &A,
    block_id: &str,
    cancel: &CancellationToken,
) -> Result<Vec<ContentBlock>>
where
    A: NotionApi + ?Sized,
{
    let mut blocks = Vec::new();
    let mut cursor: Option<String> = None;
    let mut calls = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        let page = api.list_children_page(block_id, cursor.take()).await?;
        calls += 1;
        blocks.extend(page.blocks);

        match (page.has_more, page.next_cursor) {
            (true, Some(next)) => cursor = Some(next),
            (true, None) => {
                warn!(block_id, "Listing reported more results but no cursor; stopping");
                break;
            }
            (false, _) => break,
        }
    }

    debug!(block_id, calls, blocks = blocks.len(), "Listed children");
    Ok(blocks)
}

/// References to the pages nested directly under `page_id`, in listing order.
pub async fn list_child_refs<A>(
    api: &A,
    page_id: &str,
    cancel: &CancellationToken,
) -> Result<Vec<ChildRef>>
where
    A: NotionApi + ?Sized,
{
    let blocks = list_all_blocks(api, page_id, cancel).await?;
    Ok(blocks.iter().filter_map(ContentBlock::child_ref).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::InlineRun;
    use serde_json::json;

    #[test]
    fn title_prefers_title_property() {
        let page = json!({
            "id": "p1",
            "properties": {
                "Status": { "type": "select", "select": null },
                "Name": { "type": "title", "title": [{ "plain_text": "Externship A" }] }
            },
            "child_page": { "title": "ignored" }
        });
        assert_eq!(PageMetadata::from_value("p1", &page).title(), "Externship A");
    }

    #[test]
    fn title_falls_back_to_child_page_then_untitled() {
        let page = json!({
            "properties": { "title": { "type": "title", "title": [] } },
            "child_page": { "title": "Step 2" }
        });
        assert_eq!(PageMetadata::from_value("p2", &page).title(), "Step 2");

        let bare = json!({ "object": "page" });
        let meta = PageMetadata::from_value("p3", &bare);
        assert_eq!(meta.id, "p3");
        assert_eq!(meta.title(), UNTITLED);
    }

    #[test]
    fn children_page_decodes_results_and_cursor() {
        let body = json!({
            "object": "list",
            "results": [
                { "type": "paragraph", "paragraph": { "rich_text": [
                    { "type": "text", "text": { "content": "Hello" }, "annotations": {} }
                ]}},
                { "type": "divider", "divider": {} }
            ],
            "has_more": true,
            "next_cursor": "c2"
        });
        let page = ChildrenPage::from_value("b1", body).unwrap();
        assert_eq!(
            page.blocks,
            vec![
                ContentBlock::Paragraph(vec![InlineRun::plain("Hello")]),
                ContentBlock::Divider
            ]
        );
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn children_page_rejects_non_object_bodies() {
        let err = ChildrenPage::from_value("b9", json!("oops")).unwrap_err();
        assert!(matches!(err, ExportError::Decode { ref id, .. } if id == "b9"));
    }

    #[tokio::test]
    async fn list_all_blocks_follows_cursor_until_exhausted() {
        let mut api = MockNotionApi::new();
        api.expect_list_children_page()
            .times(3)
            .returning(|_, cursor| {
                let page = match cursor.as_deref() {
                    None => ChildrenPage {
                        blocks: vec![ContentBlock::Divider],
                        has_more: true,
                        next_cursor: Some("c1".into()),
                    },
                    Some("c1") => ChildrenPage {
                        blocks: vec![ContentBlock::Paragraph(vec![InlineRun::plain("x")])],
                        has_more: true,
                        next_cursor: Some("c2".into()),
                    },
                    _ => ChildrenPage::last(vec![ContentBlock::Divider]),
                };
                Ok(page)
            });

        let blocks = list_all_blocks(&api, "root", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            ContentBlock::Paragraph(vec![InlineRun::plain("x")])
        );
    }

    #[tokio::test]
    async fn list_child_refs_keeps_only_page_references_in_order() {
        let mut api = MockNotionApi::new();
        api.expect_list_children_page().returning(|_, _| {
            Ok(ChildrenPage::last(vec![
                ContentBlock::ChildPage {
                    id: "a".into(),
                    title: "A".into(),
                },
                ContentBlock::Divider,
                ContentBlock::LinkToPage {
                    page_id: Some("b".into()),
                },
            ]))
        });

        let refs = list_child_refs(&api, "root", &CancellationToken::new())
            .await
            .unwrap();
        let ids: Vec<_> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn listing_stops_when_cancelled() {
        let api = MockNotionApi::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = list_all_blocks(&api, "root", &cancel).await.unwrap_err();
        assert!(matches!(err, ExportError::Cancelled));
    }
}
