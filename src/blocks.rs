//! Content blocks as delivered by the Notion API.
//!
//! Notion tags each block with a `type` string and stores the payload under a
//! key of the same name. We decode that into the closed [`ContentBlock`] sum
//! type once, at the edge, so the renderer can match exhaustively. Kinds we do
//! not know end up in [`ContentBlock::Unsupported`] instead of failing the
//! listing.

use serde::Deserialize;
use serde_json::Value;

/// A span of text with independent formatting annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
}

impl InlineRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }
}

/// Reference to a page nested under another page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub id: String,
    /// Title as listed by the parent, when the listing carries one.
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Paragraph(Vec<InlineRun>),
    /// Heading of level 1 to 3.
    Heading { level: u8, runs: Vec<InlineRun> },
    BulletedItem(Vec<InlineRun>),
    NumberedItem(Vec<InlineRun>),
    ToDo { checked: bool, runs: Vec<InlineRun> },
    Code {
        language: Option<String>,
        runs: Vec<InlineRun>,
    },
    Quote(Vec<InlineRun>),
    Callout(Vec<InlineRun>),
    Divider,
    /// A nested page. The block id is the page id.
    ChildPage { id: String, title: String },
    /// A link to another page. `page_id` is `None` for links to databases etc.
    LinkToPage { page_id: Option<String> },
    Unsupported { kind: String },
}

impl ContentBlock {
    /// The nested page this block points at, if it is a page reference.
    pub fn child_ref(&self) -> Option<ChildRef> {
        match self {
            ContentBlock::ChildPage { id, title } => Some(ChildRef {
                id: id.clone(),
                title: Some(title.clone()),
            }),
            ContentBlock::LinkToPage {
                page_id: Some(page_id),
            } => Some(ChildRef {
                id: page_id.clone(),
                title: None,
            }),
            _ => None,
        }
    }

    /// Decode one block object from the API. Never fails: anything that does
    /// not look like a known kind becomes [`ContentBlock::Unsupported`].
    pub fn from_value(value: &Value) -> ContentBlock {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let payload = value.get(&kind).cloned().unwrap_or(Value::Null);

        match kind.as_str() {
            "paragraph" => ContentBlock::Paragraph(text_payload(payload).runs()),
            "heading_1" | "heading_2" | "heading_3" => {
                let level = kind[kind.len() - 1..].parse().unwrap_or(1);
                ContentBlock::Heading {
                    level,
                    runs: text_payload(payload).runs(),
                }
            }
            "bulleted_list_item" => ContentBlock::BulletedItem(text_payload(payload).runs()),
            "numbered_list_item" => ContentBlock::NumberedItem(text_payload(payload).runs()),
            "to_do" => {
                let p = text_payload(payload);
                ContentBlock::ToDo {
                    checked: p.checked,
                    runs: p.runs(),
                }
            }
            "code" => {
                let p = text_payload(payload);
                ContentBlock::Code {
                    language: p.language.clone().filter(|l| !l.is_empty()),
                    runs: p.runs(),
                }
            }
            "quote" => ContentBlock::Quote(text_payload(payload).runs()),
            "callout" => ContentBlock::Callout(text_payload(payload).runs()),
            "divider" => ContentBlock::Divider,
            "child_page" => {
                let id = value
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let title = payload
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                ContentBlock::ChildPage { id, title }
            }
            "link_to_page" => {
                let page_id = match payload.get("type").and_then(Value::as_str) {
                    Some("page_id") => payload
                        .get("page_id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                };
                ContentBlock::LinkToPage { page_id }
            }
            _ => ContentBlock::Unsupported { kind },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TextPayload {
    #[serde(default)]
    rich_text: Vec<RawRichText>,
    #[serde(default)]
    checked: bool,
    #[serde(default)]
    language: Option<String>,
}

impl TextPayload {
    fn runs(&self) -> Vec<InlineRun> {
        self.rich_text.iter().filter_map(RawRichText::to_run).collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawRichText {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<RawTextContent>,
    #[serde(default)]
    annotations: RawAnnotations,
}

#[derive(Debug, Deserialize)]
struct RawTextContent {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawAnnotations {
    #[serde(default)]
    bold: bool,
    #[serde(default)]
    italic: bool,
    #[serde(default)]
    code: bool,
}

impl RawRichText {
    // Mentions and equations carry no `text` object and are dropped.
    fn to_run(&self) -> Option<InlineRun> {
        if self.kind != "text" {
            return None;
        }
        let text = self.text.as_ref()?;
        Some(InlineRun {
            text: text.content.clone(),
            bold: self.annotations.bold,
            italic: self.annotations.italic,
            code: self.annotations.code,
        })
    }
}

fn text_payload(payload: Value) -> TextPayload {
    serde_json::from_value(payload).unwrap_or_default()
}
