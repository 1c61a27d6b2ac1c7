//! In-memory Notion workspace backing `MockNotionApi` in integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use notion_kb_export::blocks::{ContentBlock, InlineRun};
use notion_kb_export::contract::{ChildrenPage, MockNotionApi, PageMetadata};
use notion_kb_export::ExportError;

pub const ROOT_ID: &str = "0123456789abcdef0123456789abcdef";

pub fn root_url() -> String {
    format!("https://www.notion.so/acme/Externship-A-{ROOT_ID}")
}

#[derive(Clone, Default)]
pub struct Workspace {
    pages: HashMap<String, (String, Vec<ContentBlock>)>,
    /// Pages whose metadata exists but whose children listing fails.
    unlistable: Vec<String>,
}

impl Workspace {
    pub fn page(mut self, id: &str, title: &str, blocks: Vec<ContentBlock>) -> Self {
        self.pages
            .insert(id.to_string(), (title.to_string(), blocks));
        self
    }

    pub fn unlistable(mut self, id: &str) -> Self {
        self.unlistable.push(id.to_string());
        self
    }

    /// A mock API serving this workspace, plus the ids of every children
    /// listing call in call order.
    pub fn into_api(self) -> (MockNotionApi, Arc<Mutex<Vec<String>>>) {
        let workspace = Arc::new(self);
        let listed = Arc::new(Mutex::new(Vec::new()));
        let mut api = MockNotionApi::new();

        let ws = workspace.clone();
        api.expect_fetch_page()
            .returning(move |id| match ws.pages.get(id) {
                Some((title, _)) => Ok(PageMetadata::titled(id, title.clone())),
                None => Err(ExportError::NotFound { id: id.to_string() }),
            });

        let ws = workspace.clone();
        let log = listed.clone();
        api.expect_list_children_page()
            .returning(move |id, _cursor| {
                log.lock().unwrap().push(id.to_string());
                if ws.unlistable.iter().any(|u| u == id) {
                    return Err(ExportError::Api {
                        id: id.to_string(),
                        status: 400,
                        code: "validation_error".into(),
                        message: "cannot list".into(),
                    });
                }
                match ws.pages.get(id) {
                    Some((_, blocks)) => Ok(ChildrenPage::last(blocks.clone())),
                    None => Err(ExportError::NotFound { id: id.to_string() }),
                }
            });

        (api, listed)
    }
}

pub fn child(id: &str, title: &str) -> ContentBlock {
    ContentBlock::ChildPage {
        id: id.to_string(),
        title: title.to_string(),
    }
}

pub fn link(id: &str) -> ContentBlock {
    ContentBlock::LinkToPage {
        page_id: Some(id.to_string()),
    }
}

pub fn para(text: &str) -> ContentBlock {
    ContentBlock::Paragraph(vec![InlineRun::plain(text)])
}
