//! Export a tree of nested Notion pages into one ordered markdown document.
//!
//! The pipeline resolves a page identifier from a URL, walks the page tree to
//! a bounded depth through a rate limited client, renders each page's blocks
//! to markdown and concatenates everything, pre-order, into a single
//! knowledge base file.
//!
//! Remote access goes through the [`contract::NotionApi`] trait, implemented
//! over HTTP by [`client::NotionClient`] and mockable in tests.

pub mod blocks;
pub mod cli;
pub mod client;
pub mod config;
pub mod consolidate;
pub mod contract;
pub mod error;
pub mod export;
pub mod load_config;
pub mod page_id;
pub mod progress;
pub mod render;
pub mod retry;
pub mod tree;

pub use error::{ExportError, Result};
