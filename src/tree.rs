//! Bounded-depth page tree construction.
//!
//! The tree is built depth first, pre-order: a node exists before its
//! children are listed, and children keep the order in which the parent lists
//! them. Three rules keep a single export robust:
//!
//! - a child whose metadata or subtree cannot be fetched is skipped and
//!   reported as a [`ChildFailure`]; its siblings are still built,
//! - a node at `max_depth` is returned without listing its children,
//! - an identifier already present in the tree, or on the path being built,
//!   is never fetched again, which breaks cycles through page links. A page
//!   that failed is forgotten, so a later link to it gets a fresh attempt.
//!
//! Failing to list the children of the root itself is fatal, since nothing
//! useful can be exported from it.

use std::collections::HashSet;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::blocks::ChildRef;
use crate::config::MAX_DEPTH_LIMIT;
use crate::contract::{list_child_refs, NotionApi};
use crate::error::{ExportError, Result};
use crate::progress::{ProgressReporter, TracingProgress};

/// One page in the exported hierarchy.
///
/// Level 0 is the root (externship), 1 a project, 2 a step, 3 a sub-step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageNode {
    pub id: String,
    pub title: String,
    pub level: usize,
    pub children: Vec<PageNode>,
}

impl PageNode {
    pub fn new(id: impl Into<String>, title: impl Into<String>, level: usize) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            level,
            children: Vec::new(),
        }
    }

    /// Number of pages in this subtree, this node included.
    pub fn count_pages(&self) -> usize {
        1 + self.children.iter().map(PageNode::count_pages).sum::<usize>()
    }

    /// Deepest level present in this subtree.
    pub fn max_level(&self) -> usize {
        self.children
            .iter()
            .map(PageNode::max_level)
            .max()
            .unwrap_or(self.level)
    }

    /// Nodes in depth-first pre-order: each node before its children,
    /// siblings in order.
    pub fn pre_order(&self) -> Vec<&PageNode> {
        let mut out = Vec::with_capacity(self.count_pages());
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// A child page that could not be added to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildFailure {
    pub parent_id: String,
    pub page_id: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub root: PageNode,
    pub warnings: Vec<ChildFailure>,
}

#[derive(Default)]
struct BuildState {
    visited: HashSet<String>,
    warnings: Vec<ChildFailure>,
}

pub struct TreeBuilder<'a, A: ?Sized> {
    api: &'a A,
    max_depth: usize,
    cancel: CancellationToken,
    progress: &'a dyn ProgressReporter,
}

impl<'a, A> TreeBuilder<'a, A>
where
    A: NotionApi + ?Sized,
{
    pub fn new(api: &'a A, max_depth: usize) -> Self {
        Self {
            api,
            max_depth: max_depth.min(MAX_DEPTH_LIMIT),
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

    /// Build the tree under `root_id`, whose title the caller already knows.
    pub async fn build(&self, root_id: &str, root_title: &str) -> Result<BuildOutcome> {
        let mut state = BuildState::default();
        state.visited.insert(root_id.to_string());

        let root = self
            .build_node(root_id.to_string(), root_title.to_string(), 0, &mut state)
            .await?;

        info!(
            root_id,
            pages = root.count_pages(),
            skipped = state.warnings.len(),
            "Built page tree"
        );
        Ok(BuildOutcome {
            root,
            warnings: state.warnings,
        })
    }

    fn build_node<'s>(
        &'s self,
        id: String,
        title: String,
        level: usize,
        state: &'s mut BuildState,
    ) -> BoxFuture<'s, Result<PageNode>> {
        async move {
            if self.cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            let mut node = PageNode::new(id, title, level);
            if level >= self.max_depth {
                return Ok(node);
            }

            let refs = list_child_refs(self.api, &node.id, &self.cancel).await?;
            debug!(page_id = %node.id, level, children = refs.len(), "Listed child pages");

            for child in refs {
                if !state.visited.insert(child.id.clone()) {
                    self.skip(&node.id, &child.id, "page already exported (duplicate link or cycle)", state);
                    continue;
                }
                match self.build_child(&child, level + 1, state).await {
                    Ok(subtree) => node.children.push(subtree),
                    Err(ExportError::Cancelled) => return Err(ExportError::Cancelled),
                    Err(e) => {
                        // Failed pages may still be reachable through a later link.
                        state.visited.remove(&child.id);
                        self.skip(&node.id, &child.id, &e.to_string(), state);
                    }
                }
            }

            Ok(node)
        }
        .boxed()
    }

    async fn build_child(
        &self,
        child: &ChildRef,
        level: usize,
        state: &mut BuildState,
    ) -> Result<PageNode> {
        let metadata = self.api.fetch_page(&child.id).await?;
        self.build_node(child.id.clone(), metadata.title(), level, state)
            .await
    }

    fn skip(&self, parent_id: &str, page_id: &str, reason: &str, state: &mut BuildState) {
        let failure = ChildFailure {
            parent_id: parent_id.to_string(),
            page_id: page_id.to_string(),
            reason: reason.to_string(),
        };
        self.progress.warning(&failure);
        state.warnings.push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, level: usize) -> PageNode {
        PageNode::new(id, id.to_uppercase(), level)
    }

    #[test]
    fn pre_order_visits_parents_before_children() {
        let mut root = leaf("root", 0);
        let mut p1 = leaf("p1", 1);
        p1.children = vec![leaf("s1", 2), leaf("s2", 2)];
        root.children = vec![p1, leaf("p2", 1)];

        let ids: Vec<_> = root.pre_order().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["root", "p1", "s1", "s2", "p2"]);
        assert_eq!(root.count_pages(), 5);
        assert_eq!(root.max_level(), 2);
    }
}
