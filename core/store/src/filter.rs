//! Substring filtering over store entries.

use std::collections::BTreeSet;

use crate::tree::{StoreNode, StoreTree};
use passdeck_common::EntryPath;

/// Holds the current search query.
///
/// The index never caches results; every view is evaluated against the
/// tree it is handed, so a rebuilt tree is picked up automatically.
#[derive(Debug, Clone, Default)]
pub struct FilterIndex {
    query: String,
    folded: String,
}

impl FilterIndex {
    /// Create an index with an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current query as typed.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Replace the query and return the matching view of `tree`.
    pub fn set_query<'t>(&mut self, tree: &'t StoreTree, query: &str) -> FilterView<'t> {
        self.query = query.to_string();
        self.folded = query.to_lowercase();
        self.view(tree)
    }

    /// View of `tree` under the current query.
    pub fn view<'t>(&self, tree: &'t StoreTree) -> FilterView<'t> {
        FilterView {
            tree,
            needle: self.folded.clone(),
        }
    }
}

/// Lazy, restartable set of entries matching a query.
#[derive(Debug, Clone)]
pub struct FilterView<'t> {
    tree: &'t StoreTree,
    needle: String,
}

impl<'t> FilterView<'t> {
    /// Iterate matching entries in tree order. May be called repeatedly.
    pub fn iter(&self) -> impl Iterator<Item = &'t StoreNode> + '_ {
        self.tree.leaves().filter(move |node| self.matches_node(node))
    }

    fn matches_node(&self, node: &StoreNode) -> bool {
        self.needle.is_empty()
            || node
                .path()
                .as_normalized()
                .to_lowercase()
                .contains(&self.needle)
    }

    /// Collect the matching paths.
    pub fn matches(&self) -> Vec<EntryPath> {
        self.iter().map(|node| node.path().clone()).collect()
    }

    /// Number of matches.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Check if nothing matches.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Directories that must stay visible to reach every match.
    pub fn visible_directories(&self) -> BTreeSet<EntryPath> {
        let mut dirs = BTreeSet::new();
        for node in self.iter() {
            dirs.extend(node.path().ancestors().into_iter().skip(1));
        }
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeOptions;

    fn tree(paths: &[&str]) -> StoreTree {
        let mut tree = StoreTree::new(TreeOptions::default());
        tree.rebuild_from_strs(paths).unwrap();
        tree
    }

    fn names(paths: Vec<EntryPath>) -> Vec<String> {
        paths.into_iter().map(|p| p.as_normalized()).collect()
    }

    #[test]
    fn test_case_insensitive_substring() {
        let tree = tree(&["Mail/Gmail", "bank/chase", "mail/other"]);
        let mut index = FilterIndex::new();
        let view = index.set_query(&tree, "MAIL");

        let mut matched = names(view.matches());
        matched.sort();
        assert_eq!(matched, vec!["Mail/Gmail", "mail/other"]);
        assert_eq!(index.query(), "MAIL");
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let tree = tree(&["a", "b/c", "d/e/f"]);
        let view = FilterIndex::new().view(&tree);
        assert_eq!(view.count(), tree.leaf_count());
    }

    #[test]
    fn test_view_is_restartable() {
        let tree = tree(&["web/github", "web/gitlab", "bank"]);
        let mut index = FilterIndex::new();
        let view = index.set_query(&tree, "git");

        let first: Vec<_> = view.iter().map(|n| n.path().clone()).collect();
        let second: Vec<_> = view.iter().map(|n| n.path().clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_matches_across_separator() {
        let tree = tree(&["web/github"]);
        let mut index = FilterIndex::new();
        assert_eq!(index.set_query(&tree, "b/gi").count(), 1);
        assert!(index.set_query(&tree, "nothing").is_empty());
    }

    #[test]
    fn test_visible_directories() {
        let tree = tree(&["mail/gmail/personal", "mail/other", "bank"]);
        let mut index = FilterIndex::new();
        let view = index.set_query(&tree, "personal");

        let dirs = names(view.visible_directories().into_iter().collect());
        assert_eq!(dirs, vec!["mail", "mail/gmail"]);
    }

    #[test]
    fn test_query_reevaluated_against_new_tree() {
        let mut index = FilterIndex::new();
        let old = tree(&["github"]);
        assert_eq!(index.set_query(&old, "git").count(), 1);

        let new = tree(&["github", "gitlab"]);
        assert_eq!(index.view(&new).count(), 2);
    }
}
