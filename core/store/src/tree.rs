//! In-memory index of the password store hierarchy.
//!
//! The tree is derived entirely from a backend listing and is never patched
//! in place: every change to the store is followed by a full `rebuild`, so
//! edits made outside this process (a `git pull`, another `pass` client)
//! can never leave it out of step with the store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::slice;

use crate::config::TreeOptions;
use passdeck_common::{EntryPath, Error, Result};

/// Type of tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Directory,
    Leaf,
}

/// A node in the store tree.
///
/// Leaves stand for exactly one encrypted entry and never hold its content.
#[derive(Debug, Clone)]
pub struct StoreNode {
    name: String,
    path: EntryPath,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Directory(Vec<StoreNode>),
    Leaf,
}

impl StoreNode {
    /// Node name (last path component, empty for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the node.
    pub fn path(&self) -> &EntryPath {
        &self.path
    }

    /// Node type.
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Directory(_) => NodeType::Directory,
            NodeKind::Leaf => NodeType::Leaf,
        }
    }

    /// Check if this is an entry.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }

    /// Ordered children; empty for leaves.
    pub fn children(&self) -> &[StoreNode] {
        match &self.kind {
            NodeKind::Directory(children) => children,
            NodeKind::Leaf => &[],
        }
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntry {
    pub name: String,
    pub is_leaf: bool,
}

/// Intermediate directory used while assembling a tree.
#[derive(Default)]
struct Draft {
    dirs: BTreeMap<String, Draft>,
    leaves: Vec<String>,
}

impl Draft {
    fn insert(&mut self, components: &[String]) {
        match components {
            [] => {}
            [leaf] => self.leaves.push(leaf.clone()),
            [dir, rest @ ..] => self.dirs.entry(dir.clone()).or_default().insert(rest),
        }
    }

    fn into_node(self, name: String, path: EntryPath, options: &TreeOptions) -> Result<StoreNode> {
        let mut children = Vec::with_capacity(self.dirs.len() + self.leaves.len());
        for (dir_name, draft) in self.dirs {
            let child_path = path.join(&dir_name)?;
            children.push(draft.into_node(dir_name, child_path, options)?);
        }
        for leaf in self.leaves {
            let child_path = path.join(&leaf)?;
            children.push(StoreNode {
                name: leaf,
                path: child_path,
                kind: NodeKind::Leaf,
            });
        }
        children.sort_by(|a, b| {
            options.compare((&a.name, a.is_directory()), (&b.name, b.is_directory()))
        });

        Ok(StoreNode {
            name,
            path,
            kind: NodeKind::Directory(children),
        })
    }
}

/// Addressable view of every entry and directory in the store.
#[derive(Debug, Clone)]
pub struct StoreTree {
    /// Root directory.
    root: StoreNode,
    /// Folded path -> node type, mirroring `root` exactly.
    index: HashMap<String, NodeType>,
    leaf_count: usize,
    options: TreeOptions,
}

impl StoreTree {
    /// Create an empty tree.
    pub fn new(options: TreeOptions) -> Self {
        Self {
            root: StoreNode {
                name: String::new(),
                path: EntryPath::root(),
                kind: NodeKind::Directory(Vec::new()),
            },
            index: HashMap::new(),
            leaf_count: 0,
            options,
        }
    }

    /// Build a tree from a listing.
    pub fn from_listing(
        listing: impl IntoIterator<Item = EntryPath>,
        options: TreeOptions,
    ) -> Result<Self> {
        let mut tree = Self::new(options);
        tree.rebuild(listing)?;
        Ok(tree)
    }

    /// Replace the whole tree with one derived from `listing`.
    ///
    /// All-or-nothing: on error the previous tree is left untouched.
    ///
    /// # Errors
    /// - `MalformedPath` if an entry is the root, an entry is also the
    ///   ancestor of another entry, or two paths collide under case folding
    pub fn rebuild(&mut self, listing: impl IntoIterator<Item = EntryPath>) -> Result<()> {
        let options = self.options;
        let mut index: HashMap<String, (NodeType, EntryPath)> = HashMap::new();
        let mut draft = Draft::default();
        let mut leaf_count = 0;

        for path in listing {
            if path.is_root() {
                return Err(Error::MalformedPath(
                    "the store root cannot be an entry".to_string(),
                ));
            }

            let key = options.key(&path);
            match index.get(&key) {
                Some((NodeType::Leaf, existing)) if *existing == path => continue,
                Some((NodeType::Leaf, existing)) => {
                    return Err(Error::MalformedPath(format!(
                        "'{}' collides with '{}'",
                        path, existing
                    )));
                }
                Some((NodeType::Directory, _)) => {
                    return Err(Error::MalformedPath(format!(
                        "'{}' is listed as an entry but also contains entries",
                        path
                    )));
                }
                None => {}
            }

            for ancestor in path.ancestors().into_iter().skip(1) {
                let ancestor_key = options.key(&ancestor);
                match index.get(&ancestor_key) {
                    Some((NodeType::Leaf, _)) => {
                        return Err(Error::MalformedPath(format!(
                            "'{}' is listed as an entry but also contains entries",
                            ancestor
                        )));
                    }
                    Some((NodeType::Directory, existing)) if *existing != ancestor => {
                        return Err(Error::MalformedPath(format!(
                            "'{}' collides with '{}'",
                            ancestor, existing
                        )));
                    }
                    Some((NodeType::Directory, _)) => {}
                    None => {
                        index.insert(ancestor_key, (NodeType::Directory, ancestor));
                    }
                }
            }

            draft.insert(path.components());
            index.insert(key, (NodeType::Leaf, path));
            leaf_count += 1;
        }

        let root = draft.into_node(String::new(), EntryPath::root(), &options)?;

        self.root = root;
        self.index = index
            .into_iter()
            .map(|(key, (node_type, _))| (key, node_type))
            .collect();
        self.leaf_count = leaf_count;
        Ok(())
    }

    /// Rebuild from raw path strings.
    ///
    /// # Errors
    /// - `MalformedPath` if any string is not a valid entry path
    pub fn rebuild_from_strs<S: AsRef<str>>(&mut self, listing: &[S]) -> Result<()> {
        let paths = listing
            .iter()
            .map(|raw| EntryPath::parse(raw.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.rebuild(paths)
    }

    /// Options the tree was built with.
    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Get the root node.
    pub fn root(&self) -> &StoreNode {
        &self.root
    }

    /// Navigate to a node by path.
    pub fn resolve(&self, path: &EntryPath) -> Result<&StoreNode> {
        if path.is_root() {
            return Ok(&self.root);
        }
        if !self.index.contains_key(&self.options.key(path)) {
            return Err(Error::NotFound(path.to_string()));
        }

        let mut current = &self.root;
        for component in path.components() {
            current = current
                .children()
                .iter()
                .find(|child| self.options.same_name(&child.name, component))
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
        }
        Ok(current)
    }

    /// Immediate children of a directory, in tree order.
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `NotADirectory` if the path is an entry
    pub fn children_of(&self, path: &EntryPath) -> Result<Vec<ChildEntry>> {
        let node = self.resolve(path)?;
        if node.is_leaf() {
            return Err(Error::NotADirectory(path.to_string()));
        }

        Ok(node
            .children()
            .iter()
            .map(|child| ChildEntry {
                name: child.name.clone(),
                is_leaf: child.is_leaf(),
            })
            .collect())
    }

    /// Check if a path exists (the root always does).
    pub fn contains(&self, path: &EntryPath) -> bool {
        path.is_root() || self.index.contains_key(&self.options.key(path))
    }

    /// Check if a path is an entry.
    pub fn is_leaf(&self, path: &EntryPath) -> bool {
        self.index.get(&self.options.key(path)) == Some(&NodeType::Leaf)
    }

    /// First ancestor of `path` that is an entry, if any.
    pub fn leaf_ancestor(&self, path: &EntryPath) -> Option<EntryPath> {
        path.ancestors()
            .into_iter()
            .find(|ancestor| self.is_leaf(ancestor))
    }

    /// Every entry, depth first in tree order.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![self.root.children().iter()],
        }
    }

    /// Number of entries.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Check if the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }
}

/// Depth-first iterator over the entries of a tree.
pub struct Leaves<'a> {
    stack: Vec<slice::Iter<'a, StoreNode>>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a StoreNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = self.stack.last_mut()?.next();
            match next {
                Some(node) if node.is_leaf() => return Some(node),
                Some(node) => self.stack.push(node.children().iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaseSensitivity, ChildOrdering};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn path(s: &str) -> EntryPath {
        EntryPath::parse(s).unwrap()
    }

    fn sensitive() -> TreeOptions {
        TreeOptions::new(ChildOrdering::Interleaved, CaseSensitivity::Sensitive)
    }

    fn tree(paths: &[&str]) -> StoreTree {
        let mut tree = StoreTree::new(sensitive());
        tree.rebuild_from_strs(paths).unwrap();
        tree
    }

    #[test]
    fn test_empty_tree() {
        let tree = StoreTree::new(sensitive());
        assert!(tree.root().is_directory());
        assert!(tree.is_empty());
        assert!(tree.contains(&EntryPath::root()));
        assert!(tree.children_of(&EntryPath::root()).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_and_children() {
        let tree = tree(&["mail/gmail/personal", "mail/other/work", "bank"]);

        let children = tree.children_of(&path("mail")).unwrap();
        assert_eq!(
            children,
            vec![
                ChildEntry { name: "gmail".into(), is_leaf: false },
                ChildEntry { name: "other".into(), is_leaf: false },
            ]
        );

        let leaf = tree.resolve(&path("mail/gmail/personal")).unwrap();
        assert!(leaf.is_leaf());
        assert_eq!(leaf.name(), "personal");
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn test_children_of_leaf_is_not_a_directory() {
        let tree = tree(&["bank"]);
        let err = tree.children_of(&path("bank")).unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));
    }

    #[test]
    fn test_resolve_missing() {
        let tree = tree(&["bank"]);
        assert!(matches!(tree.resolve(&path("nope")), Err(Error::NotFound(_))));
        assert!(!tree.contains(&path("bank/nope")));
    }

    #[test]
    fn test_interleaved_order() {
        let tree = tree(&["b/x", "a", "c"]);
        let names: Vec<String> = tree
            .children_of(&EntryPath::root())
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_directories_first_order() {
        let options = TreeOptions::new(ChildOrdering::DirectoriesFirst, CaseSensitivity::Sensitive);
        let tree = StoreTree::from_listing(
            vec![path("a"), path("b/x"), path("c")],
            options,
        )
        .unwrap();

        let names: Vec<String> = tree
            .children_of(&EntryPath::root())
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_leaf_that_is_also_directory_is_malformed() {
        let mut tree = tree(&["keep"]);
        let err = tree.rebuild_from_strs(&["web", "web/github"]).unwrap_err();
        assert!(matches!(err, Error::MalformedPath(_)));

        let err = tree.rebuild_from_strs(&["web/github", "web"]).unwrap_err();
        assert!(matches!(err, Error::MalformedPath(_)));
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_tree() {
        let mut tree = tree(&["keep/me"]);
        let err = tree.rebuild_from_strs(&["fine", "bad/../path"]).unwrap_err();

        assert!(matches!(err, Error::MalformedPath(_)));
        assert!(tree.contains(&path("keep/me")));
        assert!(!tree.contains(&path("fine")));
    }

    #[test]
    fn test_case_insensitive_lookup_and_collision() {
        let options = TreeOptions::new(ChildOrdering::Interleaved, CaseSensitivity::Insensitive);
        let tree = StoreTree::from_listing(vec![path("Web/GitHub")], options).unwrap();
        assert!(tree.contains(&path("web/github")));
        assert_eq!(tree.resolve(&path("WEB/github")).unwrap().name(), "GitHub");

        let err = StoreTree::from_listing(vec![path("Web/a"), path("web/b")], options).unwrap_err();
        assert!(matches!(err, Error::MalformedPath(_)));
    }

    #[test]
    fn test_duplicate_listing_is_collapsed() {
        let tree = tree(&["a/b", "a/b"]);
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.children_of(&path("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_root_entry_is_malformed() {
        let mut tree = StoreTree::new(sensitive());
        let err = tree.rebuild(vec![EntryPath::root()]).unwrap_err();
        assert!(matches!(err, Error::MalformedPath(_)));
    }

    #[test]
    fn test_leaves_in_tree_order() {
        let tree = tree(&["z", "m/b", "m/a", "a"]);
        let leaves: Vec<String> = tree.leaves().map(|n| n.path().as_normalized()).collect();
        assert_eq!(leaves, vec!["a", "m/a", "m/b", "z"]);
    }

    #[test]
    fn test_leaf_ancestor() {
        let tree = tree(&["web"]);
        assert_eq!(tree.leaf_ancestor(&path("web/github")), Some(path("web")));
        assert_eq!(tree.leaf_ancestor(&path("mail/x")), None);
    }

    fn listing_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
        prop::collection::vec(
            prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 1..4)
                .prop_map(|segs| segs.into_iter().map(String::from).collect::<Vec<_>>()),
            0..12,
        )
    }

    proptest! {
        #[test]
        fn prop_children_match_listing(raw in listing_strategy()) {
            // Drop entries that would shadow another entry's directory.
            let mut listing: Vec<EntryPath> = Vec::new();
            for comps in raw {
                let candidate = EntryPath::from_components(comps).unwrap();
                let conflicts = listing.iter().any(|p| {
                    p == &candidate || p.is_ancestor_of(&candidate) || candidate.is_ancestor_of(p)
                });
                if !conflicts {
                    listing.push(candidate);
                }
            }

            let tree = StoreTree::from_listing(listing.clone(), sensitive()).unwrap();

            let mut dirs: BTreeSet<EntryPath> = BTreeSet::new();
            dirs.insert(EntryPath::root());
            for p in &listing {
                dirs.extend(p.ancestors());
            }

            for dir in dirs {
                let mut expected: BTreeSet<(String, bool)> = BTreeSet::new();
                for p in &listing {
                    if p.parent().as_ref() == Some(&dir) {
                        expected.insert((p.name().unwrap().to_string(), true));
                    }
                    if dir.is_ancestor_of(p) && p.depth() > dir.depth() + 1 {
                        expected.insert((p.components()[dir.depth()].clone(), false));
                    }
                }

                let children = tree.children_of(&dir).unwrap();
                let actual: BTreeSet<(String, bool)> =
                    children.iter().map(|c| (c.name.clone(), c.is_leaf)).collect();
                prop_assert_eq!(children.len(), actual.len());
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
