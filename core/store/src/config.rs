//! Tree configuration pinned at session construction.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;

use passdeck_common::EntryPath;

/// How children of a directory are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildOrdering {
    /// Lexicographic by name, directories and entries mixed.
    #[default]
    Interleaved,
    /// Directories first, then entries, each group lexicographic.
    DirectoriesFirst,
}

/// Whether names that differ only in case denote the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    /// The behaviour of the host's default filesystem.
    pub fn host_default() -> Self {
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            CaseSensitivity::Insensitive
        } else {
            CaseSensitivity::Sensitive
        }
    }
}

impl Default for CaseSensitivity {
    fn default() -> Self {
        Self::host_default()
    }
}

/// Ordering and comparison rules for a store tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeOptions {
    #[serde(default)]
    pub ordering: ChildOrdering,
    #[serde(default)]
    pub case_sensitivity: CaseSensitivity,
}

impl TreeOptions {
    /// Create options with explicit rules.
    pub fn new(ordering: ChildOrdering, case_sensitivity: CaseSensitivity) -> Self {
        Self {
            ordering,
            case_sensitivity,
        }
    }

    /// Fold a single name for comparison.
    pub fn fold<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self.case_sensitivity {
            CaseSensitivity::Sensitive => Cow::Borrowed(name),
            CaseSensitivity::Insensitive => Cow::Owned(name.to_lowercase()),
        }
    }

    /// Lookup key of a path under these rules.
    pub fn key(&self, path: &EntryPath) -> String {
        self.fold(&path.as_normalized()).into_owned()
    }

    /// True if two names denote the same node.
    pub fn same_name(&self, a: &str, b: &str) -> bool {
        self.fold(a) == self.fold(b)
    }

    /// Order two sibling nodes.
    pub fn compare(&self, a: (&str, bool), b: (&str, bool)) -> Ordering {
        let (a_name, a_is_dir) = a;
        let (b_name, b_is_dir) = b;

        let group = match self.ordering {
            ChildOrdering::Interleaved => Ordering::Equal,
            ChildOrdering::DirectoriesFirst => b_is_dir.cmp(&a_is_dir),
        };

        group
            .then_with(|| self.fold(a_name).cmp(&self.fold(b_name)))
            .then_with(|| a_name.cmp(b_name))
    }
}
