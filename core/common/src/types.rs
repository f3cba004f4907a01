//! Common types used throughout passdeck.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

/// A validated path identifying one entry or directory in the store.
///
/// This is the logical name of an entry (`email/work`), independent of the
/// encrypted file that backs it (`email/work.gpg`). The root path is the
/// empty sequence and only ever addresses the store root directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryPath {
    components: Vec<String>,
}

impl EntryPath {
    /// Create a root path.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a path from string components.
    ///
    /// # Errors
    /// - `MalformedPath` if any component is empty, `.`, `..`, contains a
    ///   path separator or a control character
    pub fn from_components(components: Vec<String>) -> Result<Self> {
        for comp in &components {
            validate_segment(comp)?;
        }
        Ok(Self { components })
    }

    /// Parse a path string into an EntryPath.
    ///
    /// Uses '/' as separator. Leading and trailing separators are ignored,
    /// so `/email/work/` and `email/work` are the same path.
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim_start_matches('/').trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let components: Vec<String> = trimmed.split('/').map(String::from).collect();
        Self::from_components(components).map_err(|e| match e {
            Error::MalformedPath(reason) => Error::MalformedPath(format!("'{}': {}", path, reason)),
            other => other,
        })
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the entry or directory name (last component).
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(|s| s.as_str())
    }

    /// Join this path with a child component.
    pub fn join(&self, child: &str) -> Result<Self> {
        validate_segment(child)?;
        let mut components = self.components.clone();
        components.push(child.to_string());
        Ok(Self { components })
    }

    /// Get the path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Proper ancestors of this path, from the root down to the parent.
    pub fn ancestors(&self) -> Vec<EntryPath> {
        (0..self.components.len())
            .map(|len| Self {
                components: self.components[..len].to_vec(),
            })
            .collect()
    }

    /// True if `self` is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &EntryPath) -> bool {
        self.components.len() < other.components.len()
            && other.components.starts_with(&self.components)
    }

    /// Normalized string form (`a/b/c`, empty for the root).
    pub fn as_normalized(&self) -> String {
        self.components.join("/")
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(Error::MalformedPath(
            "path segment cannot be empty".to_string(),
        ));
    }
    if segment == "." || segment == ".." {
        return Err(Error::MalformedPath(format!(
            "path segment '{}' is not allowed",
            segment
        )));
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(Error::MalformedPath(
            "path segment cannot contain separators".to_string(),
        ));
    }
    if segment.chars().any(char::is_control) {
        return Err(Error::MalformedPath(
            "path segment cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.as_normalized())
        }
    }
}

impl TryFrom<String> for EntryPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EntryPath> for String {
    fn from(path: EntryPath) -> Self {
        path.as_normalized()
    }
}

impl std::str::FromStr for EntryPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Decrypted entry content that zeroizes on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretValue(Vec<u8>);

impl SecretValue {
    /// Wrap plaintext bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the content as UTF-8 text.
    ///
    /// # Errors
    /// - `InvalidInput` if the plaintext is not valid UTF-8
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.0)
            .map_err(|_| Error::InvalidInput("secret is not valid UTF-8".to_string()))
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretValue {}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_entry_path_root() {
        let path = EntryPath::parse("").unwrap();
        assert!(path.is_root());
        assert_eq!(path.as_normalized(), "");
        assert_eq!(path.to_string(), "/");
        assert!(EntryPath::parse("/").unwrap().is_root());
    }

    #[test]
    fn test_entry_path_parse_normalizes() {
        let path = EntryPath::parse("/mail/gmail/personal/").unwrap();
        assert_eq!(path.components(), &["mail", "gmail", "personal"]);
        assert_eq!(path.as_normalized(), "mail/gmail/personal");
        assert_eq!(path, EntryPath::parse("mail/gmail/personal").unwrap());
    }

    #[test]
    fn test_entry_path_rejects_bad_segments() {
        for bad in ["a//b", "a/./b", "a/../b", "..", "a/b\\c", "a/\u{0}b"] {
            let err = EntryPath::parse(bad).unwrap_err();
            assert!(matches!(err, Error::MalformedPath(_)), "{}", bad);
        }
    }

    #[test]
    fn test_entry_path_join_and_parent() {
        let path = EntryPath::root().join("mail").unwrap().join("work").unwrap();
        assert_eq!(path.as_normalized(), "mail/work");
        assert_eq!(path.parent().unwrap().as_normalized(), "mail");
        assert_eq!(path.name(), Some("work"));
        assert!(path.join("..").is_err());
    }

    #[test]
    fn test_entry_path_ancestors() {
        let path = EntryPath::parse("a/b/c").unwrap();
        let ancestors: Vec<String> = path.ancestors().iter().map(|p| p.as_normalized()).collect();
        assert_eq!(ancestors, vec!["", "a", "a/b"]);
        assert!(EntryPath::parse("a").unwrap().is_ancestor_of(&path));
        assert!(!path.is_ancestor_of(&path));
        assert!(!EntryPath::parse("a/bb").unwrap().is_ancestor_of(&path));
    }

    #[test]
    fn test_entry_path_serde_as_string() {
        let path = EntryPath::parse("web/github").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"web/github\"");
        let back: EntryPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<EntryPath>("\"a/../b\"").is_err());
    }

    #[test]
    fn test_secret_value_debug_is_redacted() {
        let secret = SecretValue::from("hunter2");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert_eq!(secret.as_str().unwrap(), "hunter2");
    }

    proptest! {
        #[test]
        fn prop_parse_display_is_stable(
            segments in prop::collection::vec("[a-zA-Z0-9_@+-][a-zA-Z0-9_.@+-]{0,8}", 1..5)
        ) {
            prop_assume!(segments.iter().all(|s| s != "." && s != ".."));
            let joined = segments.join("/");
            let path = EntryPath::parse(&joined).unwrap();
            prop_assert_eq!(path.as_normalized(), joined.clone());
            prop_assert_eq!(EntryPath::parse(&path.to_string()).unwrap(), path);
        }
    }
}
