//! Hierarchical storage keys.

use serde::{Deserialize, Serialize};

/// An ordered sequence of short string components identifying a stored value.
///
/// Keys form a hierarchy by prefix: `["doc-1"]` is a prefix of
/// `["doc-1", "incremental", "0003"]`. Range operations on
/// [`crate::StorageAdapter`] are defined in terms of componentwise prefixes,
/// never substring matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey(Vec<String>);

impl StorageKey {
    /// Build a key from its components.
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// The key's components in order.
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Extend the key with one more component, returning the child key.
    pub fn with_component(&self, component: impl Into<String>) -> Self {
        let mut components = self.0.clone();
        components.push(component.into());
        Self(components)
    }

    /// Whether `prefix` is a componentwise initial subsequence of this key.
    pub fn starts_with(&self, prefix: &StorageKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for StorageKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_components(iter)
    }
}
