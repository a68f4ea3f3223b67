//! Configuration for the allocation scan.
//!
//! The scan has a single tunable: the list of namespace prefixes whose methods
//! are never traversed. Framework code is usually out of the user's control,
//! so `System` is excluded out of the box.

/// Namespace prefix excluded when no other configuration is given.
pub const DEFAULT_EXCLUDED_NAMESPACE: &str = "System";

/// Configuration for [`crate::Worklist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Namespace prefixes whose methods are pruned from the call graph (default: `["System"]`).
    ///
    /// Matching is a plain string prefix test, so `System` also excludes
    /// `SystemTools` and the global namespace is never excluded by a non-empty
    /// prefix.
    pub excluded_namespaces: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            excluded_namespaces: vec![DEFAULT_EXCLUDED_NAMESPACE.to_string()],
        }
    }
}

impl ScanConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that traverses every namespace.
    #[must_use]
    pub fn no_exclusions() -> Self {
        Self {
            excluded_namespaces: Vec::new(),
        }
    }

    /// Replaces the excluded namespace prefixes.
    #[must_use]
    pub fn with_excluded_namespaces<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_namespaces = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// `true` if methods of types in `namespace` must not be traversed.
    #[must_use]
    pub fn is_excluded(&self, namespace: &str) -> bool {
        self.excluded_namespaces
            .iter()
            .any(|prefix| namespace.starts_with(prefix.as_str()))
    }
}
