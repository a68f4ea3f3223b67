//! Canonical method identities.
//!
//! A [`MethodIdentity`] is the full signature string of a method definition,
//! `Return Namespace.Type::Name(Param,Param)`. It keys the pending and completed
//! sets of the traversal, and since those are ordered maps it also fixes the
//! order in which methods are scanned and reported.

use std::{borrow::Borrow, fmt};

/// The canonical, totally ordered name of one method definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodIdentity(String);

impl MethodIdentity {
    /// Wraps an already rendered identity string.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        MethodIdentity(identity.into())
    }

    /// The identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters, used for the separator line of the text report.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MethodIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for MethodIdentity {
    fn from(value: String) -> Self {
        MethodIdentity(value)
    }
}

impl From<&str> for MethodIdentity {
    fn from(value: &str) -> Self {
        MethodIdentity(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn ordering_is_lexicographic() {
        let mut map = BTreeMap::new();
        map.insert(MethodIdentity::from("System.Void Demo.B::Run()"), 2);
        map.insert(MethodIdentity::from("System.Int32 Demo.Z::Run()"), 3);
        map.insert(MethodIdentity::from("System.Void Demo.A::Run()"), 1);

        let order: Vec<i32> = map.values().copied().collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(map.get("System.Void Demo.A::Run()"), Some(&1));
    }

    #[test]
    fn char_len_counts_characters() {
        let identity = MethodIdentity::from("System.Void Ünïcode::Run()");
        assert_eq!(identity.char_len(), 26);
        assert_eq!(identity.to_string(), identity.as_str());
    }
}
