//! Hierarchical trace addresses such as `.0.2(1).1`.

use std::fmt;

/// Dotted path of child indices and attempt markers.
///
/// The root address is empty. A child appends `.<index>`, a retry attempt
/// appends `(<attempt>)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    pub fn root() -> Self {
        Self::default()
    }

    /// Address of the `index`-th child requested by a body (0-based).
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}.{index}", self.0))
    }

    /// Address of retry attempt `attempt` (1-based).
    pub fn attempt(&self, attempt: u32) -> Self {
        Self(format!("{}({attempt})", self.0))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_addresses() {
        let root = Address::root();
        assert!(root.is_root());
        let addr = root.child(0).child(2).attempt(1).child(1);
        assert_eq!(addr.as_str(), ".0.2(1).1");
    }

    #[test]
    fn retried_root_labels_attempts_without_dot() {
        assert_eq!(Address::root().attempt(3).to_string(), "(3)");
    }
}
