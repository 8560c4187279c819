use std::fmt;
use std::ops::Not;
use std::str::FromStr;

use crate::engine::{self, Comparison, Kind, Side};
use crate::error::{PermissionError, Result};
use crate::group::PermissionGroup;
use crate::node::PermissionNode;

/// A single permission: either a concrete node or a wildcard group.
///
/// This is what [`engine::create`] produces and what a
/// [`PermissionCluster`](crate::PermissionCluster) holds as children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Permission {
    Node(PermissionNode),
    Group(PermissionGroup),
}

impl Permission {
    /// Parses `text` as a node or group.
    pub fn parse(text: &str) -> Result<Self> {
        engine::create(text)
    }

    /// Returns the sign-stripped text.
    pub fn permission(&self) -> &str {
        match self {
            Permission::Node(node) => node.permission(),
            Permission::Group(group) => group.permission(),
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            Permission::Node(node) => node.is_negated(),
            Permission::Group(group) => group.is_negated(),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Permission::Node(_) => Kind::Node,
            Permission::Group(_) => Kind::Group,
        }
    }

    /// Number of segments; a group counts its trailing `*`.
    pub fn len(&self) -> usize {
        match self {
            Permission::Node(node) => node.len(),
            Permission::Group(group) => group.len(),
        }
    }

    /// Never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns a copy with the sign set to `negated`.
    pub fn negated(&self, negated: bool) -> Self {
        match self {
            Permission::Node(node) => Permission::Node(node.negated(negated)),
            Permission::Group(group) => Permission::Group(group.negated(negated)),
        }
    }

    /// Sets the sign in place.
    pub fn negate(&mut self, negated: bool) {
        match self {
            Permission::Node(node) => node.negate(negated),
            Permission::Group(group) => group.negate(negated),
        }
    }

    /// Returns a copy with the opposite sign.
    pub fn inverted(&self) -> Self {
        self.negated(!self.is_negated())
    }

    /// Flips the sign in place.
    pub fn invert(&mut self) {
        match self {
            Permission::Node(node) => node.invert(),
            Permission::Group(group) => group.invert(),
        }
    }

    /// Broadens a node or group by `depth`; see
    /// [`PermissionNode::broaden`] and [`PermissionGroup::broaden`].
    pub fn broaden(&self, depth: usize) -> Result<PermissionGroup> {
        match self {
            Permission::Node(node) => node.broaden(depth),
            Permission::Group(group) => group.broaden(depth),
        }
    }

    /// Sign-aware comparison of two single permissions.
    pub fn compare(&self, other: &Permission) -> Comparison {
        if self.is_negated() != other.is_negated() {
            return Comparison::Disjoint;
        }
        engine::compare_bodies(
            self.permission(),
            self.kind(),
            other.permission(),
            other.kind(),
        )
    }

    /// Returns `true` if this permission equals or covers `other`,
    /// ignoring signs entirely.
    pub(crate) fn covers_unsigned(&self, other: &Permission) -> bool {
        engine::compare_bodies(
            self.permission(),
            self.kind(),
            other.permission(),
            other.kind(),
        )
        .left_covers_or_equals()
    }

    /// Returns `true` if `other` is strictly broader (same sign).
    pub fn is_covered_by(&self, other: &Permission) -> bool {
        matches!(
            other.compare(self),
            Comparison::Covers(Side::Left)
        )
    }
}

impl Not for Permission {
    type Output = Permission;

    fn not(mut self) -> Self::Output {
        self.invert();
        self
    }
}

impl From<PermissionNode> for Permission {
    fn from(node: PermissionNode) -> Self {
        Permission::Node(node)
    }
}

impl From<PermissionGroup> for Permission {
    fn from(group: PermissionGroup) -> Self {
        Permission::Group(group)
    }
}

impl TryFrom<Permission> for PermissionNode {
    type Error = PermissionError;

    fn try_from(permission: Permission) -> Result<Self> {
        match permission {
            Permission::Node(node) => Ok(node),
            Permission::Group(_) => Err(PermissionError::TypeMismatch {
                expected: "node",
                found: "group",
            }),
        }
    }
}

impl TryFrom<Permission> for PermissionGroup {
    type Error = PermissionError;

    fn try_from(permission: Permission) -> Result<Self> {
        match permission {
            Permission::Group(group) => Ok(group),
            Permission::Node(_) => Err(PermissionError::TypeMismatch {
                expected: "group",
                found: "node",
            }),
        }
    }
}

impl FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self> {
        engine::create(s)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Node(node) => node.fmt(f),
            Permission::Group(group) => group.fmt(f),
        }
    }
}

#[cfg(test)]
pub(crate) fn perm(text: &str) -> Permission {
    engine::create(text).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(perm("-A.B").to_string(), "-a.b");
        assert_eq!(perm("a.b.*").to_string(), "a.b.*");
        assert_eq!(perm("a.b.*").kind(), Kind::Group);
        assert!("a".parse::<Permission>().is_err());
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            perm("a.*").compare(&perm("a.b")),
            Comparison::Covers(Side::Left)
        );
        assert_eq!(perm("a.*").compare(&perm("-a.b")), Comparison::Disjoint);
        assert!(perm("a.b").is_covered_by(&perm("a.*")));
        assert!(!perm("a.*").is_covered_by(&perm("a.*")));
    }

    #[test]
    fn test_covers_unsigned() {
        assert!(perm("a.*").covers_unsigned(&perm("-a.b")));
        assert!(perm("a.b").covers_unsigned(&perm("-a.b")));
        assert!(!perm("a.b").covers_unsigned(&perm("a.*")));
    }

    #[test]
    fn test_sign_ops() {
        let p = perm("a.b.*");
        assert!(p.negated(true).is_negated());
        assert_eq!(p.inverted().inverted(), p);
        assert_eq!(!!p.clone(), p);
    }

    #[test]
    fn test_try_from_mismatch() {
        assert!(PermissionNode::try_from(perm("a.b")).is_ok());
        assert_eq!(
            PermissionNode::try_from(perm("a.*")),
            Err(PermissionError::TypeMismatch {
                expected: "node",
                found: "group"
            })
        );
        assert!(PermissionGroup::try_from(perm("a.b")).is_err());
    }

    #[test]
    fn test_broaden_dispatch() {
        assert_eq!(perm("a.b.c").broaden(1).unwrap().to_string(), "a.b.*");
        assert_eq!(perm("a.b.c.*").broaden(1).unwrap().to_string(), "a.b.*");
    }
}
