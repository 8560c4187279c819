use std::cmp::Ordering;
use std::fmt;
use std::ops::{Index, Not};
use std::str::FromStr;

use crate::engine::{self, Comparison, Kind, SEPARATOR, Side, WILDCARD};
use crate::error::{PermissionError, Result};
use crate::node::PermissionNode;
use crate::permission::Permission;

/// A wildcard permission such as `chat.*` that covers every node and
/// narrower group beneath its prefix.
///
/// Coverage is sign-aware: a positive group says nothing about negated
/// permissions and vice versa.
///
/// # Example
///
/// ```
/// use permnode::{PermissionGroup, PermissionNode};
///
/// let group = PermissionGroup::new("chat.*").unwrap();
/// assert!(group.includes_node(&PermissionNode::new("chat.kick").unwrap()));
/// assert!(!group.includes_node(&PermissionNode::new("-chat.kick").unwrap()));
/// assert!(group.includes_group(&PermissionGroup::new("chat.mod.*").unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionGroup {
    /// Sign-stripped text, including the trailing `.*`.
    permission: String,
    negated: bool,
}

impl PermissionGroup {
    /// Parses a group, failing with [`PermissionError::InvalidPermission`] if
    /// `text` is not a valid wildcard group.
    pub fn new(text: &str) -> Result<Self> {
        if !engine::valid(text, Some(Kind::Group)) {
            return Err(PermissionError::invalid(text));
        }
        let (negated, body) = engine::strip_sign(text);
        Ok(Self {
            permission: body.to_lowercase(),
            negated,
        })
    }

    /// Builds a group from segments that already end in `*`.
    pub(crate) fn from_segments(segments: &[&str], negated: bool) -> Self {
        Self {
            permission: segments.join("."),
            negated,
        }
    }

    /// Returns the sign-stripped text, including the trailing `.*`.
    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Iterates over every segment, the trailing `*` included.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.permission.split(SEPARATOR)
    }

    /// The concrete segments, without the trailing `*`.
    pub fn prefix(&self) -> impl Iterator<Item = &str> {
        self.segments().filter(|segment| *segment != WILDCARD)
    }

    /// Returns the segment at `index`, if any.
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments().nth(index)
    }

    /// Number of segments, the trailing `*` included.
    pub fn len(&self) -> usize {
        self.segments().count()
    }

    /// A group is never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the last concrete segment (the one before `*`).
    pub fn last(&self) -> &str {
        self.prefix().last().unwrap_or_default()
    }

    /// Returns a copy with the sign set to `negated`.
    pub fn negated(&self, negated: bool) -> Self {
        Self {
            permission: self.permission.clone(),
            negated,
        }
    }

    /// Sets the sign in place.
    pub fn negate(&mut self, negated: bool) {
        self.negated = negated;
    }

    /// Returns a copy with the opposite sign.
    pub fn inverted(&self) -> Self {
        self.negated(!self.negated)
    }

    /// Flips the sign in place.
    pub fn invert(&mut self) {
        self.negated = !self.negated;
    }

    /// Drops the last `depth` concrete segments, keeping the wildcard and sign.
    ///
    /// Fails with [`PermissionError::DepthOutOfBounds`] unless `depth` is
    /// non-zero and leaves at least one concrete segment.
    ///
    /// ```
    /// use permnode::PermissionGroup;
    ///
    /// let group = PermissionGroup::new("a.b.c.*").unwrap();
    /// assert_eq!(group.broaden(1).unwrap().to_string(), "a.b.*");
    /// assert_eq!(group.broaden(2).unwrap().to_string(), "a.*");
    /// assert!(group.broaden(3).is_err());
    /// ```
    pub fn broaden(&self, depth: usize) -> Result<PermissionGroup> {
        let concrete: Vec<&str> = self.prefix().collect();
        if depth == 0 || depth >= concrete.len() {
            return Err(PermissionError::DepthOutOfBounds {
                depth,
                len: concrete.len(),
            });
        }
        let mut kept = concrete[..concrete.len() - depth].to_vec();
        kept.push(WILDCARD);
        Ok(PermissionGroup::from_segments(&kept, self.negated))
    }

    /// Returns `true` if this group includes `node` (same sign, strictly
    /// beneath the prefix).
    pub fn includes_node(&self, node: &PermissionNode) -> bool {
        self.negated == node.is_negated()
            && engine::body_includes(node.permission(), &self.permission)
    }

    /// Returns `true` if this group is strictly broader than `other` and
    /// shares its sign.
    pub fn includes_group(&self, other: &PermissionGroup) -> bool {
        self.negated == other.negated
            && engine::body_compare_groups(&self.permission, &other.permission)
                == Comparison::Covers(Side::Left)
    }

    /// Returns `true` if this group includes `candidate`.
    pub fn includes(&self, candidate: &Permission) -> bool {
        match candidate {
            Permission::Node(node) => self.includes_node(node),
            Permission::Group(group) => self.includes_group(group),
        }
    }

    /// Like [`includes`](Self::includes), but also true for an identical group.
    pub fn covers(&self, candidate: &Permission) -> bool {
        match candidate {
            Permission::Group(group) if group == self => true,
            _ => self.includes(candidate),
        }
    }

    /// Sign-aware comparison against another group.
    pub fn compare(&self, other: &PermissionGroup) -> Comparison {
        if self.negated != other.negated {
            return Comparison::Disjoint;
        }
        engine::body_compare_groups(&self.permission, &other.permission)
    }
}

impl PartialOrd for PermissionGroup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lexicographic on the sign-stripped text; on equal text the negated group
/// sorts first.
impl Ord for PermissionGroup {
    fn cmp(&self, other: &Self) -> Ordering {
        self.permission
            .cmp(&other.permission)
            .then_with(|| other.negated.cmp(&self.negated))
    }
}

impl Not for PermissionGroup {
    type Output = PermissionGroup;

    fn not(mut self) -> Self::Output {
        self.invert();
        self
    }
}

impl Index<usize> for PermissionGroup {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        match self.segment(index) {
            Some(segment) => segment,
            None => panic!(
                "segment index {index} out of range for {} segment(s)",
                self.len()
            ),
        }
    }
}

impl FromStr for PermissionGroup {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for PermissionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "-{}", self.permission)
        } else {
            f.write_str(&self.permission)
        }
    }
}

#[cfg(test)]
pub(crate) fn group(text: &str) -> PermissionGroup {
    PermissionGroup::new(text).unwrap()
}
