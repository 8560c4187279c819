use std::cmp::Ordering;
use std::fmt;
use std::ops::{Index, Not};
use std::str::FromStr;

use crate::engine::{self, Kind, SEPARATOR, WILDCARD};
use crate::error::{PermissionError, Result};
use crate::group::PermissionGroup;

/// A concrete (non-wildcard) permission such as `chat.kick` or `-chat.ban`.
///
/// The text is lowercased on parse. The sign is kept separately from the
/// dotted body, so [`permission`](Self::permission) never carries a `-`
/// while [`Display`](fmt::Display) does.
///
/// # Example
///
/// ```
/// use permnode::PermissionNode;
///
/// let node = PermissionNode::new("Chat.Kick.User").unwrap();
/// assert_eq!(node.permission(), "chat.kick.user");
/// assert_eq!(&node[1], "kick");
/// assert_eq!((!node.clone()).to_string(), "-chat.kick.user");
/// assert_eq!(node.parent().to_string(), "chat.kick.*");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionNode {
    permission: String,
    negated: bool,
}

impl PermissionNode {
    /// Parses a node, failing with [`PermissionError::InvalidPermission`] if
    /// `text` is not a valid leaf.
    pub fn new(text: &str) -> Result<Self> {
        if !engine::valid(text, Some(Kind::Node)) {
            return Err(PermissionError::invalid(text));
        }
        let (negated, body) = engine::strip_sign(text);
        Ok(Self {
            permission: body.to_lowercase(),
            negated,
        })
    }

    /// Returns the sign-stripped dotted text.
    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Iterates over the segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.permission.split(SEPARATOR)
    }

    /// Returns the segment at `index`, if any.
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments().nth(index)
    }

    /// Number of segments; always at least two.
    pub fn len(&self) -> usize {
        self.segments().count()
    }

    /// A node is never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the last segment.
    pub fn last(&self) -> &str {
        self.segments().last().unwrap_or_default()
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

    /// Drops the last `depth` segments and appends `*`, keeping the sign.
    ///
    /// Fails with [`PermissionError::DepthOutOfBounds`] unless
    /// `0 < depth < self.len()`.
    ///
    /// ```
    /// use permnode::PermissionNode;
    ///
    /// let node = PermissionNode::new("-a.b.c.d").unwrap();
    /// assert_eq!(node.broaden(2).unwrap().to_string(), "-a.b.*");
    /// assert!(node.broaden(4).is_err());
    /// ```
    pub fn broaden(&self, depth: usize) -> Result<PermissionGroup> {
        let segments: Vec<&str> = self.segments().collect();
        if depth == 0 || depth >= segments.len() {
            return Err(PermissionError::DepthOutOfBounds {
                depth,
                len: segments.len(),
            });
        }
        let mut kept = segments[..segments.len() - depth].to_vec();
        kept.push(WILDCARD);
        Ok(PermissionGroup::from_segments(&kept, self.negated))
    }

    /// The immediate parent group (`a.b.c` becomes `a.b.*`).
    ///
    /// Equivalent to `broaden(1)`, which cannot fail for a node.
    pub fn parent(&self) -> PermissionGroup {
        let segments: Vec<&str> = self.segments().collect();
        let mut kept = segments[..segments.len() - 1].to_vec();
        kept.push(WILDCARD);
        PermissionGroup::from_segments(&kept, self.negated)
    }

    /// Returns `true` if `group` includes this node (signs must match).
    pub fn is_included_in(&self, group: &PermissionGroup) -> bool {
        group.includes_node(self)
    }
}

impl PartialOrd for PermissionNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lexicographic on the sign-stripped text; on equal text the negated node
/// sorts first.
impl Ord for PermissionNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.permission
            .cmp(&other.permission)
            .then_with(|| other.negated.cmp(&self.negated))
    }
}

impl Not for PermissionNode {
    type Output = PermissionNode;

    fn not(mut self) -> Self::Output {
        self.invert();
        self
    }
}

impl Index<usize> for PermissionNode {
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

impl FromStr for PermissionNode {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for PermissionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "-{}", self.permission)
        } else {
            f.write_str(&self.permission)
        }
    }
}

#[cfg(test)]
pub(crate) fn node(text: &str) -> PermissionNode {
    PermissionNode::new(text).unwrap()
}
