//! Validation and comparison primitives shared by every permission kind.
//!
//! Everything here works on raw permission text. The typed wrappers
//! ([`PermissionNode`](crate::PermissionNode),
//! [`PermissionGroup`](crate::PermissionGroup)) call into the same
//! segment-level helpers after parsing, so text and typed comparisons always
//! agree.
//!
//! # Example
//!
//! ```
//! use permnode::engine::{self, Comparison, Kind, Side};
//!
//! assert!(engine::valid("a.b.c", Some(Kind::Node)));
//! assert!(engine::valid("a.b.*", Some(Kind::Group)));
//! assert!(!engine::valid("1a.b.*", None));
//!
//! assert_eq!(engine::includes("a.b.c.d", "a.b.*"), Ok(true));
//! assert_eq!(
//!     engine::compare("a.b.*", "a.*"),
//!     Ok(Comparison::Covers(Side::Right)),
//! );
//! ```

use crate::error::{PermissionError, Result};
use crate::group::PermissionGroup;
use crate::node::PermissionNode;
use crate::permission::Permission;

pub(crate) const SEPARATOR: char = '.';
pub(crate) const WILDCARD: &str = "*";
pub(crate) const NEGATION: char = '-';
const GROUP_SUFFIX: &str = ".*";

/// The two syntactic kinds of permission text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A concrete leaf such as `a.b.c`.
    Node,
    /// A wildcard group such as `a.b.*`.
    Group,
}

/// Which operand of a comparison is the broader one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// The relation between two permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Neither covers the other.
    Disjoint,
    /// Same kind, same text, same sign.
    Equal,
    /// The operand on the given side strictly covers the other.
    Covers(Side),
}

impl Comparison {
    /// Returns `true` if the left operand equals or covers the right one.
    pub fn left_covers_or_equals(self) -> bool {
        matches!(self, Comparison::Equal | Comparison::Covers(Side::Left))
    }
}

/// Splits an optional leading `-` off `text`.
pub(crate) fn strip_sign(text: &str) -> (bool, &str) {
    match text.strip_prefix(NEGATION) {
        Some(rest) => (true, rest),
        None => (false, text),
    }
}

/// Shape rules common to both kinds, applied to sign-stripped text.
fn well_formed(body: &str) -> bool {
    body.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && body.contains(SEPARATOR)
        && !body.contains("..")
        && !body.ends_with(SEPARATOR)
}

fn valid_node_body(body: &str) -> bool {
    well_formed(body) && body.split(SEPARATOR).all(|segment| segment != WILDCARD)
}

fn valid_group_body(body: &str) -> bool {
    match body.strip_suffix(GROUP_SUFFIX) {
        Some(prefix) => {
            well_formed(body) && prefix.split(SEPARATOR).all(|segment| segment != WILDCARD)
        }
        None => false,
    }
}

/// Classifies `text`, returning `None` if it is valid under neither kind.
pub fn kind_of(text: &str) -> Option<Kind> {
    let (_, body) = strip_sign(text);
    if valid_group_body(body) {
        Some(Kind::Group)
    } else if valid_node_body(body) {
        Some(Kind::Node)
    } else {
        None
    }
}

/// Checks `text` against the rules for `kind`, or against either kind when
/// `kind` is `None`.
///
/// A single leading `-` is ignored.
pub fn valid(text: &str, kind: Option<Kind>) -> bool {
    let (_, body) = strip_sign(text);
    match kind {
        Some(Kind::Node) => valid_node_body(body),
        Some(Kind::Group) => valid_group_body(body),
        None => valid_node_body(body) || valid_group_body(body),
    }
}

/// Returns whether `text` is a negated permission.
///
/// Fails with [`PermissionError::InvalidPermission`] if `text` is valid under
/// neither kind.
pub fn is_negated(text: &str) -> Result<bool> {
    if !valid(text, None) {
        return Err(PermissionError::invalid(text));
    }
    Ok(text.starts_with(NEGATION))
}

/// Checks whether the leaf `leaf_text` falls under the group `group_text`.
///
/// Signs are part of the comparison: `-a.b.c` is included in `-a.*` but not in
/// `a.*`. A group never includes the leaf that spells its own prefix
/// (`a.b` is not in `a.b.*`).
pub fn includes(leaf_text: &str, group_text: &str) -> Result<bool> {
    if !valid(leaf_text, Some(Kind::Node)) || !valid(group_text, Some(Kind::Group)) {
        return Err(PermissionError::InvalidComparison {
            left: leaf_text.to_string(),
            right: group_text.to_string(),
        });
    }
    let (leaf_negated, leaf) = strip_sign(leaf_text);
    let (group_negated, group) = strip_sign(group_text);
    if leaf_negated != group_negated {
        return Ok(false);
    }
    Ok(body_includes(&leaf.to_lowercase(), &group.to_lowercase()))
}

/// Compares two permission strings of either kind.
///
/// Fails with [`PermissionError::InvalidComparison`] if either operand is
/// invalid. Operands of opposite sign are always [`Comparison::Disjoint`].
pub fn compare(left: &str, right: &str) -> Result<Comparison> {
    let (Some(left_kind), Some(right_kind)) = (kind_of(left), kind_of(right)) else {
        return Err(PermissionError::InvalidComparison {
            left: left.to_string(),
            right: right.to_string(),
        });
    };
    let (left_negated, left_body) = strip_sign(left);
    let (right_negated, right_body) = strip_sign(right);
    if left_negated != right_negated {
        return Ok(Comparison::Disjoint);
    }
    Ok(compare_bodies(
        &left_body.to_lowercase(),
        left_kind,
        &right_body.to_lowercase(),
        right_kind,
    ))
}

/// Parses `text` into a node or a group, depending on its wildcard suffix.
///
/// # Example
///
/// ```
/// use permnode::{engine, Permission};
///
/// assert!(matches!(engine::create("a.b.*"), Ok(Permission::Group(_))));
/// assert!(matches!(engine::create("-A.B"), Ok(Permission::Node(_))));
/// assert!(engine::create("not.valid.").is_err());
/// ```
pub fn create(text: &str) -> Result<Permission> {
    match kind_of(text) {
        Some(Kind::Group) => PermissionGroup::new(text).map(Permission::Group),
        Some(Kind::Node) => PermissionNode::new(text).map(Permission::Node),
        None => Err(PermissionError::invalid(text)),
    }
}

/// Segment walk behind [`includes`], on sign-stripped lowercase text.
pub(crate) fn body_includes(leaf: &str, group: &str) -> bool {
    let Some(prefix) = group.strip_suffix(GROUP_SUFFIX) else {
        return false;
    };
    if leaf == prefix {
        return false;
    }

    let mut group_segments = group.split(SEPARATOR).peekable();
    for segment in leaf.split(SEPARATOR) {
        let Some(group_segment) = group_segments.next() else {
            return false;
        };
        if group_segment != segment {
            return false;
        }
        if group_segments.peek() == Some(&WILDCARD) {
            return true;
        }
    }
    false
}

/// Group-versus-group walk: the first operand to reach `*` is the broader one.
pub(crate) fn body_compare_groups(left: &str, right: &str) -> Comparison {
    if left == right {
        return Comparison::Equal;
    }

    let mut left_segments = left.split(SEPARATOR).peekable();
    let mut right_segments = right.split(SEPARATOR).peekable();
    loop {
        let (Some(l), Some(r)) = (left_segments.next(), right_segments.next()) else {
            return Comparison::Disjoint;
        };
        if l != r {
            return Comparison::Disjoint;
        }
        if left_segments.peek() == Some(&WILDCARD) {
            return Comparison::Covers(Side::Left);
        }
        if right_segments.peek() == Some(&WILDCARD) {
            return Comparison::Covers(Side::Right);
        }
    }
}

pub(crate) fn compare_bodies(left: &str, left_kind: Kind, right: &str, right_kind: Kind) -> Comparison {
    match (left_kind, right_kind) {
        (Kind::Node, Kind::Node) => {
            if left == right {
                Comparison::Equal
            } else {
                Comparison::Disjoint
            }
        }
        (Kind::Node, Kind::Group) => {
            if body_includes(left, right) {
                Comparison::Covers(Side::Right)
            } else {
                Comparison::Disjoint
            }
        }
        (Kind::Group, Kind::Node) => {
            if body_includes(right, left) {
                Comparison::Covers(Side::Left)
            } else {
                Comparison::Disjoint
            }
        }
        (Kind::Group, Kind::Group) => body_compare_groups(left, right),
    }
}
