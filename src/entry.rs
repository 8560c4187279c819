use std::cmp::Ordering;
use std::fmt;
use std::ops::Not;

use crate::cluster::PermissionCluster;
use crate::collection::PermissionCollection;
use crate::engine;
use crate::error::{PermissionError, Result};
use crate::group::PermissionGroup;
use crate::node::PermissionNode;
use crate::permission::Permission;

/// One entry in a [`PermissionCollection`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PermissionEntry {
    Node(PermissionNode),
    Group(PermissionGroup),
    Cluster(PermissionCluster),
}

/// How an entry is classified for sorting. Clusters sort as groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Leaf,
    Group,
}

impl PermissionEntry {
    /// Parses `text` as a node or group entry.
    pub fn parse(text: &str) -> Result<Self> {
        engine::create(text).map(PermissionEntry::from)
    }

    /// The sign-stripped text, or the label for a cluster.
    pub fn permission(&self) -> &str {
        match self {
            PermissionEntry::Node(node) => node.permission(),
            PermissionEntry::Group(group) => group.permission(),
            PermissionEntry::Cluster(cluster) => cluster.label(),
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            PermissionEntry::Node(node) => node.is_negated(),
            PermissionEntry::Group(group) => group.is_negated(),
            PermissionEntry::Cluster(cluster) => cluster.is_negated(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            PermissionEntry::Node(_) => EntryKind::Leaf,
            PermissionEntry::Group(_) | PermissionEntry::Cluster(_) => EntryKind::Group,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, PermissionEntry::Node(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, PermissionEntry::Group(_))
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, PermissionEntry::Cluster(_))
    }

    /// The entry as a single permission, unless it is a cluster.
    pub fn as_permission(&self) -> Option<Permission> {
        match self {
            PermissionEntry::Node(node) => Some(Permission::Node(node.clone())),
            PermissionEntry::Group(group) => Some(Permission::Group(group.clone())),
            PermissionEntry::Cluster(_) => None,
        }
    }

    pub fn negated(&self, negated: bool) -> Self {
        let mut copy = self.clone();
        copy.negate(negated);
        copy
    }

    pub fn negate(&mut self, negated: bool) {
        match self {
            PermissionEntry::Node(node) => node.negate(negated),
            PermissionEntry::Group(group) => group.negate(negated),
            PermissionEntry::Cluster(cluster) => cluster.negate(negated),
        }
    }

    pub fn inverted(&self) -> Self {
        self.negated(!self.is_negated())
    }

    pub fn invert(&mut self) {
        let negated = self.is_negated();
        self.negate(!negated);
    }
}

/// Orders entries for [`PermissionCollection::sorted`].
///
/// Leaves come before groups (clusters count as groups); within a kind,
/// negated entries come first; otherwise entries compare by their
/// sign-stripped text.
pub fn entry_order(a: &PermissionEntry, b: &PermissionEntry) -> Ordering {
    let rank = |entry: &PermissionEntry| (entry.kind() == EntryKind::Group, !entry.is_negated());
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.permission().cmp(b.permission()))
}

impl Not for PermissionEntry {
    type Output = PermissionEntry;

    fn not(mut self) -> Self::Output {
        self.invert();
        self
    }
}

impl fmt::Display for PermissionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionEntry::Node(node) => node.fmt(f),
            PermissionEntry::Group(group) => group.fmt(f),
            PermissionEntry::Cluster(cluster) => cluster.fmt(f),
        }
    }
}

impl From<Permission> for PermissionEntry {
    fn from(permission: Permission) -> Self {
        match permission {
            Permission::Node(node) => PermissionEntry::Node(node),
            Permission::Group(group) => PermissionEntry::Group(group),
        }
    }
}

impl From<PermissionNode> for PermissionEntry {
    fn from(node: PermissionNode) -> Self {
        PermissionEntry::Node(node)
    }
}

impl From<PermissionGroup> for PermissionEntry {
    fn from(group: PermissionGroup) -> Self {
        PermissionEntry::Group(group)
    }
}

impl From<PermissionCluster> for PermissionEntry {
    fn from(cluster: PermissionCluster) -> Self {
        PermissionEntry::Cluster(cluster)
    }
}

impl TryFrom<PermissionEntry> for Permission {
    type Error = PermissionError;

    fn try_from(entry: PermissionEntry) -> Result<Self> {
        match entry {
            PermissionEntry::Node(node) => Ok(Permission::Node(node)),
            PermissionEntry::Group(group) => Ok(Permission::Group(group)),
            PermissionEntry::Cluster(_) => Err(PermissionError::TypeMismatch {
                expected: "node or group",
                found: "cluster",
            }),
        }
    }
}

impl TryFrom<PermissionEntry> for PermissionCluster {
    type Error = PermissionError;

    fn try_from(entry: PermissionEntry) -> Result<Self> {
        match entry {
            PermissionEntry::Cluster(cluster) => Ok(cluster),
            PermissionEntry::Node(_) => Err(PermissionError::TypeMismatch {
                expected: "cluster",
                found: "node",
            }),
            PermissionEntry::Group(_) => Err(PermissionError::TypeMismatch {
                expected: "cluster",
                found: "group",
            }),
        }
    }
}

/// Input accepted by [`PermissionCollection::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertable {
    Text(String),
    Entry(PermissionEntry),
    Batch(Vec<Insertable>),
}

/// Input accepted by [`PermissionCollection::remove`].
///
/// The `Collection` variant exists so that passing a whole collection is a
/// typed, reportable error rather than something that silently flattens.
#[derive(Debug, Clone)]
pub enum Removable {
    Text(String),
    Entry(PermissionEntry),
    Batch(Vec<Removable>),
    Collection,
}

macro_rules! input_from {
    ($input:ident) => {
        impl From<&str> for $input {
            fn from(text: &str) -> Self {
                $input::Text(text.to_string())
            }
        }

        impl From<String> for $input {
            fn from(text: String) -> Self {
                $input::Text(text)
            }
        }

        impl From<PermissionEntry> for $input {
            fn from(entry: PermissionEntry) -> Self {
                $input::Entry(entry)
            }
        }

        impl From<Permission> for $input {
            fn from(permission: Permission) -> Self {
                $input::Entry(permission.into())
            }
        }

        impl From<PermissionNode> for $input {
            fn from(node: PermissionNode) -> Self {
                $input::Entry(node.into())
            }
        }

        impl From<PermissionGroup> for $input {
            fn from(group: PermissionGroup) -> Self {
                $input::Entry(group.into())
            }
        }

        impl From<PermissionCluster> for $input {
            fn from(cluster: PermissionCluster) -> Self {
                $input::Entry(cluster.into())
            }
        }

        impl<T: Into<$input>> From<Vec<T>> for $input {
            fn from(items: Vec<T>) -> Self {
                $input::Batch(items.into_iter().map(Into::into).collect())
            }
        }
    };
}

input_from!(Insertable);
input_from!(Removable);

/// Copies every entry of another collection, in its order.
impl From<&PermissionCollection> for Insertable {
    fn from(collection: &PermissionCollection) -> Self {
        Insertable::Batch(collection.iter().cloned().map(Insertable::Entry).collect())
    }
}

impl From<&PermissionCollection> for Removable {
    fn from(_: &PermissionCollection) -> Self {
        Removable::Collection
    }
}

impl fmt::Display for Insertable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insertable::Text(text) => f.write_str(text),
            Insertable::Entry(entry) => entry.fmt(f),
            Insertable::Batch(items) => write_batch(f, items),
        }
    }
}

impl fmt::Display for Removable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Removable::Text(text) => f.write_str(text),
            Removable::Entry(entry) => entry.fmt(f),
            Removable::Batch(items) => write_batch(f, items),
            Removable::Collection => f.write_str("<collection>"),
        }
    }
}

fn write_batch<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.fmt(f)?;
    }
    f.write_str("]")
}

#[cfg(test)]
pub(crate) fn entry(text: &str) -> PermissionEntry {
    PermissionEntry::parse(text).unwrap()
}
