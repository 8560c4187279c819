use std::fmt;
use std::ops::Not;

use crate::engine::{self, SEPARATOR};
use crate::error::{PermissionError, Result};
use crate::group::PermissionGroup;
use crate::node::PermissionNode;
use crate::permission::Permission;

/// A named bundle of nodes and groups that share one sign.
///
/// Children never carry a sign of their own: every child is forced to the
/// cluster's sign when it is added, and flipping the cluster flips all of
/// them.
///
/// # Example
///
/// ```
/// use permnode::{Permission, PermissionCluster};
///
/// let mut moderator = PermissionCluster::new("-moderator").unwrap();
/// let failed = moderator
///     .add_child(vec!["chat.kick", "chat.mute.*", "not.valid."])
///     .unwrap();
/// assert_eq!(failed, vec!["not.valid.".to_string()]);
///
/// // Children took the cluster's sign.
/// assert!(moderator.iter().all(|child| child.is_negated()));
///
/// let probe = Permission::parse("chat.mute.voice").unwrap();
/// assert_eq!(moderator.has_child(&probe, false), None);
/// assert_eq!(moderator.has_child(&probe, true), Some(true));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionCluster {
    label: String,
    negated: bool,
    children: Vec<Permission>,
}

/// Anything that can be added to a [`PermissionCluster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildInput {
    /// Raw permission text, parsed with [`engine::create`].
    Text(String),
    /// An already-parsed node or group.
    Permission(Permission),
    /// Another cluster, whose children are adopted.
    Cluster(PermissionCluster),
    /// Several inputs, each processed independently.
    Batch(Vec<ChildInput>),
}

impl PermissionCluster {
    /// Creates an empty cluster. A leading `-` makes it negated.
    ///
    /// The label must start with a letter, must not contain `..`, and must not
    /// end with `.` or `*`.
    pub fn new(label: &str) -> Result<Self> {
        let (negated, body) = engine::strip_sign(label);
        let well_formed = body.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && !body.contains("..")
            && !body.ends_with(SEPARATOR)
            && !body.ends_with('*');
        if !well_formed {
            return Err(PermissionError::invalid(label));
        }
        Ok(Self {
            label: body.to_lowercase(),
            negated,
            children: Vec::new(),
        })
    }

    /// Returns the sign-stripped label.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn children(&self) -> &[Permission] {
        &self.children
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Permission> {
        self.children.iter()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Adds one or more children, forcing each to the cluster's sign.
    ///
    /// A single invalid string is an error. Within a batch, invalid strings
    /// are skipped and returned; the rest of the batch is still added.
    pub fn add_child(&mut self, input: impl Into<ChildInput>) -> Result<Vec<String>> {
        match input.into() {
            ChildInput::Text(text) => {
                let child = engine::create(&text)?;
                self.push(child);
                Ok(Vec::new())
            }
            other => {
                let mut failed = Vec::new();
                self.absorb(other, &mut failed);
                Ok(failed)
            }
        }
    }

    fn absorb(&mut self, input: ChildInput, failed: &mut Vec<String>) {
        match input {
            ChildInput::Text(text) => match engine::create(&text) {
                Ok(child) => self.push(child),
                Err(_) => {
                    tracing::warn!(cluster = %self, input = %text, "rejected invalid cluster child");
                    failed.push(text);
                }
            },
            ChildInput::Permission(child) => self.push(child),
            ChildInput::Cluster(other) => {
                for child in other.children {
                    self.push(child);
                }
            }
            ChildInput::Batch(items) => {
                for item in items {
                    self.absorb(item, failed);
                }
            }
        }
    }

    fn push(&mut self, mut child: Permission) {
        child.negate(self.negated);
        self.children.push(child);
    }

    /// Removes every child whose text equals `text` with its sign stripped.
    ///
    /// Deep mode also removes child groups that cover `text`, mirroring
    /// [`has_child`](Self::has_child). Text that does not parse as a
    /// permission only ever matches exactly. Returns `true` if anything was
    /// removed.
    pub fn remove_child(&mut self, text: &str, deep: bool) -> bool {
        let (_, body) = engine::strip_sign(text);
        let body = body.to_lowercase();
        let parsed = if deep { engine::create(&body).ok() } else { None };
        let before = self.children.len();
        self.children.retain(|child| {
            let covers = parsed.as_ref().is_some_and(|parsed| {
                matches!(child, Permission::Group(_)) && child.covers_unsigned(parsed)
            });
            child.permission() != body && !covers
        });
        self.children.len() != before
    }

    /// Keeps only the children for which `keep` returns `true`; returns the
    /// number removed.
    pub(crate) fn retain_children(&mut self, mut keep: impl FnMut(&Permission) -> bool) -> usize {
        let before = self.children.len();
        self.children.retain(|child| keep(child));
        before - self.children.len()
    }

    /// Looks for a child matching `probe`, ignoring signs.
    ///
    /// Shallow mode matches exact text only. Deep mode also accepts a child
    /// group that covers the probe. Returns the cluster's sign (`true` for
    /// negated) on a match, `None` otherwise.
    pub fn has_child(&self, probe: &Permission, deep: bool) -> Option<bool> {
        let matched = self.children.iter().any(|child| {
            child.permission() == probe.permission()
                || (deep && matches!(child, Permission::Group(_)) && child.covers_unsigned(probe))
        });
        matched.then_some(self.negated)
    }

    /// Returns `true` if [`has_child`](Self::has_child) finds a match.
    pub fn contains(&self, probe: &Permission, deep: bool) -> bool {
        self.has_child(probe, deep).is_some()
    }

    /// The most specific child that equals or covers `probe`, ignoring signs.
    pub fn best_match(&self, probe: &Permission) -> Option<&Permission> {
        self.children
            .iter()
            .filter(|child| child.covers_unsigned(probe))
            .max_by_key(|child| specificity(child))
    }

    /// Returns a copy with the cluster and every child set to `negated`.
    pub fn negated(&self, negated: bool) -> Self {
        let mut copy = self.clone();
        copy.negate(negated);
        copy
    }

    /// Sets the sign of the cluster and every child in place.
    pub fn negate(&mut self, negated: bool) {
        self.negated = negated;
        for child in &mut self.children {
            child.negate(negated);
        }
    }

    /// Returns a copy with the opposite sign.
    pub fn inverted(&self) -> Self {
        self.negated(!self.negated)
    }

    /// Flips the sign of the cluster and every child in place.
    pub fn invert(&mut self) {
        self.negate(!self.negated);
    }
}

/// Ranks matches: deeper first, and a node above a group of the same depth.
pub(crate) fn specificity(permission: &Permission) -> (usize, bool) {
    match permission {
        Permission::Node(node) => (node.len(), true),
        Permission::Group(group) => (group.len() - 1, false),
    }
}

impl<'a> IntoIterator for &'a PermissionCluster {
    type Item = &'a Permission;
    type IntoIter = std::slice::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

impl Not for PermissionCluster {
    type Output = PermissionCluster;

    fn not(mut self) -> Self::Output {
        self.invert();
        self
    }
}

impl fmt::Display for PermissionCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "-{}", self.label)
        } else {
            f.write_str(&self.label)
        }
    }
}

impl From<&str> for ChildInput {
    fn from(text: &str) -> Self {
        ChildInput::Text(text.to_string())
    }
}

impl From<String> for ChildInput {
    fn from(text: String) -> Self {
        ChildInput::Text(text)
    }
}

impl From<Permission> for ChildInput {
    fn from(permission: Permission) -> Self {
        ChildInput::Permission(permission)
    }
}

impl From<PermissionNode> for ChildInput {
    fn from(node: PermissionNode) -> Self {
        ChildInput::Permission(Permission::Node(node))
    }
}

impl From<PermissionGroup> for ChildInput {
    fn from(group: PermissionGroup) -> Self {
        ChildInput::Permission(Permission::Group(group))
    }
}

impl From<PermissionCluster> for ChildInput {
    fn from(cluster: PermissionCluster) -> Self {
        ChildInput::Cluster(cluster)
    }
}

impl<T: Into<ChildInput>> From<Vec<T>> for ChildInput {
    fn from(items: Vec<T>) -> Self {
        ChildInput::Batch(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
pub(crate) fn cluster(label: &str, children: &[&str]) -> PermissionCluster {
    let mut cluster = PermissionCluster::new(label).unwrap();
    let failed = cluster.add_child(children.to_vec()).unwrap();
    assert!(failed.is_empty(), "invalid test children: {failed:?}");
    cluster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::group;
    use crate::node::node;
    use crate::permission::perm;

    #[test]
    fn test_label_rules() {
        assert!(PermissionCluster::new("admin").is_ok());
        assert_eq!(PermissionCluster::new("-Staff.Mods").unwrap().to_string(), "-staff.mods");
        assert!(PermissionCluster::new("admin.*").is_err());
        assert!(PermissionCluster::new("a..b").is_err());
        assert!(PermissionCluster::new("admin.").is_err());
        assert!(PermissionCluster::new("1admin").is_err());
        assert!(PermissionCluster::new("-").is_err());
    }

    mod add_child {
        use super::*;

        #[test]
        fn test_single_text() {
            let mut c = PermissionCluster::new("-mods").unwrap();
            assert_eq!(c.add_child("a.b.c"), Ok(vec![]));
            assert_eq!(c.children(), &[perm("-a.b.c")]);
        }

        #[test]
        fn test_single_invalid_text_is_an_error() {
            let mut c = PermissionCluster::new("mods").unwrap();
            assert!(matches!(
                c.add_child("nope"),
                Err(PermissionError::InvalidPermission { .. })
            ));
            assert!(c.is_empty());
        }

        #[test]
        fn test_sign_is_forced() {
            let mut c = PermissionCluster::new("mods").unwrap();
            c.add_child(node("-a.b")).unwrap();
            c.add_child(group("-a.c.*")).unwrap();
            assert!(c.iter().all(|child| !child.is_negated()));
        }

        #[test]
        fn test_batch_collects_failures() {
            let mut c = PermissionCluster::new("mods").unwrap();
            let failed = c.add_child(vec!["a.b", "bad", "a.c.*", "x..y"]).unwrap();
            assert_eq!(failed, vec!["bad".to_string(), "x..y".to_string()]);
            assert_eq!(c.len(), 2);
        }

        #[test]
        fn test_adopts_other_cluster() {
            let other = cluster("-other", &["x.y", "x.z.*"]);
            let mut c = PermissionCluster::new("mods").unwrap();
            c.add_child(other).unwrap();
            assert_eq!(c.children(), &[perm("x.y"), perm("x.z.*")]);
        }
    }

    mod remove_child {
        use super::*;

        #[test]
        fn test_strips_sign() {
            let mut c = cluster("-mods", &["a.b", "a.c", "a.b"]);
            assert!(c.remove_child("a.b", false));
            assert_eq!(c.children(), &[perm("-a.c")]);
            assert!(c.remove_child("-A.C", false));
            assert!(!c.remove_child("a.c", false));
            assert!(c.is_empty());
        }

        #[test]
        fn test_shallow_leaves_covering_groups() {
            let mut c = cluster("mods", &["x.*", "x.y.*", "a.b"]);
            assert!(!c.remove_child("x.y.z", false));
            assert_eq!(c.len(), 3);
        }

        #[test]
        fn test_deep_drops_covering_groups() {
            let mut c = cluster("-mods", &["x.*", "x.y.*", "x.y.z", "x.q", "a.*"]);
            assert!(c.remove_child("x.y.z", true));
            assert_eq!(c.children(), &[perm("-x.q"), perm("-a.*")]);
            assert!(!c.remove_child("b.c", true));
        }

        #[test]
        fn test_deep_keeps_narrower_groups() {
            let mut c = cluster("mods", &["x.y.*", "x.*"]);
            assert!(c.remove_child("x.*", true));
            assert_eq!(c.children(), &[perm("x.y.*")]);
        }

        #[test]
        fn test_deep_with_unparsable_text_is_exact() {
            let mut c = cluster("mods", &["x.*"]);
            assert!(!c.remove_child("x", true));
            assert_eq!(c.len(), 1);
        }
    }

    mod has_child {
        use super::*;

        #[test]
        fn test_shallow_exact_only() {
            let c = cluster("mods", &["a.b", "x.*"]);
            assert_eq!(c.has_child(&perm("a.b"), false), Some(false));
            assert_eq!(c.has_child(&perm("x.*"), false), Some(false));
            assert_eq!(c.has_child(&perm("x.y"), false), None);
        }

        #[test]
        fn test_deep_uses_group_coverage() {
            let c = cluster("-mods", &["a.b", "x.*"]);
            assert_eq!(c.has_child(&perm("x.y"), true), Some(true));
            assert_eq!(c.has_child(&perm("x.y.*"), true), Some(true));
            assert_eq!(c.has_child(&perm("a.b.c"), true), None);
        }

        #[test]
        fn test_no_match_regardless_of_sign() {
            let c = cluster("-mods", &["a.b"]);
            assert_eq!(c.has_child(&perm("q.r"), true), None);
            assert!(!c.contains(&perm("q.r"), true));
        }

        #[test]
        fn test_best_match_prefers_specific() {
            let c = cluster("mods", &["a.*", "a.b.*", "a.b.c"]);
            assert_eq!(c.best_match(&perm("a.b.c")), Some(&perm("a.b.c")));
            assert_eq!(c.best_match(&perm("a.b.d")), Some(&perm("a.b.*")));
            assert_eq!(c.best_match(&perm("z.z")), None);
        }
    }

    #[test]
    fn test_sign_ops_cascade_to_children() {
        let c = cluster("mods", &["a.b", "c.*"]);
        let n = c.inverted();
        assert!(n.is_negated());
        assert!(n.iter().all(Permission::is_negated));
        assert_eq!(n.inverted(), c);
        assert_eq!(!!c.clone(), c);

        let mut m = c.clone();
        m.negate(true);
        assert_eq!(m, n);
        m.invert();
        assert_eq!(m, c);
    }
}
