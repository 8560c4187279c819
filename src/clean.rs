//! Redundancy reduction for collection entries.
//!
//! Runs in three passes, each preserving first-seen order:
//!
//! 1. exact duplicates (same text and sign, any kind) are dropped;
//! 2. each cluster drops repeated children;
//! 3. entries subsumed by a same-sign group or cluster are dropped, and
//!    cluster children already covered by a top-level group are pruned.
//!
//! Entries carry their input position through every pass, so [`reduce`] can
//! report which positions were dropped even when an identical twin survives.

use std::collections::HashSet;

use tracing::trace;

use crate::cluster::PermissionCluster;
use crate::entry::PermissionEntry;
use crate::group::PermissionGroup;

/// Entries tagged with their position in the input.
type Indexed = Vec<(usize, PermissionEntry)>;

/// The outcome of [`reduce`].
#[derive(Debug, Default)]
pub(crate) struct Reduction {
    /// Surviving entries in first-seen order, clusters already pruned.
    pub(crate) kept: Vec<PermissionEntry>,
    /// Input entries that did not survive, one per removed position.
    pub(crate) dropped: Vec<PermissionEntry>,
    /// Surviving clusters that lost children, in their new form.
    pub(crate) rewritten: Vec<PermissionEntry>,
}

/// Returns `entries` with duplicate and subsumed entries removed.
pub(crate) fn clean(entries: &[PermissionEntry]) -> Vec<PermissionEntry> {
    reduce(entries).kept
}

/// Cleans `entries` and accounts for every input position it touched.
pub(crate) fn reduce(entries: &[PermissionEntry]) -> Reduction {
    let mut kept = drop_duplicates(entries);
    trace!(before = entries.len(), after = kept.len(), "dropped exact duplicates");

    let mut pruned = 0;
    for (_, entry) in &mut kept {
        if let PermissionEntry::Cluster(cluster) = entry {
            let mut seen = HashSet::new();
            pruned += cluster.retain_children(|child| seen.insert(child.permission().to_string()));
        }
    }
    trace!(pruned, "dropped repeated cluster children");

    drop_covered_groups(&mut kept);
    drop_included_leaves(&mut kept);
    drop_cluster_covered(&mut kept);
    prune_cluster_children(&mut kept);
    trace!(after = kept.len(), "dropped subsumed entries");

    let mut reduction = Reduction::default();
    let mut survivors = kept.into_iter().peekable();
    for (index, original) in entries.iter().enumerate() {
        match survivors.next_if(|(kept_at, _)| *kept_at == index) {
            Some((_, entry)) => {
                if entry != *original {
                    reduction.rewritten.push(entry.clone());
                }
                reduction.kept.push(entry);
            }
            None => reduction.dropped.push(original.clone()),
        }
    }
    reduction
}

fn drop_duplicates(entries: &[PermissionEntry]) -> Indexed {
    let mut seen = HashSet::new();
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| seen.insert((entry.permission().to_string(), entry.is_negated())))
        .map(|(index, entry)| (index, entry.clone()))
        .collect()
}

fn groups(kept: &[(usize, PermissionEntry)]) -> Vec<PermissionGroup> {
    kept.iter()
        .filter_map(|(_, entry)| match entry {
            PermissionEntry::Group(group) => Some(group.clone()),
            _ => None,
        })
        .collect()
}

fn clusters(kept: &[(usize, PermissionEntry)]) -> Vec<PermissionCluster> {
    kept.iter()
        .filter_map(|(_, entry)| match entry {
            PermissionEntry::Cluster(cluster) => Some(cluster.clone()),
            _ => None,
        })
        .collect()
}

/// A group strictly covered by another same-sign group goes.
fn drop_covered_groups(kept: &mut Indexed) {
    let groups = groups(kept);
    kept.retain(|(_, entry)| match entry {
        PermissionEntry::Group(group) => !groups.iter().any(|other| other.includes_group(group)),
        _ => true,
    });
}

fn drop_included_leaves(kept: &mut Indexed) {
    let groups = groups(kept);
    kept.retain(|(_, entry)| match entry {
        PermissionEntry::Node(node) => !groups.iter().any(|group| group.includes_node(node)),
        _ => true,
    });
}

fn drop_cluster_covered(kept: &mut Indexed) {
    let clusters = clusters(kept);
    kept.retain(|(_, entry)| match entry.as_permission() {
        Some(permission) => !clusters.iter().any(|cluster| {
            cluster.is_negated() == permission.is_negated() && cluster.contains(&permission, true)
        }),
        None => true,
    });
}

fn prune_cluster_children(kept: &mut [(usize, PermissionEntry)]) {
    let groups = groups(kept);
    for (_, entry) in kept.iter_mut() {
        if let PermissionEntry::Cluster(cluster) = entry {
            cluster.retain_children(|child| !groups.iter().any(|group| group.covers(child)));
        }
    }
}
