use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::clean;
use crate::cluster::{self, PermissionCluster};
use crate::entry::{Insertable, PermissionEntry, Removable, entry_order};
use crate::error::{PermissionError, Result};
use crate::event::{ChangeEvent, ChangeKind, ChangeListener, ListenerId};
use crate::outcome::Outcome;
use crate::permission::Permission;

/// The derived views a collection memoizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum View {
    Sorted,
    Inverted,
    Negated(bool),
    Cleaned,
    ForcedGroups,
    GroupsOnly,
    LeavesOnly,
    NegatedOnly,
    UnnegatedOnly,
}

struct CachedView {
    revision: u64,
    entries: Arc<[PermissionEntry]>,
}

/// An ordered set of nodes, groups, and clusters held by one owner.
///
/// Every committed mutation bumps [`revision`](Self::revision) and notifies
/// subscribed listeners. Derived views (`sorted`, `cleaned`, ...) are
/// memoized per revision and shared as `Arc<[PermissionEntry]>`, so repeated
/// calls between mutations are free.
///
/// The memo table lives behind a `RefCell`: a collection can move between
/// threads but cannot be shared by reference across them.
///
/// # Example
///
/// ```
/// use permnode::{Outcome, Permission, PermissionCollection};
///
/// let (mut alice, failed) =
///     PermissionCollection::seeded("alice", vec!["a.b.c", "-a.b.c", "a.b.*", "a.c.d", "oops"]);
/// assert_eq!(failed, vec!["oops".to_string()]);
///
/// alice.clean();
/// let texts: Vec<String> = alice.iter().map(ToString::to_string).collect();
/// assert_eq!(texts, vec!["-a.b.c", "a.b.*", "a.c.d"]);
///
/// let probe = Permission::parse("a.b.c").unwrap();
/// assert!(alice.has(&probe));
/// assert_eq!(alice.evaluate(&probe), Outcome::Deny);
/// ```
pub struct PermissionCollection {
    owner: String,
    entries: Vec<PermissionEntry>,
    revision: u64,
    cache: RefCell<HashMap<View, CachedView>>,
    listeners: Vec<(ListenerId, Box<dyn ChangeListener>)>,
    next_listener: u64,
}

impl PermissionCollection {
    /// Creates an empty collection for `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: Vec::new(),
            revision: 0,
            cache: RefCell::new(HashMap::new()),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Creates a collection from an initial batch, returning the inputs that
    /// could not be parsed. The revision starts at zero.
    pub fn seeded(owner: impl Into<String>, items: impl Into<Insertable>) -> (Self, Vec<String>) {
        let mut collection = Self::new(owner);
        let mut failed = Vec::new();
        flatten_insertable(items.into(), &mut collection.entries, &mut failed);
        if !failed.is_empty() {
            warn!(owner = %collection.owner, ?failed, "dropped invalid seed permissions");
        }
        debug!(owner = %collection.owner, total = collection.entries.len(), "seeded collection");
        (collection, failed)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn entries(&self) -> &[PermissionEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PermissionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PermissionEntry> {
        self.entries.get(index)
    }

    /// The mutation counter; starts at zero and only ever grows.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of memoized views that are valid at the current revision.
    pub fn cached_views(&self) -> usize {
        self.cache
            .borrow()
            .values()
            .filter(|cached| cached.revision == self.revision)
            .count()
    }

    // Listeners

    /// Registers a listener that is notified after every committed mutation.
    pub fn subscribe(&mut self, listener: impl ChangeListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener; returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != id);
        self.listeners.len() != before
    }

    // Mutations

    /// Adds one entry or a batch.
    ///
    /// A single invalid string fails with
    /// [`PermissionError::InvalidPermission`]. For a batch, invalid strings
    /// are skipped and returned, and the rest is added. Nothing is committed
    /// when every input is rejected.
    pub fn add(&mut self, input: impl Into<Insertable>) -> Result<Vec<String>> {
        let mut accepted = Vec::new();
        let mut failed = Vec::new();
        match input.into() {
            Insertable::Text(text) => accepted.push(PermissionEntry::parse(&text)?),
            other => flatten_insertable(other, &mut accepted, &mut failed),
        }
        if !failed.is_empty() {
            warn!(owner = %self.owner, ?failed, "rejected invalid permissions");
        }
        if accepted.is_empty() {
            return Ok(failed);
        }
        self.entries.extend(accepted.iter().cloned());
        self.commit(ChangeKind::Add, accepted, failed.clone());
        Ok(failed)
    }

    /// Removes every entry whose signed text equals an input's signed text.
    ///
    /// Returns the inputs that matched nothing. A whole collection is not an
    /// accepted input and fails with
    /// [`PermissionError::UnsupportedBulkRemoval`] before anything is removed.
    pub fn remove(&mut self, input: impl Into<Removable>) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        flatten_removable(input.into(), &mut keys)?;

        let mut removed = Vec::new();
        let mut unmatched = Vec::new();
        for (raw, key) in keys {
            let before = removed.len();
            self.entries.retain(|entry| {
                if entry.to_string() == key {
                    removed.push(entry.clone());
                    false
                } else {
                    true
                }
            });
            if removed.len() == before {
                unmatched.push(raw);
            }
        }
        if !removed.is_empty() {
            self.commit(ChangeKind::Remove, removed, unmatched.clone());
        }
        Ok(unmatched)
    }

    /// Removes every entry matching `predicate` and returns them in order.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&PermissionEntry) -> bool) -> Vec<PermissionEntry> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|entry| predicate(entry));
        self.entries = kept;
        if !removed.is_empty() {
            self.commit(ChangeKind::Remove, removed.clone(), Vec::new());
        }
        removed
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        let removed = std::mem::take(&mut self.entries);
        self.commit(ChangeKind::Clear, removed, Vec::new());
    }

    /// Flips the sign of every entry matching `predicate`.
    pub fn invert_where(&mut self, predicate: impl FnMut(&PermissionEntry) -> bool) {
        self.rewrite_where(ChangeKind::Inverse, predicate, PermissionEntry::invert);
    }

    /// Sets the sign of every entry matching `predicate` to `negated`.
    pub fn negate_where(&mut self, predicate: impl FnMut(&PermissionEntry) -> bool, negated: bool) {
        self.rewrite_where(ChangeKind::Negate, predicate, |entry| entry.negate(negated));
    }

    /// Makes every entry matching `predicate` positive.
    pub fn unnegate_where(&mut self, predicate: impl FnMut(&PermissionEntry) -> bool) {
        self.negate_where(predicate, false);
    }

    /// Replaces every leaf matching `predicate` with its parent group.
    pub fn force_group_where(&mut self, mut predicate: impl FnMut(&PermissionEntry) -> bool) {
        self.rewrite_where(
            ChangeKind::ForceGroup,
            |entry| entry.is_node() && predicate(entry),
            |entry| *entry = force_group_entry(entry),
        );
    }

    fn rewrite_where(
        &mut self,
        kind: ChangeKind,
        mut predicate: impl FnMut(&PermissionEntry) -> bool,
        mut rewrite: impl FnMut(&mut PermissionEntry),
    ) {
        let mut affected = Vec::new();
        for entry in &mut self.entries {
            if predicate(entry) {
                rewrite(&mut *entry);
                affected.push(entry.clone());
            }
        }
        if !affected.is_empty() {
            self.commit(kind, affected, Vec::new());
        }
    }

    /// Reorders the entries as [`sorted`](Self::sorted) would.
    pub fn sort(&mut self) {
        self.replace_with(ChangeKind::Sort, self.sorted());
    }

    /// Flips the sign of every entry.
    pub fn invert(&mut self) {
        self.replace_with(ChangeKind::Inverse, self.inverted());
    }

    /// Sets the sign of every entry to `negated`.
    pub fn negate(&mut self, negated: bool) {
        self.replace_with(ChangeKind::Negate, self.negated(negated));
    }

    /// Removes duplicate and subsumed entries; see [`cleaned`](Self::cleaned).
    ///
    /// The event lists every dropped entry, once per removed occurrence,
    /// followed by the surviving clusters whose children were pruned.
    pub fn clean(&mut self) {
        let clean::Reduction {
            kept,
            mut dropped,
            rewritten,
        } = clean::reduce(&self.entries);
        dropped.extend(rewritten);
        self.entries = kept;
        self.commit(ChangeKind::Clean, dropped, Vec::new());
    }

    /// Replaces every leaf with its parent group.
    pub fn force_group(&mut self) {
        self.replace_with(ChangeKind::ForceGroup, self.forced_groups());
    }

    /// Records a change without altering any entry.
    pub fn touch(&mut self) {
        self.commit(ChangeKind::Touch, Vec::new(), Vec::new());
    }

    /// Drops every memoized view. Neither the entries nor the revision change.
    pub fn reset_cache(&self) {
        self.cache.borrow_mut().clear();
        trace!(owner = %self.owner, "reset view cache");
    }

    fn replace_with(&mut self, kind: ChangeKind, entries: Arc<[PermissionEntry]>) {
        self.entries = entries.to_vec();
        self.commit(kind, entries.to_vec(), Vec::new());
    }

    fn commit(&mut self, kind: ChangeKind, affected: Vec<PermissionEntry>, failed: Vec<String>) {
        self.revision += 1;
        debug!(
            owner = %self.owner,
            revision = self.revision,
            ?kind,
            affected = affected.len(),
            total = self.entries.len(),
            "committed change"
        );
        if self.listeners.is_empty() {
            return;
        }

        let event = ChangeEvent {
            kind,
            affected,
            failed,
            total_after: self.entries.len(),
            revision: self.revision,
        };
        for (id, listener) in &self.listeners {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.notify(&event)));
            if delivered.is_err() {
                warn!(owner = %self.owner, listener = id.0, ?kind, "change listener panicked");
            }
        }
    }

    // Queries

    /// Returns `true` if some entry grants or denies exactly `probe`'s scope
    /// with `probe`'s sign; see [`find`](Self::find).
    pub fn has(&self, probe: &Permission) -> bool {
        self.find(probe).is_some()
    }

    /// Parses `text` and checks it with [`has`](Self::has).
    pub fn has_text(&self, text: &str) -> Result<bool> {
        Permission::parse(text).map(|probe| self.has(&probe))
    }

    /// Returns the most specific entry that covers `probe` with the same sign.
    ///
    /// A leaf entry matches only an identical probe. A group entry matches a
    /// probe it equals or covers. A cluster matches when one of its children
    /// does. Among several matches the deepest wins, a leaf beating a group
    /// of the same depth; remaining ties go to the earliest entry.
    pub fn find(&self, probe: &Permission) -> Option<&PermissionEntry> {
        self.entries
            .iter()
            .rev()
            .filter_map(|entry| signed_match(entry, probe).map(|rank| (rank, entry)))
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, entry)| entry)
    }

    /// Resolves `probe` regardless of its sign.
    ///
    /// The most specific covering entry of either sign decides: negated
    /// yields [`Outcome::Deny`], positive [`Outcome::Allow`]. When a negated
    /// and a positive entry are equally specific, the negated one wins.
    pub fn evaluate(&self, probe: &Permission) -> Outcome {
        let best = self
            .entries
            .iter()
            .filter_map(|entry| unsigned_match(entry, probe).map(|rank| (rank, entry.is_negated())))
            .max();
        let outcome = match best {
            Some((_, true)) => Outcome::Deny,
            Some((_, false)) => Outcome::Allow,
            None => Outcome::Unknown,
        };
        debug!(owner = %self.owner, probe = %probe, %outcome, "evaluated probe");
        outcome
    }

    // Views

    /// Entries in canonical order: leaves before groups and clusters,
    /// negated before positive within each, then by text. The sort is stable.
    pub fn sorted(&self) -> Arc<[PermissionEntry]> {
        self.view(View::Sorted, |entries| {
            let mut sorted = entries.to_vec();
            sorted.sort_by(entry_order);
            sorted
        })
    }

    /// Every entry with its sign flipped.
    pub fn inverted(&self) -> Arc<[PermissionEntry]> {
        self.view(View::Inverted, |entries| entries.iter().map(PermissionEntry::inverted).collect())
    }

    /// Every entry with its sign set to `negated`.
    pub fn negated(&self, negated: bool) -> Arc<[PermissionEntry]> {
        self.view(View::Negated(negated), |entries| {
            entries.iter().map(|entry| entry.negated(negated)).collect()
        })
    }

    /// The entries with duplicates and subsumed entries removed.
    pub fn cleaned(&self) -> Arc<[PermissionEntry]> {
        self.view(View::Cleaned, clean::clean)
    }

    /// Every leaf broadened to its parent group; other entries unchanged.
    pub fn forced_groups(&self) -> Arc<[PermissionEntry]> {
        self.view(View::ForcedGroups, |entries| entries.iter().map(force_group_entry).collect())
    }

    pub fn groups_only(&self) -> Arc<[PermissionEntry]> {
        self.view(View::GroupsOnly, |entries| select(entries, PermissionEntry::is_group))
    }

    pub fn leaves_only(&self) -> Arc<[PermissionEntry]> {
        self.view(View::LeavesOnly, |entries| select(entries, PermissionEntry::is_node))
    }

    pub fn negated_only(&self) -> Arc<[PermissionEntry]> {
        self.view(View::NegatedOnly, |entries| select(entries, PermissionEntry::is_negated))
    }

    pub fn unnegated_only(&self) -> Arc<[PermissionEntry]> {
        self.view(View::UnnegatedOnly, |entries| {
            select(entries, |entry| !entry.is_negated())
        })
    }

    fn view(
        &self,
        view: View,
        compute: impl FnOnce(&[PermissionEntry]) -> Vec<PermissionEntry>,
    ) -> Arc<[PermissionEntry]> {
        let cached = self
            .cache
            .borrow()
            .get(&view)
            .filter(|cached| cached.revision == self.revision)
            .map(|cached| Arc::clone(&cached.entries));
        if let Some(entries) = cached {
            return entries;
        }

        let entries: Arc<[PermissionEntry]> = compute(&self.entries).into();
        trace!(owner = %self.owner, ?view, revision = self.revision, "computed view");
        self.cache.borrow_mut().insert(
            view,
            CachedView {
                revision: self.revision,
                entries: Arc::clone(&entries),
            },
        );
        entries
    }
}

fn select(entries: &[PermissionEntry], keep: impl Fn(&PermissionEntry) -> bool) -> Vec<PermissionEntry> {
    entries.iter().filter(|entry| keep(entry)).cloned().collect()
}

fn force_group_entry(entry: &PermissionEntry) -> PermissionEntry {
    match entry {
        PermissionEntry::Node(node) => PermissionEntry::Group(node.parent()),
        other => other.clone(),
    }
}

/// Match rank of `entry` for a same-sign lookup, if it matches at all.
fn signed_match(entry: &PermissionEntry, probe: &Permission) -> Option<(usize, bool)> {
    match entry {
        PermissionEntry::Node(node) => match probe {
            Permission::Node(probe) if probe == node => Some((node.len(), true)),
            _ => None,
        },
        PermissionEntry::Group(group) => group
            .covers(probe)
            .then(|| (group.len() - 1, false)),
        PermissionEntry::Cluster(cluster) => cluster_match(cluster, probe, true),
    }
}

/// Match rank of `entry` against `probe` with both signs ignored.
fn unsigned_match(entry: &PermissionEntry, probe: &Permission) -> Option<(usize, bool)> {
    match entry.as_permission() {
        Some(permission) => permission
            .covers_unsigned(probe)
            .then(|| cluster::specificity(&permission)),
        None => match entry {
            PermissionEntry::Cluster(cluster) => cluster_match(cluster, probe, false),
            _ => None,
        },
    }
}

fn cluster_match(cluster: &PermissionCluster, probe: &Permission, signed: bool) -> Option<(usize, bool)> {
    if signed && cluster.is_negated() != probe.is_negated() {
        return None;
    }
    cluster.best_match(probe).map(cluster::specificity)
}

fn flatten_insertable(input: Insertable, accepted: &mut Vec<PermissionEntry>, failed: &mut Vec<String>) {
    match input {
        Insertable::Text(text) => match PermissionEntry::parse(&text) {
            Ok(entry) => accepted.push(entry),
            Err(_) => failed.push(text),
        },
        Insertable::Entry(entry) => accepted.push(entry),
        Insertable::Batch(items) => {
            for item in items {
                flatten_insertable(item, accepted, failed);
            }
        }
    }
}

/// Collects `(raw input, signed lowercase key)` pairs.
fn flatten_removable(input: Removable, keys: &mut Vec<(String, String)>) -> Result<()> {
    match input {
        Removable::Text(text) => {
            let key = text.to_lowercase();
            keys.push((text, key));
        }
        Removable::Entry(entry) => {
            let key = entry.to_string();
            keys.push((key.clone(), key));
        }
        Removable::Batch(items) => {
            for item in items {
                flatten_removable(item, keys)?;
            }
        }
        Removable::Collection => return Err(PermissionError::UnsupportedBulkRemoval),
    }
    Ok(())
}

impl fmt::Debug for PermissionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionCollection")
            .field("owner", &self.owner)
            .field("entries", &self.entries)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl fmt::Display for PermissionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [", self.owner)?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            entry.fmt(f)?;
        }
        f.write_str("]")
    }
}

impl<'a> IntoIterator for &'a PermissionCollection {
    type Item = &'a PermissionEntry;
    type IntoIter = std::slice::Iter<'a, PermissionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::cluster::cluster;
    use crate::entry::entry;
    use crate::permission::perm;

    fn collection(texts: &[&str]) -> PermissionCollection {
        let (collection, failed) = PermissionCollection::seeded("test", texts.to_vec());
        assert!(failed.is_empty(), "invalid seed: {failed:?}");
        collection
    }

    fn texts(entries: &[PermissionEntry]) -> Vec<String> {
        entries.iter().map(ToString::to_string).collect()
    }

    fn record(collection: &mut PermissionCollection) -> Arc<Mutex<Vec<ChangeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        collection.subscribe(move |event: &ChangeEvent| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[test]
    fn test_seeded_reports_failures() {
        let (c, failed) = PermissionCollection::seeded("alice", vec!["a.b", "bad", "c.*"]);
        assert_eq!(failed, vec!["bad".to_string()]);
        assert_eq!(texts(c.entries()), vec!["a.b", "c.*"]);
        assert_eq!(c.revision(), 0);
        assert_eq!(c.owner(), "alice");
    }

    mod add {
        use super::*;

        #[test]
        fn test_single_invalid_changes_nothing() {
            let mut c = PermissionCollection::new("alice");
            let events = record(&mut c);
            assert!(matches!(
                c.add("not.valid."),
                Err(PermissionError::InvalidPermission { .. })
            ));
            assert!(c.is_empty());
            assert_eq!(c.revision(), 0);
            assert!(events.lock().unwrap().is_empty());
        }

        #[test]
        fn test_fully_rejected_batch_changes_nothing() {
            let mut c = PermissionCollection::new("alice");
            let events = record(&mut c);
            assert_eq!(c.add(vec!["not.valid."]), Ok(vec!["not.valid.".to_string()]));
            assert_eq!(c.revision(), 0);
            assert!(events.lock().unwrap().is_empty());
        }

        #[test]
        fn test_partial_batch() {
            let mut c = PermissionCollection::new("alice");
            let events = record(&mut c);
            let failed = c.add(vec!["a.b", "oops", "-c.*"]).unwrap();
            assert_eq!(failed, vec!["oops".to_string()]);
            assert_eq!(texts(c.entries()), vec!["a.b", "-c.*"]);
            assert_eq!(c.revision(), 1);

            let events = events.lock().unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind, ChangeKind::Add);
            assert_eq!(texts(&events[0].affected), vec!["a.b", "-c.*"]);
            assert_eq!(events[0].failed, vec!["oops".to_string()]);
            assert_eq!(events[0].total_after, 2);
            assert_eq!(events[0].revision, 1);
        }

        #[test]
        fn test_entries_and_clusters() {
            let mut c = PermissionCollection::new("alice");
            c.add(entry("a.b")).unwrap();
            c.add(cluster("-mods", &["x.y"])).unwrap();
            assert_eq!(texts(c.entries()), vec!["a.b", "-mods"]);
            assert_eq!(c.revision(), 2);
        }

        #[test]
        fn test_entries_of_another_collection() {
            let mut source = collection(&["x.y", "-z.*"]);
            source.add(cluster("-mods", &["q.r"])).unwrap();

            let mut c = collection(&["a.b"]);
            let events = record(&mut c);
            assert_eq!(c.add(&source), Ok(vec![]));
            assert_eq!(texts(c.entries()), vec!["a.b", "x.y", "-z.*", "-mods"]);
            assert_eq!(c.get(3), source.get(2));
            assert_eq!(source.len(), 3);

            let events = events.lock().unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(texts(&events[0].affected), vec!["x.y", "-z.*", "-mods"]);
        }

        #[test]
        fn test_empty_collection_changes_nothing() {
            let mut c = collection(&["a.b"]);
            assert_eq!(c.add(&PermissionCollection::new("empty")), Ok(vec![]));
            assert_eq!(c.revision(), 0);
        }
    }

    mod remove {
        use super::*;

        #[test]
        fn test_matches_signed_text() {
            let mut c = collection(&["a.b", "-a.b", "a.b"]);
            assert_eq!(c.remove("A.B"), Ok(vec![]));
            assert_eq!(texts(c.entries()), vec!["-a.b"]);
            assert_eq!(c.revision(), 1);
        }

        #[test]
        fn test_reports_unmatched() {
            let mut c = collection(&["a.b", "c.*"]);
            let unmatched = c.remove(vec!["c.*", "x.y"]).unwrap();
            assert_eq!(unmatched, vec!["x.y".to_string()]);
            assert_eq!(texts(c.entries()), vec!["a.b"]);
        }

        #[test]
        fn test_nothing_matched_is_not_committed() {
            let mut c = collection(&["a.b"]);
            assert_eq!(c.remove("-a.b"), Ok(vec!["-a.b".to_string()]));
            assert_eq!(c.revision(), 0);
        }

        #[test]
        fn test_cluster_by_label() {
            let mut c = collection(&["a.b"]);
            c.add(cluster("-mods", &["x.y"])).unwrap();
            assert_eq!(c.remove("-mods"), Ok(vec![]));
            assert_eq!(texts(c.entries()), vec!["a.b"]);
        }

        #[test]
        fn test_collection_is_rejected() {
            let mut c = collection(&["a.b"]);
            let other = collection(&["a.b"]);
            assert_eq!(c.remove(&other), Err(PermissionError::UnsupportedBulkRemoval));
            assert_eq!(c.len(), 1);
            assert_eq!(c.revision(), 0);
        }

        #[test]
        fn test_remove_where() {
            let mut c = collection(&["a.b", "-a.c", "a.*"]);
            let removed = c.remove_where(PermissionEntry::is_negated);
            assert_eq!(texts(&removed), vec!["-a.c"]);
            assert_eq!(texts(c.entries()), vec!["a.b", "a.*"]);
            assert!(c.remove_where(|_| false).is_empty());
            assert_eq!(c.revision(), 1);
        }

        #[test]
        fn test_clear_always_commits() {
            let mut c = PermissionCollection::new("alice");
            c.clear();
            assert_eq!(c.revision(), 1);
        }
    }

    mod has {
        use super::*;

        #[test]
        fn test_leaf_probe() {
            let c = collection(&["a.b.c", "x.*", "-y.*"]);
            assert!(c.has(&perm("a.b.c")));
            assert!(!c.has(&perm("-a.b.c")));
            assert!(c.has(&perm("x.y.z")));
            assert!(!c.has(&perm("y.z")));
            assert!(c.has(&perm("-y.z")));
            assert!(!c.has(&perm("a.b.d")));
        }

        #[test]
        fn test_group_probe() {
            let c = collection(&["a.*", "b.c.*", "a.b.c"]);
            assert!(c.has(&perm("a.*")));
            assert!(c.has(&perm("a.b.*")));
            assert!(!c.has(&perm("b.*")));
            assert!(!c.has(&perm("-a.b.*")));
        }

        #[test]
        fn test_cluster_deep_contains() {
            let mut c = PermissionCollection::new("alice");
            c.add(cluster("mods", &["chat.mute.*", "chat.kick"])).unwrap();
            assert!(c.has(&perm("chat.mute.voice")));
            assert!(c.has(&perm("chat.kick")));
            assert!(!c.has(&perm("-chat.kick")));
            assert!(!c.has(&perm("chat.ban")));
        }

        #[test]
        fn test_find_prefers_most_specific() {
            let c = collection(&["a.*", "a.b.*", "a.b.c"]);
            assert_eq!(c.find(&perm("a.b.c")), Some(&entry("a.b.c")));
            assert_eq!(c.find(&perm("a.b.d")), Some(&entry("a.b.*")));
            assert_eq!(c.find(&perm("a.x")), Some(&entry("a.*")));
        }

        #[test]
        fn test_has_text() {
            let c = collection(&["a.*"]);
            assert_eq!(c.has_text("a.b"), Ok(true));
            assert!(c.has_text("a").is_err());
        }
    }

    mod evaluate {
        use super::*;

        #[test]
        fn test_most_specific_wins() {
            let c = collection(&["chat.*", "-chat.mod.*", "chat.mod.kick"]);
            assert_eq!(c.evaluate(&perm("chat.say")), Outcome::Allow);
            assert_eq!(c.evaluate(&perm("chat.mod.ban")), Outcome::Deny);
            assert_eq!(c.evaluate(&perm("chat.mod.kick")), Outcome::Allow);
            assert_eq!(c.evaluate(&perm("-chat.mod.kick")), Outcome::Allow);
            assert_eq!(c.evaluate(&perm("voice.join")), Outcome::Unknown);
        }

        #[test]
        fn test_deny_wins_tie() {
            let c = collection(&["a.b", "-a.b", "x.*", "-x.*"]);
            assert_eq!(c.evaluate(&perm("a.b")), Outcome::Deny);
            assert_eq!(c.evaluate(&perm("x.y")), Outcome::Deny);
        }

        #[test]
        fn test_clusters_take_part() {
            let mut c = collection(&["chat.*"]);
            c.add(cluster("-muted", &["chat.say.*"])).unwrap();
            assert_eq!(c.evaluate(&perm("chat.say.global")), Outcome::Deny);
            assert_eq!(c.evaluate(&perm("chat.join")), Outcome::Allow);
        }
    }

    mod transforms {
        use super::*;

        #[test]
        fn test_clean_scenario() {
            let mut c = collection(&["a.b.c", "-a.b.c", "a.b.*", "a.c.d"]);
            let events = record(&mut c);
            c.clean();
            assert_eq!(texts(c.entries()), vec!["-a.b.c", "a.b.*", "a.c.d"]);
            let events = events.lock().unwrap();
            assert_eq!(events[0].kind, ChangeKind::Clean);
            assert_eq!(texts(&events[0].affected), vec!["a.b.c"]);
        }

        #[test]
        fn test_clean_reports_duplicates_and_pruned_clusters() {
            let mut c = collection(&["x.y", "x.y", "a.*"]);
            c.add(cluster("mods", &["a.b", "q.r"])).unwrap();
            let events = record(&mut c);
            c.clean();
            assert_eq!(texts(c.entries()), vec!["x.y", "a.*", "mods"]);

            let events = events.lock().unwrap();
            let affected = &events[0].affected;
            assert_eq!(texts(affected), vec!["x.y", "mods"]);
            assert_eq!(affected[1], PermissionEntry::Cluster(cluster("mods", &["q.r"])));
            assert_eq!(events[0].total_after, 3);
        }

        #[test]
        fn test_clean_is_idempotent() {
            let mut c = collection(&["a.b.*", "a.*", "a.b.c", "-a.b.c", "a.*", "q.r"]);
            c.clean();
            let once = texts(c.entries());
            c.clean();
            assert_eq!(texts(c.entries()), once);
        }

        #[test]
        fn test_sort_is_stable_and_preserves_entries() {
            let mut c = collection(&["b.*", "z.z", "-a.*", "-q.q", "a.a", "a.*"]);
            c.sort();
            let once = texts(c.entries());
            assert_eq!(once, vec!["-q.q", "a.a", "z.z", "-a.*", "a.*", "b.*"]);
            c.sort();
            assert_eq!(texts(c.entries()), once);
        }

        #[test]
        fn test_invert_and_negate() {
            let mut c = collection(&["a.b", "-c.*"]);
            assert_eq!(texts(&c.inverted()), vec!["-a.b", "c.*"]);
            assert_eq!(texts(&c.negated(true)), vec!["-a.b", "-c.*"]);
            c.invert();
            assert_eq!(texts(c.entries()), vec!["-a.b", "c.*"]);
            c.negate(false);
            assert_eq!(texts(c.entries()), vec!["a.b", "c.*"]);
            assert_eq!(c.revision(), 2);
        }

        #[test]
        fn test_where_variants() {
            let mut c = collection(&["a.b", "a.c", "-x.*"]);
            c.invert_where(|entry| entry.permission() == "a.b");
            assert_eq!(texts(c.entries()), vec!["-a.b", "a.c", "-x.*"]);
            c.negate_where(|entry| entry.is_node(), true);
            assert_eq!(texts(c.entries()), vec!["-a.b", "-a.c", "-x.*"]);
            c.unnegate_where(|entry| entry.is_group());
            assert_eq!(texts(c.entries()), vec!["-a.b", "-a.c", "x.*"]);
            c.force_group_where(|entry| entry.permission() == "a.c");
            assert_eq!(texts(c.entries()), vec!["-a.b", "-a.*", "x.*"]);
            assert_eq!(c.revision(), 4);

            c.invert_where(|_| false);
            assert_eq!(c.revision(), 4);
        }

        #[test]
        fn test_force_group() {
            let mut c = collection(&["a.b.c", "-x.y", "q.*"]);
            c.force_group();
            assert_eq!(texts(c.entries()), vec!["a.b.*", "-x.*", "q.*"]);
        }

        #[test]
        fn test_selections() {
            let mut c = collection(&["a.b", "-a.*", "-c.d"]);
            c.add(cluster("mods", &[])).unwrap();
            assert_eq!(texts(&c.groups_only()), vec!["-a.*"]);
            assert_eq!(texts(&c.leaves_only()), vec!["a.b", "-c.d"]);
            assert_eq!(texts(&c.negated_only()), vec!["-a.*", "-c.d"]);
            assert_eq!(texts(&c.unnegated_only()), vec!["a.b", "mods"]);
        }

        #[test]
        fn test_touch() {
            let mut c = collection(&["a.b"]);
            let events = record(&mut c);
            c.touch();
            assert_eq!(c.revision(), 1);
            assert_eq!(events.lock().unwrap()[0].kind, ChangeKind::Touch);
        }
    }

    mod cache {
        use super::*;

        #[test]
        fn test_views_are_memoized() {
            let c = collection(&["b.b", "a.a"]);
            let first = c.sorted();
            let second = c.sorted();
            assert!(Arc::ptr_eq(&first, &second));
            assert_eq!(c.cached_views(), 1);
        }

        #[test]
        fn test_mutation_invalidates() {
            let mut c = collection(&["b.b", "a.a"]);
            let before = c.sorted();
            let _ = c.cleaned();
            assert_eq!(c.cached_views(), 2);

            c.add("0k.bad").unwrap_err();
            assert_eq!(c.cached_views(), 2);

            c.add("c.c").unwrap();
            assert_eq!(c.cached_views(), 0);
            let after = c.sorted();
            assert!(!Arc::ptr_eq(&before, &after));
            assert_eq!(texts(&after), vec!["a.a", "b.b", "c.c"]);
        }

        #[test]
        fn test_reset_forces_recompute() {
            let c = collection(&["a.a"]);
            let before = c.inverted();
            c.reset_cache();
            assert_eq!(c.cached_views(), 0);
            assert_eq!(c.revision(), 0);
            let after = c.inverted();
            assert!(!Arc::ptr_eq(&before, &after));
            assert_eq!(before, after);
        }

        #[test]
        fn test_collection_is_send() {
            fn assert_send<T: Send>() {}
            assert_send::<PermissionCollection>();
        }
    }

    mod listeners {
        use super::*;

        struct Faulty;

        impl ChangeListener for Faulty {
            fn notify(&self, _event: &ChangeEvent) {
                panic!("listener failure");
            }
        }

        #[test]
        fn test_unsubscribe() {
            let mut c = PermissionCollection::new("alice");
            let events = Arc::new(Mutex::new(0));
            let sink = Arc::clone(&events);
            let id = c.subscribe(move |_: &ChangeEvent| *sink.lock().unwrap() += 1);
            c.touch();
            assert!(c.unsubscribe(id));
            assert!(!c.unsubscribe(id));
            c.touch();
            assert_eq!(*events.lock().unwrap(), 1);
        }

        #[test]
        fn test_panicking_listener_is_isolated() {
            let mut c = PermissionCollection::new("alice");
            c.subscribe(Faulty);
            let events = record(&mut c);

            c.add("a.b").unwrap();
            assert_eq!(texts(c.entries()), vec!["a.b"]);
            assert_eq!(c.revision(), 1);
            assert_eq!(events.lock().unwrap().len(), 1);

            c.add("c.d").unwrap();
            assert_eq!(c.revision(), 2);
            assert_eq!(events.lock().unwrap().len(), 2);
        }
    }
}
