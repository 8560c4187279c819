use crate::entry::PermissionEntry;

/// What kind of mutation produced a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Clear,
    Sort,
    Clean,
    Inverse,
    Negate,
    ForceGroup,
    Touch,
}

/// A record of one committed mutation, delivered to every listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Entries added, removed, or rewritten by the mutation. A `Clean` event
    /// lists removed entries first, then clusters in their pruned form.
    pub affected: Vec<PermissionEntry>,
    /// Raw inputs that were rejected, for `Add` and `Remove`.
    pub failed: Vec<String>,
    /// Entry count after the mutation.
    pub total_after: usize,
    /// Collection revision after the mutation.
    pub revision: u64,
}

/// Receives change notifications from a
/// [`PermissionCollection`](crate::PermissionCollection).
///
/// Listeners run synchronously after the mutation is committed. Any
/// `Fn(&ChangeEvent) + Send` closure is a listener.
pub trait ChangeListener: Send {
    fn notify(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send,
{
    fn notify(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);
