// Action - a committed, reversible delta between two snapshots

use crate::history::snapshot::Snapshot;

/// An immutable pair of pruned snapshots: undo payload and redo payload
///
/// Built by diffing the before/after captures of one transaction. Keys with
/// equal content on both sides are pruned first; an action whose payloads
/// both end up empty is never constructed, so every action on the stack
/// represents a real change. After pruning, a key surviving on one side only
/// belongs to an entity that entered or left reachability, which the
/// membership entry of its container carries.
pub struct Action {
    undo: Snapshot,
    redo: Snapshot,
}

impl Action {
    /// Diff two captures of the same root set into a reversible action
    ///
    /// Returns `None` when nothing changed between the captures, so no-op
    /// edits never reach the stack.
    pub fn from_states(mut before: Snapshot, mut after: Snapshot) -> Option<Action> {
        Snapshot::prune_equal(&mut before, &mut after);
        if before.is_empty() && after.is_empty() {
            return None;
        }
        Some(Action {
            undo: before,
            redo: after,
        })
    }

    /// Snapshot replayed to move the graph backward over this action
    pub fn undo_state(&self) -> &Snapshot {
        &self.undo
    }

    /// Snapshot replayed to move the graph forward over this action
    pub fn redo_state(&self) -> &Snapshot {
        &self.redo
    }
}
