// ActionStack - linear, position-addressed history of committed actions
//
// One sequence of actions plus a cursor. Undo replays the action just
// before the cursor and steps back; redo replays the action at the cursor
// and steps forward. Pushing while the cursor sits mid-history discards
// everything at and past the cursor: no redo branch survives a new edit.
//
// # Memory Management
// The stack limits how many actions it keeps. When the limit is reached,
// the oldest action is dropped from the front and the cursor shifts with it.

use std::collections::VecDeque;

use crate::history::action::Action;

/// Default maximum number of actions to keep in history
const DEFAULT_MAX_HISTORY: usize = 100;

/// Linear undo/redo history with a position cursor
///
/// Invariants: `position` stays in `[0, len]`; undo is possible exactly
/// when `position > 0`, redo exactly when `position < len`.
pub struct ActionStack {
    /// Committed actions, oldest at the front
    actions: VecDeque<Action>,

    /// Cursor into `actions`: everything before it is undoable, everything
    /// at and after it is redoable
    position: usize,

    /// Maximum number of actions to keep
    max_history: usize,
}

impl ActionStack {
    /// Create a stack with the default history limit
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    /// Create a stack with a custom history limit
    pub fn with_capacity(max_history: usize) -> Self {
        ActionStack {
            actions: VecDeque::new(),
            position: 0,
            max_history,
        }
    }

    /// Append a committed action at the cursor
    ///
    /// Discards any actions at indices >= the cursor first (a new edit
    /// invalidates the redo branch), then trims the front if the history
    /// limit is exceeded.
    pub fn push(&mut self, action: Action) {
        self.actions.truncate(self.position);
        self.actions.push_back(action);
        self.position = self.actions.len();

        if self.actions.len() > self.max_history {
            self.actions.pop_front();
            self.position -= 1;
        }
    }

    /// Replay the previous action's undo payload and step back
    ///
    /// Returns `false` without touching anything when there is nothing to
    /// undo.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.position -= 1;
        self.actions[self.position].undo_state().restore();
        true
    }

    /// Replay the next action's redo payload and step forward
    ///
    /// Returns `false` without touching anything when there is nothing to
    /// redo.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.actions[self.position].redo_state().restore();
        self.position += 1;
        true
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.actions.len()
    }

    /// Number of actions that can currently be undone
    pub fn undo_count(&self) -> usize {
        self.position
    }

    /// Number of actions that can currently be redone
    pub fn redo_count(&self) -> usize {
        self.actions.len() - self.position
    }

    /// Total number of actions held
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.actions.clear();
        self.position = 0;
    }
}

impl Default for ActionStack {
    fn default() -> Self {
        Self::new()
    }
}
