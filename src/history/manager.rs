// UndoManager - transaction lifecycle, coalescing and change notification
//
// The manager owns the begin/end lifecycle around edits. It moves through
// three states:
// - Idle: no capture taken
// - Open: a before-snapshot exists, commit happens on end_action
// - Pending-Coalesce: Open, with an armed deferred-commit deadline
//
// A caller opens a transaction over a root set, mutates entities directly,
// then closes it; the manager diffs the two captures and pushes the result.
// Rapid successive edits (a drag gesture, one raw event per pixel) pass a
// timeout so they coalesce into a single action that commits when editing
// pauses.
//
// Each manager is owned by one document/session; separate documents keep
// fully independent histories.

use std::time::Duration;

use crate::entity::EntityRef;
use crate::history::action::Action;
use crate::history::snapshot::Snapshot;
use crate::history::stack::ActionStack;
use crate::history::timer::{CommitTimer, InstantTimer};

/// A capture waiting for its closing end_action
struct OpenTransaction {
    roots: Vec<EntityRef>,
    before: Snapshot,
}

/// Undo/redo front door for one document
pub struct UndoManager {
    stack: ActionStack,
    open: Option<OpenTransaction>,
    timer: Box<dyn CommitTimer>,
    context: Vec<EntityRef>,
    observers: Vec<Box<dyn Fn()>>,
}

impl UndoManager {
    /// Create a manager with the default history limit and wall-clock timer
    pub fn new() -> Self {
        UndoManager {
            stack: ActionStack::new(),
            open: None,
            timer: Box::new(InstantTimer::new()),
            context: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Create a manager with a custom history limit
    pub fn with_capacity(max_history: usize) -> Self {
        UndoManager {
            stack: ActionStack::with_capacity(max_history),
            ..UndoManager::new()
        }
    }

    /// Replace the deferred-commit timer
    ///
    /// Hosts with their own event loop plug in a timer over it; tests plug
    /// in a [`ManualTimer`](crate::history::timer::ManualTimer) clone and
    /// drive it as a fake clock.
    pub fn set_timer(&mut self, timer: Box<dyn CommitTimer>) {
        self.timer = timer;
    }

    /// Entities captured with every transaction in addition to its roots
    ///
    /// Cross-cutting state such as a selection model goes here, so a
    /// selection change caused by an edit is undone together with the edit
    /// itself.
    pub fn set_context(&mut self, context: Vec<EntityRef>) {
        self.context = context;
    }

    /// Register a history-changed callback
    ///
    /// Fired after every begin/commit/undo/redo/reset so UI affordances
    /// (menu enablement, dirty markers) can refresh. Callbacks receive no
    /// payload; observers query the manager for whatever they need.
    pub fn add_observer(&mut self, observer: impl Fn() + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Open a transaction over `roots`, capturing their state
    ///
    /// With a `timeout`, the commit is deferred: the transaction commits
    /// when the deadline passes with no further activity. Calling again
    /// with a `timeout` while the deadline is armed is a continuation: the
    /// deadline restarts and the original before-snapshot is kept, so the
    /// whole burst of edits becomes one action.
    ///
    /// Re-entering while a transaction is open and no deadline is armed
    /// force-commits the open transaction first. Callers should still treat
    /// unmatched begin/end pairs as a usage bug; the force-commit only keeps
    /// the history consistent when it happens.
    pub fn begin_action(&mut self, roots: &[EntityRef], timeout: Option<Duration>) {
        if let Some(timeout) = timeout {
            if self.open.is_some() && self.timer.is_armed() {
                log::trace!(target: "undo", "coalescing continuation, deadline extended");
                self.timer.arm(timeout);
                return;
            }
        }
        if self.open.is_some() {
            log::debug!(target: "undo", "begin_action while open, force-committing");
            self.end_action();
        }

        let mut roots = roots.to_vec();
        roots.extend(self.context.iter().cloned());
        let before = Snapshot::capture(&roots);
        log::trace!(target: "undo", "transaction opened over {} state keys", before.len());

        self.open = Some(OpenTransaction { roots, before });
        if let Some(timeout) = timeout {
            self.timer.arm(timeout);
        }
        self.notify();
    }

    /// Close the open transaction, diff it and push the result
    ///
    /// Also the commit path when a coalescing deadline fires. A no-op edit
    /// pushes nothing. Calling with no transaction open is tolerated as a
    /// no-op, since a host timer callback can arrive after a force-commit
    /// already closed the transaction.
    pub fn end_action(&mut self) {
        self.timer.disarm();
        let Some(open) = self.open.take() else {
            return;
        };

        let after = Snapshot::capture(&open.roots);
        match Action::from_states(open.before, after) {
            Some(action) => {
                log::debug!(
                    target: "undo",
                    "committed action, {} keys changed, history depth {}",
                    action.redo_state().len().max(action.undo_state().len()),
                    self.stack.len() + 1,
                );
                self.stack.push(action);
            }
            None => log::trace!(target: "undo", "transaction closed with no changes"),
        }
        self.notify();
    }

    /// Commit the open transaction if its coalescing deadline has passed
    ///
    /// Entry point for polling hosts that drive the manager once per frame.
    pub fn commit_expired(&mut self) {
        if self.open.is_some() && self.timer.is_expired() {
            log::trace!(target: "undo", "coalescing deadline expired");
            self.end_action();
        }
    }

    /// Undo the most recent action
    ///
    /// An open transaction is committed first, so an in-flight coalescing
    /// gesture becomes the action being undone. Returns `false` when there
    /// is nothing to undo.
    pub fn undo(&mut self) -> bool {
        if self.open.is_some() {
            self.end_action();
        }
        let done = self.stack.undo();
        self.notify();
        done
    }

    /// Redo the most recently undone action
    ///
    /// Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        if self.open.is_some() {
            self.end_action();
        }
        let done = self.stack.redo();
        self.notify();
        done
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    /// Number of actions that can currently be undone
    pub fn undo_count(&self) -> usize {
        self.stack.undo_count()
    }

    /// Number of actions that can currently be redone
    pub fn redo_count(&self) -> usize {
        self.stack.redo_count()
    }

    /// Discard all history and any in-flight transaction
    ///
    /// Cancels a pending coalescing deadline without committing it; nothing
    /// partial reaches the stack. Called when switching documents.
    pub fn reset(&mut self) {
        log::debug!(target: "undo", "history reset");
        self.timer.disarm();
        self.open = None;
        self.stack.clear();
        self.notify();
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer();
        }
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Attribute, Entity, EntityId, Value};
    use crate::history::timer::ManualTimer;
    use std::cell::Cell;
    use std::rc::Rc;

    const KNOB_ATTRS: &[Attribute] = &[Attribute::writable("value")];

    struct Knob {
        id: EntityId,
        value: Cell<f64>,
    }

    impl Knob {
        fn create(value: f64) -> Rc<Knob> {
            Rc::new(Knob {
                id: EntityId::fresh(),
                value: Cell::new(value),
            })
        }
    }

    impl Entity for Knob {
        fn identity(&self) -> EntityId {
            self.id
        }

        fn attributes(&self) -> &'static [Attribute] {
            KNOB_ATTRS
        }

        fn get(&self, name: &str) -> Value {
            match name {
                "value" => Value::Float(self.value.get()),
                _ => Value::None,
            }
        }

        fn set(&self, name: &str, value: Value) {
            match name {
                "value" => self.value.set(f64::try_from(value).expect("float value")),
                other => unreachable!("unknown settable attribute {other}"),
            }
        }
    }

    fn manual_manager() -> (UndoManager, ManualTimer) {
        let timer = ManualTimer::new();
        let mut manager = UndoManager::new();
        manager.set_timer(Box::new(timer.clone()));
        (manager, timer)
    }

    #[test]
    fn test_commit_pushes_one_action() {
        let knob = Knob::create(0.0);
        let mut manager = UndoManager::new();

        manager.begin_action(&[knob.clone() as EntityRef], None);
        knob.value.set(1.0);
        manager.end_action();

        assert_eq!(manager.undo_count(), 1);
        assert!(manager.can_undo());
        assert!(!manager.can_redo());
    }

    #[test]
    fn test_noop_transaction_pushes_nothing() {
        let knob = Knob::create(0.0);
        let mut manager = UndoManager::new();

        manager.begin_action(&[knob.clone() as EntityRef], None);
        manager.end_action();

        assert_eq!(manager.undo_count(), 0);
        assert!(!manager.can_undo());
    }

    #[test]
    fn test_reentrant_begin_force_commits() {
        let knob = Knob::create(0.0);
        let mut manager = UndoManager::new();
        let roots = [knob.clone() as EntityRef];

        manager.begin_action(&roots, None);
        knob.value.set(1.0);
        // unmatched begin: the first transaction commits before the second opens
        manager.begin_action(&roots, None);
        knob.value.set(2.0);
        manager.end_action();

        assert_eq!(manager.undo_count(), 2);
        manager.undo();
        assert_eq!(knob.value.get(), 1.0);
        manager.undo();
        assert_eq!(knob.value.get(), 0.0);
    }

    #[test]
    fn test_end_action_while_idle_is_a_noop() {
        let mut manager = UndoManager::new();
        manager.end_action();
        assert_eq!(manager.undo_count(), 0);
    }

    #[test]
    fn test_coalescing_merges_a_burst_into_one_action() {
        let knob = Knob::create(0.0);
        let (mut manager, timer) = manual_manager();
        let roots = [knob.clone() as EntityRef];
        let timeout = Duration::from_millis(250);

        manager.begin_action(&roots, Some(timeout));
        knob.value.set(1.0);
        timer.advance(Duration::from_millis(100));

        manager.begin_action(&roots, Some(timeout));
        knob.value.set(2.0);

        // deadline was extended, nothing commits yet
        timer.advance(Duration::from_millis(100));
        manager.commit_expired();
        assert_eq!(manager.undo_count(), 0);

        timer.advance(Duration::from_millis(150));
        manager.commit_expired();

        assert_eq!(manager.undo_count(), 1);
        manager.undo();
        assert_eq!(knob.value.get(), 0.0);
        manager.redo();
        assert_eq!(knob.value.get(), 2.0);
    }

    #[test]
    fn test_plain_begin_flushes_a_pending_coalesce() {
        let knob = Knob::create(0.0);
        let (mut manager, _timer) = manual_manager();
        let roots = [knob.clone() as EntityRef];

        manager.begin_action(&roots, Some(Duration::from_millis(250)));
        knob.value.set(1.0);

        // an unrelated transaction starts: the pending one commits now
        manager.begin_action(&roots, None);
        assert_eq!(manager.undo_count(), 1);

        knob.value.set(2.0);
        manager.end_action();
        assert_eq!(manager.undo_count(), 2);
    }

    #[test]
    fn test_undo_flushes_the_open_transaction() {
        let knob = Knob::create(0.0);
        let (mut manager, _timer) = manual_manager();
        let roots = [knob.clone() as EntityRef];

        manager.begin_action(&roots, Some(Duration::from_millis(250)));
        knob.value.set(1.0);

        // undo mid-gesture: the gesture commits, then gets undone
        assert!(manager.undo());
        assert_eq!(knob.value.get(), 0.0);
        assert!(manager.can_redo());
    }

    #[test]
    fn test_reset_discards_pending_without_committing() {
        let knob = Knob::create(0.0);
        let (mut manager, timer) = manual_manager();
        let roots = [knob.clone() as EntityRef];

        manager.begin_action(&roots, Some(Duration::from_millis(250)));
        knob.value.set(1.0);
        manager.reset();

        // the deadline is gone and nothing partial was pushed
        timer.advance(Duration::from_millis(500));
        manager.commit_expired();
        assert_eq!(manager.undo_count(), 0);
        assert!(!manager.can_undo());
        // the mutation itself is untouched; only history was discarded
        assert_eq!(knob.value.get(), 1.0);
    }

    #[test]
    fn test_context_roots_ride_along() {
        let knob = Knob::create(0.0);
        let selection = Knob::create(0.0);
        let mut manager = UndoManager::new();
        manager.set_context(vec![selection.clone() as EntityRef]);

        manager.begin_action(&[knob.clone() as EntityRef], None);
        knob.value.set(1.0);
        selection.value.set(9.0);
        manager.end_action();

        manager.undo();
        assert_eq!(knob.value.get(), 0.0);
        assert_eq!(selection.value.get(), 0.0);
    }

    #[test]
    fn test_observers_fire_on_history_changes() {
        let knob = Knob::create(0.0);
        let fired = Rc::new(Cell::new(0usize));
        let mut manager = UndoManager::new();
        let counter = fired.clone();
        manager.add_observer(move || counter.set(counter.get() + 1));

        manager.begin_action(&[knob.clone() as EntityRef], None);
        knob.value.set(1.0);
        manager.end_action();
        let after_commit = fired.get();
        assert!(after_commit >= 2); // begin and end both notify

        manager.undo();
        assert!(fired.get() > after_commit);

        manager.reset();
        assert!(fired.get() > after_commit + 1);
    }
}
