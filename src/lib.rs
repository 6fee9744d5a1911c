// MyMusic Undo - snapshot-based undo/redo for observable entity graphs
//
// Applications describe their editable objects through the Entity contract
// and wrap edits in begin_action/end_action; the engine captures the
// reachable graph before and after, diffs the two captures into a minimal
// reversible delta, and replays deltas on undo/redo. History is strictly
// linear and lives in process memory only.

pub mod entity;
pub mod history;

// Re-export commonly used types for convenience
pub use entity::{Attribute, Entity, EntityId, EntityRef, Value, ValueError};
pub use history::{
    Action, ActionStack, Captured, CommitTimer, InstantTimer, ManualTimer, Slot, Snapshot,
    StateKey, UndoManager,
};
