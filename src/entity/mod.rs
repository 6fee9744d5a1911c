// Entity model - the contract every undoable object satisfies
//
// The engine never learns anything about tracks, notes or devices beyond
// this surface: a stable identity, a fixed table of attribute descriptors,
// get/set by attribute name, and three optional structural capabilities
// (a proxy's backing entity, an ordered child sequence, in-place sequence
// replacement). Attribute tables are explicit static declarations per type;
// there is no runtime discovery of members.

pub mod value;

pub use value::{Value, ValueError};

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared handle to an entity participating in the editable graph
///
/// The engine is single-threaded (it runs on the same logical thread as the
/// event loop that mutates the graph), so handles are `Rc` and mutation goes
/// through interior mutability inside concrete entity types.
pub type EntityRef = Rc<dyn Entity>;

/// Stable identity of an entity, usable as a map key
///
/// Two handles to the same logical entity must report equal ids. Identity is
/// distinct from value equality: two notes with identical pitch and time are
/// still different entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocate a fresh process-unique id
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EntityId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Build an id from a value the application already manages
    pub const fn from_raw(raw: u64) -> Self {
        EntityId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Descriptor for one declared attribute of an entity type
///
/// Every declared attribute has a getter. Only attributes marked settable
/// are captured into snapshots and restored on undo/redo; read-only
/// attributes stay visible to the graph walker (entity-valued ones are
/// still traversed) but are never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub settable: bool,
}

impl Attribute {
    /// Declare an attribute with a getter and a setter
    pub const fn writable(name: &'static str) -> Self {
        Attribute {
            name,
            settable: true,
        }
    }

    /// Declare an attribute with a getter only
    pub const fn read_only(name: &'static str) -> Self {
        Attribute {
            name,
            settable: false,
        }
    }
}

/// A participant in the editable graph
///
/// Entities form a graph, not a tree: back-references (a note pointing at
/// its track, a connection at its endpoints) are legal and handled by the
/// walker's cycle guard.
///
/// The engine only ever calls [`set`](Entity::set) with names the type
/// declares as settable, so implementations dispatch on exactly those names
/// and need no guard for the rest.
pub trait Entity {
    /// Stable identity for map lookup and cycle detection
    fn identity(&self) -> EntityId;

    /// The fixed attribute table of this entity type
    fn attributes(&self) -> &'static [Attribute];

    /// Read the current value of a declared attribute
    fn get(&self, name: &str) -> Value;

    /// Write a declared settable attribute
    fn set(&self, name: &str, value: Value);

    /// Backing entity of a proxy (a view wrapping its model)
    ///
    /// When present, capturing the proxy also captures the backing entity's
    /// state, so editing through the wrapper stays fully undoable.
    fn backing(&self) -> Option<EntityRef> {
        None
    }

    /// Ordered child entities, for sequence-valued entities
    ///
    /// When present, the walker captures each child and records the ordered
    /// membership of the sequence as a single unit, so insertions, removals
    /// and reordering are all reversible.
    fn sequence(&self) -> Option<Vec<EntityRef>> {
        None
    }

    /// Replace the sequence contents in place
    ///
    /// Called during replay for entities that report a sequence: clear the
    /// container, then reinsert the given entities in order. The container
    /// itself keeps its identity across undo/redo. Types returning `Some`
    /// from [`sequence`](Entity::sequence) must implement this.
    fn replace_sequence(&self, items: &[EntityRef]) {
        let _ = items;
    }
}
