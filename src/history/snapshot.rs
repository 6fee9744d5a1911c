// Snapshot capture - cycle-safe graph walker producing flat state maps
//
// A snapshot is one full traversal of a root set flattened into
// StateKey -> Captured entries, plus the handles needed to write the state
// back during replay. Capture is a pure read; replay pushes every entry
// back through the entity setters.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::entity::{EntityId, EntityRef, Value};

/// Which piece of an entity's state a key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    /// One named settable attribute
    Attribute(&'static str),
    /// The ordered membership of a sequence-valued entity, as a single unit
    ///
    /// Individual-attribute diffs cannot express insertions, removals or
    /// reordering of children; this slot captures them in one entry.
    Sequence,
}

/// Address of one captured piece of state: (entity identity, slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKey {
    pub entity: EntityId,
    pub slot: Slot,
}

impl StateKey {
    pub fn attribute(entity: EntityId, name: &'static str) -> Self {
        StateKey {
            entity,
            slot: Slot::Attribute(name),
        }
    }

    pub fn sequence(entity: EntityId) -> Self {
        StateKey {
            entity,
            slot: Slot::Sequence,
        }
    }
}

/// The captured content behind a state key
#[derive(Clone)]
pub enum Captured {
    /// Value of a settable attribute, stored by copy
    Attribute(Value),
    /// Ordered members of a sequence, compared by identity
    Members(Vec<EntityRef>),
}

impl PartialEq for Captured {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Captured::Attribute(a), Captured::Attribute(b)) => a == b,
            (Captured::Members(a), Captured::Members(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.identity() == y.identity())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Captured::Attribute(value) => f.debug_tuple("Attribute").field(value).finish(),
            Captured::Members(items) => {
                let ids: Vec<EntityId> = items.iter().map(|e| e.identity()).collect();
                f.debug_tuple("Members").field(&ids).finish()
            }
        }
    }
}

/// Full captured state of a root set at one instant
///
/// Entries live in a `BTreeMap` so iteration order is deterministic. The
/// handle map keeps an `Rc` to every entity that still owns an entry, which
/// both lets replay reach the setters without a global registry and keeps
/// entities referenced by history alive after the application removes them
/// from the graph.
pub struct Snapshot {
    entries: BTreeMap<StateKey, Captured>,
    handles: HashMap<EntityId, EntityRef>,
}

impl Snapshot {
    /// Walk the graph reachable from `roots` and capture its mutable state
    ///
    /// The visited-identity set is mandatory: the graph is not guaranteed
    /// acyclic (parent/child back-references, connection endpoints), and
    /// each entity contributes its state exactly once.
    pub fn capture(roots: &[EntityRef]) -> Self {
        let mut snapshot = Snapshot {
            entries: BTreeMap::new(),
            handles: HashMap::new(),
        };
        let mut visited = HashSet::new();
        for root in roots {
            snapshot.visit(root, &mut visited);
        }
        snapshot
    }

    fn visit(&mut self, entity: &EntityRef, visited: &mut HashSet<EntityId>) {
        let id = entity.identity();
        if !visited.insert(id) {
            return;
        }
        self.handles.insert(id, entity.clone());

        for attr in entity.attributes() {
            let value = entity.get(attr.name);
            self.visit_value(&value, visited);
            if attr.settable {
                self.entries
                    .insert(StateKey::attribute(id, attr.name), Captured::Attribute(value));
            }
        }

        if let Some(backing) = entity.backing() {
            self.visit(&backing, visited);
        }

        if let Some(items) = entity.sequence() {
            for item in &items {
                self.visit(item, visited);
            }
            self.entries
                .insert(StateKey::sequence(id), Captured::Members(items));
        }
    }

    // Entities may be nested anywhere inside a value (a reference attribute,
    // a list of selected objects); all of them join the traversal.
    fn visit_value(&mut self, value: &Value, visited: &mut HashSet<EntityId>) {
        match value {
            Value::Entity(child) => self.visit(child, visited),
            Value::List(items) => {
                for item in items {
                    self.visit_value(item, visited);
                }
            }
            Value::Map(map) => {
                for item in map.values() {
                    self.visit_value(item, visited);
                }
            }
            _ => {}
        }
    }

    /// Write every entry back through the entity setters
    ///
    /// Attribute entries go through [`Entity::set`]; membership entries
    /// replace the target sequence's contents in place, preserving the
    /// container while restoring membership and order exactly.
    pub fn restore(&self) {
        for (key, captured) in &self.entries {
            let Some(target) = self.handles.get(&key.entity) else {
                continue;
            };
            match (key.slot, captured) {
                (Slot::Attribute(name), Captured::Attribute(value)) => {
                    target.set(name, value.clone());
                }
                (Slot::Sequence, Captured::Members(items)) => {
                    target.replace_sequence(items);
                }
                _ => debug_assert!(false, "state key does not match its captured content"),
            }
        }
    }

    /// Remove every key present in both snapshots with equal content
    ///
    /// This is the diff core: what survives in `before` is the undo payload,
    /// what survives in `after` the redo payload. Handles for entities that
    /// no longer own any entry are released.
    pub fn prune_equal(before: &mut Snapshot, after: &mut Snapshot) {
        let shared: Vec<StateKey> = after
            .entries
            .iter()
            .filter(|(key, value)| before.entries.get(key).is_some_and(|b| b == *value))
            .map(|(key, _)| *key)
            .collect();
        for key in &shared {
            before.entries.remove(key);
            after.entries.remove(key);
        }
        before.drop_unreferenced_handles();
        after.drop_unreferenced_handles();
    }

    fn drop_unreferenced_handles(&mut self) {
        let live: HashSet<EntityId> = self.entries.keys().map(|key| key.entity).collect();
        self.handles.retain(|id, _| live.contains(id));
    }

    pub fn get(&self, key: &StateKey) -> Option<&Captured> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &StateKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in deterministic (sorted) order
    pub fn keys(&self) -> impl Iterator<Item = &StateKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("entries", &self.entries)
            .finish()
    }
}
