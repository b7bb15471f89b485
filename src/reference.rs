//! Reference: one mutable edge from a container slot to an object.
//!
//! A reference names its slot by position (arrays) or key (dictionaries and
//! streams) instead of borrowing the container, so collections of
//! references can be held across mutations of the graph and replayed later.

use crate::error::{Error, Result};
use crate::graph::{ObjectGraph, Resolved};
use crate::object::{Name, Object, ObjectId, Value};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    Index { from: ObjectId, index: usize },
    Key { from: ObjectId, key: Name },
}

/// Slot identifier within the source container.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot<'a> {
    Index(usize),
    Key(&'a Name),
}

impl Reference {
    /// The container holding this edge.
    pub fn source(&self) -> ObjectId {
        match self {
            Reference::Index { from, .. } | Reference::Key { from, .. } => *from,
        }
    }

    pub fn slot(&self) -> Slot<'_> {
        match self {
            Reference::Index { index, .. } => Slot::Index(*index),
            Reference::Key { key, .. } => Slot::Key(key),
        }
    }

    /// Raw slot content, before indirection is followed.
    pub fn value<'g>(&self, graph: &'g ObjectGraph) -> Result<&'g Value> {
        let stale = || Error::StaleReference {
            from: self.source(),
        };
        let object = graph.get(self.source()).ok_or_else(stale)?;
        match (self, object) {
            (Reference::Index { index, .. }, Object::Array(items)) => {
                items.get(*index).ok_or_else(stale)
            }
            (Reference::Key { key, .. }, obj) => {
                obj.as_dict().and_then(|d| d.get(key)).ok_or_else(stale)
            }
            _ => Err(stale()),
        }
    }

    /// The object this edge currently leads to, aliases followed.
    pub fn target<'g>(&self, graph: &'g ObjectGraph) -> Result<Resolved<'g>> {
        graph.resolve(self.value(graph)?)
    }

    /// Fails with `StaleReference` if the slot is gone.
    pub fn check(&self, graph: &ObjectGraph) -> Result<()> {
        self.value(graph).map(|_| ())
    }

    /// Point the slot at `to`, replacing whatever alias or id it held.
    pub fn retarget(&self, graph: &mut ObjectGraph, to: ObjectId) -> Result<()> {
        let from = self.source();
        let slot = match (self, graph.get_mut(from)) {
            (Reference::Index { index, .. }, Some(Object::Array(items))) => items.get_mut(*index),
            (Reference::Key { key, .. }, Some(obj)) => obj
                .as_dict_mut()
                .and_then(|d| d.get_mut(key)),
            _ => None,
        };
        let slot = slot.ok_or(Error::StaleReference { from })?;
        *slot = Value::Ref(to);
        Ok(())
    }
}
