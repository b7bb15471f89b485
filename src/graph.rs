//! ObjectGraph: arena that owns every object of a document.
//!
//! Objects live in a `SlotMap` keyed by [`ObjectId`]; edges are ids stored in
//! container slots. Identity is the arena key and never depends on content,
//! which is what lets discovery walk cyclic graphs with a plain visited set.

use crate::error::{Error, Result};
use crate::object::{Kind, Object, ObjectId, Scalar, Value};
use crate::reference::Reference;
use hashbrown::HashSet;
use slotmap::SlotMap;

#[derive(Debug)]
struct Entry {
    object: Object,
    // Cleared once the object took part in a merge. Consumed by writers
    // deciding whether to emit an object inline or as a standalone object.
    direct: bool,
}

/// What a slot value ultimately denotes once indirection is followed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolved<'a> {
    /// A dangling reference. Behaves like null.
    Absent,
    Scalar(&'a Scalar),
    Composite(ObjectId),
}

#[derive(Debug, Default)]
pub struct ObjectGraph {
    slots: SlotMap<ObjectId, Entry>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn insert(&mut self, object: impl Into<Object>) -> ObjectId {
        self.slots.insert(Entry {
            object: object.into(),
            direct: true,
        })
    }

    /// Insert an object that needs its own id, e.g. a dictionary pointing
    /// at itself.
    pub fn insert_with<F>(&mut self, f: F) -> ObjectId
    where
        F: FnOnce(ObjectId) -> Object,
    {
        self.slots.insert_with_key(|id| Entry {
            object: f(id),
            direct: true,
        })
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.slots.get(id).map(|e| &e.object)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.slots.get_mut(id).map(|e| &mut e.object)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Object> {
        self.slots.remove(id).map(|e| e.object)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.slots.iter().map(|(id, e)| (id, &e.object))
    }

    pub fn kind(&self, id: ObjectId) -> Result<Kind> {
        self.get(id)
            .map(Object::kind)
            .ok_or(Error::UnknownObject(id))
    }

    /// Number of arrays, dictionaries and streams stored, reachable or not.
    pub fn composite_count(&self) -> usize {
        self.slots
            .values()
            .filter(|e| e.object.kind().is_composite())
            .count()
    }

    pub fn is_direct(&self, id: ObjectId) -> Option<bool> {
        self.slots.get(id).map(|e| e.direct)
    }

    /// Returns false when `id` is not in the graph.
    pub fn set_direct(&mut self, id: ObjectId, direct: bool) -> bool {
        match self.slots.get_mut(id) {
            Some(e) => {
                e.direct = direct;
                true
            }
            None => false,
        }
    }

    /// Follow a slot value through aliases.
    pub fn resolve<'a>(&'a self, value: &'a Value) -> Result<Resolved<'a>> {
        match value {
            Value::Scalar(s) => Ok(Resolved::Scalar(s)),
            Value::Ref(id) => self.resolve_id(*id),
        }
    }

    /// Follow an object id through aliases.
    pub fn resolve_id(&self, start: ObjectId) -> Result<Resolved<'_>> {
        let mut id = start;
        // An alias chain longer than the arena must revisit an object.
        for _ in 0..=self.slots.len() {
            match self.get(id) {
                None => return Ok(Resolved::Absent),
                Some(Object::Alias(next)) => id = *next,
                Some(Object::Scalar(s)) => return Ok(Resolved::Scalar(s)),
                Some(_) => return Ok(Resolved::Composite(id)),
            }
        }
        Err(Error::IndirectionCycle(start))
    }

    /// Enumerate the slots of a container as retargetable references.
    pub fn slots(&self, id: ObjectId) -> Result<Vec<Reference>> {
        match self.get(id) {
            None => Err(Error::UnknownObject(id)),
            Some(Object::Array(items)) => Ok((0..items.len())
                .map(|index| Reference::Index { from: id, index })
                .collect()),
            Some(obj @ (Object::Dictionary(_) | Object::Stream(_))) => Ok(obj
                .as_dict()
                .into_iter()
                .flat_map(|d| d.keys())
                .map(|key| Reference::Key {
                    from: id,
                    key: key.clone(),
                })
                .collect()),
            Some(obj) => Err(Error::UnsupportedKind {
                id,
                kind: obj.kind(),
            }),
        }
    }

    /// Every object reachable from `root` by following slot references and
    /// aliases, `root` included.
    pub fn reachable_from(&self, root: ObjectId) -> Result<HashSet<ObjectId>> {
        if !self.contains(root) {
            return Err(Error::UnknownObject(root));
        }
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(object) = self.get(id) else { continue };
            if !seen.insert(id) {
                continue;
            }
            match object {
                Object::Alias(next) => stack.push(*next),
                Object::Array(items) => stack.extend(items.iter().filter_map(Value::as_ref_id)),
                Object::Dictionary(_) | Object::Stream(_) => {
                    if let Some(dict) = object.as_dict() {
                        stack.extend(dict.iter().filter_map(|(_, v)| v.as_ref_id()));
                    }
                }
                Object::Scalar(_) => {}
            }
        }
        Ok(seen)
    }

    /// Drop every object not reachable from `root`. Returns how many were
    /// removed.
    ///
    /// Objects the caller keeps outside `root` (e.g. a trailer's info
    /// dictionary) are removed too, so only use this when `root` covers the
    /// whole document.
    pub fn collect_unreachable(&mut self, root: ObjectId) -> Result<usize> {
        let live = self.reachable_from(root)?;
        let before = self.slots.len();
        self.slots.retain(|id, _| live.contains(&id));
        Ok(before - self.slots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Dictionary, Name, Stream};

    /// Invariant: alias chains resolve to the first non-alias object.
    #[test]
    fn alias_chain_resolves_to_target() {
        let mut g = ObjectGraph::new();
        let arr = g.insert(vec![Value::from(1i64)]);
        let a1 = g.insert(Object::Alias(arr));
        let a2 = g.insert(Object::Alias(a1));
        assert_eq!(g.resolve(&Value::Ref(a2)).unwrap(), Resolved::Composite(arr));

        let n = g.insert(Scalar::Integer(7));
        let a3 = g.insert(Object::Alias(n));
        assert_eq!(
            g.resolve(&Value::Ref(a3)).unwrap(),
            Resolved::Scalar(&Scalar::Integer(7))
        );
    }

    /// Invariant: an alias loop is reported instead of spinning forever.
    #[test]
    fn alias_loop_is_an_error() {
        let mut g = ObjectGraph::new();
        let a = g.insert_with(Object::Alias);
        match g.resolve_id(a) {
            Err(Error::IndirectionCycle(id)) => assert_eq!(id, a),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    /// Invariant: a reference to a removed object resolves to Absent.
    #[test]
    fn dangling_reference_is_absent() {
        let mut g = ObjectGraph::new();
        let d = g.insert(Dictionary::new());
        g.remove(d);
        assert_eq!(g.resolve(&Value::Ref(d)).unwrap(), Resolved::Absent);
    }

    /// Invariant: slots enumerate array indices and dictionary keys; scalars
    /// and aliases have none.
    #[test]
    fn slot_enumeration_by_kind() {
        let mut g = ObjectGraph::new();
        let arr = g.insert(vec![Value::NULL, Value::from(true)]);
        let dict = g.insert(Dictionary::new().with("A", 1i64).with("B", 2i64));
        let stream = g.insert(Stream::new(Dictionary::new().with("Length", 3i64), b"abc".to_vec()));
        let scalar = g.insert(Scalar::Integer(1));

        assert_eq!(
            g.slots(arr).unwrap(),
            vec![
                Reference::Index { from: arr, index: 0 },
                Reference::Index { from: arr, index: 1 },
            ]
        );
        assert_eq!(
            g.slots(dict).unwrap(),
            vec![
                Reference::Key { from: dict, key: Name::new("A") },
                Reference::Key { from: dict, key: Name::new("B") },
            ]
        );
        assert_eq!(g.slots(stream).unwrap().len(), 1);
        match g.slots(scalar) {
            Err(Error::UnsupportedKind { kind: Kind::Scalar, .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    /// Invariant: collection keeps everything reachable through slots and
    /// aliases and drops the rest.
    #[test]
    fn collect_unreachable_keeps_live_objects() {
        let mut g = ObjectGraph::new();
        let leaf = g.insert(vec![Value::from(1i64)]);
        let alias = g.insert(Object::Alias(leaf));
        let root = g.insert(Dictionary::new().with("Kids", alias));
        let orphan = g.insert(vec![Value::Ref(leaf)]);

        assert_eq!(g.collect_unreachable(root).unwrap(), 1);
        assert!(!g.contains(orphan));
        assert!(g.contains(root) && g.contains(alias) && g.contains(leaf));
    }

    /// Invariant: objects start direct; the flag round-trips and reports
    /// missing ids.
    #[test]
    fn direct_flag_bookkeeping() {
        let mut g = ObjectGraph::new();
        let d = g.insert(Dictionary::new());
        assert_eq!(g.is_direct(d), Some(true));
        assert!(g.set_direct(d, false));
        assert_eq!(g.is_direct(d), Some(false));
        g.remove(d);
        assert!(!g.set_direct(d, true));
        assert_eq!(g.is_direct(d), None);
    }
}
