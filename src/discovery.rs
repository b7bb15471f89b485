//! Breadth-first discovery of composite objects and their incoming edges.

use crate::error::{Error, Result};
use crate::graph::{ObjectGraph, Resolved};
use crate::object::ObjectId;
use crate::reference::Reference;
use hashbrown::HashMap;
use tracing::debug;

/// Every composite reachable from a root, keyed by identity, with all
/// references whose resolved target is that composite.
///
/// Built fresh for each pass and dropped afterwards. The root is always a
/// key; its collection is empty unless something inside the graph points
/// back at it.
#[derive(Debug)]
pub struct DiscoveryMap {
    root: ObjectId,
    refs: HashMap<ObjectId, Vec<Reference>>,
}

impl DiscoveryMap {
    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// Number of live composites.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.refs.contains_key(&id)
    }

    pub fn references(&self, id: ObjectId) -> Option<&[Reference]> {
        self.refs.get(&id).map(Vec::as_slice)
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.refs.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &[Reference])> {
        self.refs.iter().map(|(id, refs)| (*id, refs.as_slice()))
    }

    /// Sum of all collection sizes, i.e. the number of composite-valued
    /// slots seen.
    pub fn reference_count(&self) -> usize {
        self.refs.values().map(Vec::len).sum()
    }

    /// Retire `id`: take its references out of the live set.
    pub(crate) fn retire(&mut self, id: ObjectId) -> Vec<Reference> {
        self.refs.remove(&id).unwrap_or_default()
    }

    pub(crate) fn adopt(&mut self, survivor: ObjectId, refs: Vec<Reference>) {
        self.refs.entry(survivor).or_default().extend(refs);
    }
}

/// Walk the graph from `root`, recording every composite and every edge
/// into it.
///
/// A target joins the next frontier only the first time it is seen, so
/// cycles terminate and no object is expanded twice; the edge itself is
/// recorded every time.
pub fn discover(graph: &ObjectGraph, root: ObjectId) -> Result<DiscoveryMap> {
    let kind = graph.kind(root)?;
    if !kind.is_composite() {
        return Err(Error::UnsupportedKind { id: root, kind });
    }

    let mut refs: HashMap<ObjectId, Vec<Reference>> = HashMap::new();
    refs.insert(root, Vec::new());

    let mut frontier = vec![root];
    let mut next = Vec::new();
    let mut edges = 0usize;
    while !frontier.is_empty() {
        for &id in &frontier {
            for reference in graph.slots(id)? {
                let Resolved::Composite(target) = reference.target(graph)? else {
                    continue;
                };
                refs.entry(target)
                    .or_insert_with(|| {
                        next.push(target);
                        Vec::new()
                    })
                    .push(reference);
                edges += 1;
            }
        }
        frontier.clear();
        core::mem::swap(&mut frontier, &mut next);
    }

    debug!(objects = refs.len(), edges, "discovered composite objects");
    Ok(DiscoveryMap { root, refs })
}
