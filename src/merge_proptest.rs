#![cfg(test)]

// Property tests for discovery and merging kept inside the crate so they can
// reach pass-level internals without feature gates.

use crate::discovery::{discover, DiscoveryMap};
use crate::graph::{ObjectGraph, Resolved};
use crate::hash::StructuralHasher;
use crate::merge::merge_duplicates_with;
use crate::object::{Dictionary, Object, ObjectId, Payload, Stream, Value};
use crate::optimizer::{Optimizer, Options};
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

// Node-indexed slot contents: indices shrink toward earlier nodes, small
// value ranges keep duplicates common.
#[derive(Clone, Debug)]
enum SlotSpec {
    Int(i64),
    Null,
    Dangling,
    Ref(usize),
    AliasRef(usize),
}

#[derive(Clone, Debug)]
enum NodeSpec {
    Array(Vec<SlotSpec>),
    Dict(Vec<(u8, SlotSpec)>),
    Stream(Vec<(u8, SlotSpec)>, u8),
}

const KEYS: [&str; 3] = ["A", "B", "C"];

fn arb_graph() -> impl Strategy<Value = Vec<NodeSpec>> {
    (1usize..=8).prop_flat_map(|n| {
        let slot = prop_oneof![
            (0i64..2).prop_map(SlotSpec::Int),
            Just(SlotSpec::Null),
            Just(SlotSpec::Dangling),
            (0..n).prop_map(SlotSpec::Ref),
            (0..n).prop_map(SlotSpec::Ref),
            (0..n).prop_map(SlotSpec::AliasRef),
        ];
        let entries = proptest::collection::vec((0u8..3, slot.clone()), 0..3);
        let node = prop_oneof![
            proptest::collection::vec(slot, 0..3).prop_map(NodeSpec::Array),
            entries.clone().prop_map(NodeSpec::Dict),
            (entries, 0u8..2).prop_map(|(e, p)| NodeSpec::Stream(e, p)),
        ];
        proptest::collection::vec(node, n)
    })
}

// Node 0 is the root.
fn build(shapes: &[NodeSpec]) -> (ObjectGraph, ObjectId) {
    let mut g = ObjectGraph::new();
    let ids: Vec<ObjectId> = shapes
        .iter()
        .map(|_| g.insert(Object::Array(Vec::new())))
        .collect();
    let dangling = g.insert(Dictionary::new());
    g.remove(dangling);

    let value = |g: &mut ObjectGraph, s: &SlotSpec| -> Value {
        match s {
            SlotSpec::Int(i) => Value::from(*i),
            SlotSpec::Null => Value::NULL,
            SlotSpec::Dangling => Value::Ref(dangling),
            SlotSpec::Ref(i) => Value::Ref(ids[*i]),
            SlotSpec::AliasRef(i) => Value::Ref(g.insert(Object::Alias(ids[*i]))),
        }
    };
    for (shape, &id) in shapes.iter().zip(&ids) {
        let object = match shape {
            NodeSpec::Array(slots) => {
                Object::Array(slots.iter().map(|s| value(&mut g, s)).collect())
            }
            NodeSpec::Dict(entries) => Object::Dictionary(
                entries
                    .iter()
                    .map(|(k, s)| (KEYS[*k as usize], value(&mut g, s)))
                    .collect(),
            ),
            NodeSpec::Stream(entries, payload) => {
                let dict: Dictionary = entries
                    .iter()
                    .map(|(k, s)| (KEYS[*k as usize], value(&mut g, s)))
                    .collect();
                Object::Stream(Stream::new(dict, vec![*payload; 4]))
            }
        };
        if let Some(slot) = g.get_mut(id) {
            *slot = object;
        }
    }
    (g, ids[0])
}

fn reachable_composites(g: &ObjectGraph, root: ObjectId) -> BTreeSet<ObjectId> {
    g.reachable_from(root)
        .unwrap()
        .into_iter()
        .filter(|&id| g.kind(id).map(|k| k.is_composite()).unwrap_or(false))
        .collect()
}

fn assert_map_consistent(g: &ObjectGraph, map: &DiscoveryMap) -> Result<(), TestCaseError> {
    for (id, refs) in map.iter() {
        let distinct: HashSet<_> = refs.iter().collect();
        prop_assert_eq!(distinct.len(), refs.len(), "reference recorded twice");
        for r in refs {
            prop_assert_eq!(r.target(g).unwrap(), Resolved::Composite(id));
        }
    }
    Ok(())
}

// Every scalar, name and id hashes alike, so all candidates share a bucket.
#[derive(Clone, Default)]
pub(crate) struct ConstBuildHasher;
pub(crate) struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

fn check_single_pass<S: BuildHasher>(
    shapes: &[NodeSpec],
    hasher: &StructuralHasher<S>,
) -> Result<(), TestCaseError> {
    let (mut g, root) = build(shapes);
    let mut map = discover(&g, root).unwrap();
    let before_len = map.len();
    let before_refs = map.reference_count();

    let stats = merge_duplicates_with(&mut g, &mut map, hasher).unwrap();

    // Retired objects leave the live set; nothing else does.
    prop_assert_eq!(map.len() + stats.removed, before_len);
    prop_assert!(map.contains(root));
    prop_assert!(stats.groups <= stats.removed);
    // No reference is lost or duplicated; each now leads to its key.
    prop_assert_eq!(map.reference_count(), before_refs);
    assert_map_consistent(&g, &map)?;
    // Every survivor lost its direct flag.
    let indirect = map.ids().filter(|&id| g.is_direct(id) == Some(false)).count();
    prop_assert!(stats.removed == 0 || indirect >= stats.groups);
    Ok(())
}

// Property: discovery finds exactly the reachable composites, records every
// composite-valued slot once, and terminates on cycles.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_discovery_matches_reachability(shapes in arb_graph()) {
        let (g, root) = build(&shapes);
        let map = discover(&g, root).unwrap();

        let keys: BTreeSet<ObjectId> = map.ids().collect();
        let expected = reachable_composites(&g, root);
        prop_assert_eq!(&keys, &expected);

        let mut edges = 0;
        for &id in &expected {
            for r in g.slots(id).unwrap() {
                if matches!(r.target(&g).unwrap(), Resolved::Composite(_)) {
                    edges += 1;
                }
            }
        }
        prop_assert_eq!(map.reference_count(), edges);
        assert_map_consistent(&g, &map)?;
    }
}

// Streams with equal dictionaries are equal whatever their payload; only the
// hash tells them apart.
fn same_payload(g: &ObjectGraph, a: ObjectId, b: ObjectId) -> bool {
    match (g.get(a), g.get(b)) {
        (Some(Object::Stream(x)), Some(Object::Stream(y))) => match (&x.payload, &y.payload) {
            (Payload::Bytes(p), Payload::Bytes(q)) => p == q,
            _ => false,
        },
        _ => true,
    }
}

// Property: equality (plus equal payloads for streams) implies equal hash
// for every pair of live composites.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_equal_implies_same_hash(shapes in arb_graph()) {
        let (g, root) = build(&shapes);
        let map = discover(&g, root).unwrap();
        let h = StructuralHasher::new();
        let ids: Vec<ObjectId> = map.ids().collect();
        for &a in &ids {
            for &b in &ids {
                if h.equal(&g, a, b).unwrap() && same_payload(&g, a, b) {
                    prop_assert_eq!(h.hash(&g, a).unwrap(), h.hash(&g, b).unwrap());
                    prop_assert!(h.equal(&g, b, a).unwrap());
                }
            }
        }
    }
}

// Property: one merge pass conserves references and keeps the root.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_merge_pass_invariants(shapes in arb_graph()) {
        check_single_pass(&shapes, &StructuralHasher::new())?;
    }
}

// Property: same invariants when every candidate collides into one bucket,
// stressing the equality split.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_merge_pass_invariants_with_collisions(shapes in arb_graph()) {
        check_single_pass(&shapes, &StructuralHasher::with_hasher(ConstBuildHasher))?;
    }
}

// Property: passes shrink the live set until one merges nothing; the pass
// count is bounded by the initial live count, and at the fixed point no two
// live composites are equal.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_monotonic_convergence(shapes in arb_graph()) {
        let (mut g, root) = build(&shapes);
        let initial = discover(&g, root).unwrap().len();
        let step = Optimizer::with_hasher(ConstBuildHasher).with_options(Options {
            collect_unreachable: false,
            max_passes: Some(1),
        });

        let mut live = initial;
        let mut passes = 0;
        loop {
            passes += 1;
            prop_assert!(passes <= initial + 1);
            let report = step.optimize(&mut g, root).unwrap();
            let now = discover(&g, root).unwrap().len();
            prop_assert_eq!(now + report.removed, live);
            live = now;
            if report.removed == 0 {
                break;
            }
        }

        // Streams with equal dictionaries but different payloads stay apart
        // through the hash, so equality alone is not enough to merge.
        let map = discover(&g, root).unwrap();
        let h = step.hasher();
        let ids: Vec<ObjectId> = map.ids().collect();
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let same_hash = h.hash(&g, a).unwrap() == h.hash(&g, b).unwrap();
                prop_assert!(!(same_hash && h.equal(&g, a, b).unwrap()));
            }
        }
    }
}
