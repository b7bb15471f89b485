use obj_dedup::{
    discover, optimize, Dictionary, Object, ObjectGraph, ObjectId, Optimizer, Options, Resolved,
    Scalar, Stream, Value,
};
use proptest::prelude::*;
use std::io::Read;

// Generated documents: node 0 is the root; slot values are drawn from a tiny
// domain so identical subtrees are common.
#[derive(Clone, Debug)]
enum SlotSpec {
    Int(i64),
    Name(u8),
    Null,
    Dangling,
    Ref(usize),
    Alias(usize),
}

#[derive(Clone, Debug)]
enum NodeSpec {
    Array(Vec<SlotSpec>),
    Dict(Vec<(u8, SlotSpec)>),
    Stream(Vec<(u8, SlotSpec)>, u8),
}

const KEYS: [&str; 3] = ["Kids", "Type", "Parent"];

fn arb_document() -> impl Strategy<Value = Vec<NodeSpec>> {
    (1usize..=10).prop_flat_map(|n| {
        let slot = prop_oneof![
            (0i64..2).prop_map(SlotSpec::Int),
            (0u8..2).prop_map(SlotSpec::Name),
            Just(SlotSpec::Null),
            Just(SlotSpec::Dangling),
            (0..n).prop_map(SlotSpec::Ref),
            (0..n).prop_map(SlotSpec::Ref),
            (0..n).prop_map(SlotSpec::Alias),
        ];
        let entries = proptest::collection::vec((0u8..3, slot.clone()), 0..3);
        let node = prop_oneof![
            proptest::collection::vec(slot, 0..4).prop_map(NodeSpec::Array),
            entries.clone().prop_map(NodeSpec::Dict),
            (entries, 0u8..2).prop_map(|(e, p)| NodeSpec::Stream(e, p)),
        ];
        proptest::collection::vec(node, n)
    })
}

fn build(shapes: &[NodeSpec]) -> (ObjectGraph, ObjectId) {
    let mut g = ObjectGraph::new();
    let ids: Vec<ObjectId> = shapes
        .iter()
        .map(|_| g.insert(Dictionary::new()))
        .collect();
    let dangling = g.insert(Dictionary::new());
    g.remove(dangling);

    let value = |g: &mut ObjectGraph, s: &SlotSpec| -> Value {
        match s {
            SlotSpec::Int(i) => Value::from(*i),
            SlotSpec::Name(n) => Value::name(if *n == 0 { "Page" } else { "Font" }),
            SlotSpec::Null => Value::NULL,
            SlotSpec::Dangling => Value::Ref(dangling),
            SlotSpec::Ref(i) => Value::Ref(ids[*i]),
            SlotSpec::Alias(i) => Value::Ref(g.insert(Object::Alias(ids[*i]))),
        }
    };
    for (shape, &id) in shapes.iter().zip(&ids) {
        let dict = |g: &mut ObjectGraph, entries: &[(u8, SlotSpec)]| -> Dictionary {
            let mut d = Dictionary::new();
            for (k, s) in entries {
                d.insert(KEYS[*k as usize], value(g, s));
            }
            d
        };
        let object = match shape {
            NodeSpec::Array(slots) => {
                let mut items = Vec::with_capacity(slots.len());
                for s in slots {
                    items.push(value(&mut g, s));
                }
                Object::Array(items)
            }
            NodeSpec::Dict(entries) => Object::Dictionary(dict(&mut g, entries)),
            NodeSpec::Stream(entries, p) => {
                Object::Stream(Stream::new(dict(&mut g, entries), vec![*p; 3]))
            }
        };
        if let Some(slot) = g.get_mut(id) {
            *slot = object;
        }
    }
    (g, ids[0])
}

// What a reader following references from the root observes, cut off at a
// fixed depth so cycles stay finite. Identities are not observable.
#[derive(Debug, PartialEq)]
enum View {
    Null,
    Scalar(Scalar),
    Array(Vec<View>),
    Dict(Vec<(String, View)>),
    Stream(Vec<(String, View)>, Vec<u8>),
    Cut,
}

fn view(g: &ObjectGraph, value: &Value, depth: usize) -> View {
    match g.resolve(value).unwrap() {
        Resolved::Absent | Resolved::Scalar(Scalar::Null) => View::Null,
        Resolved::Scalar(s) => View::Scalar(s.clone()),
        Resolved::Composite(_) if depth == 0 => View::Cut,
        Resolved::Composite(id) => {
            let entries = |d: &Dictionary| -> Vec<(String, View)> {
                d.iter()
                    .map(|(k, v)| (k.as_str().to_owned(), view(g, v, depth - 1)))
                    .collect()
            };
            match g.get(id).unwrap() {
                Object::Array(items) => {
                    View::Array(items.iter().map(|v| view(g, v, depth - 1)).collect())
                }
                Object::Dictionary(d) => View::Dict(entries(d)),
                Object::Stream(s) => {
                    let mut bytes = Vec::new();
                    s.payload.open().unwrap().read_to_end(&mut bytes).unwrap();
                    View::Stream(entries(&s.dict), bytes)
                }
                other => panic!("resolved to non-composite {:?}", other.kind()),
            }
        }
    }
}

const DEPTH: usize = 6;

// Property: optimizing never changes what is observable from the root.
proptest! {
    #![proptest_config(ProptestConfig { cases: 192, .. ProptestConfig::default() })]
    #[test]
    fn prop_optimize_preserves_observable_document(shapes in arb_document()) {
        let (mut g, root) = build(&shapes);
        let before = view(&g, &Value::Ref(root), DEPTH);
        let len = g.len();

        let report = optimize(&mut g, root).unwrap();
        prop_assert!(report.converged);
        prop_assert!(g.contains(root));
        prop_assert_eq!(g.len(), len);
        prop_assert_eq!(view(&g, &Value::Ref(root), DEPTH), before);
    }
}

// Property: the live set shrinks by exactly the reported count, opted-in
// collection leaves no garbage, and a second run is a single pass that
// changes nothing.
proptest! {
    #![proptest_config(ProptestConfig { cases: 192, .. ProptestConfig::default() })]
    #[test]
    fn prop_optimize_is_idempotent(shapes in arb_document()) {
        let (mut g, root) = build(&shapes);
        let live_before = discover(&g, root).unwrap().len();

        let collecting = Optimizer::new().with_options(Options {
            collect_unreachable: true,
            ..Options::default()
        });
        let first = collecting.optimize(&mut g, root).unwrap();
        let live_after = discover(&g, root).unwrap().len();
        prop_assert_eq!(live_after + first.removed, live_before);
        prop_assert_eq!(g.reachable_from(root).unwrap().len(), g.len());
        prop_assert_eq!(first.passes, first.per_pass.len());
        prop_assert_eq!(first.per_pass.last().map(|s| s.removed), Some(0));

        let len = g.len();
        let second = collecting.optimize(&mut g, root).unwrap();
        prop_assert_eq!(second.passes, 1);
        prop_assert_eq!(second.removed, 0);
        prop_assert_eq!(second.collected, 0);
        prop_assert_eq!(g.len(), len);
    }
}
