//! Structural hash and shallow structural equality of composite objects.
//!
//! Both look exactly one level deep: a child contributes its scalar value or,
//! for a composite child, its identity. Two parents whose children are
//! distinct-but-identical objects therefore differ until those children have
//! been merged by an earlier pass. The driver's fixed-point loop is what
//! turns this shallow relation into bottom-up deduplication.
//!
//! Invariant: `equal(a, b)` implies `hash(a) == hash(b)` when `a` and `b`
//! are not streams or carry the same payload bytes. The converse does not
//! hold; the hash only buckets candidates.

use crate::error::{Error, Result};
use crate::graph::{ObjectGraph, Resolved};
use crate::object::{Dictionary, Object, ObjectId, Payload, Scalar, Value};
use core::hash::BuildHasher;
use rustc_hash::FxBuildHasher;
use std::io;

const SEQUENCE_SEED: u64 = 1;
const MAPPING_SEED: u64 = 3;
const DIGEST_SEED: u64 = 1;
const MULTIPLIER: u64 = 31;

/// Computes bucketing hashes and confirms equality within a bucket.
///
/// `S` hashes individual scalars, names and ids. The default is
/// deterministic across runs so bucketing (and therefore survivor choice)
/// is repeatable.
#[derive(Clone, Debug, Default)]
pub struct StructuralHasher<S = FxBuildHasher> {
    hasher: S,
}

impl StructuralHasher {
    pub fn new() -> Self {
        Self::with_hasher(FxBuildHasher)
    }
}

impl<S: BuildHasher> StructuralHasher<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }

    /// Structural hash of the composite object `id`.
    ///
    /// Streams read their whole payload; a read failure is an error rather
    /// than a fallback hash.
    pub fn hash(&self, graph: &ObjectGraph, id: ObjectId) -> Result<u64> {
        match graph.get(id) {
            None => Err(Error::UnknownObject(id)),
            Some(Object::Array(items)) => self.sequence_hash(graph, items),
            Some(Object::Dictionary(dict)) => self.mapping_hash(graph, dict),
            Some(Object::Stream(stream)) => {
                let mapping = self.mapping_hash(graph, &stream.dict)?;
                let digest = payload_digest(id, &stream.payload)?;
                Ok(mapping.wrapping_mul(MULTIPLIER).wrapping_add(digest))
            }
            Some(obj) => Err(Error::UnsupportedKind {
                id,
                kind: obj.kind(),
            }),
        }
    }

    /// Shallow structural equality.
    ///
    /// Arrays need equal length and position-wise equal elements;
    /// dictionaries and streams need identical key sets and key-wise equal
    /// values. Elements are compared after resolving aliases: scalars by
    /// value, composites by identity. Stream payloads are not compared here;
    /// they only enter through the hash.
    pub fn equal(&self, graph: &ObjectGraph, a: ObjectId, b: ObjectId) -> Result<bool> {
        if a == b {
            return Ok(true);
        }
        let lhs = graph.get(a).ok_or(Error::UnknownObject(a))?;
        let rhs = graph.get(b).ok_or(Error::UnknownObject(b))?;
        match (lhs, rhs) {
            (Object::Array(x), Object::Array(y)) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (u, v) in x.iter().zip(y) {
                    if !same_element(graph.resolve(u)?, graph.resolve(v)?) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Object::Dictionary(x), Object::Dictionary(y)) => mapping_equal(graph, x, y),
            (Object::Stream(x), Object::Stream(y)) => mapping_equal(graph, &x.dict, &y.dict),
            (Object::Array(_) | Object::Dictionary(_) | Object::Stream(_), _) => {
                if rhs.kind().is_composite() {
                    Ok(false)
                } else {
                    Err(Error::UnsupportedKind {
                        id: b,
                        kind: rhs.kind(),
                    })
                }
            }
            _ => Err(Error::UnsupportedKind {
                id: a,
                kind: lhs.kind(),
            }),
        }
    }

    fn sequence_hash(&self, graph: &ObjectGraph, items: &[Value]) -> Result<u64> {
        let mut acc = SEQUENCE_SEED;
        for item in items {
            let h = self.element_hash(graph.resolve(item)?);
            acc = acc.wrapping_mul(MULTIPLIER).wrapping_add(h);
        }
        Ok(acc)
    }

    // Summed so key order cannot matter.
    fn mapping_hash(&self, graph: &ObjectGraph, dict: &Dictionary) -> Result<u64> {
        let mut acc = MAPPING_SEED;
        for (key, value) in dict.iter() {
            let entry = self.hasher.hash_one(key) ^ self.element_hash(graph.resolve(value)?);
            acc = acc.wrapping_add(entry);
        }
        Ok(acc)
    }

    fn element_hash(&self, element: Resolved<'_>) -> u64 {
        match element {
            Resolved::Absent => 0,
            Resolved::Scalar(s) if is_null(s) => 0,
            Resolved::Scalar(s) => self.hasher.hash_one(s),
            Resolved::Composite(id) => self.hasher.hash_one(id),
        }
    }
}

fn is_null(s: &Scalar) -> bool {
    matches!(s, Scalar::Null)
}

// A dangling reference reads as null, so the two are interchangeable.
fn same_element(a: Resolved<'_>, b: Resolved<'_>) -> bool {
    match (a, b) {
        (Resolved::Absent, Resolved::Absent) => true,
        (Resolved::Absent, Resolved::Scalar(s)) | (Resolved::Scalar(s), Resolved::Absent) => {
            is_null(s)
        }
        (Resolved::Scalar(x), Resolved::Scalar(y)) => x == y,
        (Resolved::Composite(x), Resolved::Composite(y)) => x == y,
        _ => false,
    }
}

fn mapping_equal(graph: &ObjectGraph, x: &Dictionary, y: &Dictionary) -> Result<bool> {
    if x.len() != y.len() || !x.keys().eq(y.keys()) {
        return Ok(false);
    }
    for ((_, u), (_, v)) in x.iter().zip(y.iter()) {
        if !same_element(graph.resolve(u)?, graph.resolve(v)?) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// BLAKE3 over the raw payload, folded to 64 bits.
fn payload_digest(id: ObjectId, payload: &Payload) -> Result<u64> {
    let read_err = |source: io::Error| Error::PayloadRead { id, source };
    let mut hasher = blake3::Hasher::new();
    {
        let mut reader = payload.open().map_err(read_err)?;
        io::copy(&mut reader, &mut hasher).map_err(read_err)?;
    }
    let digest = hasher.finalize();
    Ok(digest.as_bytes().iter().fold(DIGEST_SEED, |acc, &b| {
        acc.wrapping_mul(MULTIPLIER).wrapping_add(u64::from(b))
    }))
}
