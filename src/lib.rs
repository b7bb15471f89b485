//! obj-dedup: merges structurally identical composite objects in a
//! reference-based document object graph, rewriting every incoming
//! reference to a single surviving instance.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: shrink a document's serialized size without changing what any
//!   consumer that only follows references can observe.
//! - Layers:
//!   - ObjectGraph: arena of objects keyed by generational `ObjectId`s.
//!     Container slots hold ids, never owned children, so an edge can be
//!     retargeted by rewriting one slot.
//!   - Reference: a first-class edge named by `(source, index)` or
//!     `(source, key)`; reads resolve aliases, writes replace the slot.
//!   - StructuralHasher: shallow structural hash (children by identity,
//!     stream payloads by BLAKE3 digest) plus the matching shallow equality.
//!   - discover: breadth-first walk from a root producing the DiscoveryMap
//!     (composite -> every reference into it).
//!   - merge_duplicates: sort by hash, split equal-hash runs into groups of
//!     equal objects, fold each group onto one survivor.
//!   - Optimizer: repeats discover + merge until a pass merges nothing.
//!
//! Constraints
//! - Single-threaded and synchronous; the optimizer holds `&mut ObjectGraph`
//!   for the whole run.
//! - All pass state (discovery map, buckets, groups) is created per pass and
//!   passed explicitly; nothing persists between calls.
//! - Identity is the arena key. Visited sets and hash tie-breaks never look
//!   at content, so cycles are walked once and bucketing is total.
//! - The root is never retired.
//!
//! Why shallow hashing?
//! - A composite child contributes its id, not its content. Parents of
//!   distinct-but-identical children only become equal after the children
//!   have been merged, which is why the optimizer loops to a fixed point.
//!   Each merging pass strictly shrinks the reachable composite set, so the
//!   loop terminates without a pass cap.
//!
//! Payload policy
//! - Stream payloads are digested once, into the hash. Equality checks the
//!   dictionary part only and trusts the digest for the bytes.
//! - A payload that cannot be read aborts the run; a partial digest could
//!   merge streams with different content.
//!
//! Notes and non-goals
//! - Over-merging is possible: two semantically distinct but structurally
//!   identical objects (e.g. identically built pages) collapse into one.
//!   Whether that is acceptable is the caller's policy.
//! - Not a graph-isomorphism solver: merging needs slot-by-slot equality.
//! - Parsing, serialization and file I/O live outside this crate; the
//!   `direct` flag cleared on merged objects is for the writer.

pub mod discovery;
pub mod error;
pub mod graph;
pub mod hash;
pub mod merge;
mod merge_proptest;
pub mod object;
pub mod optimizer;
pub mod reference;

// Public surface
pub use discovery::{discover, DiscoveryMap};
pub use error::{Error, Result};
pub use graph::{ObjectGraph, Resolved};
pub use hash::StructuralHasher;
pub use merge::{merge_duplicates, merge_duplicates_with, MergeStats};
pub use object::{
    Dictionary, Kind, Name, Object, ObjectId, Payload, PayloadSource, Scalar, Stream, Value,
};
pub use optimizer::{optimize, OptimizeReport, Optimizer, Options};
pub use reference::{Reference, Slot};
