//! Duplicate merger: bucket by structural hash, confirm by equality, fold
//! every confirmed duplicate onto one survivor.

use crate::discovery::DiscoveryMap;
use crate::error::Result;
use crate::graph::ObjectGraph;
use crate::hash::StructuralHasher;
use crate::object::ObjectId;
use core::hash::BuildHasher;
use tracing::{debug, trace};

/// Counters for one merge invocation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Duplicates folded into a survivor and retired.
    pub removed: usize,
    /// Duplicate groups with more than one member.
    pub groups: usize,
    /// Hash buckets holding more than one object.
    pub buckets: usize,
}

/// Merge duplicates among the keys of `map` with the default hasher.
/// Returns how many objects were retired.
pub fn merge_duplicates(graph: &mut ObjectGraph, map: &mut DiscoveryMap) -> Result<usize> {
    merge_duplicates_with(graph, map, &StructuralHasher::new()).map(|stats| stats.removed)
}

/// Merge duplicates among the keys of `map`.
///
/// Candidates are sorted by `(hash, id)`; each run of equal hashes is split
/// into groups of mutually equal objects by comparing every object against
/// the first member of each group formed so far. Runs of one are skipped.
///
/// For every group the survivor is the first member, or the pass root if it
/// is a member. Each duplicate's references are retargeted to the survivor
/// and appended to the survivor's collection, then the duplicate is retired
/// from `map`. Arena storage of retired objects is left alone; their slots
/// may still be the source of references held elsewhere in `map`.
pub fn merge_duplicates_with<S: BuildHasher>(
    graph: &mut ObjectGraph,
    map: &mut DiscoveryMap,
    hasher: &StructuralHasher<S>,
) -> Result<MergeStats> {
    let mut hashes = Vec::with_capacity(map.len());
    for id in map.ids() {
        hashes.push((hasher.hash(graph, id)?, id));
    }
    hashes.sort_unstable();

    let mut stats = MergeStats::default();
    for run in hashes.chunk_by(|a, b| a.0 == b.0) {
        if run.len() < 2 {
            continue;
        }
        stats.buckets += 1;
        debug!(count = run.len(), hash = run[0].0, "equal hash");

        let groups = split_run(graph, hasher, run)?;
        debug!(groups = groups.len(), "identified sets of identical objects in run");
        for group in groups {
            if group.len() > 1 {
                stats.groups += 1;
                stats.removed += merge_group(graph, map, group)?;
            }
        }
    }
    Ok(stats)
}

/// Partition one hash run into groups of equal objects, preserving run
/// order inside each group.
fn split_run<S: BuildHasher>(
    graph: &ObjectGraph,
    hasher: &StructuralHasher<S>,
    run: &[(u64, ObjectId)],
) -> Result<Vec<Vec<ObjectId>>> {
    let mut groups: Vec<Vec<ObjectId>> = Vec::new();
    'items: for &(_, id) in run {
        for group in groups.iter_mut() {
            if hasher.equal(graph, id, group[0])? {
                group.push(id);
                continue 'items;
            }
        }
        groups.push(vec![id]);
    }
    Ok(groups)
}

/// Fold `group[1..]` onto a survivor. All slots are validated before the
/// first one is rewritten, so a group is merged completely or not at all.
fn merge_group(
    graph: &mut ObjectGraph,
    map: &mut DiscoveryMap,
    mut group: Vec<ObjectId>,
) -> Result<usize> {
    if let Some(pos) = group.iter().position(|&id| id == map.root()) {
        group.swap(0, pos);
    }
    let survivor = group[0];
    let duplicates = &group[1..];

    for &dup in duplicates {
        for reference in map.references(dup).unwrap_or_default() {
            reference.check(graph)?;
        }
    }

    for &dup in duplicates {
        let refs = map.retire(dup);
        trace!(?dup, ?survivor, references = refs.len(), "merging duplicate");
        for reference in &refs {
            reference.retarget(graph, survivor)?;
        }
        map.adopt(survivor, refs);
        graph.set_direct(dup, false);
    }
    graph.set_direct(survivor, false);
    Ok(duplicates.len())
}
