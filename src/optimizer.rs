//! Optimizer: runs discovery and merge passes until a pass merges nothing.

use crate::discovery::discover;
use crate::error::Result;
use crate::graph::ObjectGraph;
use crate::hash::StructuralHasher;
use crate::merge::{merge_duplicates_with, MergeStats};
use crate::object::ObjectId;
use core::hash::BuildHasher;
use rustc_hash::FxBuildHasher;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// After converging, drop every arena object not reachable from the
    /// root. Off by default: retired duplicates are simply left unreferenced.
    ///
    /// This removes anything the caller keeps outside `root` too (e.g. a
    /// trailer's info dictionary), so only enable it when `root` covers the
    /// whole document.
    pub collect_unreachable: bool,
    /// Stop after this many passes even if the last one still merged.
    /// `None` runs to the fixed point, which always terminates because every
    /// merging pass shrinks the set of reachable composites.
    pub max_passes: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            collect_unreachable: false,
            max_passes: None,
        }
    }
}

/// Outcome of one [`Optimizer::optimize`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Passes run, including the final pass that merged nothing.
    pub passes: usize,
    /// Objects retired across all passes.
    pub removed: usize,
    /// Objects dropped from the arena afterwards; zero unless
    /// `collect_unreachable` is set.
    pub collected: usize,
    /// False only when `max_passes` cut the loop short.
    pub converged: bool,
    pub per_pass: Vec<MergeStats>,
}

#[derive(Clone, Debug, Default)]
pub struct Optimizer<S = FxBuildHasher> {
    hasher: StructuralHasher<S>,
    options: Options,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::with_hasher(FxBuildHasher)
    }
}

impl<S: BuildHasher> Optimizer<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher: StructuralHasher::with_hasher(hasher),
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn hasher(&self) -> &StructuralHasher<S> {
        &self.hasher
    }

    /// Merge structurally identical composites reachable from `root` until
    /// a pass finds none.
    ///
    /// Each pass rebuilds the discovery map from scratch: merging children
    /// can make their parents identical, and references recorded before a
    /// merge may no longer describe the graph. Running this again on an
    /// optimized graph costs one pass and changes nothing.
    ///
    /// On error the graph may hold the merges of earlier groups and passes;
    /// each completed group is internally consistent.
    pub fn optimize(&self, graph: &mut ObjectGraph, root: ObjectId) -> Result<OptimizeReport> {
        let mut report = OptimizeReport::default();
        loop {
            if self
                .options
                .max_passes
                .is_some_and(|max| report.passes >= max)
            {
                break;
            }
            report.passes += 1;
            let pass = report.passes;

            let mut map = discover(graph, root)?;
            let stats = merge_duplicates_with(graph, &mut map, &self.hasher)?;
            report.per_pass.push(stats);
            if stats.removed == 0 {
                info!(pass, "no merged objects");
                report.converged = true;
                break;
            }
            info!(pass, merged = stats.removed, groups = stats.groups, "merged objects");
            report.removed += stats.removed;
        }

        if self.options.collect_unreachable {
            report.collected = graph.collect_unreachable(root)?;
            if report.collected > 0 {
                info!(collected = report.collected, "dropped unreachable objects");
            }
        }
        Ok(report)
    }
}

/// Optimize with default hasher and options.
pub fn optimize(graph: &mut ObjectGraph, root: ObjectId) -> Result<OptimizeReport> {
    Optimizer::new().optimize(graph, root)
}
