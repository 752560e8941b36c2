//! Aggregation of per-operation statistics into query results.
//!
//! This module turns a snapshot view into:
//! - Roll-up trees (graph closure sums, scope subtree sums, type buckets)
//! - Ordered, truncated result trees with "_others" folding
//! - Collapsed stacks (for flamegraph generation)
//! - Metric distribution statistics

pub mod metrics;
pub mod rollup;
pub mod stack_builder;
pub mod truncate;

// Re-export main types and functions
pub use metrics::{calculate_distribution, parse_metric_list, Distribution, Metric};
pub use rollup::{rollup, RollupNode, RollupTree};
pub use stack_builder::{build_collapsed_stacks, CollapsedStack};
pub use truncate::shape;

use crate::options::QueryOptions;
use crate::schema::{GraphNodeProfile, MultiNodeProfile, ProfileResult};
use crate::topology::{IndexedSnapshot, ViewKind};

/// Run one already-validated query against an indexed snapshot
pub fn aggregate(indexed: &IndexedSnapshot, kind: ViewKind, options: &QueryOptions) -> ProfileResult {
    match kind {
        ViewKind::Graph => ProfileResult::Graph(aggregate_tree(indexed, kind, options)),
        ViewKind::Scope => ProfileResult::Scope(aggregate_tree(indexed, kind, options)),
        ViewKind::Type => ProfileResult::Operations(aggregate_operations(indexed, options)),
    }
}

/// Shaped result tree for one view
pub fn aggregate_tree(indexed: &IndexedSnapshot, kind: ViewKind, options: &QueryOptions) -> GraphNodeProfile {
    let tree = rollup(indexed.snapshot(), indexed.view(kind), options);
    shape(&tree, options)
}

/// Op-type table: one shaped tree per type bucket
pub fn aggregate_operations(indexed: &IndexedSnapshot, options: &QueryOptions) -> MultiNodeProfile {
    let root = aggregate_tree(indexed, ViewKind::Type, options);
    MultiNodeProfile {
        name: root.name,
        total_stats: root.total_stats,
        op_types: root.children,
    }
}
