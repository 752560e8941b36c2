//! Ordering and truncation of roll-up trees.
//!
//! Siblings are ordered by the query metric (descending, ties by name).
//! A sibling is hidden when it sits below `max_depth`, falls past
//! `max_children`, or misses a threshold. Every hidden sibling group is
//! replaced by one "_others" node whose self stats are the summed self
//! stats of the hidden subtrees, so the visible self stats still add up
//! to the root total.

use super::rollup::{RollupNode, RollupTree};
use crate::aggregator::metrics::Metric;
use crate::options::QueryOptions;
use crate::schema::GraphNodeProfile;
use crate::stats::ExecStats;
use crate::utils::config::OTHERS_NODE_NAME;
use log::debug;
use std::cmp::Ordering;

/// Order, cut and fold a roll-up tree into a result tree
pub fn shape(tree: &RollupTree, options: &QueryOptions) -> GraphNodeProfile {
    // Shaped nodes in pre-order with the slot of their parent
    let mut shaped: Vec<(usize, Option<GraphNodeProfile>)> =
        vec![(RollupTree::ROOT, Some(profile_of(tree.root())))];

    // (roll-up index, shaped slot, depth)
    let mut stack = vec![(RollupTree::ROOT, 0, 0)];

    while let Some((index, slot, depth)) = stack.pop() {
        let mut children = tree.nodes[index].children.clone();
        children.sort_by(|&a, &b| compare(&tree.nodes[a], &tree.nodes[b], options.order_by));

        let depth_allowed = depth < options.max_depth;
        let mut shown = 0;
        let mut others = ExecStats::default();
        let mut collapsed = 0;

        for child in children {
            let child_node = &tree.nodes[child];
            let visible = depth_allowed
                && options.max_children.map_or(true, |max| shown < max)
                && options.passes_thresholds(
                    child_node.total_stats.exec_micros,
                    child_node.total_stats.requested_bytes,
                );

            if visible {
                shaped.push((slot, Some(profile_of(child_node))));
                stack.push((child, shaped.len() - 1, depth + 1));
                shown += 1;
            } else {
                others += child_node.subtree_self;
                collapsed += child_node.subtree_size;
            }
        }

        if collapsed > 0 {
            shaped.push((
                slot,
                Some(GraphNodeProfile {
                    name: OTHERS_NODE_NAME.to_string(),
                    op_type: None,
                    self_stats: others,
                    total_stats: others,
                    collapsed,
                    children: Vec::new(),
                }),
            ));
        }
    }

    let root = assemble(shaped);
    debug!(
        "Shaped {} roll-up nodes into {} result nodes",
        tree.nodes.len(),
        root.node_count()
    );
    root
}

/// Nest pre-ordered nodes under their parents, deepest first
///
/// Siblings arrive contiguously in display order and are attached in
/// reverse, so each node's children are flipped once it is complete.
fn assemble(mut shaped: Vec<(usize, Option<GraphNodeProfile>)>) -> GraphNodeProfile {
    for slot in (1..shaped.len()).rev() {
        let parent = shaped[slot].0;
        if let Some(mut node) = shaped[slot].1.take() {
            node.children.reverse();
            if let Some(parent_node) = shaped[parent].1.as_mut() {
                parent_node.children.push(node);
            }
        }
    }

    let mut root = shaped
        .into_iter()
        .next()
        .and_then(|(_, node)| node)
        .unwrap_or_default();
    root.children.reverse();
    root
}

fn profile_of(node: &RollupNode) -> GraphNodeProfile {
    GraphNodeProfile {
        name: node.name.clone(),
        op_type: node.op_type.clone(),
        self_stats: node.self_stats,
        total_stats: node.total_stats,
        collapsed: 0,
        children: Vec::new(),
    }
}

/// Descending by metric on totals, then ascending by name
fn compare(a: &RollupNode, b: &RollupNode, metric: Metric) -> Ordering {
    b.total_stats
        .value(metric)
        .cmp(&a.total_stats.value(metric))
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::graph_def::OpDef;
    use crate::stats::{OperationRecord, Snapshot};
    use crate::topology::{IndexedSnapshot, ViewKind};
    use crate::aggregator::rollup::rollup;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn indexed(ops: &[(&str, u64, u64)]) -> IndexedSnapshot {
        let records = ops
            .iter()
            .map(|&(name, micros, bytes)| {
                let mut record = OperationRecord::new(OpDef::new(name, "Op"));
                record.merge(
                    0,
                    ExecStats {
                        exec_micros: micros,
                        requested_bytes: bytes,
                        run_count: 1,
                        ..Default::default()
                    },
                );
                record
            })
            .collect();
        IndexedSnapshot::new(Snapshot::new(1, records, BTreeMap::from([(0, 1)])))
    }

    fn scope_tree(indexed: &IndexedSnapshot) -> RollupTree {
        rollup(indexed.snapshot(), indexed.view(ViewKind::Scope), &QueryOptions::default())
    }

    fn names(profile: &GraphNodeProfile) -> Vec<&str> {
        profile.children.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_ordering_and_ties() {
        let indexed = indexed(&[("b", 5, 0), ("a", 5, 0), ("c", 9, 0)]);
        let root = shape(&scope_tree(&indexed), &QueryOptions::default());
        assert_eq!(names(&root), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_order_by_bytes() {
        let indexed = indexed(&[("a", 9, 1), ("b", 1, 9)]);
        let options = QueryOptions::default().with_order_by(Metric::Bytes);
        let root = shape(&scope_tree(&indexed), &options);
        assert_eq!(names(&root), vec!["b", "a"]);
    }

    #[test]
    fn test_max_children_folds_into_others() {
        let indexed = indexed(&[("a", 10, 0), ("b", 20, 0), ("c", 30, 0), ("d", 40, 0)]);
        let options = QueryOptions::default().with_max_children(2);
        let root = shape(&scope_tree(&indexed), &options);

        assert_eq!(names(&root), vec!["d", "c", "_others"]);
        let others = &root.children[2];
        assert_eq!(others.self_stats.exec_micros, 30);
        assert_eq!(others.collapsed, 2);
        assert_eq!(root.visible_self_total(), root.total_stats);
    }

    #[test]
    fn test_max_depth_keeps_sums() {
        let indexed = indexed(&[("m", 1, 0), ("m/a", 2, 0), ("m/a/x", 4, 0), ("n", 8, 0)]);
        let tree = scope_tree(&indexed);

        let flat = shape(&tree, &QueryOptions::default().with_max_depth(0));
        assert_eq!(names(&flat), vec!["_others"]);
        assert_eq!(flat.children[0].collapsed, 4);
        assert_eq!(flat.visible_self_total().exec_micros, 15);

        let one = shape(&tree, &QueryOptions::default().with_max_depth(1));
        assert_eq!(names(&one), vec!["n", "m"]);
        let m = one.find("m").unwrap();
        assert_eq!(names(m), vec!["_others"]);
        assert_eq!(m.total_stats.exec_micros, 7);
        assert_eq!(one.visible_self_total().exec_micros, 15);
    }

    #[test]
    fn test_thresholds_fold_into_others() {
        let indexed = indexed(&[("a", 100, 10), ("b", 5, 1000), ("c", 200, 2000)]);
        let options = QueryOptions::default().with_min_micros(50).with_min_bytes(100);
        let root = shape(&scope_tree(&indexed), &options);

        assert_eq!(names(&root), vec!["c", "_others"]);
        assert_eq!(root.children[1].self_stats.exec_micros, 105);
        assert_eq!(root.visible_self_total(), root.total_stats);
    }
}
