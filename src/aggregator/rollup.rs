//! Roll-up of per-operation statistics over a view.
//!
//! Every view is first turned into an untruncated arena tree rooted at a
//! synthetic "_root" node. The root's total is always the sum over every
//! record, so the three views agree on it for any step filter.

use crate::options::QueryOptions;
use crate::stats::{ExecStats, Snapshot};
use crate::topology::{GraphView, ScopeView, TypeView, View};
use crate::utils::config::ROOT_NODE_NAME;
use log::debug;
use std::collections::HashMap;

/// One node of an untruncated roll-up tree
#[derive(Debug, Clone, PartialEq)]
pub struct RollupNode {
    pub name: String,
    pub op_type: Option<String>,
    pub self_stats: ExecStats,
    pub total_stats: ExecStats,

    /// Sum of self stats over the displayed subtree
    pub subtree_self: ExecStats,

    /// Nodes in the displayed subtree, this one included
    pub subtree_size: usize,

    pub children: Vec<usize>,
}

impl RollupNode {
    fn new(name: impl Into<String>, op_type: Option<String>, self_stats: ExecStats) -> Self {
        Self {
            name: name.into(),
            op_type,
            self_stats,
            total_stats: ExecStats::default(),
            subtree_self: ExecStats::default(),
            subtree_size: 1,
            children: Vec::new(),
        }
    }
}

/// Arena tree; node 0 is the root and parents precede their children
#[derive(Debug, Clone)]
pub struct RollupTree {
    pub nodes: Vec<RollupNode>,
}

impl RollupTree {
    pub const ROOT: usize = 0;

    fn with_root() -> Self {
        Self {
            nodes: vec![RollupNode::new(ROOT_NODE_NAME, None, ExecStats::default())],
        }
    }

    fn push(&mut self, parent: usize, node: RollupNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    pub fn root(&self) -> &RollupNode {
        &self.nodes[Self::ROOT]
    }
}

/// Build the untruncated roll-up tree for any view
///
/// Graph totals are only filled down to `options.max_depth`; deeper nodes
/// can only be folded, which reads their subtree sums instead.
pub fn rollup(snapshot: &Snapshot, view: View<'_>, options: &QueryOptions) -> RollupTree {
    let stats = snapshot.self_stats(options.step);

    let tree = match view {
        View::Graph(graph) => rollup_graph(snapshot, graph, &stats, options.max_depth),
        View::Scope(scope) => rollup_scope(snapshot, scope, &stats),
        View::Type(types) => rollup_types(snapshot, types, &stats),
    };

    debug!(
        "Rolled up {} view: {} nodes, {} micros total",
        view.kind(),
        tree.nodes.len(),
        tree.root().total_stats.exec_micros
    );
    tree
}

/// Graph roll-up: spanning tree for display, closure sums for totals
fn rollup_graph(snapshot: &Snapshot, graph: &GraphView, stats: &[ExecStats], max_depth: usize) -> RollupTree {
    let mut tree = RollupTree::with_root();
    let mut visited = vec![false; graph.len()];
    let mut parents = Vec::with_capacity(graph.len());
    let mut closures: HashMap<usize, ExecStats> = HashMap::new();

    // (tree parent, operation, depth below the root)
    let mut stack: Vec<(usize, usize, usize)> = graph
        .roots()
        .iter()
        .rev()
        .map(|&op| (RollupTree::ROOT, op, 1))
        .collect();

    while let Some((parent, op, depth)) = stack.pop() {
        if visited[op] {
            continue;
        }
        visited[op] = true;

        let record = &snapshot.records[op];
        let mut node = RollupNode::new(record.name(), Some(record.op_type().to_string()), stats[op]);
        if depth <= max_depth {
            node.total_stats = *closures
                .entry(graph.component(op))
                .or_insert_with(|| graph.closure_total(op, stats));
        }
        let index = tree.push(parent, node);
        parents.push(parent);

        stack.extend(
            graph
                .inputs(op)
                .iter()
                .rev()
                .filter(|&&input| !visited[input])
                .map(|&input| (index, input, depth + 1)),
        );
    }

    debug!("Walked {} graph closures", closures.len());

    tree.nodes[RollupTree::ROOT].total_stats = stats.iter().sum();
    accumulate_with_parents(&mut tree, &parents);
    tree
}

/// Scope roll-up: plain subtree sums over the trie
fn rollup_scope(snapshot: &Snapshot, scope: &ScopeView, stats: &[ExecStats]) -> RollupTree {
    let mut tree = RollupTree::with_root();
    let mut parents = Vec::with_capacity(scope.len());

    // (tree parent, trie node)
    let mut stack: Vec<(usize, usize)> = scope
        .root()
        .children
        .iter()
        .rev()
        .map(|&child| (RollupTree::ROOT, child))
        .collect();

    while let Some((parent, trie_index)) = stack.pop() {
        let trie_node = scope.node(trie_index);
        let (op_type, self_stats) = match trie_node.op {
            Some(op) => (Some(snapshot.records[op].op_type().to_string()), stats[op]),
            None => (None, ExecStats::default()),
        };

        let index = tree.push(parent, RollupNode::new(trie_node.path.clone(), op_type, self_stats));
        parents.push(parent);
        stack.extend(trie_node.children.iter().rev().map(|&child| (index, child)));
    }

    accumulate_with_parents(&mut tree, &parents);
    for node in &mut tree.nodes {
        node.total_stats = node.subtree_self;
    }
    tree
}

/// Type roll-up: root -> one node per op type -> member operations
fn rollup_types(snapshot: &Snapshot, types: &TypeView, stats: &[ExecStats]) -> RollupTree {
    let mut tree = RollupTree::with_root();
    let mut parents = Vec::with_capacity(snapshot.records.len() + types.buckets().len());

    for (op_type, members) in types.buckets() {
        let bucket = tree.push(
            RollupTree::ROOT,
            RollupNode::new(op_type.clone(), Some(op_type.clone()), ExecStats::default()),
        );
        parents.push(RollupTree::ROOT);

        for &op in members {
            let record = &snapshot.records[op];
            tree.push(bucket, RollupNode::new(record.name(), Some(op_type.clone()), stats[op]));
            parents.push(bucket);
        }
    }

    accumulate_with_parents(&mut tree, &parents);
    for node in &mut tree.nodes {
        node.total_stats = node.subtree_self;
    }
    tree
}

/// Bottom-up subtree sums when the parent of node `i + 1` is `parents[i]`
fn accumulate_with_parents(tree: &mut RollupTree, parents: &[usize]) {
    for node in &mut tree.nodes {
        node.subtree_self = node.self_stats;
        node.subtree_size = 1;
    }

    for index in (1..tree.nodes.len()).rev() {
        let parent = parents[index - 1];
        let (self_sum, size) = (tree.nodes[index].subtree_self, tree.nodes[index].subtree_size);
        tree.nodes[parent].subtree_self += self_sum;
        tree.nodes[parent].subtree_size += size;
    }
}
