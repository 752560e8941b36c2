//! Dataflow-graph view.
//!
//! A node's children are the operations it reads from. The graph may contain
//! cycles (control-flow back edges). A node's roll-up is the sum over every
//! operation reachable from it, so an operation reachable along several paths
//! counts once. Closures are walked on demand; nodes of one strongly connected
//! component share a closure, so callers memoise by `component`.

use crate::stats::{ExecStats, Snapshot};
use log::debug;

/// Fixed-size set of arena indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
        }
    }

    pub fn insert(&mut self, index: usize) {
        self.words[index / 64] |= 1 << (index % 64);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|word| word & (1 << (index % 64)) != 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            (0..64)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| w * 64 + bit)
        })
    }
}

/// Graph view over a snapshot's records (same arena indices)
#[derive(Debug, Clone)]
pub struct GraphView {
    inputs: Vec<Vec<usize>>,
    roots: Vec<usize>,
    component: Vec<usize>,
}

impl GraphView {
    pub fn build(snapshot: &Snapshot) -> Self {
        let count = snapshot.records.len();
        let mut inputs = vec![Vec::new(); count];
        let mut consumed = vec![false; count];

        for (i, record) in snapshot.records.iter().enumerate() {
            for name in record.def.input_ops() {
                match snapshot.index_of(name) {
                    Some(j) => {
                        inputs[i].push(j);
                        if j != i {
                            consumed[j] = true;
                        }
                    }
                    None => debug!("{} reads from undeclared operation {}", record.name(), name),
                }
            }
            inputs[i].sort_unstable();
            inputs[i].dedup();
        }

        let roots = find_roots(&inputs, &consumed);
        let (component, members) = strongly_connected_components(&inputs);

        debug!(
            "Graph view: {} operations, {} roots, {} components",
            count,
            roots.len(),
            members.len()
        );

        Self {
            inputs,
            roots,
            component,
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Producers of `node`, ascending by name
    pub fn inputs(&self, node: usize) -> &[usize] {
        &self.inputs[node]
    }

    /// Entry points: unconsumed operations, then one per unreached cycle
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Strongly connected component of `node`; equal ids share a closure
    pub fn component(&self, node: usize) -> usize {
        self.component[node]
    }

    /// Every operation `node` depends on, itself included
    pub fn closure(&self, node: usize) -> BitSet {
        let mut reached = BitSet::new(self.len());
        let mut stack = vec![node];
        reached.insert(node);

        while let Some(current) = stack.pop() {
            for &next in &self.inputs[current] {
                if !reached.contains(next) {
                    reached.insert(next);
                    stack.push(next);
                }
            }
        }

        reached
    }

    /// Roll-up of `node`: each operation in its closure counted once
    pub fn closure_total(&self, node: usize, stats: &[ExecStats]) -> ExecStats {
        self.closure(node).iter().map(|i| stats[i]).sum()
    }
}

/// **Private** - unconsumed nodes first, then the smallest unreached node of each leftover cycle
fn find_roots(inputs: &[Vec<usize>], consumed: &[bool]) -> Vec<usize> {
    let mut reached = vec![false; inputs.len()];
    let mut roots = Vec::new();

    let mark_from = |start: usize, reached: &mut Vec<bool>| {
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if reached[node] {
                continue;
            }
            reached[node] = true;
            stack.extend(inputs[node].iter().copied().filter(|&next| !reached[next]));
        }
    };

    for node in (0..inputs.len()).filter(|&n| !consumed[n]) {
        roots.push(node);
        mark_from(node, &mut reached);
    }

    for node in 0..inputs.len() {
        if !reached[node] {
            roots.push(node);
            mark_from(node, &mut reached);
        }
    }

    roots
}

/// Iterative Tarjan; component ids come out in reverse topological order
///
/// **Private** - returns (component of each node, members of each component)
fn strongly_connected_components(adj: &[Vec<usize>]) -> (Vec<usize>, Vec<Vec<usize>>) {
    const UNVISITED: usize = usize::MAX;

    let count = adj.len();
    let mut index = vec![UNVISITED; count];
    let mut lowlink = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut component = vec![UNVISITED; count];
    let mut members: Vec<Vec<usize>> = Vec::new();
    let mut next_index = 0;

    // (node, position of the next edge to explore)
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for start in 0..count {
        if index[start] != UNVISITED {
            continue;
        }

        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        frames.push((start, 0));

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;

            if frame.1 < adj[node].len() {
                let next = adj[node][frame.1];
                frame.1 += 1;

                if index[next] == UNVISITED {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    frames.push((next, 0));
                } else if on_stack[next] {
                    lowlink[node] = lowlink[node].min(index[next]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }

            if lowlink[node] == index[node] {
                let id = members.len();
                let mut scc = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component[member] = id;
                    scc.push(member);
                    if member == node {
                        break;
                    }
                }
                members.push(scc);
            }
        }
    }

    (component, members)
}
