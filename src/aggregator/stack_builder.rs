//! Build collapsed stack format from a result tree.
//!
//! Collapsed stacks are the input format for flamegraph generation.
//! Format: "parent;child;grandchild weight"
//!
//! Example: "dense;matmul 1000"
//! This means: the scope dense holds matmul, which took 1000 of the metric.

use crate::aggregator::metrics::Metric;
use crate::schema::GraphNodeProfile;
use crate::utils::config::SCOPE_DELIMITER;
use log::debug;
use std::collections::HashMap;

/// A single collapsed stack entry
///
/// **Public** - used by flamegraph generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedStack {
    /// Stack trace as semicolon-separated string
    pub stack: String,

    /// Weight (self value of the last frame)
    pub weight: u64,
}

impl CollapsedStack {
    /// Create a new collapsed stack
    ///
    /// **Public** - constructor
    pub fn new(stack: String, weight: u64) -> Self {
        Self { stack, weight }
    }

    /// Render as one line of collapsed-stack input
    pub fn to_line(&self) -> String {
        format!("{} {}", self.stack, self.weight)
    }
}

/// Build collapsed stacks from a result tree
///
/// **Public** - main entry point for stack building
///
/// # Arguments
/// * `root` - Result tree; the root itself is not a frame
/// * `metric` - Metric used as the stack weight
///
/// # Returns
/// One stack per node with a non-zero self value, heaviest first
///
/// # Algorithm
/// 1. Walk the tree depth first, carrying the frame path
/// 2. A child named `parent/child` gets the frame `child`
/// 3. Aggregate by unique stack (sum weights)
pub fn build_collapsed_stacks(root: &GraphNodeProfile, metric: Metric) -> Vec<CollapsedStack> {
    let mut stack_map: HashMap<String, u64> = HashMap::new();

    // (node, parent name, frame path so far)
    let mut pending: Vec<(&GraphNodeProfile, &str, String)> = root
        .children
        .iter()
        .map(|child| (child, root.name.as_str(), String::new()))
        .collect();

    while let Some((node, parent, prefix)) = pending.pop() {
        let frame = frame_name(&node.name, parent);
        let path = if prefix.is_empty() {
            frame.to_string()
        } else {
            format!("{};{}", prefix, frame)
        };

        let weight = node.self_stats.value(metric);
        if weight > 0 {
            *stack_map.entry(path.clone()).or_insert(0) += weight;
        }

        for child in &node.children {
            pending.push((child, node.name.as_str(), path.clone()));
        }
    }

    let mut stacks: Vec<CollapsedStack> = stack_map
        .into_iter()
        .map(|(stack, weight)| CollapsedStack::new(stack, weight))
        .collect();

    stacks.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.stack.cmp(&b.stack)));

    debug!("Built {} unique collapsed stacks", stacks.len());

    stacks
}

/// Last scope segment when the node sits under its own scope parent
///
/// **Private** - frames may not contain ';' (the collapsed-stack separator)
fn frame_name<'a>(name: &'a str, parent: &str) -> std::borrow::Cow<'a, str> {
    let frame = name
        .strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix(SCOPE_DELIMITER))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(name);

    if frame.contains(';') {
        std::borrow::Cow::Owned(frame.replace(';', ":"))
    } else {
        std::borrow::Cow::Borrowed(frame)
    }
}
