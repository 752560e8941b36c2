//! SVG flamegraph generation through inferno.
//!
//! The scope result tree is flattened into collapsed stacks first; inferno
//! then lays them out and renders the SVG.

use crate::aggregator::stack_builder::CollapsedStack;
use crate::aggregator::Metric;
use crate::output::text::{format_bytes, format_micros};
use crate::utils::error::FlamegraphError;
use inferno::flamegraph::{self, Options};
use log::info;

/// Flamegraph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
    pub metric: Metric,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "Graph Profile".to_string(),
            width: 1200,
            metric: Metric::Micros,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }
}

/// Generate an SVG flamegraph from collapsed stacks
///
/// # Errors
/// * `FlamegraphError::EmptyStacks` - nothing has a non-zero weight
/// * `FlamegraphError::Render` - inferno failed to render
pub fn generate_flamegraph(
    stacks: &[CollapsedStack],
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if stacks.iter().all(|s| s.weight == 0) {
        return Err(FlamegraphError::EmptyStacks);
    }

    let config = config.cloned().unwrap_or_default();
    info!("Generating flamegraph with {} stacks", stacks.len());

    let lines: Vec<String> = stacks.iter().map(CollapsedStack::to_line).collect();

    let mut options = Options::default();
    options.title = config.title.clone();
    options.count_name = config.metric.to_string();
    options.image_width = Some(config.width);

    let mut svg = Vec::new();
    flamegraph::from_lines(&mut options, lines.iter().map(String::as_str), &mut svg)
        .map_err(|e| FlamegraphError::Render(e.to_string()))?;
    let svg = String::from_utf8(svg)?;

    info!("Flamegraph generated successfully ({} bytes)", svg.len());
    Ok(svg)
}

/// Plain-text table of the heaviest stacks
pub fn generate_text_summary(stacks: &[CollapsedStack], max_lines: usize, metric: Metric) -> String {
    let total = stacks.iter().map(|s| s.weight).sum::<u64>().max(1);
    let mut lines = Vec::new();

    lines.push(format!("  HOT PATHS by {}", metric));
    lines.push(format!("  {:<48} {:>12} {:>7}", "Stack (heaviest first)", metric.as_str(), "%"));
    lines.push(format!("  {}", "-".repeat(69)));

    for stack in stacks.iter().take(max_lines) {
        let percentage = (stack.weight as f64 / total as f64) * 100.0;
        let display_stack = if stack.stack.chars().count() > 48 {
            let tail: String = stack
                .stack
                .chars()
                .rev()
                .take(45)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("...{}", tail)
        } else {
            stack.stack.clone()
        };

        let weight = if metric.is_time() {
            format_micros(stack.weight)
        } else if metric.is_memory() {
            format_bytes(stack.weight)
        } else {
            stack.weight.to_string()
        };

        lines.push(format!("  {:<48} {:>12} {:>6.1}%", display_stack, weight, percentage));
    }

    if stacks.len() > max_lines {
        lines.push(String::new());
        lines.push(format!("   (Showing top {} of {} unique paths)", max_lines, stacks.len()));
    }

    lines.join("\n")
}
