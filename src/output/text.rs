//! Indented text rendering of query results.
//!
//! Each line shows a node and, for every selected metric, `self/total`:
//!
//! ```text
//! _root (micros 0us/1.25ms, bytes 0B/4.00KB)
//!   dense (micros 0us/1.20ms, bytes 0B/4.00KB)
//!     dense/matmul (micros 1.20ms/1.20ms, bytes 4.00KB/4.00KB)
//! ```

use crate::aggregator::Metric;
use crate::schema::{GraphNodeProfile, ProfileResult};
use crate::stats::ExecStats;

/// Render any query result as an indented report
pub fn render_result(result: &ProfileResult, select: &[Metric]) -> String {
    let root = match result {
        ProfileResult::Graph(root) | ProfileResult::Scope(root) => root,
        ProfileResult::Operations(table) => {
            let mut lines = vec![format!(
                "{} ({})",
                table.name,
                metric_summary(&ExecStats::default(), &table.total_stats, select)
            )];
            for bucket in &table.op_types {
                render_tree(bucket, 1, select, &mut lines);
            }
            return lines.join("\n");
        }
    };

    let mut lines = Vec::new();
    render_tree(root, 0, select, &mut lines);
    lines.join("\n")
}

fn render_tree(root: &GraphNodeProfile, depth: usize, select: &[Metric], lines: &mut Vec<String>) {
    let mut pending = vec![(root, depth)];

    while let Some((node, depth)) = pending.pop() {
        let mut line = format!(
            "{}{} ({})",
            "  ".repeat(depth),
            node.name,
            metric_summary(&node.self_stats, &node.total_stats, select)
        );
        if node.collapsed > 0 {
            line.push_str(&format!(" [{} hidden]", node.collapsed));
        }
        lines.push(line);

        pending.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }
}

fn metric_summary(self_stats: &ExecStats, total_stats: &ExecStats, select: &[Metric]) -> String {
    select
        .iter()
        .map(|&metric| {
            format!(
                "{} {}/{}",
                metric,
                format_value(metric, self_stats.value(metric)),
                format_value(metric, total_stats.value(metric))
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_value(metric: Metric, value: u64) -> String {
    if metric.is_time() {
        format_micros(value)
    } else if metric.is_memory() {
        format_bytes(value)
    } else {
        value.to_string()
    }
}

/// Human-readable duration ("830us", "1.25ms", "3.10sec")
pub fn format_micros(micros: u64) -> String {
    match micros {
        0..=999 => format!("{}us", micros),
        1_000..=999_999 => format!("{:.2}ms", micros as f64 / 1_000.0),
        _ => format!("{:.2}sec", micros as f64 / 1_000_000.0),
    }
}

/// Human-readable byte count ("512B", "4.00KB", "1.50MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < MB {
        format!("{:.2}KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2}MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MultiNodeProfile;
    use pretty_assertions::assert_eq;

    fn node(name: &str, micros: u64, bytes: u64, children: Vec<GraphNodeProfile>) -> GraphNodeProfile {
        let stats = ExecStats {
            exec_micros: micros,
            requested_bytes: bytes,
            ..Default::default()
        };
        let total = children.iter().map(|c| c.total_stats).sum::<ExecStats>() + stats;
        GraphNodeProfile {
            name: name.to_string(),
            op_type: None,
            self_stats: stats,
            total_stats: total,
            collapsed: 0,
            children,
        }
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_micros(830), "830us");
        assert_eq!(format_micros(1_250), "1.25ms");
        assert_eq!(format_micros(3_100_000), "3.10sec");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(4096), "4.00KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.50MB");
    }

    #[test]
    fn test_render_tree() {
        let mut others = node("_others", 50, 0, vec![]);
        others.collapsed = 3;
        let root = node(
            "_root",
            0,
            0,
            vec![node("dense", 0, 0, vec![node("dense/matmul", 1_200, 4096, vec![])]), others],
        );

        let text = render_result(&ProfileResult::Scope(root), &[Metric::Micros, Metric::Bytes]);
        assert_eq!(
            text,
            "_root (micros 0us/1.25ms, bytes 0B/4.00KB)\n\
             \x20\x20dense (micros 0us/1.20ms, bytes 0B/4.00KB)\n\
             \x20\x20\x20\x20dense/matmul (micros 1.20ms/1.20ms, bytes 4.00KB/4.00KB)\n\
             \x20\x20_others (micros 50us/50us, bytes 0B/0B) [3 hidden]"
        );
    }

    #[test]
    fn test_render_operations() {
        let table = MultiNodeProfile {
            name: "_root".to_string(),
            total_stats: ExecStats {
                run_count: 2,
                ..Default::default()
            },
            op_types: vec![node("MatMul", 0, 0, vec![])],
        };

        let text = render_result(&ProfileResult::Operations(table), &[Metric::Occurrence]);
        assert_eq!(text, "_root (occurrence 0/2)\n  MatMul (occurrence 0/0)");
    }
}
