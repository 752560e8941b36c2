//! Profile and query command implementations.
//!
//! The profile command:
//! 1. Loads the graph definition
//! 2. Ingests every step trace (bad steps are skipped with a warning)
//! 3. Runs the requested query
//! 4. Writes the result, snapshot and flamegraph outputs
//!
//! The query command does steps 3 and 4 against a saved snapshot.

use super::models::{ProfileArgs, QueryArgs, QuerySnapshotArgs};
use crate::aggregator::{build_collapsed_stacks, calculate_distribution};
use crate::flamegraph::{generate_flamegraph, generate_text_summary, FlamegraphConfig};
use crate::output::{read_snapshot, render_result, write_result, write_snapshot, write_svg};
use crate::profiler::Profiler;
use crate::schema::ProfileResult;
use crate::stats::ExecStats;
use crate::topology::ViewKind;
use crate::utils::config::MAX_QUERY_DEPTH;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::time::Instant;

/// Execute the profile command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Unreadable or invalid graph definition
/// * Unreadable trace files (malformed trace contents only skip the step)
/// * Rejected query options
/// * File write errors
pub fn execute_profile(args: ProfileArgs) -> Result<ProfileResult> {
    let start_time = Instant::now();

    info!("Step 1/3: Loading graph definition from {}", args.graph.display());
    let graph_json = fs::read_to_string(&args.graph)
        .with_context(|| format!("Failed to read graph definition {}", args.graph.display()))?;
    let profiler = Profiler::from_json(&graph_json).context("Failed to build profiler from graph definition")?;

    info!("Step 2/3: Ingesting {} step traces...", args.traces.len());
    let mut skipped = 0;
    for (position, input) in args.traces.iter().enumerate() {
        let step = input.step.unwrap_or(position as i64);
        let raw = fs::read_to_string(&input.path)
            .with_context(|| format!("Failed to read trace {}", input.path.display()))?;

        match profiler.add_step_json(step, &raw) {
            Ok(summary) => debug!(
                "Step {} from {}: {} operations ({} new)",
                step,
                input.path.display(),
                summary.operations,
                summary.new_operations
            ),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("{} of {} step traces were skipped", skipped, args.traces.len());
    }

    if let Some(snapshot_path) = &args.snapshot {
        write_snapshot(&profiler.to_snapshot(), snapshot_path).context("Failed to write profile snapshot")?;
        info!("✓ Snapshot written to: {}", snapshot_path.display());
    }

    info!("Step 3/3: Running {} query...", args.query.view);
    let result = run_query(&profiler, &args.query)?;

    info!("Profile completed in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(result)
}

/// Execute the query command against a saved snapshot
pub fn execute_query(args: QuerySnapshotArgs) -> Result<ProfileResult> {
    info!("Loading snapshot from {}", args.snapshot.display());

    let snapshot = read_snapshot(&args.snapshot)
        .with_context(|| format!("Failed to read snapshot {}", args.snapshot.display()))?;
    let profiler = Profiler::from_snapshot(snapshot).context("Snapshot cannot be loaded")?;

    run_query(&profiler, &args.query)
}

/// Run a query, print it, and write whatever outputs were requested
///
/// **Public** - shared by both commands
pub fn run_query(profiler: &Profiler, args: &QueryArgs) -> Result<ProfileResult> {
    let result = profiler
        .profile_by_names(
            args.view,
            args.options.clone(),
            args.order_by.as_deref(),
            args.select.as_deref(),
        )
        .context("Invalid query options")?;

    let select = match args.select.as_deref() {
        Some(list) => crate::aggregator::parse_metric_list(list)?,
        None => args.options.select.clone(),
    };
    println!("{}", render_result(&result, &select));

    let order_by = match args.order_by.as_deref() {
        Some(name) => name.parse()?,
        None => args.options.order_by,
    };

    let per_operation: Vec<ExecStats> = profiler
        .to_snapshot()
        .operations
        .iter()
        .map(|record| record.stats_for(args.options.step))
        .collect();
    let distribution = calculate_distribution(&per_operation, order_by);
    info!("Distribution: {}", distribution.summary());
    if distribution.is_highly_concentrated() {
        info!("Top 10% of operations account for most of the {}", order_by);
    }

    if let Some(output) = &args.output {
        write_result(&result, output).context("Failed to write query result")?;
        info!("✓ Result written to: {}", output.display());
    }

    if args.flamegraph.is_some() || args.print_summary {
        // Flamegraphs always follow name scopes
        let scope_root = match &result {
            ProfileResult::Scope(root) => root.clone(),
            _ => profiler.profile_name_scope(&args.options)?,
        };
        let stacks = build_collapsed_stacks(&scope_root, order_by);

        if let Some(svg_path) = &args.flamegraph {
            let config = args
                .flamegraph_config
                .clone()
                .unwrap_or_else(FlamegraphConfig::new)
                .with_metric(order_by);
            let svg = generate_flamegraph(&stacks, Some(&config)).context("Failed to generate flamegraph")?;
            write_svg(&svg, svg_path).context("Failed to write flamegraph SVG")?;
            info!("✓ Flamegraph written to: {}", svg_path.display());
        }

        if args.print_summary {
            println!("\n{}", "=".repeat(80));
            println!("PROFILE SUMMARY");
            println!("{}", "=".repeat(80));
            println!("Steps:       {:?}", profiler.steps());
            println!("Operations:  {}", profiler.operation_count());
            println!("Unique Stacks: {}", stacks.len());
            println!("\n{}", generate_text_summary(&stacks, 10, order_by));
            println!("{}", "=".repeat(80));
        }
    }

    Ok(result)
}

/// Validate profile arguments before touching any file
///
/// **Public** - can be called before execute_profile for early validation
pub fn validate_args(args: &ProfileArgs) -> Result<()> {
    if args.graph.as_os_str().is_empty() {
        anyhow::bail!("Graph definition path cannot be empty");
    }

    if args.traces.is_empty() {
        anyhow::bail!("At least one --trace is required");
    }

    validate_query_args(&args.query)
}

/// Validate the query part of the arguments
pub fn validate_query_args(args: &QueryArgs) -> Result<()> {
    if args.options.max_children == Some(0) {
        anyhow::bail!("max-children must be greater than 0");
    }

    if args.options.max_depth > MAX_QUERY_DEPTH {
        anyhow::bail!("max-depth is too large (max {})", MAX_QUERY_DEPTH);
    }

    if args.flamegraph.is_some() && args.view == ViewKind::Type {
        debug!("Flamegraph uses the scope view regardless of --view");
    }

    Ok(())
}
