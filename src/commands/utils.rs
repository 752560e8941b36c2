use crate::output::read_snapshot;
use crate::profiler::check_version;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Validate a profile snapshot file
pub fn validate_snapshot_file(file_path: &Path) -> Result<()> {
    println!("Validating snapshot: {}", file_path.display());

    let snapshot = read_snapshot(file_path)?;
    check_version(&snapshot.version).context("Snapshot version is not supported")?;

    let op_types: BTreeSet<&str> = snapshot.operations.iter().map(|r| r.op_type()).collect();

    println!("✓ Valid profile snapshot");
    println!("  Version: {}", snapshot.version);
    println!("  Generated: {}", snapshot.generated_at);
    println!("  Steps: {}", snapshot.steps.len());
    println!("  Operations: {}", snapshot.operations.len());
    println!("  Op Types: {}", op_types.len());

    Ok(())
}

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("Graph Profiler Snapshot Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string           - Schema version (e.g., '1.0.0')");
        println!("  generated_at: string      - RFC 3339 timestamp");
        println!("  steps: object             - Step key -> traces ingested under it");
        println!("  operations: array         - One record per operation, sorted by name");
        println!("    def: object             - Declared operation");
        println!("      name: string          - Unique operation name");
        println!("      op: string            - Operation type");
        println!("      inputs: array         - Input names");
        println!("      scope: string?        - Name scope (defaults to name)");
        println!("      device: string?       - Placement");
        println!("    steps: object           - Step key -> accumulated stats");
        println!("      exec_micros: number");
        println!("      accelerator_micros: number");
        println!("      cpu_micros: number");
        println!("      requested_bytes: number");
        println!("      peak_bytes: number");
        println!("      run_count: number");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("graphprof v{}", env!("CARGO_PKG_VERSION"));
    println!("Snapshot Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Step-indexed execution profiles for dataflow graphs.");
}
