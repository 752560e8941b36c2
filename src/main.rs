//! graphprof CLI
//!
//! Aggregates step traces of a dataflow graph and reports where time and
//! memory go, by graph structure, name scope or operation type.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use graph_profiler::commands::{
    display_schema, display_version, execute_profile, execute_query, validate_args,
    validate_query_args, validate_snapshot_file, ProfileArgs, QueryArgs, QuerySnapshotArgs,
    TraceInput,
};
use graph_profiler::flamegraph::FlamegraphConfig;
use graph_profiler::options::{QueryOptions, StepFilter};
use graph_profiler::topology::ViewKind;

/// graphprof - execution profiles for dataflow graphs
#[derive(Parser, Debug)]
#[command(name = "graphprof")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Query flags shared by `profile` and `query`
#[derive(clap::Args, Debug)]
struct QueryFlags {
    /// View to aggregate by: graph, scope or op
    #[arg(long, default_value = "scope")]
    view: ViewKind,

    /// Metric to order siblings by (micros, accelerator_micros, cpu_micros, bytes, peak_bytes, occurrence)
    #[arg(long)]
    order_by: Option<String>,

    /// Levels shown below the root (default 100)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Siblings shown per parent
    #[arg(long)]
    max_children: Option<usize>,

    /// Hide nodes below this many microseconds
    #[arg(long)]
    min_micros: Option<u64>,

    /// Hide nodes below this many requested bytes
    #[arg(long)]
    min_bytes: Option<u64>,

    /// Only read this step (default: sum over all steps)
    #[arg(long, allow_hyphen_values = true)]
    step: Option<i64>,

    /// Comma-separated metrics to report
    #[arg(long)]
    select: Option<String>,

    /// TOML file with query options; flags override it
    #[arg(long, env = "GRAPHPROF_OPTIONS")]
    options: Option<PathBuf>,

    /// Output path for the JSON result
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output path for a scope flamegraph SVG
    #[arg(short, long)]
    flamegraph: Option<PathBuf>,

    /// Flamegraph title
    #[arg(long)]
    title: Option<String>,

    /// Flamegraph width in pixels
    #[arg(long, default_value = "1200")]
    width: usize,

    /// Print hot-path summary to stdout
    #[arg(long)]
    summary: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest step traces for a graph and run a query
    Profile {
        /// Graph definition JSON
        #[arg(short, long)]
        graph: PathBuf,

        /// Step trace JSON, as FILE or STEP=FILE (repeatable)
        #[arg(short, long = "trace", required = true, allow_hyphen_values = true)]
        traces: Vec<TraceInput>,

        /// Output path for the profile snapshot
        #[arg(long)]
        snapshot: Option<PathBuf>,

        #[command(flatten)]
        query: QueryFlags,
    },

    /// Re-query a saved profile snapshot
    Query {
        /// Snapshot written by `profile --snapshot`
        #[arg(short, long)]
        snapshot: PathBuf,

        #[command(flatten)]
        query: QueryFlags,
    },

    /// Validate a profile snapshot file
    Validate {
        /// Path to snapshot JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

impl QueryFlags {
    /// Merge the options file and flags into query arguments
    fn into_query_args(self) -> Result<QueryArgs> {
        let mut options = match &self.options {
            Some(path) => QueryOptions::from_toml_file(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?,
            None => QueryOptions::default(),
        };

        if let Some(step) = self.step {
            options.step = StepFilter::Only(step);
        }
        if let Some(depth) = self.max_depth {
            options.max_depth = depth;
        }
        if self.max_children.is_some() {
            options.max_children = self.max_children;
        }
        if let Some(micros) = self.min_micros {
            options.min_micros = micros;
        }
        if let Some(bytes) = self.min_bytes {
            options.min_bytes = bytes;
        }

        let flamegraph_config = self.flamegraph.as_ref().map(|_| {
            let mut config = FlamegraphConfig::new();
            if let Some(title) = &self.title {
                config = config.with_title(title.clone());
            }
            config.width = self.width;
            config
        });

        Ok(QueryArgs {
            view: self.view,
            options,
            order_by: self.order_by,
            select: self.select,
            output: self.output,
            flamegraph: self.flamegraph,
            flamegraph_config,
            print_summary: self.summary,
        })
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Profile {
            graph,
            traces,
            snapshot,
            query,
        } => {
            let args = ProfileArgs {
                graph,
                traces,
                snapshot,
                query: query.into_query_args()?,
            };

            // Validate args first
            validate_args(&args)?;
            execute_profile(args)?;
        }

        Commands::Query { snapshot, query } => {
            let query = query.into_query_args()?;
            validate_query_args(&query)?;
            execute_query(QuerySnapshotArgs { snapshot, query })?;
        }

        Commands::Validate { file } => {
            validate_snapshot_file(&file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
