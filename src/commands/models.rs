use crate::flamegraph::FlamegraphConfig;
use crate::options::QueryOptions;
use crate::topology::ViewKind;
use std::path::PathBuf;
use std::str::FromStr;

/// A trace file given on the command line as `[STEP=]FILE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceInput {
    /// Explicit step key; position in the argument list when absent
    pub step: Option<i64>,
    pub path: PathBuf,
}

impl FromStr for TraceInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("trace path cannot be empty".to_string());
        }

        // Only an integer before the first '=' is a step key; "lr=0.1/x.json" is a path
        let keyed = s
            .split_once('=')
            .and_then(|(step, path)| step.trim().parse::<i64>().ok().map(|step| (step, path)));

        match keyed {
            Some((_, "")) => Err(format!("missing trace path in '{}'", s)),
            Some((step, path)) => Ok(Self {
                step: Some(step),
                path: PathBuf::from(path),
            }),
            None => Ok(Self {
                step: None,
                path: PathBuf::from(s),
            }),
        }
    }
}

/// Everything needed to run one query
///
/// **Public** - shared by the profile and query commands
#[derive(Debug, Clone)]
pub struct QueryArgs {
    pub view: ViewKind,

    /// Options after merging the options file and command-line flags
    pub options: QueryOptions,

    /// Metric name to order by, checked by the profiler
    pub order_by: Option<String>,

    /// Comma-separated metric names to report, checked by the profiler
    pub select: Option<String>,

    /// Output path for the JSON result (optional)
    pub output: Option<PathBuf>,

    /// Output path for the scope flamegraph SVG (optional)
    pub flamegraph: Option<PathBuf>,

    /// Flamegraph configuration
    pub flamegraph_config: Option<FlamegraphConfig>,

    /// Print hot-path summary to stdout
    pub print_summary: bool,
}

impl Default for QueryArgs {
    fn default() -> Self {
        Self {
            view: ViewKind::Scope,
            options: QueryOptions::default(),
            order_by: None,
            select: None,
            output: None,
            flamegraph: None,
            flamegraph_config: None,
            print_summary: false,
        }
    }
}

/// Arguments for the profile command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone, Default)]
pub struct ProfileArgs {
    /// Graph definition JSON
    pub graph: PathBuf,

    /// Step traces, ingested in order
    pub traces: Vec<TraceInput>,

    /// Output path for the profile snapshot (optional)
    pub snapshot: Option<PathBuf>,

    pub query: QueryArgs,
}

/// Arguments for the query command
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshotArgs {
    /// Snapshot written by `profile --snapshot`
    pub snapshot: PathBuf,

    pub query: QueryArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_input_parse() {
        let plain: TraceInput = "run/trace.json".parse().unwrap();
        assert_eq!(plain.step, None);
        assert_eq!(plain.path, PathBuf::from("run/trace.json"));

        let keyed: TraceInput = "-3=step.json".parse().unwrap();
        assert_eq!(keyed.step, Some(-3));
        assert_eq!(keyed.path, PathBuf::from("step.json"));

        let with_equals: TraceInput = "runs/lr=0.1/trace.json".parse().unwrap();
        assert_eq!(with_equals.step, None);
        assert_eq!(with_equals.path, PathBuf::from("runs/lr=0.1/trace.json"));

        let keyed_equals: TraceInput = "2=runs/lr=0.1/trace.json".parse().unwrap();
        assert_eq!(keyed_equals.step, Some(2));
        assert_eq!(keyed_equals.path, PathBuf::from("runs/lr=0.1/trace.json"));

        assert!("4=".parse::<TraceInput>().is_err());
        assert!("".parse::<TraceInput>().is_err());
    }
}
