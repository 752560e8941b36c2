//! Query facade.
//!
//! `Profiler` owns the statistics store and a cached, indexed snapshot.
//! Ingest goes straight to the store; every query first validates its
//! options, then reads the snapshot for the current store version,
//! rebuilding it only when a step was committed since the last query.

use crate::aggregator::{self, Metric};
use crate::options::QueryOptions;
use crate::parser::graph_def::GraphDef;
use crate::parser::run_trace::parse_step_trace;
use crate::schema::{GraphNodeProfile, MultiNodeProfile, ProfileResult, ProfileSnapshot};
use crate::stats::{ExecStats, OperationRecord, StatsStore, StepSummary};
use crate::topology::{IndexedSnapshot, ViewKind};
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::{GraphError, OptionsError, SerializeError, TraceError};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Step-indexed profiler over one dataflow graph
///
/// **Public** - `Send + Sync`; share across threads with `Arc`
#[derive(Debug)]
pub struct Profiler {
    store: StatsStore,
    cache: Mutex<Option<Arc<IndexedSnapshot>>>,
}

impl Profiler {
    /// Create a profiler for a graph definition
    ///
    /// # Errors
    /// * `GraphError` - duplicate names or malformed / shared scopes
    pub fn new(graph: GraphDef) -> Result<Self, GraphError> {
        let store = StatsStore::from_graph(&graph)?;
        Ok(Self::with_store(store))
    }

    /// Create a profiler from a JSON graph definition
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Self::new(GraphDef::from_json(json)?)
    }

    fn with_store(store: StatsStore) -> Self {
        Self {
            store,
            cache: Mutex::new(None),
        }
    }

    /// Ingest one step trace
    ///
    /// **Public** - main ingest entry point
    ///
    /// # Arguments
    /// * `step` - Step key; repeated keys accumulate
    /// * `trace` - Raw trace document
    ///
    /// # Errors
    /// * `TraceError` - the trace is malformed or conflicts with the graph.
    ///   Nothing from the step is recorded; earlier steps are unaffected.
    pub fn add_step(&self, step: i64, trace: &Value) -> Result<StepSummary, TraceError> {
        let result = parse_step_trace(step, trace).and_then(|parsed| self.store.commit(&parsed));

        match &result {
            Ok(summary) => debug!(
                "Step {} added: {} operations, {} micros",
                step, summary.operations, summary.total.exec_micros
            ),
            Err(e) => warn!("Skipping step {}: {}", step, e),
        }

        result
    }

    /// Ingest one step trace from JSON text
    pub fn add_step_json(&self, step: i64, json: &str) -> Result<StepSummary, TraceError> {
        let trace: Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                warn!("Skipping step {}: {}", step, e);
                return Err(TraceError::Json(e));
            }
        };
        self.add_step(step, &trace)
    }

    /// Operations organised by dataflow structure
    pub fn profile_graph(&self, options: &QueryOptions) -> Result<GraphNodeProfile, OptionsError> {
        let indexed = self.prepare(options)?;
        Ok(aggregator::aggregate_tree(&indexed, ViewKind::Graph, options))
    }

    /// Operations organised by name scope
    pub fn profile_name_scope(&self, options: &QueryOptions) -> Result<GraphNodeProfile, OptionsError> {
        let indexed = self.prepare(options)?;
        Ok(aggregator::aggregate_tree(&indexed, ViewKind::Scope, options))
    }

    /// Operations bucketed by op type
    pub fn profile_operations(&self, options: &QueryOptions) -> Result<MultiNodeProfile, OptionsError> {
        let indexed = self.prepare(options)?;
        Ok(aggregator::aggregate_operations(&indexed, options))
    }

    /// Run a query against any view
    ///
    /// # Errors
    /// * `OptionsError` - rejected before any statistics are read
    pub fn profile(&self, kind: ViewKind, options: &QueryOptions) -> Result<ProfileResult, OptionsError> {
        let indexed = self.prepare(options)?;
        let result = aggregator::aggregate(&indexed, kind, options);

        debug!(
            "{} query at version {}: {} micros total",
            kind,
            indexed.version(),
            result.total_stats().exec_micros
        );
        Ok(result)
    }

    /// Query with metric names given as strings (CLI and config input)
    pub fn profile_by_names(
        &self,
        kind: ViewKind,
        options: QueryOptions,
        order_by: Option<&str>,
        select: Option<&str>,
    ) -> Result<ProfileResult, OptionsError> {
        let mut options = options;
        if let Some(name) = order_by {
            options.order_by = name.parse::<Metric>()?;
        }
        if let Some(list) = select {
            options.select = aggregator::parse_metric_list(list)?;
        }
        self.profile(kind, &options)
    }

    /// Validate options, then pin the snapshot the query reads
    fn prepare(&self, options: &QueryOptions) -> Result<Arc<IndexedSnapshot>, OptionsError> {
        options.validate(|step| self.store.has_step(step))?;
        Ok(self.indexed())
    }

    /// Snapshot for the current store version, rebuilt if stale
    fn indexed(&self) -> Arc<IndexedSnapshot> {
        let mut cache = self.cache.lock();

        if let Some(indexed) = cache.as_ref() {
            if indexed.version() == self.store.version() {
                return Arc::clone(indexed);
            }
        }

        let indexed = Arc::new(IndexedSnapshot::new(self.store.snapshot()));
        debug!("Rebuilt snapshot at version {}", indexed.version());
        *cache = Some(Arc::clone(&indexed));
        indexed
    }

    /// Encode every record and step count as a versioned JSON snapshot
    ///
    /// # Errors
    /// * `SerializeError::Encode` - JSON encoding failed
    pub fn serialize_to_string(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = self.to_snapshot();
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(SerializeError::Encode)?;

        info!(
            "Serialized {} operations over {} steps ({} bytes)",
            snapshot.operations.len(),
            snapshot.steps.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Current state as a snapshot document
    pub fn to_snapshot(&self) -> ProfileSnapshot {
        let indexed = self.indexed();
        let snapshot = indexed.snapshot();
        ProfileSnapshot::new(snapshot.steps.clone(), snapshot.records.clone())
    }

    /// Rebuild a profiler from `serialize_to_string` output
    ///
    /// # Errors
    /// * `SerializeError::Decode` - not a snapshot document
    /// * `SerializeError::IncompatibleVersion` - different major version
    /// * `SerializeError::InvalidGraph` - the records fail graph validation
    pub fn from_serialized(bytes: &[u8]) -> Result<Self, SerializeError> {
        let snapshot: ProfileSnapshot = serde_json::from_slice(bytes).map_err(SerializeError::Decode)?;
        Self::from_snapshot(snapshot)
    }

    /// Rebuild a profiler from a decoded snapshot
    pub fn from_snapshot(snapshot: ProfileSnapshot) -> Result<Self, SerializeError> {
        check_version(&snapshot.version)?;

        info!(
            "Loaded snapshot generated at {} ({} operations)",
            snapshot.generated_at,
            snapshot.operations.len()
        );

        let store = StatsStore::from_records(snapshot.operations, snapshot.steps)?;
        Ok(Self::with_store(store))
    }

    /// Step keys ingested so far, ascending
    pub fn steps(&self) -> Vec<i64> {
        self.store.steps()
    }

    pub fn operation_count(&self) -> usize {
        self.store.operation_count()
    }

    /// Current record for one operation
    pub fn operation(&self, name: &str) -> Option<OperationRecord> {
        self.store.get(name)
    }

    /// One operation's stats under the step filter of `options`
    pub fn op_stats(&self, name: &str, options: &QueryOptions) -> Option<ExecStats> {
        self.store.get(name).map(|record| record.stats_for(options.step))
    }
}

/// Reject snapshots written by a different major schema version
///
/// **Public** - also used by the `validate` command
pub fn check_version(found: &str) -> Result<(), SerializeError> {
    let major = |v: &str| v.split('.').next().unwrap_or_default().to_string();

    if major(found).is_empty() || major(found) != major(SCHEMA_VERSION) {
        return Err(SerializeError::IncompatibleVersion {
            found: found.to_string(),
            expected: SCHEMA_VERSION.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::graph_def::OpDef;
    use serde_json::json;

    fn profiler() -> Profiler {
        Profiler::new(GraphDef::new(vec![
            OpDef::new("x", "Placeholder"),
            OpDef::new("y", "Neg").with_inputs(["x"]),
        ]))
        .unwrap()
    }

    fn trace(x: i64, y: i64) -> Value {
        json!({
            "dev_stats": [{
                "device": "/cpu:0",
                "node_stats": [
                    {"node_name": "x", "all_start_micros": 1, "all_end_rel_micros": x},
                    {"node_name": "y", "all_start_micros": 2, "all_end_rel_micros": y}
                ]
            }]
        })
    }

    #[test]
    fn test_profiler_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Profiler>();
    }

    #[test]
    fn test_cache_follows_version() {
        let profiler = profiler();
        let first = profiler.indexed();
        assert!(Arc::ptr_eq(&first, &profiler.indexed()));

        profiler.add_step(0, &trace(3, 4)).unwrap();
        let second = profiler.indexed();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.snapshot().total(Default::default()).exec_micros, 7);
    }

    #[test]
    fn test_failed_step_leaves_state() {
        let profiler = profiler();
        profiler.add_step(0, &trace(3, 4)).unwrap();

        assert!(profiler.add_step(1, &trace(3, -4)).is_err());
        assert!(profiler.add_step_json(2, "{not json").is_err());
        assert_eq!(profiler.steps(), vec![0]);
        assert_eq!(profiler.op_stats("y", &QueryOptions::default()).unwrap().exec_micros, 4);
    }

    #[test]
    fn test_typed_views_match_generic_query() {
        let profiler = profiler();
        profiler.add_step(0, &trace(3, 4)).unwrap();
        let options = QueryOptions::default();

        let graph = profiler.profile_graph(&options).unwrap();
        assert_eq!(profiler.profile(ViewKind::Graph, &options).unwrap(), ProfileResult::Graph(graph.clone()));
        assert_eq!(graph.children[0].name, "y");

        let scope = profiler.profile_name_scope(&options).unwrap();
        assert_eq!(profiler.profile(ViewKind::Scope, &options).unwrap(), ProfileResult::Scope(scope));

        let table = profiler.profile_operations(&options).unwrap();
        let buckets: Vec<&str> = table.op_types.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(buckets, vec!["Neg", "Placeholder"]);
        assert_eq!(profiler.profile(ViewKind::Type, &options).unwrap(), ProfileResult::Operations(table));
    }

    #[test]
    fn test_metric_names_checked() {
        let profiler = profiler();
        let err = profiler
            .profile_by_names(ViewKind::Graph, QueryOptions::default(), Some("flops"), None)
            .unwrap_err();
        assert!(matches!(err, OptionsError::UnknownMetric(_)));

        let ok = profiler.profile_by_names(
            ViewKind::Scope,
            QueryOptions::default(),
            Some("bytes"),
            Some("micros,peak_bytes"),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_check_version() {
        assert!(check_version("1.4.2").is_ok());
        assert!(check_version("2.0.0").is_err());
        assert!(check_version("").is_err());
    }
}
