//! Concurrent per-operation statistics store.
//!
//! # Design
//!
//! - DashMap keyed by operation name: writes lock only the target shard,
//!   so samples for different operations merge independently while samples
//!   for the same operation are serialized.
//! - Commit gate: every step is applied while holding the shared side of an
//!   `RwLock`, so independent steps ingest concurrently. Snapshots take the
//!   exclusive side and therefore never see half of a step.
//! - Steps that introduce new operations take the exclusive side, so scope
//!   checks and record creation for the whole step are atomic.
//! - Version counter bumped once per committed step; readers use it to
//!   decide whether a cached snapshot is still current.

use super::record::{ExecStats, OperationRecord};
use crate::options::StepFilter;
use crate::parser::graph_def::{is_valid_scope, GraphDef};
use crate::parser::run_trace::{OpSample, StepTrace};
use crate::utils::error::{GraphError, TraceError};
use dashmap::DashMap;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of committing one step trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    pub step: i64,

    /// Operations with a sample in this trace
    pub operations: usize,

    /// Operations first seen in this trace
    pub new_operations: usize,

    /// Sum over the trace's samples
    pub total: ExecStats,
}

/// Immutable copy of every record, taken between committed steps
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Store version the snapshot was taken at
    pub version: u64,

    /// Records sorted by operation name
    pub records: Vec<OperationRecord>,

    /// Step key -> number of traces committed under it
    pub steps: BTreeMap<i64, usize>,

    index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn new(version: u64, mut records: Vec<OperationRecord>, steps: BTreeMap<i64, usize>) -> Self {
        records.sort_by(|a, b| a.name().cmp(b.name()));
        let index = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.name().to_string(), i))
            .collect();

        Self {
            version,
            records,
            steps,
            index,
        }
    }

    /// Arena index of an operation
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_step(&self, step: i64) -> bool {
        self.steps.contains_key(&step)
    }

    /// Per-record stats under a step filter, in arena order
    pub fn self_stats(&self, filter: StepFilter) -> Vec<ExecStats> {
        self.records.iter().map(|r| r.stats_for(filter)).collect()
    }

    /// Sum over all records under a step filter
    pub fn total(&self, filter: StepFilter) -> ExecStats {
        self.records.iter().map(|r| r.stats_for(filter)).sum()
    }
}

/// The statistics store shared by ingest and queries
#[derive(Debug)]
pub struct StatsStore {
    records: DashMap<String, OperationRecord>,

    /// Full scope path -> owning operation
    scopes: Mutex<HashMap<String, String>>,

    steps: DashMap<i64, usize>,

    commit_gate: RwLock<()>,

    version: AtomicU64,
}

impl StatsStore {
    /// Create a store holding one empty record per declared operation
    ///
    /// # Errors
    /// Any `GraphError` reported by `GraphDef::validate`
    pub fn from_graph(graph: &GraphDef) -> Result<Self, GraphError> {
        graph.validate()?;

        let records = DashMap::with_capacity(graph.nodes.len());
        let mut scopes = HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            scopes.insert(node.scope_path().to_string(), node.name.clone());
            records.insert(node.name.clone(), OperationRecord::new(node.clone()));
        }

        info!("Statistics store created with {} operations", graph.nodes.len());

        Ok(Self {
            records,
            scopes: Mutex::new(scopes),
            steps: DashMap::new(),
            commit_gate: RwLock::new(()),
            version: AtomicU64::new(0),
        })
    }

    /// Rebuild a store from previously captured records
    pub fn from_records(
        records: Vec<OperationRecord>,
        steps: BTreeMap<i64, usize>,
    ) -> Result<Self, GraphError> {
        let graph = GraphDef::new(records.iter().map(|r| r.def.clone()).collect());
        let store = Self::from_graph(&graph)?;

        for record in records {
            store.records.insert(record.name().to_string(), record);
        }
        for (step, traces) in steps {
            store.steps.insert(step, traces);
        }

        Ok(store)
    }

    /// Current version; changes after every committed step
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Merge one sample into the running aggregate for its operation
    ///
    /// Creates the record from the sample's declaration when the operation
    /// is unseen.
    ///
    /// # Errors
    /// * `GraphError::InvalidScope` / `GraphError::DuplicateScope` - the new
    ///   operation's scope is malformed or already taken
    pub fn record(&self, step: i64, sample: &OpSample) -> Result<(), GraphError> {
        let name = sample.decl.name.as_str();

        if let Some(mut record) = self.records.get_mut(name) {
            record.merge(step, sample.stats);
            return Ok(());
        }

        let mut scopes = self.scopes.lock();
        let scope = sample.decl.scope_path();
        if !is_valid_scope(scope) {
            return Err(GraphError::InvalidScope {
                op: name.to_string(),
                scope: scope.to_string(),
            });
        }
        match scopes.get(scope) {
            Some(owner) if owner != name => {
                return Err(GraphError::DuplicateScope {
                    first: owner.clone(),
                    second: name.to_string(),
                    scope: scope.to_string(),
                });
            }
            Some(_) => {}
            None => {
                scopes.insert(scope.to_string(), name.to_string());
            }
        }

        debug!("Creating record for operation {} first seen in step {}", name, step);
        self.records
            .entry(name.to_string())
            .or_insert_with(|| OperationRecord::new(sample.decl.clone()))
            .merge(step, sample.stats);

        Ok(())
    }

    /// Apply a whole step trace atomically
    ///
    /// # Errors
    /// * `TraceError::Conflict` - a new operation clashes with the graph;
    ///   nothing from the step is recorded
    pub fn commit(&self, trace: &StepTrace) -> Result<StepSummary, TraceError> {
        let new_operations = trace
            .samples
            .keys()
            .filter(|name| !self.records.contains_key(name.as_str()))
            .count();

        if new_operations > 0 {
            let _gate = self.commit_gate.write();
            self.check_new_operations(trace)?;
            self.apply(trace)?;
        } else {
            let _gate = self.commit_gate.read();
            self.apply(trace)?;
        }

        debug!(
            "Committed step {} ({} operations, {} new)",
            trace.step,
            trace.samples.len(),
            new_operations
        );

        Ok(StepSummary {
            step: trace.step,
            operations: trace.samples.len(),
            new_operations,
            total: trace.total(),
        })
    }

    /// Validate every operation a trace would create, before touching the store
    ///
    /// **Private** - called with the commit gate held exclusively
    fn check_new_operations(&self, trace: &StepTrace) -> Result<(), TraceError> {
        let scopes = self.scopes.lock();
        let mut pending: HashMap<&str, &str> = HashMap::new();

        for (name, sample) in &trace.samples {
            if self.records.contains_key(name.as_str()) {
                continue;
            }

            let scope = sample.decl.scope_path();
            let conflict = if !is_valid_scope(scope) {
                Some(GraphError::InvalidScope {
                    op: name.clone(),
                    scope: scope.to_string(),
                })
            } else {
                let owner = scopes
                    .get(scope)
                    .map(String::as_str)
                    .or_else(|| pending.get(scope).copied());
                match owner {
                    Some(owner) if owner != name => Some(GraphError::DuplicateScope {
                        first: owner.to_string(),
                        second: name.clone(),
                        scope: scope.to_string(),
                    }),
                    _ => None,
                }
            };

            if let Some(source) = conflict {
                return Err(TraceError::Conflict {
                    step: trace.step,
                    source,
                });
            }
            pending.insert(scope, name);
        }

        Ok(())
    }

    /// **Private** - called with the commit gate held
    fn apply(&self, trace: &StepTrace) -> Result<(), TraceError> {
        for sample in trace.samples.values() {
            self.record(trace.step, sample)
                .map_err(|source| TraceError::Conflict {
                    step: trace.step,
                    source,
                })?;
        }

        *self.steps.entry(trace.step).or_insert(0) += 1;
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Clone of one operation's record
    pub fn get(&self, name: &str) -> Option<OperationRecord> {
        self.records.get(name).map(|record| record.value().clone())
    }

    pub fn has_step(&self, step: i64) -> bool {
        self.steps.contains_key(&step)
    }

    /// Step keys committed so far, ascending
    pub fn steps(&self) -> Vec<i64> {
        let mut steps: Vec<i64> = self.steps.iter().map(|entry| *entry.key()).collect();
        steps.sort_unstable();
        steps
    }

    pub fn operation_count(&self) -> usize {
        self.records.len()
    }

    /// Copy every record between committed steps
    pub fn snapshot(&self) -> Snapshot {
        let _gate = self.commit_gate.write();

        let version = self.version();
        let records: Vec<OperationRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let steps: BTreeMap<i64, usize> = self
            .steps
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();

        debug!(
            "Snapshot at version {}: {} records, {} steps",
            version,
            records.len(),
            steps.len()
        );

        Snapshot::new(version, records, steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::graph_def::OpDef;
    use std::sync::Arc;
    use std::thread;

    fn store() -> StatsStore {
        StatsStore::from_graph(&GraphDef::new(vec![
            OpDef::new("a", "Const"),
            OpDef::new("b", "Neg").with_inputs(["a"]),
        ]))
        .unwrap()
    }

    fn sample(name: &str, micros: u64) -> OpSample {
        OpSample {
            decl: OpDef::new(name, "Unknown"),
            stats: ExecStats {
                exec_micros: micros,
                run_count: 1,
                ..Default::default()
            },
        }
    }

    fn trace(step: i64, samples: &[(&str, u64)]) -> StepTrace {
        let mut trace = StepTrace::new(step);
        for (name, micros) in samples {
            trace.add_sample(sample(name, *micros));
        }
        trace
    }

    #[test]
    fn test_commit_and_get() {
        let store = store();
        let summary = store.commit(&trace(0, &[("a", 5), ("b", 7)])).unwrap();

        assert_eq!(summary.operations, 2);
        assert_eq!(summary.new_operations, 0);
        assert_eq!(summary.total.exec_micros, 12);
        assert_eq!(store.get("b").unwrap().stats_for(StepFilter::All).exec_micros, 7);
        assert!(store.get("zzz").is_none());
        assert_eq!(store.steps(), vec![0]);
    }

    #[test]
    fn test_unknown_operation_created() {
        let store = store();
        let summary = store.commit(&trace(1, &[("c", 3)])).unwrap();

        assert_eq!(summary.new_operations, 1);
        assert_eq!(store.operation_count(), 3);
        assert_eq!(store.get("c").unwrap().op_type(), "Unknown");
    }

    #[test]
    fn test_scope_conflict_rejects_whole_step() {
        let store = store();
        let mut conflicting = trace(2, &[("a", 1)]);
        let mut clash = sample("c", 4);
        clash.decl = clash.decl.with_scope("b");
        conflicting.add_sample(clash);

        let result = store.commit(&conflicting);
        assert!(matches!(result, Err(TraceError::Conflict { step: 2, .. })));
        assert!(store.get("a").unwrap().steps.is_empty());
        assert!(store.get("c").is_none());
        assert!(!store.has_step(2));
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_same_step_key_merges() {
        let store = store();
        store.commit(&trace(0, &[("a", 5)])).unwrap();
        store.commit(&trace(0, &[("a", 5)])).unwrap();

        let record = store.get("a").unwrap();
        assert_eq!(record.stats_for(StepFilter::Only(0)).exec_micros, 10);
        assert_eq!(store.snapshot().steps[&0], 2);
    }

    #[test]
    fn test_snapshot_sorted_and_versioned() {
        let store = store();
        store.commit(&trace(0, &[("zeta", 1), ("b", 2)])).unwrap();

        let snapshot = store.snapshot();
        let names: Vec<&str> = snapshot.records.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "b", "zeta"]);
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.index_of("zeta"), Some(2));
        assert_eq!(snapshot.total(StepFilter::All).exec_micros, 3);
    }

    #[test]
    fn test_concurrent_commits() {
        let store = Arc::new(store());

        let handles: Vec<_> = (0..8)
            .map(|step| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..50 {
                        store.commit(&trace(step, &[("a", 1), ("b", 2)])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.version, 400);
        assert_eq!(snapshot.total(StepFilter::All).exec_micros, 1200);
        assert_eq!(snapshot.total(StepFilter::Only(3)).exec_micros, 150);
    }
}
