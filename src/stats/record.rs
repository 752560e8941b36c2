//! Per-operation statistics records.

use crate::options::StepFilter;
use crate::parser::graph_def::OpDef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Resource usage of one operation (or a roll-up of several)
///
/// Every field is additive so roll-ups over any grouping give the same totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStats {
    /// Wall time in microseconds
    pub exec_micros: u64,

    /// Part of the wall time spent on accelerator devices
    pub accelerator_micros: u64,

    /// Part of the wall time spent on host devices
    pub cpu_micros: u64,

    /// Bytes requested from allocators
    pub requested_bytes: u64,

    /// Peak bytes held by allocators while the operation ran
    pub peak_bytes: u64,

    /// Number of times the operation ran
    pub run_count: u64,
}

impl ExecStats {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for ExecStats {
    fn add_assign(&mut self, other: Self) {
        self.exec_micros = self.exec_micros.saturating_add(other.exec_micros);
        self.accelerator_micros = self
            .accelerator_micros
            .saturating_add(other.accelerator_micros);
        self.cpu_micros = self.cpu_micros.saturating_add(other.cpu_micros);
        self.requested_bytes = self.requested_bytes.saturating_add(other.requested_bytes);
        self.peak_bytes = self.peak_bytes.saturating_add(other.peak_bytes);
        self.run_count = self.run_count.saturating_add(other.run_count);
    }
}

impl Add for ExecStats {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl Sum for ExecStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a ExecStats> for ExecStats {
    fn sum<I: Iterator<Item = &'a ExecStats>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Everything known about one operation
///
/// Created from the graph definition or at the first trace mention;
/// never removed for the lifetime of a profiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Declared identity, type, inputs and scope
    pub def: OpDef,

    /// Accumulated samples keyed by step
    #[serde(default)]
    pub steps: BTreeMap<i64, ExecStats>,
}

impl OperationRecord {
    pub fn new(def: OpDef) -> Self {
        Self {
            def,
            steps: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn op_type(&self) -> &str {
        &self.def.op
    }

    /// Merge a sample into the entry for `step`
    pub fn merge(&mut self, step: i64, sample: ExecStats) {
        *self.steps.entry(step).or_default() += sample;
    }

    /// Statistics visible through a step filter
    pub fn stats_for(&self, filter: StepFilter) -> ExecStats {
        match filter {
            StepFilter::All => self.steps.values().sum(),
            StepFilter::Only(step) => self.steps.get(&step).copied().unwrap_or_default(),
        }
    }
}
