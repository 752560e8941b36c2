//! Node statistics: per-operation records and the concurrent store that
//! accumulates them across steps.

pub mod record;
pub mod store;

pub use record::{ExecStats, OperationRecord};
pub use store::{Snapshot, StatsStore, StepSummary};
