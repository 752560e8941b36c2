//! Step trace parser.
//!
//! Parses one step's raw execution trace (per-device node statistics) into
//! normalized per-operation samples. A trace is accepted or rejected as a
//! whole: one malformed node stat rejects the step.

use super::graph_def::OpDef;
use crate::stats::ExecStats;
use crate::utils::config::{
    ACCELERATOR_DEVICE_MARKERS, DEV_STATS_FIELD_NAMES, NODE_STATS_FIELD_NAMES,
    STEP_STATS_FIELD_NAMES, UNKNOWN_OP_TYPE,
};
use crate::utils::error::TraceError;
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Allocator usage reported for one node execution
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryStat {
    #[serde(default, alias = "allocatorName")]
    pub allocator_name: String,

    #[serde(default, alias = "totalBytes")]
    pub total_bytes: i64,

    #[serde(default, alias = "peakBytes")]
    pub peak_bytes: i64,
}

/// Raw statistics of one node execution on one device
#[derive(Debug, Clone, Deserialize)]
pub struct NodeExecStats {
    #[serde(default, alias = "nodeName", alias = "name")]
    pub node_name: Option<String>,

    #[serde(default, alias = "allStartMicros")]
    pub all_start_micros: Option<i64>,

    #[serde(default, alias = "allEndRelMicros")]
    pub all_end_rel_micros: Option<i64>,

    #[serde(default, alias = "opStartRelMicros")]
    pub op_start_rel_micros: Option<i64>,

    #[serde(default, alias = "opEndRelMicros")]
    pub op_end_rel_micros: Option<i64>,

    /// Operation type, used only when the operation is new to the profiler
    #[serde(default, alias = "op")]
    pub op_type: Option<String>,

    #[serde(default, alias = "input")]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub memory: Vec<MemoryStat>,
}

/// One operation's normalized sample for a step
#[derive(Debug, Clone, PartialEq)]
pub struct OpSample {
    /// Declaration used if the operation is unknown to the profiler
    pub decl: OpDef,

    pub stats: ExecStats,
}

/// A parsed step trace
#[derive(Debug, Clone, PartialEq)]
pub struct StepTrace {
    pub step: i64,

    /// Samples keyed by operation name; repeated executions are already summed
    pub samples: BTreeMap<String, OpSample>,
}

impl StepTrace {
    pub fn new(step: i64) -> Self {
        Self {
            step,
            samples: BTreeMap::new(),
        }
    }

    /// Add a sample, summing with an earlier one for the same operation
    pub fn add_sample(&mut self, sample: OpSample) {
        match self.samples.get_mut(&sample.decl.name) {
            Some(existing) => existing.stats += sample.stats,
            None => {
                self.samples.insert(sample.decl.name.clone(), sample);
            }
        }
    }

    /// Total over all samples
    pub fn total(&self) -> ExecStats {
        self.samples.values().map(|s| s.stats).sum()
    }
}

/// Parse a raw step trace
///
/// **Public** - main entry point for trace ingest
///
/// # Arguments
/// * `step` - Step key the trace belongs to
/// * `raw_trace` - `{"step_stats": {"dev_stats": [...]}}`, `{"dev_stats": [...]}`
///   or a bare array of device entries; an empty object is an empty step
///
/// # Errors
/// * `TraceError::MalformedTrace` - wrong shape, missing node name or
///   timestamps, negative durations or byte counts
pub fn parse_step_trace(step: i64, raw_trace: &Value) -> Result<StepTrace, TraceError> {
    debug!("Parsing trace for step {}", step);

    let devices = extract_devices(step, raw_trace)?;
    let mut trace = StepTrace::new(step);

    for (device_index, device_value) in devices.iter().enumerate() {
        let device_obj = device_value
            .as_object()
            .ok_or_else(|| malformed(step, format!("device entry {} is not an object", device_index)))?;

        let device = device_obj
            .get("device")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let nodes = find_array(step, device_obj, NODE_STATS_FIELD_NAMES)?.unwrap_or_default();
        for (node_index, node_value) in nodes.iter().enumerate() {
            let node: NodeExecStats = serde_json::from_value(node_value.clone()).map_err(|e| {
                malformed(
                    step,
                    format!("node {} on device {}: {}", node_index, device_index, e),
                )
            })?;
            trace.add_sample(normalize_node(step, device, node)?);
        }
    }

    debug!(
        "Parsed {} operation samples for step {}",
        trace.samples.len(),
        step
    );

    Ok(trace)
}

/// Locate the list of device entries
///
/// **Private** - internal helper for parse_step_trace
fn extract_devices(step: i64, raw_trace: &Value) -> Result<Vec<Value>, TraceError> {
    match raw_trace {
        Value::Array(devices) => Ok(devices.clone()),
        Value::Object(obj) => {
            let step_stats = STEP_STATS_FIELD_NAMES
                .iter()
                .find_map(|field| obj.get(*field))
                .map(|value| {
                    value
                        .as_object()
                        .ok_or_else(|| malformed(step, "step stats must be an object"))
                })
                .transpose()?
                .unwrap_or(obj);

            match find_array(step, step_stats, DEV_STATS_FIELD_NAMES)? {
                Some(devices) => Ok(devices.to_vec()),
                None if step_stats.is_empty() => Ok(Vec::new()),
                None => Err(malformed(step, "no device stats in trace")),
            }
        }
        _ => Err(malformed(step, "trace must be a JSON object or array")),
    }
}

/// Array under the first of the given field names present in `obj`
///
/// **Private** - field names vary between trace producers
fn find_array<'a>(
    step: i64,
    obj: &'a Map<String, Value>,
    fields: &[&str],
) -> Result<Option<&'a [Value]>, TraceError> {
    match fields.iter().find_map(|field| obj.get(*field).map(|value| (field, value))) {
        Some((_, Value::Array(items))) => Ok(Some(items.as_slice())),
        Some((field, _)) => Err(malformed(step, format!("{} must be an array", field))),
        None => Ok(None),
    }
}

/// Validate and normalize one node execution
///
/// **Private** - internal helper for parse_step_trace
fn normalize_node(step: i64, device: &str, node: NodeExecStats) -> Result<OpSample, TraceError> {
    let name = node
        .node_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| malformed(step, "node stat without node_name"))?;

    let start = node
        .all_start_micros
        .ok_or_else(|| malformed(step, format!("{}: missing all_start_micros", name)))?;
    if start < 0 {
        return Err(malformed(step, format!("{}: negative start timestamp", name)));
    }

    let all_end = node
        .all_end_rel_micros
        .ok_or_else(|| malformed(step, format!("{}: missing all_end_rel_micros", name)))?;
    if all_end < 0 {
        return Err(malformed(step, format!("{}: negative duration", name)));
    }

    let duration = match (node.op_start_rel_micros, node.op_end_rel_micros) {
        (Some(op_start), Some(op_end)) => {
            if op_start < 0 || op_end < op_start {
                return Err(malformed(step, format!("{}: negative op duration", name)));
            }
            op_end - op_start
        }
        _ => all_end,
    };
    let exec_micros = duration as u64;

    let mut requested_bytes: u64 = 0;
    let mut peak_bytes: u64 = 0;
    for mem in &node.memory {
        if mem.total_bytes < 0 || mem.peak_bytes < 0 {
            return Err(malformed(
                step,
                format!("{}: negative byte count on allocator {}", name, mem.allocator_name),
            ));
        }
        requested_bytes = requested_bytes.saturating_add(mem.total_bytes as u64);
        peak_bytes = peak_bytes.max(mem.peak_bytes as u64);
    }

    let on_accelerator = is_accelerator_device(device);
    let stats = ExecStats {
        exec_micros,
        accelerator_micros: if on_accelerator { exec_micros } else { 0 },
        cpu_micros: if on_accelerator { 0 } else { exec_micros },
        requested_bytes,
        peak_bytes,
        run_count: 1,
    };

    let mut decl = OpDef::new(
        name,
        node.op_type.unwrap_or_else(|| UNKNOWN_OP_TYPE.to_string()),
    )
    .with_inputs(node.inputs);
    decl.scope = node.scope;
    if !device.is_empty() {
        decl = decl.with_device(device);
    }

    Ok(OpSample { decl, stats })
}

/// Whether a device name denotes an accelerator
pub fn is_accelerator_device(device: &str) -> bool {
    let lower = device.to_lowercase();
    ACCELERATOR_DEVICE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

fn malformed(step: i64, reason: impl Into<String>) -> TraceError {
    TraceError::MalformedTrace {
        step,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_step_stats() {
        let raw = json!({
            "step_stats": {
                "dev_stats": [{
                    "device": "/job:localhost/device:CPU:0",
                    "node_stats": [{
                        "node_name": "matmul",
                        "all_start_micros": 100,
                        "all_end_rel_micros": 40,
                        "memory": [
                            {"allocator_name": "cpu", "total_bytes": 256, "peak_bytes": 128},
                            {"allocator_name": "cpu_pool", "total_bytes": 64, "peak_bytes": 512}
                        ]
                    }]
                }]
            }
        });

        let trace = parse_step_trace(0, &raw).unwrap();
        let sample = &trace.samples["matmul"];
        assert_eq!(sample.stats.exec_micros, 40);
        assert_eq!(sample.stats.cpu_micros, 40);
        assert_eq!(sample.stats.accelerator_micros, 0);
        assert_eq!(sample.stats.requested_bytes, 320);
        assert_eq!(sample.stats.peak_bytes, 512);
        assert_eq!(sample.decl.op, UNKNOWN_OP_TYPE);
    }

    #[test]
    fn test_parse_bare_array_accelerator() {
        let raw = json!([{
            "device": "/device:GPU:0",
            "nodes": [{
                "name": "conv",
                "op": "Conv2D",
                "allStartMicros": 5,
                "allEndRelMicros": 90,
                "opStartRelMicros": 10,
                "opEndRelMicros": 70
            }]
        }]);

        let trace = parse_step_trace(2, &raw).unwrap();
        let sample = &trace.samples["conv"];
        assert_eq!(sample.stats.exec_micros, 60);
        assert_eq!(sample.stats.accelerator_micros, 60);
        assert_eq!(sample.decl.op, "Conv2D");
        assert_eq!(sample.decl.device.as_deref(), Some("/device:GPU:0"));
    }

    #[test]
    fn test_repeated_node_summed() {
        let raw = json!({"dev_stats": [{
            "device": "cpu",
            "node_stats": [
                {"node_name": "loop_body", "all_start_micros": 0, "all_end_rel_micros": 3},
                {"node_name": "loop_body", "all_start_micros": 10, "all_end_rel_micros": 4}
            ]
        }]});

        let trace = parse_step_trace(0, &raw).unwrap();
        assert_eq!(trace.samples.len(), 1);
        assert_eq!(trace.samples["loop_body"].stats.exec_micros, 7);
        assert_eq!(trace.samples["loop_body"].stats.run_count, 2);
    }

    #[test]
    fn test_missing_timestamp_rejected() {
        let raw = json!({"dev_stats": [{"node_stats": [{"node_name": "a", "all_end_rel_micros": 3}]}]});
        assert!(matches!(
            parse_step_trace(4, &raw),
            Err(TraceError::MalformedTrace { step: 4, .. })
        ));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let raw = json!({"dev_stats": [{"node_stats": [{
            "node_name": "a",
            "all_start_micros": 0,
            "all_end_rel_micros": 10,
            "op_start_rel_micros": 8,
            "op_end_rel_micros": 2
        }]}]});
        assert!(parse_step_trace(0, &raw).is_err());
    }

    #[test]
    fn test_wrong_shape_rejected() {
        assert!(parse_step_trace(0, &json!("trace")).is_err());
        assert!(parse_step_trace(0, &json!({"step_stats": 3})).is_err());
        assert!(parse_step_trace(0, &json!({"dev_stats": [7]})).is_err());
    }

    #[test]
    fn test_non_array_stats_rejected() {
        let shapes = [
            json!({"dev_stats": 5}),
            json!({"step_stats": {"dev_stats": "oops"}}),
            json!([{"device": "cpu", "node_stats": "x"}]),
            json!({"devStats": [{"nodeStats": {"nodeName": "a"}}]}),
        ];
        for raw in shapes {
            assert!(
                matches!(parse_step_trace(3, &raw), Err(TraceError::MalformedTrace { step: 3, .. })),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_object_without_devices_rejected() {
        let raw = json!({"run_metadata": {"step_stats": {"dev_stats": []}}});
        assert!(matches!(
            parse_step_trace(0, &raw),
            Err(TraceError::MalformedTrace { .. })
        ));
        assert!(parse_step_trace(0, &json!({"step_stats": {"partition_graphs": []}})).is_err());
    }

    #[test]
    fn test_empty_trace_accepted() {
        for raw in [json!({}), json!({"step_stats": {}}), json!({"dev_stats": []}), json!([])] {
            let trace = parse_step_trace(1, &raw).unwrap();
            assert!(trace.samples.is_empty());
            assert!(trace.total().is_zero());
        }
    }
}
