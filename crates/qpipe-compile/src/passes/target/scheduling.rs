//! Timing analysis and idle padding.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use qpipe_ir::{CircuitDag, Instruction, InstructionKind, NodeIndex, QubitId, WireId, wires_of};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{Property, PropertySet};
use crate::target::Target;

/// One row of a duration table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationEntry {
    /// Operation name.
    pub name: String,
    /// Physical qubits the entry is restricted to; `None` for every tuple.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qubits: Option<Vec<u32>>,
    /// Duration in device time steps.
    pub duration: u64,
}

/// User-supplied operation durations.
///
/// An entry for an exact qubit tuple wins over a name-only entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DurationEntry>", into = "Vec<DurationEntry>")]
pub struct InstructionDurations {
    by_name: BTreeMap<String, u64>,
    by_qubits: BTreeMap<(String, Vec<u32>), u64>,
}

impl InstructionDurations {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration of `name` on every qubit tuple.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, duration: u64) -> Self {
        self.by_name.insert(name.into(), duration);
        self
    }

    /// Set the duration of `name` on one qubit tuple.
    #[must_use]
    pub fn with_qubits(mut self, name: impl Into<String>, qubits: Vec<u32>, duration: u64) -> Self {
        self.by_qubits.insert((name.into(), qubits), duration);
        self
    }

    /// Look up a duration.
    pub fn get(&self, name: &str, qubits: &[u32]) -> Option<u64> {
        self.by_qubits
            .get(&(name.to_string(), qubits.to_vec()))
            .or_else(|| self.by_name.get(name))
            .copied()
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty() && self.by_qubits.is_empty()
    }
}

impl From<Vec<DurationEntry>> for InstructionDurations {
    fn from(entries: Vec<DurationEntry>) -> Self {
        entries.into_iter().fold(Self::new(), |table, e| match e.qubits {
            Some(qubits) => table.with_qubits(e.name, qubits, e.duration),
            None => table.with(e.name, e.duration),
        })
    }
}

impl From<InstructionDurations> for Vec<DurationEntry> {
    fn from(table: InstructionDurations) -> Self {
        let named = table.by_name.into_iter().map(|(name, duration)| DurationEntry {
            name,
            qubits: None,
            duration,
        });
        let tupled = table
            .by_qubits
            .into_iter()
            .map(|((name, qubits), duration)| DurationEntry {
                name,
                qubits: Some(qubits),
                duration,
            });
        named.chain(tupled).collect()
    }
}

/// Where durations come from: the user table first, then the target.
#[derive(Debug, Clone, Default)]
pub struct DurationSource {
    table: Option<InstructionDurations>,
    target: Option<Arc<Target>>,
}

impl DurationSource {
    /// Combine a user table and a target.
    pub fn new(table: Option<InstructionDurations>, target: Option<Arc<Target>>) -> Self {
        Self { table, target }
    }

    /// Duration of one instruction.
    pub fn duration_of(&self, inst: &Instruction) -> CompileResult<u64> {
        match &inst.kind {
            InstructionKind::Barrier => return Ok(0),
            InstructionKind::Delay { duration } => return Ok(*duration),
            InstructionKind::ControlFlow(cf) => {
                return Err(CompileError::PassFailed {
                    name: "ScheduleAnalysis".into(),
                    reason: format!("cannot schedule '{}'", cf.op.name()),
                });
            }
            _ => {}
        }
        let qubits: Vec<u32> = inst.qubits.iter().map(|q| q.0).collect();
        self.table
            .as_ref()
            .and_then(|t| t.get(inst.name(), &qubits))
            .or_else(|| self.target.as_ref().and_then(|t| t.duration(inst.name(), &qubits)))
            .ok_or_else(|| CompileError::MissingDuration {
                name: inst.name().to_string(),
                qubits,
            })
    }
}

/// Scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// Start every operation as soon as its wires are free.
    Asap,
    /// Start every operation as late as the total duration allows.
    Alap,
}

/// Computes a start time for every operation.
///
/// Publishes [`Property::NodeStartTimes`] and
/// [`Property::ScheduledDuration`].
pub struct ScheduleAnalysis {
    policy: SchedulePolicy,
    durations: DurationSource,
}

impl ScheduleAnalysis {
    /// Create the pass.
    pub fn new(policy: SchedulePolicy, durations: DurationSource) -> Self {
        Self { policy, durations }
    }
}

impl Pass for ScheduleAnalysis {
    fn name(&self) -> &'static str {
        match self.policy {
            SchedulePolicy::Asap => "ASAPScheduleAnalysis",
            SchedulePolicy::Alap => "ALAPScheduleAnalysis",
        }
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let mut order = dag.topological_op_nodes();
        if self.policy == SchedulePolicy::Alap {
            order.reverse();
        }

        // For ALAP, times are measured backwards from the end.
        let mut wire_time: FxHashMap<WireId, u64> = FxHashMap::default();
        let mut spans: Vec<(NodeIndex, u64, u64)> = Vec::with_capacity(order.len());
        for node in order {
            let Some(inst) = dag.get_instruction(node) else {
                continue;
            };
            let duration = self.durations.duration_of(inst)?;
            let wires = wires_of(inst);
            let start = wires
                .iter()
                .map(|w| wire_time.get(w).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            for w in wires {
                wire_time.insert(w, start + duration);
            }
            spans.push((node, start, duration));
        }

        let total = wire_time.values().copied().max().unwrap_or(0);
        let times: BTreeMap<NodeIndex, u64> = spans
            .into_iter()
            .map(|(node, start, duration)| match self.policy {
                SchedulePolicy::Asap => (node, start),
                SchedulePolicy::Alap => (node, total - start - duration),
            })
            .collect();
        debug!("Scheduled {} operations over {total} dt", times.len());
        properties.insert(Property::NodeStartTimes(times));
        properties.insert(Property::ScheduledDuration(total));
        Ok(())
    }
}

/// Fills every idle stretch of every qubit with a `delay`.
///
/// Needs the start times from [`ScheduleAnalysis`]. The padded circuit is
/// rebuilt in start-time order and the start times are republished for the
/// new nodes.
pub struct PadDelay {
    durations: DurationSource,
}

impl PadDelay {
    /// Create the pass.
    pub fn new(durations: DurationSource) -> Self {
        Self { durations }
    }
}

impl Pass for PadDelay {
    fn name(&self) -> &'static str {
        "PadDelay"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let times = properties
            .node_start_times()
            .cloned()
            .ok_or_else(|| CompileError::PassFailed {
                name: "PadDelay".into(),
                reason: "no schedule; run a schedule analysis first".into(),
            })?;
        let total = properties.scheduled_duration().unwrap_or(0);

        let mut ops: Vec<(u64, usize, &Instruction)> = dag
            .topological_ops()
            .enumerate()
            .map(|(rank, (node, inst))| (times.get(&node).copied().unwrap_or(0), rank, inst))
            .collect();
        ops.sort_by_key(|&(start, rank, _)| (start, rank));

        let mut padded = dag.copy_empty_like();
        let mut cursor: FxHashMap<QubitId, u64> = FxHashMap::default();
        let mut new_times = BTreeMap::new();
        let mut delays = 0usize;
        for (start, _, inst) in ops {
            for &q in &inst.qubits {
                let free = cursor.get(&q).copied().unwrap_or(0);
                if start > free {
                    let node = padded.apply(Instruction::delay(q, start - free))?;
                    new_times.insert(node, free);
                    delays += 1;
                }
            }
            let end = start + self.durations.duration_of(inst)?;
            for &q in &inst.qubits {
                cursor.insert(q, end);
            }
            let node = padded.apply(inst.clone())?;
            new_times.insert(node, start);
        }
        for q in padded.qubits() {
            let free = cursor.get(&q).copied().unwrap_or(0);
            if total > free {
                let node = padded.apply(Instruction::delay(q, total - free))?;
                new_times.insert(node, free);
                delays += 1;
            }
        }

        debug!("PadDelay inserted {delays} delays");
        *dag = padded;
        properties.insert(Property::NodeStartTimes(new_times));
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.node_start_times().is_some()
    }
}
