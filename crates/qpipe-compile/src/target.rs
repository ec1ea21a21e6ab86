//! Device capability model.
//!
//! A [`Target`] records, per operation name, the physical qubit tuples the
//! operation is valid on together with per-tuple error rates and durations.
//! Operations without an explicit tuple set are globally valid.
//!
//! Two caches are rebuilt on every mutation:
//!
//! - the names of *non-global* operations, i.e. those whose explicit tuple
//!   set is smaller than the number of distinct tuples of that arity in the
//!   whole target (multi-qubit tuples are compared as unordered sets);
//! - for every tuple carrying a non-global operation, the names available
//!   there.
//!
//! # Example
//!
//! ```
//! use qpipe_compile::{CouplingMap, Target};
//!
//! let target = Target::from_basis_and_coupling(
//!     &["rz", "sx", "x", "cx", "measure"],
//!     &CouplingMap::linear(3),
//! )
//! .unwrap();
//!
//! assert!(target.supported("cx", &[0, 1]));
//! assert!(!target.supported("cx", &[0, 2]));
//! assert!(target.supported("rz", &[2]));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use qpipe_ir::CONTROL_FLOW_OP_NAMES;

use crate::coupling::CouplingMap;
use crate::equivalence::Signature;
use crate::error::{CompileError, CompileResult};

/// Calibration data for one operation on one qubit tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionProperties {
    /// Error rate in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,
    /// Duration in device time steps (dt).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl InstructionProperties {
    /// Properties with only an error rate.
    pub fn with_error(error: f64) -> Self {
        Self {
            error: Some(error),
            duration: None,
        }
    }
}

/// One operation supported by a target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEntry {
    /// Operation name.
    pub name: String,
    /// Qubit arity; 0 means variadic (barrier, control flow).
    pub num_qubits: u32,
    /// Parameter arity.
    #[serde(default)]
    pub num_params: usize,
    /// Explicit tuples; `None` means globally valid.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "qargs_list")]
    pub qargs: Option<BTreeMap<Vec<u32>, InstructionProperties>>,
}

impl OperationEntry {
    /// A globally valid operation.
    pub fn global(name: impl Into<String>, num_qubits: u32, num_params: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_params,
            qargs: None,
        }
    }

    /// An operation valid only on the given tuples.
    pub fn on_qargs(
        name: impl Into<String>,
        num_qubits: u32,
        num_params: usize,
        qargs: impl IntoIterator<Item = (Vec<u32>, InstructionProperties)>,
    ) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_params,
            qargs: Some(qargs.into_iter().collect()),
        }
    }
}

/// Serializes tuple tables as `[{qubits, error, duration}]` lists, since
/// JSON map keys must be strings.
mod qargs_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::InstructionProperties;

    #[derive(Serialize, Deserialize)]
    struct QargEntry {
        qubits: Vec<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    }

    type Table = BTreeMap<Vec<u32>, InstructionProperties>;

    pub fn serialize<S: Serializer>(value: &Option<Table>, s: S) -> Result<S::Ok, S::Error> {
        value
            .as_ref()
            .map(|table| {
                table
                    .iter()
                    .map(|(q, p)| QargEntry {
                        qubits: q.clone(),
                        error: p.error,
                        duration: p.duration,
                    })
                    .collect::<Vec<_>>()
            })
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Table>, D::Error> {
        let list: Option<Vec<QargEntry>> = Option::deserialize(d)?;
        Ok(list.map(|entries| {
            entries
                .into_iter()
                .map(|e| {
                    (
                        e.qubits,
                        InstructionProperties {
                            error: e.error,
                            duration: e.duration,
                        },
                    )
                })
                .collect()
        }))
    }
}

/// Per-qubit and per-edge average error rates.
#[derive(Debug, Clone, Default)]
pub struct ErrorMap {
    /// Average single-qubit error per physical qubit.
    pub qubit: FxHashMap<u32, f64>,
    /// Average two-qubit error per undirected `(low, high)` edge.
    pub edge: FxHashMap<(u32, u32), f64>,
}

impl ErrorMap {
    /// Error of a qubit, 0 when unknown.
    pub fn qubit_error(&self, qubit: u32) -> f64 {
        self.qubit.get(&qubit).copied().unwrap_or(0.0)
    }

    /// Error of an edge in either direction, 0 when unknown.
    pub fn edge_error(&self, a: u32, b: u32) -> f64 {
        self.edge
            .get(&(a.min(b), a.max(b)))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Device capability model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TargetData", into = "TargetData")]
pub struct Target {
    num_qubits: u32,
    entries: BTreeMap<String, OperationEntry>,
    non_global: BTreeSet<String>,
    qargs_index: BTreeMap<Vec<u32>, BTreeSet<String>>,
}

/// Serialized form of a [`Target`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetData {
    /// Number of physical qubits.
    pub num_qubits: u32,
    /// Supported operations.
    #[serde(default)]
    pub instructions: Vec<OperationEntry>,
}

impl TryFrom<TargetData> for Target {
    type Error = CompileError;

    fn try_from(data: TargetData) -> CompileResult<Self> {
        let mut target = Target::new(data.num_qubits);
        for entry in data.instructions {
            target.add_instruction(entry)?;
        }
        Ok(target)
    }
}

impl From<Target> for TargetData {
    fn from(target: Target) -> Self {
        TargetData {
            num_qubits: target.num_qubits,
            instructions: target.entries.into_values().collect(),
        }
    }
}

impl Target {
    /// Create an empty target over `num_qubits` physical qubits.
    pub fn new(num_qubits: u32) -> Self {
        Self {
            num_qubits,
            entries: BTreeMap::new(),
            non_global: BTreeSet::new(),
            qargs_index: BTreeMap::new(),
        }
    }

    /// Build a target from a basis and a coupling map.
    ///
    /// Single-qubit and 3+-qubit operations become global; two-qubit
    /// operations are valid on every coupling edge in both directions.
    /// Control-flow names are only added when they appear in `basis`.
    pub fn from_basis_and_coupling(
        basis: &[impl AsRef<str>],
        coupling: &CouplingMap,
    ) -> CompileResult<Self> {
        let mut target = Target::new(coupling.num_qubits());
        let directed: Vec<Vec<u32>> = coupling
            .edges()
            .iter()
            .flat_map(|&(a, b)| [vec![a, b], vec![b, a]])
            .collect();

        for name in basis {
            let name = name.as_ref();
            let entry = match name {
                "measure" | "reset" => OperationEntry::global(name, 1, 0),
                "delay" => OperationEntry::global(name, 1, 1),
                "barrier" => OperationEntry::global(name, 0, 0),
                _ if CONTROL_FLOW_OP_NAMES.contains(&name) => OperationEntry::global(name, 0, 0),
                _ => {
                    let sig = Signature::standard(name).ok_or_else(|| {
                        CompileError::Configuration(format!(
                            "Unknown basis gate '{name}' has no known signature"
                        ))
                    })?;
                    if sig.num_qubits == 2 {
                        OperationEntry::on_qargs(
                            name,
                            2,
                            sig.num_params,
                            directed
                                .iter()
                                .map(|q| (q.clone(), InstructionProperties::default())),
                        )
                    } else {
                        OperationEntry::global(name, sig.num_qubits, sig.num_params)
                    }
                }
            };
            target.add_instruction(entry)?;
        }
        Ok(target)
    }

    /// Add or replace an operation.
    pub fn add_instruction(&mut self, entry: OperationEntry) -> CompileResult<()> {
        if let Some(qargs) = &entry.qargs {
            for q in qargs.keys() {
                if entry.num_qubits != 0 && q.len() != entry.num_qubits as usize {
                    return Err(CompileError::Configuration(format!(
                        "Operation '{}' acts on {} qubits but was given qargs {q:?}",
                        entry.name, entry.num_qubits
                    )));
                }
                if let Some(&bad) = q.iter().find(|&&p| p >= self.num_qubits) {
                    return Err(CompileError::Configuration(format!(
                        "Operation '{}' uses qubit {bad}, but the target has {}",
                        entry.name, self.num_qubits
                    )));
                }
                let unique: BTreeSet<_> = q.iter().collect();
                if unique.len() != q.len() {
                    return Err(CompileError::Configuration(format!(
                        "Operation '{}' repeats a qubit in {q:?}",
                        entry.name
                    )));
                }
            }
        }
        self.entries.insert(entry.name.clone(), entry);
        self.rebuild_caches();
        Ok(())
    }

    fn rebuild_caches(&mut self) {
        let mut distinct_by_arity: BTreeMap<usize, BTreeSet<Vec<u32>>> = BTreeMap::new();
        for entry in self.entries.values() {
            for q in entry.qargs.iter().flat_map(BTreeMap::keys) {
                distinct_by_arity
                    .entry(q.len())
                    .or_default()
                    .insert(unordered(q));
            }
        }

        self.non_global.clear();
        self.qargs_index.clear();
        for entry in self.entries.values() {
            let Some(qargs) = &entry.qargs else {
                continue;
            };
            let Some(sample) = qargs.keys().next() else {
                continue;
            };
            let available = if sample.len() == 1 {
                self.num_qubits as usize
            } else {
                distinct_by_arity.get(&sample.len()).map_or(0, BTreeSet::len)
            };
            let own: BTreeSet<Vec<u32>> = qargs.keys().map(|q| unordered(q)).collect();
            if own.len() < available {
                self.non_global.insert(entry.name.clone());
                for q in qargs.keys() {
                    self.qargs_index
                        .entry(q.clone())
                        .or_default()
                        .insert(entry.name.clone());
                }
            }
        }
    }

    /// Number of physical qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Check whether `name` may run on `qargs`.
    pub fn supported(&self, name: &str, qargs: &[u32]) -> bool {
        if qargs.iter().any(|&q| q >= self.num_qubits) {
            return false;
        }
        let Some(entry) = self.entries.get(name) else {
            return name == "barrier";
        };
        match &entry.qargs {
            None => entry.num_qubits == 0 || qargs.len() == entry.num_qubits as usize,
            Some(map) => map.contains_key(qargs),
        }
    }

    /// Check whether the target knows `name` at all.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All operation names, sorted.
    pub fn operation_names(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Entry for an operation.
    pub fn operation(&self, name: &str) -> Option<&OperationEntry> {
        self.entries.get(name)
    }

    /// Names of operations restricted to a strict subset of tuples.
    pub fn non_global_operation_names(&self) -> &BTreeSet<String> {
        &self.non_global
    }

    /// Explicit tuples of an operation; `None` when it is global or unknown.
    pub fn operation_tuples(&self, name: &str) -> Option<BTreeSet<Vec<u32>>> {
        self.entries
            .get(name)?
            .qargs
            .as_ref()
            .map(|q| q.keys().cloned().collect())
    }

    /// Tuples carrying non-global operations and the names available there.
    pub fn qargs_with_non_global_operations(&self) -> &BTreeMap<Vec<u32>, BTreeSet<String>> {
        &self.qargs_index
    }

    fn properties(&self, name: &str, qargs: &[u32]) -> Option<&InstructionProperties> {
        self.entries.get(name)?.qargs.as_ref()?.get(qargs)
    }

    /// Error rate of `name` on `qargs`, if calibrated.
    pub fn error(&self, name: &str, qargs: &[u32]) -> Option<f64> {
        self.properties(name, qargs)?.error
    }

    /// Duration of `name` on `qargs`, if calibrated.
    pub fn duration(&self, name: &str, qargs: &[u32]) -> Option<u64> {
        self.properties(name, qargs)?.duration
    }

    /// Check whether any tuple carries an error rate.
    pub fn has_error_data(&self) -> bool {
        self.entries
            .values()
            .flat_map(|e| e.qargs.iter().flat_map(BTreeMap::values))
            .any(|p| p.error.is_some())
    }

    /// Union of all explicit two-qubit tuples, or `None` when every
    /// multi-qubit operation is global.
    pub fn coupling_map(&self) -> Option<CouplingMap> {
        let edges: Vec<(u32, u32)> = self
            .entries
            .values()
            .filter_map(|e| e.qargs.as_ref())
            .flat_map(BTreeMap::keys)
            .filter(|q| q.len() == 2)
            .map(|q| (q[0], q[1]))
            .collect();
        if edges.is_empty() {
            return None;
        }
        Some(CouplingMap::with_num_qubits(self.num_qubits, &edges))
    }

    /// Average error per qubit and per undirected edge.
    pub fn error_map(&self) -> ErrorMap {
        let mut qubit: BTreeMap<u32, (f64, u32)> = BTreeMap::new();
        let mut edge: BTreeMap<(u32, u32), (f64, u32)> = BTreeMap::new();
        for entry in self.entries.values() {
            for (q, props) in entry.qargs.iter().flat_map(BTreeMap::iter) {
                let Some(error) = props.error else {
                    continue;
                };
                let slot = match q.as_slice() {
                    [a] => qubit.entry(*a).or_default(),
                    [a, b] => edge.entry(((*a).min(*b), (*a).max(*b))).or_default(),
                    _ => continue,
                };
                slot.0 += error;
                slot.1 += 1;
            }
        }
        ErrorMap {
            qubit: qubit
                .into_iter()
                .map(|(k, (sum, n))| (k, sum / f64::from(n)))
                .collect(),
            edge: edge
                .into_iter()
                .map(|(k, (sum, n))| (k, sum / f64::from(n)))
                .collect(),
        }
    }
}

fn unordered(q: &[u32]) -> Vec<u32> {
    let mut sorted = q.to_vec();
    sorted.sort_unstable();
    sorted
}
