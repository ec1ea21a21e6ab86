//! Removal of operations that cannot affect measured results.

use qpipe_ir::{CircuitDag, DagNode, NodeIndex, StandardGate, WireId};
use rustc_hash::FxHashSet;

use super::{rewrite_nested, standard_gate};
use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Removes resets applied to qubits that are still in their initial state.
///
/// Only the top-level circuit is considered: qubits entering a block carry
/// whatever state the enclosing circuit left them in.
pub struct RemoveResetInZeroState;

impl Pass for RemoveResetInZeroState {
    fn name(&self) -> &'static str {
        "RemoveResetInZeroState"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        for qubit in dag.qubits() {
            let Some(input) = dag.qubit_input_node(qubit) else {
                continue;
            };
            while let Some(first) = dag.wire_successor(input, WireId::Qubit(qubit)) {
                match dag.get_instruction(first) {
                    Some(inst) if inst.is_reset() => {
                        dag.remove_op(first)?;
                    }
                    _ => break,
                }
            }
        }
        Ok(())
    }
}

/// Removes diagonal gates that sit directly in front of measurements.
///
/// A diagonal gate only changes phases, which a computational-basis
/// measurement cannot observe. Single-qubit `rz`, `z`, `t`, `s`, `tdg`,
/// `sdg` and `p` are dropped when a measure follows; `cz`, `crz`, `cp` and
/// `rzz` only when every one of their qubits goes straight into a measure.
/// Blocks of control-flow operations are processed as well.
pub struct RemoveDiagonalGatesBeforeMeasure;

fn is_diagonal_1q(gate: &StandardGate) -> bool {
    matches!(
        gate,
        StandardGate::Rz(_)
            | StandardGate::Z
            | StandardGate::T
            | StandardGate::S
            | StandardGate::Tdg
            | StandardGate::Sdg
            | StandardGate::P(_)
    )
}

fn is_diagonal_2q(gate: &StandardGate) -> bool {
    matches!(
        gate,
        StandardGate::CZ | StandardGate::CRz(_) | StandardGate::CP(_) | StandardGate::RZZ(_)
    )
}

fn feeds_measures_only(dag: &CircuitDag, node: NodeIndex) -> bool {
    let Some(inst) = dag.get_instruction(node) else {
        return false;
    };
    inst.qubits.iter().all(|&q| {
        dag.wire_successor(node, WireId::Qubit(q))
            .and_then(|succ| dag.node(succ))
            .is_some_and(|succ| matches!(succ, DagNode::Op(next) if next.is_measure()))
    })
}

fn removable_before(dag: &CircuitDag, measure: NodeIndex) -> Option<NodeIndex> {
    let qubit = *dag.get_instruction(measure)?.qubits.first()?;
    let pred = dag.wire_predecessor(measure, WireId::Qubit(qubit))?;
    let gate = standard_gate(dag.get_instruction(pred)?)?;
    if is_diagonal_1q(gate) || (is_diagonal_2q(gate) && feeds_measures_only(dag, pred)) {
        Some(pred)
    } else {
        None
    }
}

fn remove_diagonals(dag: &mut CircuitDag) -> CompileResult<()> {
    loop {
        let mut doomed: Vec<NodeIndex> = Vec::new();
        let mut seen: FxHashSet<NodeIndex> = FxHashSet::default();
        for (node, inst) in dag.topological_ops() {
            if !inst.is_measure() {
                continue;
            }
            if let Some(pred) = removable_before(dag, node) {
                if seen.insert(pred) {
                    doomed.push(pred);
                }
            }
        }
        if doomed.is_empty() {
            return Ok(());
        }
        for node in doomed {
            dag.remove_op(node)?;
        }
    }
}

impl Pass for RemoveDiagonalGatesBeforeMeasure {
    fn name(&self) -> &'static str {
        "RemoveDiagonalGatesBeforeMeasure"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        rewrite_nested(dag, remove_diagonals)
    }
}
