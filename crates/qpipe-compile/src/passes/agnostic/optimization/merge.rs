//! Fusion of adjacent barriers and rotations.

use qpipe_ir::{
    CircuitDag, DagNode, Gate, Instruction, InstructionKind, NodeIndex, ParameterExpression,
    QubitId, StandardGate, WireId,
};
use rustc_hash::FxHashMap;

use super::{rewrite_nested, standard_gate};
use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Merges barriers that follow each other with nothing in between.
///
/// A barrier is folded into an earlier one when each of its qubits either
/// comes straight from that barrier or has seen no operation yet. The
/// merged barrier spans the union of both qubit sets.
pub struct MergeAdjacentBarriers;

impl MergeAdjacentBarriers {
    /// Create a new barrier merging pass.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MergeAdjacentBarriers {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_barriers(dag: &mut CircuitDag) -> CompileResult<()> {
    // Merged barrier -> the barrier it was folded into.
    let mut root_of: FxHashMap<NodeIndex, NodeIndex> = FxHashMap::default();
    let mut span: FxHashMap<NodeIndex, Vec<QubitId>> = FxHashMap::default();

    for (node, inst) in dag.topological_ops() {
        if !inst.is_barrier() {
            continue;
        }
        let mut root = None;
        let mut mergeable = true;
        for &q in &inst.qubits {
            let pred = dag.wire_predecessor(node, WireId::Qubit(q));
            match pred.and_then(|p| dag.node(p).map(|n| (p, n))) {
                Some((_, DagNode::In(_))) => {}
                Some((p, DagNode::Op(pred_inst))) if pred_inst.is_barrier() => {
                    let p_root = root_of.get(&p).copied().unwrap_or(p);
                    if root.is_some_and(|r| r != p_root) {
                        mergeable = false;
                    }
                    root = Some(p_root);
                }
                _ => mergeable = false,
            }
        }
        match root {
            Some(root) if mergeable => {
                root_of.insert(node, root);
                let merged = span.entry(root).or_default();
                for &q in &inst.qubits {
                    if !merged.contains(&q) {
                        merged.push(q);
                    }
                }
            }
            _ => {
                span.insert(node, inst.qubits.clone());
            }
        }
    }

    if root_of.is_empty() {
        return Ok(());
    }

    let mut merged = dag.copy_empty_like();
    for (node, inst) in dag.topological_ops() {
        if root_of.contains_key(&node) {
            continue;
        }
        match span.remove(&node) {
            Some(qubits) if inst.is_barrier() => merged.apply(Instruction::barrier(qubits))?,
            _ => merged.apply(inst.clone())?,
        };
    }
    *dag = merged;
    Ok(())
}

impl Pass for MergeAdjacentBarriers {
    fn name(&self) -> &'static str {
        "MergeAdjacentBarriers"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        rewrite_nested(dag, merge_barriers)
    }
}

/// Sums consecutive rotations of the same axis on one qubit.
///
/// Handles `rz`, `rx`, `ry` and `p`. Angles are added symbolically when
/// they are not numeric, and rotations whose angle folds to zero are
/// dropped.
pub struct MergeRotations;

impl MergeRotations {
    /// Create a new rotation merging pass.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MergeRotations {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
    Z,
    Phase,
}

impl Axis {
    fn of(gate: &StandardGate) -> Option<(Self, &ParameterExpression)> {
        match gate {
            StandardGate::Rx(theta) => Some((Axis::X, theta)),
            StandardGate::Ry(theta) => Some((Axis::Y, theta)),
            StandardGate::Rz(theta) => Some((Axis::Z, theta)),
            StandardGate::P(theta) => Some((Axis::Phase, theta)),
            _ => None,
        }
    }

    fn gate(self, theta: ParameterExpression) -> StandardGate {
        match self {
            Axis::X => StandardGate::Rx(theta),
            Axis::Y => StandardGate::Ry(theta),
            Axis::Z => StandardGate::Rz(theta),
            Axis::Phase => StandardGate::P(theta),
        }
    }
}

fn rotation(inst: &Instruction) -> Option<(Axis, ParameterExpression)> {
    if inst.qubits.len() != 1 {
        return None;
    }
    standard_gate(inst)
        .and_then(Axis::of)
        .map(|(axis, theta)| (axis, theta.clone()))
}

fn merge_rotations(dag: &mut CircuitDag) -> CompileResult<()> {
    for node in dag.topological_op_nodes() {
        let Some((axis, mut theta)) = dag.get_instruction(node).and_then(rotation) else {
            continue;
        };
        let Some(&qubit) = dag.get_instruction(node).and_then(|i| i.qubits.first()) else {
            continue;
        };
        let mut merged = false;
        while let Some(next) = dag.wire_successor(node, WireId::Qubit(qubit)) {
            match dag.get_instruction(next).and_then(rotation) {
                Some((next_axis, next_theta)) if next_axis == axis => {
                    theta = (theta + next_theta).simplify();
                    dag.remove_op(next)?;
                    merged = true;
                }
                _ => break,
            }
        }
        if theta.is_zero() {
            dag.remove_op(node)?;
        } else if merged {
            if let Some(inst) = dag.get_instruction_mut(node) {
                inst.kind = InstructionKind::Gate(Gate::standard(axis.gate(theta)));
            }
        }
    }
    Ok(())
}

impl Pass for MergeRotations {
    fn name(&self) -> &'static str {
        "MergeRotations"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        rewrite_nested(dag, merge_rotations)
    }
}
