//! Cancellation of adjacent inverse pairs.

use qpipe_ir::{CircuitDag, DagNode, NodeIndex, StandardGate, WireId};
use rustc_hash::FxHashSet;

use super::{rewrite_nested, standard_gate};
use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Inverse cancellation pass.
///
/// Removes pairs of directly adjacent gates on identical qubits whose
/// product is the identity: two copies of a self-inverse gate (`cx`, `cy`,
/// `cz`, `swap`, `h`, `x`, `y`, `z`, `ecr`, `ch`), or one of the pairs
/// (`s`, `sdg`), (`t`, `tdg`), (`sx`, `sxdg`) in either order.
///
/// Runs until no pair is left, so `h h h h` disappears entirely.
pub struct InverseCancellation;

impl InverseCancellation {
    /// Create a new inverse cancellation pass.
    pub fn new() -> Self {
        Self
    }
}

impl Default for InverseCancellation {
    fn default() -> Self {
        Self::new()
    }
}

fn is_inverse_pair(a: &StandardGate, b: &StandardGate) -> bool {
    use StandardGate::{CH, CX, CY, CZ, ECR, H, S, SX, SXdg, Sdg, Swap, T, Tdg, X, Y, Z};
    matches!(
        (a, b),
        (CX, CX)
            | (CY, CY)
            | (CZ, CZ)
            | (Swap, Swap)
            | (H, H)
            | (X, X)
            | (Y, Y)
            | (Z, Z)
            | (ECR, ECR)
            | (CH, CH)
            | (S, Sdg)
            | (Sdg, S)
            | (T, Tdg)
            | (Tdg, T)
            | (SX, SXdg)
            | (SXdg, SX)
    )
}

/// The operation that follows `node` on every one of its qubits, if it is
/// the same node on all of them.
fn common_successor(dag: &CircuitDag, node: NodeIndex) -> Option<NodeIndex> {
    let inst = dag.get_instruction(node)?;
    let mut wires = inst.qubits.iter().map(|&q| WireId::Qubit(q));
    let first = dag.wire_successor(node, wires.next()?)?;
    if !matches!(dag.node(first), Some(DagNode::Op(_))) {
        return None;
    }
    wires
        .all(|w| dag.wire_successor(node, w) == Some(first))
        .then_some(first)
}

fn find_cancellable_pairs(dag: &CircuitDag) -> Vec<(NodeIndex, NodeIndex)> {
    let mut pairs = Vec::new();
    let mut claimed: FxHashSet<NodeIndex> = FxHashSet::default();

    for (node, inst) in dag.topological_ops() {
        if claimed.contains(&node) || !inst.clbits.is_empty() {
            continue;
        }
        let Some(gate) = standard_gate(inst) else {
            continue;
        };
        let Some(next) = common_successor(dag, node) else {
            continue;
        };
        if claimed.contains(&next) {
            continue;
        }
        let Some(next_inst) = dag.get_instruction(next) else {
            continue;
        };
        let cancels = next_inst.qubits == inst.qubits
            && standard_gate(next_inst).is_some_and(|next_gate| is_inverse_pair(gate, next_gate));
        if cancels {
            claimed.insert(node);
            claimed.insert(next);
            pairs.push((node, next));
        }
    }
    pairs
}

fn cancel_all(dag: &mut CircuitDag) -> CompileResult<()> {
    loop {
        let pairs = find_cancellable_pairs(dag);
        if pairs.is_empty() {
            return Ok(());
        }
        for (first, second) in pairs {
            dag.remove_op(first)?;
            dag.remove_op(second)?;
        }
    }
}

impl Pass for InverseCancellation {
    fn name(&self) -> &'static str {
        "InverseCancellation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        rewrite_nested(dag, cancel_all)
    }
}
