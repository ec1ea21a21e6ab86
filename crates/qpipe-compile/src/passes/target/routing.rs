//! Routing checks and the greedy router.

use qpipe_ir::{CircuitDag, Instruction, QubitId, StandardGate};

use super::layout::is_routable_2q;
use crate::control_flow::walk_operations;
use crate::error::{CompileError, CompileResult};
use crate::layout::{Layout, len_u32};
use crate::pass::{Pass, PassKind};
use crate::property::{Property, PropertySet};

/// Records whether every two-qubit operation, nested ones included, sits
/// on a coupling edge.
///
/// Qubits are read as physical positions. Without a coupling map every
/// circuit counts as mapped.
pub struct CheckMap;

impl Pass for CheckMap {
    fn name(&self) -> &'static str {
        "CheckMap"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let mut mapped = true;
        if let Some(coupling_map) = properties.coupling_map.as_ref() {
            walk_operations(dag, |inst, qubits, _| {
                if mapped && is_routable_2q(inst) && !coupling_map.is_connected(qubits[0], qubits[1]) {
                    mapped = false;
                }
                Ok(())
            })?;
        }
        properties.insert(Property::IsSwapMapped(mapped));
        Ok(())
    }
}

/// Fails the compilation when [`CheckMap`] found an unmapped circuit.
pub struct RequireSwapMapped;

impl Pass for RequireSwapMapped {
    fn name(&self) -> &'static str {
        "RequireSwapMapped"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, _dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        match properties.is_swap_mapped() {
            Some(false) => Err(CompileError::RoutingRequired),
            _ => Ok(()),
        }
    }
}

/// Basic routing pass.
///
/// For every two-qubit operation on non-adjacent qubits, moves the first
/// qubit along a shortest path until it neighbours the second. Fast and
/// correct, but makes no attempt to share swaps between operations.
/// Circuits with control flow are rejected.
pub struct BasicSwap;

impl Pass for BasicSwap {
    fn name(&self) -> &'static str {
        "BasicSwap"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .clone()
            .ok_or(CompileError::MissingCouplingMap)?;
        if dag.has_control_flow() {
            return Err(CompileError::PassFailed {
                name: "BasicSwap".into(),
                reason: "control flow is not supported".into(),
            });
        }
        let num_physical = coupling_map.num_qubits();
        if dag.num_qubits() > num_physical as usize {
            return Err(CompileError::LayoutInfeasible {
                required: dag.num_qubits(),
                available: num_physical,
            });
        }

        // Starting position -> current position.
        let mut current = Layout::trivial(num_physical);
        let mut routed = CircuitDag::with_size(num_physical, len_u32(dag.num_clbits()));
        routed.set_global_phase(dag.global_phase());
        routed.set_level(dag.level());
        let mut swaps = 0usize;

        for (_, inst) in dag.topological_ops() {
            let mut inst: Instruction = inst.clone();
            for q in &mut inst.qubits {
                *q = QubitId(current.physical(*q));
            }
            if is_routable_2q(&inst) {
                let (p0, p1) = (inst.qubits[0].0, inst.qubits[1].0);
                if !coupling_map.is_connected(p0, p1) {
                    let path = coupling_map
                        .shortest_path(p0, p1)
                        .ok_or(CompileError::RoutingFailed { qubit1: p0, qubit2: p1 })?;
                    for step in path.windows(2).take(path.len() - 2) {
                        routed.apply(Instruction::two_qubit_gate(
                            StandardGate::Swap,
                            QubitId(step[0]),
                            QubitId(step[1]),
                        ))?;
                        current.swap_physical(step[0], step[1]);
                        swaps += 1;
                    }
                    inst.qubits[0] = QubitId(path[path.len() - 2]);
                }
            }
            routed.apply(inst)?;
        }

        *dag = routed;
        let final_layout = match properties.final_layout() {
            Some(previous) => previous.compose(&current)?,
            None => current,
        };
        properties.insert(Property::FinalLayout(final_layout));
        properties.insert(Property::SwapCount(properties.swap_count() + swaps));
        properties.insert(Property::IsSwapMapped(true));
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.coupling_map.is_some()
    }
}
