//! Optimization passes.
//!
//! Every pass here only deletes or fuses operations, so basis membership
//! and connectivity established by earlier stages are preserved.

mod cancel;
mod merge;
mod remove;

#[cfg(test)]
mod tests;

pub use cancel::InverseCancellation;
pub use merge::{MergeAdjacentBarriers, MergeRotations};
pub use remove::{RemoveDiagonalGatesBeforeMeasure, RemoveResetInZeroState};

use qpipe_ir::{CircuitDag, GateKind, Instruction, InstructionKind, StandardGate};

use crate::control_flow::BlockArena;
use crate::error::CompileResult;

/// Run `rewrite` on the circuit and on every block nested inside it.
///
/// Blocks are rewritten while detached, so the closure never sees a
/// control-flow operation with live contents.
pub(super) fn rewrite_nested<F>(dag: &mut CircuitDag, mut rewrite: F) -> CompileResult<()>
where
    F: FnMut(&mut CircuitDag) -> CompileResult<()>,
{
    if !dag.has_control_flow() {
        return rewrite(dag);
    }
    let mut arena = BlockArena::extract(dag)?;
    rewrite(dag)?;
    for entry in arena.entries_mut() {
        rewrite(&mut entry.dag)?;
    }
    arena.write_back(dag)
}

/// The standard gate behind an instruction, if any.
pub(super) fn standard_gate(inst: &Instruction) -> Option<&StandardGate> {
    match &inst.kind {
        InstructionKind::Gate(gate) => match &gate.kind {
            GateKind::Standard(g) => Some(g),
            GateKind::Custom(_) => None,
        },
        _ => None,
    }
}
