//! Circuit instructions combining operations with operands.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::{Gate, StandardGate};
use crate::parameter::ParameterExpression;
use crate::qubit::{ClbitId, QubitId};

/// Names of every control-flow construct.
pub const CONTROL_FLOW_OP_NAMES: [&str; 3] = ["if_else", "while_loop", "for_loop"];

/// The kind of instruction in a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A quantum gate operation.
    Gate(Gate),
    /// Measurement operation.
    Measure,
    /// Reset qubit to |0⟩.
    Reset,
    /// Barrier (synchronization point).
    Barrier,
    /// Idle period.
    Delay {
        /// Duration in device time steps (dt).
        duration: u64,
    },
    /// An operation owning nested circuit blocks.
    ControlFlow(ControlFlow),
}

/// Condition on a single classical bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassicalCondition {
    /// Bit tested, in the coordinates of the enclosing circuit.
    pub clbit: ClbitId,
    /// Value the bit must hold.
    pub value: bool,
}

impl ClassicalCondition {
    /// Create a new classical condition.
    pub fn new(clbit: ClbitId, value: bool) -> Self {
        Self { clbit, value }
    }
}

/// The control-flow construct of a [`ControlFlow`] instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlFlowOp {
    /// `if (cond) { blocks[0] } else { blocks[1] }`; the else block is optional.
    IfElse {
        /// Branch condition.
        condition: ClassicalCondition,
    },
    /// `while (cond) { blocks[0] }`.
    WhileLoop {
        /// Loop condition.
        condition: ClassicalCondition,
    },
    /// `for i in indexset { blocks[0] }`.
    ForLoop {
        /// Values taken by the loop variable.
        indexset: Vec<i64>,
    },
}

impl ControlFlowOp {
    /// Operation name used for basis and target lookups.
    pub fn name(&self) -> &'static str {
        match self {
            ControlFlowOp::IfElse { .. } => "if_else",
            ControlFlowOp::WhileLoop { .. } => "while_loop",
            ControlFlowOp::ForLoop { .. } => "for_loop",
        }
    }
}

/// A nested circuit body.
///
/// Local qubit `i` is the `i`-th qubit argument of the owning instruction,
/// and likewise for clbits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Number of qubits the block spans.
    pub num_qubits: u32,
    /// Number of classical bits the block spans.
    pub num_clbits: u32,
    /// Instructions in program order.
    pub instructions: Vec<Instruction>,
}

impl Block {
    /// An empty block of the given width.
    pub fn new(num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            num_qubits,
            num_clbits,
            instructions: vec![],
        }
    }
}

/// A control-flow operation and its blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFlow {
    /// The construct.
    pub op: ControlFlowOp,
    /// Nested bodies.
    pub blocks: Vec<Block>,
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on.
    pub qubits: Vec<QubitId>,
    /// Classical bits this instruction operates on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(gate: impl Into<Gate>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate.into()),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a reset instruction.
    pub fn reset(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::Reset,
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a delay instruction.
    pub fn delay(qubit: QubitId, duration: u64) -> Self {
        Self {
            kind: InstructionKind::Delay { duration },
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Create a control-flow instruction.
    ///
    /// Every block must span exactly the given qubits and clbits.
    pub fn control_flow(
        op: ControlFlowOp,
        blocks: Vec<Block>,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> IrResult<Self> {
        let qubits: Vec<QubitId> = qubits.into_iter().collect();
        let clbits: Vec<ClbitId> = clbits.into_iter().collect();
        for block in &blocks {
            check_width(op.name(), "qubits", block.num_qubits, qubits.len())?;
            check_width(op.name(), "clbits", block.num_clbits, clbits.len())?;
        }
        if let ControlFlowOp::IfElse { condition } | ControlFlowOp::WhileLoop { condition } = &op {
            if !clbits.contains(&condition.clbit) {
                return Err(IrError::ClbitNotFound {
                    clbit: condition.clbit,
                    op_name: Some(op.name().to_string()),
                });
            }
        }
        Ok(Self {
            kind: InstructionKind::ControlFlow(ControlFlow { op, blocks }),
            qubits,
            clbits,
        })
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a reset.
    pub fn is_reset(&self) -> bool {
        matches!(self.kind, InstructionKind::Reset)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// Check if this instruction owns nested blocks.
    pub fn is_control_flow(&self) -> bool {
        matches!(self.kind, InstructionKind::ControlFlow(_))
    }

    /// Get the gate if this is a gate instruction.
    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// Get the control-flow payload.
    pub fn as_control_flow(&self) -> Option<&ControlFlow> {
        match &self.kind {
            InstructionKind::ControlFlow(cf) => Some(cf),
            _ => None,
        }
    }

    /// Get the control-flow payload mutably.
    pub fn as_control_flow_mut(&mut self) -> Option<&mut ControlFlow> {
        match &mut self.kind {
            InstructionKind::ControlFlow(cf) => Some(cf),
            _ => None,
        }
    }

    /// Gate parameters; empty for non-gates.
    pub fn params(&self) -> Vec<ParameterExpression> {
        self.as_gate().map(Gate::params).unwrap_or_default()
    }

    /// Number of qubit arguments.
    pub fn num_qubits(&self) -> u32 {
        u32::try_from(self.qubits.len()).unwrap_or(u32::MAX)
    }

    /// True for a gate acting on exactly two qubits.
    pub fn is_two_qubit_gate(&self) -> bool {
        self.is_gate() && self.qubits.len() == 2
    }

    /// Get the name of the instruction.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Delay { .. } => "delay",
            InstructionKind::ControlFlow(cf) => cf.op.name(),
        }
    }
}

fn check_width(op_name: &str, kind: &'static str, block: u32, outer: usize) -> IrResult<()> {
    if block as usize != outer {
        return Err(IrError::BlockWidthMismatch {
            op_name: op_name.to_string(),
            kind,
            block,
            outer: u32::try_from(outer).unwrap_or(u32::MAX),
        });
    }
    Ok(())
}
