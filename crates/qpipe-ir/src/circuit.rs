//! High-level circuit builder API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dag::CircuitDag;
use crate::error::{IrError, IrResult};
use crate::gate::{Gate, StandardGate};
use crate::instruction::{Block, ClassicalCondition, ControlFlowOp, Instruction};
use crate::parameter::ParameterExpression;
use crate::qubit::{ClbitId, QubitId};

/// A quantum circuit.
///
/// This provides a high-level API for building quantum circuits,
/// with convenient methods for common gates and operations. Qubits are
/// numbered `0..num_qubits` and classical bits `0..num_clbits`.
///
/// Circuits serialize as a flat instruction list (see [`CircuitData`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "CircuitData", try_from = "CircuitData")]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// The underlying DAG representation.
    dag: CircuitDag,
}

/// Serialized form of a [`Circuit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitData {
    /// Name of the circuit.
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of qubits.
    pub num_qubits: u32,
    /// Number of classical bits.
    #[serde(default)]
    pub num_clbits: u32,
    /// Global phase in radians.
    #[serde(default)]
    pub global_phase: f64,
    /// Instructions in program order.
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

fn default_name() -> String {
    "circuit".into()
}

impl From<Circuit> for CircuitData {
    #[allow(clippy::cast_possible_truncation)]
    fn from(circuit: Circuit) -> Self {
        let instructions = circuit.instructions();
        Self {
            num_qubits: circuit.dag.num_qubits() as u32,
            num_clbits: circuit.dag.num_clbits() as u32,
            global_phase: circuit.dag.global_phase(),
            name: circuit.name,
            instructions,
        }
    }
}

impl TryFrom<CircuitData> for Circuit {
    type Error = IrError;

    fn try_from(data: CircuitData) -> IrResult<Self> {
        let mut circuit = Circuit::with_size(data.name, data.num_qubits, data.num_clbits);
        circuit.dag.set_global_phase(data.global_phase);
        for inst in data.instructions {
            circuit.dag.apply(inst)?;
        }
        Ok(circuit)
    }
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dag: CircuitDag::new(),
        }
    }

    /// Create a circuit with a given number of qubits and classical bits.
    pub fn with_size(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            name: name.into(),
            dag: CircuitDag::with_size(num_qubits, num_clbits),
        }
    }

    /// Add a single qubit to the circuit.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_qubit(&mut self) -> QubitId {
        let id = QubitId(self.dag.num_qubits() as u32);
        self.dag.add_qubit(id);
        id
    }

    /// Add a single classical bit to the circuit.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_clbit(&mut self) -> ClbitId {
        let id = ClbitId(self.dag.num_clbits() as u32);
        self.dag.add_clbit(id);
        id
    }

    fn apply_standard(
        &mut self,
        gate: StandardGate,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::gate(gate, qubits))?;
        Ok(self)
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::H, [qubit])
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::X, [qubit])
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::Y, [qubit])
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::Z, [qubit])
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::S, [qubit])
    }

    /// Apply S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::Sdg, [qubit])
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::T, [qubit])
    }

    /// Apply T-dagger gate.
    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::Tdg, [qubit])
    }

    /// Apply sqrt(X) gate.
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::SX, [qubit])
    }

    /// Apply RX rotation.
    pub fn rx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::Rx(theta.into()), [qubit])
    }

    /// Apply RY rotation.
    pub fn ry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::Ry(theta.into()), [qubit])
    }

    /// Apply RZ rotation.
    pub fn rz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::Rz(theta.into()), [qubit])
    }

    /// Apply phase gate.
    pub fn p(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::P(theta.into()), [qubit])
    }

    /// Apply U gate.
    pub fn u(
        &mut self,
        theta: impl Into<ParameterExpression>,
        phi: impl Into<ParameterExpression>,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_standard(
            StandardGate::U(theta.into(), phi.into(), lambda.into()),
            [qubit],
        )
    }

    // =========================================================================
    // Multi-qubit gates
    // =========================================================================

    /// Apply CNOT (CX) gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::CX, [control, target])
    }

    /// Apply CY gate.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::CY, [control, target])
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::CZ, [control, target])
    }

    /// Apply echoed cross-resonance gate.
    pub fn ecr(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::ECR, [q1, q2])
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::Swap, [q1, q2])
    }

    /// Apply controlled phase gate.
    pub fn cp(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::CP(theta.into()), [control, target])
    }

    /// Apply ZZ rotation.
    pub fn rzz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        q1: QubitId,
        q2: QubitId,
    ) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::RZZ(theta.into()), [q1, q2])
    }

    /// Apply Toffoli (CCX) gate.
    pub fn ccx(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::CCX, [c1, c2, target])
    }

    /// Apply Fredkin (CSWAP) gate.
    pub fn cswap(&mut self, control: QubitId, t1: QubitId, t2: QubitId) -> IrResult<&mut Self> {
        self.apply_standard(StandardGate::CSwap, [control, t1, t2])
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Apply an arbitrary gate.
    pub fn gate(
        &mut self,
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::gate(gate, qubits))?;
        Ok(self)
    }

    /// Append a prebuilt instruction.
    pub fn append(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        self.dag.apply(instruction)?;
        Ok(self)
    }

    /// Measure a qubit to a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::measure(qubit, clbit))?;
        Ok(self)
    }

    /// Measure every qubit into the classical bit of the same index,
    /// adding classical bits as needed.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        while self.dag.num_clbits() < self.dag.num_qubits() {
            self.add_clbit();
        }
        for q in self.dag.qubits() {
            self.dag.apply(Instruction::measure(q, ClbitId(q.0)))?;
        }
        Ok(self)
    }

    /// Reset a qubit to |0⟩.
    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::reset(qubit))?;
        Ok(self)
    }

    /// Apply a barrier to specified qubits.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::barrier(qubits))?;
        Ok(self)
    }

    /// Apply a barrier to all qubits.
    pub fn barrier_all(&mut self) -> IrResult<&mut Self> {
        let qubits = self.dag.qubits();
        self.dag.apply(Instruction::barrier(qubits))?;
        Ok(self)
    }

    /// Apply a delay to a qubit.
    pub fn delay(&mut self, qubit: QubitId, duration: u64) -> IrResult<&mut Self> {
        self.dag.apply(Instruction::delay(qubit, duration))?;
        Ok(self)
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    /// Append an `if_else` whose bodies act on `qubits` and `clbits`.
    ///
    /// Body qubit `i` is bound to `qubits[i]`, and likewise for clbits.
    pub fn if_else(
        &mut self,
        condition: ClassicalCondition,
        true_body: &Circuit,
        false_body: Option<&Circuit>,
        qubits: &[QubitId],
        clbits: &[ClbitId],
    ) -> IrResult<&mut Self> {
        let mut blocks = vec![true_body.to_block()];
        blocks.extend(false_body.map(Circuit::to_block));
        let inst = Instruction::control_flow(
            ControlFlowOp::IfElse { condition },
            blocks,
            qubits.iter().copied(),
            clbits.iter().copied(),
        )?;
        self.append(inst)
    }

    /// Append a `while_loop` whose body acts on `qubits` and `clbits`.
    pub fn while_loop(
        &mut self,
        condition: ClassicalCondition,
        body: &Circuit,
        qubits: &[QubitId],
        clbits: &[ClbitId],
    ) -> IrResult<&mut Self> {
        let inst = Instruction::control_flow(
            ControlFlowOp::WhileLoop { condition },
            vec![body.to_block()],
            qubits.iter().copied(),
            clbits.iter().copied(),
        )?;
        self.append(inst)
    }

    /// Append a `for_loop` whose body acts on `qubits` and `clbits`.
    pub fn for_loop(
        &mut self,
        indexset: Vec<i64>,
        body: &Circuit,
        qubits: &[QubitId],
        clbits: &[ClbitId],
    ) -> IrResult<&mut Self> {
        let inst = Instruction::control_flow(
            ControlFlowOp::ForLoop { indexset },
            vec![body.to_block()],
            qubits.iter().copied(),
            clbits.iter().copied(),
        )?;
        self.append(inst)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the circuit.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.dag.num_qubits()
    }

    /// Get the number of classical bits.
    pub fn num_clbits(&self) -> usize {
        self.dag.num_clbits()
    }

    /// Get the circuit depth.
    pub fn depth(&self) -> usize {
        self.dag.depth()
    }

    /// Operation counts by name, top level only.
    pub fn count_ops(&self) -> BTreeMap<String, usize> {
        self.dag.count_ops()
    }

    /// Global phase in radians.
    pub fn global_phase(&self) -> f64 {
        self.dag.global_phase()
    }

    /// Instructions in topological order.
    pub fn instructions(&self) -> Vec<Instruction> {
        self.dag
            .topological_ops()
            .map(|(_, inst)| inst.clone())
            .collect()
    }

    /// The circuit as a control-flow block.
    pub fn to_block(&self) -> Block {
        self.dag.to_block()
    }

    /// Get a reference to the underlying DAG.
    pub fn dag(&self) -> &CircuitDag {
        &self.dag
    }

    /// Get a mutable reference to the underlying DAG.
    pub fn dag_mut(&mut self) -> &mut CircuitDag {
        &mut self.dag
    }

    /// Consume the circuit and return the DAG.
    pub fn into_dag(self) -> CircuitDag {
        self.dag
    }

    /// Create a circuit from a DAG.
    pub fn from_dag(name: impl Into<String>, dag: CircuitDag) -> Self {
        Self {
            name: name.into(),
            dag,
        }
    }

    // =========================================================================
    // Pre-built circuits
    // =========================================================================

    /// Create a Bell state circuit.
    pub fn bell() -> IrResult<Self> {
        let mut circuit = Self::with_size("bell", 2, 2);
        circuit
            .h(QubitId(0))?
            .cx(QubitId(0), QubitId(1))?
            .measure(QubitId(0), ClbitId(0))?
            .measure(QubitId(1), ClbitId(1))?;
        Ok(circuit)
    }

    /// Create a GHZ state circuit.
    pub fn ghz(n: u32) -> IrResult<Self> {
        if n == 0 {
            return Ok(Self::new("ghz_0"));
        }
        let mut circuit = Self::with_size("ghz", n, n);
        circuit.h(QubitId(0))?;
        for i in 0..n - 1 {
            circuit.cx(QubitId(i), QubitId(i + 1))?;
        }
        for i in 0..n {
            circuit.measure(QubitId(i), ClbitId(i))?;
        }
        Ok(circuit)
    }

    /// Create a QFT circuit (without measurements).
    pub fn qft(n: u32) -> IrResult<Self> {
        use std::f64::consts::PI;

        let mut circuit = Self::with_size("qft", n, 0);
        for i in 0..n {
            circuit.h(QubitId(i))?;
            for j in (i + 1)..n {
                let angle = PI / f64::from(1u32 << (j - i).min(31));
                circuit.cp(angle, QubitId(j), QubitId(i))?;
            }
        }
        for i in 0..n / 2 {
            circuit.swap(QubitId(i), QubitId(n - 1 - i))?;
        }
        Ok(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_circuit_with_size() {
        let circuit = Circuit::with_size("test", 3, 2);
        assert_eq!(circuit.num_qubits(), 3);
        assert_eq!(circuit.num_clbits(), 2);
    }

    #[test]
    fn test_bell_state() {
        let circuit = Circuit::bell().unwrap();
        assert_eq!(circuit.num_qubits(), 2);
        assert_eq!(circuit.depth(), 3); // H, CX, parallel measures
    }

    #[test]
    fn test_parameterized_gate() {
        let mut circuit = Circuit::with_size("test", 1, 0);
        circuit.rx(PI / 2.0, QubitId(0)).unwrap();
        circuit
            .ry(ParameterExpression::symbol("theta"), QubitId(0))
            .unwrap();
        assert_eq!(circuit.depth(), 2);
    }

    #[test]
    fn test_measure_all_adds_clbits() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.h(QubitId(0)).unwrap().measure_all().unwrap();
        assert_eq!(circuit.num_clbits(), 3);
        assert_eq!(circuit.count_ops()["measure"], 3);
    }

    #[test]
    fn test_if_else_builder() {
        let mut body = Circuit::with_size("body", 1, 1);
        body.x(QubitId(0)).unwrap();

        let mut circuit = Circuit::with_size("test", 2, 1);
        circuit
            .h(QubitId(0))
            .unwrap()
            .measure(QubitId(0), ClbitId(0))
            .unwrap()
            .if_else(
                ClassicalCondition::new(ClbitId(0), true),
                &body,
                None,
                &[QubitId(1)],
                &[ClbitId(0)],
            )
            .unwrap();

        let last = circuit.instructions().pop().unwrap();
        let cf = last.as_control_flow().unwrap();
        assert_eq!(cf.blocks.len(), 1);
        assert_eq!(cf.blocks[0].instructions[0].name(), "x");
        assert_eq!(last.qubits, vec![QubitId(1)]);
    }

    #[test]
    fn test_if_else_requires_condition_bit_and_matching_widths() {
        let body = Circuit::with_size("body", 1, 1);
        let mut circuit = Circuit::with_size("test", 2, 1);
        let condition = ClassicalCondition::new(ClbitId(0), true);

        let err = circuit
            .if_else(condition, &Circuit::with_size("body", 1, 0), None, &[QubitId(1)], &[])
            .unwrap_err();
        assert!(matches!(err, IrError::ClbitNotFound { clbit: ClbitId(0), .. }));

        let err = circuit
            .if_else(
                condition,
                &Circuit::with_size("body", 1, 0),
                None,
                &[QubitId(1)],
                &[ClbitId(0)],
            )
            .unwrap_err();
        assert!(matches!(err, IrError::BlockWidthMismatch { kind: "clbits", .. }));

        circuit
            .if_else(condition, &body, None, &[QubitId(1)], &[ClbitId(0)])
            .unwrap();
        assert!(circuit.dag().has_control_flow());
    }

    #[test]
    fn test_json_round_trip_preserves_program() {
        let mut circuit = Circuit::ghz(3).unwrap();
        circuit.dag_mut().set_global_phase(0.5);
        let json = serde_json::to_string(&circuit).unwrap();
        let back: Circuit = serde_json::from_str(&json).unwrap();
        assert_eq!(back.instructions(), circuit.instructions());
        assert_eq!(back.num_clbits(), 3);
        assert!((back.global_phase() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_deserialize_rejects_bad_qubit() {
        let json = r#"{"num_qubits": 1, "instructions": [
            {"kind": {"Gate": {"kind": {"Standard": "CX"}}}, "qubits": [0, 1]}
        ]}"#;
        assert!(serde_json::from_str::<Circuit>(json).is_err());
    }
}
