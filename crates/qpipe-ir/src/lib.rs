//! qpipe Circuit Intermediate Representation
//!
//! This crate provides the operation graph that every qpipe compilation
//! pass reads and rewrites.
//!
//! # Overview
//!
//! Circuits are stored as a DAG (Directed Acyclic Graph) of operations
//! connected by qubit and classical wires. The high-level [`Circuit`] API
//! wraps the DAG with a builder and a JSON-friendly serialized form.
//!
//! # Core Components
//!
//! - **Qubits and Classical Bits**: [`QubitId`], [`ClbitId`]
//! - **Gates**: [`StandardGate`] for built-in gates and [`CustomGate`] for
//!   opaque gates known only by name
//! - **Parameters**: [`ParameterExpression`] for symbolic angles
//! - **Instructions**: [`Instruction`], including control-flow operations
//!   that own nested [`Block`]s
//! - **DAG**: [`CircuitDag`] with in-place node substitution
//! - **Circuit**: [`Circuit`] builder and serialization
//!
//! # Example: Building a Bell State
//!
//! ```rust
//! use qpipe_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::with_size("bell_state", 2, 0);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//! circuit.measure_all().unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.depth(), 3);
//! ```
//!
//! # Example: Conditional Body
//!
//! ```rust
//! use qpipe_ir::{Circuit, ClassicalCondition, ClbitId, QubitId};
//!
//! let mut body = Circuit::with_size("body", 1, 1);
//! body.x(QubitId(0)).unwrap();
//!
//! let mut circuit = Circuit::with_size("feedforward", 2, 1);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.measure(QubitId(0), ClbitId(0)).unwrap();
//! circuit
//!     .if_else(
//!         ClassicalCondition::new(ClbitId(0), true),
//!         &body,
//!         None,
//!         &[QubitId(1)],
//!         &[ClbitId(0)],
//!     )
//!     .unwrap();
//! assert!(circuit.dag().has_control_flow());
//! ```

pub mod circuit;
pub mod dag;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod parameter;
pub mod qubit;

pub use circuit::{Circuit, CircuitData};
pub use dag::{CircuitDag, CircuitLevel, DagEdge, DagNode, NodeIndex, WireId, wires_of};
pub use error::{IrError, IrResult};
pub use gate::{CustomGate, Gate, GateKind, StandardGate};
pub use instruction::{
    Block, CONTROL_FLOW_OP_NAMES, ClassicalCondition, ControlFlow, ControlFlowOp, Instruction,
    InstructionKind,
};
pub use parameter::{ANGLE_TOLERANCE, ParameterExpression};
pub use qubit::{ClbitId, QubitId};
