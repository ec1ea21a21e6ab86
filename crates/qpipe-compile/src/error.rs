//! Error types for the compilation crate.

use thiserror::Error;

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] qpipe_ir::IrError),

    /// Invalid options, detected before any pass runs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No chain of equivalence rules reaches the target basis.
    #[error(
        "Unable to translate '{gate}' on qubits {qubits:?} to the target basis {target_basis:?}"
    )]
    BasisNotReachable {
        /// First unreachable gate name.
        gate: String,
        /// Physical qubits it was found on (empty when used globally).
        qubits: Vec<u32>,
        /// The effective basis the search ran against.
        target_basis: Vec<String>,
    },

    /// A control-flow construct is missing from the basis or target.
    #[error("Control-flow operation '{name}' is not supported by the target")]
    UnsupportedControlFlow {
        /// Name of the construct, e.g. `if_else`.
        name: String,
    },

    /// Circuit too large for the device.
    #[error("Circuit requires {required} qubits but target only has {available}")]
    LayoutInfeasible {
        /// Qubits the circuit needs.
        required: usize,
        /// Physical qubits available.
        available: u32,
    },

    /// No valid layout exists for another reason.
    #[error("No valid layout: {0}")]
    LayoutInfeasibleReason(String),

    /// Missing coupling map for a pass that needs one.
    #[error("Missing coupling map")]
    MissingCouplingMap,

    /// Missing layout for a pass that needs one.
    #[error("Missing layout")]
    MissingLayout,

    /// The circuit needs routing but routing was disabled.
    #[error("Circuit is not mapped to the coupling map and routing_method=none")]
    RoutingRequired,

    /// Routing failed because qubits are not connected.
    #[error("Routing failed: qubits {qubit1} and {qubit2} not connected")]
    RoutingFailed {
        /// First physical qubit.
        qubit1: u32,
        /// Second physical qubit.
        qubit2: u32,
    },

    /// A scheduled operation has no known duration.
    #[error("No duration for '{name}' on qubits {qubits:?}")]
    MissingDuration {
        /// Operation name.
        name: String,
        /// Physical qubits.
        qubits: Vec<u32>,
    },

    /// Pass execution failed.
    #[error("Pass '{name}' failed: {reason}")]
    PassFailed {
        /// Name of the pass.
        name: String,
        /// Failure reason.
        reason: String,
    },
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
