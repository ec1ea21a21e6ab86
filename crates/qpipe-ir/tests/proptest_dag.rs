//! Property-based tests for DAG construction and circuit serialization.
//!
//! Random circuits must build a consistent DAG, survive node removal, and
//! come back unchanged from a JSON round trip.

use proptest::prelude::*;
use qpipe_ir::{Circuit, ClbitId, QubitId};

/// Generate a random circuit with:
/// - 1-5 qubits and as many classical bits
/// - 0-16 operations from a small gate set plus measure and barrier
fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (1_u32..=5).prop_flat_map(|num_qubits| {
        prop::collection::vec(arb_op(num_qubits), 0..=16).prop_map(move |ops| {
            let mut circuit = Circuit::with_size("random", num_qubits, num_qubits);
            for op in ops {
                op.apply(&mut circuit);
            }
            circuit
        })
    })
}

/// Operations that can be applied to a circuit.
#[derive(Debug, Clone)]
enum Op {
    H(u32),
    Sx(u32),
    Rz(f64, u32),
    Cx(u32, u32),
    Measure(u32),
    Barrier,
}

impl Op {
    fn apply(self, circuit: &mut Circuit) {
        let result = match self {
            Op::H(q) => circuit.h(QubitId(q)).map(|_| ()),
            Op::Sx(q) => circuit.sx(QubitId(q)).map(|_| ()),
            Op::Rz(theta, q) => circuit.rz(theta, QubitId(q)).map(|_| ()),
            Op::Cx(c, t) => circuit.cx(QubitId(c), QubitId(t)).map(|_| ()),
            Op::Measure(q) => circuit.measure(QubitId(q), ClbitId(q)).map(|_| ()),
            Op::Barrier => circuit.barrier_all().map(|_| ()),
        };
        result.expect("generated operations stay inside the circuit");
    }
}

fn arb_op(num_qubits: u32) -> impl Strategy<Value = Op> {
    let single = prop_oneof![
        (0..num_qubits).prop_map(Op::H),
        (0..num_qubits).prop_map(Op::Sx),
        (-8_i32..=8, 0..num_qubits).prop_map(|(k, q)| Op::Rz(f64::from(k) * 0.25, q)),
        (0..num_qubits).prop_map(Op::Measure),
        Just(Op::Barrier),
    ];
    if num_qubits < 2 {
        single.boxed()
    } else {
        prop_oneof![
            4 => single,
            1 => (0..num_qubits, 0..num_qubits)
                .prop_filter("Control and target must differ", |(c, t)| c != t)
                .prop_map(|(c, t)| Op::Cx(c, t)),
        ]
        .boxed()
    }
}

proptest! {
    /// Building a circuit keeps the DAG consistent.
    #[test]
    fn test_random_circuit_dag_is_consistent(circuit in arb_circuit()) {
        let dag = circuit.dag();
        prop_assert!(dag.verify_integrity().is_ok());
        prop_assert_eq!(dag.topological_op_nodes().len(), dag.num_ops());
        prop_assert!(dag.depth() <= dag.num_ops());
        prop_assert_eq!(circuit.instructions().len(), dag.num_ops());
    }

    /// JSON round trip preserves sizes and the instruction sequence.
    #[test]
    fn test_json_roundtrip_preserves_instructions(circuit in arb_circuit()) {
        let json = serde_json::to_string(&circuit).expect("Failed to serialize circuit");
        let parsed: Circuit = serde_json::from_str(&json).expect("Failed to parse circuit JSON");

        prop_assert_eq!(parsed.num_qubits(), circuit.num_qubits());
        prop_assert_eq!(parsed.num_clbits(), circuit.num_clbits());
        prop_assert_eq!(parsed.depth(), circuit.depth());
        prop_assert_eq!(parsed.instructions(), circuit.instructions());
    }

    /// Removing any subset of operations reconnects the wires.
    #[test]
    fn test_removing_ops_keeps_dag_consistent(
        mut circuit in arb_circuit(),
        picks in prop::collection::vec(any::<bool>(), 16),
    ) {
        let nodes = circuit.dag().topological_op_nodes();
        let mut removed = 0;
        for (node, pick) in nodes.iter().zip(picks) {
            if pick {
                circuit.dag_mut().remove_op(*node).expect("Failed to remove operation");
                removed += 1;
            }
        }

        prop_assert!(circuit.dag().verify_integrity().is_ok());
        prop_assert_eq!(circuit.dag().num_ops(), nodes.len() - removed);

        let json = serde_json::to_string(&circuit).expect("Failed to serialize circuit");
        let parsed: Circuit = serde_json::from_str(&json).expect("Failed to parse circuit JSON");
        prop_assert_eq!(parsed.instructions(), circuit.instructions());
    }
}
