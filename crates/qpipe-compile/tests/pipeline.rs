//! Integration tests for the preset pipeline.
//!
//! These tests compile whole circuits through `compile` and check the
//! properties every output must have: native operations only, two-qubit
//! operations on coupled qubits, bijective layouts and reproducible
//! results for a fixed seed.

use std::sync::Arc;

use qpipe_compile::control_flow::walk_operations;
use qpipe_compile::{
    Backend, CompileError, CompileOptions, CompiledCircuit, CouplingMap, Stage, Target, compile,
};
use qpipe_ir::{Circuit, ClassicalCondition, ClbitId, CustomGate, QubitId};

/// Helper: a circuit touching every stage: a three-qubit gate, long-range
/// interactions, a conditional block and final measurements.
fn workload() -> Circuit {
    let mut body = Circuit::with_size("body", 1, 1);
    body.h(QubitId(0)).unwrap();
    body.t(QubitId(0)).unwrap();

    let mut circuit = Circuit::with_size("workload", 4, 4);
    circuit.h(QubitId(0)).unwrap();
    circuit.ccx(QubitId(0), QubitId(1), QubitId(3)).unwrap();
    circuit.cx(QubitId(0), QubitId(3)).unwrap();
    circuit.swap(QubitId(1), QubitId(2)).unwrap();
    circuit.rz(0.3, QubitId(2)).unwrap();
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit
        .if_else(
            ClassicalCondition::new(ClbitId(0), true),
            &body,
            None,
            &[QubitId(2)],
            &[ClbitId(0)],
        )
        .unwrap();
    circuit.cz(QubitId(2), QubitId(3)).unwrap();
    circuit.measure_all().unwrap();
    circuit
}

/// Helper: assert every operation, nested ones included, is allowed by the
/// target on the qubits it ended up on.
fn assert_native(compiled: &CompiledCircuit, target: &Target) {
    walk_operations(compiled.dag(), |inst, qargs, depth| {
        let name = inst.name();
        let ok = if inst.is_control_flow() {
            target.contains(name)
        } else {
            target.supported(name, qargs)
        };
        assert!(ok, "'{name}' on {qargs:?} at depth {depth} is not native");
        Ok(())
    })
    .unwrap();
}

/// Helper: assert every two-qubit operation acts on coupled qubits.
fn assert_connected(compiled: &CompiledCircuit, coupling: &CouplingMap) {
    walk_operations(compiled.dag(), |inst, qargs, _| {
        if inst.is_gate() && qargs.len() == 2 {
            assert!(
                coupling.is_connected(qargs[0], qargs[1]),
                "'{}' on uncoupled qubits {qargs:?}",
                inst.name()
            );
        }
        Ok(())
    })
    .unwrap();
}

fn heron() -> Backend {
    Backend::heron("heron", 3, 3).unwrap()
}

// ============================================================================
// Basis closure and connectivity
// ============================================================================

#[test]
fn test_output_is_native_at_every_level() {
    let backend = heron();
    let target = backend.target().clone();
    let coupling = backend.coupling_map().unwrap();

    for level in 0..=3 {
        let options = CompileOptions::new()
            .with_optimization_level(level)
            .with_backend(backend.clone())
            .with_seed(17);
        let compiled = compile(&workload(), &options).unwrap();
        assert_native(&compiled, &target);
        assert_connected(&compiled, &coupling);
    }
}

#[test]
fn test_output_respects_basis_gate_list() {
    let basis = ["rz", "sx", "x", "cx", "if_else"];
    let options = CompileOptions::new()
        .with_optimization_level(2)
        .with_coupling_map(CouplingMap::ring(5))
        .with_basis_gates(basis)
        .with_seed(5);
    let compiled = compile(&workload(), &options).unwrap();

    let allowed = ["rz", "sx", "x", "cx", "if_else", "measure", "barrier"];
    for name in compiled.count_ops().keys() {
        assert!(allowed.contains(&name.as_str()), "unexpected '{name}'");
    }
    assert_connected(&compiled, &CouplingMap::ring(5));
}

#[test]
fn test_blocks_are_routed_and_translated() {
    let mut body = Circuit::with_size("body", 3, 1);
    body.cz(QubitId(0), QubitId(2)).unwrap();
    body.cx(QubitId(2), QubitId(0)).unwrap();

    let mut circuit = Circuit::with_size("feedforward", 3, 1);
    circuit.h(QubitId(0)).unwrap();
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit
        .if_else(
            ClassicalCondition::new(ClbitId(0), true),
            &body,
            None,
            &[QubitId(0), QubitId(1), QubitId(2)],
            &[ClbitId(0)],
        )
        .unwrap();

    let allowed = ["rz", "sx", "x", "cx", "if_else", "measure"];
    for level in 0..=3 {
        let options = CompileOptions::new()
            .with_optimization_level(level)
            .with_coupling_map(CouplingMap::linear(3))
            .with_basis_gates(["rz", "sx", "x", "cx", "if_else"])
            .with_seed(3);
        let compiled = compile(&circuit, &options).unwrap();

        assert_connected(&compiled, &CouplingMap::linear(3));
        let ops = compiled.count_ops();
        assert_eq!(ops.get("if_else"), Some(&1));
        assert!(!ops.contains_key("cz"), "cz left in a block at level {level}");
        assert!(!ops.contains_key("swap"), "untranslated swap at level {level}");
        for name in ops.keys() {
            assert!(allowed.contains(&name.as_str()), "unexpected '{name}' at level {level}");
        }
    }
}

#[test]
fn test_cz_translates_to_cx_and_rotations() {
    let mut circuit = Circuit::with_size("cz", 2, 0);
    circuit.cz(QubitId(0), QubitId(1)).unwrap();

    let options = CompileOptions::new()
        .with_optimization_level(0)
        .with_basis_gates(["cx", "rz", "sx", "x"]);
    let compiled = compile(&circuit, &options).unwrap();
    let ops = compiled.count_ops();

    assert_eq!(ops.get("cx"), Some(&1));
    assert!(!ops.contains_key("cz"));
    assert!(ops.keys().all(|n| ["cx", "rz", "sx", "x"].contains(&n.as_str())));
}

// ============================================================================
// Layouts
// ============================================================================

#[test]
fn test_layouts_are_bijections_at_every_level() {
    for level in 0..=3 {
        let options = CompileOptions::new()
            .with_optimization_level(level)
            .with_backend(heron())
            .with_seed(3);
        let compiled = compile(&workload(), &options).unwrap();
        let layout = compiled.layout();

        assert!(layout.initial_layout.is_bijection());
        assert_eq!(layout.initial_layout.num_qubits(), 9);
        assert_eq!(layout.input_qubit_count, 4);
        if let Some(permutation) = &layout.final_layout {
            assert!(permutation.is_bijection());
            assert_eq!(permutation.num_qubits(), 9);
        }
        let mut finals = layout.final_index_layout();
        finals.sort_unstable();
        finals.dedup();
        assert_eq!(finals.len(), 4);
    }
}

#[test]
fn test_perfect_circuit_keeps_identity_layout() {
    let circuit = Circuit::ghz(4).unwrap();
    for level in 0..=3 {
        let options = CompileOptions::new()
            .with_optimization_level(level)
            .with_coupling_map(CouplingMap::linear(4))
            .with_seed(1);
        let compiled = compile(&circuit, &options).unwrap();

        assert_eq!(compiled.count_ops().get("swap"), None);
        assert_eq!(compiled.properties().swap_count(), 0);
        assert_eq!(compiled.layout().initial_index_layout(), vec![0, 1, 2, 3]);
        assert_eq!(compiled.layout().final_index_layout(), vec![0, 1, 2, 3]);
    }
}

#[test]
fn test_one_swap_on_a_line() {
    let mut circuit = Circuit::with_size("far", 3, 0);
    circuit.cx(QubitId(0), QubitId(2)).unwrap();

    let options = CompileOptions::new()
        .with_optimization_level(0)
        .with_coupling_map(CouplingMap::linear(3))
        .with_seed(11);
    let compiled = compile(&circuit, &options).unwrap();

    assert_eq!(compiled.count_ops().get("swap"), Some(&1));
    assert_eq!(compiled.count_ops().get("cx"), Some(&1));
    assert_connected(&compiled, &CouplingMap::linear(3));
    assert_eq!(compiled.layout().initial_index_layout(), vec![0, 1, 2]);
    assert!(compiled.layout().final_layout.is_some());
}

#[test]
fn test_initial_layout_without_coupling_map() {
    let circuit = Circuit::bell().unwrap();
    let options = CompileOptions::new().with_initial_layout(vec![3, 1]);
    let compiled = compile(&circuit, &options).unwrap();

    assert_eq!(compiled.dag().num_qubits(), 4);
    assert_eq!(compiled.layout().initial_index_layout(), vec![3, 1]);
    assert!(compiled.layout().initial_layout.is_bijection());
    assert!(compiled.layout().final_layout.is_none());
}

#[test]
fn test_initial_layout_with_routing() {
    let mut circuit = Circuit::with_size("pair", 2, 0);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();

    let options = CompileOptions::new()
        .with_optimization_level(1)
        .with_coupling_map(CouplingMap::linear(4))
        .with_initial_layout(vec![0, 3])
        .with_seed(2);
    let compiled = compile(&circuit, &options).unwrap();

    assert_eq!(compiled.layout().initial_index_layout(), vec![0, 3]);
    assert!(compiled.properties().swap_count() >= 2);
    assert_connected(&compiled, &CouplingMap::linear(4));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_seed_same_output() {
    let run = |seed| {
        let options = CompileOptions::new()
            .with_optimization_level(3)
            .with_backend(heron())
            .with_seed(seed);
        let compiled = compile(&workload(), &options).unwrap();
        serde_json::to_string(&compiled.circuit()).unwrap()
    };
    assert_eq!(run(99), run(99));
}

#[test]
fn test_pair_list_and_coupling_map_agree() {
    let mut circuit = Circuit::with_size("spread", 3, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.cx(QubitId(0), QubitId(2)).unwrap();
    circuit.cx(QubitId(1), QubitId(2)).unwrap();
    circuit.cx(QubitId(2), QubitId(0)).unwrap();

    for level in 0..=3 {
        let from_pairs = compile_on(&circuit, level, vec![(0, 1), (1, 2)]);
        let from_map = compile_on(&circuit, level, CouplingMap::linear(3));
        assert_eq!(from_pairs, from_map, "outputs differ at level {level}");
    }
}

/// Helper: serialized output and layout of a seeded compile onto `coupling`.
fn compile_on(
    circuit: &Circuit,
    level: u8,
    coupling: impl Into<CouplingMap>,
) -> (String, qpipe_compile::TranspileLayout) {
    let options = CompileOptions::new()
        .with_optimization_level(level)
        .with_coupling_map(coupling)
        .with_basis_gates(["rz", "sx", "x", "cx"])
        .with_seed(8);
    let compiled = compile(circuit, &options).unwrap();
    (
        serde_json::to_string(&compiled.circuit()).unwrap(),
        compiled.layout().clone(),
    )
}

#[test]
fn test_default_seed_is_reproducible() {
    let options = CompileOptions::new().with_coupling_map(CouplingMap::ring(6));
    let mut circuit = Circuit::with_size("spread", 6, 0);
    for (a, b) in [(0, 3), (1, 4), (2, 5), (0, 5)] {
        circuit.cx(QubitId(a), QubitId(b)).unwrap();
    }
    let first = compile(&circuit, &options).unwrap();
    let second = compile(&circuit, &options).unwrap();
    assert_eq!(
        serde_json::to_string(&first.circuit()).unwrap(),
        serde_json::to_string(&second.circuit()).unwrap()
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unreachable_custom_gate() {
    let mut circuit = Circuit::with_size("opaque", 2, 0);
    circuit
        .gate(CustomGate::new("mystery", 2), [QubitId(0), QubitId(1)])
        .unwrap();

    let options = CompileOptions::new().with_basis_gates(["rz", "sx", "cx"]);
    match compile(&circuit, &options) {
        Err(CompileError::BasisNotReachable { gate, .. }) => assert_eq!(gate, "mystery"),
        other => panic!("expected BasisNotReachable, got {other:?}"),
    }
}

#[test]
fn test_control_flow_missing_from_target() {
    let backend = Backend::iqm("iqm", 5).unwrap();
    let mut body = Circuit::with_size("body", 1, 1);
    body.x(QubitId(0)).unwrap();
    let mut circuit = Circuit::with_size("cf", 2, 1);
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit
        .while_loop(
            ClassicalCondition::new(ClbitId(0), true),
            &body,
            &[QubitId(1)],
            &[ClbitId(0)],
        )
        .unwrap();

    let options = CompileOptions::new().with_backend(backend);
    assert!(matches!(
        compile(&circuit, &options),
        Err(CompileError::UnsupportedControlFlow { name }) if name == "while_loop"
    ));
}

#[test]
fn test_circuit_larger_than_backend() {
    let options = CompileOptions::new().with_backend(Backend::iqm("iqm", 5).unwrap());
    assert!(matches!(
        compile(&Circuit::ghz(6).unwrap(), &options),
        Err(CompileError::LayoutInfeasible {
            required: 6,
            available: 5
        })
    ));
}

#[test]
fn test_routing_none_on_unmapped_circuit() {
    let mut circuit = Circuit::with_size("far", 3, 0);
    circuit.cx(QubitId(0), QubitId(2)).unwrap();
    let options = CompileOptions::new()
        .with_optimization_level(0)
        .with_coupling_map(CouplingMap::linear(3))
        .with_method(Stage::Routing, "none");
    assert!(matches!(
        compile(&circuit, &options),
        Err(CompileError::RoutingRequired)
    ));
}

#[test]
fn test_unknown_plugin() {
    let options = CompileOptions::new().with_method(Stage::Layout, "psychic");
    let err = compile(&Circuit::bell().unwrap(), &options).unwrap_err();
    assert!(err.to_string().contains("psychic"));
}

#[test]
fn test_options_share_target() {
    let backend = heron();
    let options = CompileOptions::new().with_target(Arc::clone(backend.target()));
    let compiled = compile(&Circuit::ghz(3).unwrap(), &options).unwrap();
    assert_native(&compiled, backend.target());
}
