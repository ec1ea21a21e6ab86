//! Tests for optimization passes.

use std::f64::consts::PI;

use qpipe_ir::{
    Circuit, ClassicalCondition, ClbitId, Instruction, ParameterExpression, QubitId, StandardGate,
};

use crate::pass::Pass;
use crate::property::PropertySet;

use super::{
    InverseCancellation, MergeAdjacentBarriers, MergeRotations, RemoveDiagonalGatesBeforeMeasure,
    RemoveResetInZeroState,
};

fn names(circuit: Circuit) -> Vec<String> {
    circuit
        .into_dag()
        .topological_ops()
        .map(|(_, inst)| inst.name().to_string())
        .collect()
}

fn run(pass: &dyn Pass, circuit: Circuit) -> Circuit {
    let mut dag = circuit.into_dag();
    let mut props = PropertySet::new();
    pass.run(&mut dag, &mut props).unwrap();
    Circuit::from_dag("out", dag)
}

#[test]
fn test_inverse_cancellation_cx_pair() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.cx(QubitId(0), QubitId(1)).unwrap();

    let out = run(&InverseCancellation::new(), circuit);
    assert_eq!(out.dag().num_ops(), 0);
}

#[test]
fn test_inverse_cancellation_keeps_reversed_cx() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.cx(QubitId(1), QubitId(0)).unwrap();

    let out = run(&InverseCancellation::new(), circuit);
    assert_eq!(out.dag().num_ops(), 2);
}

#[test]
fn test_inverse_cancellation_blocked_by_intervening_gate() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.x(QubitId(1)).unwrap();
    circuit.cx(QubitId(0), QubitId(1)).unwrap();

    let out = run(&InverseCancellation::new(), circuit);
    assert_eq!(out.dag().num_ops(), 3);
}

#[test]
fn test_inverse_cancellation_cascades() {
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.s(QubitId(0)).unwrap();
    circuit.sdg(QubitId(0)).unwrap();
    circuit.h(QubitId(0)).unwrap();
    circuit.t(QubitId(0)).unwrap();

    let out = run(&InverseCancellation::new(), circuit);
    assert_eq!(names(out), vec!["t"]);
}

#[test]
fn test_inverse_cancellation_sx_sxdg() {
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.sx(QubitId(0)).unwrap();
    circuit
        .append(Instruction::single_qubit_gate(StandardGate::SXdg, QubitId(0)))
        .unwrap();

    let out = run(&InverseCancellation::new(), circuit);
    assert_eq!(out.dag().num_ops(), 0);
}

#[test]
fn test_inverse_cancellation_inside_block() {
    let mut body = Circuit::with_size("body", 1, 1);
    body.x(QubitId(0)).unwrap();
    body.x(QubitId(0)).unwrap();
    body.h(QubitId(0)).unwrap();

    let mut circuit = Circuit::with_size("test", 1, 1);
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit
        .if_else(
            ClassicalCondition::new(ClbitId(0), true),
            &body,
            None,
            &[QubitId(0)],
            &[ClbitId(0)],
        )
        .unwrap();

    let out = run(&InverseCancellation::new(), circuit);
    let counts = out.dag().count_ops_recursive();
    assert_eq!(counts.get("x"), None);
    assert_eq!(counts.get("h"), Some(&1));
}

#[test]
fn test_merge_rotations_sums_angles() {
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.rz(0.25, QubitId(0)).unwrap();
    circuit.rz(0.5, QubitId(0)).unwrap();
    circuit.rx(0.1, QubitId(0)).unwrap();

    let out = run(&MergeRotations::new(), circuit);
    let ops: Vec<_> = out.dag().topological_ops().map(|(_, i)| i.clone()).collect();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].name(), "rz");
    let theta = ops[0].params()[0].as_f64().unwrap();
    assert!((theta - 0.75).abs() < 1e-12);
    assert_eq!(ops[1].name(), "rx");
}

#[test]
fn test_merge_rotations_drops_zero() {
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.p(PI / 3.0, QubitId(0)).unwrap();
    circuit.p(-PI / 3.0, QubitId(0)).unwrap();
    circuit.ry(0.0, QubitId(0)).unwrap();

    let out = run(&MergeRotations::new(), circuit);
    assert_eq!(out.dag().num_ops(), 0);
}

#[test]
fn test_merge_rotations_symbolic() {
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.rz(ParameterExpression::symbol("a"), QubitId(0)).unwrap();
    circuit.rz(0.5, QubitId(0)).unwrap();

    let out = run(&MergeRotations::new(), circuit);
    let ops: Vec<_> = out.dag().topological_ops().map(|(_, i)| i.clone()).collect();
    assert_eq!(ops.len(), 1);
    assert!(ops[0].params()[0].is_symbolic());
}

#[test]
fn test_merge_adjacent_barriers() {
    let mut circuit = Circuit::with_size("test", 3, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.barrier([QubitId(0), QubitId(1)]).unwrap();
    circuit.barrier([QubitId(1), QubitId(2)]).unwrap();
    circuit.x(QubitId(2)).unwrap();

    let out = run(&MergeAdjacentBarriers::new(), circuit);
    let ops: Vec<_> = out.dag().topological_ops().map(|(_, i)| i.clone()).collect();
    assert_eq!(ops.len(), 3);
    let barrier = ops.iter().find(|i| i.is_barrier()).unwrap();
    assert_eq!(barrier.qubits, vec![QubitId(0), QubitId(1), QubitId(2)]);
}

#[test]
fn test_barriers_separated_by_gate_stay_apart() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.barrier([QubitId(0), QubitId(1)]).unwrap();
    circuit.x(QubitId(1)).unwrap();
    circuit.barrier([QubitId(0), QubitId(1)]).unwrap();

    let out = run(&MergeAdjacentBarriers::new(), circuit);
    assert_eq!(out.dag().count_ops().get("barrier"), Some(&2));
}

#[test]
fn test_remove_reset_in_zero_state() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.reset(QubitId(0)).unwrap();
    circuit.reset(QubitId(0)).unwrap();
    circuit.h(QubitId(1)).unwrap();
    circuit.reset(QubitId(1)).unwrap();

    let out = run(&RemoveResetInZeroState, circuit);
    assert_eq!(names(out), vec!["h", "reset"]);
}

#[test]
fn test_remove_diagonal_before_measure() {
    let mut circuit = Circuit::with_size("test", 2, 2);
    circuit.h(QubitId(0)).unwrap();
    circuit.t(QubitId(0)).unwrap();
    circuit.rz(0.3, QubitId(0)).unwrap();
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit.h(QubitId(1)).unwrap();
    circuit.measure(QubitId(1), ClbitId(1)).unwrap();

    let out = run(&RemoveDiagonalGatesBeforeMeasure, circuit);
    let counts = out.dag().count_ops();
    assert_eq!(counts.get("t"), None);
    assert_eq!(counts.get("rz"), None);
    assert_eq!(counts.get("h"), Some(&2));
}

#[test]
fn test_remove_two_qubit_diagonal_needs_both_measured() {
    let mut measured = Circuit::with_size("test", 2, 2);
    measured.cz(QubitId(0), QubitId(1)).unwrap();
    measured.measure(QubitId(0), ClbitId(0)).unwrap();
    measured.measure(QubitId(1), ClbitId(1)).unwrap();
    let out = run(&RemoveDiagonalGatesBeforeMeasure, measured);
    assert_eq!(out.dag().count_ops().get("cz"), None);

    let mut half = Circuit::with_size("test", 2, 1);
    half.cp(0.4, QubitId(0), QubitId(1)).unwrap();
    half.measure(QubitId(0), ClbitId(0)).unwrap();
    half.h(QubitId(1)).unwrap();
    let out = run(&RemoveDiagonalGatesBeforeMeasure, half);
    assert_eq!(out.dag().count_ops().get("cp"), Some(&1));
}

#[test]
fn test_remove_diagonal_inside_nested_blocks() {
    let mut inner = Circuit::with_size("inner", 1, 1);
    inner.h(QubitId(0)).unwrap();
    inner.z(QubitId(0)).unwrap();
    inner.measure(QubitId(0), ClbitId(0)).unwrap();

    let mut outer = Circuit::with_size("outer", 1, 1);
    outer
        .while_loop(
            ClassicalCondition::new(ClbitId(0), false),
            &inner,
            &[QubitId(0)],
            &[ClbitId(0)],
        )
        .unwrap();

    let mut circuit = Circuit::with_size("test", 2, 1);
    circuit.measure(QubitId(1), ClbitId(0)).unwrap();
    circuit
        .if_else(
            ClassicalCondition::new(ClbitId(0), true),
            &outer,
            None,
            &[QubitId(0)],
            &[ClbitId(0)],
        )
        .unwrap();

    let out = run(&RemoveDiagonalGatesBeforeMeasure, circuit);
    let counts = out.dag().count_ops_recursive();
    assert_eq!(counts.get("z"), None);
    assert_eq!(counts.get("h"), Some(&1));
    assert_eq!(counts.get("measure"), Some(&2));
}
