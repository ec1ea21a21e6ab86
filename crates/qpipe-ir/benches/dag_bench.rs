//! Benchmarks for qpipe DAG operations
//!
//! Run with: cargo bench -p qpipe-ir

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qpipe_ir::{Circuit, Instruction, QubitId, StandardGate};

fn layered(num_qubits: u32, layers: usize) -> Circuit {
    let mut circuit = Circuit::with_size("bench", num_qubits, 0);
    for _ in 0..layers {
        for i in 0..num_qubits {
            circuit.h(QubitId(i)).unwrap();
        }
        for i in (0..num_qubits - 1).step_by(2) {
            circuit.cx(QubitId(i), QubitId(i + 1)).unwrap();
        }
    }
    circuit
}

/// Benchmark GHZ state circuit creation
fn bench_ghz_circuit(c: &mut Criterion) {
    let mut group = c.benchmark_group("ghz_circuit");

    for num_qubits in &[5, 20, 100] {
        group.bench_with_input(
            BenchmarkId::new("create", num_qubits),
            num_qubits,
            |b, &n| {
                b.iter(|| black_box(Circuit::ghz(n).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_topological_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological_order");

    for num_qubits in &[10, 50] {
        let circuit = layered(*num_qubits, 10);
        group.bench_with_input(
            BenchmarkId::new("ops", num_qubits),
            &circuit,
            |b, circuit| {
                b.iter(|| black_box(circuit.dag().topological_op_nodes()));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("depth", num_qubits),
            &circuit,
            |b, circuit| {
                b.iter(|| black_box(circuit.depth()));
            },
        );
    }

    group.finish();
}

/// Benchmark replacing every H by its Euler form.
fn bench_substitute(c: &mut Criterion) {
    let circuit = layered(20, 10);
    c.bench_function("substitute_all_h", |b| {
        b.iter(|| {
            let mut dag = circuit.dag().clone();
            for node in dag.op_nodes() {
                let Some(inst) = dag.get_instruction(node) else {
                    continue;
                };
                if inst.name() != "h" {
                    continue;
                }
                let q = inst.qubits[0];
                let half_pi = std::f64::consts::FRAC_PI_2;
                dag.substitute_node(
                    node,
                    vec![
                        Instruction::single_qubit_gate(StandardGate::Rz(half_pi.into()), q),
                        Instruction::single_qubit_gate(StandardGate::SX, q),
                        Instruction::single_qubit_gate(StandardGate::Rz(half_pi.into()), q),
                    ],
                )
                .unwrap();
            }
            black_box(dag)
        });
    });
}

criterion_group!(
    benches,
    bench_ghz_circuit,
    bench_topological_order,
    bench_substitute,
);

criterion_main!(benches);
