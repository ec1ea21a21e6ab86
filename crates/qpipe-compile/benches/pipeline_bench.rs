//! Benchmarks for the preset pipeline
//!
//! Run with: cargo bench -p qpipe-compile

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qpipe_compile::{Backend, CompileOptions, CouplingMap, compile};
use qpipe_ir::{Circuit, QubitId};

/// Long-range interactions that force layout search and routing.
fn scrambled(num_qubits: u32, layers: u32) -> Circuit {
    let mut circuit = Circuit::with_size("bench", num_qubits, 0);
    for layer in 0..layers {
        for i in 0..num_qubits {
            circuit.h(QubitId(i)).unwrap();
        }
        for i in 0..num_qubits / 2 {
            let a = (i * 3 + layer) % num_qubits;
            let b = (i * 7 + layer + 1) % num_qubits;
            if a != b {
                circuit.cx(QubitId(a), QubitId(b)).unwrap();
            }
        }
    }
    circuit
}

fn bench_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_levels");
    let circuit = scrambled(9, 8);
    let backend = Backend::heron("bench", 3, 3).unwrap();

    for level in 0..=3u8 {
        let options = CompileOptions::new()
            .with_optimization_level(level)
            .with_backend(backend.clone())
            .with_seed(7);
        group.bench_with_input(BenchmarkId::new("heron_3x3", level), &options, |b, options| {
            b.iter(|| black_box(compile(&circuit, options).unwrap()));
        });
    }

    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");
    group.sample_size(20);

    for num_qubits in &[8, 16, 32] {
        let circuit = scrambled(*num_qubits, 10);
        for router in ["sabre", "basic"] {
            let options = CompileOptions::new()
                .with_optimization_level(1)
                .with_coupling_map(CouplingMap::linear(*num_qubits))
                .with_method(qpipe_compile::Stage::Routing, router)
                .with_seed(7);
            group.bench_with_input(
                BenchmarkId::new(router, num_qubits),
                &options,
                |b, options| {
                    b.iter(|| black_box(compile(&circuit, options).unwrap()));
                },
            );
        }
    }

    group.finish();
}

fn bench_qft_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("qft_translation");

    for num_qubits in &[5, 10, 20] {
        let circuit = Circuit::qft(*num_qubits).unwrap();
        let options = CompileOptions::new()
            .with_optimization_level(2)
            .with_basis_gates(["rz", "sx", "x", "cx"]);
        group.bench_with_input(
            BenchmarkId::new("rz_sx_x_cx", num_qubits),
            &options,
            |b, options| {
                b.iter(|| black_box(compile(&circuit, options).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_levels, bench_routing, bench_qft_translation);
criterion_main!(benches);
