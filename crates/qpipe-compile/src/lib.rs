//! qpipe Compilation Pipeline
//!
//! This crate turns an abstract circuit into one that runs on a device:
//! every gate is in the device's native set, every two-qubit gate acts on
//! coupled qubits, and the placement of circuit qubits on physical qubits is
//! reported back.
//!
//! # Overview
//!
//! Compilation is a fixed sequence of six stages. Each stage is a
//! [`PassManager`] built by a named plugin:
//!
//! 1. **Init**: unroll gates on three or more qubits, drop resets on fresh qubits
//! 2. **Layout**: map circuit qubits to physical qubits
//! 3. **Routing**: insert SWAP gates to satisfy connectivity constraints
//! 4. **Translation**: rewrite gates into the native set via an equivalence library
//! 5. **Optimization**: cancel and merge gates without leaving the native set
//! 6. **Scheduling**: assign start times and pad idle qubits with delays
//!
//! # Architecture
//!
//! ```text
//! Circuit ──► CompileOptions ──► generate_preset_pass_manager
//!                                        │
//!                                        ▼
//!                               ┌──────────────────┐
//!                               │ StagedPassManager │ ◄── PropertySet
//!                               └──────────────────┘     (layout, final layout,
//!                                        │                 coupling map, target)
//!            init ─ layout ─ routing ─ translation ─ optimization ─ scheduling
//!                                        │
//!                                        ▼
//!                                 CompiledCircuit
//! ```
//!
//! # Example: Compiling for a Device
//!
//! ```rust
//! use qpipe_compile::{CompileOptions, CouplingMap, compile};
//! use qpipe_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::with_size("demo", 3, 0);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cz(QubitId(0), QubitId(2)).unwrap();
//!
//! let options = CompileOptions::new()
//!     .with_optimization_level(1)
//!     .with_coupling_map(CouplingMap::linear(3))
//!     .with_basis_gates(["rz", "sx", "x", "cx"])
//!     .with_seed(3);
//! let compiled = compile(&circuit, &options).unwrap();
//!
//! let ops = compiled.count_ops();
//! assert!(ops.keys().all(|name| ["rz", "sx", "x", "cx"].contains(&name.as_str())));
//! ```
//!
//! # Optimization Levels
//!
//! | Level | Layout | Optimization |
//! |-------|--------|--------------|
//! | 0 | Trivial placement | None |
//! | 1 | Trivial, then VF2, then SABRE | Inverse cancellation, barrier merging |
//! | 2 | As level 1 with more VF2 budget | + rotation merging |
//! | 3 | As level 2 with the largest budget | + diagonal removal before measurement |
//!
//! # Stage Plugins
//!
//! Plugins are looked up in a [`StagePluginRegistry`] by stage and name.
//! The built-in registry provides `trivial`, `dense` and `sabre` layouts,
//! `sabre`, `basic` and `none` routers, the `translator`, and `asap`/`alap`
//! scheduling. Custom plugins are registered next to them:
//!
//! ```rust
//! use qpipe_compile::{PassManager, Stage, StagePluginRegistry};
//! use qpipe_compile::passes::TrivialLayout;
//!
//! let mut registry = StagePluginRegistry::with_builtins();
//! registry.register(Stage::Layout, "identity", |_, _| {
//!     let mut pm = PassManager::new();
//!     pm.add_pass(TrivialLayout);
//!     Ok(pm)
//! });
//! assert!(registry.contains(Stage::Layout, "identity"));
//! ```
//!
//! # Custom Passes
//!
//! Implement the [`Pass`] trait to create custom compilation passes:
//!
//! ```rust
//! use qpipe_compile::{CompileResult, Pass, PassKind, PropertySet};
//! use qpipe_ir::CircuitDag;
//!
//! struct CountOps;
//!
//! impl Pass for CountOps {
//!     fn name(&self) -> &'static str { "CountOps" }
//!     fn kind(&self) -> PassKind { PassKind::Analysis }
//!
//!     fn run(&self, dag: &mut CircuitDag, _props: &mut PropertySet) -> CompileResult<()> {
//!         tracing::debug!("{} ops", dag.num_ops());
//!         Ok(())
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod control_flow;
pub mod coupling;
pub mod equivalence;
pub mod error;
pub mod layout;
pub mod manager;
pub mod pass;
pub mod plugin;
pub mod preset;
pub mod property;
pub mod stages;
pub mod target;

// Built-in passes
pub mod passes;

pub use backend::{Backend, StageHints};
pub use config::{CompileConfig, ConfigError, TargetConfig};
pub use coupling::CouplingMap;
pub use equivalence::{EquivalenceLibrary, EquivalenceRule, Signature};
pub use error::{CompileError, CompileResult};
pub use layout::Layout;
pub use manager::{PassCallback, PassEvent, PassManager, StagedPassManager};
pub use pass::{Conditional, Pass, PassKind};
pub use plugin::{OptimizationLevel, PassManagerConfig, Stage, StagePluginRegistry};
pub use preset::{
    CompileOptions, CompiledCircuit, DEFAULT_SEED, TranspileLayout, compile,
    generate_preset_pass_manager,
};
pub use property::{LayoutSource, Property, PropertyKey, PropertySet};
pub use target::{InstructionProperties, OperationEntry, Target};
