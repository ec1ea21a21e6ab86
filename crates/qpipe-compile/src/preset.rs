//! Preset pipelines and the `compile` entry point.
//!
//! [`generate_preset_pass_manager`] resolves one plugin per stage (the
//! user's method first, then the backend's hint, then `default`) and
//! assembles the stages into a [`StagedPassManager`]. [`compile`] validates
//! the options, runs that pipeline on a copy of the circuit and reports the
//! resulting layouts.
//!
//! # Example
//!
//! ```
//! use qpipe_compile::{CompileOptions, CouplingMap, compile};
//! use qpipe_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::with_size("far", 3, 0);
//! circuit.cx(QubitId(0), QubitId(2)).unwrap();
//!
//! let options = CompileOptions::new()
//!     .with_optimization_level(0)
//!     .with_coupling_map(CouplingMap::linear(3))
//!     .with_seed(11);
//! let compiled = compile(&circuit, &options).unwrap();
//!
//! assert_eq!(compiled.count_ops().get("swap"), Some(&1));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use qpipe_ir::{Circuit, CircuitDag, QubitId};

use crate::backend::{Backend, StageHints};
use crate::coupling::CouplingMap;
use crate::equivalence::EquivalenceLibrary;
use crate::error::{CompileError, CompileResult};
use crate::layout::{Layout, len_u32};
use crate::manager::{PassCallback, StagedPassManager};
use crate::passes::InstructionDurations;
use crate::plugin::{OptimizationLevel, PassManagerConfig, Stage, StagePluginRegistry};
use crate::property::PropertySet;
use crate::stages::DEFAULT_PLUGIN;
use crate::target::Target;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x5eed;

/// Options of a [`compile`] call.
#[derive(Clone, Default)]
pub struct CompileOptions {
    /// Optimization level, 0 to 3.
    pub optimization_level: u8,
    /// Device connectivity. Derived from the target when absent.
    pub coupling_map: Option<CouplingMap>,
    /// Target gate names, used when no target is given.
    pub basis_gates: Option<BTreeSet<String>>,
    /// Full device description.
    pub target: Option<Arc<Target>>,
    /// Backend supplying a target and stage hints.
    pub backend: Option<Backend>,
    /// Init stage plugin.
    pub init_method: Option<String>,
    /// Layout stage plugin.
    pub layout_method: Option<String>,
    /// Routing stage plugin.
    pub routing_method: Option<String>,
    /// Translation stage plugin.
    pub translation_method: Option<String>,
    /// Optimization stage plugin.
    pub optimization_method: Option<String>,
    /// Scheduling stage plugin.
    pub scheduling_method: Option<String>,
    /// Seed for every randomized pass. Must not be negative.
    pub seed: Option<i64>,
    /// Physical qubit of each circuit qubit.
    pub initial_layout: Option<Vec<u32>>,
    /// Durations taking precedence over the target's.
    pub instruction_durations: Option<InstructionDurations>,
    /// Rules for basis translation. The standard library when absent.
    pub equivalence_library: Option<Arc<EquivalenceLibrary>>,
    /// Plugin registry. The built-in one when absent.
    pub registry: Option<Arc<StagePluginRegistry>>,
    /// Called after every executed pass.
    pub callback: Option<Arc<PassCallback>>,
}

impl CompileOptions {
    /// Options for level 2 with no device constraints.
    pub fn new() -> Self {
        Self {
            optimization_level: OptimizationLevel::default().as_u8(),
            ..Self::default()
        }
    }

    /// Set the optimization level.
    #[must_use]
    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level;
        self
    }

    /// Set the coupling map, from a map or a list of pairs.
    #[must_use]
    pub fn with_coupling_map(mut self, coupling_map: impl Into<CouplingMap>) -> Self {
        self.coupling_map = Some(coupling_map.into());
        self
    }

    /// Set the target gate names.
    #[must_use]
    pub fn with_basis_gates<I, S>(mut self, basis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.basis_gates = Some(basis.into_iter().map(Into::into).collect());
        self
    }

    /// Set the device description.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<Arc<Target>>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Compile for a backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Pick the plugin of one stage.
    #[must_use]
    pub fn with_method(mut self, stage: Stage, method: impl Into<String>) -> Self {
        *method_slot(
            stage,
            [
                &mut self.init_method,
                &mut self.layout_method,
                &mut self.routing_method,
                &mut self.translation_method,
                &mut self.optimization_method,
                &mut self.scheduling_method,
            ],
        ) = Some(method.into());
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Place circuit qubit `i` on physical qubit `layout[i]`.
    #[must_use]
    pub fn with_initial_layout(mut self, layout: Vec<u32>) -> Self {
        self.initial_layout = Some(layout);
        self
    }

    /// Set the duration table.
    #[must_use]
    pub fn with_instruction_durations(mut self, durations: InstructionDurations) -> Self {
        self.instruction_durations = Some(durations);
        self
    }

    /// Use another equivalence library.
    #[must_use]
    pub fn with_equivalence_library(mut self, library: impl Into<Arc<EquivalenceLibrary>>) -> Self {
        self.equivalence_library = Some(library.into());
        self
    }

    /// Use another plugin registry.
    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<Arc<StagePluginRegistry>>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Observe every executed pass.
    #[must_use]
    pub fn with_callback(
        mut self,
        callback: impl Fn(&crate::manager::PassEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    fn method(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Init => self.init_method.as_deref(),
            Stage::Layout => self.layout_method.as_deref(),
            Stage::Routing => self.routing_method.as_deref(),
            Stage::Translation => self.translation_method.as_deref(),
            Stage::Optimization => self.optimization_method.as_deref(),
            Stage::Scheduling => self.scheduling_method.as_deref(),
        }
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("optimization_level", &self.optimization_level)
            .field("coupling_map", &self.coupling_map)
            .field("basis_gates", &self.basis_gates)
            .field("backend", &self.backend.as_ref().map(Backend::name))
            .field("layout_method", &self.layout_method)
            .field("routing_method", &self.routing_method)
            .field("seed", &self.seed)
            .field("initial_layout", &self.initial_layout)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

fn method_slot(stage: Stage, slots: [&mut Option<String>; 6]) -> &mut Option<String> {
    let [init, layout, routing, translation, optimization, scheduling] = slots;
    match stage {
        Stage::Init => init,
        Stage::Layout => layout,
        Stage::Routing => routing,
        Stage::Translation => translation,
        Stage::Optimization => optimization,
        Stage::Scheduling => scheduling,
    }
}

fn config_slot(config: &mut PassManagerConfig, stage: Stage) -> &mut Option<String> {
    method_slot(
        stage,
        [
            &mut config.init_method,
            &mut config.layout_method,
            &mut config.routing_method,
            &mut config.translation_method,
            &mut config.optimization_method,
            &mut config.scheduling_method,
        ],
    )
}

/// Where the circuit ended up on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileLayout {
    /// Placement chosen before routing. The identity over the circuit's
    /// qubits when no device connectivity was given.
    pub initial_layout: Layout,
    /// Permutation applied by routing, start position to end position.
    pub final_layout: Option<Layout>,
    /// Number of qubits of the input circuit.
    pub input_qubit_count: usize,
}

impl TranspileLayout {
    /// Physical qubit each input qubit starts on.
    pub fn initial_index_layout(&self) -> Vec<u32> {
        (0..len_u32(self.input_qubit_count))
            .map(|q| self.initial_layout.physical(QubitId(q)))
            .collect()
    }

    /// Physical qubit each input qubit is measured on at the end.
    pub fn final_index_layout(&self) -> Vec<u32> {
        self.initial_index_layout()
            .into_iter()
            .map(|p| match &self.final_layout {
                Some(permutation) => permutation.physical(QubitId(p)),
                None => p,
            })
            .collect()
    }
}

/// Result of [`compile`].
#[derive(Debug, Clone)]
pub struct CompiledCircuit {
    name: String,
    dag: CircuitDag,
    layout: TranspileLayout,
    properties: PropertySet,
}

impl CompiledCircuit {
    /// The compiled circuit.
    pub fn circuit(&self) -> Circuit {
        Circuit::from_dag(self.name.clone(), self.dag.clone())
    }

    /// The compiled operation graph.
    pub fn dag(&self) -> &CircuitDag {
        &self.dag
    }

    /// Take the compiled operation graph.
    pub fn into_dag(self) -> CircuitDag {
        self.dag
    }

    /// Initial and final layout.
    pub fn layout(&self) -> &TranspileLayout {
        &self.layout
    }

    /// Operation counts, nested blocks included.
    pub fn count_ops(&self) -> BTreeMap<String, usize> {
        self.dag.count_ops_recursive()
    }

    /// Everything the passes published.
    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }
}

/// Turn the caller's seed into the run seed.
pub fn resolve_seed(seed: Option<i64>) -> CompileResult<u64> {
    match seed {
        None => Ok(DEFAULT_SEED),
        Some(seed) => u64::try_from(seed).map_err(|_| {
            CompileError::Configuration(
                "Expected non-negative integer as seed for transpiler.".into(),
            )
        }),
    }
}

/// Plugins that cannot handle control flow.
fn check_control_flow_methods(config: &PassManagerConfig) -> CompileResult<()> {
    if !config.has_control_flow {
        return Ok(());
    }
    let rejected = [
        (Stage::Routing, "routing_method", &["basic"][..]),
        (Stage::Scheduling, "scheduling_method", &["alap", "asap"][..]),
    ];
    for (stage, option, methods) in rejected {
        if let Some(method) = config.method(stage).filter(|m| methods.contains(m)) {
            return Err(CompileError::Configuration(format!(
                "Got {option}={method}, but the circuit contains control flow."
            )));
        }
    }
    Ok(())
}

/// Assemble the staged pipeline for `level`.
///
/// Stages without a user method take the backend's hint, then
/// `default`. The resolved names are visible to every factory, so a
/// layout plugin knows whether a dedicated router follows.
pub fn generate_preset_pass_manager(
    level: OptimizationLevel,
    config: &PassManagerConfig,
    hints: Option<&StageHints>,
    registry: &StagePluginRegistry,
) -> CompileResult<StagedPassManager> {
    let mut resolved = config.clone();
    if let Some(hints) = hints {
        for stage in Stage::ALL {
            let slot = config_slot(&mut resolved, stage);
            if slot.is_none() {
                *slot = hints.plugin_for(stage).map(str::to_string);
            }
        }
    }
    check_control_flow_methods(&resolved)?;

    let mut staged = StagedPassManager::new();
    for stage in Stage::ALL {
        let name = resolved.method(stage).unwrap_or(DEFAULT_PLUGIN);
        let pm = registry.build(stage, name, &resolved, level)?;
        staged.set_stage(stage, pm);
    }
    Ok(staged)
}

fn check_initial_layout(layout: &[u32], num_qubits: usize, device: Option<u32>) -> CompileResult<()> {
    if layout.len() != num_qubits {
        return Err(CompileError::Configuration(format!(
            "Initial layout has {} entries but the circuit has {num_qubits} qubits",
            layout.len()
        )));
    }
    let mut seen = BTreeSet::new();
    for &p in layout {
        if device.is_some_and(|n| p >= n) {
            return Err(CompileError::Configuration(format!(
                "Initial layout uses physical qubit {p}, outside the device"
            )));
        }
        if !seen.insert(p) {
            return Err(CompileError::Configuration(format!(
                "Initial layout uses physical qubit {p} twice"
            )));
        }
    }
    Ok(())
}

/// Compile a circuit for a device.
///
/// All option checks run before the first pass, so a configuration error
/// never leaves a half-compiled result behind.
#[instrument(skip(circuit, options), fields(circuit = circuit.name()))]
pub fn compile(circuit: &Circuit, options: &CompileOptions) -> CompileResult<CompiledCircuit> {
    let level = OptimizationLevel::try_from(options.optimization_level)?;
    let seed = resolve_seed(options.seed)?;

    let target = options
        .target
        .clone()
        .or_else(|| options.backend.as_ref().map(|b| b.target().clone()));
    let coupling_map = options
        .coupling_map
        .clone()
        .or_else(|| target.as_ref().and_then(|t| t.coupling_map()))
        .map(Arc::new);
    let device_size = coupling_map
        .as_ref()
        .map(|c| c.num_qubits())
        .or_else(|| target.as_ref().map(|t| t.num_qubits()));

    let num_qubits = circuit.num_qubits();
    if let Some(available) = device_size {
        if num_qubits > available as usize {
            return Err(CompileError::LayoutInfeasible {
                required: num_qubits,
                available,
            });
        }
    }
    if let Some(layout) = &options.initial_layout {
        check_initial_layout(layout, num_qubits, device_size)?;
    }

    let mut dag = circuit.dag().clone();
    let mut config = PassManagerConfig::new(seed);
    config.coupling_map = coupling_map.clone();
    config.basis_gates = options.basis_gates.clone();
    config.target = target.clone();
    for stage in Stage::ALL {
        *config_slot(&mut config, stage) = options.method(stage).map(str::to_string);
    }
    config.initial_layout = options.initial_layout.clone();
    config.instruction_durations = options.instruction_durations.clone();
    if let Some(library) = &options.equivalence_library {
        config.equivalence_library = library.clone();
    }
    config.has_control_flow = dag.has_control_flow();

    let registry: &StagePluginRegistry = match options.registry.as_deref() {
        Some(registry) => registry,
        None => StagePluginRegistry::builtin(),
    };
    let hints = options.backend.as_ref().map(Backend::stage_hints);
    let pipeline = generate_preset_pass_manager(level, &config, hints, registry)?;

    info!(
        "Compiling '{}' at level {level} with seed {seed:#x} ({} passes)",
        circuit.name(),
        pipeline.pass_names().len()
    );

    let mut properties = PropertySet::new();
    properties.coupling_map = coupling_map;
    properties.target = target;
    pipeline.run(&mut dag, &mut properties, options.callback.as_deref())?;

    let initial_layout = match properties.layout() {
        Some(layout) => layout.clone(),
        None => Layout::trivial(len_u32(num_qubits)),
    };
    let layout = TranspileLayout {
        initial_layout,
        final_layout: properties.final_layout().cloned(),
        input_qubit_count: num_qubits,
    };
    debug!(
        "Compiled '{}': {} ops, depth {}, {} swaps",
        circuit.name(),
        dag.num_ops(),
        dag.depth(),
        properties.swap_count()
    );

    Ok(CompiledCircuit {
        name: circuit.name().to_string(),
        dag,
        layout,
        properties,
    })
}
