//! Device descriptions handed to the compiler.
//!
//! A [`Backend`] bundles a [`Target`] with optional per-stage plugin hints.
//! Hints sit between the user's explicit method choice and the level
//! default when the pipeline resolves a stage plugin.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coupling::CouplingMap;
use crate::error::CompileResult;
use crate::plugin::Stage;
use crate::target::{OperationEntry, Target};

/// Operations every preset device supports besides its gates.
const NON_GATE_OPERATIONS: [&str; 4] = ["measure", "reset", "barrier", "delay"];

/// Control-flow constructs of devices with dynamic circuits.
const DYNAMIC_OPERATIONS: [&str; 3] = ["if_else", "while_loop", "for_loop"];

/// Preferred plugin per stage. `None` means no preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageHints {
    /// Init stage plugin.
    pub init: Option<String>,
    /// Layout stage plugin.
    pub layout: Option<String>,
    /// Routing stage plugin.
    pub routing: Option<String>,
    /// Translation stage plugin.
    pub translation: Option<String>,
    /// Optimization stage plugin.
    pub optimization: Option<String>,
    /// Scheduling stage plugin.
    pub scheduling: Option<String>,
}

impl StageHints {
    /// Plugin preferred for `stage`.
    pub fn plugin_for(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Init => self.init.as_deref(),
            Stage::Layout => self.layout.as_deref(),
            Stage::Routing => self.routing.as_deref(),
            Stage::Translation => self.translation.as_deref(),
            Stage::Optimization => self.optimization.as_deref(),
            Stage::Scheduling => self.scheduling.as_deref(),
        }
    }

    /// Set the preferred plugin of one stage.
    #[must_use]
    pub fn with(mut self, stage: Stage, plugin: impl Into<String>) -> Self {
        let slot = match stage {
            Stage::Init => &mut self.init,
            Stage::Layout => &mut self.layout,
            Stage::Routing => &mut self.routing,
            Stage::Translation => &mut self.translation,
            Stage::Optimization => &mut self.optimization,
            Stage::Scheduling => &mut self.scheduling,
        };
        *slot = Some(plugin.into());
        self
    }
}

/// A compilation target with a name and stage preferences.
#[derive(Debug, Clone)]
pub struct Backend {
    name: String,
    target: Arc<Target>,
    stage_hints: StageHints,
}

impl Backend {
    /// Create a backend without stage preferences.
    pub fn new(name: impl Into<String>, target: impl Into<Arc<Target>>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            stage_hints: StageHints::default(),
        }
    }

    /// Attach stage preferences.
    #[must_use]
    pub fn with_stage_hints(mut self, hints: StageHints) -> Self {
        self.stage_hints = hints;
        self
    }

    /// Backend name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device description.
    pub fn target(&self) -> &Arc<Target> {
        &self.target
    }

    /// Stage preferences.
    pub fn stage_hints(&self) -> &StageHints {
        &self.stage_hints
    }

    /// Plugin this backend prefers for `stage`.
    pub fn stage_plugin_for(&self, stage: Stage) -> Option<&str> {
        self.stage_hints.plugin_for(stage)
    }

    /// Connectivity derived from the target.
    pub fn coupling_map(&self) -> Option<CouplingMap> {
        self.target.coupling_map()
    }

    /// All-to-all simulator with a universal gate set.
    pub fn simulator(num_qubits: u32) -> CompileResult<Self> {
        let mut basis = vec![
            "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "sx", "rx", "ry", "rz", "p", "u",
        ];
        basis.extend(NON_GATE_OPERATIONS);
        basis.extend(DYNAMIC_OPERATIONS);
        let mut target =
            Target::from_basis_and_coupling(&basis, &CouplingMap::with_num_qubits(num_qubits, &[]))?;
        for (name, width) in [("cx", 2), ("cz", 2), ("swap", 2), ("ccx", 3)] {
            target.add_instruction(OperationEntry::global(name, width, 0))?;
        }
        Ok(Self::new(format!("simulator-{num_qubits}"), target))
    }

    /// IQM-style star device: `prx` and `cz` around a central qubit.
    pub fn iqm(name: impl Into<String>, num_qubits: u32) -> CompileResult<Self> {
        Self::from_parts(name, &["prx", "cz"], &CouplingMap::star(num_qubits), false)
    }

    /// Heron-style grid device: `rz`, `sx`, `x` and `cz` with dynamic circuits.
    pub fn heron(name: impl Into<String>, rows: u32, cols: u32) -> CompileResult<Self> {
        Self::from_parts(name, &["rz", "sx", "x", "cz"], &CouplingMap::grid(rows, cols), true)
    }

    /// Eagle-style line device: `rz`, `sx`, `x` and `ecr`.
    pub fn eagle(name: impl Into<String>, num_qubits: u32) -> CompileResult<Self> {
        Self::from_parts(name, &["rz", "sx", "x", "ecr"], &CouplingMap::linear(num_qubits), true)
    }

    fn from_parts(
        name: impl Into<String>,
        gates: &[&str],
        coupling: &CouplingMap,
        dynamic: bool,
    ) -> CompileResult<Self> {
        let mut basis: Vec<&str> = gates.to_vec();
        basis.extend(NON_GATE_OPERATIONS);
        if dynamic {
            basis.extend(DYNAMIC_OPERATIONS);
        }
        let target = Target::from_basis_and_coupling(&basis, coupling)?;
        Ok(Self::new(name, target))
    }

    /// Names of the preset backends, sorted.
    pub fn preset_names() -> &'static [&'static str] {
        &["eagle-7", "heron-3x3", "iqm-5", "simulator-8"]
    }

    /// Look up a preset backend by name.
    pub fn preset(name: &str) -> CompileResult<Option<Self>> {
        let backend = match name {
            "eagle-7" => Self::eagle(name, 7)?,
            "heron-3x3" => Self::heron(name, 3, 3)?,
            "iqm-5" => Self::iqm(name, 5)?,
            "simulator-8" => Self::simulator(8)?,
            _ => return Ok(None),
        };
        Ok(Some(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_hints_default_to_no_preference() {
        let hints = StageHints::default();
        assert!(Stage::ALL.iter().all(|&s| hints.plugin_for(s).is_none()));

        let hints = hints.with(Stage::Scheduling, "alap");
        assert_eq!(hints.plugin_for(Stage::Scheduling), Some("alap"));
        assert_eq!(hints.plugin_for(Stage::Routing), None);
    }

    #[test]
    fn test_presets_resolve() {
        for name in Backend::preset_names() {
            let backend = Backend::preset(name).unwrap().unwrap();
            assert_eq!(backend.name(), *name);
        }
        assert!(Backend::preset("nope").unwrap().is_none());
    }

    #[test]
    fn test_iqm_topology_and_basis() {
        let backend = Backend::iqm("iqm", 5).unwrap();
        let coupling = backend.coupling_map().unwrap();
        assert_eq!(coupling.num_qubits(), 5);
        assert!(coupling.is_connected(0, 3));
        assert!(!coupling.is_connected(1, 2));
        assert!(backend.target().supported("prx", &[4]));
        assert!(!backend.target().contains("if_else"));
    }

    #[test]
    fn test_simulator_has_no_coupling_restriction() {
        let backend = Backend::simulator(4).unwrap();
        assert!(backend.coupling_map().is_none());
        assert!(backend.target().supported("cx", &[0, 3]));
    }
}
