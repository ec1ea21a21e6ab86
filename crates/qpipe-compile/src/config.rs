//! File-based compilation settings.
//!
//! A [`CompileConfig`] is read from YAML and can be adjusted through
//! environment variables with the `QPIPE_` prefix. Precedence, highest
//! first:
//!
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values
//!
//! ```yaml
//! optimization_level: 3
//! seed: 42
//! routing_method: sabre
//! target:
//!   coupling_map: [[0, 1], [1, 2]]
//!   basis_gates: [rz, sx, x, cx, measure]
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::backend::Backend;
use crate::coupling::CouplingMap;
use crate::error::CompileError;
use crate::passes::InstructionDurations;
use crate::plugin::Stage;
use crate::preset::CompileOptions;
use crate::target::{OperationEntry, Target};

/// Compilation settings as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Optimization level, 0 to 3.
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u8,

    /// Seed for randomized passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    /// Init stage plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_method: Option<String>,

    /// Layout stage plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_method: Option<String>,

    /// Routing stage plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_method: Option<String>,

    /// Translation stage plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_method: Option<String>,

    /// Optimization stage plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization_method: Option<String>,

    /// Scheduling stage plugin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_method: Option<String>,

    /// Physical qubit of each circuit qubit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_layout: Option<Vec<u32>>,

    /// Durations used by scheduling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_durations: Option<InstructionDurations>,

    /// Device description.
    #[serde(default)]
    pub target: TargetConfig,
}

/// Device section of a [`CompileConfig`].
///
/// `backend` names a preset device and excludes the other fields. Without
/// it, `coupling_map` and `basis_gates` describe the device, and
/// `instructions` add or replace operations with calibration data, which
/// turns the description into a full [`Target`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Preset backend name, e.g. `heron-3x3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Number of physical qubits. Defaults to what the edges imply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_qubits: Option<u32>,

    /// Directed coupling edges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coupling_map: Vec<(u32, u32)>,

    /// Native operation names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub basis_gates: Vec<String>,

    /// Operations with explicit qubit tuples, errors or durations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<OperationEntry>,
}

fn default_optimization_level() -> u8 {
    2
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            optimization_level: default_optimization_level(),
            seed: None,
            init_method: None,
            layout_method: None,
            routing_method: None,
            translation_method: None,
            optimization_method: None,
            scheduling_method: None,
            initial_layout: None,
            instruction_durations: None,
            target: TargetConfig::default(),
        }
    }
}

impl CompileConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize to YAML.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml_ng::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `QPIPE_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable source.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("QPIPE_OPTIMIZATION_LEVEL") {
            self.optimization_level = v.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("QPIPE_OPTIMIZATION_LEVEL is not a level: {v}"))
            })?;
        }
        if let Some(v) = lookup("QPIPE_SEED") {
            self.seed = Some(
                v.trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid(format!("QPIPE_SEED is not an integer: {v}")))?,
            );
        }
        let methods = [
            ("QPIPE_LAYOUT_METHOD", &mut self.layout_method),
            ("QPIPE_ROUTING_METHOD", &mut self.routing_method),
            ("QPIPE_TRANSLATION_METHOD", &mut self.translation_method),
            ("QPIPE_SCHEDULING_METHOD", &mut self.scheduling_method),
        ];
        for (key, slot) in methods {
            if let Some(v) = lookup(key) {
                debug!("{key} overrides the configured method");
                *slot = Some(v);
            }
        }
        Ok(())
    }

    /// Check values that need no device information.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.optimization_level > 3 {
            return Err(ConfigError::Invalid(format!(
                "optimization_level must be 0 to 3, got {}",
                self.optimization_level
            )));
        }
        if self.target.backend.is_some()
            && (!self.target.coupling_map.is_empty()
                || !self.target.basis_gates.is_empty()
                || !self.target.instructions.is_empty())
        {
            return Err(ConfigError::Invalid(
                "target.backend cannot be combined with coupling_map, basis_gates or instructions"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Build the options of a [`compile`](crate::compile) call.
    pub fn to_options(&self) -> Result<CompileOptions, ConfigError> {
        self.validate()?;
        let mut options = CompileOptions::new().with_optimization_level(self.optimization_level);
        options.seed = self.seed;
        options.initial_layout = self.initial_layout.clone();
        options.instruction_durations = self.instruction_durations.clone();

        let methods = [
            (Stage::Init, &self.init_method),
            (Stage::Layout, &self.layout_method),
            (Stage::Routing, &self.routing_method),
            (Stage::Translation, &self.translation_method),
            (Stage::Optimization, &self.optimization_method),
            (Stage::Scheduling, &self.scheduling_method),
        ];
        for (stage, method) in methods {
            if let Some(method) = method {
                options = options.with_method(stage, method.clone());
            }
        }

        let device = &self.target;
        if let Some(name) = &device.backend {
            let backend = Backend::preset(name)?.ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "Unknown backend '{name}'. Available: {}",
                    Backend::preset_names().join(", ")
                ))
            })?;
            return Ok(options.with_backend(backend));
        }

        let coupling = device.coupling();
        if device.instructions.is_empty() {
            if let Some(coupling) = coupling {
                options = options.with_coupling_map(coupling);
            }
            if !device.basis_gates.is_empty() {
                options = options.with_basis_gates(device.basis_gates.iter().cloned());
            }
        } else {
            options = options.with_target(device.to_target()?);
        }
        Ok(options)
    }
}

impl TargetConfig {
    /// Coupling map, when the section names any qubits.
    pub fn coupling(&self) -> Option<CouplingMap> {
        if self.coupling_map.is_empty() && self.num_qubits.is_none() {
            return None;
        }
        Some(CouplingMap::with_num_qubits(
            self.num_qubits.unwrap_or(0),
            &self.coupling_map,
        ))
    }

    /// Build a full target: the basis on the coupling map, then every
    /// explicit instruction on top.
    pub fn to_target(&self) -> Result<Target, ConfigError> {
        let extent = self
            .instructions
            .iter()
            .filter_map(|entry| entry.qargs.as_ref())
            .flat_map(|qargs| qargs.keys().flatten())
            .map(|&q| q + 1)
            .max()
            .unwrap_or(0);
        let coupling = self
            .coupling()
            .unwrap_or_else(|| CouplingMap::with_num_qubits(extent, &[]));
        let coupling = CouplingMap::with_num_qubits(
            coupling.num_qubits().max(extent),
            coupling.edges(),
        );

        let named: BTreeSet<&str> = self.instructions.iter().map(|e| e.name.as_str()).collect();
        let basis: Vec<&str> = self
            .basis_gates
            .iter()
            .map(String::as_str)
            .filter(|name| !named.contains(name))
            .collect();
        let mut target = Target::from_basis_and_coupling(&basis, &coupling)?;
        for entry in &self.instructions {
            target.add_instruction(entry.clone())?;
        }
        Ok(target)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(String),

    /// The YAML is malformed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<CompileError> for ConfigError {
    fn from(err: CompileError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}
