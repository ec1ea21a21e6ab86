//! Stage plugins.
//!
//! Every stage of the preset pipeline is built by a named factory looked
//! up in a [`StagePluginRegistry`]. The built-in registry is process-wide
//! and read-only; callers wanting extra plugins start from
//! [`StagePluginRegistry::with_builtins`] and [`register`] their own.
//!
//! [`register`]: StagePluginRegistry::register

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coupling::CouplingMap;
use crate::equivalence::EquivalenceLibrary;
use crate::error::{CompileError, CompileResult};
use crate::manager::PassManager;
use crate::passes::InstructionDurations;
use crate::stages;
use crate::target::Target;

/// A stage of the preset pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Cleanup and multi-qubit decomposition before layout.
    Init,
    /// Virtual to physical placement.
    Layout,
    /// Swap insertion.
    Routing,
    /// Rewrite into the target basis.
    Translation,
    /// Basis- and connectivity-preserving cleanup.
    Optimization,
    /// Timing analysis and idle padding.
    Scheduling,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Init,
        Stage::Layout,
        Stage::Routing,
        Stage::Translation,
        Stage::Optimization,
        Stage::Scheduling,
    ];

    /// Lower-case stage name.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Layout => "layout",
            Stage::Routing => "routing",
            Stage::Translation => "translation",
            Stage::Optimization => "optimization",
            Stage::Scheduling => "scheduling",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optimization effort, 0 (none) to 3 (heaviest).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum OptimizationLevel {
    /// Layout, routing and translation only.
    O0,
    /// Light optimization.
    O1,
    /// Medium optimization.
    #[default]
    O2,
    /// Heavy optimization.
    O3,
}

impl OptimizationLevel {
    /// Numeric level.
    pub fn as_u8(self) -> u8 {
        match self {
            OptimizationLevel::O0 => 0,
            OptimizationLevel::O1 => 1,
            OptimizationLevel::O2 => 2,
            OptimizationLevel::O3 => 3,
        }
    }
}

impl TryFrom<u8> for OptimizationLevel {
    type Error = CompileError;

    fn try_from(level: u8) -> CompileResult<Self> {
        match level {
            0 => Ok(OptimizationLevel::O0),
            1 => Ok(OptimizationLevel::O1),
            2 => Ok(OptimizationLevel::O2),
            3 => Ok(OptimizationLevel::O3),
            other => Err(CompileError::Configuration(format!(
                "Invalid optimization level {other}, expected 0, 1, 2 or 3"
            ))),
        }
    }
}

impl From<OptimizationLevel> for u8 {
    fn from(level: OptimizationLevel) -> u8 {
        level.as_u8()
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Everything a stage factory may consult.
#[derive(Debug, Clone)]
pub struct PassManagerConfig {
    /// Device connectivity, `None` for all-to-all.
    pub coupling_map: Option<Arc<CouplingMap>>,
    /// Target gate names when no [`Target`] is given.
    pub basis_gates: Option<BTreeSet<String>>,
    /// Full device description.
    pub target: Option<Arc<Target>>,
    /// Resolved seed for every randomized pass.
    pub seed: u64,
    /// Method requested for the init stage.
    pub init_method: Option<String>,
    /// Method requested for the layout stage.
    pub layout_method: Option<String>,
    /// Method requested for the routing stage.
    pub routing_method: Option<String>,
    /// Method requested for the translation stage.
    pub translation_method: Option<String>,
    /// Method requested for the optimization stage.
    pub optimization_method: Option<String>,
    /// Method requested for the scheduling stage.
    pub scheduling_method: Option<String>,
    /// User placement, virtual qubit `i` on physical `initial_layout[i]`.
    pub initial_layout: Option<Vec<u32>>,
    /// Duration table overriding the target's durations.
    pub instruction_durations: Option<InstructionDurations>,
    /// Rules used by the translator.
    pub equivalence_library: Arc<EquivalenceLibrary>,
    /// Whether the input circuit contains control flow.
    pub has_control_flow: bool,
}

impl PassManagerConfig {
    /// A configuration with no device constraints.
    pub fn new(seed: u64) -> Self {
        Self {
            coupling_map: None,
            basis_gates: None,
            target: None,
            seed,
            init_method: None,
            layout_method: None,
            routing_method: None,
            translation_method: None,
            optimization_method: None,
            scheduling_method: None,
            initial_layout: None,
            instruction_durations: None,
            equivalence_library: Arc::new(EquivalenceLibrary::standard()),
            has_control_flow: false,
        }
    }

    /// Method the user asked for at `stage`.
    pub fn method(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Init => self.init_method.as_deref(),
            Stage::Layout => self.layout_method.as_deref(),
            Stage::Routing => self.routing_method.as_deref(),
            Stage::Translation => self.translation_method.as_deref(),
            Stage::Optimization => self.optimization_method.as_deref(),
            Stage::Scheduling => self.scheduling_method.as_deref(),
        }
    }

    /// Whether the device restricts which qubit pairs may interact.
    pub fn has_coupling(&self) -> bool {
        self.coupling_map.is_some()
    }

    /// Whether the translator has anything to translate to.
    pub fn has_basis(&self) -> bool {
        self.target.is_some() || self.basis_gates.is_some()
    }
}

/// Builds the pass manager of one stage.
pub type PluginFactory =
    dyn Fn(&PassManagerConfig, OptimizationLevel) -> CompileResult<PassManager> + Send + Sync;

static BUILTIN: LazyLock<StagePluginRegistry> = LazyLock::new(StagePluginRegistry::with_builtins);

/// Maps `(stage, name)` to a stage factory.
#[derive(Clone, Default)]
pub struct StagePluginRegistry {
    factories: BTreeMap<(Stage, String), Arc<PluginFactory>>,
}

impl StagePluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared registry of built-in plugins.
    pub fn builtin() -> &'static StagePluginRegistry {
        &BUILTIN
    }

    /// A fresh registry preloaded with the built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        stages::register_builtins(&mut registry);
        registry
    }

    /// Register a factory, replacing any previous one under the same name.
    pub fn register(
        &mut self,
        stage: Stage,
        name: impl Into<String>,
        factory: impl Fn(&PassManagerConfig, OptimizationLevel) -> CompileResult<PassManager>
        + Send
        + Sync
        + 'static,
    ) {
        let name = name.into();
        debug!("Registering {stage} plugin: {name}");
        self.factories.insert((stage, name), Arc::new(factory));
    }

    /// Check whether a plugin exists.
    pub fn contains(&self, stage: Stage, name: &str) -> bool {
        self.factories.contains_key(&(stage, name.to_string()))
    }

    /// Plugin names of a stage, sorted.
    pub fn names(&self, stage: Stage) -> Vec<&str> {
        self.factories
            .keys()
            .filter(|(s, _)| *s == stage)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Build a stage from the named plugin.
    pub fn build(
        &self,
        stage: Stage,
        name: &str,
        config: &PassManagerConfig,
        level: OptimizationLevel,
    ) -> CompileResult<PassManager> {
        let factory = self
            .factories
            .get(&(stage, name.to_string()))
            .ok_or_else(|| {
                CompileError::Configuration(format!(
                    "Unknown {stage} plugin '{name}'. Available: {}",
                    self.names(stage).join(", ")
                ))
            })?;
        debug!("Building {stage} stage with plugin '{name}' at level {level}");
        factory(config, level)
    }
}

impl fmt::Debug for StagePluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_names() {
        let names: Vec<String> = Stage::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            ["init", "layout", "routing", "translation", "optimization", "scheduling"]
        );
    }

    #[test]
    fn test_optimization_level_bounds() {
        assert_eq!(OptimizationLevel::try_from(3).unwrap(), OptimizationLevel::O3);
        assert!(matches!(
            OptimizationLevel::try_from(4),
            Err(CompileError::Configuration(_))
        ));
    }

    #[test]
    fn test_builtin_plugins_registered() {
        let registry = StagePluginRegistry::builtin();
        assert_eq!(registry.names(Stage::Layout), ["default", "dense", "sabre", "trivial"]);
        assert_eq!(registry.names(Stage::Routing), ["basic", "default", "none", "sabre"]);
        assert_eq!(registry.names(Stage::Scheduling), ["alap", "asap", "default"]);
        assert!(registry.contains(Stage::Translation, "translator"));
    }

    #[test]
    fn test_unknown_plugin_is_configuration_error() {
        let config = PassManagerConfig::new(1);
        let err = StagePluginRegistry::builtin()
            .build(Stage::Routing, "lookahead", &config, OptimizationLevel::O1)
            .unwrap_err();
        assert!(err.to_string().contains("lookahead"));
    }

    #[test]
    fn test_register_custom_plugin() {
        let mut registry = StagePluginRegistry::with_builtins();
        registry.register(Stage::Optimization, "nothing", |_, _| Ok(PassManager::new()));
        let pm = registry
            .build(
                Stage::Optimization,
                "nothing",
                &PassManagerConfig::new(0),
                OptimizationLevel::O3,
            )
            .unwrap();
        assert!(pm.is_empty());
        assert!(!StagePluginRegistry::builtin().contains(Stage::Optimization, "nothing"));
    }
}
