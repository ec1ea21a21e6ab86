//! Built-in stage plugins.
//!
//! Each factory turns a [`PassManagerConfig`] and an optimization level into
//! the passes of one stage. The `default` layout and routing plugins
//! together implement the adaptive search: the identity placement is kept
//! when it already fits the device, an exact VF2 match is tried next, and
//! SABRE lays out and routes the circuit when neither works. A routed SABRE
//! result may then be relabelled onto better qubits by VF2PostLayout.

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

use crate::error::CompileResult;
use crate::manager::PassManager;
use crate::pass::{Conditional, Pass};
use crate::plugin::{OptimizationLevel, PassManagerConfig, Stage, StagePluginRegistry};
use crate::property::{LayoutSource, PropertySet, Vf2StopReason};
use crate::passes::{
    ApplyLayout, BasicSwap, BasisTranslator, CheckMap, DenseLayout, DurationSource, GatesInBasis,
    InverseCancellation, Layout2qDistance, MergeAdjacentBarriers, MergeRotations, PadDelay,
    RemoveDiagonalGatesBeforeMeasure, RemoveResetInZeroState, RequireSwapMapped, SabreConfig,
    SabreLayout, SabreSwap, ScheduleAnalysis, SchedulePolicy, SetLayout, TrivialLayout,
    Unroll3qOrMore, VF2Layout, VF2PostLayout, Vf2Limits,
};

/// Name every stage falls back to.
pub const DEFAULT_PLUGIN: &str = "default";

/// Seed fed to VF2Layout.
const SEED_VF2_LAYOUT: usize = 0;
/// Seed fed to SabreLayout.
const SEED_SABRE_LAYOUT: usize = 1;
/// Seed fed to SabreSwap.
const SEED_SABRE_SWAP: usize = 2;
/// Seed fed to VF2PostLayout.
const SEED_VF2_POST: usize = 3;

/// Upper bound on optimization-loop rounds.
const MAX_OPTIMIZATION_ROUNDS: usize = 10;

pub(crate) fn register_builtins(registry: &mut StagePluginRegistry) {
    registry.register(Stage::Init, DEFAULT_PLUGIN, init_default);

    registry.register(Stage::Layout, DEFAULT_PLUGIN, layout_default);
    registry.register(Stage::Layout, "trivial", layout_trivial);
    registry.register(Stage::Layout, "dense", layout_dense);
    registry.register(Stage::Layout, "sabre", layout_sabre);

    registry.register(Stage::Routing, DEFAULT_PLUGIN, routing_default);
    registry.register(Stage::Routing, "sabre", routing_sabre);
    registry.register(Stage::Routing, "basic", routing_basic);
    registry.register(Stage::Routing, "none", routing_none);

    registry.register(Stage::Translation, DEFAULT_PLUGIN, translation_default);
    registry.register(Stage::Translation, "translator", translation_default);

    registry.register(Stage::Optimization, DEFAULT_PLUGIN, optimization_default);

    registry.register(Stage::Scheduling, DEFAULT_PLUGIN, |_, _| Ok(PassManager::new()));
    registry.register(Stage::Scheduling, "asap", |config, _| {
        scheduling(config, SchedulePolicy::Asap)
    });
    registry.register(Stage::Scheduling, "alap", |config, _| {
        scheduling(config, SchedulePolicy::Alap)
    });
}

/// The `index`-th seed drawn from the run seed.
///
/// Every randomized pass gets its own stream, so adding or removing one
/// pass does not shift the choices of another.
pub fn sub_seed(seed: u64, index: usize) -> u64 {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut value = 0;
    for _ in 0..=index {
        value = rng.r#gen();
    }
    value
}

fn vf2_limits(level: OptimizationLevel, seed: u64) -> Vf2Limits {
    let (call_limit, max_trials) = match level {
        OptimizationLevel::O0 | OptimizationLevel::O1 => (50_000, 2_500),
        OptimizationLevel::O2 => (5_000_000, 25_000),
        OptimizationLevel::O3 => (30_000_000, 250_000),
    };
    Vf2Limits {
        seed: Some(seed),
        call_limit: Some(call_limit),
        max_trials: Some(max_trials),
    }
}

/// A method the user named, as opposed to the level default.
fn is_explicit(method: Option<&str>) -> bool {
    method.is_some_and(|m| m != DEFAULT_PLUGIN)
}

/// Gate names the init stage decomposes into.
fn unroll_basis(config: &PassManagerConfig) -> Option<BTreeSet<String>> {
    match &config.target {
        Some(target) => Some(target.operation_names()),
        None => config.basis_gates.clone(),
    }
}

fn init_default(config: &PassManagerConfig, level: OptimizationLevel) -> CompileResult<PassManager> {
    let mut pm = PassManager::new();
    if config.has_basis() || config.has_coupling() {
        pm.add_pass(Unroll3qOrMore::new(
            config.equivalence_library.clone(),
            unroll_basis(config),
        ));
    }
    if level >= OptimizationLevel::O1 {
        pm.add_pass(RemoveResetInZeroState);
        pm.add_pass(InverseCancellation::new());
    }
    Ok(pm)
}

/// Passes placing the circuit where the user asked, if they asked.
fn user_layout(config: &PassManagerConfig) -> Option<PassManager> {
    let initial = config.initial_layout.as_ref()?;
    let mut pm = PassManager::new();
    pm.add_pass(SetLayout::new(initial.clone()));
    pm.add_pass(ApplyLayout);
    Some(pm)
}

fn layout_default(config: &PassManagerConfig, level: OptimizationLevel) -> CompileResult<PassManager> {
    if let Some(pm) = user_layout(config) {
        return Ok(pm);
    }
    let mut pm = PassManager::new();
    if !config.has_coupling() {
        return Ok(pm);
    }
    pm.add_pass(TrivialLayout);
    if level == OptimizationLevel::O0 {
        pm.add_pass(ApplyLayout);
        return Ok(pm);
    }

    let sabre = SabreConfig::for_level(level, sub_seed(config.seed, SEED_SABRE_LAYOUT));
    // A named router runs on its own, so SABRE only proposes the placement.
    let sabre_layout = if is_explicit(config.routing_method.as_deref()) {
        SabreLayout::layout_only(sabre)
    } else {
        SabreLayout::new(sabre)
    };

    pm.add_pass(Layout2qDistance);
    pm.add_pass(Conditional::new(
        VF2Layout::new(vf2_limits(level, sub_seed(config.seed, SEED_VF2_LAYOUT))),
        |_, props| props.layout_distance().is_some_and(|d| d > 0),
    ));
    pm.add_pass(Conditional::new(sabre_layout, |_, props| {
        props.layout_distance().is_some_and(|d| d > 0)
            && props.vf2_stop() != Some(Vf2StopReason::SolutionFound)
    }));
    pm.add_pass(ApplyLayout);
    Ok(pm)
}

fn layout_trivial(config: &PassManagerConfig, _: OptimizationLevel) -> CompileResult<PassManager> {
    Ok(user_layout(config).unwrap_or_else(|| single_layout(config, TrivialLayout)))
}

fn layout_dense(config: &PassManagerConfig, _: OptimizationLevel) -> CompileResult<PassManager> {
    Ok(user_layout(config).unwrap_or_else(|| single_layout(config, DenseLayout)))
}

fn layout_sabre(config: &PassManagerConfig, level: OptimizationLevel) -> CompileResult<PassManager> {
    if let Some(pm) = user_layout(config) {
        return Ok(pm);
    }
    let sabre = SabreConfig::for_level(level, sub_seed(config.seed, SEED_SABRE_LAYOUT));
    let routes_itself = matches!(config.routing_method.as_deref(), None | Some("sabre" | "default"));
    Ok(if routes_itself {
        single_layout(config, SabreLayout::new(sabre))
    } else {
        single_layout(config, SabreLayout::layout_only(sabre))
    })
}

fn single_layout(config: &PassManagerConfig, pass: impl Pass + 'static) -> PassManager {
    let mut pm = PassManager::new();
    if config.has_coupling() {
        pm.add_pass(pass);
        pm.add_pass(ApplyLayout);
    }
    pm
}

fn unmapped(props: &PropertySet) -> bool {
    props.is_swap_mapped() == Some(false)
}

fn routing_default(config: &PassManagerConfig, level: OptimizationLevel) -> CompileResult<PassManager> {
    let mut pm = routing_sabre(config, level)?;
    let adaptive = !is_explicit(config.layout_method.as_deref())
        && !is_explicit(config.routing_method.as_deref())
        && config.initial_layout.is_none();
    if config.has_coupling() && adaptive && level >= OptimizationLevel::O1 {
        pm.add_pass(Conditional::new(
            VF2PostLayout::new(vf2_limits(level, sub_seed(config.seed, SEED_VF2_POST))),
            |_, props| props.layout_source() == Some(LayoutSource::Sabre),
        ));
    }
    Ok(pm)
}

fn routing_sabre(config: &PassManagerConfig, level: OptimizationLevel) -> CompileResult<PassManager> {
    let mut pm = PassManager::new();
    if config.has_coupling() {
        let sabre = SabreConfig::for_level(level, sub_seed(config.seed, SEED_SABRE_SWAP));
        pm.add_pass(CheckMap);
        pm.add_pass(Conditional::new(SabreSwap::new(sabre), |_, props| unmapped(props)));
    }
    Ok(pm)
}

fn routing_basic(config: &PassManagerConfig, _: OptimizationLevel) -> CompileResult<PassManager> {
    let mut pm = PassManager::new();
    if config.has_coupling() {
        pm.add_pass(CheckMap);
        pm.add_pass(Conditional::new(BasicSwap, |_, props| unmapped(props)));
    }
    Ok(pm)
}

fn routing_none(config: &PassManagerConfig, _: OptimizationLevel) -> CompileResult<PassManager> {
    let mut pm = PassManager::new();
    if config.has_coupling() {
        pm.add_pass(CheckMap);
        pm.add_pass(RequireSwapMapped);
    }
    Ok(pm)
}

fn translation_default(config: &PassManagerConfig, _: OptimizationLevel) -> CompileResult<PassManager> {
    let mut pm = PassManager::new();
    if !config.has_basis() {
        return Ok(pm);
    }
    let mut translator =
        BasisTranslator::new(config.equivalence_library.clone(), config.basis_gates.clone());
    if let Some(target) = &config.target {
        translator = translator.with_target(target.clone());
    }
    pm.add_pass(translator);
    pm.add_pass(GatesInBasis::new(config.basis_gates.clone(), config.target.clone()));
    Ok(pm)
}

fn optimization_default(_: &PassManagerConfig, level: OptimizationLevel) -> CompileResult<PassManager> {
    let mut pm = PassManager::new();
    if level == OptimizationLevel::O0 {
        return Ok(pm);
    }
    let mut passes: Vec<Box<dyn Pass>> = vec![
        Box::new(InverseCancellation::new()),
        Box::new(MergeAdjacentBarriers::new()),
    ];
    if level >= OptimizationLevel::O2 {
        passes.push(Box::new(MergeRotations::new()));
    }
    if level == OptimizationLevel::O3 {
        passes.push(Box::new(RemoveDiagonalGatesBeforeMeasure));
    }
    pm.add_do_while(passes, MAX_OPTIMIZATION_ROUNDS);
    Ok(pm)
}

fn scheduling(config: &PassManagerConfig, policy: SchedulePolicy) -> CompileResult<PassManager> {
    let durations = DurationSource::new(config.instruction_durations.clone(), config.target.clone());
    let mut pm = PassManager::new();
    pm.add_pass(ScheduleAnalysis::new(policy, durations.clone()));
    pm.add_pass(PadDelay::new(durations));
    Ok(pm)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::coupling::CouplingMap;

    fn config_with_line(n: u32) -> PassManagerConfig {
        let mut config = PassManagerConfig::new(7);
        config.coupling_map = Some(Arc::new(CouplingMap::linear(n)));
        config.basis_gates = Some(["cx", "rz", "sx", "x"].iter().map(|s| s.to_string()).collect());
        config
    }

    fn build(stage: Stage, name: &str, config: &PassManagerConfig, level: OptimizationLevel) -> Vec<String> {
        StagePluginRegistry::builtin()
            .build(stage, name, config, level)
            .unwrap()
            .pass_names()
    }

    #[test]
    fn test_sub_seeds_are_stable_and_distinct() {
        assert_eq!(sub_seed(42, 2), sub_seed(42, 2));
        assert_ne!(sub_seed(42, 0), sub_seed(42, 1));
        assert_ne!(sub_seed(42, 0), sub_seed(43, 0));
    }

    #[test]
    fn test_default_layout_levels() {
        let config = config_with_line(3);
        assert_eq!(
            build(Stage::Layout, "default", &config, OptimizationLevel::O0),
            ["TrivialLayout", "ApplyLayout"]
        );
        assert_eq!(
            build(Stage::Layout, "default", &config, OptimizationLevel::O2),
            ["TrivialLayout", "Layout2qDistance", "VF2Layout", "SabreLayout", "ApplyLayout"]
        );
    }

    #[test]
    fn test_initial_layout_bypasses_search() {
        let mut config = config_with_line(3);
        config.initial_layout = Some(vec![2, 0]);
        assert_eq!(
            build(Stage::Layout, "default", &config, OptimizationLevel::O3),
            ["SetLayout", "ApplyLayout"]
        );
        assert!(!build(Stage::Routing, "default", &config, OptimizationLevel::O3)
            .contains(&"VF2PostLayout".to_string()));
    }

    #[test]
    fn test_no_coupling_map_means_no_layout_or_routing() {
        let config = PassManagerConfig::new(0);
        assert!(build(Stage::Layout, "default", &config, OptimizationLevel::O3).is_empty());
        assert!(build(Stage::Routing, "default", &config, OptimizationLevel::O3).is_empty());
        assert!(build(Stage::Translation, "default", &config, OptimizationLevel::O3).is_empty());
    }

    #[test]
    fn test_routing_plugins() {
        let config = config_with_line(3);
        assert_eq!(
            build(Stage::Routing, "default", &config, OptimizationLevel::O1),
            ["CheckMap", "SabreSwap", "VF2PostLayout"]
        );
        assert_eq!(
            build(Stage::Routing, "default", &config, OptimizationLevel::O0),
            ["CheckMap", "SabreSwap"]
        );
        assert_eq!(
            build(Stage::Routing, "basic", &config, OptimizationLevel::O1),
            ["CheckMap", "BasicSwap"]
        );
        assert_eq!(
            build(Stage::Routing, "none", &config, OptimizationLevel::O1),
            ["CheckMap", "RequireSwapMapped"]
        );
    }

    #[test]
    fn test_optimization_grows_with_level() {
        let config = config_with_line(3);
        assert!(build(Stage::Optimization, "default", &config, OptimizationLevel::O0).is_empty());
        let o1 = build(Stage::Optimization, "default", &config, OptimizationLevel::O1);
        let o3 = build(Stage::Optimization, "default", &config, OptimizationLevel::O3);
        assert!(o1.contains(&"InverseCancellation".to_string()));
        assert!(!o1.contains(&"MergeRotations".to_string()));
        assert!(o3.contains(&"MergeRotations".to_string()));
        assert!(o3.contains(&"RemoveDiagonalGatesBeforeMeasure".to_string()));
    }

    #[test]
    fn test_scheduling_plugins() {
        let config = config_with_line(3);
        assert!(build(Stage::Scheduling, "default", &config, OptimizationLevel::O1).is_empty());
        assert_eq!(
            build(Stage::Scheduling, "alap", &config, OptimizationLevel::O1),
            ["ALAPScheduleAnalysis", "PadDelay"]
        );
    }
}
