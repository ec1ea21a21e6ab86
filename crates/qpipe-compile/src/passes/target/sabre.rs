//! SABRE layout and swap routing.
//!
//! The router walks the circuit's dependency front. Operations whose
//! qubits are adjacent under the current layout execute immediately; when
//! the whole front is blocked a swap is chosen by a lookahead heuristic
//! that weighs the front against an extended set of upcoming two-qubit
//! operations, penalised by a per-qubit decay so the router does not keep
//! swapping the same qubits. Ties are broken with a seeded generator, and
//! independent trials run on the rayon pool.
//!
//! Control-flow operations are routed in place: each block is routed from
//! the layout current at that point and ends with the inverse of its own
//! swaps, so the layout after the operation is the layout before it.

use std::collections::{BTreeSet, VecDeque};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use qpipe_ir::{
    Block, CircuitDag, CircuitLevel, Instruction, QubitId, StandardGate, WireId, wires_of,
};

use crate::coupling::CouplingMap;
use crate::error::{CompileError, CompileResult};
use crate::layout::{Layout, len_u32};
use crate::pass::{Pass, PassKind};
use crate::plugin::OptimizationLevel;
use crate::property::{LayoutSource, Property, PropertySet};

/// Upcoming two-qubit operations considered by the lookahead.
const EXTENDED_SET_SIZE: usize = 20;
/// Weight of the extended set relative to the front.
const EXTENDED_SET_WEIGHT: f64 = 0.5;
/// Decay added to both qubits of a chosen swap.
const DECAY_RATE: f64 = 0.001;
/// Swaps between decay resets.
const DECAY_RESET_INTERVAL: usize = 5;
/// Swaps per device qubit without progress before the release valve.
const RELEASE_VALVE_FACTOR: usize = 10;

/// Trial counts and seed for the SABRE passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SabreConfig {
    /// Seed the per-trial seeds are drawn from.
    pub seed: u64,
    /// Routing trials.
    pub swap_trials: usize,
    /// Layout trials.
    pub layout_trials: usize,
    /// Forward and backward sweeps per layout trial.
    pub max_iterations: usize,
}

impl SabreConfig {
    /// Trial counts used by the preset pipeline at `level`.
    pub fn for_level(level: OptimizationLevel, seed: u64) -> Self {
        let (swap_trials, layout_trials, max_iterations) = match level {
            OptimizationLevel::O0 | OptimizationLevel::O1 => (5, 5, 2),
            OptimizationLevel::O2 => (10, 10, 2),
            OptimizationLevel::O3 => (20, 20, 4),
        };
        Self {
            seed,
            swap_trials,
            layout_trials,
            max_iterations,
        }
    }

    fn trial_seeds(&self, trials: usize) -> Vec<u64> {
        let mut rng = Pcg64Mcg::seed_from_u64(self.seed);
        (0..trials.max(1)).map(|_| rng.r#gen()).collect()
    }
}

/// Output of one routing run.
#[derive(Debug, Clone)]
struct Routed {
    /// Operations on physical qubits.
    ops: Vec<Instruction>,
    /// Swaps inserted, in order, as physical pairs.
    swaps: Vec<(u32, u32)>,
    /// Swaps inserted anywhere, nested blocks included.
    total_swaps: usize,
}

/// Dependency structure of an instruction list.
struct Dependencies {
    successors: Vec<Vec<usize>>,
    pred_count: Vec<usize>,
}

impl Dependencies {
    fn new(ops: &[Instruction]) -> Self {
        let mut last: FxHashMap<WireId, usize> = FxHashMap::default();
        let mut successors = vec![Vec::new(); ops.len()];
        let mut pred_count = vec![0; ops.len()];
        for (i, inst) in ops.iter().enumerate() {
            let mut preds: Vec<usize> = wires_of(inst)
                .into_iter()
                .filter_map(|wire| last.insert(wire, i))
                .collect();
            preds.sort_unstable();
            preds.dedup();
            pred_count[i] = preds.len();
            for p in preds {
                successors[p].push(i);
            }
        }
        Self {
            successors,
            pred_count,
        }
    }
}

fn swap_instruction(a: u32, b: u32) -> Instruction {
    Instruction::two_qubit_gate(StandardGate::Swap, QubitId(a), QubitId(b))
}

fn two_qubit_pair(inst: &Instruction) -> Option<(QubitId, QubitId)> {
    match inst.qubits.as_slice() {
        [a, b] if !inst.is_barrier() && !inst.is_control_flow() => Some((*a, *b)),
        _ => None,
    }
}

/// One routing run over a fixed coupling map.
struct Router<'a> {
    coupling_map: &'a CouplingMap,
    rng: Pcg64Mcg,
}

impl<'a> Router<'a> {
    fn new(coupling_map: &'a CouplingMap, seed: u64) -> Self {
        Self {
            coupling_map,
            rng: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    fn distance(&self, a: u32, b: u32) -> CompileResult<u32> {
        self.coupling_map
            .distance(a, b)
            .ok_or(CompileError::RoutingFailed {
                qubit1: a,
                qubit2: b,
            })
    }

    /// Route `ops`, written over the virtual qubits of `layout`, and leave
    /// `layout` at its final state.
    fn route(&mut self, ops: &[Instruction], layout: &mut Layout) -> CompileResult<Routed> {
        let deps = Dependencies::new(ops);
        let mut remaining = deps.pred_count.clone();
        let mut front: Vec<usize> = (0..ops.len()).filter(|&i| remaining[i] == 0).collect();
        let num_physical = layout.num_qubits() as usize;
        let mut decay = vec![1.0f64; num_physical];
        let mut out = Routed {
            ops: Vec::with_capacity(ops.len()),
            swaps: Vec::new(),
            total_swaps: 0,
        };
        let mut since_progress = 0usize;
        let mut since_reset = 0usize;

        loop {
            let mut progressed = true;
            while progressed {
                progressed = false;
                let mut blocked = Vec::with_capacity(front.len());
                let mut ready = Vec::new();
                for &i in &front {
                    if !self.executable(&ops[i], layout) {
                        blocked.push(i);
                        continue;
                    }
                    let emitted = self.execute(&ops[i], layout, &mut out)?;
                    out.ops.push(emitted);
                    progressed = true;
                    for &s in &deps.successors[i] {
                        remaining[s] -= 1;
                        if remaining[s] == 0 {
                            ready.push(s);
                        }
                    }
                }
                blocked.extend(ready);
                blocked.sort_unstable();
                front = blocked;
                if progressed {
                    since_progress = 0;
                    decay.fill(1.0);
                }
            }
            if front.is_empty() {
                break;
            }

            if since_progress > RELEASE_VALVE_FACTOR * num_physical {
                self.release_valve(ops, &front, layout, &mut out)?;
                since_progress = 0;
                decay.fill(1.0);
                continue;
            }

            let (a, b) = self.choose_swap(ops, &deps, &front, &remaining, layout, &decay)?;
            out.ops.push(swap_instruction(a, b));
            out.swaps.push((a, b));
            out.total_swaps += 1;
            layout.swap_physical(a, b);
            since_progress += 1;
            decay[a as usize] += DECAY_RATE;
            decay[b as usize] += DECAY_RATE;
            since_reset += 1;
            if since_reset >= DECAY_RESET_INTERVAL {
                since_reset = 0;
                decay.fill(1.0);
            }
        }
        Ok(out)
    }

    fn executable(&self, inst: &Instruction, layout: &Layout) -> bool {
        match two_qubit_pair(inst) {
            Some((a, b)) => self
                .coupling_map
                .is_connected(layout.physical(a), layout.physical(b)),
            None => true,
        }
    }

    fn execute(&mut self, inst: &Instruction, layout: &mut Layout, out: &mut Routed) -> CompileResult<Instruction> {
        if inst.is_control_flow() {
            return self.route_control_flow(inst, layout, out);
        }
        if inst.qubits.len() > 2 && !inst.is_barrier() {
            return Err(CompileError::PassFailed {
                name: "SabreSwap".into(),
                reason: format!(
                    "'{}' acts on {} qubits; decompose it before routing",
                    inst.name(),
                    inst.qubits.len()
                ),
            });
        }
        let mut mapped = inst.clone();
        for q in &mut mapped.qubits {
            *q = QubitId(layout.physical(*q));
        }
        Ok(mapped)
    }

    /// Route every block of a control-flow operation from the current
    /// layout and widen the operation to the qubits the blocks touch.
    fn route_control_flow(
        &mut self,
        inst: &Instruction,
        layout: &Layout,
        out: &mut Routed,
    ) -> CompileResult<Instruction> {
        let Some(cf) = inst.as_control_flow() else {
            return Ok(inst.clone());
        };
        let mut touched: BTreeSet<u32> = inst.qubits.iter().map(|&q| layout.physical(q)).collect();
        let mut routed_blocks = Vec::with_capacity(cf.blocks.len());
        for block in &cf.blocks {
            // Block qubits become the outer virtual qubits; clbits stay local.
            let lifted: Vec<Instruction> = block
                .instructions
                .iter()
                .map(|b| {
                    let mut b = b.clone();
                    for q in &mut b.qubits {
                        *q = inst.qubits.get(q.index()).copied().unwrap_or(*q);
                    }
                    b
                })
                .collect();
            let mut block_layout = layout.clone();
            let mut routed = self.route(&lifted, &mut block_layout)?;
            for &(a, b) in routed.swaps.iter().rev() {
                routed.ops.push(swap_instruction(a, b));
                block_layout.swap_physical(a, b);
            }
            out.total_swaps += routed.total_swaps + routed.swaps.len();
            for op in &routed.ops {
                touched.extend(op.qubits.iter().map(|q| q.0));
            }
            routed_blocks.push((routed.ops, block.num_clbits));
        }

        let local: FxHashMap<u32, u32> = touched
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, len_u32(i)))
            .collect();
        let width = len_u32(touched.len());
        let blocks = routed_blocks
            .into_iter()
            .map(|(ops, num_clbits)| Block {
                num_qubits: width,
                num_clbits,
                instructions: ops
                    .into_iter()
                    .map(|mut op| {
                        for q in &mut op.qubits {
                            *q = QubitId(local.get(&q.0).copied().unwrap_or(q.0));
                        }
                        op
                    })
                    .collect(),
            })
            .collect();
        Ok(Instruction::control_flow(
            cf.op.clone(),
            blocks,
            touched.into_iter().map(QubitId),
            inst.clbits.clone(),
        )?)
    }

    /// Two-qubit operations reachable from the front, nearest first.
    fn extended_set(
        &self,
        ops: &[Instruction],
        deps: &Dependencies,
        front: &[usize],
        remaining: &[usize],
    ) -> Vec<(QubitId, QubitId)> {
        let mut pending: FxHashMap<usize, usize> = FxHashMap::default();
        let mut queue: VecDeque<usize> = front.iter().copied().collect();
        let mut extended = Vec::new();
        while let Some(i) = queue.pop_front() {
            for &s in &deps.successors[i] {
                let left = pending.entry(s).or_insert(remaining[s]);
                *left -= 1;
                if *left > 0 {
                    continue;
                }
                if let Some(pair) = two_qubit_pair(&ops[s]) {
                    extended.push(pair);
                    if extended.len() >= EXTENDED_SET_SIZE {
                        return extended;
                    }
                }
                queue.push_back(s);
            }
        }
        extended
    }

    fn choose_swap(
        &mut self,
        ops: &[Instruction],
        deps: &Dependencies,
        front: &[usize],
        remaining: &[usize],
        layout: &Layout,
        decay: &[f64],
    ) -> CompileResult<(u32, u32)> {
        let front_pairs: Vec<(QubitId, QubitId)> =
            front.iter().filter_map(|&i| two_qubit_pair(&ops[i])).collect();
        let extended = self.extended_set(ops, deps, front, remaining);

        let mut candidates: BTreeSet<(u32, u32)> = BTreeSet::new();
        for &(a, b) in &front_pairs {
            for p in [layout.physical(a), layout.physical(b)] {
                for n in self.coupling_map.neighbors(p) {
                    candidates.insert((p.min(n), p.max(n)));
                }
            }
        }

        let cost = |pairs: &[(QubitId, QubitId)], swap: (u32, u32)| -> CompileResult<f64> {
            let moved = |p: u32| match p {
                p if p == swap.0 => swap.1,
                p if p == swap.1 => swap.0,
                p => p,
            };
            let mut total = 0.0;
            for &(a, b) in pairs {
                total += f64::from(self.distance(moved(layout.physical(a)), moved(layout.physical(b)))?);
            }
            Ok(total)
        };

        let mut best_score = f64::INFINITY;
        let mut ties: Vec<(u32, u32)> = Vec::new();
        for &swap in &candidates {
            let mut score = cost(&front_pairs, swap)? / front_pairs.len().max(1) as f64;
            if !extended.is_empty() {
                score += EXTENDED_SET_WEIGHT * cost(&extended, swap)? / extended.len() as f64;
            }
            score *= decay[swap.0 as usize].max(decay[swap.1 as usize]);
            if score < best_score - 1e-10 {
                best_score = score;
                ties.clear();
                ties.push(swap);
            } else if (score - best_score).abs() <= 1e-10 {
                ties.push(swap);
            }
        }
        let choice = ties.choose(&mut self.rng).copied().ok_or_else(|| {
            let (a, b) = front_pairs
                .first()
                .map_or((0, 0), |&(a, b)| (layout.physical(a), layout.physical(b)));
            CompileError::RoutingFailed { qubit1: a, qubit2: b }
        })?;
        trace!("Sabre chose swap {choice:?} with score {best_score}");
        Ok(choice)
    }

    /// Bring the closest blocked pair together along a shortest path.
    fn release_valve(
        &mut self,
        ops: &[Instruction],
        front: &[usize],
        layout: &mut Layout,
        out: &mut Routed,
    ) -> CompileResult<()> {
        let mut closest: Option<(u32, u32, u32)> = None;
        for &i in front {
            if let Some((a, b)) = two_qubit_pair(&ops[i]) {
                let (pa, pb) = (layout.physical(a), layout.physical(b));
                let d = self.distance(pa, pb)?;
                if closest.is_none_or(|(best, _, _)| d < best) {
                    closest = Some((d, pa, pb));
                }
            }
        }
        let Some((d, pa, pb)) = closest else {
            return Ok(());
        };
        warn!("Sabre release valve: routing ({pa}, {pb}) at distance {d} along a shortest path");
        let path = self
            .coupling_map
            .shortest_path(pa, pb)
            .ok_or(CompileError::RoutingFailed { qubit1: pa, qubit2: pb })?;
        for step in path.windows(2).take(path.len().saturating_sub(2)) {
            let (a, b) = (step[0], step[1]);
            out.ops.push(swap_instruction(a, b));
            out.swaps.push((a, b));
            out.total_swaps += 1;
            layout.swap_physical(a, b);
        }
        Ok(())
    }
}

/// Run `trials` routings from `initial` in parallel and keep the one with
/// the fewest swaps, the lowest trial index on ties.
fn best_routing(
    coupling_map: &CouplingMap,
    ops: &[Instruction],
    initial: &Layout,
    seeds: &[u64],
) -> CompileResult<(Routed, Layout)> {
    let results: Vec<(Routed, Layout)> = seeds
        .par_iter()
        .map(|&seed| {
            let mut layout = initial.clone();
            let routed = Router::new(coupling_map, seed).route(ops, &mut layout)?;
            Ok((routed, layout))
        })
        .collect::<CompileResult<_>>()?;
    results
        .into_iter()
        .enumerate()
        .min_by_key(|(i, (routed, _))| (routed.total_swaps, *i))
        .map(|(_, best)| best)
        .ok_or_else(|| CompileError::PassFailed {
            name: "SabreSwap".into(),
            reason: "no routing trial ran".into(),
        })
}

fn routed_dag(source: &CircuitDag, num_physical: u32, ops: Vec<Instruction>) -> CompileResult<CircuitDag> {
    let mut dag = CircuitDag::with_size(num_physical, len_u32(source.num_clbits()));
    dag.set_global_phase(source.global_phase());
    for op in ops {
        dag.apply(op)?;
    }
    dag.set_level(CircuitLevel::Physical);
    Ok(dag)
}

/// Inserts swaps so every two-qubit operation sits on a coupling edge.
///
/// Expects the circuit on physical qubits; records the routing
/// permutation as the final layout.
pub struct SabreSwap {
    config: SabreConfig,
}

impl SabreSwap {
    /// Create the pass.
    pub fn new(config: SabreConfig) -> Self {
        Self { config }
    }
}

impl Pass for SabreSwap {
    fn name(&self) -> &'static str {
        "SabreSwap"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .clone()
            .ok_or(CompileError::MissingCouplingMap)?;
        let num_physical = coupling_map.num_qubits();
        if dag.num_qubits() > num_physical as usize {
            return Err(CompileError::LayoutInfeasible {
                required: dag.num_qubits(),
                available: num_physical,
            });
        }

        let ops: Vec<Instruction> = dag.topological_ops().map(|(_, i)| i.clone()).collect();
        let seeds = self.config.trial_seeds(self.config.swap_trials);
        let (routed, permutation) =
            best_routing(&coupling_map, &ops, &Layout::trivial(num_physical), &seeds)?;
        debug!("SabreSwap inserted {} swaps", routed.total_swaps);

        *dag = routed_dag(dag, num_physical, routed.ops)?;
        let final_layout = match properties.final_layout() {
            Some(previous) => previous.compose(&permutation)?,
            None => permutation,
        };
        properties.insert(Property::FinalLayout(final_layout));
        properties.insert(Property::SwapCount(properties.swap_count() + routed.total_swaps));
        properties.insert(Property::IsSwapMapped(true));
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.coupling_map.is_some()
    }
}

/// Chooses a layout by repeated forward and backward routing and, unless
/// built with [`SabreLayout::layout_only`], routes the circuit with it.
pub struct SabreLayout {
    config: SabreConfig,
    route: bool,
}

impl SabreLayout {
    /// Choose a layout and route.
    pub fn new(config: SabreConfig) -> Self {
        Self {
            config,
            route: true,
        }
    }

    /// Choose a layout and leave routing to a later pass.
    pub fn layout_only(config: SabreConfig) -> Self {
        Self {
            config,
            route: false,
        }
    }

    fn random_layout(seed: u64, num_physical: u32, num_logical: u32) -> CompileResult<Layout> {
        let mut v2p: Vec<u32> = (0..num_physical).collect();
        v2p.shuffle(&mut Pcg64Mcg::seed_from_u64(seed));
        Layout::with_circuit_qubits(v2p, num_logical)
    }

    fn trial(
        &self,
        coupling_map: &CouplingMap,
        forward: &[Instruction],
        backward: &[Instruction],
        seed: u64,
        num_logical: u32,
    ) -> CompileResult<(Layout, Routed, Layout)> {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let mut layout = Self::random_layout(rng.r#gen(), coupling_map.num_qubits(), num_logical)?;
        for _ in 0..self.config.max_iterations {
            Router::new(coupling_map, rng.r#gen()).route(forward, &mut layout)?;
            Router::new(coupling_map, rng.r#gen()).route(backward, &mut layout)?;
        }
        let initial = layout.clone();
        let routed = Router::new(coupling_map, rng.r#gen()).route(forward, &mut layout)?;
        Ok((initial, routed, layout))
    }
}

impl Pass for SabreLayout {
    fn name(&self) -> &'static str {
        "SabreLayout"
    }

    fn kind(&self) -> PassKind {
        if self.route {
            PassKind::Transformation
        } else {
            PassKind::Analysis
        }
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .clone()
            .ok_or(CompileError::MissingCouplingMap)?;
        let num_physical = coupling_map.num_qubits();
        let num_logical = dag.num_qubits();
        if num_logical > num_physical as usize {
            return Err(CompileError::LayoutInfeasible {
                required: num_logical,
                available: num_physical,
            });
        }
        if !coupling_map.is_graph_connected() {
            return Err(CompileError::LayoutInfeasibleReason(
                "SabreLayout needs a connected coupling map".into(),
            ));
        }

        let forward: Vec<Instruction> = dag.topological_ops().map(|(_, i)| i.clone()).collect();
        let backward: Vec<Instruction> = forward.iter().rev().cloned().collect();
        let seeds = self.config.trial_seeds(self.config.layout_trials);
        let trials: Vec<(Layout, Routed, Layout)> = seeds
            .par_iter()
            .map(|&seed| self.trial(&coupling_map, &forward, &backward, seed, len_u32(num_logical)))
            .collect::<CompileResult<_>>()?;
        let (initial, routed, end) = trials
            .into_iter()
            .enumerate()
            .min_by_key(|(i, (_, routed, _))| (routed.total_swaps, *i))
            .map(|(_, best)| best)
            .ok_or_else(|| CompileError::PassFailed {
                name: "SabreLayout".into(),
                reason: "no layout trial ran".into(),
            })?;
        debug!(
            "SabreLayout picked a layout needing {} swaps",
            routed.total_swaps
        );

        if self.route {
            let permutation = initial.inverse().compose(&end)?;
            *dag = routed_dag(dag, num_physical, routed.ops)?;
            properties.insert(Property::FinalLayout(permutation));
            properties.insert(Property::SwapCount(properties.swap_count() + routed.total_swaps));
            properties.insert(Property::IsSwapMapped(true));
        }
        properties.set_layout(initial, LayoutSource::Sabre);
        Ok(())
    }

    fn should_run(&self, dag: &CircuitDag, properties: &PropertySet) -> bool {
        dag.level() == CircuitLevel::Logical && properties.coupling_map.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_flow::walk_operations;
    use qpipe_ir::{Circuit, ClassicalCondition, ClbitId};

    fn config(seed: u64) -> SabreConfig {
        SabreConfig::for_level(OptimizationLevel::O1, seed)
    }

    fn assert_mapped(dag: &CircuitDag, cm: &CouplingMap) {
        walk_operations(dag, |inst, qubits, _| {
            if two_qubit_pair(inst).is_some() {
                assert!(cm.is_connected(qubits[0], qubits[1]), "{} on {qubits:?}", inst.name());
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_sabre_swap_single_swap_on_line() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.cx(QubitId(0), QubitId(2)).unwrap();
        let mut dag = circuit.into_dag();
        dag.set_level(CircuitLevel::Physical);

        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(3));
        SabreSwap::new(config(1)).run(&mut dag, &mut props).unwrap();

        assert_eq!(dag.count_ops().get("swap"), Some(&1));
        assert_eq!(props.swap_count(), 1);
        assert!(props.final_layout().unwrap().is_bijection());
        assert_mapped(&dag, props.coupling_map.as_ref().unwrap());
    }

    #[test]
    fn test_sabre_swap_leaves_mapped_circuit_alone() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.cx(QubitId(1), QubitId(2)).unwrap();
        let mut dag = circuit.into_dag();

        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(3));
        SabreSwap::new(config(1)).run(&mut dag, &mut props).unwrap();
        assert_eq!(props.swap_count(), 0);
        assert_eq!(props.final_layout(), Some(&Layout::trivial(3)));
    }

    #[test]
    fn test_sabre_swap_is_deterministic() {
        let run = || {
            let mut circuit = Circuit::with_size("test", 5, 0);
            for (a, b) in [(0, 4), (1, 3), (2, 4), (0, 2), (3, 0)] {
                circuit.cx(QubitId(a), QubitId(b)).unwrap();
            }
            let mut dag = circuit.into_dag();
            let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(5));
            SabreSwap::new(config(42)).run(&mut dag, &mut props).unwrap();
            dag.topological_ops().map(|(_, i)| i.clone()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_sabre_layout_routes_and_records_layouts() {
        let mut circuit = Circuit::with_size("test", 4, 0);
        for (a, b) in [(0, 1), (0, 2), (0, 3), (1, 2), (2, 3)] {
            circuit.cx(QubitId(a), QubitId(b)).unwrap();
        }
        let mut dag = circuit.into_dag();
        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(6));
        SabreLayout::new(config(5)).run(&mut dag, &mut props).unwrap();

        assert_eq!(dag.level(), CircuitLevel::Physical);
        assert_eq!(dag.num_qubits(), 6);
        assert_eq!(props.layout_source(), Some(LayoutSource::Sabre));
        assert!(props.layout().unwrap().is_bijection());
        assert_eq!(props.layout().unwrap().num_circuit_qubits(), 4);
        assert!(props.final_layout().unwrap().is_bijection());
        assert_eq!(dag.count_ops().get("swap").copied().unwrap_or(0), props.swap_count());
        assert_mapped(&dag, props.coupling_map.as_ref().unwrap());
    }

    #[test]
    fn test_sabre_layout_only_keeps_logical_dag() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.cx(QubitId(0), QubitId(2)).unwrap();
        let mut dag = circuit.into_dag();
        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(3));
        SabreLayout::layout_only(config(5)).run(&mut dag, &mut props).unwrap();

        assert_eq!(dag.level(), CircuitLevel::Logical);
        assert!(props.layout().is_some());
        assert!(props.final_layout().is_none());
    }

    #[test]
    fn test_sabre_routes_inside_blocks_and_restores_layout() {
        let mut body = Circuit::with_size("body", 2, 1);
        body.cx(QubitId(0), QubitId(1)).unwrap();

        let mut circuit = Circuit::with_size("test", 3, 1);
        circuit.measure(QubitId(1), ClbitId(0)).unwrap();
        circuit
            .if_else(
                ClassicalCondition::new(ClbitId(0), true),
                &body,
                None,
                &[QubitId(0), QubitId(2)],
                &[ClbitId(0)],
            )
            .unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        let mut dag = circuit.into_dag();
        dag.set_level(CircuitLevel::Physical);

        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(3));
        SabreSwap::new(config(3)).run(&mut dag, &mut props).unwrap();

        let (_, if_else) = dag
            .topological_ops()
            .find(|(_, i)| i.is_control_flow())
            .unwrap();
        // The block swapped through the middle qubit and back.
        assert_eq!(if_else.qubits.len(), 3);
        let block = &if_else.as_control_flow().unwrap().blocks[0];
        let swaps = block.instructions.iter().filter(|i| i.name() == "swap").count();
        assert_eq!(swaps, 2);
        assert_eq!(props.final_layout(), Some(&Layout::trivial(3)));
        assert_mapped(&dag, props.coupling_map.as_ref().unwrap());
    }

    #[test]
    fn test_three_qubit_gate_is_rejected() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        let mut dag = circuit.into_dag();
        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(3));
        let err = SabreSwap::new(config(1)).run(&mut dag, &mut props).unwrap_err();
        assert!(matches!(err, CompileError::PassFailed { .. }));
    }
}
