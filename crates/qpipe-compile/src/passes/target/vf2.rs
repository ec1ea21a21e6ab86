//! Exact placement by subgraph monomorphism.
//!
//! The circuit's interaction graph (one node per qubit, one edge per pair
//! of qubits sharing a two-qubit operation) is matched into the coupling
//! graph. Every match is a layout that needs no swaps; matches are ranked
//! by the error they would accumulate on the device.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg64Mcg;
use tracing::{debug, trace, warn};

use qpipe_ir::{CircuitDag, CircuitLevel, QubitId};

use crate::control_flow::walk_operations;
use crate::coupling::CouplingMap;
use crate::error::{CompileError, CompileResult};
use crate::layout::{Layout, len_u32};
use crate::pass::{Pass, PassKind};
use crate::property::{LayoutSource, Property, PropertySet, Vf2PostStopReason, Vf2StopReason};
use crate::target::ErrorMap;

/// Qubit usage of a circuit, nested blocks included.
#[derive(Debug, Default)]
pub(crate) struct Interactions {
    /// Single-qubit operation count per qubit.
    pub ones: Vec<usize>,
    /// Two-qubit operation count per `(low, high)` pair.
    pub edges: BTreeMap<(u32, u32), usize>,
}

impl Interactions {
    /// Collect usage, or `None` when some operation acts on three or more
    /// qubits.
    pub fn collect(dag: &CircuitDag) -> CompileResult<Option<Self>> {
        let mut out = Self {
            ones: vec![0; dag.num_qubits()],
            edges: BTreeMap::new(),
        };
        let mut wide = false;
        walk_operations(dag, |inst, qubits, _| {
            if inst.is_barrier() || inst.is_control_flow() {
                return Ok(());
            }
            match qubits {
                [q] => {
                    if let Some(slot) = out.ones.get_mut(*q as usize) {
                        *slot += 1;
                    }
                }
                [a, b] => *out.edges.entry(((*a).min(*b), (*a).max(*b))).or_default() += 1,
                [] => {}
                _ => wide = true,
            }
            Ok(())
        })?;
        Ok((!wide).then_some(out))
    }

    /// Adjacency lists of the interaction graph.
    fn adjacency(&self) -> Vec<Vec<u32>> {
        let mut adj = vec![Vec::new(); self.ones.len()];
        for &(a, b) in self.edges.keys() {
            adj[a as usize].push(b);
            adj[b as usize].push(a);
        }
        adj
    }

    /// `1 - Π(1 - e)` over every operation placed by `map`.
    pub fn score(&self, errors: &ErrorMap, map: impl Fn(u32) -> u32) -> f64 {
        let pow = |x: f64, n: usize| x.powi(i32::try_from(n).unwrap_or(i32::MAX));
        let mut fidelity = 1.0;
        for (q, &count) in self.ones.iter().enumerate() {
            if count > 0 {
                fidelity *= pow(1.0 - errors.qubit_error(map(len_u32(q))), count);
            }
        }
        for (&(a, b), &count) in &self.edges {
            fidelity *= pow(1.0 - errors.edge_error(map(a), map(b)), count);
        }
        1.0 - fidelity
    }
}

/// How a monomorphism search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchEnd {
    Exhausted,
    CallLimit,
    Stopped,
}

/// Backtracking subgraph-monomorphism search.
struct Matcher<'a> {
    pattern: Vec<Vec<u32>>,
    order: Vec<u32>,
    coupling_map: &'a CouplingMap,
    /// Physical qubits in the order they are tried.
    candidates: Vec<u32>,
    rank: Vec<usize>,
    call_limit: Option<usize>,
    calls: usize,
}

impl<'a> Matcher<'a> {
    fn new(
        pattern: Vec<Vec<u32>>,
        coupling_map: &'a CouplingMap,
        seed: Option<u64>,
        call_limit: Option<usize>,
    ) -> Self {
        let mut candidates: Vec<u32> = (0..coupling_map.num_qubits()).collect();
        if let Some(seed) = seed {
            candidates.shuffle(&mut Pcg64Mcg::seed_from_u64(seed));
        }
        let mut rank = vec![0; candidates.len()];
        for (i, &p) in candidates.iter().enumerate() {
            rank[p as usize] = i;
        }
        let order = Self::matching_order(&pattern);
        Self {
            pattern,
            order,
            coupling_map,
            candidates,
            rank,
            call_limit,
            calls: 0,
        }
    }

    /// Breadth-first from the busiest unvisited node, so every node after
    /// the first of its component already has a mapped neighbour.
    fn matching_order(pattern: &[Vec<u32>]) -> Vec<u32> {
        let mut seen = vec![false; pattern.len()];
        let mut order = Vec::new();
        let mut roots: Vec<usize> = (0..pattern.len()).filter(|&v| !pattern[v].is_empty()).collect();
        roots.sort_by(|&a, &b| pattern[b].len().cmp(&pattern[a].len()).then(a.cmp(&b)));
        for root in roots {
            if seen[root] {
                continue;
            }
            seen[root] = true;
            let mut head = order.len();
            order.push(len_u32(root));
            while head < order.len() {
                let v = order[head] as usize;
                head += 1;
                let mut next: Vec<u32> = pattern[v].iter().copied().filter(|&u| !seen[u as usize]).collect();
                next.sort_by(|&a, &b| {
                    pattern[b as usize].len().cmp(&pattern[a as usize].len()).then(a.cmp(&b))
                });
                for u in next {
                    seen[u as usize] = true;
                    order.push(u);
                }
            }
        }
        order
    }

    /// Enumerate matches; `on_match` returns `false` to stop early.
    fn run(&mut self, on_match: &mut dyn FnMut(&[Option<u32>]) -> bool) -> SearchEnd {
        let mut mapping = vec![None; self.pattern.len()];
        let mut used = vec![false; self.coupling_map.num_qubits() as usize];
        self.extend(0, &mut mapping, &mut used, on_match)
    }

    fn extend(
        &mut self,
        depth: usize,
        mapping: &mut [Option<u32>],
        used: &mut [bool],
        on_match: &mut dyn FnMut(&[Option<u32>]) -> bool,
    ) -> SearchEnd {
        self.calls += 1;
        if self.call_limit.is_some_and(|limit| self.calls > limit) {
            return SearchEnd::CallLimit;
        }
        let Some(&v) = self.order.get(depth) else {
            return if on_match(mapping) {
                SearchEnd::Exhausted
            } else {
                SearchEnd::Stopped
            };
        };
        let v = v as usize;
        let anchor = self.pattern[v].iter().find_map(|&u| mapping[u as usize]);
        let options: Vec<u32> = match anchor {
            Some(p) => {
                let mut near: Vec<u32> = self.coupling_map.neighbors(p).collect();
                near.sort_by_key(|&q| self.rank[q as usize]);
                near
            }
            None => self.candidates.clone(),
        };
        for p in options {
            if used[p as usize] || self.coupling_map.degree(p) < self.pattern[v].len() {
                continue;
            }
            let consistent = self.pattern[v].iter().all(|&u| {
                mapping[u as usize].is_none_or(|q| self.coupling_map.is_connected(q, p))
            });
            if !consistent {
                continue;
            }
            mapping[v] = Some(p);
            used[p as usize] = true;
            let end = self.extend(depth + 1, mapping, used, on_match);
            mapping[v] = None;
            used[p as usize] = false;
            if end != SearchEnd::Exhausted {
                return end;
            }
        }
        SearchEnd::Exhausted
    }
}

/// Place the qubits a match left unassigned: busiest first, onto the
/// free physical qubits with the lowest error.
fn fill_unmatched(mapping: &mut [Option<u32>], ones: &[usize], num_physical: u32, errors: &ErrorMap) {
    let mut used = vec![false; num_physical as usize];
    for p in mapping.iter().flatten() {
        used[*p as usize] = true;
    }
    let mut free: Vec<u32> = (0..num_physical).filter(|&p| !used[p as usize]).collect();
    free.sort_by(|&a, &b| errors.qubit_error(a).total_cmp(&errors.qubit_error(b)).then(a.cmp(&b)));

    let mut open: Vec<usize> = (0..mapping.len()).filter(|&v| mapping[v].is_none()).collect();
    open.sort_by(|&a, &b| {
        let count = |v: usize| ones.get(v).copied().unwrap_or(0);
        count(b).cmp(&count(a)).then(a.cmp(&b))
    });
    for (v, p) in open.into_iter().zip(free) {
        mapping[v] = Some(p);
    }
}

/// Search limits shared by both VF2 passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vf2Limits {
    /// Seed for the candidate order; `None` keeps index order.
    pub seed: Option<u64>,
    /// Maximum number of search steps.
    pub call_limit: Option<usize>,
    /// Maximum number of matches scored.
    pub max_trials: Option<usize>,
}

/// Best match found by a search, plus why the search stopped.
struct SearchOutcome {
    best: Option<(f64, Vec<Option<u32>>)>,
    found: usize,
    end: SearchEnd,
}

fn best_match(
    interactions: &Interactions,
    coupling_map: &CouplingMap,
    errors: &ErrorMap,
    limits: Vf2Limits,
) -> SearchOutcome {
    let has_errors = !errors.qubit.is_empty() || !errors.edge.is_empty();
    let mut matcher = Matcher::new(interactions.adjacency(), coupling_map, limits.seed, limits.call_limit);
    let num_physical = coupling_map.num_qubits();
    let mut best: Option<(f64, Vec<Option<u32>>)> = None;
    let mut found = 0usize;

    let end = matcher.run(&mut |partial| {
        found += 1;
        let mut mapping = partial.to_vec();
        fill_unmatched(&mut mapping, &interactions.ones, num_physical, errors);
        let score = interactions.score(errors, |q| {
            mapping.get(q as usize).copied().flatten().unwrap_or(q)
        });
        trace!("VF2 match {found} scored {score}");
        if best.as_ref().is_none_or(|(s, _)| score < *s) {
            best = Some((score, mapping));
        }
        has_errors && limits.max_trials.is_none_or(|max| found < max)
    });
    SearchOutcome { best, found, end }
}

/// Finds a swap-free layout, if one exists.
///
/// Records a [`Vf2StopReason`] in every case and only sets a layout when a
/// match was found.
pub struct VF2Layout {
    limits: Vf2Limits,
}

impl VF2Layout {
    /// Create the pass with the given search limits.
    pub fn new(limits: Vf2Limits) -> Self {
        Self { limits }
    }
}

impl Pass for VF2Layout {
    fn name(&self) -> &'static str {
        "VF2Layout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
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
        let Some(interactions) = Interactions::collect(dag)? else {
            debug!("VF2Layout: circuit has operations on more than two qubits");
            properties.insert(Property::Vf2Stop(Vf2StopReason::MoreThan2qInteractions));
            return Ok(());
        };
        let errors = properties
            .target
            .as_ref()
            .map(|t| t.error_map())
            .unwrap_or_default();

        let outcome = best_match(&interactions, &coupling_map, &errors, self.limits);
        if outcome.end == SearchEnd::CallLimit {
            warn!(
                "VF2Layout hit its call limit after {} matches",
                outcome.found
            );
        }
        let Some((score, mapping)) = outcome.best else {
            properties.insert(Property::Vf2Stop(Vf2StopReason::NoSolutionFound));
            return Ok(());
        };
        let v2p: Vec<u32> = mapping.into_iter().flatten().collect();
        let layout = Layout::from_partial(&v2p, num_physical)?;
        debug!("VF2Layout found a perfect layout with score {score}");
        properties.set_layout(layout, LayoutSource::Vf2);
        properties.insert(Property::Vf2Stop(Vf2StopReason::SolutionFound));
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.coupling_map.is_some()
    }
}

/// Relabels a routed circuit onto a lower-error part of the device.
///
/// Only relabelings that keep every two-qubit operation on a coupling edge
/// are considered, and the layout changes only when the new error score
/// is strictly lower than the current one.
pub struct VF2PostLayout {
    limits: Vf2Limits,
}

impl VF2PostLayout {
    /// Create the pass with the given search limits.
    pub fn new(limits: Vf2Limits) -> Self {
        Self { limits }
    }
}

impl Pass for VF2PostLayout {
    fn name(&self) -> &'static str {
        "VF2PostLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .clone()
            .ok_or(CompileError::MissingCouplingMap)?;
        let errors = properties
            .target
            .as_ref()
            .map(|t| t.error_map())
            .unwrap_or_default();
        let Some(interactions) = Interactions::collect(dag)? else {
            properties.insert(Property::Vf2PostStop(Vf2PostStopReason::MoreThan2qInteractions));
            return Ok(());
        };

        // Qubits without operations stay out of the search and the score.
        let current = interactions.score(&errors, |q| q);
        let outcome = best_match(&interactions, &coupling_map, &errors, self.limits);
        if outcome.end == SearchEnd::CallLimit {
            warn!(
                "VF2PostLayout hit its call limit after {} matches",
                outcome.found
            );
        }
        let Some((score, mapping)) = outcome.best else {
            properties.insert(Property::Vf2PostStop(Vf2PostStopReason::NoSolutionFound));
            return Ok(());
        };
        if score >= current {
            debug!("VF2PostLayout kept the routed layout (score {current}, best {score})");
            properties.insert(Property::Vf2PostStop(Vf2PostStopReason::NoBetterSolutionFound));
            return Ok(());
        }

        let relabel = Layout::from_virtual_to_physical(mapping.into_iter().flatten().collect())?;
        apply_relabel(dag, properties, &relabel)?;
        debug!("VF2PostLayout improved the score from {current} to {score}");
        properties.insert(Property::Vf2PostStop(Vf2PostStopReason::SolutionFound));
        Ok(())
    }

    fn should_run(&self, dag: &CircuitDag, properties: &PropertySet) -> bool {
        dag.level() == CircuitLevel::Physical
            && properties.coupling_map.is_some()
            && properties.layout().is_some()
            && properties.target.as_ref().is_some_and(|t| t.has_error_data())
    }
}

/// Move every top-level operand `p` to `relabel.physical(p)` and keep the
/// layout properties consistent with the move.
fn apply_relabel(dag: &mut CircuitDag, properties: &mut PropertySet, relabel: &Layout) -> CompileResult<()> {
    let mut moved = dag.copy_empty_like();
    for (_, inst) in dag.topological_ops() {
        let mut inst = inst.clone();
        for q in &mut inst.qubits {
            *q = QubitId(relabel.physical(*q));
        }
        moved.apply(inst)?;
    }
    *dag = moved;

    if let Some(layout) = properties.layout() {
        let source = properties.layout_source().unwrap_or(LayoutSource::Sabre);
        let layout = layout.compose(relabel)?;
        properties.set_layout(layout, source);
    }
    if let Some(final_layout) = properties.final_layout() {
        let conjugated = relabel.inverse().compose(final_layout)?.compose(relabel)?;
        properties.insert(Property::FinalLayout(conjugated));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{InstructionProperties, OperationEntry, Target};
    use qpipe_ir::Circuit;

    fn ring_circuit(n: u32) -> CircuitDag {
        let mut circuit = Circuit::with_size("ring", n, 0);
        for i in 0..n {
            circuit.cx(QubitId(i), QubitId((i + 1) % n)).unwrap();
        }
        circuit.into_dag()
    }

    fn limits(seed: u64) -> Vf2Limits {
        Vf2Limits {
            seed: Some(seed),
            call_limit: Some(100_000),
            max_trials: Some(100),
        }
    }

    #[test]
    fn test_vf2_finds_ring_in_grid() {
        let mut dag = ring_circuit(4);
        let mut props = PropertySet::new().with_coupling_map(CouplingMap::grid(2, 3));
        VF2Layout::new(limits(7)).run(&mut dag, &mut props).unwrap();

        assert_eq!(props.vf2_stop(), Some(Vf2StopReason::SolutionFound));
        let layout = props.layout().unwrap();
        let cm = props.coupling_map.as_ref().unwrap();
        for i in 0..4 {
            let a = layout.physical(QubitId(i));
            let b = layout.physical(QubitId((i + 1) % 4));
            assert!(cm.is_connected(a, b));
        }
        assert!(layout.is_bijection());
    }

    #[test]
    fn test_vf2_no_solution_for_triangle_on_line() {
        let mut dag = ring_circuit(3);
        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(5));
        VF2Layout::new(limits(1)).run(&mut dag, &mut props).unwrap();
        assert_eq!(props.vf2_stop(), Some(Vf2StopReason::NoSolutionFound));
        assert!(props.layout().is_none());
    }

    #[test]
    fn test_vf2_rejects_three_qubit_ops() {
        let mut circuit = Circuit::with_size("ccx", 3, 0);
        circuit.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        let mut dag = circuit.into_dag();
        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(3));
        VF2Layout::new(limits(1)).run(&mut dag, &mut props).unwrap();
        assert_eq!(props.vf2_stop(), Some(Vf2StopReason::MoreThan2qInteractions));
    }

    #[test]
    fn test_vf2_is_deterministic_for_a_seed() {
        let run = |seed| {
            let mut dag = ring_circuit(4);
            let mut props = PropertySet::new().with_coupling_map(CouplingMap::grid(3, 3));
            VF2Layout::new(limits(seed)).run(&mut dag, &mut props).unwrap();
            props.layout().cloned()
        };
        assert_eq!(run(11), run(11));
    }

    fn noisy_line(bad: u32) -> Target {
        let mut target = Target::new(4);
        let edges = [(0, 1), (1, 2), (2, 3)];
        let qargs = edges.iter().flat_map(|&(a, b)| {
            let error = if a == bad || b == bad { 0.2 } else { 0.01 };
            [
                (vec![a, b], InstructionProperties::with_error(error)),
                (vec![b, a], InstructionProperties::with_error(error)),
            ]
        });
        target.add_instruction(OperationEntry::on_qargs("cx", 2, 0, qargs)).unwrap();
        target
    }

    #[test]
    fn test_vf2_post_moves_away_from_bad_qubit() {
        let target = noisy_line(0);
        let cm = target.coupling_map().unwrap();
        let mut circuit = Circuit::with_size("pair", 4, 0);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        let mut dag = circuit.into_dag();
        dag.set_level(CircuitLevel::Physical);

        let mut props = PropertySet::new().with_coupling_map(cm).with_target(target);
        props.set_layout(Layout::trivial(4), LayoutSource::Sabre);
        props.insert(Property::FinalLayout(Layout::trivial(4)));

        let pass = VF2PostLayout::new(limits(3));
        assert!(pass.should_run(&dag, &props));
        pass.run(&mut dag, &mut props).unwrap();

        assert_eq!(props.vf2_post_stop(), Some(Vf2PostStopReason::SolutionFound));
        let (_, cx) = dag.topological_ops().next().unwrap();
        assert!(!cx.qubits.contains(&QubitId(0)));
        assert!(props.layout().unwrap().is_bijection());
        assert_eq!(props.final_layout(), Some(&Layout::trivial(4)));
    }

    #[test]
    fn test_vf2_post_keeps_equal_score() {
        let target = noisy_line(9);
        let cm = target.coupling_map().unwrap();
        let mut circuit = Circuit::with_size("pair", 4, 0);
        circuit.cx(QubitId(1), QubitId(2)).unwrap();
        let mut dag = circuit.into_dag();
        dag.set_level(CircuitLevel::Physical);

        let mut props = PropertySet::new().with_coupling_map(cm).with_target(target);
        props.set_layout(Layout::trivial(4), LayoutSource::Sabre);
        VF2PostLayout::new(limits(3)).run(&mut dag, &mut props).unwrap();
        assert_eq!(
            props.vf2_post_stop(),
            Some(Vf2PostStopReason::NoBetterSolutionFound)
        );
    }
}
