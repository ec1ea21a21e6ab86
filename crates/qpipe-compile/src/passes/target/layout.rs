//! Layout passes for mapping logical qubits to physical qubits.

use std::collections::VecDeque;

use qpipe_ir::{CircuitDag, CircuitLevel, Instruction, QubitId};

use crate::control_flow::walk_operations;
use crate::coupling::CouplingMap;
use crate::error::{CompileError, CompileResult};
use crate::layout::{Layout, len_u32};
use crate::pass::{Pass, PassKind};
use crate::property::{LayoutSource, Property, PropertySet};
use crate::target::ErrorMap;

/// True for operations that need their qubits adjacent on the device.
pub(crate) fn is_routable_2q(inst: &Instruction) -> bool {
    inst.qubits.len() == 2 && !inst.is_barrier() && !inst.is_control_flow()
}

/// Number of physical qubits known to the pass, from the coupling map or
/// the target.
fn device_size(properties: &PropertySet) -> Option<u32> {
    properties
        .coupling_map
        .as_ref()
        .map(|cm| cm.num_qubits())
        .or_else(|| properties.target.as_ref().map(|t| t.num_qubits()))
}

fn check_fits(num_logical: usize, available: u32) -> CompileResult<()> {
    if num_logical > available as usize {
        return Err(CompileError::LayoutInfeasible {
            required: num_logical,
            available,
        });
    }
    Ok(())
}

/// Trivial layout pass.
///
/// Maps logical qubit i to physical qubit i. Physical qubits beyond the
/// circuit's width hold ancillas.
pub struct TrivialLayout;

impl Pass for TrivialLayout {
    fn name(&self) -> &'static str {
        "TrivialLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .as_ref()
            .ok_or(CompileError::MissingCouplingMap)?;

        let num_logical = dag.num_qubits();
        check_fits(num_logical, coupling_map.num_qubits())?;

        let identity: Vec<u32> = (0..len_u32(num_logical)).collect();
        let layout = Layout::from_partial(&identity, coupling_map.num_qubits())?;
        properties.set_layout(layout, LayoutSource::Trivial);
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.layout().is_none() && properties.coupling_map.is_some()
    }
}

/// Installs a user-supplied initial layout.
///
/// Entry `i` is the physical qubit of virtual qubit `i`. Physical qubits
/// nobody asked for are filled with ancillas in ascending order. Without a
/// coupling map the device is as large as the target, or just large
/// enough for the highest requested index.
pub struct SetLayout {
    initial: Vec<u32>,
}

impl SetLayout {
    /// Create the pass from a virtual-to-physical list.
    pub fn new(initial: Vec<u32>) -> Self {
        Self { initial }
    }
}

impl Pass for SetLayout {
    fn name(&self) -> &'static str {
        "SetLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        if self.initial.len() != dag.num_qubits() {
            return Err(CompileError::Configuration(format!(
                "Initial layout has {} entries but the circuit has {} qubits",
                self.initial.len(),
                dag.num_qubits()
            )));
        }
        let num_physical = device_size(properties).unwrap_or_else(|| {
            self.initial
                .iter()
                .max()
                .map_or(0, |&p| p.saturating_add(1))
        });
        let layout = Layout::from_partial(&self.initial, num_physical)?;
        properties.set_layout(layout, LayoutSource::User);
        Ok(())
    }
}

/// Rewrites a logical DAG onto physical qubits.
///
/// The new DAG has one wire per physical qubit `0..N-1`; operand `v`
/// becomes `layout.physical(v)`. Nested blocks keep their local qubits.
pub struct ApplyLayout;

impl Pass for ApplyLayout {
    fn name(&self) -> &'static str {
        "ApplyLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let layout = properties.layout().ok_or(CompileError::MissingLayout)?;
        check_fits(dag.num_qubits(), layout.num_qubits())?;

        let mut physical = CircuitDag::with_size(layout.num_qubits(), len_u32(dag.num_clbits()));
        physical.set_global_phase(dag.global_phase());
        for (_, inst) in dag.topological_ops() {
            let mut relabeled = inst.clone();
            for q in &mut relabeled.qubits {
                *q = QubitId(layout.physical(*q));
            }
            physical.apply(relabeled)?;
        }
        physical.set_level(CircuitLevel::Physical);
        *dag = physical;
        Ok(())
    }

    fn should_run(&self, dag: &CircuitDag, properties: &PropertySet) -> bool {
        dag.level() == CircuitLevel::Logical && properties.layout().is_some()
    }
}

/// Counts the two-qubit operations that the current layout leaves off the
/// coupling map, nested blocks included.
pub struct Layout2qDistance;

impl Pass for Layout2qDistance {
    fn name(&self) -> &'static str {
        "Layout2qDistance"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .as_ref()
            .ok_or(CompileError::MissingCouplingMap)?;
        let layout = properties.layout().ok_or(CompileError::MissingLayout)?;

        let mut distance = 0usize;
        walk_operations(dag, |inst, qubits, _| {
            if is_routable_2q(inst) {
                let a = layout.physical(QubitId(qubits[0]));
                let b = layout.physical(QubitId(qubits[1]));
                if !coupling_map.is_connected(a, b) {
                    distance += 1;
                }
            }
            Ok(())
        })?;
        properties.insert(Property::LayoutDistance(distance));
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.layout().is_some() && properties.coupling_map.is_some()
    }
}

/// Places the circuit on the most densely connected part of the device.
///
/// For every start qubit a subset is grown breadth-first, always taking
/// the frontier qubit with the most links into the subset. The subset with
/// the most internal edges wins, then the lowest average error.
pub struct DenseLayout;

impl DenseLayout {
    fn grow(coupling_map: &CouplingMap, errors: &ErrorMap, start: u32, size: usize) -> Option<Vec<u32>> {
        let n = coupling_map.num_qubits() as usize;
        let mut inside = vec![false; n];
        let mut subset = vec![start];
        inside[start as usize] = true;
        let mut frontier: VecDeque<u32> = coupling_map.neighbors(start).collect();

        while subset.len() < size {
            frontier.retain(|&q| !inside[q as usize]);
            let best = frontier.iter().copied().max_by(|&a, &b| {
                let links = |q: u32| coupling_map.neighbors(q).filter(|&x| inside[x as usize]).count();
                links(a)
                    .cmp(&links(b))
                    .then_with(|| errors.qubit_error(b).total_cmp(&errors.qubit_error(a)))
                    .then_with(|| b.cmp(&a))
            })?;
            inside[best as usize] = true;
            subset.push(best);
            frontier.extend(coupling_map.neighbors(best).filter(|&q| !inside[q as usize]));
        }
        Some(subset)
    }

    fn internal_edges(coupling_map: &CouplingMap, subset: &[u32]) -> usize {
        coupling_map
            .edges()
            .iter()
            .filter(|(a, b)| subset.contains(a) && subset.contains(b))
            .count()
    }
}

impl Pass for DenseLayout {
    fn name(&self) -> &'static str {
        "DenseLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let coupling_map = properties
            .coupling_map
            .clone()
            .ok_or(CompileError::MissingCouplingMap)?;
        let num_logical = dag.num_qubits();
        check_fits(num_logical, coupling_map.num_qubits())?;

        let errors = properties
            .target
            .as_ref()
            .map(|t| t.error_map())
            .unwrap_or_default();

        let mut best: Option<(usize, f64, Vec<u32>)> = None;
        if num_logical > 0 {
            for start in 0..coupling_map.num_qubits() {
                let Some(subset) = Self::grow(&coupling_map, &errors, start, num_logical) else {
                    continue;
                };
                let edges = Self::internal_edges(&coupling_map, &subset);
                let avg_error = subset.iter().map(|&q| errors.qubit_error(q)).sum::<f64>()
                    / subset.len() as f64;
                let better = best.as_ref().is_none_or(|(e, err, _)| {
                    edges > *e || (edges == *e && avg_error < *err)
                });
                if better {
                    best = Some((edges, avg_error, subset));
                }
            }
        }
        let subset = match best {
            Some((_, _, subset)) => subset,
            None if num_logical == 0 => vec![],
            None => {
                return Err(CompileError::LayoutInfeasibleReason(format!(
                    "no connected group of {num_logical} physical qubits"
                )));
            }
        };

        // Busiest virtual qubits land on the best connected physical ones.
        let mut degree = vec![0usize; num_logical];
        walk_operations(dag, |inst, qubits, _| {
            if is_routable_2q(inst) {
                for &q in qubits {
                    degree[q as usize] += 1;
                }
            }
            Ok(())
        })?;
        let mut virtuals: Vec<usize> = (0..num_logical).collect();
        virtuals.sort_by(|&a, &b| degree[b].cmp(&degree[a]).then(a.cmp(&b)));

        let mut physicals = subset.clone();
        let subset_degree =
            |q: u32| coupling_map.neighbors(q).filter(|x| subset.contains(x)).count();
        physicals.sort_by(|&a, &b| subset_degree(b).cmp(&subset_degree(a)).then(a.cmp(&b)));

        let mut v2p = vec![0u32; num_logical];
        for (&v, &p) in virtuals.iter().zip(&physicals) {
            v2p[v] = p;
        }
        let layout = Layout::from_partial(&v2p, coupling_map.num_qubits())?;
        properties.set_layout(layout, LayoutSource::Dense);
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.coupling_map.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling::CouplingMap;
    use qpipe_ir::{Circuit, ClassicalCondition, ClbitId};

    #[test]
    fn test_trivial_layout() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.h(QubitId(0)).unwrap();
        let mut dag = circuit.into_dag();

        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(5));
        TrivialLayout.run(&mut dag, &mut props).unwrap();

        let layout = props.layout().unwrap();
        assert_eq!(layout.num_qubits(), 5);
        assert_eq!(layout.num_circuit_qubits(), 3);
        assert_eq!(layout.physical(QubitId(2)), 2);
        assert!(layout.is_ancilla(QubitId(4)));
        assert_eq!(props.layout_source(), Some(LayoutSource::Trivial));
        assert_eq!(dag.level(), CircuitLevel::Logical);
    }

    #[test]
    fn test_trivial_layout_too_large() {
        let mut dag = Circuit::with_size("test", 4, 0).into_dag();
        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(3));
        let err = TrivialLayout.run(&mut dag, &mut props).unwrap_err();
        assert!(matches!(
            err,
            CompileError::LayoutInfeasible {
                required: 4,
                available: 3
            }
        ));
    }

    #[test]
    fn test_set_layout_without_coupling_map() {
        let mut dag = Circuit::with_size("test", 2, 0).into_dag();
        let mut props = PropertySet::new();
        SetLayout::new(vec![3, 1]).run(&mut dag, &mut props).unwrap();

        let layout = props.layout().unwrap();
        assert_eq!(layout.num_qubits(), 4);
        assert_eq!(layout.physical(QubitId(0)), 3);
        assert_eq!(layout.physical(QubitId(1)), 1);
        assert!(layout.is_bijection());
        assert_eq!(props.layout_source(), Some(LayoutSource::User));
    }

    #[test]
    fn test_set_layout_rejects_wrong_length() {
        let mut dag = Circuit::with_size("test", 3, 0).into_dag();
        let mut props = PropertySet::new();
        let err = SetLayout::new(vec![0]).run(&mut dag, &mut props).unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
    }

    #[test]
    fn test_apply_layout_relabels_and_adds_ancillas() {
        let mut circuit = Circuit::with_size("test", 2, 1);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.measure(QubitId(1), ClbitId(0)).unwrap();
        let mut dag = circuit.into_dag();

        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(4));
        props.set_layout(Layout::from_partial(&[2, 3], 4).unwrap(), LayoutSource::User);
        ApplyLayout.run(&mut dag, &mut props).unwrap();

        assert_eq!(dag.num_qubits(), 4);
        assert_eq!(dag.level(), CircuitLevel::Physical);
        let ops: Vec<_> = dag.topological_ops().map(|(_, i)| i.clone()).collect();
        assert_eq!(ops[0].qubits, vec![QubitId(2), QubitId(3)]);
        assert_eq!(ops[1].qubits, vec![QubitId(3)]);
        assert!(!ApplyLayout.should_run(&dag, &props));
    }

    #[test]
    fn test_layout_distance_counts_nested_ops() {
        let mut body = Circuit::with_size("body", 2, 1);
        body.cx(QubitId(0), QubitId(1)).unwrap();

        let mut circuit = Circuit::with_size("test", 3, 1);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.measure(QubitId(0), ClbitId(0)).unwrap();
        circuit
            .if_else(
                ClassicalCondition::new(ClbitId(0), true),
                &body,
                None,
                &[QubitId(0), QubitId(2)],
                &[ClbitId(0)],
            )
            .unwrap();
        let mut dag = circuit.into_dag();

        let mut props = PropertySet::new().with_coupling_map(CouplingMap::linear(3));
        props.set_layout(Layout::trivial(3), LayoutSource::Trivial);
        Layout2qDistance.run(&mut dag, &mut props).unwrap();
        assert_eq!(props.layout_distance(), Some(1));
    }

    #[test]
    fn test_dense_layout_picks_hub() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.cx(QubitId(0), QubitId(2)).unwrap();
        let mut dag = circuit.into_dag();

        // Star centred on 0 plus a tail 3-4-5.
        let cm = CouplingMap::with_num_qubits(6, &[(0, 1), (0, 2), (0, 3), (3, 4), (4, 5)]);
        let mut props = PropertySet::new().with_coupling_map(cm);
        DenseLayout.run(&mut dag, &mut props).unwrap();

        let layout = props.layout().unwrap();
        assert_eq!(layout.physical(QubitId(0)), 0);
        assert!(layout.is_bijection());
        assert_eq!(props.layout_source(), Some(LayoutSource::Dense));
    }

    #[test]
    fn test_dense_layout_disconnected_device() {
        let mut dag = Circuit::with_size("test", 3, 0).into_dag();
        let cm = CouplingMap::with_num_qubits(4, &[(0, 1), (2, 3)]);
        let mut props = PropertySet::new().with_coupling_map(cm);
        let err = DenseLayout.run(&mut dag, &mut props).unwrap_err();
        assert!(matches!(err, CompileError::LayoutInfeasibleReason(_)));
    }
}
