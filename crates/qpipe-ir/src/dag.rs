//! DAG-based circuit representation.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex as PetNodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::{Block, Instruction, InstructionKind};
use crate::qubit::{ClbitId, QubitId};

/// Node index type for the circuit DAG.
pub type NodeIndex = PetNodeIndex<u32>;

/// A node in the circuit DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DagNode {
    /// Input node for a wire.
    In(WireId),
    /// Output node for a wire.
    Out(WireId),
    /// Operation node containing an instruction.
    Op(Instruction),
}

impl DagNode {
    /// Check if this is an input node.
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self, DagNode::In(_))
    }

    /// Check if this is an output node.
    #[inline]
    pub fn is_output(&self) -> bool {
        matches!(self, DagNode::Out(_))
    }

    /// Check if this is an operation node.
    #[inline]
    pub fn is_op(&self) -> bool {
        matches!(self, DagNode::Op(_))
    }

    /// Get the instruction if this is an operation node.
    #[inline]
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            DagNode::Op(inst) => Some(inst),
            _ => None,
        }
    }

    /// Get mutable reference to the instruction.
    #[inline]
    pub fn instruction_mut(&mut self) -> Option<&mut Instruction> {
        match self {
            DagNode::Op(inst) => Some(inst),
            _ => None,
        }
    }
}

/// Identifier for a wire in the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WireId {
    /// A quantum wire.
    Qubit(QubitId),
    /// A classical wire.
    Clbit(ClbitId),
}

impl From<QubitId> for WireId {
    fn from(q: QubitId) -> Self {
        WireId::Qubit(q)
    }
}

impl From<ClbitId> for WireId {
    fn from(c: ClbitId) -> Self {
        WireId::Clbit(c)
    }
}

impl std::fmt::Display for WireId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireId::Qubit(q) => write!(f, "{q}"),
            WireId::Clbit(c) => write!(f, "{c}"),
        }
    }
}

/// An edge in the circuit DAG representing a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DagEdge {
    /// The wire this edge represents.
    pub wire: WireId,
}

/// The abstraction level of a circuit in the compilation pipeline.
///
/// Circuits start at the `Logical` level (virtual qubits) and are
/// lowered to the `Physical` level once a layout has been applied. From
/// then on `QubitId(p)` names physical qubit `p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CircuitLevel {
    /// Logical level: qubits are virtual, no physical mapping applied.
    #[default]
    Logical,
    /// Physical level: qubits are physical device positions.
    Physical,
}

/// DAG-based circuit representation.
///
/// The circuit is represented as a directed acyclic graph where:
/// - Nodes are either input nodes, output nodes, or operation nodes
/// - Edges represent wires (quantum or classical)
/// - Each wire has exactly one input and one output node
/// - Operations are connected to wires in program order
///
/// The graph is a [`StableDiGraph`], so node indices stay valid across
/// removals and substitutions. Passes may collect indices up front and
/// edit the DAG while walking them.
///
/// ## Performance
///
/// The DAG maintains a `wire_front` index that maps each wire to the
/// last node before the output node. This keeps `apply()` O(1) per wire.
#[derive(Debug, Clone)]
pub struct CircuitDag {
    /// The underlying graph.
    graph: StableDiGraph<DagNode, DagEdge, u32>,
    /// Map from qubit to its input node.
    qubit_inputs: FxHashMap<QubitId, NodeIndex>,
    /// Map from qubit to its output node.
    qubit_outputs: FxHashMap<QubitId, NodeIndex>,
    /// Map from classical bit to its input node.
    clbit_inputs: FxHashMap<ClbitId, NodeIndex>,
    /// Map from classical bit to its output node.
    clbit_outputs: FxHashMap<ClbitId, NodeIndex>,
    /// Wire front: maps each wire to the node just before the output node.
    wire_front: FxHashMap<WireId, NodeIndex>,
    /// Global phase of the circuit.
    global_phase: f64,
    /// Abstraction level of the circuit.
    level: CircuitLevel,
}

impl CircuitDag {
    /// Create a new empty circuit DAG.
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::default(),
            qubit_inputs: FxHashMap::default(),
            qubit_outputs: FxHashMap::default(),
            clbit_inputs: FxHashMap::default(),
            clbit_outputs: FxHashMap::default(),
            wire_front: FxHashMap::default(),
            global_phase: 0.0,
            level: CircuitLevel::Logical,
        }
    }

    /// Create a DAG with qubits `0..num_qubits` and clbits `0..num_clbits`.
    pub fn with_size(num_qubits: u32, num_clbits: u32) -> Self {
        let mut dag = Self::new();
        for q in 0..num_qubits {
            dag.add_qubit(QubitId(q));
        }
        for c in 0..num_clbits {
            dag.add_clbit(ClbitId(c));
        }
        dag
    }

    /// An empty DAG with the same wires, phase and level as `self`.
    pub fn copy_empty_like(&self) -> Self {
        let mut dag = Self::new();
        for q in self.qubits() {
            dag.add_qubit(q);
        }
        for c in self.clbits() {
            dag.add_clbit(c);
        }
        dag.global_phase = self.global_phase;
        dag.level = self.level;
        dag
    }

    /// Build a DAG from a control-flow block.
    pub fn from_block(block: &Block) -> IrResult<Self> {
        let mut dag = Self::with_size(block.num_qubits, block.num_clbits);
        for inst in &block.instructions {
            dag.apply(inst.clone())?;
        }
        Ok(dag)
    }

    /// Flatten the DAG back into a block, in topological order.
    ///
    /// Wires are assumed to be contiguous from zero, which holds for every
    /// DAG built by [`CircuitDag::from_block`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_block(&self) -> Block {
        Block {
            num_qubits: self.num_qubits() as u32,
            num_clbits: self.num_clbits() as u32,
            instructions: self
                .topological_ops()
                .map(|(_, inst)| inst.clone())
                .collect(),
        }
    }

    /// Add a qubit to the circuit.
    pub fn add_qubit(&mut self, qubit: QubitId) {
        if self.qubit_inputs.contains_key(&qubit) {
            return;
        }
        let wire = WireId::Qubit(qubit);
        let (in_node, out_node) = self.add_wire(wire);
        self.qubit_inputs.insert(qubit, in_node);
        self.qubit_outputs.insert(qubit, out_node);
    }

    /// Add a classical bit to the circuit.
    pub fn add_clbit(&mut self, clbit: ClbitId) {
        if self.clbit_inputs.contains_key(&clbit) {
            return;
        }
        let wire = WireId::Clbit(clbit);
        let (in_node, out_node) = self.add_wire(wire);
        self.clbit_inputs.insert(clbit, in_node);
        self.clbit_outputs.insert(clbit, out_node);
    }

    fn add_wire(&mut self, wire: WireId) -> (NodeIndex, NodeIndex) {
        let in_node = self.graph.add_node(DagNode::In(wire));
        let out_node = self.graph.add_node(DagNode::Out(wire));
        self.graph.add_edge(in_node, out_node, DagEdge { wire });
        self.wire_front.insert(wire, in_node);
        (in_node, out_node)
    }

    fn has_wire(&self, wire: WireId) -> bool {
        match wire {
            WireId::Qubit(q) => self.qubit_inputs.contains_key(&q),
            WireId::Clbit(c) => self.clbit_inputs.contains_key(&c),
        }
    }

    fn output_node(&self, wire: WireId) -> Option<NodeIndex> {
        match wire {
            WireId::Qubit(q) => self.qubit_outputs.get(&q).copied(),
            WireId::Clbit(c) => self.clbit_outputs.get(&c).copied(),
        }
    }

    /// Check an instruction against its own shape, independent of this DAG.
    #[allow(clippy::cast_possible_truncation)]
    fn validate_shape(instruction: &Instruction) -> IrResult<()> {
        let op_name = Some(instruction.name().to_string());
        match &instruction.kind {
            InstructionKind::Gate(gate) => {
                let expected = gate.num_qubits() as usize;
                let got = instruction.qubits.len();
                if expected != got {
                    return Err(IrError::QubitCountMismatch {
                        gate_name: gate.name().to_string(),
                        expected: expected as u32,
                        got: got as u32,
                    });
                }
            }
            InstructionKind::ControlFlow(cf) => {
                for block in &cf.blocks {
                    if block.num_qubits as usize != instruction.qubits.len() {
                        return Err(IrError::BlockWidthMismatch {
                            op_name: instruction.name().to_string(),
                            kind: "qubits",
                            block: block.num_qubits,
                            outer: instruction.qubits.len() as u32,
                        });
                    }
                    if block.num_clbits as usize != instruction.clbits.len() {
                        return Err(IrError::BlockWidthMismatch {
                            op_name: instruction.name().to_string(),
                            kind: "clbits",
                            block: block.num_clbits,
                            outer: instruction.clbits.len() as u32,
                        });
                    }
                }
            }
            _ => {}
        }

        let mut seen = FxHashSet::default();
        for &qubit in &instruction.qubits {
            if !seen.insert(qubit) {
                return Err(IrError::DuplicateQubit {
                    qubit,
                    op_name: op_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Apply an instruction to the end of the circuit.
    #[allow(clippy::needless_pass_by_value)]
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<NodeIndex> {
        Self::validate_shape(&instruction)?;

        let op_name = Some(instruction.name().to_string());
        for &qubit in &instruction.qubits {
            if !self.qubit_inputs.contains_key(&qubit) {
                return Err(IrError::QubitNotFound {
                    qubit,
                    op_name: op_name.clone(),
                });
            }
        }
        for &clbit in &instruction.clbits {
            if !self.clbit_inputs.contains_key(&clbit) {
                return Err(IrError::ClbitNotFound {
                    clbit,
                    op_name: op_name.clone(),
                });
            }
        }

        let wires = wires_of(&instruction);
        let op_node = self.graph.add_node(DagNode::Op(instruction));

        for wire in wires {
            let out_node = self
                .output_node(wire)
                .ok_or_else(|| IrError::InvalidDag(format!("wire {wire} has no output node")))?;
            let prev_node = self.wire_front[&wire];

            let eid = self
                .graph
                .edges_directed(prev_node, Direction::Outgoing)
                .find(|e| e.weight().wire == wire && e.target() == out_node)
                .map(|e| e.id())
                .ok_or_else(|| {
                    IrError::InvalidDag(format!(
                        "Missing edge from predecessor to output for wire {wire}"
                    ))
                })?;
            self.graph.remove_edge(eid);
            self.graph.add_edge(prev_node, op_node, DagEdge { wire });
            self.graph.add_edge(op_node, out_node, DagEdge { wire });
            self.wire_front.insert(wire, op_node);
        }

        Ok(op_node)
    }

    /// Operation nodes in a deterministic topological order.
    ///
    /// Among ready nodes the one with the smallest index goes first, so
    /// two DAGs built by the same sequence of edits always yield the same
    /// order.
    pub fn topological_op_nodes(&self) -> Vec<NodeIndex> {
        let mut in_degree: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut ready = BinaryHeap::new();
        for node in self.graph.node_indices() {
            let degree = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .count();
            if degree == 0 {
                ready.push(Reverse(node));
            } else {
                in_degree.insert(node, degree);
            }
        }

        let mut order = Vec::with_capacity(self.num_ops());
        while let Some(Reverse(node)) = ready.pop() {
            if self.graph[node].is_op() {
                order.push(node);
            }
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                let target = edge.target();
                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(target));
                    }
                }
            }
        }
        order
    }

    /// Iterate over operations in topological order.
    pub fn topological_ops(&self) -> impl Iterator<Item = (NodeIndex, &Instruction)> {
        self.topological_op_nodes()
            .into_iter()
            .filter_map(|idx| self.graph[idx].instruction().map(|inst| (idx, inst)))
    }

    /// All operation nodes, in index order.
    pub fn op_nodes(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_op())
            .collect()
    }

    /// Get a node by index.
    #[inline]
    pub fn node(&self, node: NodeIndex) -> Option<&DagNode> {
        self.graph.node_weight(node)
    }

    /// Get an instruction by node index.
    #[inline]
    pub fn get_instruction(&self, node: NodeIndex) -> Option<&Instruction> {
        self.graph.node_weight(node).and_then(|n| n.instruction())
    }

    /// Get a mutable instruction by node index.
    ///
    /// Callers may change the operation but not its operands.
    #[inline]
    pub fn get_instruction_mut(&mut self, node: NodeIndex) -> Option<&mut Instruction> {
        self.graph
            .node_weight_mut(node)
            .and_then(|n| n.instruction_mut())
    }

    /// The node preceding `node` on `wire`.
    pub fn wire_predecessor(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.source())
    }

    /// The node following `node` on `wire`.
    pub fn wire_successor(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.target())
    }

    /// Distinct operation nodes immediately before `node`, sorted.
    pub fn op_predecessors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.neighbor_ops(node, Direction::Incoming)
    }

    /// Distinct operation nodes immediately after `node`, sorted.
    pub fn op_successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.neighbor_ops(node, Direction::Outgoing)
    }

    fn neighbor_ops(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, direction)
            .filter(|&n| self.graph[n].is_op())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Operation nodes on a wire, in program order.
    pub fn nodes_on_wire(&self, wire: WireId) -> Vec<NodeIndex> {
        let start = match wire {
            WireId::Qubit(q) => self.qubit_inputs.get(&q),
            WireId::Clbit(c) => self.clbit_inputs.get(&c),
        };
        let mut nodes = vec![];
        let Some(&start) = start else {
            return nodes;
        };
        let mut current = self.wire_successor(start, wire);
        while let Some(node) = current {
            if !self.graph[node].is_op() {
                break;
            }
            nodes.push(node);
            current = self.wire_successor(node, wire);
        }
        nodes
    }

    /// Remove an operation node from the DAG, reconnecting its wires.
    pub fn remove_op(&mut self, node: NodeIndex) -> IrResult<Instruction> {
        self.splice(node, Vec::new()).map(|(old, _)| old)
    }

    /// Replace an operation node by a sequence of instructions, in place.
    ///
    /// The replacement is written in the coordinates of the outer DAG and
    /// may only touch wires of the replaced node. Nodes elsewhere keep their
    /// indices and relative order. Returns the new nodes in sequence order.
    pub fn substitute_node(
        &mut self,
        node: NodeIndex,
        replacement: Vec<Instruction>,
    ) -> IrResult<Vec<NodeIndex>> {
        self.splice(node, replacement).map(|(_, new_nodes)| new_nodes)
    }

    fn splice(
        &mut self,
        node: NodeIndex,
        replacement: Vec<Instruction>,
    ) -> IrResult<(Instruction, Vec<NodeIndex>)> {
        let old = match self.graph.node_weight(node) {
            Some(DagNode::Op(inst)) => inst.clone(),
            Some(_) => {
                return Err(IrError::InvalidDag(
                    "Cannot substitute a non-operation node".into(),
                ));
            }
            None => return Err(IrError::InvalidNode),
        };
        let scope = wires_of(&old);
        for inst in &replacement {
            Self::validate_shape(inst)?;
            for wire in wires_of(inst) {
                if !scope.contains(&wire) {
                    return Err(IrError::ReplacementOutOfScope {
                        op_name: old.name().to_string(),
                        wire: wire.to_string(),
                    });
                }
            }
        }

        let mut cursor: FxHashMap<WireId, NodeIndex> = FxHashMap::default();
        let mut successor: FxHashMap<WireId, NodeIndex> = FxHashMap::default();
        for &wire in &scope {
            let pred = self
                .wire_predecessor(node, wire)
                .ok_or_else(|| IrError::InvalidDag(format!("wire {wire} has no predecessor")))?;
            let succ = self
                .wire_successor(node, wire)
                .ok_or_else(|| IrError::InvalidDag(format!("wire {wire} has no successor")))?;
            cursor.insert(wire, pred);
            successor.insert(wire, succ);
        }

        self.graph.remove_node(node);

        let mut new_nodes = Vec::with_capacity(replacement.len());
        for inst in replacement {
            let wires = wires_of(&inst);
            let new_node = self.graph.add_node(DagNode::Op(inst));
            for wire in wires {
                let prev = cursor[&wire];
                self.graph.add_edge(prev, new_node, DagEdge { wire });
                cursor.insert(wire, new_node);
            }
            new_nodes.push(new_node);
        }

        for &wire in &scope {
            let last = cursor[&wire];
            self.graph
                .add_edge(last, successor[&wire], DagEdge { wire });
            if self.wire_front.get(&wire) == Some(&node) {
                self.wire_front.insert(wire, last);
            }
        }

        Ok((old, new_nodes))
    }

    /// Count operations by name, top level only.
    pub fn count_ops(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for idx in self.graph.node_indices() {
            if let Some(inst) = self.graph[idx].instruction() {
                *counts.entry(inst.name().to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Count operations by name, descending into control-flow blocks.
    pub fn count_ops_recursive(&self) -> BTreeMap<String, usize> {
        fn visit(inst: &Instruction, counts: &mut BTreeMap<String, usize>) {
            *counts.entry(inst.name().to_string()).or_insert(0) += 1;
            if let Some(cf) = inst.as_control_flow() {
                for block in &cf.blocks {
                    for inner in &block.instructions {
                        visit(inner, counts);
                    }
                }
            }
        }
        let mut counts = BTreeMap::new();
        for idx in self.graph.node_indices() {
            if let Some(inst) = self.graph[idx].instruction() {
                visit(inst, &mut counts);
            }
        }
        counts
    }

    /// True when any top-level operation owns nested blocks.
    pub fn has_control_flow(&self) -> bool {
        self.graph.node_indices().any(|idx| {
            self.graph[idx]
                .instruction()
                .is_some_and(Instruction::is_control_flow)
        })
    }

    /// Get the number of qubits.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.qubit_inputs.len()
    }

    /// Get the number of classical bits.
    #[inline]
    pub fn num_clbits(&self) -> usize {
        self.clbit_inputs.len()
    }

    /// Get the number of operations.
    #[inline]
    pub fn num_ops(&self) -> usize {
        let io_nodes = 2 * (self.qubit_inputs.len() + self.clbit_inputs.len());
        self.graph.node_count().saturating_sub(io_nodes)
    }

    /// Calculate the circuit depth.
    pub fn depth(&self) -> usize {
        let mut depths: FxHashMap<NodeIndex, usize> =
            FxHashMap::with_capacity_and_hasher(self.graph.node_count(), Default::default());
        let mut max_depth = 0usize;

        for node in self.topological_op_nodes() {
            let max_pred_depth = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .map(|e| depths.get(&e.source()).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            let node_depth = max_pred_depth + 1;
            max_depth = max_depth.max(node_depth);
            depths.insert(node, node_depth);
        }

        max_depth
    }

    /// Qubits, sorted.
    pub fn qubits(&self) -> Vec<QubitId> {
        let mut qubits: Vec<QubitId> = self.qubit_inputs.keys().copied().collect();
        qubits.sort_unstable();
        qubits
    }

    /// Classical bits, sorted.
    pub fn clbits(&self) -> Vec<ClbitId> {
        let mut clbits: Vec<ClbitId> = self.clbit_inputs.keys().copied().collect();
        clbits.sort_unstable();
        clbits
    }

    /// Get the input node for a qubit.
    #[inline]
    pub fn qubit_input_node(&self, qubit: QubitId) -> Option<NodeIndex> {
        self.qubit_inputs.get(&qubit).copied()
    }

    /// Get the output node for a qubit.
    #[inline]
    pub fn qubit_output_node(&self, qubit: QubitId) -> Option<NodeIndex> {
        self.qubit_outputs.get(&qubit).copied()
    }

    /// Qubits that carry at least one operation.
    pub fn active_qubits(&self) -> Vec<QubitId> {
        self.qubits()
            .into_iter()
            .filter(|&q| {
                self.qubit_input_node(q)
                    .and_then(|n| self.wire_successor(n, WireId::Qubit(q)))
                    .is_some_and(|n| self.graph[n].is_op())
            })
            .collect()
    }

    /// Get the global phase.
    pub fn global_phase(&self) -> f64 {
        self.global_phase
    }

    /// Set the global phase.
    pub fn set_global_phase(&mut self, phase: f64) {
        self.global_phase = phase;
    }

    /// Add to the global phase.
    pub fn add_global_phase(&mut self, phase: f64) {
        self.global_phase += phase;
    }

    /// Get the abstraction level of this circuit.
    pub fn level(&self) -> CircuitLevel {
        self.level
    }

    /// Set the abstraction level of this circuit.
    pub fn set_level(&mut self, level: CircuitLevel) {
        self.level = level;
    }

    /// Get a reference to the underlying graph.
    pub fn graph(&self) -> &StableDiGraph<DagNode, DagEdge, u32> {
        &self.graph
    }

    /// Verify the structural integrity of the DAG.
    ///
    /// Checks that:
    /// - The graph is acyclic
    /// - Every wire has matching In and Out nodes
    /// - Wire edges form an unbroken path from In to Out for each wire
    pub fn verify_integrity(&self) -> IrResult<()> {
        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(IrError::InvalidDag("Graph contains a cycle".into()));
        }
        if self.qubit_inputs.len() != self.qubit_outputs.len()
            || self.clbit_inputs.len() != self.clbit_outputs.len()
        {
            return Err(IrError::InvalidDag(
                "Input and output node counts differ".into(),
            ));
        }

        let starts = self
            .qubit_inputs
            .iter()
            .map(|(&q, &n)| (WireId::Qubit(q), n))
            .chain(self.clbit_inputs.iter().map(|(&c, &n)| (WireId::Clbit(c), n)));

        let max_steps = self.graph.node_count();
        let mut visited_ops = FxHashSet::default();
        for (wire, in_node) in starts {
            let out_node = self
                .output_node(wire)
                .ok_or_else(|| IrError::InvalidDag(format!("wire {wire} has no Out node")))?;
            let mut current = in_node;
            let mut steps = 0;
            while current != out_node {
                current = self.wire_successor(current, wire).ok_or_else(|| {
                    IrError::InvalidDag(format!(
                        "Wire {wire} is broken: no outgoing edge from node {current:?}"
                    ))
                })?;
                if self.graph[current].is_op() {
                    visited_ops.insert(current);
                }
                steps += 1;
                if steps > max_steps {
                    return Err(IrError::InvalidDag(format!(
                        "Wire {wire} has too many steps"
                    )));
                }
            }
        }

        if visited_ops.len() != self.num_ops() {
            return Err(IrError::InvalidDag(
                "Unreachable operation node found in DAG".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CircuitDag {
    fn default() -> Self {
        Self::new()
    }
}

/// Wires touched by an instruction: its qubits, then its clbits.
pub fn wires_of(instruction: &Instruction) -> Vec<WireId> {
    instruction
        .qubits
        .iter()
        .map(|&q| WireId::Qubit(q))
        .chain(instruction.clbits.iter().map(|&c| WireId::Clbit(c)))
        .collect()
}
