//! Traversal of nested control-flow blocks.
//!
//! Blocks owned by control-flow operations are processed with an explicit
//! worklist instead of recursion. [`BlockArena::extract`] pulls every block
//! out of its parent (depth-first, pre-order) into a flat arena of DAGs that
//! remember their parent and how their local qubits map to the qubits of
//! the top-level circuit; [`BlockArena::write_back`] reinserts them
//! bottom-up. [`walk_operations`] is the read-only counterpart used by
//! analysis passes.

use qpipe_ir::{Block, CircuitDag, Instruction, IrError, NodeIndex};

use crate::error::CompileResult;

/// Where an extracted block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockParent {
    /// Arena index of the owning block, `None` for the top-level circuit.
    pub owner: Option<usize>,
    /// Control-flow node inside the owner.
    pub node: NodeIndex,
    /// Position among the node's blocks.
    pub block: usize,
}

/// One extracted block.
#[derive(Debug, Clone)]
pub struct BlockEntry {
    /// The block as an editable DAG over local qubits `0..n`.
    pub dag: CircuitDag,
    /// Origin of the block.
    pub parent: BlockParent,
    /// `qubit_map[i]` is the top-level qubit behind local qubit `i`.
    pub qubit_map: Vec<u32>,
    /// Nesting depth, 1 for blocks of top-level operations.
    pub depth: usize,
}

/// Flat arena of every block nested anywhere in a circuit.
#[derive(Debug, Default)]
pub struct BlockArena {
    entries: Vec<BlockEntry>,
}

impl BlockArena {
    /// Take every block out of `dag`, leaving empty placeholders of the
    /// same width behind.
    pub fn extract(dag: &mut CircuitDag) -> CompileResult<Self> {
        let mut arena = Self::default();
        let mut pending: Vec<usize> = Vec::new();

        let roots = take_blocks(dag, None, |q| q, 1)?;
        for entry in roots.into_iter().rev() {
            pending.push(arena.entries.len());
            arena.entries.push(entry);
        }
        // Pre-order: `pending` is a stack of arena indices whose own blocks
        // have not been pulled out yet.
        let mut ordered = Vec::with_capacity(arena.entries.len());
        while let Some(idx) = pending.pop() {
            ordered.push(idx);
            let (map, depth) = {
                let entry = &arena.entries[idx];
                (entry.qubit_map.clone(), entry.depth)
            };
            let children = take_blocks(
                &mut arena.entries[idx].dag,
                Some(idx),
                |q| map.get(q as usize).copied().unwrap_or(q),
                depth + 1,
            )?;
            for entry in children.into_iter().rev() {
                pending.push(arena.entries.len());
                arena.entries.push(entry);
            }
        }
        arena.reorder(&ordered);
        Ok(arena)
    }

    /// Renumber entries so that the arena is in pre-order.
    fn reorder(&mut self, order: &[usize]) {
        let mut new_index = vec![0usize; order.len()];
        for (new, &old) in order.iter().enumerate() {
            new_index[old] = new;
        }
        let mut slots: Vec<Option<BlockEntry>> = self.entries.drain(..).map(Some).collect();
        for &old in order {
            if let Some(mut entry) = slots[old].take() {
                entry.parent.owner = entry.parent.owner.map(|o| new_index[o]);
                self.entries.push(entry);
            }
        }
    }

    /// Number of extracted blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the circuit had no blocks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Blocks in pre-order.
    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    /// Mutable blocks in pre-order.
    pub fn entries_mut(&mut self) -> &mut [BlockEntry] {
        &mut self.entries
    }

    /// Reinsert every block into its parent, innermost first.
    pub fn write_back(mut self, dag: &mut CircuitDag) -> CompileResult<()> {
        while let Some(entry) = self.entries.pop() {
            let block = entry.dag.to_block();
            let owner_dag = match entry.parent.owner {
                None => &mut *dag,
                Some(idx) => &mut self.entries[idx].dag,
            };
            put_block(owner_dag, entry.parent.node, entry.parent.block, block)?;
        }
        Ok(())
    }
}

fn take_blocks(
    dag: &mut CircuitDag,
    owner: Option<usize>,
    map: impl Fn(u32) -> u32,
    depth: usize,
) -> CompileResult<Vec<BlockEntry>> {
    let nodes: Vec<NodeIndex> = dag
        .topological_ops()
        .filter(|(_, inst)| inst.is_control_flow())
        .map(|(node, _)| node)
        .collect();
    let mut out = Vec::new();
    for node in nodes {
        let inst = dag.get_instruction_mut(node).ok_or(IrError::InvalidNode)?;
        let qubit_map: Vec<u32> = inst.qubits.iter().map(|q| map(q.0)).collect();
        let Some(cf) = inst.as_control_flow_mut() else {
            continue;
        };
        for (i, block) in cf.blocks.iter_mut().enumerate() {
            let placeholder = Block::new(block.num_qubits, block.num_clbits);
            let taken = std::mem::replace(block, placeholder);
            out.push(BlockEntry {
                dag: CircuitDag::from_block(&taken)?,
                parent: BlockParent {
                    owner,
                    node,
                    block: i,
                },
                qubit_map: qubit_map.clone(),
                depth,
            });
        }
    }
    Ok(out)
}

fn put_block(dag: &mut CircuitDag, node: NodeIndex, index: usize, block: Block) -> CompileResult<()> {
    let slot = dag
        .get_instruction_mut(node)
        .and_then(Instruction::as_control_flow_mut)
        .and_then(|cf| cf.blocks.get_mut(index))
        .ok_or(IrError::InvalidNode)?;
    *slot = block;
    Ok(())
}

/// Visit every operation, including those inside nested blocks, in
/// depth-first pre-order.
///
/// The visitor receives the instruction, its qubits translated to the
/// top-level circuit, and its nesting depth (0 at top level). Control-flow
/// operations are visited before their blocks.
pub fn walk_operations<F>(dag: &CircuitDag, mut visit: F) -> CompileResult<()>
where
    F: FnMut(&Instruction, &[u32], usize) -> CompileResult<()>,
{
    let root: Vec<&Instruction> = dag.topological_ops().map(|(_, inst)| inst).collect();
    // `None` marks the top level, whose qubit ids are used as-is.
    let mut stack: Vec<(std::vec::IntoIter<&Instruction>, Option<Vec<u32>>)> =
        vec![(root.into_iter(), None)];

    loop {
        let Some(depth) = stack.len().checked_sub(1) else {
            break;
        };
        let Some((iter, map)) = stack.last_mut() else {
            break;
        };
        let Some(inst) = iter.next() else {
            stack.pop();
            continue;
        };
        let qubits: Vec<u32> = match map {
            None => inst.qubits.iter().map(|q| q.0).collect(),
            Some(map) => inst
                .qubits
                .iter()
                .map(|q| map.get(q.index()).copied().unwrap_or(q.0))
                .collect(),
        };
        visit(inst, &qubits, depth)?;
        if let Some(cf) = inst.as_control_flow() {
            for block in cf.blocks.iter().rev() {
                let refs: Vec<&Instruction> = block.instructions.iter().collect();
                stack.push((refs.into_iter(), Some(qubits.clone())));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpipe_ir::{Circuit, ClassicalCondition, ClbitId, QubitId};

    fn nested() -> Circuit {
        let mut inner = Circuit::with_size("inner", 1, 0);
        inner.z(QubitId(0)).unwrap();

        let mut body = Circuit::with_size("body", 2, 1);
        body.cx(QubitId(0), QubitId(1)).unwrap();
        body.for_loop(vec![0, 1], &inner, &[QubitId(1)], &[]).unwrap();

        let mut circuit = Circuit::with_size("outer", 3, 1);
        circuit.h(QubitId(0)).unwrap();
        circuit.measure(QubitId(0), ClbitId(0)).unwrap();
        circuit
            .if_else(
                ClassicalCondition::new(ClbitId(0), true),
                &body,
                None,
                &[QubitId(2), QubitId(1)],
                &[ClbitId(0)],
            )
            .unwrap();
        circuit
    }

    #[test]
    fn test_walk_maps_qubits_through_parents() {
        let circuit = nested();
        let mut seen = Vec::new();
        walk_operations(circuit.dag(), |inst, qubits, depth| {
            seen.push((inst.name().to_string(), qubits.to_vec(), depth));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                ("h".to_string(), vec![0], 0),
                ("measure".to_string(), vec![0], 0),
                ("if_else".to_string(), vec![2, 1], 0),
                ("cx".to_string(), vec![2, 1], 1),
                ("for_loop".to_string(), vec![1], 1),
                ("z".to_string(), vec![1], 2),
            ]
        );
    }

    #[test]
    fn test_extract_and_write_back_round_trip() {
        let circuit = nested();
        let mut dag = circuit.dag().clone();
        let arena = BlockArena::extract(&mut dag).unwrap();

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.entries()[0].parent.owner, None);
        assert_eq!(arena.entries()[0].qubit_map, vec![2, 1]);
        assert_eq!(arena.entries()[1].parent.owner, Some(0));
        assert_eq!(arena.entries()[1].qubit_map, vec![1]);
        assert_eq!(arena.entries()[1].depth, 2);
        assert_eq!(dag.count_ops_recursive().get("cx"), None);

        arena.write_back(&mut dag).unwrap();
        assert_eq!(dag.count_ops_recursive(), circuit.dag().count_ops_recursive());
    }

    #[test]
    fn test_edits_survive_write_back() {
        let circuit = nested();
        let mut dag = circuit.dag().clone();
        let mut arena = BlockArena::extract(&mut dag).unwrap();
        for entry in arena.entries_mut() {
            let nodes = entry.dag.op_nodes();
            for node in nodes {
                if entry.dag.get_instruction(node).is_some_and(|i| i.name() == "z") {
                    entry.dag.remove_op(node).unwrap();
                }
            }
        }
        arena.write_back(&mut dag).unwrap();
        assert_eq!(dag.count_ops_recursive().get("z"), None);
        assert_eq!(dag.count_ops_recursive().get("for_loop"), Some(&1));
    }
}
