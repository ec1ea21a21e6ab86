//! Basis translation passes.
//!
//! [`BasisTranslator`] rewrites every operation outside the target basis
//! by searching the [`EquivalenceLibrary`] for the cheapest chain of rules
//! into the basis, folding that chain into one template per source gate,
//! and splicing the bound template over the original node.
//!
//! With a [`Target`], operations restricted to some qubit tuples are
//! translated per tuple: a gate on a tuple that carries non-global
//! operations is searched against the global basis plus the names defined
//! on that tuple and its subsets.

mod compose;
mod search;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use qpipe_ir::{CircuitDag, Instruction, NodeIndex};

use crate::control_flow::{BlockArena, walk_operations};
use crate::equivalence::{EquivalenceLibrary, EquivalenceRule, Signature};
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{Property, PropertySet};
use crate::target::Target;

use compose::{compose_transforms, instantiate};
use search::basis_search;

/// Operations every basis implicitly contains when no [`Target`] is given.
const IMPLICIT_BASIS: [&str; 4] = ["measure", "reset", "barrier", "delay"];

/// Translates operations into the target basis.
pub struct BasisTranslator {
    library: Arc<EquivalenceLibrary>,
    target_basis: Option<BTreeSet<String>>,
    target: Option<Arc<Target>>,
    min_qubits: usize,
}

impl BasisTranslator {
    /// Translate into `target_basis` using `library`.
    pub fn new(library: Arc<EquivalenceLibrary>, target_basis: Option<BTreeSet<String>>) -> Self {
        Self {
            library,
            target_basis,
            target: None,
            min_qubits: 0,
        }
    }

    /// Translate against a full device description instead of a name list.
    #[must_use]
    pub fn with_target(mut self, target: Arc<Target>) -> Self {
        self.target = Some(target);
        self
    }

    /// Leave operations on fewer than `min_qubits` qubits untouched.
    #[must_use]
    pub fn with_min_qubits(mut self, min_qubits: usize) -> Self {
        self.min_qubits = min_qubits;
        self
    }

    /// Fail if a control-flow construct is missing from the basis.
    fn check_control_flow(&self, dag: &CircuitDag) -> CompileResult<()> {
        walk_operations(dag, |inst, _, _| {
            if !inst.is_control_flow() {
                return Ok(());
            }
            let name = inst.name();
            let supported = match (&self.target, &self.target_basis) {
                (Some(target), _) => target.contains(name),
                (None, Some(basis)) => basis.contains(name),
                (None, None) => true,
            };
            if supported {
                Ok(())
            } else {
                Err(CompileError::UnsupportedControlFlow {
                    name: name.to_string(),
                })
            }
        })
    }

    fn global_basis(&self) -> BTreeSet<String> {
        match &self.target {
            Some(target) => {
                let mut names = target.operation_names();
                for name in target.non_global_operation_names() {
                    names.remove(name);
                }
                names.insert("barrier".to_string());
                names
            }
            None => {
                let mut names = self.target_basis.clone().unwrap_or_default();
                names.extend(IMPLICIT_BASIS.iter().map(|s| (*s).to_string()));
                names
            }
        }
    }

    /// Non-global names usable on `qargs`: those defined on exactly that
    /// tuple and, for multi-qubit tuples, on any of its subsets.
    fn local_names(&self, qargs: &[u32]) -> BTreeSet<String> {
        let Some(target) = &self.target else {
            return BTreeSet::new();
        };
        let index = target.qargs_with_non_global_operations();
        if qargs.len() == 1 {
            return index.get(qargs).cloned().unwrap_or_default();
        }
        let set: BTreeSet<u32> = qargs.iter().copied().collect();
        index
            .iter()
            .filter(|(key, _)| key.iter().all(|q| set.contains(q)))
            .flat_map(|(_, names)| names.iter().cloned())
            .collect()
    }

    /// Whether a node on `qargs` must be translated with a per-tuple basis.
    fn is_local(&self, qargs: &[u32]) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        let index = target.qargs_with_non_global_operations();
        if index.contains_key(qargs) {
            return true;
        }
        let set: BTreeSet<u32> = qargs.iter().copied().collect();
        index
            .keys()
            .any(|key| key.len() < qargs.len() && key.iter().all(|q| set.contains(q)))
    }

    fn keeps(&self, inst: &Instruction, qargs: &[u32], global: &BTreeSet<String>) -> bool {
        if inst.is_control_flow() || inst.qubits.len() < self.min_qubits {
            return true;
        }
        let name = inst.name();
        if global.contains(name) {
            return true;
        }
        self.target.as_ref().is_some_and(|target| {
            target
                .qargs_with_non_global_operations()
                .get(qargs)
                .is_some_and(|names| names.contains(name))
        })
    }
}

/// One DAG to rewrite and how its qubits map to the top-level circuit.
struct Context<'a> {
    dag: &'a mut CircuitDag,
    qubit_map: Option<&'a [u32]>,
}

impl Context<'_> {
    fn outer(&self, inst: &Instruction) -> Vec<u32> {
        inst.qubits
            .iter()
            .map(|q| match self.qubit_map {
                Some(map) => map.get(q.index()).copied().unwrap_or(q.0),
                None => q.0,
            })
            .collect()
    }
}

/// Composed templates for the global basis and for each local tuple.
#[derive(Default)]
struct Translations {
    global: FxHashMap<Signature, EquivalenceRule>,
    local: BTreeMap<Vec<u32>, FxHashMap<Signature, EquivalenceRule>>,
    num_transforms: usize,
}

impl Pass for BasisTranslator {
    fn name(&self) -> &'static str {
        "BasisTranslator"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    #[instrument(skip_all, name = "basis_translator")]
    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
        if self.target.is_none() && self.target_basis.is_none() {
            return Ok(());
        }
        if self.min_qubits == 0 {
            self.check_control_flow(dag)?;
        }

        let global_basis = self.global_basis();
        let Some(translations) = self.plan(dag, &global_basis)? else {
            debug!("All operations already in the target basis");
            return Ok(());
        };

        let mut arena = BlockArena::extract(dag)?;
        let mut substituted = self.rewrite(
            Context {
                dag: &mut *dag,
                qubit_map: None,
            },
            &global_basis,
            &translations,
        )?;
        for entry in arena.entries_mut() {
            // A block's phase is global within the branch that runs it.
            substituted += self.rewrite(
                Context {
                    dag: &mut entry.dag,
                    qubit_map: Some(&entry.qubit_map),
                },
                &global_basis,
                &translations,
            )?;
        }
        arena.write_back(dag)?;
        debug!("Translated {substituted} operations");
        Ok(())
    }
}

impl BasisTranslator {
    /// Collect source signatures and compose their translations.
    ///
    /// Returns `None` when nothing needs translating.
    fn plan(
        &self,
        dag: &CircuitDag,
        global_basis: &BTreeSet<String>,
    ) -> CompileResult<Option<Translations>> {
        let mut global_source: BTreeSet<Signature> = BTreeSet::new();
        // First qubits each global signature was seen on, for error reports.
        let mut first_qargs: FxHashMap<Signature, Vec<u32>> = FxHashMap::default();
        let mut local_source: BTreeMap<Vec<u32>, BTreeSet<Signature>> = BTreeMap::new();
        walk_operations(dag, |inst, qargs, _| {
            if self.keeps(inst, qargs, global_basis) {
                return Ok(());
            }
            let signature = Signature::of(inst);
            if self.is_local(qargs) {
                local_source
                    .entry(qargs.to_vec())
                    .or_default()
                    .insert(signature);
            } else {
                first_qargs
                    .entry(signature.clone())
                    .or_insert_with(|| qargs.to_vec());
                global_source.insert(signature);
            }
            Ok(())
        })?;

        if global_source.is_empty() && local_source.is_empty() {
            return Ok(None);
        }

        let mut translations = Translations::default();
        if !global_source.is_empty() {
            let transforms =
                basis_search(&self.library, &global_source, global_basis).map_err(|sig| {
                    let qargs = first_qargs.get(&sig).map(Vec::as_slice).unwrap_or_default();
                    unreachable_error(&sig, qargs, global_basis)
                })?;
            translations.num_transforms += transforms.len();
            translations.global = compose_transforms(&self.library, &global_source, &transforms)?;
        }
        for (qargs, source) in local_source {
            let mut basis = global_basis.clone();
            basis.extend(self.local_names(&qargs));
            let transforms = basis_search(&self.library, &source, &basis)
                .map_err(|sig| unreachable_error(&sig, &qargs, &basis))?;
            translations.num_transforms += transforms.len();
            let composed = compose_transforms(&self.library, &source, &transforms)?;
            translations.local.insert(qargs, composed);
        }
        Ok(Some(translations))
    }

    /// Replace untranslated nodes of one DAG until none are left.
    fn rewrite(
        &self,
        ctx: Context<'_>,
        global_basis: &BTreeSet<String>,
        translations: &Translations,
    ) -> CompileResult<usize> {
        let mut total = 0;
        for _ in 0..=translations.num_transforms {
            let nodes: Vec<NodeIndex> = ctx.dag.topological_op_nodes();
            let mut substituted = 0;
            for node in nodes {
                let Some(inst) = ctx.dag.get_instruction(node) else {
                    continue;
                };
                let qargs = ctx.outer(inst);
                if self.keeps(inst, &qargs, global_basis) {
                    continue;
                }
                let signature = Signature::of(inst);
                let table = if self.is_local(&qargs) {
                    translations.local.get(&qargs)
                } else {
                    Some(&translations.global)
                };
                let Some(template) = table.and_then(|t| t.get(&signature)) else {
                    continue;
                };
                let (replacement, phase) = instantiate(template, &inst.qubits, &inst.params())?;
                ctx.dag.substitute_node(node, replacement)?;
                match (ctx.qubit_map, phase.as_f64()) {
                    (None, Some(value)) => ctx.dag.add_global_phase(value),
                    _ if phase.is_zero() => {}
                    (None, None) => {
                        debug!("Dropping symbolic global phase {phase} of {signature}");
                    }
                    (Some(_), _) => {
                        debug!("Dropping global phase {phase} of {signature} inside a block");
                    }
                }
                substituted += 1;
            }
            total += substituted;
            if substituted == 0 {
                break;
            }
        }
        Ok(total)
    }
}

fn unreachable_error(
    signature: &Signature,
    qargs: &[u32],
    basis: &BTreeSet<String>,
) -> CompileError {
    CompileError::BasisNotReachable {
        gate: signature.name.clone(),
        qubits: qargs.to_vec(),
        target_basis: basis.iter().cloned().collect(),
    }
}

/// Decomposes operations on three or more qubits ahead of routing.
///
/// Two-qubit and single-qubit operations are left alone. Without a basis
/// the decomposition stops at the standard one- and two-qubit gates.
pub struct Unroll3qOrMore {
    inner: BasisTranslator,
}

impl Unroll3qOrMore {
    /// Decompose into `basis`, or into every standard gate on at most two
    /// qubits when `None`.
    pub fn new(library: Arc<EquivalenceLibrary>, basis: Option<BTreeSet<String>>) -> Self {
        let basis = basis.unwrap_or_else(small_standard_gates);
        Self {
            inner: BasisTranslator::new(library, Some(basis)).with_min_qubits(3),
        }
    }
}

fn small_standard_gates() -> BTreeSet<String> {
    [
        "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "sx", "sxdg", "rx", "ry", "rz", "p",
        "u", "prx", "cx", "cy", "cz", "ch", "ecr", "swap", "iswap", "crx", "cry", "crz", "cp",
        "rxx", "ryy", "rzz",
    ]
    .iter()
    .filter(|name| Signature::standard(name).is_some_and(|s| s.num_qubits <= 2))
    .map(|s| (*s).to_string())
    .collect()
}

impl Pass for Unroll3qOrMore {
    fn name(&self) -> &'static str {
        "Unroll3qOrMore"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        self.inner.run(dag, properties)
    }
}

/// Records whether every operation is in the target basis.
///
/// Operations inside control-flow blocks are checked on the top-level
/// qubits they end up on.
pub struct GatesInBasis {
    target_basis: Option<BTreeSet<String>>,
    target: Option<Arc<Target>>,
}

impl GatesInBasis {
    /// Check against a name list, a target, or both (the target wins).
    pub fn new(target_basis: Option<BTreeSet<String>>, target: Option<Arc<Target>>) -> Self {
        Self {
            target_basis,
            target,
        }
    }
}

impl Pass for GatesInBasis {
    fn name(&self) -> &'static str {
        "GatesInBasis"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        let mut all_in = true;
        walk_operations(dag, |inst, qargs, _| {
            let name = inst.name();
            let ok = match (&self.target, &self.target_basis) {
                (Some(target), _) if inst.is_control_flow() => target.contains(name),
                (Some(target), _) => target.supported(name, qargs),
                (None, Some(basis)) => {
                    basis.contains(name) || IMPLICIT_BASIS.contains(&name)
                }
                (None, None) => true,
            };
            all_in &= ok;
            Ok(())
        })?;
        properties.insert(Property::AllGatesInBasis(all_in));
        Ok(())
    }

    fn should_run(&self, _dag: &CircuitDag, _properties: &PropertySet) -> bool {
        self.target.is_some() || self.target_basis.is_some()
    }
}
