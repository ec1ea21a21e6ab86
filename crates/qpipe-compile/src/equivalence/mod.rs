//! Gate rewrite rules.
//!
//! The [`EquivalenceLibrary`] is a directed multigraph held in a petgraph
//! arena: nodes are gate [`Signature`]s, and each [`EquivalenceRule`] adds
//! one edge from the gate it rewrites to every distinct signature its
//! template produces. Basis translation searches this graph backwards from
//! the target basis.

mod standard;

use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use qpipe_ir::{Instruction, ParameterExpression, StandardGate};

use crate::error::{CompileError, CompileResult};

/// Name, qubit count and parameter count of a gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    /// Gate name.
    pub name: String,
    /// Qubit arity.
    pub num_qubits: u32,
    /// Parameter arity.
    pub num_params: usize,
}

impl Signature {
    /// Create a signature.
    pub fn new(name: impl Into<String>, num_qubits: u32, num_params: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_params,
        }
    }

    /// Signature of a standard gate name, `None` for unknown names.
    pub fn standard(name: &str) -> Option<Self> {
        let num_params = StandardGate::num_params_for(name)?;
        let params = vec![ParameterExpression::constant(0.0); num_params];
        let gate = StandardGate::from_name(name, &params).ok().flatten()?;
        Some(Self::new(name, gate.num_qubits(), num_params))
    }

    /// Signature of an instruction as it appears in a circuit.
    pub fn of(instruction: &Instruction) -> Self {
        Self::new(
            instruction.name(),
            instruction.num_qubits(),
            instruction.params().len(),
        )
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}q/{}p", self.name, self.num_qubits, self.num_params)
    }
}

/// One operation of a rule template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateOp {
    /// Gate name.
    pub name: String,
    /// Template-local qubit indices.
    pub qubits: Vec<u32>,
    /// Parameters, written over the rule's formal names.
    #[serde(default)]
    pub params: Vec<ParameterExpression>,
}

impl TemplateOp {
    /// Signature this op produces.
    pub fn signature(&self) -> Signature {
        Signature::new(
            self.name.clone(),
            u32::try_from(self.qubits.len()).unwrap_or(u32::MAX),
            self.params.len(),
        )
    }
}

/// A circuit template equivalent to one gate signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceRule {
    /// Formal parameter names, bound positionally to the gate's parameters.
    #[serde(default)]
    pub params: Vec<String>,
    /// Number of template qubits.
    pub num_qubits: u32,
    /// Phase picked up by the rewrite.
    #[serde(default = "zero_phase")]
    pub global_phase: ParameterExpression,
    /// Operations in program order.
    pub ops: Vec<TemplateOp>,
}

fn zero_phase() -> ParameterExpression {
    ParameterExpression::constant(0.0)
}

impl EquivalenceRule {
    /// An empty template over `num_qubits` qubits.
    pub fn new(num_qubits: u32) -> Self {
        Self {
            params: vec![],
            num_qubits,
            global_phase: zero_phase(),
            ops: vec![],
        }
    }

    /// Declare formal parameters.
    #[must_use]
    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Set the global phase.
    #[must_use]
    pub fn with_phase(mut self, phase: ParameterExpression) -> Self {
        self.global_phase = phase;
        self
    }

    /// Append an operation.
    #[must_use]
    pub fn op(
        mut self,
        name: &str,
        qubits: &[u32],
        params: impl IntoIterator<Item = ParameterExpression>,
    ) -> Self {
        self.ops.push(TemplateOp {
            name: name.to_string(),
            qubits: qubits.to_vec(),
            params: params.into_iter().collect(),
        });
        self
    }

    /// Rule cost: the number of template operations, at least 1.
    pub fn cost(&self) -> usize {
        self.ops.len().max(1)
    }

    /// Distinct signatures produced by the template, sorted.
    pub fn produced_signatures(&self) -> Vec<Signature> {
        let mut sigs: Vec<Signature> = self.ops.iter().map(TemplateOp::signature).collect();
        sigs.sort();
        sigs.dedup();
        sigs
    }
}

/// Node weight of the library graph.
#[derive(Debug, Clone)]
pub struct SignatureNode {
    /// Signature this node stands for.
    pub signature: Signature,
    /// Indices of the rules rewriting this signature.
    pub rules: Vec<usize>,
}

/// Edge weight of the library graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleEdge {
    /// Index into the library's rule table.
    pub rule: usize,
    /// Cost of the rule.
    pub cost: usize,
}

/// Directed multigraph of gate rewrite rules.
#[derive(Debug, Clone, Default)]
pub struct EquivalenceLibrary {
    graph: DiGraph<SignatureNode, RuleEdge>,
    index: FxHashMap<Signature, NodeIndex>,
    rules: Vec<(Signature, EquivalenceRule)>,
}

impl EquivalenceLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in library covering every standard gate.
    pub fn standard() -> Self {
        standard::build()
    }

    fn node_for(&mut self, signature: &Signature) -> NodeIndex {
        if let Some(&idx) = self.index.get(signature) {
            return idx;
        }
        let idx = self.graph.add_node(SignatureNode {
            signature: signature.clone(),
            rules: vec![],
        });
        self.index.insert(signature.clone(), idx);
        idx
    }

    /// Register a rule rewriting `signature`.
    ///
    /// The template must have the signature's qubit and parameter arity,
    /// every op must stay inside the template's qubits, and every symbol
    /// must be one of the rule's formal parameters.
    pub fn add_equivalence(
        &mut self,
        signature: Signature,
        rule: EquivalenceRule,
    ) -> CompileResult<()> {
        let invalid = |reason: String| {
            CompileError::Configuration(format!("Invalid rule for {signature}: {reason}"))
        };
        if rule.num_qubits != signature.num_qubits {
            return Err(invalid(format!(
                "template spans {} qubits",
                rule.num_qubits
            )));
        }
        if rule.params.len() != signature.num_params {
            return Err(invalid(format!(
                "template declares {} parameters",
                rule.params.len()
            )));
        }
        let formals: FxHashSet<&str> = rule.params.iter().map(String::as_str).collect();
        for op in &rule.ops {
            if let Some(q) = op.qubits.iter().find(|&&q| q >= rule.num_qubits) {
                return Err(invalid(format!("op '{}' uses qubit {q}", op.name)));
            }
            let free = op
                .params
                .iter()
                .chain(std::iter::once(&rule.global_phase))
                .flat_map(ParameterExpression::symbols)
                .find(|s| !formals.contains(s.as_str()));
            if let Some(symbol) = free {
                return Err(invalid(format!("unbound symbol '{symbol}'")));
            }
        }

        let source = self.node_for(&signature);
        let rule_idx = self.rules.len();
        let cost = rule.cost();
        for produced in rule.produced_signatures() {
            let target = self.node_for(&produced);
            self.graph.add_edge(
                source,
                target,
                RuleEdge {
                    rule: rule_idx,
                    cost,
                },
            );
        }
        self.graph[source].rules.push(rule_idx);
        self.rules.push((signature, rule));
        Ok(())
    }

    /// Check whether any rule rewrites `signature`.
    pub fn has_entry(&self, signature: &Signature) -> bool {
        self.index
            .get(signature)
            .is_some_and(|&idx| !self.graph[idx].rules.is_empty())
    }

    /// Edges leaving `signature`: `(produced signature, rule cost, rule)`.
    pub fn get_rules_for<'a>(
        &'a self,
        signature: &Signature,
    ) -> impl Iterator<Item = (&'a Signature, usize, &'a EquivalenceRule)> + 'a {
        self.index
            .get(signature)
            .map(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Outgoing)
                    .map(move |e| {
                        let RuleEdge { rule, cost } = *e.weight();
                        (&self.graph[e.target()].signature, cost, &self.rules[rule].1)
                    })
            })
            .into_iter()
            .flatten()
    }

    /// Rules rewriting `signature`, in registration order.
    pub fn rules(&self, signature: &Signature) -> Vec<&EquivalenceRule> {
        self.index
            .get(signature)
            .map(|&idx| {
                self.graph[idx]
                    .rules
                    .iter()
                    .map(|&r| &self.rules[r].1)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rule by index.
    pub fn rule(&self, index: usize) -> Option<&EquivalenceRule> {
        self.rules.get(index).map(|(_, rule)| rule)
    }

    /// Every signature known to the library, sorted.
    pub fn signatures(&self) -> Vec<&Signature> {
        let mut sigs: Vec<&Signature> = self.index.keys().collect();
        sigs.sort();
        sigs
    }

    /// Total number of rules.
    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    /// Node handle of a signature.
    pub fn node_index(&self, signature: &Signature) -> Option<NodeIndex> {
        self.index.get(signature).copied()
    }

    /// Underlying arena graph.
    pub fn graph(&self) -> &DiGraph<SignatureNode, RuleEdge> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_of_standard_gates() {
        assert_eq!(Signature::standard("cx"), Some(Signature::new("cx", 2, 0)));
        assert_eq!(Signature::standard("u"), Some(Signature::new("u", 1, 3)));
        assert_eq!(Signature::standard("warp"), None);
    }

    #[test]
    fn test_add_equivalence_builds_edges() {
        let mut lib = EquivalenceLibrary::new();
        let rule = EquivalenceRule::new(2)
            .op("h", &[1], [])
            .op("cx", &[0, 1], [])
            .op("h", &[1], []);
        lib.add_equivalence(Signature::new("cz", 2, 0), rule).unwrap();

        let edges: Vec<_> = lib.get_rules_for(&Signature::new("cz", 2, 0)).collect();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|(_, cost, _)| *cost == 3));
        assert!(lib.has_entry(&Signature::new("cz", 2, 0)));
        assert!(!lib.has_entry(&Signature::new("h", 1, 0)));
        assert_eq!(lib.signatures().len(), 3);
    }

    #[test]
    fn test_rejects_malformed_rules() {
        let mut lib = EquivalenceLibrary::new();
        let out_of_range = EquivalenceRule::new(1).op("x", &[1], []);
        assert!(
            lib.add_equivalence(Signature::new("y", 1, 0), out_of_range)
                .is_err()
        );

        let unbound = EquivalenceRule::new(1)
            .with_params(&["theta"])
            .op("rz", &[0], [ParameterExpression::symbol("phi")]);
        assert!(
            lib.add_equivalence(Signature::new("p", 1, 1), unbound)
                .is_err()
        );

        let wrong_arity = EquivalenceRule::new(2).op("cx", &[0, 1], []);
        assert!(
            lib.add_equivalence(Signature::new("h", 1, 0), wrong_arity)
                .is_err()
        );
        assert_eq!(lib.num_rules(), 0);
    }

    #[test]
    fn test_standard_library_covers_standard_gates() {
        let lib = EquivalenceLibrary::standard();
        for name in [
            "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "sx", "sxdg", "rx", "ry", "rz", "p",
            "u", "prx", "cx", "cy", "cz", "ch", "ecr", "swap", "iswap", "crx", "cry", "crz", "cp",
            "rxx", "ryy", "rzz", "ccx", "ccz", "cswap",
        ] {
            let sig = Signature::standard(name).unwrap();
            assert!(lib.has_entry(&sig), "no rule for {name}");
        }
    }
}
