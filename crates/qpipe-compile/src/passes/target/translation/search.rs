//! Shortest rewrite paths through the equivalence graph.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::trace;

use crate::equivalence::{EquivalenceLibrary, RuleEdge, Signature};

/// Rewrite `signature` with library rule `rule`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BasisTransform {
    pub signature: Signature,
    pub rule: usize,
}

/// Find rules that take every source signature into `target`.
///
/// Runs Dijkstra backwards from the target gates. A node's weight is the
/// number of target operations it expands to; target gates weigh 1 and
/// signatures with an empty rule weigh 0. A rule only becomes usable once
/// every signature it produces has been settled.
///
/// Returns the transforms in application order (outermost first), or the
/// first source signature, in sorted order, that cannot be reached.
pub(crate) fn basis_search(
    library: &EquivalenceLibrary,
    source: &BTreeSet<Signature>,
    target: &BTreeSet<String>,
) -> Result<Vec<BasisTransform>, Signature> {
    let mut unsettled: BTreeSet<&Signature> = source
        .iter()
        .filter(|sig| !target.contains(&sig.name))
        .collect();
    if unsettled.is_empty() {
        return Ok(vec![]);
    }

    let graph = library.graph();
    let mut rule_pending = vec![0usize; library.num_rules()];
    for edge in graph.edge_references() {
        rule_pending[edge.weight().rule] += 1;
    }

    let n = graph.node_count();
    let mut weight: Vec<Option<usize>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut is_seed = vec![false; n];
    let mut via: Vec<Option<usize>> = vec![None; n];
    let mut heap: BinaryHeap<Reverse<(usize, NodeIndex)>> = BinaryHeap::new();

    for node in graph.node_indices() {
        if target.contains(&graph[node].signature.name) {
            is_seed[node.index()] = true;
            weight[node.index()] = Some(1);
            heap.push(Reverse((1, node)));
            continue;
        }
        // A rule with an empty template expands to nothing and needs no
        // produced signature settled first.
        let empty = graph[node]
            .rules
            .iter()
            .copied()
            .find(|&rule| library.rule(rule).is_some_and(|r| r.ops.is_empty()));
        if let Some(rule) = empty {
            weight[node.index()] = Some(0);
            via[node.index()] = Some(rule);
            heap.push(Reverse((0, node)));
        }
    }

    let mut discovered: Vec<NodeIndex> = Vec::new();
    while let Some(Reverse((w, node))) = heap.pop() {
        let i = node.index();
        if settled[i] || weight[i] != Some(w) {
            continue;
        }
        settled[i] = true;
        let signature = &graph[node].signature;
        trace!("Settled {signature} at weight {w}");
        if via[i].is_some() {
            discovered.push(node);
        }
        unsettled.remove(signature);
        if unsettled.is_empty() {
            break;
        }

        for edge in graph.edges_directed(node, Direction::Incoming) {
            let RuleEdge { rule, .. } = *edge.weight();
            rule_pending[rule] = rule_pending[rule].saturating_sub(1);
            let src = edge.source();
            let s = src.index();
            if rule_pending[rule] > 0 || is_seed[s] || settled[s] {
                continue;
            }
            let Some(candidate) = rule_weight(library, rule, &weight) else {
                continue;
            };
            if weight[s].is_none_or(|current| candidate < current) {
                weight[s] = Some(candidate);
                via[s] = Some(rule);
                heap.push(Reverse((candidate, src)));
            }
        }
    }

    if let Some(first) = unsettled.first() {
        return Err((*first).clone());
    }

    Ok(discovered
        .into_iter()
        .rev()
        .filter_map(|node| {
            Some(BasisTransform {
                signature: graph[node].signature.clone(),
                rule: via[node.index()]?,
            })
        })
        .collect())
}

/// Expanded size of a rule whose produced signatures are all settled.
fn rule_weight(library: &EquivalenceLibrary, rule: usize, weight: &[Option<usize>]) -> Option<usize> {
    library
        .rule(rule)?
        .ops
        .iter()
        .map(|op| {
            library
                .node_index(&op.signature())
                .and_then(|node| weight[node.index()])
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::EquivalenceRule;

    fn basis(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn sources(names: &[&str]) -> BTreeSet<Signature> {
        names
            .iter()
            .map(|n| Signature::standard(n).unwrap())
            .collect()
    }

    #[test]
    fn test_nothing_to_do_when_source_is_in_basis() {
        let lib = EquivalenceLibrary::standard();
        let transforms =
            basis_search(&lib, &sources(&["cx", "rz"]), &basis(&["cx", "rz", "sx"])).unwrap();
        assert!(transforms.is_empty());
    }

    #[test]
    fn test_cz_reaches_cx_basis_in_one_step() {
        let lib = EquivalenceLibrary::standard();
        let transforms =
            basis_search(&lib, &sources(&["cz"]), &basis(&["cx", "h"])).unwrap();
        assert_eq!(transforms[0].signature.name, "cz");
        assert!(transforms.iter().all(|t| t.signature.name != "cx"));
    }

    #[test]
    fn test_transforms_are_outermost_first() {
        let lib = EquivalenceLibrary::standard();
        let transforms = basis_search(&lib, &sources(&["h"]), &basis(&["rz", "sx"])).unwrap();
        assert_eq!(
            transforms.first().map(|t| t.signature.name.as_str()),
            Some("h")
        );
        for t in &transforms {
            assert!(!["rz", "sx"].contains(&t.signature.name.as_str()));
        }
    }

    #[test]
    fn test_unreachable_reports_first_sorted_signature() {
        let mut lib = EquivalenceLibrary::standard();
        lib.add_equivalence(
            Signature::new("zz_custom", 2, 0),
            EquivalenceRule::new(2).op("mystery", &[0, 1], []),
        )
        .unwrap();
        let mut src = sources(&["h"]);
        src.insert(Signature::new("zz_custom", 2, 0));
        src.insert(Signature::new("aa_custom", 1, 0));

        let err = basis_search(&lib, &src, &basis(&["rz", "sx", "cx"])).unwrap_err();
        assert_eq!(err.name, "aa_custom");
    }

    #[test]
    fn test_rule_waits_for_all_produced_signatures() {
        // `two` needs both `a` and `b`; `b` is only reachable through `c`.
        let mut lib = EquivalenceLibrary::new();
        lib.add_equivalence(
            Signature::new("two", 1, 0),
            EquivalenceRule::new(1).op("a", &[0], []).op("b", &[0], []),
        )
        .unwrap();
        lib.add_equivalence(
            Signature::new("b", 1, 0),
            EquivalenceRule::new(1).op("c", &[0], []).op("c", &[0], []),
        )
        .unwrap();

        let src: BTreeSet<Signature> = [Signature::new("two", 1, 0)].into_iter().collect();
        let transforms = basis_search(&lib, &src, &basis(&["a", "c"])).unwrap();
        let names: Vec<&str> = transforms.iter().map(|t| t.signature.name.as_str()).collect();
        assert_eq!(names, ["two", "b"]);

        assert!(basis_search(&lib, &src, &basis(&["a"])).is_err());
    }

    #[test]
    fn test_empty_rule_settles_at_weight_zero() {
        let mut lib = EquivalenceLibrary::standard();
        lib.add_equivalence(Signature::new("noop", 1, 0), EquivalenceRule::new(1))
            .unwrap();
        // `wrap` only reaches the basis through `noop`.
        lib.add_equivalence(
            Signature::new("wrap", 1, 0),
            EquivalenceRule::new(1).op("noop", &[0], []).op("x", &[0], []),
        )
        .unwrap();

        let src: BTreeSet<Signature> = [Signature::new("noop", 1, 0), Signature::new("wrap", 1, 0)]
            .into_iter()
            .collect();
        let transforms = basis_search(&lib, &src, &basis(&["x", "rz", "sx", "cx"])).unwrap();
        let names: Vec<&str> = transforms.iter().map(|t| t.signature.name.as_str()).collect();
        assert_eq!(names, ["wrap", "noop"]);
        let noop = &transforms[1];
        assert!(lib.rule(noop.rule).unwrap().ops.is_empty());
    }
}
