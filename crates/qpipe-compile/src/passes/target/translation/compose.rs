//! Folding a transform chain into one template per source gate.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use qpipe_ir::{Gate, Instruction, InstructionKind, ParameterExpression, QubitId};

use super::search::BasisTransform;
use crate::equivalence::{EquivalenceLibrary, EquivalenceRule, Signature, TemplateOp};
use crate::error::{CompileError, CompileResult};

/// Formal parameter name of slot `i` of a composed template.
fn formal(i: usize) -> String {
    format!("θ{i}")
}

/// Apply every transform, in order, to a placeholder template of each
/// source signature.
///
/// The result maps a source signature to a template over formals
/// `θ0..θk` that contains target gates only.
pub(crate) fn compose_transforms(
    library: &EquivalenceLibrary,
    source: &BTreeSet<Signature>,
    transforms: &[BasisTransform],
) -> CompileResult<FxHashMap<Signature, EquivalenceRule>> {
    let mut composed: FxHashMap<Signature, EquivalenceRule> = source
        .iter()
        .map(|sig| {
            let params: Vec<String> = (0..sig.num_params).map(formal).collect();
            let placeholder = EquivalenceRule {
                params: params.clone(),
                num_qubits: sig.num_qubits,
                global_phase: ParameterExpression::constant(0.0),
                ops: vec![TemplateOp {
                    name: sig.name.clone(),
                    qubits: (0..sig.num_qubits).collect(),
                    params: params.into_iter().map(ParameterExpression::symbol).collect(),
                }],
            };
            (sig.clone(), placeholder)
        })
        .collect();

    for transform in transforms {
        let rule = library.rule(transform.rule).ok_or_else(|| CompileError::PassFailed {
            name: "BasisTranslator".into(),
            reason: format!("rule {} vanished from the library", transform.rule),
        })?;
        for template in composed.values_mut() {
            if !template
                .ops
                .iter()
                .any(|op| op.signature() == transform.signature)
            {
                continue;
            }
            let mut ops = Vec::with_capacity(template.ops.len() + rule.ops.len());
            for op in template.ops.drain(..) {
                if op.signature() != transform.signature {
                    ops.push(op);
                    continue;
                }
                let binding: FxHashMap<String, ParameterExpression> =
                    rule.params.iter().cloned().zip(op.params.iter().cloned()).collect();
                let phase = rule.global_phase.substitute(&binding);
                template.global_phase = (template.global_phase.clone() + phase).simplify();
                for inner in &rule.ops {
                    ops.push(TemplateOp {
                        name: inner.name.clone(),
                        qubits: inner
                            .qubits
                            .iter()
                            .map(|&q| op.qubits[q as usize])
                            .collect(),
                        params: inner
                            .params
                            .iter()
                            .map(|p| p.substitute(&binding).simplify())
                            .collect(),
                    });
                }
            }
            template.ops = ops;
        }
    }
    Ok(composed)
}

/// Instantiate a composed template on concrete qubits and parameters.
///
/// Returns the instructions and the phase they add to the circuit.
pub(crate) fn instantiate(
    template: &EquivalenceRule,
    qubits: &[QubitId],
    params: &[ParameterExpression],
) -> CompileResult<(Vec<Instruction>, ParameterExpression)> {
    let binding: FxHashMap<String, ParameterExpression> = template
        .params
        .iter()
        .cloned()
        .zip(params.iter().cloned())
        .collect();

    let mut out = Vec::with_capacity(template.ops.len());
    for op in &template.ops {
        let op_qubits: Vec<QubitId> = op.qubits.iter().map(|&q| qubits[q as usize]).collect();
        let instruction = match op.name.as_str() {
            "barrier" => Instruction::barrier(op_qubits),
            "reset" => match op_qubits.as_slice() {
                [q] => Instruction::reset(*q),
                _ => return Err(bad_template(op)),
            },
            _ => {
                let op_params: Vec<ParameterExpression> = op
                    .params
                    .iter()
                    .map(|p| p.substitute(&binding).simplify())
                    .collect();
                let num_qubits = u32::try_from(op_qubits.len()).map_err(|_| bad_template(op))?;
                let gate = Gate::from_name(&op.name, num_qubits, op_params)?;
                Instruction {
                    kind: InstructionKind::Gate(gate),
                    qubits: op_qubits,
                    clbits: vec![],
                }
            }
        };
        out.push(instruction);
    }
    let phase = template.global_phase.substitute(&binding).simplify();
    Ok((out, phase))
}

fn bad_template(op: &TemplateOp) -> CompileError {
    CompileError::PassFailed {
        name: "BasisTranslator".into(),
        reason: format!("cannot instantiate template op '{}'", op.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::target::translation::search::basis_search;

    fn basis(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_placeholder_survives_without_transforms() {
        let lib = EquivalenceLibrary::standard();
        let sig = Signature::standard("rz").unwrap();
        let source: BTreeSet<Signature> = [sig.clone()].into_iter().collect();
        let composed = compose_transforms(&lib, &source, &[]).unwrap();
        let template = &composed[&sig];
        assert_eq!(template.ops.len(), 1);
        assert_eq!(template.ops[0].params, vec![ParameterExpression::symbol("θ0")]);
    }

    #[test]
    fn test_composed_template_uses_target_gates_only() {
        let lib = EquivalenceLibrary::standard();
        let source: BTreeSet<Signature> = ["h", "cz", "ry"]
            .iter()
            .map(|n| Signature::standard(n).unwrap())
            .collect();
        let target = basis(&["rz", "sx", "x", "cx"]);
        let transforms = basis_search(&lib, &source, &target).unwrap();
        let composed = compose_transforms(&lib, &source, &transforms).unwrap();

        for template in composed.values() {
            for op in &template.ops {
                assert!(target.contains(&op.name), "unexpected {}", op.name);
            }
        }
    }

    #[test]
    fn test_instantiate_binds_params_and_qubits() {
        let lib = EquivalenceLibrary::standard();
        let sig = Signature::standard("crz").unwrap();
        let source: BTreeSet<Signature> = [sig.clone()].into_iter().collect();
        let target = basis(&["rz", "cx"]);
        let transforms = basis_search(&lib, &source, &target).unwrap();
        let composed = compose_transforms(&lib, &source, &transforms).unwrap();

        let (ops, phase) = instantiate(
            &composed[&sig],
            &[QubitId(3), QubitId(1)],
            &[ParameterExpression::constant(0.5)],
        )
        .unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0].name(), "rz");
        assert_eq!(ops[0].qubits, vec![QubitId(1)]);
        assert_eq!(ops[0].params()[0].as_f64(), Some(0.25));
        assert_eq!(ops[1].qubits, vec![QubitId(3), QubitId(1)]);
        assert_eq!(phase.as_f64(), Some(0.0));
    }
}
