//! Built-in rules for the standard gate set.

use qpipe_ir::ParameterExpression as P;

use super::{EquivalenceLibrary, EquivalenceRule, Signature};

fn pi(factor: f64) -> P {
    P::pi_times(factor)
}

fn sym(name: &str) -> P {
    P::symbol(name)
}

fn half(name: &str) -> P {
    sym(name) / P::constant(2.0)
}

fn neg_half(name: &str) -> P {
    -half(name)
}

fn rules() -> Vec<(&'static str, EquivalenceRule)> {
    let r1 = || EquivalenceRule::new(1);
    let r2 = || EquivalenceRule::new(2);
    vec![
        // Single-qubit Paulis and Cliffords
        ("id", r1().op("rz", &[0], [P::constant(0.0)])),
        ("id", r1().op("u", &[0], [P::constant(0.0), P::constant(0.0), P::constant(0.0)])),
        ("x", r1().op("u", &[0], [pi(1.0), P::constant(0.0), pi(1.0)])),
        ("x", r1().op("sx", &[0], []).op("sx", &[0], [])),
        ("x", r1().with_phase(pi(0.5)).op("rx", &[0], [pi(1.0)])),
        ("y", r1().op("u", &[0], [pi(1.0), pi(0.5), pi(0.5)])),
        ("y", r1().with_phase(pi(0.5)).op("z", &[0], []).op("x", &[0], [])),
        ("y", r1().with_phase(pi(0.5)).op("ry", &[0], [pi(1.0)])),
        ("z", r1().op("p", &[0], [pi(1.0)])),
        ("z", r1().with_phase(pi(0.5)).op("rz", &[0], [pi(1.0)])),
        ("h", r1().op("u", &[0], [pi(0.5), P::constant(0.0), pi(1.0)])),
        (
            "h",
            r1().with_phase(pi(0.25))
                .op("s", &[0], [])
                .op("sx", &[0], [])
                .op("s", &[0], []),
        ),
        ("h", r1().op("ry", &[0], [pi(0.5)]).op("x", &[0], [])),
        ("s", r1().op("p", &[0], [pi(0.5)])),
        ("s", r1().with_phase(pi(0.25)).op("rz", &[0], [pi(0.5)])),
        ("sdg", r1().op("p", &[0], [pi(-0.5)])),
        ("sdg", r1().with_phase(pi(-0.25)).op("rz", &[0], [pi(-0.5)])),
        ("t", r1().op("p", &[0], [pi(0.25)])),
        ("t", r1().with_phase(pi(0.125)).op("rz", &[0], [pi(0.25)])),
        ("tdg", r1().op("p", &[0], [pi(-0.25)])),
        ("tdg", r1().with_phase(pi(-0.125)).op("rz", &[0], [pi(-0.25)])),
        (
            "sx",
            r1().with_phase(pi(0.25))
                .op("sdg", &[0], [])
                .op("h", &[0], [])
                .op("sdg", &[0], []),
        ),
        ("sx", r1().with_phase(pi(0.25)).op("rx", &[0], [pi(0.5)])),
        (
            "sxdg",
            r1().with_phase(pi(-0.25))
                .op("s", &[0], [])
                .op("h", &[0], [])
                .op("s", &[0], []),
        ),
        ("sxdg", r1().with_phase(pi(-0.25)).op("rx", &[0], [pi(-0.5)])),
        // Rotations
        (
            "rx",
            r1().with_params(&["theta"])
                .op("u", &[0], [sym("theta"), pi(-0.5), pi(0.5)]),
        ),
        (
            "rx",
            r1().with_params(&["theta"])
                .op("h", &[0], [])
                .op("rz", &[0], [sym("theta")])
                .op("h", &[0], []),
        ),
        (
            "rx",
            r1().with_params(&["theta"])
                .op("prx", &[0], [sym("theta"), P::constant(0.0)]),
        ),
        (
            "ry",
            r1().with_params(&["theta"])
                .op("u", &[0], [sym("theta"), P::constant(0.0), P::constant(0.0)]),
        ),
        (
            "ry",
            r1().with_params(&["theta"])
                .op("sdg", &[0], [])
                .op("rx", &[0], [sym("theta")])
                .op("s", &[0], []),
        ),
        (
            "ry",
            r1().with_params(&["theta"])
                .op("prx", &[0], [sym("theta"), pi(0.5)]),
        ),
        (
            "rz",
            r1().with_params(&["theta"])
                .with_phase(neg_half("theta"))
                .op("p", &[0], [sym("theta")]),
        ),
        (
            "rz",
            r1().with_params(&["theta"])
                .op("rx", &[0], [pi(-0.5)])
                .op("ry", &[0], [sym("theta")])
                .op("rx", &[0], [pi(0.5)]),
        ),
        (
            "p",
            r1().with_params(&["theta"])
                .with_phase(half("theta"))
                .op("rz", &[0], [sym("theta")]),
        ),
        (
            "p",
            r1().with_params(&["theta"])
                .op("u", &[0], [P::constant(0.0), P::constant(0.0), sym("theta")]),
        ),
        (
            "u",
            r1().with_params(&["theta", "phi", "lam"])
                .with_phase((sym("lam") + sym("phi") - pi(1.0)) / P::constant(2.0))
                .op("rz", &[0], [sym("lam")])
                .op("sx", &[0], [])
                .op("rz", &[0], [sym("theta") + pi(1.0)])
                .op("sx", &[0], [])
                .op("rz", &[0], [sym("phi") + pi(3.0)]),
        ),
        (
            "u",
            r1().with_params(&["theta", "phi", "lam"])
                .with_phase((sym("phi") + sym("lam")) / P::constant(2.0))
                .op("rz", &[0], [sym("lam")])
                .op("ry", &[0], [sym("theta")])
                .op("rz", &[0], [sym("phi")]),
        ),
        (
            "prx",
            r1().with_params(&["theta", "phi"])
                .op("rz", &[0], [-sym("phi")])
                .op("rx", &[0], [sym("theta")])
                .op("rz", &[0], [sym("phi")]),
        ),
        (
            "prx",
            r1().with_params(&["theta", "phi"]).op(
                "u",
                &[0],
                [sym("theta"), sym("phi") - pi(0.5), pi(0.5) - sym("phi")],
            ),
        ),
        // Two-qubit gates
        (
            "cx",
            r2().op("h", &[1], []).op("cz", &[0, 1], []).op("h", &[1], []),
        ),
        (
            "cx",
            r2().with_phase(pi(0.25))
                .op("sdg", &[0], [])
                .op("sxdg", &[1], [])
                .op("ecr", &[0, 1], [])
                .op("x", &[0], []),
        ),
        (
            "cz",
            r2().op("h", &[1], []).op("cx", &[0, 1], []).op("h", &[1], []),
        ),
        (
            "cy",
            r2().op("sdg", &[1], []).op("cx", &[0, 1], []).op("s", &[1], []),
        ),
        (
            "ch",
            r2().op("s", &[1], [])
                .op("h", &[1], [])
                .op("t", &[1], [])
                .op("cx", &[0, 1], [])
                .op("tdg", &[1], [])
                .op("h", &[1], [])
                .op("sdg", &[1], []),
        ),
        (
            "ecr",
            r2().with_phase(pi(-0.25))
                .op("s", &[0], [])
                .op("sx", &[1], [])
                .op("cx", &[0, 1], [])
                .op("x", &[0], []),
        ),
        (
            "swap",
            r2().op("cx", &[0, 1], [])
                .op("cx", &[1, 0], [])
                .op("cx", &[0, 1], []),
        ),
        (
            "iswap",
            r2().op("s", &[0], [])
                .op("s", &[1], [])
                .op("h", &[0], [])
                .op("cx", &[0, 1], [])
                .op("cx", &[1, 0], [])
                .op("h", &[1], []),
        ),
        (
            "crx",
            r2().with_params(&["theta"])
                .op("p", &[1], [pi(0.5)])
                .op("cx", &[0, 1], [])
                .op("u", &[1], [neg_half("theta"), P::constant(0.0), P::constant(0.0)])
                .op("cx", &[0, 1], [])
                .op("u", &[1], [half("theta"), pi(-0.5), P::constant(0.0)]),
        ),
        (
            "cry",
            r2().with_params(&["theta"])
                .op("ry", &[1], [half("theta")])
                .op("cx", &[0, 1], [])
                .op("ry", &[1], [neg_half("theta")])
                .op("cx", &[0, 1], []),
        ),
        (
            "crz",
            r2().with_params(&["theta"])
                .op("rz", &[1], [half("theta")])
                .op("cx", &[0, 1], [])
                .op("rz", &[1], [neg_half("theta")])
                .op("cx", &[0, 1], []),
        ),
        (
            "cp",
            r2().with_params(&["theta"])
                .op("p", &[0], [half("theta")])
                .op("cx", &[0, 1], [])
                .op("p", &[1], [neg_half("theta")])
                .op("cx", &[0, 1], [])
                .op("p", &[1], [half("theta")]),
        ),
        (
            "rzz",
            r2().with_params(&["theta"])
                .op("cx", &[0, 1], [])
                .op("rz", &[1], [sym("theta")])
                .op("cx", &[0, 1], []),
        ),
        (
            "rxx",
            r2().with_params(&["theta"])
                .op("h", &[0], [])
                .op("h", &[1], [])
                .op("cx", &[0, 1], [])
                .op("rz", &[1], [sym("theta")])
                .op("cx", &[0, 1], [])
                .op("h", &[0], [])
                .op("h", &[1], []),
        ),
        (
            "ryy",
            r2().with_params(&["theta"])
                .op("rx", &[0], [pi(0.5)])
                .op("rx", &[1], [pi(0.5)])
                .op("cx", &[0, 1], [])
                .op("rz", &[1], [sym("theta")])
                .op("cx", &[0, 1], [])
                .op("rx", &[0], [pi(-0.5)])
                .op("rx", &[1], [pi(-0.5)]),
        ),
        // Three-qubit gates
        (
            "ccx",
            EquivalenceRule::new(3)
                .op("h", &[2], [])
                .op("cx", &[1, 2], [])
                .op("tdg", &[2], [])
                .op("cx", &[0, 2], [])
                .op("t", &[2], [])
                .op("cx", &[1, 2], [])
                .op("tdg", &[2], [])
                .op("cx", &[0, 2], [])
                .op("t", &[1], [])
                .op("t", &[2], [])
                .op("h", &[2], [])
                .op("cx", &[0, 1], [])
                .op("t", &[0], [])
                .op("tdg", &[1], [])
                .op("cx", &[0, 1], []),
        ),
        (
            "ccz",
            EquivalenceRule::new(3)
                .op("h", &[2], [])
                .op("ccx", &[0, 1, 2], [])
                .op("h", &[2], []),
        ),
        (
            "cswap",
            EquivalenceRule::new(3)
                .op("cx", &[2, 1], [])
                .op("ccx", &[0, 1, 2], [])
                .op("cx", &[2, 1], []),
        ),
    ]
}

pub(super) fn build() -> EquivalenceLibrary {
    let mut lib = EquivalenceLibrary::new();
    for (name, rule) in rules() {
        let Some(signature) = Signature::standard(name) else {
            continue;
        };
        if let Err(err) = lib.add_equivalence(signature, rule) {
            tracing::error!("Skipping built-in rule for '{name}': {err}");
        }
    }
    lib
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_rule_is_valid() {
        let lib = build();
        assert_eq!(lib.num_rules(), rules().len());
    }
}
