//! Gate parameter expressions.
//!
//! Parameters are small expression trees so that rewrite templates can be
//! written over formal symbols (`theta`, `phi`, ...) and later bound to the
//! concrete (or still symbolic) parameters of the gate being replaced.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fmt;

/// Angles closer than this to zero are treated as zero.
pub const ANGLE_TOLERANCE: f64 = 1e-12;

/// A symbolic or concrete parameter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterExpression {
    /// A constant numeric value.
    Constant(f64),
    /// A free symbol.
    Symbol(String),
    /// The constant π.
    Pi,
    /// Negation.
    Neg(Box<ParameterExpression>),
    /// Addition.
    Add(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Subtraction.
    Sub(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Multiplication.
    Mul(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Division.
    Div(Box<ParameterExpression>, Box<ParameterExpression>),
}

impl ParameterExpression {
    /// A constant parameter.
    pub fn constant(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }

    /// A free symbol.
    pub fn symbol(name: impl Into<String>) -> Self {
        ParameterExpression::Symbol(name.into())
    }

    /// π.
    pub fn pi() -> Self {
        ParameterExpression::Pi
    }

    /// `π * factor`, kept symbolic in π for readable templates.
    pub fn pi_times(factor: f64) -> Self {
        if (factor - 1.0).abs() < ANGLE_TOLERANCE {
            ParameterExpression::Pi
        } else {
            ParameterExpression::Mul(
                Box::new(ParameterExpression::Constant(factor)),
                Box::new(ParameterExpression::Pi),
            )
        }
    }

    /// True when the expression still contains a free symbol.
    pub fn is_symbolic(&self) -> bool {
        match self {
            ParameterExpression::Symbol(_) => true,
            ParameterExpression::Constant(_) | ParameterExpression::Pi => false,
            ParameterExpression::Neg(e) => e.is_symbolic(),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => a.is_symbolic() || b.is_symbolic(),
        }
    }

    /// Evaluate to a number, if no free symbols remain.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterExpression::Constant(v) => Some(*v),
            ParameterExpression::Symbol(_) => None,
            ParameterExpression::Pi => Some(PI),
            ParameterExpression::Neg(e) => e.as_f64().map(|v| -v),
            ParameterExpression::Add(a, b) => Some(a.as_f64()? + b.as_f64()?),
            ParameterExpression::Sub(a, b) => Some(a.as_f64()? - b.as_f64()?),
            ParameterExpression::Mul(a, b) => Some(a.as_f64()? * b.as_f64()?),
            ParameterExpression::Div(a, b) => {
                let divisor = b.as_f64()?;
                if divisor == 0.0 {
                    return None;
                }
                Some(a.as_f64()? / divisor)
            }
        }
    }

    /// True for a numeric value within [`ANGLE_TOLERANCE`] of zero.
    pub fn is_zero(&self) -> bool {
        self.as_f64().is_some_and(|v| v.abs() < ANGLE_TOLERANCE)
    }

    /// Free symbols, sorted.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.collect_symbols(&mut set);
        set
    }

    fn collect_symbols(&self, set: &mut BTreeSet<String>) {
        match self {
            ParameterExpression::Constant(_) | ParameterExpression::Pi => {}
            ParameterExpression::Symbol(name) => {
                set.insert(name.clone());
            }
            ParameterExpression::Neg(e) => e.collect_symbols(set),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => {
                a.collect_symbols(set);
                b.collect_symbols(set);
            }
        }
    }

    /// Replace symbols by whole expressions.
    ///
    /// Symbols missing from `bindings` are left in place. The result is
    /// simplified so that fully bound templates collapse to constants.
    pub fn substitute(&self, bindings: &FxHashMap<String, ParameterExpression>) -> Self {
        self.substitute_inner(bindings).simplify()
    }

    fn substitute_inner(&self, bindings: &FxHashMap<String, ParameterExpression>) -> Self {
        let map = |e: &ParameterExpression| Box::new(e.substitute_inner(bindings));
        match self {
            ParameterExpression::Symbol(name) => bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            ParameterExpression::Constant(_) | ParameterExpression::Pi => self.clone(),
            ParameterExpression::Neg(e) => ParameterExpression::Neg(map(e)),
            ParameterExpression::Add(a, b) => ParameterExpression::Add(map(a), map(b)),
            ParameterExpression::Sub(a, b) => ParameterExpression::Sub(map(a), map(b)),
            ParameterExpression::Mul(a, b) => ParameterExpression::Mul(map(a), map(b)),
            ParameterExpression::Div(a, b) => ParameterExpression::Div(map(a), map(b)),
        }
    }

    /// Bind one symbol to a value.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        let mut bindings = FxHashMap::default();
        bindings.insert(name.to_string(), ParameterExpression::Constant(value));
        self.substitute(&bindings)
    }

    /// Fold constant subexpressions.
    pub fn simplify(&self) -> Self {
        if let Some(v) = self.as_f64() {
            return ParameterExpression::Constant(v);
        }
        match self {
            ParameterExpression::Neg(e) => ParameterExpression::Neg(Box::new(e.simplify())),
            ParameterExpression::Add(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                if a.is_zero() {
                    b
                } else if b.is_zero() {
                    a
                } else {
                    ParameterExpression::Add(Box::new(a), Box::new(b))
                }
            }
            ParameterExpression::Sub(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                if b.is_zero() {
                    a
                } else {
                    ParameterExpression::Sub(Box::new(a), Box::new(b))
                }
            }
            ParameterExpression::Mul(a, b) => {
                ParameterExpression::Mul(Box::new(a.simplify()), Box::new(b.simplify()))
            }
            ParameterExpression::Div(a, b) => {
                ParameterExpression::Div(Box::new(a.simplify()), Box::new(b.simplify()))
            }
            _ => self.clone(),
        }
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterExpression::Constant(v) => write!(f, "{v}"),
            ParameterExpression::Symbol(name) => write!(f, "{name}"),
            ParameterExpression::Pi => write!(f, "π"),
            ParameterExpression::Neg(e) => write!(f, "-({e})"),
            ParameterExpression::Add(a, b) => write!(f, "({a} + {b})"),
            ParameterExpression::Sub(a, b) => write!(f, "({a} - {b})"),
            ParameterExpression::Mul(a, b) => write!(f, "({a} * {b})"),
            ParameterExpression::Div(a, b) => write!(f, "({a} / {b})"),
        }
    }
}

impl From<f64> for ParameterExpression {
    fn from(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }
}

impl std::ops::Add for ParameterExpression {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        ParameterExpression::Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Sub for ParameterExpression {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        ParameterExpression::Sub(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for ParameterExpression {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        ParameterExpression::Mul(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Div for ParameterExpression {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        ParameterExpression::Div(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Neg for ParameterExpression {
    type Output = Self;

    fn neg(self) -> Self::Output {
        ParameterExpression::Neg(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_is_unbound() {
        let p = ParameterExpression::symbol("theta");
        assert!(p.is_symbolic());
        assert_eq!(p.as_f64(), None);
        assert!(p.symbols().contains("theta"));
    }

    #[test]
    fn test_substitute_with_expression() {
        // theta / 2 with theta := phi + π
        let template = ParameterExpression::symbol("theta") / ParameterExpression::constant(2.0);
        let mut bindings = FxHashMap::default();
        bindings.insert(
            "theta".to_string(),
            ParameterExpression::symbol("phi") + ParameterExpression::pi(),
        );
        let bound = template.substitute(&bindings);
        assert!(bound.is_symbolic());
        assert_eq!(bound.symbols().into_iter().collect::<Vec<_>>(), vec!["phi"]);

        let numeric = bound.bind("phi", PI);
        assert!((numeric.as_f64().unwrap() - PI).abs() < 1e-12);
    }

    #[test]
    fn test_simplify_drops_zero_terms() {
        let e = ParameterExpression::symbol("a") + ParameterExpression::constant(0.0);
        assert_eq!(e.simplify(), ParameterExpression::symbol("a"));
    }

    #[test]
    fn test_pi_times() {
        assert_eq!(ParameterExpression::pi_times(1.0), ParameterExpression::Pi);
        let half = ParameterExpression::pi_times(0.5);
        assert!((half.as_f64().unwrap() - PI / 2.0).abs() < 1e-12);
        assert!(ParameterExpression::constant(1e-15).is_zero());
    }
}
