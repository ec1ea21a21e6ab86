//! Pass trait and types for compilation passes.

use qpipe_ir::CircuitDag;

use crate::error::CompileResult;
use crate::property::PropertySet;

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Analysis pass that reads but does not modify the DAG.
    Analysis,
    /// Transformation pass that modifies the DAG.
    Transformation,
}

/// A compilation pass that operates on a circuit DAG.
///
/// Passes are the fundamental unit of compilation in qpipe. Each pass
/// performs a specific transformation or analysis on the circuit.
pub trait Pass: Send + Sync {
    /// Get the name of this pass.
    fn name(&self) -> &str;

    /// Get the kind of this pass.
    fn kind(&self) -> PassKind;

    /// Run the pass on the given DAG.
    ///
    /// For analysis passes, this should not modify the DAG but may
    /// write to the `PropertySet`.
    ///
    /// For transformation passes, this modifies the DAG and may read
    /// from and write to the `PropertySet`.
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()>;

    /// Check if this pass should run based on current state.
    ///
    /// This can be overridden to skip passes that are not needed.
    fn should_run(&self, _dag: &CircuitDag, _properties: &PropertySet) -> bool {
        true
    }
}

type Condition = Box<dyn Fn(&CircuitDag, &PropertySet) -> bool + Send + Sync>;

/// Runs the wrapped pass only when a condition on the property set holds.
///
/// The wrapper reports the inner pass's name, so traces show the pass
/// that actually ran.
pub struct Conditional<P> {
    inner: P,
    condition: Condition,
}

impl<P: Pass> Conditional<P> {
    /// Wrap `inner` behind `condition`.
    pub fn new(
        inner: P,
        condition: impl Fn(&CircuitDag, &PropertySet) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            condition: Box::new(condition),
        }
    }
}

impl<P: Pass> Pass for Conditional<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> PassKind {
        self.inner.kind()
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        self.inner.run(dag, properties)
    }

    fn should_run(&self, dag: &CircuitDag, properties: &PropertySet) -> bool {
        (self.condition)(dag, properties) && self.inner.should_run(dag, properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    struct TestPass;

    impl Pass for TestPass {
        fn name(&self) -> &'static str {
            "test"
        }

        fn kind(&self) -> PassKind {
            PassKind::Transformation
        }

        fn run(&self, _dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pass_kind() {
        let pass = TestPass;
        assert_eq!(pass.kind(), PassKind::Transformation);
        assert_eq!(pass.name(), "test");
    }

    #[test]
    fn test_conditional_keeps_name_and_checks_condition() {
        let pass = Conditional::new(TestPass, |_, props| props.is_swap_mapped() == Some(false));
        assert_eq!(pass.name(), "test");

        let dag = CircuitDag::new();
        let mut props = PropertySet::new();
        assert!(!pass.should_run(&dag, &props));
        props.insert(Property::IsSwapMapped(false));
        assert!(pass.should_run(&dag, &props));
    }
}
