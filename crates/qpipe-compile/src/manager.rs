//! Pass managers for orchestrating compilation.
//!
//! A [`PassManager`] runs a flat list of passes (plus optional fixed-point
//! groups); a [`StagedPassManager`] runs one pass manager per [`Stage`] in
//! the fixed order `init, layout, routing, translation, optimization,
//! scheduling` and reports every executed pass to an optional callback.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use qpipe_ir::CircuitDag;

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::plugin::Stage;
use crate::property::PropertySet;

/// Snapshot handed to the observability callback after every pass.
#[derive(Debug)]
pub struct PassEvent<'a> {
    /// Name of the pass that just ran.
    pub pass_name: &'a str,
    /// Stage it belongs to.
    pub stage: Stage,
    /// Circuit after the pass.
    pub dag: &'a CircuitDag,
    /// Wall time spent in the pass.
    pub elapsed: Duration,
    /// Property set after the pass.
    pub properties: &'a PropertySet,
    /// Running count of executed passes, starting at 1.
    pub count: usize,
}

/// Observability callback invoked synchronously after each pass.
pub type PassCallback = dyn Fn(&PassEvent<'_>) + Send + Sync;

enum Task {
    Single(Box<dyn Pass>),
    DoWhile {
        passes: Vec<Box<dyn Pass>>,
        max_iterations: usize,
    },
}

/// Manages and executes a sequence of compilation passes.
pub struct PassManager {
    tasks: Vec<Task>,
}

impl PassManager {
    /// Create a new empty pass manager.
    pub fn new() -> Self {
        Self { tasks: vec![] }
    }

    /// Add a pass to the manager.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.tasks.push(Task::Single(Box::new(pass)));
    }

    /// Add an already boxed pass.
    pub fn add_boxed(&mut self, pass: Box<dyn Pass>) {
        self.tasks.push(Task::Single(pass));
    }

    /// Add a group that repeats until the circuit's op count and depth stop
    /// changing, at most `max_iterations` times.
    pub fn add_do_while(&mut self, passes: Vec<Box<dyn Pass>>, max_iterations: usize) {
        self.tasks.push(Task::DoWhile {
            passes,
            max_iterations: max_iterations.max(1),
        });
    }

    /// Move every task of `other` to the end of this manager.
    pub fn append(&mut self, other: PassManager) {
        self.tasks.extend(other.tasks);
    }

    /// Run all passes on the given DAG.
    #[instrument(skip(self, dag, properties))]
    pub fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<()> {
        self.run_observed(dag, properties, &mut |_, _, _, _| {})
    }

    /// Run all passes, reporting each executed pass to `observer`.
    pub fn run_observed(
        &self,
        dag: &mut CircuitDag,
        properties: &mut PropertySet,
        observer: &mut dyn FnMut(&str, &CircuitDag, Duration, &PropertySet),
    ) -> CompileResult<()> {
        debug!(
            "Running pass manager with {} passes on circuit with {} qubits",
            self.len(),
            dag.num_qubits()
        );

        for task in &self.tasks {
            match task {
                Task::Single(pass) => {
                    run_pass(pass.as_ref(), dag, properties, observer)?;
                }
                Task::DoWhile {
                    passes,
                    max_iterations,
                } => {
                    for iteration in 0..*max_iterations {
                        let before = (dag.num_ops(), dag.depth());
                        for pass in passes {
                            run_pass(pass.as_ref(), dag, properties, observer)?;
                        }
                        if (dag.num_ops(), dag.depth()) == before {
                            debug!("Fixed point reached after {} iterations", iteration + 1);
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Get the number of passes, counting each member of a group once.
    pub fn len(&self) -> usize {
        self.tasks
            .iter()
            .map(|t| match t {
                Task::Single(_) => 1,
                Task::DoWhile { passes, .. } => passes.len(),
            })
            .sum()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all passes in execution order.
    pub fn pass_names(&self) -> Vec<String> {
        self.tasks
            .iter()
            .flat_map(|t| match t {
                Task::Single(pass) => vec![pass.name().to_string()],
                Task::DoWhile { passes, .. } => {
                    passes.iter().map(|p| p.name().to_string()).collect()
                }
            })
            .collect()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PassManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.pass_names()).finish()
    }
}

fn run_pass(
    pass: &dyn Pass,
    dag: &mut CircuitDag,
    properties: &mut PropertySet,
    observer: &mut dyn FnMut(&str, &CircuitDag, Duration, &PropertySet),
) -> CompileResult<()> {
    if !pass.should_run(dag, properties) {
        debug!("Skipping pass: {}", pass.name());
        return Ok(());
    }
    debug!("Running pass: {}", pass.name());
    let start = Instant::now();
    pass.run(dag, properties)?;
    let elapsed = start.elapsed();
    // dag.depth() is a full topological sort; keep per-pass logging to the op count.
    debug!(
        "Pass {} completed, ops: {}, elapsed: {:?}",
        pass.name(),
        dag.num_ops(),
        elapsed
    );
    observer(pass.name(), dag, elapsed, properties);
    Ok(())
}

/// One pass manager per stage, run in fixed order.
pub struct StagedPassManager {
    stages: Vec<(Stage, PassManager)>,
}

impl StagedPassManager {
    /// Create a manager with every stage empty.
    pub fn new() -> Self {
        Self {
            stages: Stage::ALL.iter().map(|&s| (s, PassManager::new())).collect(),
        }
    }

    /// Replace the passes of a stage.
    pub fn set_stage(&mut self, stage: Stage, passes: PassManager) {
        if let Some(slot) = self.stages.iter_mut().find(|(s, _)| *s == stage) {
            slot.1 = passes;
        }
    }

    /// Passes of a stage.
    pub fn stage(&self, stage: Stage) -> Option<&PassManager> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, pm)| pm)
    }

    /// Stages in execution order.
    pub fn stages(&self) -> impl Iterator<Item = (Stage, &PassManager)> {
        self.stages.iter().map(|(s, pm)| (*s, pm))
    }

    /// `(stage, pass name)` for every pass, in execution order.
    pub fn pass_names(&self) -> Vec<(Stage, String)> {
        self.stages
            .iter()
            .flat_map(|(s, pm)| pm.pass_names().into_iter().map(move |n| (*s, n)))
            .collect()
    }

    /// Run every stage against the DAG.
    #[instrument(skip_all)]
    pub fn run(
        &self,
        dag: &mut CircuitDag,
        properties: &mut PropertySet,
        callback: Option<&PassCallback>,
    ) -> CompileResult<()> {
        info!(
            "Running staged pipeline on circuit with {} qubits and {} ops",
            dag.num_qubits(),
            dag.num_ops()
        );
        let mut count = 0usize;
        for (stage, pm) in &self.stages {
            if pm.is_empty() {
                continue;
            }
            debug!("Entering stage {stage}");
            let mut observer = |pass_name: &str,
                                dag: &CircuitDag,
                                elapsed: Duration,
                                properties: &PropertySet| {
                count += 1;
                if let Some(cb) = callback {
                    cb(&PassEvent {
                        pass_name,
                        stage: *stage,
                        dag,
                        elapsed,
                        properties,
                        count,
                    });
                }
            };
            pm.run_observed(dag, properties, &mut observer)?;
        }
        info!(
            "Pipeline completed after {count} passes, final depth: {}, ops: {}",
            dag.depth(),
            dag.num_ops()
        );
        Ok(())
    }
}

impl Default for StagedPassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StagedPassManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.stages.iter().map(|(stage, pm)| (stage.name(), pm)))
            .finish()
    }
}
