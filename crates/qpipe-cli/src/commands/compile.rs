//! Compile command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use tracing::debug;

use qpipe_compile::{Backend, CompileConfig, TargetConfig, compile};

use super::common::{default_output_path, load_circuit, save_circuit};

/// Arguments of `qpipe compile`.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Input circuit (JSON)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Target and pipeline configuration (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Preset backend, overrides the config's target section
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Optimization level (0-3)
    #[arg(short = 'O', long)]
    pub optimization_level: Option<u8>,

    /// Seed for randomized passes
    #[arg(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    /// Layout stage plugin
    #[arg(long)]
    pub layout_method: Option<String>,

    /// Routing stage plugin
    #[arg(long)]
    pub routing_method: Option<String>,

    /// Translation stage plugin
    #[arg(long)]
    pub translation_method: Option<String>,

    /// Scheduling stage plugin
    #[arg(long)]
    pub scheduling_method: Option<String>,

    /// Output file (defaults to <input>_compiled.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print every executed pass
    #[arg(long)]
    pub trace: bool,
}

impl CompileArgs {
    /// Flags win over environment and file.
    fn apply(&self, config: &mut CompileConfig) -> Result<()> {
        if let Some(level) = self.optimization_level {
            config.optimization_level = level;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        let methods = [
            (&self.layout_method, &mut config.layout_method),
            (&self.routing_method, &mut config.routing_method),
            (&self.translation_method, &mut config.translation_method),
            (&self.scheduling_method, &mut config.scheduling_method),
        ];
        for (flag, slot) in methods {
            if let Some(method) = flag {
                *slot = Some(method.clone());
            }
        }
        if let Some(name) = &self.backend {
            if Backend::preset(name)?.is_none() {
                anyhow::bail!(
                    "Unknown backend '{name}'. Available: {}",
                    Backend::preset_names().join(", ")
                );
            }
            config.target = TargetConfig {
                backend: Some(name.clone()),
                ..Default::default()
            };
        }
        Ok(())
    }
}

/// Execute the compile command.
pub fn execute(args: &CompileArgs) -> Result<()> {
    let mut config = CompileConfig::load(args.config.as_deref())
        .with_context(|| "Failed to load compile configuration")?;
    args.apply(&mut config)?;
    debug!(?config, "Resolved compile configuration");

    let circuit = load_circuit(&args.input)?;
    println!(
        "{} Compiling {} ({} qubits, depth {}) at level {}",
        style("→").cyan().bold(),
        style(args.input.display()).green(),
        circuit.num_qubits(),
        circuit.depth(),
        config.optimization_level
    );

    let mut options = config.to_options()?;
    if args.trace {
        options = options.with_callback(|event| {
            println!(
                "  {:>3} {:<12} {:<32} {:>6} ops {:>10.3?}",
                event.count,
                style(event.stage).dim(),
                event.pass_name,
                event.dag.num_ops(),
                event.elapsed
            );
        });
    }

    let compiled = compile(&circuit, &options)?;
    let output = compiled.circuit();

    println!("{} Compilation complete", style("✓").green().bold());
    println!(
        "  Result: depth {}, {} ops, {} swaps",
        output.depth(),
        output.dag().num_ops(),
        compiled.properties().swap_count()
    );
    let layout = compiled.layout();
    println!("  Initial layout: {:?}", layout.initial_index_layout());
    if layout.final_layout.is_some() {
        println!("  Final layout:   {:?}", layout.final_index_layout());
    }
    for (name, count) in compiled.count_ops() {
        println!("    {:<12} {count}", style(name).cyan());
    }

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    save_circuit(&output, &path)?;
    println!("  Output: {}", style(path.display()).green());

    Ok(())
}
