//! Targets command implementation.

use anyhow::Result;
use console::style;

use qpipe_compile::{Backend, Stage};

/// Describe the preset backends accepted by `--backend`.
pub fn execute() -> Result<()> {
    println!("{}", style("Preset backends").bold());
    for name in Backend::preset_names() {
        let Some(backend) = Backend::preset(name)? else {
            continue;
        };
        let target = backend.target();
        let operations: Vec<String> = target.operation_names().into_iter().collect();

        println!();
        println!(
            "  {} ({} qubits)",
            style(backend.name()).cyan().bold(),
            target.num_qubits()
        );
        println!("    operations: {}", operations.join(", "));

        let hints = backend.stage_hints();
        for stage in Stage::ALL {
            if let Some(plugin) = hints.plugin_for(stage) {
                println!("    {stage} hint: {}", style(plugin).yellow());
            }
        }
    }
    Ok(())
}
