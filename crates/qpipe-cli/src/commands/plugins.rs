//! Plugins command implementation.

use console::style;

use qpipe_compile::{Stage, StagePluginRegistry};

/// List every registered plugin, stage by stage.
pub fn execute() {
    let registry = StagePluginRegistry::builtin();

    println!("{}", style("Stage plugins").bold());
    for stage in Stage::ALL {
        let names = registry.names(stage);
        println!(
            "  {:<14} {}",
            style(stage).cyan(),
            names
                .iter()
                .map(|name| if *name == "default" {
                    style(*name).green().to_string()
                } else {
                    (*name).to_string()
                })
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
