//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - staged quantum circuit compiler",
        style("qpipe").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qpipe-ir       Circuit and DAG intermediate representation");
    println!("  qpipe-compile  Preset pass managers and stage plugins");
    println!("  qpipe-cli      Command-line interface");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
