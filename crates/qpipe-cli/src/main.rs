//! qpipe Command-Line Interface
//!
//! Compiles JSON circuits for a device described by a YAML config or a
//! preset backend.
//!
//! ```text
//! qpipe compile -i bell.json -c device.yaml -O 3 --seed 7 -o bell_compiled.json
//! qpipe compile -i bell.json --backend heron-3x3 --trace
//! qpipe plugins
//! qpipe targets
//! ```

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{compile, plugins, targets, version};

/// qpipe - staged quantum circuit compiler
#[derive(Parser)]
#[command(name = "qpipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a circuit for a device
    Compile(compile::CompileArgs),

    /// List the registered stage plugins
    Plugins,

    /// List the preset target devices
    Targets,

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v flags
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Compile(args) => compile::execute(&args),
        Commands::Plugins => {
            plugins::execute();
            Ok(())
        }
        Commands::Targets => targets::execute(),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
