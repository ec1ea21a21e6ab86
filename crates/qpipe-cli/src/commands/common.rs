//! Shared helpers for CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use qpipe_ir::Circuit;

/// Load a circuit from a JSON file.
pub fn load_circuit(path: &Path) -> Result<Circuit> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("Failed to parse circuit JSON: {}", path.display()))
}

/// Write a circuit as pretty-printed JSON.
pub fn save_circuit(circuit: &Circuit, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(circuit).context("Failed to serialize circuit")?;
    fs::write(path, content).with_context(|| format!("Failed to write file: {}", path.display()))
}

/// `<stem>_compiled.json` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{stem}_compiled.json"))
}
