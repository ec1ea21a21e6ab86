//! CLI parsing and end-to-end tests.
//!
//! The binary is driven through `CARGO_BIN_EXE_qpipe` with circuits and
//! configs written to temporary directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use qpipe_ir::{Circuit, QubitId};

fn qpipe(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qpipe"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("QPIPE_OPTIMIZATION_LEVEL")
        .env_remove("QPIPE_SEED")
        .output()
        .expect("failed to run qpipe")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_circuit(dir: &Path, name: &str, circuit: &Circuit) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(circuit).unwrap()).unwrap();
    path
}

fn long_range() -> Circuit {
    let mut circuit = Circuit::with_size("long_range", 3, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.cx(QubitId(0), QubitId(2)).unwrap();
    circuit
}

const LINE_CONFIG: &str = "\
optimization_level: 1
seed: 11
target:
  coupling_map: [[0, 1], [1, 2]]
  basis_gates: [rz, sx, x, cx, measure]
";

// ============================================================================
// compile
// ============================================================================

mod compile_command {
    use super::*;

    #[test]
    fn test_compile_with_config_writes_default_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_circuit(dir.path(), "long.json", &long_range());
        let config = dir.path().join("line.yaml");
        fs::write(&config, LINE_CONFIG).unwrap();

        let output = qpipe(&[
            "compile",
            "-i",
            input.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
        ]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("Compilation complete"));

        let written = dir.path().join("long_compiled.json");
        let compiled: Circuit =
            serde_json::from_str(&fs::read_to_string(written).unwrap()).unwrap();
        assert_eq!(compiled.num_qubits(), 3);
        let ops = compiled.count_ops();
        assert!(ops.contains_key("cx"));
        assert!(!ops.contains_key("h"));
    }

    #[test]
    fn test_compile_on_preset_backend() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_circuit(dir.path(), "ghz.json", &Circuit::ghz(4).unwrap());
        let out = dir.path().join("out.json");

        let output = qpipe(&[
            "compile",
            "-i",
            input.to_str().unwrap(),
            "--backend",
            "heron-3x3",
            "-O",
            "2",
            "-o",
            out.to_str().unwrap(),
        ]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let compiled: Circuit = serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(compiled.num_qubits(), 9);
        assert!(!compiled.count_ops().contains_key("cx"));
    }

    #[test]
    fn test_same_seed_same_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_circuit(dir.path(), "qft.json", &Circuit::qft(3).unwrap());
        let config = dir.path().join("line.yaml");
        fs::write(&config, LINE_CONFIG).unwrap();

        let mut results = Vec::new();
        for name in ["a.json", "b.json"] {
            let out = dir.path().join(name);
            let output = qpipe(&[
                "compile",
                "-i",
                input.to_str().unwrap(),
                "-c",
                config.to_str().unwrap(),
                "--seed",
                "5",
                "-O",
                "3",
                "-o",
                out.to_str().unwrap(),
            ]);
            assert!(output.status.success(), "stderr: {}", stderr(&output));
            results.push(fs::read_to_string(out).unwrap());
        }
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_trace_lists_passes() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_circuit(dir.path(), "bell.json", &Circuit::bell().unwrap());
        let output = qpipe(&[
            "compile",
            "-i",
            input.to_str().unwrap(),
            "--backend",
            "iqm-5",
            "--trace",
        ]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        let text = stdout(&output);
        assert!(text.contains("CheckMap"));
        assert!(text.contains("BasisTranslator"));
    }

    #[test]
    fn test_negative_seed_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_circuit(dir.path(), "bell.json", &Circuit::bell().unwrap());
        let output = qpipe(&["compile", "-i", input.to_str().unwrap(), "--seed", "-3"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("Expected non-negative integer as seed"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_circuit(dir.path(), "bell.json", &Circuit::bell().unwrap());
        let output = qpipe(&["compile", "-i", input.to_str().unwrap(), "--backend", "nowhere"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("Unknown backend 'nowhere'"));
    }

    #[test]
    fn test_unknown_routing_plugin_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_circuit(dir.path(), "long.json", &long_range());
        let config = dir.path().join("line.yaml");
        fs::write(&config, LINE_CONFIG).unwrap();
        let output = qpipe(&[
            "compile",
            "-i",
            input.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
            "--routing-method",
            "psychic",
        ]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("psychic"));
    }

    #[test]
    fn test_missing_input_file() {
        let output = qpipe(&["compile", "-i", "/nonexistent/qpipe_input.json"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("File not found"));
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_circuit(dir.path(), "bell.json", &Circuit::bell().unwrap());
        let config = dir.path().join("bad.yaml");
        fs::write(&config, "optimization_level: [not, a, number]").unwrap();
        let output = qpipe(&[
            "compile",
            "-i",
            input.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
        ]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("Failed to load compile configuration"));
    }
}

// ============================================================================
// listing commands
// ============================================================================

mod listing_commands {
    use super::*;

    #[test]
    fn test_plugins_lists_every_stage() {
        let output = qpipe(&["plugins"]);
        assert!(output.status.success());
        let text = stdout(&output);
        for stage in ["init", "layout", "routing", "translation", "optimization", "scheduling"] {
            assert!(text.contains(stage), "missing stage {stage}");
        }
        assert!(text.contains("sabre"));
        assert!(text.contains("alap"));
    }

    #[test]
    fn test_targets_lists_presets() {
        let output = qpipe(&["targets"]);
        assert!(output.status.success());
        let text = stdout(&output);
        for name in qpipe_compile::Backend::preset_names() {
            assert!(text.contains(name), "missing backend {name}");
        }
    }

    #[test]
    fn test_version() {
        let output = qpipe(&["version"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("qpipe-compile"));
    }
}

// ============================================================================
// argument parsing
// ============================================================================

mod argument_errors {
    use super::*;

    #[test]
    fn test_no_subcommand() {
        assert!(!qpipe(&[]).status.success());
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(!qpipe(&["foobar"]).status.success());
    }

    #[test]
    fn test_compile_requires_input() {
        let output = qpipe(&["compile"]);
        assert!(!output.status.success());
        assert!(stderr(&output).contains("--input"));
    }

    #[test]
    fn test_level_must_be_a_number() {
        let output = qpipe(&["compile", "-i", "x.json", "-O", "high"]);
        assert!(!output.status.success());
    }
}
