// Binary-level tests for the `nsc` command.
//
// Runs the built binary on the demo graphs and checks exit codes, output
// shapes and byte-identical output across runs.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn nsc_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_nsc"))
}

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn demo(name: &str) -> String {
    project_root()
        .join("demos")
        .join(name)
        .to_str()
        .unwrap()
        .to_string()
}

fn run_nsc(args: &[&str]) -> Output {
    Command::new(nsc_binary())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run nsc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("non-UTF8 output")
}

#[test]
fn valid_graph_exits_zero() {
    let out = run_nsc(&[&demo("mnist_mlp.ncg")]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.contains("out: Output -> [10]"));
    assert!(text.contains("7 resolved, 0 blocked, 0 warning(s)"));
}

#[test]
fn blocked_graph_exits_one() {
    let out = run_nsc(&[&demo("broken_cnn.ncg")]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("conv: Conv2D BLOCKED E0101"));
}

#[test]
fn rejected_connection_exits_one() {
    let path = demo("mnist_mlp.ncg");
    let ok = run_nsc(&[&path, "--connect", "fc1=drop"]);
    // drop.in is already fed by act.
    assert_eq!(ok.status.code(), Some(1));
    assert!(stdout(&ok).contains("connect fc1.out -> drop.in: rejected E0130"));
}

#[test]
fn load_errors_exit_two() {
    let missing = run_nsc(&["/nonexistent/graph.ncg"]);
    assert_eq!(missing.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&missing.stderr).starts_with("nsc: error: cannot read"));

    let bad_format = run_nsc(&["--format", "json", &demo("mnist_mlp.ncg")]);
    assert_eq!(bad_format.status.code(), Some(2));
}

#[test]
fn json_input_and_output() {
    let out = run_nsc(&["--emit", "json", &demo("mnist_mlp.json")]);
    assert_eq!(out.status.code(), Some(0));
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(v["nodes"]["out"]["outputShape"], serde_json::json!([10]));
    assert_eq!(v["edges"]["e6"]["status"], "ignored");
    assert_eq!(v["warnings"][0]["code"], "W0200");
}

#[test]
fn same_graph_same_fingerprint() {
    let path = demo("transformer_block.ncg");
    let first = run_nsc(&["--emit", "fingerprint", &path]);
    let second = run_nsc(&["--emit", "fingerprint", &path]);
    assert_eq!(first.status.code(), Some(0));
    let hex = stdout(&first);
    assert_eq!(hex, stdout(&second), "fingerprint should be byte-identical across runs");
    assert_eq!(hex.trim().len(), 64);
}

#[test]
fn every_emit_stage_is_byte_identical_across_runs() {
    for path in [demo("mnist_mlp.json"), demo("broken_cnn.ncg")] {
        for emit in ["summary", "json", "dot", "fingerprint"] {
            let first = run_nsc(&["--emit", emit, &path]);
            let second = run_nsc(&["--emit", emit, &path]);
            assert_eq!(
                first.stdout, second.stdout,
                "--emit {emit} on {path} should be byte-identical across runs"
            );
        }
    }
}

#[test]
fn unsupported_param_value_is_a_node_error() {
    let dir = std::env::temp_dir().join(format!("nsc-param-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("null.json");
    std::fs::write(
        &file,
        r#"{"nodes": [{"id": "x", "type": "Input", "params": {"dataset": null}}], "edges": []}"#,
    )
    .unwrap();

    let out = run_nsc(&[file.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("x: Input BLOCKED E0111"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn sketch_errors_point_at_source() {
    let dir = std::env::temp_dir().join(format!("nsc-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("bad.ncg");
    std::fs::write(&file, "x = Input()\nx -> y\n").unwrap();

    let out = run_nsc(&[file.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("bad.ncg:2:6: error[E0302]: node 'y' is not declared"), "{stderr}");

    std::fs::remove_dir_all(&dir).ok();
}
