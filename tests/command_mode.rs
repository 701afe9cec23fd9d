//! Integration tests for the gentable binary

use std::path::PathBuf;
use std::process::Command;

fn run(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .arg("run")
        .arg("-q")
        .arg("--")
        // Tests must be deterministic and not depend on a user's config.toml.
        .arg("--no-config")
        .args(args)
        .env_remove("GENTABLE_LOG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_basic_arithmetic() {
    let (stdout, _, code) = run(&["-c", "5 + 3"]);
    assert_eq!(stdout.trim(), "8");
    assert_eq!(code, 0);
}

#[test]
fn test_true_division() {
    let (stdout, _, code) = run(&["-c", "7 / 2"]);
    assert_eq!(stdout.trim(), "3.5");
    assert_eq!(code, 0);
}

#[test]
fn test_array_output() {
    let (stdout, _, code) = run(&["-c", "[1, 2, 3] * 2"]);
    assert_eq!(stdout.trim(), "2\n4\n6");
    assert_eq!(code, 0);
}

#[test]
fn test_params_are_visible_to_command() {
    let (stdout, _, code) = run(&["-p", "x=4", "-c", "sqrt(x) ** 2"]);
    assert_eq!(stdout.trim(), "4.0");
    assert_eq!(code, 0);
}

#[test]
fn test_error_exit_code() {
    let (stdout, _, code) = run(&["-c", "undefined_function()"]);
    assert!(stdout.starts_with("#ERR"));
    assert_eq!(code, 1);
}

#[test]
fn test_division_by_zero() {
    let (stdout, _, code) = run(&["-c", "1/0"]);
    assert!(stdout.starts_with("#ERR"));
    assert_eq!(code, 1);
}

#[test]
fn test_normalize() {
    let (stdout, _, code) = run(&["--normalize", "a > 5 ? STOP : CONTINUE"]);
    assert_eq!(stdout.trim(), "(True) if (a > 5) else (False)");
    assert_eq!(code, 0);
}

#[test]
fn test_table_as_csv() {
    let (stdout, _, code) = run(&["--format", "csv", &fixture("scenario.toml")]);
    assert_eq!(stdout, "a,b,c\n1,2,20\n2,4,40\n3,6,60\n");
    assert_eq!(code, 0);
}

#[test]
fn test_param_override() {
    let (stdout, _, code) = run(&[
        "--format",
        "csv",
        "-p",
        "parameter_x=20",
        &fixture("scenario.toml"),
    ]);
    assert_eq!(stdout, "a,b,c\n1,2,40\n2,4,80\n3,6,120\n");
    assert_eq!(code, 0);
}

#[test]
fn test_reference_csv_override() {
    let (stdout, _, code) = run(&[
        "--format",
        "csv",
        "-r",
        &fixture("reference.csv"),
        &fixture("scenario.toml"),
    ]);
    assert_eq!(stdout, "a,b,c\n5,10,100\n6,12,120\n");
    assert_eq!(code, 0);
}

#[test]
fn test_markdown_is_default() {
    let (stdout, _, code) = run(&[&fixture("scenario.toml")]);
    assert!(stdout.starts_with("| row | a | b | c |"));
    assert!(stdout.contains("| 2 | 3 | 6 | 60 |"));
    assert_eq!(code, 0);
}

#[test]
fn test_stop_condition_and_max_rows() {
    let (stdout, _, code) = run(&["--format", "csv", &fixture("stop.toml")]);
    assert_eq!(stdout, "total\n1\n3\n6\n10\n");
    assert_eq!(code, 0);

    let (stdout, _, _) = run(&["--format", "csv", "--max-rows", "2", &fixture("stop.toml")]);
    assert_eq!(stdout, "total\n1\n3\n");
}

#[test]
fn test_vectorized() {
    let (stdout, _, code) = run(&["--vectorized", &fixture("scenario.toml")]);
    assert_eq!(stdout, "a: [1, 2, 3]\nb: [2, 4, 6]\nc: [20, 40, 60]\n");
    assert_eq!(code, 0);
}

#[test]
fn test_missing_file_fails() {
    let (_, stderr, code) = run(&["no_such_table.toml"]);
    assert!(stderr.contains("Error"));
    assert_eq!(code, 1);
}
