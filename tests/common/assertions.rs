#![allow(dead_code)]

use assert_cmd::Command;
use std::process::Output;

/// Assert that a command output contains text (case-insensitive)
pub fn assert_output_contains(output: &Output, expected: &str) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{stdout}{stderr}");

    assert!(
        combined.to_lowercase().contains(&expected.to_lowercase()),
        "Expected output to contain '{expected}'\nActual stdout: {stdout}\nActual stderr: {stderr}"
    );
}

/// Assert that a command succeeded and contains expected text
pub fn assert_success_with_output(mut cmd: Command, expected: &str) -> Output {
    let output = cmd.output().expect("Failed to execute command");
    assert!(
        output.status.success(),
        "Command failed with {:?}, stderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    assert_output_contains(&output, expected);
    output
}

/// Assert that a command failed with the given exit code and error text
pub fn assert_exit_with_error(mut cmd: Command, code: i32, expected_error: &str) -> Output {
    let output = cmd.output().expect("Failed to execute command");
    assert_eq!(
        output.status.code(),
        Some(code),
        "Unexpected exit status, stdout: {} stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert_output_contains(&output, expected_error);
    output
}

/// Errors are reported on exactly one stderr line
pub fn assert_single_error_line(output: &Output) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr.trim_end().lines().count(),
        1,
        "Expected one line on stderr, got: {stderr}"
    );
}
