//! External command execution
//!
//! Runs toolchain binaries (`cargo`, `rustc`) and captures stdout as text.
//! Failures carry the full command line and stderr for diagnostics.

use crate::error::{GroomError, GroomResult};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Run a command and return its stdout as a string.
///
/// The command inherits the current environment plus `extra_env`. A non-zero
/// exit status is an error carrying the captured stderr.
pub async fn get_cmd_output(
    cmd: &str,
    args: &[&str],
    cwd: Option<&Path>,
    extra_env: &[(&str, &str)],
) -> GroomResult<String> {
    let cmdline = format!("{} {}", cmd, args.join(" "));
    debug!("Executing: {}", cmdline);

    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    for (key, value) in extra_env {
        command.env(key, value);
    }

    let output = command
        .output()
        .await
        .map_err(|e| GroomError::command_failed(cmdline.clone(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(GroomError::command_exec(cmdline, stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Check whether a path exists, swallowing any IO error
pub async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let out = get_cmd_output("echo", &["hello"], None, &[]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn missing_binary_fails() {
        let err = get_cmd_output("definitely-not-a-binary-xyz", &[], None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GroomError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let err = get_cmd_output("sh", &["-c", "echo oops >&2; exit 1"], None, &[])
            .await
            .unwrap_err();
        match err {
            GroomError::CommandExecution { command, stderr } => {
                assert!(command.starts_with("sh -c"));
                assert!(stderr.contains("oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn exists_checks_path() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(exists(dir.path()).await);
        assert!(!exists(&dir.path().join("nope")).await);
    }
}
