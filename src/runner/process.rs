//! `make` invocation helpers.
//!
//! Both invocations run inside the build tree. The full build inherits the
//! terminal so its progress stays visible; the database dump captures
//! standard output and lets diagnostics through on standard error.

use super::RunnerError;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use make_env::{MAKE_ENV, MAKE_PROGRAM};
use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};
use tracing::info;

fn resolve_make_program_utf8_with<F>(mut read_env: F) -> Utf8PathBuf
where
    F: FnMut(&str) -> Option<OsString>,
{
    read_env(MAKE_ENV)
        .and_then(|value| Utf8PathBuf::from_path_buf(PathBuf::from(value)).ok())
        .unwrap_or_else(|| Utf8PathBuf::from(MAKE_PROGRAM))
}

/// Return the `make` executable, honouring the [`MAKE_ENV`] override.
#[must_use]
pub fn resolve_make_program() -> PathBuf {
    resolve_make_program_utf8_with(|key| env::var_os(key)).into()
}

fn log_command_execution(cmd: &Command) {
    let args = cmd.get_args().map(|a| a.to_string_lossy()).join(" ");
    info!(
        "Running command: {} {}",
        cmd.get_program().to_string_lossy(),
        args
    );
}

fn check_exit_status(program: &Path, step: &'static str, status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(RunnerError::MakeFailed {
            program: program.display().to_string(),
            step,
            status,
        }
        .into())
    }
}

/// Bring the tree fully up to date with `make -j<jobs>`.
///
/// # Errors
///
/// Returns an error if `make` cannot be spawned or exits unsuccessfully.
pub fn run_full_build(program: &Path, tree: &Utf8Path, jobs: usize) -> Result<()> {
    let mut cmd = Command::new(program);
    cmd.current_dir(tree)
        .arg("-j")
        .arg(jobs.to_string())
        .stdin(Stdio::null());
    log_command_execution(&cmd);
    let status = cmd
        .status()
        .with_context(|| format!("spawn {}", program.display()))?;
    check_exit_status(program, "build", status)
}

/// Capture the make database printed by `make -p`.
///
/// # Errors
///
/// Returns an error if `make` cannot be spawned, exits unsuccessfully, or
/// prints something other than UTF-8.
pub fn capture_database(program: &Path, tree: &Utf8Path) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.current_dir(tree)
        .arg("-p")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    log_command_execution(&cmd);
    let output = cmd
        .output()
        .with_context(|| format!("spawn {}", program.display()))?;
    check_exit_status(program, "database dump", output.status)?;
    String::from_utf8(output.stdout).context("make database is not valid UTF-8")
}
