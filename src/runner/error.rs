//! Error types for the runner module.

use miette::Diagnostic;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised while driving `make` and writing artefacts.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// `make` exited unsuccessfully.
    #[error("{program} {step} exited with {status}")]
    #[diagnostic(code(kninja::runner::make_failed))]
    MakeFailed {
        /// Program that was run.
        program: String,
        /// Which invocation failed.
        step: &'static str,
        /// Reported exit status.
        status: ExitStatus,
    },
    /// A path supplied on the command line is not valid UTF-8.
    #[error("path {} is not valid UTF-8", path.display())]
    #[diagnostic(code(kninja::runner::non_utf8_path))]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },
}
