//! Error types for make database conversion.

use miette::Diagnostic;
use std::io;
use thiserror::Error;

/// Errors that abort a conversion run.
#[derive(Debug, Error, Diagnostic)]
pub enum ConvertError {
    /// A built object named by the database is missing or unreadable.
    #[error("cannot read modification time of {path}")]
    #[diagnostic(
        code(kninja::makedb::missing_object),
        help("the tree does not look fully built; run a complete `make` before converting")
    )]
    MissingObject {
        /// Object path relative to the tree root.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}
