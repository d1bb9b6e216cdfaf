//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure accepted by the `kninja`
//! binary.

use clap::Parser;
use std::path::PathBuf;

/// Maximum number of jobs accepted by the CLI.
const MAX_JOBS: usize = 1024;

fn parse_jobs(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("{s} is not a valid number"))?;
    if (1..=MAX_JOBS).contains(&value) {
        Ok(value)
    } else {
        Err(format!("jobs must be between 1 and {MAX_JOBS}"))
    }
}

/// Generate Ninja build, deps and log files for a tree built by Kbuild.
#[derive(Debug, Clone, Default, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Build tree to convert; defaults to the current directory.
    #[arg(short = 'C', long, visible_alias = "path", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Reuse the cached make database instead of running make.
    #[arg(long)]
    pub cache: bool,

    /// Set the number of parallel jobs for the full make build.
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// YAML file replacing the built-in exclusion lists.
    #[arg(long, value_name = "FILE")]
    pub exclusions: Option<PathBuf>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,
}
