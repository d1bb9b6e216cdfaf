//! Conversion pipeline driver.
//!
//! [`run`] keeps `main` minimal: it brings the tree up to date with `make`,
//! captures and caches the make database, converts it, and writes the Ninja
//! artefacts next to the objects they describe.

mod error;
mod file_io;
mod process;

pub use error::RunnerError;
pub use process::{capture_database, resolve_make_program, run_full_build};

use crate::cli::Cli;
use crate::config::ExclusionConfig;
use crate::graph::BuildGraph;
use crate::makedb::{self, ConvertOptions};
use crate::path_filter::PathFilter;
use crate::{build_log, deps_log, ninja_gen};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use std::env;
use std::num::NonZeroUsize;
use std::path::Path;
use std::thread;
use tracing::info;

/// File holding the cached make database.
pub const MAKE_DB_CACHE: &str = ".makedb";
/// Binary dependency log read by Ninja.
pub const DEPS_LOG: &str = ".ninja_deps";
/// Textual build log read by Ninja.
pub const BUILD_LOG: &str = ".ninja_log";

/// Execute the conversion described by `cli`.
///
/// # Errors
///
/// Returns an error if `make` fails, the database cannot be converted, or
/// an artefact cannot be written.
pub fn run(cli: &Cli) -> Result<()> {
    let root = resolve_tree_root(cli.directory.as_deref())?;
    let tree = file_io::open_tree(&root)?;
    let dump = load_database(cli, &root, &tree)?;
    let lines = makedb::database_lines(&dump);
    info!("Parsing make database ({} lines)", lines.len());

    let exclusions = load_exclusions(cli.exclusions.as_deref())?;
    let filter = PathFilter::new(&exclusions, root.clone())?;
    let mut options = ConvertOptions::new(filter);
    options.regenerate_command = regenerate_command(cli, &root)?;

    let graph = makedb::convert(&lines, &options)?;
    write_outputs(&tree, &options.build_file, &graph)
}

fn resolve_tree_root(directory: Option<&Path>) -> Result<Utf8PathBuf> {
    let dir = directory.unwrap_or_else(|| Path::new("."));
    let utf8 = Utf8Path::from_path(dir).ok_or_else(|| RunnerError::NonUtf8Path {
        path: dir.to_path_buf(),
    })?;
    utf8.canonicalize_utf8()
        .with_context(|| format!("resolve build tree {utf8}"))
}

/// Return the make database, from the cache when allowed and present.
fn load_database(cli: &Cli, root: &Utf8Path, tree: &Dir) -> Result<String> {
    if cli.cache {
        if let Some(cached) = file_io::read_if_present(tree, MAKE_DB_CACHE)? {
            info!("Using cached make database {MAKE_DB_CACHE}");
            return Ok(cached);
        }
        info!("No cached make database; running make");
    }

    let program = resolve_make_program();
    let jobs = cli
        .jobs
        .unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get));
    run_full_build(&program, root, jobs)?;
    let dump = capture_database(&program, root)?;
    info!("Caching make database to {MAKE_DB_CACHE}");
    file_io::write_artifact(tree, MAKE_DB_CACHE, dump.as_bytes())?;
    Ok(dump)
}

fn load_exclusions(path: Option<&Path>) -> Result<ExclusionConfig> {
    let Some(path) = path else {
        return Ok(ExclusionConfig::default());
    };
    let utf8 = Utf8Path::from_path(path).ok_or_else(|| RunnerError::NonUtf8Path {
        path: path.to_path_buf(),
    })?;
    Ok(ExclusionConfig::from_path(utf8)?)
}

/// Command line that re-runs this converter on the same tree.
fn regenerate_command(cli: &Cli, root: &Utf8Path) -> Result<String> {
    let exe = env::current_exe()
        .context("locate current executable")
        .and_then(|path| {
            Utf8PathBuf::from_path_buf(path)
                .map_err(|path_buf| RunnerError::NonUtf8Path { path: path_buf }.into())
        })?;
    let mut words = vec![exe.into_string(), "-C".to_owned(), root.to_string()];
    if let Some(path) = cli.exclusions.as_deref() {
        let absolute = Utf8Path::from_path(path)
            .ok_or_else(|| RunnerError::NonUtf8Path {
                path: path.to_path_buf(),
            })?
            .canonicalize_utf8()
            .with_context(|| format!("resolve {}", path.display()))?;
        words.push("--exclusions".to_owned());
        words.push(absolute.into_string());
    }
    shlex::try_join(words.iter().map(String::as_str)).context("quote regeneration command")
}

fn write_outputs(tree: &Dir, build_file: &str, graph: &BuildGraph) -> Result<()> {
    let ninja = ninja_gen::generate(graph).context("generate Ninja file")?;
    file_io::write_artifact(tree, build_file, ninja.as_bytes())?;
    info!(
        "Wrote {build_file} ({} rules, {} build statements)",
        graph.rules().len(),
        graph.edges().len()
    );

    let deps = deps_log::encode(&graph.deps)?;
    file_io::write_artifact(tree, DEPS_LOG, &deps)?;
    info!(
        "Wrote {DEPS_LOG} ({} targets, {} deps)",
        graph.deps.len(),
        graph.dep_count()
    );

    let mut log = Vec::new();
    build_log::write_log(&mut log, &graph.commands).context("format build log")?;
    file_io::write_artifact(tree, BUILD_LOG, &log)?;
    info!("Wrote {BUILD_LOG} ({} commands)", graph.commands.len());
    Ok(())
}
