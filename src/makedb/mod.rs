//! Make database conversion.
//!
//! [`convert`] walks the lines of a `make -p` dump once, classifies each
//! with [`classify::classify`], and accumulates the result in a
//! [`BuildGraph`]. A second pass over the same lines finds orphan files
//! which become inputs of the build file's own regeneration edge.
//!
//! Modification times are read from the tree while parsing. A missing object
//! behind a `cmd_` record is fatal because it means the preceding `make` run
//! did not finish; a missing object behind a `deps_` record only drops that
//! record. The aggregate target is logged with mtime `0` when it is absent.

pub mod classify;
mod error;
pub mod orphans;

pub use error::ConvertError;

use crate::graph::{
    BuildEdge, BuildGraph, CommandLogEntry, DepStyle, DependencyRecord, HandledFiles, Rule,
};
use crate::path_filter::PathFilter;
use camino::Utf8Path;
use classify::{AGGREGATE_TARGET, AssignmentKind, Record};
use itertools::Itertools;
use orphans::OrphanScan;
use regex::Regex;
use std::io;
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Objects whose `cmd_` variables do not describe a compile step.
const RESERVED_COMMAND_OBJECTS: &[&str] = &["files", AGGREGATE_TARGET];

/// Namespace of the per-option timestamp files `fixdep` emits.
const GENERATED_CONFIG_PREFIX: &str = "include/config/";

/// Marker preceding the depfile path inside a compiler flag.
const DEPFILE_FLAG: &str = "-MD";
const DEPFILE_SEPARATOR: &str = "-MD,";

/// Name of the rule that rebuilds the Ninja file.
pub const REGENERATE_RULE: &str = "regenerate_ninja";

/// Execution pool that keeps the console attached.
const CONSOLE_POOL: &str = "console";

/// `$(subst ...)` and `$(wildcard ...)` calls left unexpanded by `fixdep`.
#[expect(clippy::unwrap_used, reason = "pattern is a compile-time literal")]
static MAKE_FUNCTION_CALLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\((?:subst|wildcard)[^)]+\)").unwrap());

/// Settings for one conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Exclusion filter; its root is the build tree.
    pub filter: PathFilter,
    /// Name of the Ninja file, relative to the tree root.
    pub build_file: String,
    /// Command that regenerates the Ninja file.
    pub regenerate_command: String,
}

impl ConvertOptions {
    /// Options writing `build.ninja` and regenerating it with `kninja`.
    #[must_use]
    pub fn new(filter: PathFilter) -> Self {
        Self {
            filter,
            build_file: "build.ninja".to_owned(),
            regenerate_command: "kninja".to_owned(),
        }
    }
}

/// Convert database `lines` into a finalised [`BuildGraph`].
///
/// Comment and blank lines are expected to have been removed already; see
/// [`database_lines`].
///
/// # Errors
///
/// Returns [`ConvertError::MissingObject`] if an object named by a `cmd_`
/// record cannot be stat'ed.
pub fn convert<S: AsRef<str>>(
    lines: &[S],
    options: &ConvertOptions,
) -> Result<BuildGraph, ConvertError> {
    let mut converter = Converter::new(&options.filter);
    for line in lines {
        converter.process(line.as_ref())?;
    }

    let mut scan = OrphanScan::default();
    for line in lines {
        scan.scan_line(line.as_ref());
    }
    let orphans = scan.resolve(
        &options.filter,
        &converter.handled,
        converter.object_tree.is_some(),
    );
    debug!("Found {} orphan files", orphans.len());

    let mut graph = converter.graph;
    let mut rule = Rule::new(REGENERATE_RULE, escape_dollars(&options.regenerate_command));
    rule.pool = Some(CONSOLE_POOL.to_owned());
    rule.generator = true;
    graph.add_rule(rule);
    graph.add_edge(BuildEdge::new(
        options.build_file.clone(),
        REGENERATE_RULE,
        orphans.into_iter().map(camino::Utf8PathBuf::into_string).collect(),
    ));
    Ok(graph)
}

/// Drop comment and blank lines from a raw database dump.
#[must_use]
pub fn database_lines(dump: &str) -> Vec<&str> {
    dump.lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .collect()
}

/// Per-run parser state.
struct Converter<'f> {
    filter: &'f PathFilter,
    graph: BuildGraph,
    handled: HandledFiles,
    aggregate_seen: bool,
    source_tree: Option<String>,
    object_tree: Option<String>,
}

impl<'f> Converter<'f> {
    fn new(filter: &'f PathFilter) -> Self {
        Self {
            filter,
            graph: BuildGraph::default(),
            handled: HandledFiles::default(),
            aggregate_seen: false,
            source_tree: None,
            object_tree: None,
        }
    }

    fn process(&mut self, line: &str) -> Result<(), ConvertError> {
        match classify::classify(line) {
            Some(Record::Aggregate { deps }) => self.aggregate(&deps),
            Some(Record::SourceTree(path)) => self.source_tree = Some(path.to_owned()),
            Some(Record::ObjectTree(path)) => self.object_tree = Some(path.to_owned()),
            Some(Record::Combine { target, deps }) => self.combine(target, &deps),
            Some(Record::Assignment {
                kind,
                object,
                value,
            }) => match kind {
                AssignmentKind::Command => self.command(object, value)?,
                AssignmentKind::Deps => self.deps(object, value),
                AssignmentKind::Source => self.source(object, value),
            },
            None => {}
        }
        Ok(())
    }

    fn aggregate(&mut self, deps: &[&str]) {
        if self.aggregate_seen {
            return;
        }
        self.aggregate_seen = true;
        let Some(target) = self.filter.filter(AGGREGATE_TARGET) else {
            return;
        };

        let command = self.aggregate_command();
        debug!("{target} make command: {command}");
        let mtime = mtime_of(self.filter.root(), &target).unwrap_or_else(|err| {
            debug!("No modification time for {target}: {err}");
            0
        });
        let inputs = self.filter_all(deps.iter().copied());
        let name = rule_name(&target);

        let mut rule = Rule::new(name.clone(), escape_dollars(&command));
        rule.pool = Some(CONSOLE_POOL.to_owned());
        self.graph.add_rule(rule);
        self.add_edge(target.clone(), name, inputs);
        self.graph.commands.push(CommandLogEntry {
            target,
            mtime,
            command,
        });
    }

    /// Re-run `make all` with the aggregate target's own prerequisites
    /// removed, since Ninja has already brought them up to date.
    fn aggregate_command(&self) -> String {
        let mut makefile = String::from("Makefile");
        let mut out_of_tree = String::new();
        if let (Some(src), Some(obj)) = (&self.source_tree, &self.object_tree) {
            makefile = Utf8Path::new(src).join(&makefile).into_string();
            out_of_tree = format!(" -C{src} O={obj}");
        }
        format!("cat {makefile} | sed -e '/^$(vmlinux-dirs)/,+1d' | make -f - all{out_of_tree}")
    }

    fn combine(&mut self, target: &str, deps: &[&str]) {
        let Some(output) = self.filter.filter(target) else {
            return;
        };
        let inputs = self.filter_all(deps.iter().copied());
        let rule = rule_name(&output);
        self.add_edge(output, rule, inputs);
    }

    fn command(&mut self, object: &str, value: &str) -> Result<(), ConvertError> {
        if RESERVED_COMMAND_OBJECTS.contains(&object) {
            return Ok(());
        }
        let Some(target) = self.filter.filter(object) else {
            return Ok(());
        };
        let name = rule_name(&target);
        let depfile = depfile_of(value);
        let command = value.split_whitespace().join(" ");
        if self.graph.has_rule(&name) {
            debug!("Ignoring duplicate rule {name}");
            return Ok(());
        }

        let mtime = self.required_mtime(&target)?;
        let mut rule = Rule::new(name, command.clone());
        if let Some(depfile) = depfile {
            self.handled.insert(depfile.clone());
            rule.depfile = Some(depfile);
            rule.dep_style = Some(DepStyle::Gcc);
        }
        self.graph.add_rule(rule);
        self.handled.insert(target.clone());
        self.graph.commands.push(CommandLogEntry {
            target,
            mtime,
            command,
        });
        Ok(())
    }

    fn deps(&mut self, object: &str, value: &str) {
        let Some(target) = self.filter.filter(object) else {
            return;
        };
        let mtime = match mtime_of(self.filter.root(), &target) {
            Ok(mtime) => mtime,
            Err(err) => {
                debug!("Dropping dependencies of {target}: {err}");
                return;
            }
        };
        let stripped = MAKE_FUNCTION_CALLS.replace_all(value, "");
        let deps = self.filter_all(
            stripped
                .split_whitespace()
                .filter(|dep| !dep.starts_with(GENERATED_CONFIG_PREFIX)),
        );
        self.handled.extend(deps.iter().cloned());
        self.handled.insert(target.clone());
        self.graph.deps.push(DependencyRecord {
            target,
            mtime,
            deps,
        });
    }

    fn source(&mut self, object: &str, value: &str) {
        let Some(output) = self.filter.filter(object) else {
            return;
        };
        let inputs = self.filter_all(value.split_whitespace());
        let rule = rule_name(&output);
        self.add_edge(output, rule, inputs);
    }

    fn add_edge(&mut self, output: String, rule: String, inputs: Vec<String>) {
        self.handled.extend(inputs.iter().cloned());
        self.handled.insert(output.clone());
        self.graph.add_edge(BuildEdge::new(output, rule, inputs));
    }

    fn filter_all<'a>(&self, paths: impl Iterator<Item = &'a str>) -> Vec<String> {
        paths.filter_map(|path| self.filter.filter(path)).collect()
    }

    fn required_mtime(&self, path: &str) -> Result<u64, ConvertError> {
        mtime_of(self.filter.root(), path).map_err(|source| ConvertError::MissingObject {
            path: path.to_owned(),
            source,
        })
    }
}

/// Rule name for `object`, flattened so it is a single identifier.
fn rule_name(object: &str) -> String {
    format!("cmd_{}", object.replace('/', "_"))
}

/// Extract the depfile from the first `-MD,<path>` flag in `command`.
fn depfile_of(command: &str) -> Option<String> {
    let Some(tokens) = shlex::split(command) else {
        debug!("Cannot tokenise command: {command}");
        return None;
    };
    tokens
        .iter()
        .filter(|token| token.contains(DEPFILE_FLAG))
        .filter_map(|token| token.split_once(DEPFILE_SEPARATOR))
        .find(|(_, depfile)| !depfile.is_empty())
        .map(|(_, depfile)| depfile.to_owned())
}

/// Escape `$` so Ninja passes it through to the shell.
fn escape_dollars(command: &str) -> String {
    command.replace('$', "$$")
}

/// Modification time of `root/path` in nanoseconds since the epoch.
fn mtime_of(root: &Utf8Path, path: &str) -> io::Result<u64> {
    let modified = root.join(path).metadata()?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    u64::try_from(since_epoch.as_nanos())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("gcc -Wp,-MD,init/.main.o.d -c -o init/main.o init/main.c", Some("init/.main.o.d"))]
    #[case("gcc -c -o init/main.o init/main.c", None)]
    #[case("gcc -MD -c init/main.c", None)]
    #[case("gcc -Wp,-MD, -c init/main.c", None)]
    #[case("gcc -DNAME='\"unterminated -Wp,-MD,x.d", None)]
    #[case("gcc -MD -Wp,-MD,fs/.open.o.d -c fs/open.c", Some("fs/.open.o.d"))]
    #[case("gcc -Wp,-MD, -Wp,-MD,fs/.open.o.d -c fs/open.c", Some("fs/.open.o.d"))]
    fn depfile_extraction(#[case] command: &str, #[case] expected: Option<&str>) {
        assert_eq!(depfile_of(command).as_deref(), expected);
    }

    #[rstest]
    fn rule_names_are_flat() {
        assert_eq!(rule_name("drivers/net/e1000.o"), "cmd_drivers_net_e1000.o");
    }

    #[rstest]
    fn dollars_are_escaped() {
        assert_eq!(escape_dollars("echo $(x) $$"), "echo $$(x) $$$$");
    }

    #[rstest]
    fn database_lines_skip_comments_and_blanks() {
        let dump = "# Variables\n\nO = /build\n  \n# end\ncmd_a.o := cc\n";
        assert_eq!(database_lines(dump), vec!["O = /build", "cmd_a.o := cc"]);
    }

    #[rstest]
    fn make_function_calls_are_erased() {
        let value = "a.h $(wildcard include/config/x.h) b.h $(subst :, ,x)";
        let stripped = MAKE_FUNCTION_CALLS.replace_all(value, "");
        assert_eq!(stripped.split_whitespace().collect::<Vec<_>>(), vec!["a.h", "b.h"]);
    }
}
