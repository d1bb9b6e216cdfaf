//! Normalised build graph extracted from a make database.
//!
//! The graph mirrors what Ninja needs to take over a tree that `make` has
//! already built: rules and build edges for `build.ninja`, implicit
//! dependency records for `.ninja_deps`, and command entries for
//! `.ninja_log`. It carries no Ninja syntax; see [`crate::ninja_gen`],
//! [`crate::deps_log`] and [`crate::build_log`] for the encoders.
//!
//! # Examples
//!
//! ```
//! use kninja::graph::{BuildEdge, BuildGraph, Rule};
//!
//! let mut graph = BuildGraph::default();
//! assert!(graph.add_rule(Rule::new("cmd_init_main.o", "cc -c init/main.c")));
//! assert!(!graph.add_rule(Rule::new("cmd_init_main.o", "cc -O2 -c init/main.c")));
//! assert!(graph.add_edge(BuildEdge::new("init/main.o", "cmd_init_main.o", vec!["init/main.c".into()])));
//! assert_eq!(graph.rules().len(), 1);
//! ```

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Dependency style Ninja uses to read a rule's depfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepStyle {
    /// Makefile-syntax depfile written by a GCC-compatible compiler.
    Gcc,
}

impl DepStyle {
    /// Value of the `deps` rule variable.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gcc => "gcc",
        }
    }
}

/// A named command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Unique rule name.
    pub name: String,
    /// Shell command, whitespace-collapsed.
    pub command: String,
    /// Execution pool, e.g. `console`.
    pub pool: Option<String>,
    /// Depfile written by the command.
    pub depfile: Option<String>,
    /// How Ninja should parse [`Rule::depfile`].
    pub dep_style: Option<DepStyle>,
    /// Whether the rule regenerates the build file itself.
    pub generator: bool,
}

impl Rule {
    /// Create a plain rule with no pool, depfile or generator flag.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            pool: None,
            depfile: None,
            dep_style: None,
            generator: false,
        }
    }
}

/// One output produced by a rule from an ordered list of inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEdge {
    /// Path produced by the edge.
    pub output: String,
    /// Name of the rule that produces it.
    pub rule: String,
    /// Explicit inputs in declaration order.
    pub inputs: Vec<String>,
}

impl BuildEdge {
    /// Create a build edge.
    #[must_use]
    pub fn new(output: impl Into<String>, rule: impl Into<String>, inputs: Vec<String>) -> Self {
        Self {
            output: output.into(),
            rule: rule.into(),
            inputs,
        }
    }
}

/// Compiler-discovered dependencies of a target, for `.ninja_deps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    /// Target the dependencies belong to.
    pub target: String,
    /// Target modification time in nanoseconds since the epoch.
    pub mtime: u64,
    /// Dependency paths in their recorded order.
    pub deps: Vec<String>,
}

/// A command already run by `make`, for `.ninja_log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLogEntry {
    /// Path the command produced.
    pub target: String,
    /// Target modification time in nanoseconds since the epoch.
    pub mtime: u64,
    /// Command text exactly as Ninja will run it.
    pub command: String,
}

/// The complete result of one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildGraph {
    rules: IndexMap<String, Rule>,
    edges: IndexMap<String, BuildEdge>,
    /// Implicit dependency records in registration order.
    pub deps: Vec<DependencyRecord>,
    /// Command log entries in registration order.
    pub commands: Vec<CommandLogEntry>,
}

impl BuildGraph {
    /// Register `rule` unless a rule with the same name exists.
    ///
    /// Returns `false` when the rule was discarded as a duplicate.
    pub fn add_rule(&mut self, rule: Rule) -> bool {
        if self.rules.contains_key(&rule.name) {
            debug!("Ignoring duplicate rule {}", rule.name);
            return false;
        }
        self.rules.insert(rule.name.clone(), rule);
        true
    }

    /// Register `edge` unless another edge already produces its output.
    ///
    /// Returns `false` when the edge was discarded.
    pub fn add_edge(&mut self, edge: BuildEdge) -> bool {
        if self.edges.contains_key(&edge.output) {
            debug!("Ignoring second build statement for {}", edge.output);
            return false;
        }
        self.edges.insert(edge.output.clone(), edge);
        true
    }

    /// Return `true` if a rule named `name` has been registered.
    #[must_use]
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Rules in registration order.
    pub fn rules(&self) -> impl ExactSizeIterator<Item = &Rule> {
        self.rules.values()
    }

    /// Build edges in registration order.
    pub fn edges(&self) -> impl ExactSizeIterator<Item = &BuildEdge> {
        self.edges.values()
    }

    /// Look up the edge producing `output`.
    #[must_use]
    pub fn edge(&self, output: &str) -> Option<&BuildEdge> {
        self.edges.get(output)
    }

    /// Look up a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Total number of dependency paths across all records.
    #[must_use]
    pub fn dep_count(&self) -> usize {
        self.deps.iter().map(|record| record.deps.len()).sum()
    }
}

/// Paths already represented in the graph, in first-seen order.
pub type HandledFiles = IndexSet<String>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn first_rule_wins() {
        let mut graph = BuildGraph::default();
        assert!(graph.add_rule(Rule::new("r", "first")));
        assert!(!graph.add_rule(Rule::new("r", "second")));
        assert_eq!(graph.rule("r").map(|r| r.command.as_str()), Some("first"));
    }

    #[rstest]
    fn one_edge_per_output() {
        let mut graph = BuildGraph::default();
        assert!(graph.add_edge(BuildEdge::new("a.o", "r1", vec!["a.c".into()])));
        assert!(!graph.add_edge(BuildEdge::new("a.o", "r2", Vec::new())));
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(graph.edge("a.o").map(|e| e.rule.as_str()), Some("r1"));
    }
}
