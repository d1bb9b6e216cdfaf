//! Ninja file generator.
//!
//! This module converts a [`crate::graph::BuildGraph`] into the textual
//! representation expected by the Ninja build system. Rules and edges are
//! emitted in registration order, which the converter keeps deterministic.

use crate::graph::{BuildEdge, BuildGraph, Rule};
use itertools::Itertools;
use std::fmt::{self, Display, Formatter, Write};

macro_rules! write_kv {
    ($f:expr, $key:expr, $opt:expr) => {
        if let Some(val) = $opt {
            writeln!($f, "  {} = {}", $key, val)?;
        }
    };
}

macro_rules! write_flag {
    ($f:expr, $key:expr, $cond:expr) => {
        if $cond {
            writeln!($f, "  {} = 1", $key)?;
        }
    };
}

/// Generate a Ninja build file as a string.
///
/// # Errors
///
/// Returns [`fmt::Error`] if formatting into the output buffer fails.
///
/// # Examples
///
/// ```
/// use kninja::graph::{BuildEdge, BuildGraph, Rule};
/// use kninja::ninja_gen::generate;
///
/// let mut graph = BuildGraph::default();
/// graph.add_rule(Rule::new("cmd_a.o", "cc -c a.c"));
/// graph.add_edge(BuildEdge::new("a.o", "cmd_a.o", vec!["a.c".into()]));
/// let ninja = generate(&graph).expect("generate");
/// assert!(ninja.contains("build a.o: cmd_a.o a.c\n"));
/// ```
pub fn generate(graph: &BuildGraph) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for rule in graph.rules() {
        write!(out, "{}", DisplayRule(rule))?;
    }
    for edge in graph.edges() {
        write!(out, "{}", DisplayEdge(edge))?;
    }
    Ok(out)
}

/// Escape a path for use in a build statement.
fn escape_path(path: &str) -> String {
    path.replace('$', "$$")
        .replace(' ', "$ ")
        .replace(':', "$:")
}

fn join(paths: &[String]) -> String {
    paths.iter().map(|p| escape_path(p)).join(" ")
}

/// Wrapper struct to display a rule block.
struct DisplayRule<'a>(&'a Rule);

impl Display for DisplayRule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rule = self.0;
        writeln!(f, "rule {}", rule.name)?;
        writeln!(f, "  command = {}", rule.command)?;
        write_kv!(f, "depfile", &rule.depfile);
        write_flag!(f, "generator", rule.generator);
        write_kv!(f, "pool", &rule.pool);
        write_kv!(f, "deps", rule.dep_style.map(|style| style.as_str()));
        writeln!(f)
    }
}

/// Wrapper struct to display a build edge.
struct DisplayEdge<'a>(&'a BuildEdge);

impl Display for DisplayEdge<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let edge = self.0;
        write!(f, "build {}: {}", escape_path(&edge.output), edge.rule)?;
        if !edge.inputs.is_empty() {
            write!(f, " {}", join(&edge.inputs))?;
        }
        writeln!(f)?;
        writeln!(f)
    }
}
