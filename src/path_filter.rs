//! Path exclusion and normalisation.
//!
//! Every path headed for the build graph passes through [`PathFilter::filter`].
//! Excluded paths are dropped; paths spelled with `..` segments are rewritten
//! to a single canonical relative spelling so the same file never appears
//! under two names.

use crate::config::ExclusionConfig;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern, PatternError};
use miette::Diagnostic;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// `fnmatch` semantics: `*` crosses directory separators and leading dots
/// need no literal match.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Errors raised while compiling exclusion patterns.
#[derive(Debug, Error, Diagnostic)]
pub enum FilterError {
    /// An exclusion pattern could not be compiled.
    #[error("invalid exclusion pattern '{pattern}'")]
    #[diagnostic(code(kninja::path_filter::pattern))]
    Pattern {
        /// The offending pattern as configured.
        pattern: String,
        /// Compiler error.
        #[source]
        source: PatternError,
    },
}

/// Exclusion predicate and `..` normaliser for candidate paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    root: Utf8PathBuf,
    exact: HashSet<String>,
    patterns: Vec<Pattern>,
}

impl PathFilter {
    /// Build a filter from `config`, resolving relative paths against `root`.
    ///
    /// `root` should be absolute; it stands in for the working directory of
    /// the build tree.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Pattern`] if any pattern fails to compile.
    pub fn new(config: &ExclusionConfig, root: impl Into<Utf8PathBuf>) -> Result<Self, FilterError> {
        let patterns = config
            .ignore_patterns
            .iter()
            .map(|raw| compile_pattern(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            root: root.into(),
            exact: config.ignore.iter().cloned().collect(),
            patterns,
        })
    }

    /// Directory relative paths are resolved against.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Return `true` when `path` is named by the exact or glob exclusion lists.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exact.contains(path)
            || self
                .patterns
                .iter()
                .any(|pattern| pattern.matches_with(path, MATCH_OPTIONS))
    }

    /// Normalise `path` and return it unless it is excluded.
    #[must_use]
    pub fn filter(&self, path: &str) -> Option<String> {
        let normalised = if has_parent_segment(path) {
            relative_to(&self.absolute(path), &self.root).into_string()
        } else {
            path.to_owned()
        };
        if self.is_excluded(&normalised) {
            debug!("Ignoring {normalised}");
            return None;
        }
        Some(normalised)
    }

    /// Resolve `path` against the root and remove `.` and `..` segments
    /// lexically.
    #[must_use]
    pub fn absolute(&self, path: &str) -> Utf8PathBuf {
        lexical_normalise(&self.root.join(path))
    }
}

/// Compile a shell glob where only `*` and `?` are special.
///
/// Runs of `*` collapse to one so `glob` never sees a recursive wildcard.
fn compile_pattern(raw: &str) -> Result<Pattern, FilterError> {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '[' => escaped.push_str("[[]"),
            ']' => escaped.push_str("[]]"),
            '*' if escaped.ends_with('*') => {}
            _ => escaped.push(c),
        }
    }
    Pattern::new(&escaped).map_err(|source| FilterError::Pattern {
        pattern: raw.to_owned(),
        source,
    })
}

fn has_parent_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

fn lexical_normalise(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                // `..` above the filesystem root stays at the root.
                out.pop();
            }
            other => out.push(other.as_str()),
        }
    }
    out
}

/// Express absolute `path` relative to absolute `base`.
fn relative_to(path: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    let mut ours = path.components().peekable();
    let mut theirs = base.components().peekable();
    while let (Some(a), Some(b)) = (ours.peek(), theirs.peek()) {
        if a != b {
            break;
        }
        ours.next();
        theirs.next();
    }
    let mut out = Utf8PathBuf::new();
    for _ in theirs {
        out.push("..");
    }
    for component in ours {
        out.push(component.as_str());
    }
    if out.as_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn filter() -> PathFilter {
        let config = ExclusionConfig {
            ignore: vec!["init/version.o".into(), "vmlinux.o".into()],
            ignore_patterns: vec!["scripts/mod/*".into(), "arch/x86/boot/?.o".into()],
        };
        PathFilter::new(&config, "/tree").expect("filter")
    }

    #[rstest]
    #[case("init/version.o")]
    #[case("scripts/mod/modpost.o")]
    #[case("scripts/mod/deep/nested.o")]
    #[case("arch/x86/boot/a.o")]
    #[case("drivers/../init/version.o")]
    fn excluded_paths_are_dropped(filter: PathFilter, #[case] path: &str) {
        assert_eq!(filter.filter(path), None);
    }

    #[rstest]
    #[case("init/main.o", "init/main.o")]
    #[case("arch/x86/boot/ab.o", "arch/x86/boot/ab.o")]
    #[case("Scripts/mod/x.o", "Scripts/mod/x.o")]
    #[case("drivers/net/../block/loop.o", "drivers/block/loop.o")]
    #[case("../linux/include/x.h", "../linux/include/x.h")]
    #[case("a/./../b.o", "b.o")]
    fn kept_paths_are_normalised(filter: PathFilter, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(filter.filter(path).as_deref(), Some(expected));
    }

    #[rstest]
    fn brackets_are_literal() {
        let config = ExclusionConfig {
            ignore: Vec::new(),
            ignore_patterns: vec!["gen/[ab].o".into()],
        };
        let filter = PathFilter::new(&config, "/tree").expect("filter");
        assert!(filter.is_excluded("gen/[ab].o"));
        assert!(!filter.is_excluded("gen/a.o"));
    }

    #[rstest]
    #[case("arch/**.o", "arch/x86/a.o")]
    #[case("**.o", "fs/open.o")]
    #[case("lib/***/gen_*", "lib/x/gen_crc")]
    fn repeated_stars_match_like_one(#[case] pattern: &str, #[case] path: &str) {
        let config = ExclusionConfig {
            ignore: Vec::new(),
            ignore_patterns: vec![pattern.into()],
        };
        let filter = PathFilter::new(&config, "/tree").expect("filter");
        assert!(filter.is_excluded(path));
        assert!(!filter.is_excluded("drivers/a.c"));
    }

    #[rstest]
    fn absolute_resolves_against_root(filter: PathFilter) {
        assert_eq!(filter.absolute("a/../b/./c"), Utf8PathBuf::from("/tree/b/c"));
        assert_eq!(filter.absolute("/etc/../usr"), Utf8PathBuf::from("/usr"));
    }
}
