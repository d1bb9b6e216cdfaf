//! Exclusion rulesets for the path filter.
//!
//! Some Kbuild objects are rewritten during the final link, or feed generated
//! files into steps Ninja never sees. Building them from Ninja would make
//! `make` and `ninja` disagree about what is up to date, so they are kept out
//! of the generated graph entirely. The lists are plain data: the built-in
//! [`ExclusionConfig::default`] mirrors the Linux tree, and a YAML file can
//! replace either list for other trees.
//!
//! ```yaml
//! ignore:
//!   - init/version.o
//! ignore_patterns:
//!   - scripts/mod/*
//! ```

use camino::Utf8Path;
use miette::Diagnostic;
use serde::Deserialize;
use std::{fs, io};
use thiserror::Error;

const DEFAULT_IGNORE: &[&str] = &[
    "arch/arm/boot/compressed/piggy.o",
    "arch/x86/boot/cpu.o",
    "arch/x86/boot/compressed/misc.o",
    "arch/x86/boot/compressed/piggy.o",
    "arch/x86/boot/header.o",
    "arch/x86/boot/version.o",
    "arch/x86/realmode/rmpiggy.o",
    "init/version.o",
    "lib/gen_crc32table",
    "scripts/basic/bin2c",
    "scripts/basic/fixdep",
    "scripts/mod/empty.o",
    "scripts/mod/mk_elfconfig",
    "scripts/pnmtologo",
    "usr/gen_init_cpio",
    "vmlinux.o",
];

const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "arch/x86/realmode/rm/*",
    "arch/x86/entry/vdso/*",
    "arch/arm/vdso/*",
    "arch/x86/tools/*",
    "scripts/mod/*",
];

/// Exact and glob exclusion lists consumed by [`crate::path_filter::PathFilter`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExclusionConfig {
    /// Paths excluded by exact match.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
    /// Shell-style patterns (`*` and `?`) excluding every matching path.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            ignore: default_ignore(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

impl ExclusionConfig {
    /// Parse a ruleset from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is not a valid ruleset.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Load a ruleset from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when its contents are invalid.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned().into_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|s| (*s).to_owned()).collect()
}

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS
        .iter()
        .map(|s| (*s).to_owned())
        .collect()
}

/// Errors raised while loading an exclusion ruleset.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The ruleset file could not be read.
    #[error("failed to read exclusion file {path}")]
    #[diagnostic(code(kninja::config::read))]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The ruleset document is malformed.
    #[error("invalid exclusion file: {message}")]
    #[diagnostic(
        code(kninja::config::parse),
        help("expected a mapping with optional `ignore` and `ignore_patterns` lists")
    )]
    Parse {
        /// Parser error text.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn default_ruleset_contains_kernel_objects() {
        let config = ExclusionConfig::default();
        assert!(config.ignore.iter().any(|p| p == "init/version.o"));
        assert!(config.ignore_patterns.iter().any(|p| p == "scripts/mod/*"));
    }

    #[rstest]
    fn missing_keys_fall_back_to_defaults() {
        let config = ExclusionConfig::from_yaml("ignore:\n  - a.o\n").expect("parse");
        assert_eq!(config.ignore, vec!["a.o".to_owned()]);
        assert_eq!(config.ignore_patterns, default_ignore_patterns());
    }

    #[rstest]
    fn unknown_keys_are_rejected() {
        let err = ExclusionConfig::from_yaml("ignores: []\n").expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
