//! Orphan-file discovery.
//!
//! The structured records only capture part of what the database mentions.
//! Files referenced anywhere else (Kconfig sources, Makefiles, scripts) still
//! influence the build, so when they change the graph must be regenerated.
//! This module finds them by a coarse token scan of the whole database.

use crate::graph::HandledFiles;
use crate::path_filter::PathFilter;
use camino::Utf8PathBuf;
use std::collections::{BTreeSet, HashSet};

const MIN_CANDIDATE_LEN: usize = 4;

const IGNORED_PREFIXES: &[&str] = &["CONFIG_", "cmd_", "deps_"];

const IGNORED_SUFFIXES: &[&str] = &[
    ".cmd",
    ".d",
    "modules.order",
    "modules.builtin",
    ".config",
    "auto.conf",
    ".tmp",
    ".ninja",
    ".makedb",
];

/// Tokens collected from one pass over the database.
#[derive(Debug, Default)]
pub struct OrphanScan {
    candidates: BTreeSet<String>,
    generated: HashSet<String>,
}

impl OrphanScan {
    /// Record the tokens of one database line.
    pub fn scan_line(&mut self, line: &str) {
        let mut fields = line.split_whitespace();
        let Some(leading) = fields.next() else {
            return;
        };
        let declares_target = leading.ends_with(':') && fields.next().is_some();
        for token in line.split_whitespace() {
            if declares_target && token == leading {
                self.generated
                    .insert(token.trim_end_matches(':').to_owned());
            } else if is_candidate(token) {
                self.candidates.insert(token.to_owned());
            }
        }
    }

    /// Resolve the candidates to existing files not otherwise accounted for.
    ///
    /// The result holds absolute paths in sorted order. When `object_tree` is
    /// set, the tree's top-level `Makefile` is left out: `make` rewrites it on
    /// every invocation.
    #[must_use]
    pub fn resolve(
        &self,
        filter: &PathFilter,
        handled: &HandledFiles,
        object_tree: bool,
    ) -> Vec<Utf8PathBuf> {
        let mut known: HashSet<Utf8PathBuf> = self
            .generated
            .iter()
            .chain(handled)
            .map(|path| filter.absolute(path))
            .collect();
        if object_tree {
            known.insert(filter.absolute("Makefile"));
        }
        self.candidates
            .iter()
            .filter_map(|token| filter.filter(token))
            .map(|path| filter.absolute(&path))
            .filter(|path| !known.contains(path))
            .filter(|path| path.is_file())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn is_candidate(token: &str) -> bool {
    token.len() >= MIN_CANDIDATE_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        && !token.starts_with('/')
        && !token.starts_with('-')
        && !token.ends_with("..")
        && !IGNORED_PREFIXES.iter().any(|prefix| token.starts_with(prefix))
        && !IGNORED_SUFFIXES.iter().any(|suffix| token.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExclusionConfig;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    #[rstest]
    #[case("init/Kconfig", true)]
    #[case("Makefile", true)]
    #[case("a.c", false)]
    #[case("/usr/include/stdio.h", false)]
    #[case("-Wall", false)]
    #[case("../..", false)]
    #[case("CONFIG_SMP", false)]
    #[case("cmd_init/main.o", false)]
    #[case("init/.main.o.cmd", false)]
    #[case("init/main.o.d", false)]
    #[case("modules.order", false)]
    #[case("$(srctree)/Makefile", false)]
    #[case("foo:bar", false)]
    fn candidate_tokens(#[case] token: &str, #[case] expected: bool) {
        assert_eq!(is_candidate(token), expected, "{token}");
    }

    #[rstest]
    fn declared_targets_are_not_candidates() {
        let mut scan = OrphanScan::default();
        scan.scan_line("include/generated/autoconf.h: include/config/auto.conf");
        assert!(scan.generated.contains("include/generated/autoconf.h"));
        assert!(!scan.candidates.contains("include/generated/autoconf.h:"));
    }

    #[rstest]
    fn resolve_keeps_unhandled_existing_files() {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        for name in ["Kconfig", "Makefile", "handled.c", "gen.h", "init/version.o"] {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(&path, "").expect("write");
        }
        let config = ExclusionConfig {
            ignore: vec!["init/version.o".into()],
            ignore_patterns: Vec::new(),
        };
        let filter = PathFilter::new(&config, root.clone()).expect("filter");
        let mut scan = OrphanScan::default();
        scan.scan_line("source Kconfig Makefile handled.c missing.c init/version.o");
        scan.scan_line("gen.h: Kconfig");
        let handled: HandledFiles = ["handled.c".to_owned()].into_iter().collect();

        let orphans = scan.resolve(&filter, &handled, true);
        assert_eq!(orphans, vec![root.join("Kconfig")]);

        let in_tree = scan.resolve(&filter, &handled, false);
        assert_eq!(in_tree, vec![root.join("Kconfig"), root.join("Makefile")]);
    }
}
