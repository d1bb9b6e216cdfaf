//! Line classification for `make -p` output.
//!
//! Each classifier is a pure predicate that either recognises a line and
//! returns the [`Record`] it describes, or declines. [`CLASSIFIERS`] lists
//! them in priority order and [`classify`] returns the first match.

/// Top-level link target whose prerequisites are the combined subsystem
/// objects.
pub const AGGREGATE_TARGET: &str = "vmlinux";

/// Prerequisite make uses to force a recipe to run.
pub const FORCE: &str = "FORCE";

/// Prerequisites of the aggregate target that are not files.
const AGGREGATE_META: &[&str] = &["autoksyms_recursive", "vmlinux_prereq", FORCE];

/// Target suffixes of objects assembled from other objects.
const COMBINE_SUFFIXES: &[&str] = &[".o", ".ko", ".a"];

/// Substrings marking a dependency line as a pattern rule, a compile step or
/// the link-time intermediate rather than a pure combine step.
const COMBINE_REJECT: &[&str] = &["%", ".h", ".S", ".c", "vmlinux.o"];

const SOURCE_TREE_PREFIX: &str = "KBUILD_SRC = ";
const OBJECT_TREE_PREFIX: &str = "O = ";
const ASSIGNMENT_SEPARATOR: &str = " := ";

/// A recognised database line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record<'a> {
    /// `vmlinux: <deps>` with meta prerequisites removed.
    Aggregate {
        /// Real prerequisites of the aggregate target.
        deps: Vec<&'a str>,
    },
    /// `KBUILD_SRC = <path>`.
    SourceTree(&'a str),
    /// `O = <path>`.
    ObjectTree(&'a str),
    /// `<obj>: <deps> FORCE` for an object linked from other objects.
    Combine {
        /// Object being assembled.
        target: &'a str,
        /// Constituent objects, without the force marker.
        deps: Vec<&'a str>,
    },
    /// `<prefix>_<obj> := <value>`.
    Assignment {
        /// Which Kbuild variable family the line belongs to.
        kind: AssignmentKind,
        /// Object named by the variable.
        object: &'a str,
        /// Raw right-hand side.
        value: &'a str,
    },
}

/// Kbuild per-object variables the converter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// `cmd_<obj>`: the command that built the object.
    Command,
    /// `deps_<obj>`: dependencies discovered by `fixdep`.
    Deps,
    /// `source_<obj>`: the source the object was compiled from.
    Source,
}

impl AssignmentKind {
    const ALL: [Self; 3] = [Self::Command, Self::Deps, Self::Source];

    /// Variable-name prefix for this family.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Command => "cmd_",
            Self::Deps => "deps_",
            Self::Source => "source_",
        }
    }
}

/// A classifier tagged with the record type it produces.
pub type Classifier = fn(&str) -> Option<Record<'_>>;

/// Classifiers in the order they are tried.
pub const CLASSIFIERS: &[(&str, Classifier)] = &[
    ("aggregate", aggregate),
    ("source-tree", source_tree),
    ("object-tree", object_tree),
    ("combine-object", combine_object),
    ("assignment", assignment),
];

/// Classify `line`, returning `None` for lines the converter ignores.
#[must_use]
pub fn classify(line: &str) -> Option<Record<'_>> {
    let trimmed = line.trim_end();
    CLASSIFIERS
        .iter()
        .find_map(|(_, classifier)| classifier(trimmed))
}

fn aggregate(line: &str) -> Option<Record<'_>> {
    let rest = line
        .strip_prefix(AGGREGATE_TARGET)
        .and_then(|r| r.strip_prefix(": "))?;
    let deps = rest
        .split_whitespace()
        .filter(|dep| !AGGREGATE_META.contains(dep))
        .collect();
    Some(Record::Aggregate { deps })
}

fn source_tree(line: &str) -> Option<Record<'_>> {
    line.strip_prefix(SOURCE_TREE_PREFIX)
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(Record::SourceTree)
}

fn object_tree(line: &str) -> Option<Record<'_>> {
    line.strip_prefix(OBJECT_TREE_PREFIX)
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(Record::ObjectTree)
}

fn combine_object(line: &str) -> Option<Record<'_>> {
    let (target, rhs) = line.split_once(": ")?;
    if !COMBINE_SUFFIXES.iter().any(|suffix| target.ends_with(suffix)) {
        return None;
    }
    if !rhs.split_whitespace().any(|dep| dep == FORCE) {
        return None;
    }
    if COMBINE_REJECT.iter().any(|marker| line.contains(marker)) {
        return None;
    }
    let deps = rhs.split_whitespace().filter(|dep| *dep != FORCE).collect();
    Some(Record::Combine { target, deps })
}

fn assignment(line: &str) -> Option<Record<'_>> {
    let (name, value) = line.split_once(ASSIGNMENT_SEPARATOR)?;
    AssignmentKind::ALL.into_iter().find_map(|kind| {
        name.strip_prefix(kind.prefix())
            .filter(|object| !object.is_empty())
            .map(|object| Record::Assignment {
                kind,
                object,
                value,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn aggregate_drops_meta_prerequisites() {
        let record = classify("vmlinux: autoksyms_recursive a.o b.o FORCE vmlinux_prereq");
        assert_eq!(
            record,
            Some(Record::Aggregate {
                deps: vec!["a.o", "b.o"]
            })
        );
    }

    #[rstest]
    #[case("KBUILD_SRC = /src/linux", Some(Record::SourceTree("/src/linux")))]
    #[case("O = /build", Some(Record::ObjectTree("/build")))]
    #[case("KBUILD_SRC =", None)]
    fn tree_declarations(#[case] line: &str, #[case] expected: Option<Record<'static>>) {
        assert_eq!(classify(line), expected);
    }

    #[rstest]
    #[case("fs/built-in.a: fs/open.o fs/read_write.o FORCE", true)]
    #[case("drivers/foo.ko: drivers/foo.o drivers/foo.mod.o FORCE", true)]
    #[case("fs/built-in.a: fs/open.o fs/read_write.o", false)]
    #[case("%.o: %.c FORCE", false)]
    #[case("init/main.o: init/main.c FORCE", false)]
    #[case("arch/x86/entry/entry_64.o: arch/x86/entry/entry_64.S FORCE", false)]
    #[case("kernel/bounds.o: include/generated/bounds.h FORCE", false)]
    #[case("vmlinux.o: fs/built-in.a FORCE", false)]
    fn combine_object_lines(#[case] line: &str, #[case] matches: bool) {
        let is_combine = matches!(classify(line), Some(Record::Combine { .. }));
        assert_eq!(is_combine, matches, "{line}");
    }

    #[rstest]
    fn combine_object_strips_force() {
        assert_eq!(
            classify("lib/lib.a: lib/a.o FORCE lib/b.o"),
            Some(Record::Combine {
                target: "lib/lib.a",
                deps: vec!["lib/a.o", "lib/b.o"],
            })
        );
    }

    #[rstest]
    #[case("cmd_init/main.o := gcc -c", AssignmentKind::Command, "init/main.o", "gcc -c")]
    #[case("deps_init/main.o := a.h b.h", AssignmentKind::Deps, "init/main.o", "a.h b.h")]
    #[case("source_init/main.o := init/main.c", AssignmentKind::Source, "init/main.o", "init/main.c")]
    fn assignment_lines(
        #[case] line: &str,
        #[case] kind: AssignmentKind,
        #[case] object: &str,
        #[case] value: &str,
    ) {
        assert_eq!(
            classify(line),
            Some(Record::Assignment {
                kind,
                object,
                value
            })
        );
    }

    #[rstest]
    #[case("cmd_init/main.o = gcc -c")]
    #[case("CFLAGS := -O2")]
    #[case("cmd_ := nothing")]
    #[case("random text")]
    fn unrecognised_lines_are_ignored(#[case] line: &str) {
        assert_eq!(classify(line), None);
    }
}
