//! Integration tests for the `kninja` binary using `assert_cmd`.
//!
//! These tests run the compiled binary against scratch build trees, either
//! reusing a cached make database or replaying one through a fake `make`.

use anyhow::{Context, Result, ensure};
use assert_cmd::Command;
use make_env::MAKE_ENV;
use predicates::prelude::*;
use test_support::{BuildTree, FakeMake};

const DATABASE: &str = "\
# GNU Make 4.3
O = /unused
cmd_init/main.o := gcc -Wp,-MD,init/.main.o.d -c -o init/main.o init/main.c
source_init/main.o := init/main.c
deps_init/main.o := include/linux/kernel.h
";

fn built_tree() -> BuildTree {
    let tree = BuildTree::new();
    tree.touch_all(&["init/main.c", "init/main.o", "include/linux/kernel.h"]);
    tree
}

fn kninja(tree: &BuildTree) -> Result<Command> {
    let mut cmd = Command::cargo_bin("kninja").context("locate kninja binary")?;
    cmd.arg("-C").arg(tree.root().as_str());
    Ok(cmd)
}

#[test]
fn cached_database_skips_make() -> Result<()> {
    let tree = built_tree();
    tree.write(".makedb", DATABASE);
    kninja(&tree)?
        .env(MAKE_ENV, "/nonexistent/make")
        .arg("--cache")
        .assert()
        .success()
        .stderr(predicate::str::contains("Using cached make database"));

    let ninja = tree.read_string("build.ninja");
    ensure!(
        ninja.contains("build init/main.o: cmd_init_main.o init/main.c"),
        "unexpected build file: {ninja}"
    );
    ensure!(tree.exists(".ninja_deps"), "deps log should be written");
    let log = tree.read_string(".ninja_log");
    ensure!(log.starts_with("# ninja log v5\n"), "unexpected log: {log}");
    Ok(())
}

#[cfg(unix)]
#[test]
fn runs_make_and_caches_database() -> Result<()> {
    let tree = built_tree();
    let make = FakeMake::new(DATABASE, 0);
    kninja(&tree)?
        .env(MAKE_ENV, make.path())
        .args(["-j", "3"])
        .assert()
        .success();

    ensure!(
        make.invocations() == vec!["-j 3".to_owned(), "-p".to_owned()],
        "unexpected make invocations: {:?}",
        make.invocations()
    );
    ensure!(
        tree.read_string(".makedb") == DATABASE,
        "database should be cached verbatim"
    );
    ensure!(tree.exists("build.ninja"), "build file should be written");
    Ok(())
}

#[cfg(unix)]
#[test]
fn cache_flag_without_cache_runs_make() -> Result<()> {
    let tree = built_tree();
    let make = FakeMake::new(DATABASE, 0);
    kninja(&tree)?
        .env(MAKE_ENV, make.path())
        .arg("--cache")
        .assert()
        .success();
    ensure!(make.invocations().len() == 2, "make should run twice");
    ensure!(tree.exists(".makedb"), "database should be cached");
    Ok(())
}

#[cfg(unix)]
#[test]
fn failing_make_aborts() -> Result<()> {
    let tree = built_tree();
    let make = FakeMake::new(DATABASE, 2);
    kninja(&tree)?
        .env(MAKE_ENV, make.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("build exited"));
    ensure!(make.invocations().len() == 1, "database dump should not run");
    ensure!(!tree.exists("build.ninja"), "no build file on failure");
    ensure!(!tree.exists(".makedb"), "no cache on failure");
    Ok(())
}

#[test]
fn unbuilt_object_aborts() -> Result<()> {
    let tree = built_tree();
    tree.remove("init/main.o");
    tree.write(".makedb", DATABASE);
    kninja(&tree)?
        .arg("--cache")
        .assert()
        .failure()
        .stderr(predicate::str::contains("init/main.o"));
    ensure!(!tree.exists("build.ninja"), "no build file on failure");
    Ok(())
}

#[test]
fn exclusions_file_is_applied() -> Result<()> {
    let tree = built_tree();
    tree.write(".makedb", DATABASE);
    tree.write("exclusions.yml", "ignore:\n  - init/main.o\nignore_patterns: []\n");
    kninja(&tree)?
        .arg("--cache")
        .arg("--exclusions")
        .arg(tree.root().join("exclusions.yml").as_str())
        .assert()
        .success();
    let ninja = tree.read_string("build.ninja");
    ensure!(!ninja.contains("init/main.o"), "excluded object leaked: {ninja}");
    ensure!(
        ninja.contains("--exclusions"),
        "regeneration should keep the exclusions file: {ninja}"
    );
    Ok(())
}

#[test]
fn malformed_exclusions_file_fails() -> Result<()> {
    let tree = built_tree();
    tree.write(".makedb", DATABASE);
    tree.write("exclusions.yml", "unknown_key: 1\n");
    kninja(&tree)?
        .arg("--cache")
        .arg("--exclusions")
        .arg(tree.root().join("exclusions.yml").as_str())
        .assert()
        .failure();
    ensure!(!tree.exists("build.ninja"), "no build file on failure");
    Ok(())
}
