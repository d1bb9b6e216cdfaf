//! Kbuild to Ninja conversion library.
//!
//! The pipeline reads the database printed by `make -p` for a fully built
//! Kbuild tree, turns it into a [`graph::BuildGraph`], and renders that graph
//! as a Ninja build file, a binary deps log and a build log so Ninja treats
//! the tree as already up to date.

pub mod build_log;
pub mod cli;
pub mod config;
pub mod deps_log;
pub mod graph;
pub mod hasher;
pub mod makedb;
pub mod ninja_gen;
pub mod path_filter;
pub mod runner;
