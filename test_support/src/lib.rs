//! Test utilities for build trees and process management.
//!
//! This crate provides a scratch Kbuild-style tree and a fake `make`
//! executable that replays a canned database.

pub mod fake_make;
pub mod tree;

pub use fake_make::FakeMake;
pub use tree::BuildTree;
