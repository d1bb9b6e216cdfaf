#![allow(
    clippy::expect_used,
    reason = "hasher tests use expect for descriptive failures"
)]

//! Tests for command hashing.

use kninja::hasher::{BUILD_LOG_SEED, command_hash, hash64};
use rstest::rstest;
use std::collections::HashSet;

#[rstest]
#[case("", 0x87c2_bc0b_eaf1_d91d)]
#[case("a", 0x90fc_b1ac_a689_663e)]
#[case("abcdefgh", 0xb06e_3830_8dda_3e98)]
#[case("abcdefghi", 0xef52_20c8_3664_4322)]
#[case("gcc -c foo.c -o foo.o", 0x9750_69bf_bc1b_a335)]
fn command_hash_matches_reference(#[case] command: &str, #[case] expected: u64) {
    assert_eq!(command_hash(command), expected);
    assert_eq!(hash64(command.as_bytes(), BUILD_LOG_SEED), expected);
}

#[rstest]
fn single_byte_changes_change_the_hash() {
    let command = "gcc -Wp,-MD,drivers/net/.e1000.o.d -nostdinc -O2 -c -o drivers/net/e1000.o drivers/net/e1000.c";
    let original = command_hash(command);
    let mut seen = HashSet::from([original]);
    let mut mutations = 0;
    for index in 0..command.len() {
        for flip in [0x01_u8, 0x20] {
            let mut bytes = command.as_bytes().to_vec();
            bytes[index] ^= flip;
            let hash = hash64(&bytes, BUILD_LOG_SEED);
            assert_ne!(hash, original, "flip {flip:#x} at {index}");
            seen.insert(hash);
            mutations += 1;
        }
    }
    assert!(mutations >= 100);
    assert_eq!(seen.len(), mutations + 1);
}

#[rstest]
fn seed_changes_the_hash() {
    assert_ne!(hash64(b"hello", 0), hash64(b"hello", BUILD_LOG_SEED));
}
