//! Command hashing utilities.
//!
//! This module provides [`hash64`], a `MurmurHash64A` implementation matching
//! the one Ninja uses for `.ninja_log` entries. Ninja compares the stored
//! hash with the hash of the command it is about to run, so the result must be
//! bit-for-bit identical to the reference algorithm.
//!
//! # Examples
//!
//! ```
//! use kninja::hasher::{command_hash, hash64};
//!
//! assert_eq!(hash64(b"", 0), 0);
//! assert_eq!(format!("{:x}", command_hash("cc")), "ac157b38cd2e901b");
//! ```

/// Seed Ninja uses when hashing commands for the build log.
pub const BUILD_LOG_SEED: u64 = 0xDECA_FBAD_DECA_FBAD;

const M: u64 = 0xc6a4_a793_5bd1_e995;
const R: u32 = 47;

/// Compute the `MurmurHash64A` digest of `bytes` under `seed`.
#[must_use]
pub fn hash64(bytes: &[u8], seed: u64) -> u64 {
    let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    let mut h = seed ^ len.wrapping_mul(M);

    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let mut k = fold_le(chunk);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h ^= k;
        h = h.wrapping_mul(M);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        h ^= fold_le(tail);
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;
    h
}

/// Hash a command line the way Ninja does before recording it in the log.
#[must_use]
pub fn command_hash(command: &str) -> u64 {
    hash64(command.as_bytes(), BUILD_LOG_SEED)
}

/// Assemble up to eight bytes into a little-endian word.
fn fold_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0, |acc, &byte| (acc << 8) | u64::from(byte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"", 0, 0)]
    #[case(b"a", 0, 0x0717_17d2_d36b_6b11)]
    #[case(b"abcdefgh", 0, 0xafdb_0257_ff41_aa98)]
    #[case(b"abcdefghi", 0, 0xc9b9_d843_5614_6ac2)]
    #[case(b"", BUILD_LOG_SEED, 0x87c2_bc0b_eaf1_d91d)]
    #[case(b"hello", BUILD_LOG_SEED, 0xd33b_e35d_7d25_6cc0)]
    fn hash64_matches_reference(#[case] input: &[u8], #[case] seed: u64, #[case] expected: u64) {
        assert_eq!(hash64(input, seed), expected);
    }

    #[rstest]
    fn fold_le_orders_bytes_little_endian() {
        assert_eq!(fold_le(&[0x01, 0x02, 0x03]), 0x0003_0201);
    }
}
