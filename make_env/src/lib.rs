#![forbid(unsafe_code)]

//! Shared environment constants used across kninja crates (library, tests, and
//! helpers).

/// Environment variable override for the `make` executable.
///
/// # Examples
///
/// ```
/// use make_env::MAKE_ENV;
/// assert_eq!(MAKE_ENV, "KNINJA_MAKE");
/// ```
pub const MAKE_ENV: &str = "KNINJA_MAKE";

/// Default `make` executable invoked when [`MAKE_ENV`] is unset.
pub const MAKE_PROGRAM: &str = "make";
