//! Stable exit codes for the `trellis` binary.

/// The root unit of work succeeded (or help was printed).
pub const OK: i32 = 0;
/// The root unit of work failed, or configuration could not be loaded.
pub const FAILED: i32 = 1;
/// The command line could not be parsed or bound.
pub const USAGE: i32 = 2;
