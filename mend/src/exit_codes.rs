//! Stable exit codes for the `mend` CLI.

/// Run completed and every file succeeded.
pub const OK: i32 = 0;
/// Invalid config/arguments or a batch-fatal error.
pub const INVALID: i32 = 1;
/// Run completed but one or more files ended failed.
pub const PARTIAL: i32 = 2;
/// Run was cancelled before processing every file.
pub const INTERRUPTED: i32 = 3;
