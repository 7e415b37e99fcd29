//! Bounded audit/fix/validate repair loop over a batch of source files.
//!
//! `mend` copies a target directory into a sandbox, audits each file for a
//! quality score and remediation plan, then drives a per-file loop of fix,
//! validate, and re-audit until validation passes and the quality gate is
//! satisfied, or the iteration budget runs out. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (retry policy, quality gate,
//!   shared types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, sandbox, child processes,
//!   the command-backed analyzer/fixer/test-runner implementations).
//!   Collaborators sit behind traits to enable scripted doubles in tests.
//!
//! Orchestration modules ([`controller`], [`batch`]) coordinate core logic
//! with the collaborators and roll results up into a session report.

pub mod batch;
pub mod controller;
pub mod core;
pub mod events;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
