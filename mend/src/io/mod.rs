//! Side-effecting operations: config, processes, the sandbox workspace, and
//! the command-backed collaborator implementations. Isolated from `core` so
//! the loop logic stays testable with scripted doubles.

pub mod analyzer;
pub mod config;
pub mod fixer;
pub mod process;
pub mod session_log;
pub mod test_runner;
pub mod workspace;
