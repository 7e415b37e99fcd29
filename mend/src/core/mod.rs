//! Pure, deterministic repair-loop logic. No I/O.

pub mod retry_policy;
pub mod score_gate;
pub mod types;
