//! Stage-transition events emitted by the repair loop.
//!
//! The core emits one event per stage transition and never formats or
//! persists them itself; sinks decide what to do (drop them, write JSONL,
//! forward to telemetry). See `io/session_log` for the JSONL sink.

use serde::Serialize;

use crate::core::retry_policy::Decision;
use crate::core::types::Disposition;

/// One structured event on the side channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StageEvent {
    SessionStarted {
        total_files: usize,
    },
    AuditDone {
        path: String,
        iteration: u32,
        score: f64,
    },
    FixDone {
        path: String,
        iteration: u32,
        changed: bool,
    },
    ValidateDone {
        path: String,
        iteration: u32,
        passed: bool,
        retry_eligible: bool,
    },
    RetryDecided {
        path: String,
        iteration: u32,
        decision: Decision,
    },
    FileFinished {
        path: String,
        disposition: Disposition,
        iterations_used: u32,
    },
    SessionFinished {
        succeeded: usize,
        failed: usize,
        incomplete: bool,
    },
}

/// Consumer of stage events. Implementations must not fail the run; emit
/// errors are theirs to swallow or log.
pub trait EventSink {
    fn emit(&self, event: &StageEvent);
}

/// Sink that drops every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &StageEvent) {}
}
