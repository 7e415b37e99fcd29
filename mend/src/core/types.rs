//! Shared types for the repair-loop core.
//!
//! These types define stable contracts between core components and the
//! external collaborators (analyzer, fixer, test runner). They must stay
//! deterministic and serializable so per-run artifacts remain stable.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a file task. Terminal states are never revived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

/// Stage that produced a non-retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Audit,
    Fix,
    Validate,
}

/// Reason a file task ended `Failed`.
///
/// Reported in the session report so a stage failure, an exhausted iteration
/// budget, and passing tests that never cleared the quality gate stay
/// distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// A stage errored, or the validator signalled that retrying is futile.
    Stage(Stage),
    /// The iteration budget ran out while outcomes were still retry-eligible.
    BudgetExhausted,
    /// Tests passed but the score never reached the quality threshold before
    /// the budget ran out.
    QualityGateNotMet,
    /// The run was cancelled mid-file.
    Cancelled,
}

/// Terminal classification of a file task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Succeeded,
    Failed(FailureReason),
}

/// One issue reported by the analyzer. Fields beyond `message` are optional
/// because analyzer backends differ in what they report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub line: Option<u64>,
    pub message: String,
}

/// Result of one audit: a numeric quality score (convention 0-10, higher is
/// better), the issue list behind it, and a remediation plan.
///
/// The plan is produced by the audit backend and consumed by the fix backend;
/// the core carries it as an opaque value and never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub score: f64,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub plan: Value,
}

/// Input handed to the fixer for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixRequest {
    /// Path relative to the working root.
    pub path: PathBuf,
    /// Opaque remediation plan from the initial audit.
    pub plan: Value,
    /// Diagnostics from the previous iteration's validation, if any.
    pub previous_diagnostics: Option<String>,
}

/// Result of one fix attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixOutcome {
    /// True when the fix actually changed file content.
    pub changed: bool,
}

/// Result of one validate step. Created fresh each iteration, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    /// False means stop even though not passed: the validator determined that
    /// retrying cannot help.
    pub retry_eligible: bool,
    /// Free-form feedback fed into the next fix attempt.
    pub diagnostics: String,
}

/// One file under repair. Mutated exclusively by the iteration controller.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTask {
    /// Path relative to the working root.
    pub path: PathBuf,
    /// Opaque remediation plan seeded from the initial audit.
    pub plan: Value,
    /// Attempt count. Starts at 0, increments once per loop pass.
    pub iteration: u32,
    /// Score from the initial audit. Set once, never mutated afterward.
    pub initial_score: f64,
    /// Score from the most recent audit.
    pub current_score: f64,
    /// Sticky: true once any fix changed file content.
    pub modified: bool,
    pub status: FileStatus,
}

impl FileTask {
    /// Seed a task from the initial audit of `path`.
    pub fn new(path: PathBuf, report: &AuditReport) -> Self {
        Self {
            path,
            plan: report.plan.clone(),
            iteration: 0,
            initial_score: report.score,
            current_score: report.score,
            modified: false,
            status: FileStatus::Pending,
        }
    }
}

/// Terminal record for one file, rolled up into the session report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub path: String,
    pub initial_score: f64,
    pub final_score: f64,
    pub iterations_used: u32,
    pub modified: bool,
    pub disposition: Disposition,
    /// Error detail for stage failures, absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    pub fn succeeded(&self) -> bool {
        self.disposition == Disposition::Succeeded
    }
}
