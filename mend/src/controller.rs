//! Per-file iteration controller: the bounded audit/fix/validate loop.
//!
//! Owns exactly one [`FileTask`] for the duration of its loop. Every stage
//! error is converted into a terminal disposition here; nothing escapes to
//! the batch coordinator as an error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::core::retry_policy::{Decision, decide};
use crate::core::score_gate::ScoreGate;
use crate::core::types::{
    Disposition, FailureReason, FileResult, FileStatus, FileTask, FixRequest, Stage,
    ValidationOutcome,
};
use crate::events::{EventSink, StageEvent};
use crate::io::analyzer::Analyzer;
use crate::io::fixer::Fixer;
use crate::io::test_runner::TestRunner;

/// Cooperative cancellation signal, checked at the top of each iteration and
/// between files. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Knobs for one file's loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    /// Iteration budget. Zero means fail immediately without calling any
    /// stage.
    pub max_iterations: u32,
    pub gate: ScoreGate,
}

/// Drive the repair loop for one file until a terminal disposition.
///
/// Within one file, iteration N's fix consumes the diagnostics produced by
/// iteration N-1's validation; there is no reordering.
#[instrument(skip_all, fields(path = %task.path.display(), max_iterations = config.max_iterations))]
pub fn run_file<A, F, T, S>(
    task: &mut FileTask,
    analyzer: &A,
    fixer: &F,
    test_runner: &T,
    config: &LoopConfig,
    sink: &S,
    cancel: &CancelFlag,
) -> FileResult
where
    A: Analyzer,
    F: Fixer,
    T: TestRunner,
    S: EventSink,
{
    task.status = FileStatus::InProgress;
    let path_display = task.path.to_string_lossy().into_owned();
    let mut previous_diagnostics: Option<String> = None;
    let mut error: Option<String> = None;

    let disposition = loop {
        if cancel.is_cancelled() {
            info!("cancelled before iteration {}", task.iteration + 1);
            break Disposition::Failed(FailureReason::Cancelled);
        }
        if task.iteration >= config.max_iterations {
            // Only reachable with a zero budget; otherwise the policy stops
            // the loop at the last iteration.
            break Disposition::Failed(FailureReason::BudgetExhausted);
        }
        task.iteration += 1;
        debug!(iteration = task.iteration, "starting iteration");

        // Fix. A fixer error is non-transient; stop without retrying.
        let fix_request = FixRequest {
            path: task.path.clone(),
            plan: task.plan.clone(),
            previous_diagnostics: previous_diagnostics.take(),
        };
        let fix = match fixer.apply(&fix_request) {
            Ok(fix) => fix,
            Err(err) => {
                warn!(iteration = task.iteration, error = %err, "fix stage failed");
                error = Some(err.to_string());
                break Disposition::Failed(FailureReason::Stage(Stage::Fix));
            }
        };
        if fix.changed {
            task.modified = true;
        }
        sink.emit(&StageEvent::FixDone {
            path: path_display.clone(),
            iteration: task.iteration,
            changed: fix.changed,
        });

        // Validate. A runner error maps to a failed, non-retryable outcome so
        // the policy makes the stop decision.
        let outcome = match test_runner.validate(&task.path) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(iteration = task.iteration, error = %err, "validation could not run");
                ValidationOutcome {
                    passed: false,
                    retry_eligible: false,
                    diagnostics: err.to_string(),
                }
            }
        };
        sink.emit(&StageEvent::ValidateDone {
            path: path_display.clone(),
            iteration: task.iteration,
            passed: outcome.passed,
            retry_eligible: outcome.retry_eligible,
        });

        // Re-audit for the current score.
        let verdict = match analyzer.audit(&task.path) {
            Ok(report) => {
                task.current_score = report.score;
                config.gate.evaluate(report.score)
            }
            Err(err) => {
                warn!(iteration = task.iteration, error = %err, "audit stage failed");
                error = Some(err.to_string());
                break Disposition::Failed(FailureReason::Stage(Stage::Audit));
            }
        };
        sink.emit(&StageEvent::AuditDone {
            path: path_display.clone(),
            iteration: task.iteration,
            score: verdict.score,
        });

        let decision = decide(task.iteration, config.max_iterations, &outcome, verdict);
        sink.emit(&StageEvent::RetryDecided {
            path: path_display.clone(),
            iteration: task.iteration,
            decision,
        });
        match decision {
            Decision::StopSuccess => break Disposition::Succeeded,
            Decision::StopFailure(reason) => break Disposition::Failed(reason),
            Decision::Retry => {
                previous_diagnostics = Some(outcome.diagnostics);
            }
        }
    };

    task.status = match disposition {
        Disposition::Succeeded => FileStatus::Succeeded,
        Disposition::Failed(_) => FileStatus::Failed,
    };
    info!(
        iterations = task.iteration,
        ?disposition,
        modified = task.modified,
        "file finished"
    );

    let result = FileResult {
        path: path_display.clone(),
        initial_score: task.initial_score,
        final_score: task.current_score,
        iterations_used: task.iteration,
        modified: task.modified,
        disposition,
        error,
    };
    sink.emit(&StageEvent::FileFinished {
        path: path_display,
        disposition,
        iterations_used: task.iteration,
    });
    result
}
