//! End-to-end repair-loop scenarios with scripted collaborators.

use std::path::PathBuf;

use mend::batch::{BatchConfig, run_batch, run_batch_files};
use mend::controller::{CancelFlag, LoopConfig, run_file};
use mend::core::score_gate::ScoreGate;
use mend::core::types::{Disposition, FailureReason, Stage};
use mend::events::{EventSink, NullSink, StageEvent};
use mend::io::fixer::FixError;
use mend::io::workspace::Workspace;
use mend::test_support::{
    RecordingSink, ScriptedAnalyzer, ScriptedFixer, ScriptedTestRunner, audit_report, fix_changed,
    fix_unchanged, outcome_fail, outcome_pass, task_for,
};

fn loop_config(max_iterations: u32) -> LoopConfig {
    LoopConfig {
        max_iterations,
        gate: ScoreGate::new(8.0),
    }
}

/// Two retry-eligible failures, then a pass at 9.0: success after exactly
/// three iterations.
#[test]
fn failing_twice_then_passing_succeeds_on_third_iteration() {
    let analyzer = ScriptedAnalyzer::new(vec![
        Ok(audit_report(4.0)),
        Ok(audit_report(5.0)),
        Ok(audit_report(9.0)),
    ]);
    let fixer = ScriptedFixer::new(vec![
        Ok(fix_changed()),
        Ok(fix_changed()),
        Ok(fix_unchanged()),
    ]);
    let runner = ScriptedTestRunner::new(vec![
        Ok(outcome_fail(true, "2 tests failed")),
        Ok(outcome_fail(true, "1 test failed")),
        Ok(outcome_pass()),
    ]);
    let mut task = task_for("calc.py", 3.0);

    let result = run_file(
        &mut task,
        &analyzer,
        &fixer,
        &runner,
        &loop_config(3),
        &NullSink,
        &CancelFlag::new(),
    );

    assert_eq!(result.disposition, Disposition::Succeeded);
    assert_eq!(result.iterations_used, 3);
    assert_eq!(result.final_score, 9.0);
}

/// Three retry-eligible failures with a budget of three: budget exhaustion.
#[test]
fn persistent_failures_exhaust_the_budget() {
    let analyzer = ScriptedAnalyzer::new(vec![
        Ok(audit_report(4.0)),
        Ok(audit_report(4.0)),
        Ok(audit_report(4.0)),
    ]);
    let fixer = ScriptedFixer::new(vec![
        Ok(fix_changed()),
        Ok(fix_changed()),
        Ok(fix_changed()),
    ]);
    let runner = ScriptedTestRunner::new(vec![
        Ok(outcome_fail(true, "boom")),
        Ok(outcome_fail(true, "boom")),
        Ok(outcome_fail(true, "boom")),
    ]);
    let mut task = task_for("calc.py", 3.0);

    let result = run_file(
        &mut task,
        &analyzer,
        &fixer,
        &runner,
        &loop_config(3),
        &NullSink,
        &CancelFlag::new(),
    );

    assert_eq!(
        result.disposition,
        Disposition::Failed(FailureReason::BudgetExhausted)
    );
    assert_eq!(result.iterations_used, 3);
}

/// The validator declares retrying futile on the first iteration.
#[test]
fn non_retry_eligible_failure_stops_after_one_iteration() {
    let analyzer = ScriptedAnalyzer::new(vec![Ok(audit_report(4.0))]);
    let fixer = ScriptedFixer::new(vec![Ok(fix_changed())]);
    let runner = ScriptedTestRunner::new(vec![Ok(outcome_fail(false, "import error"))]);
    let mut task = task_for("calc.py", 3.0);

    let result = run_file(
        &mut task,
        &analyzer,
        &fixer,
        &runner,
        &loop_config(3),
        &NullSink,
        &CancelFlag::new(),
    );

    assert_eq!(
        result.disposition,
        Disposition::Failed(FailureReason::Stage(Stage::Validate))
    );
    assert_eq!(result.iterations_used, 1);
}

/// A fixer error on iteration 2 stops immediately; no third iteration.
#[test]
fn fixer_error_on_second_iteration_is_terminal() {
    let analyzer = ScriptedAnalyzer::new(vec![Ok(audit_report(4.0))]);
    let fixer = ScriptedFixer::new(vec![
        Ok(fix_changed()),
        Err(FixError::Io {
            detail: "generation failed".to_string(),
        }),
    ]);
    let runner = ScriptedTestRunner::new(vec![Ok(outcome_fail(true, "boom"))]);
    let mut task = task_for("calc.py", 3.0);

    let result = run_file(
        &mut task,
        &analyzer,
        &fixer,
        &runner,
        &loop_config(3),
        &NullSink,
        &CancelFlag::new(),
    );

    assert_eq!(
        result.disposition,
        Disposition::Failed(FailureReason::Stage(Stage::Fix))
    );
    assert_eq!(result.iterations_used, 2);
    assert!(result.error.as_deref().unwrap().contains("generation failed"));
    assert_eq!(runner.calls(), 1);
    assert_eq!(fixer.calls(), 2);
}

/// Tests pass from iteration 2 onward but the score only clears the 8.0
/// threshold at iteration 4: pass-but-low-score retries instead of stopping.
#[test]
fn passing_tests_below_threshold_keep_retrying_until_the_gate_clears() {
    let analyzer = ScriptedAnalyzer::new(vec![
        Ok(audit_report(4.0)),
        Ok(audit_report(6.0)),
        Ok(audit_report(7.0)),
        Ok(audit_report(8.5)),
    ]);
    let fixer = ScriptedFixer::new(vec![
        Ok(fix_changed()),
        Ok(fix_changed()),
        Ok(fix_changed()),
        Ok(fix_changed()),
    ]);
    let runner = ScriptedTestRunner::new(vec![
        Ok(outcome_fail(true, "1 test failed")),
        Ok(outcome_pass()),
        Ok(outcome_pass()),
        Ok(outcome_pass()),
    ]);
    let mut task = task_for("calc.py", 3.0);

    let result = run_file(
        &mut task,
        &analyzer,
        &fixer,
        &runner,
        &loop_config(5),
        &NullSink,
        &CancelFlag::new(),
    );

    assert_eq!(result.disposition, Disposition::Succeeded);
    assert_eq!(result.iterations_used, 4);
    assert_eq!(result.final_score, 8.5);
}

/// Tests pass every time but the score never clears the gate before the
/// budget runs out: reported as quality-gate-not-met, not budget exhaustion.
#[test]
fn passing_tests_that_never_clear_the_gate_report_quality_gate_not_met() {
    let analyzer = ScriptedAnalyzer::new(vec![Ok(audit_report(5.0)), Ok(audit_report(6.0))]);
    let fixer = ScriptedFixer::new(vec![Ok(fix_changed()), Ok(fix_changed())]);
    let runner = ScriptedTestRunner::new(vec![Ok(outcome_pass()), Ok(outcome_pass())]);
    let mut task = task_for("calc.py", 3.0);

    let result = run_file(
        &mut task,
        &analyzer,
        &fixer,
        &runner,
        &loop_config(2),
        &NullSink,
        &CancelFlag::new(),
    );

    assert_eq!(
        result.disposition,
        Disposition::Failed(FailureReason::QualityGateNotMet)
    );
    assert_eq!(result.iterations_used, 2);
}

/// Every requested file appears in the report with a disposition, and the
/// counters add up.
#[test]
fn report_enumerates_every_file_with_a_disposition() {
    let analyzer = ScriptedAnalyzer::new(vec![
        // a.py: initial audit, one loop iteration.
        Ok(audit_report(4.0)),
        Ok(audit_report(9.0)),
        // b.py: initial audit, then non-retryable validation.
        Ok(audit_report(5.0)),
        Ok(audit_report(5.0)),
    ]);
    let fixer = ScriptedFixer::new(vec![Ok(fix_changed()), Ok(fix_changed())]);
    let runner = ScriptedTestRunner::new(vec![
        Ok(outcome_pass()),
        Ok(outcome_fail(false, "syntax error")),
    ]);

    let report = run_batch_files(
        vec![PathBuf::from("a.py"), PathBuf::from("b.py")],
        &analyzer,
        &fixer,
        &runner,
        &BatchConfig {
            max_iterations: 3,
            quality_threshold: 8.0,
        },
        &NullSink,
        &CancelFlag::new(),
    );

    assert_eq!(report.total_files, 2);
    assert_eq!(report.succeeded + report.failed, report.total_files);
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.files[0].path, "a.py");
    assert_eq!(report.files[0].disposition, Disposition::Succeeded);
    assert_eq!(report.files[1].path, "b.py");
    assert_eq!(
        report.files[1].disposition,
        Disposition::Failed(FailureReason::Stage(Stage::Validate))
    );
    assert!(!report.all_succeeded());
}

/// Cancelling after the first file finishes leaves the second unprocessed,
/// reported with a cancelled disposition, and marks the report incomplete
/// while preserving accumulated metrics.
#[test]
fn cancellation_between_files_preserves_metrics() {
    struct CancelAfterFirstFile {
        cancel: CancelFlag,
        inner: RecordingSink,
    }

    impl EventSink for CancelAfterFirstFile {
        fn emit(&self, event: &StageEvent) {
            if matches!(event, StageEvent::FileFinished { .. }) {
                self.cancel.cancel();
            }
            self.inner.emit(event);
        }
    }

    let analyzer = ScriptedAnalyzer::new(vec![Ok(audit_report(4.0)), Ok(audit_report(9.0))]);
    let fixer = ScriptedFixer::new(vec![Ok(fix_changed())]);
    let runner = ScriptedTestRunner::new(vec![Ok(outcome_pass())]);
    let cancel = CancelFlag::new();
    let sink = CancelAfterFirstFile {
        cancel: cancel.clone(),
        inner: RecordingSink::new(),
    };

    let report = run_batch_files(
        vec![PathBuf::from("a.py"), PathBuf::from("b.py")],
        &analyzer,
        &fixer,
        &runner,
        &BatchConfig {
            max_iterations: 3,
            quality_threshold: 8.0,
        },
        &sink,
        &cancel,
    );

    assert!(report.incomplete);
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.files[0].disposition, Disposition::Succeeded);
    assert_eq!(
        report.files[1].disposition,
        Disposition::Failed(FailureReason::Cancelled)
    );
    assert_eq!(report.files[1].iterations_used, 0);
    assert_eq!(report.total_iterations, 1);
    // b.py was never audited.
    assert_eq!(analyzer.calls(), 2);
}

/// Stage events arrive in causal order within an iteration.
#[test]
fn stage_events_follow_fix_validate_audit_decide_order() {
    let analyzer = ScriptedAnalyzer::new(vec![Ok(audit_report(4.0)), Ok(audit_report(9.0))]);
    let fixer = ScriptedFixer::new(vec![Ok(fix_changed())]);
    let runner = ScriptedTestRunner::new(vec![Ok(outcome_pass())]);
    let sink = RecordingSink::new();

    run_batch_files(
        vec![PathBuf::from("a.py")],
        &analyzer,
        &fixer,
        &runner,
        &BatchConfig {
            max_iterations: 3,
            quality_threshold: 8.0,
        },
        &sink,
        &CancelFlag::new(),
    );

    let kinds: Vec<&'static str> = sink
        .events()
        .iter()
        .map(|event| match event {
            StageEvent::SessionStarted { .. } => "session_started",
            StageEvent::AuditDone { .. } => "audit_done",
            StageEvent::FixDone { .. } => "fix_done",
            StageEvent::ValidateDone { .. } => "validate_done",
            StageEvent::RetryDecided { .. } => "retry_decided",
            StageEvent::FileFinished { .. } => "file_finished",
            StageEvent::SessionFinished { .. } => "session_finished",
        })
        .collect();

    assert_eq!(
        kinds,
        vec![
            "session_started",
            "audit_done", // initial audit
            "fix_done",
            "validate_done",
            "audit_done",
            "retry_decided",
            "file_finished",
            "session_finished",
        ]
    );
}

/// Enumeration failure is batch-fatal.
#[test]
fn missing_sandbox_aborts_the_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = Workspace::new(temp.path().join("does-not-exist"));
    let analyzer = ScriptedAnalyzer::new(Vec::new());
    let fixer = ScriptedFixer::new(Vec::new());
    let runner = ScriptedTestRunner::new(Vec::new());

    let err = run_batch(
        &workspace,
        "py",
        &analyzer,
        &fixer,
        &runner,
        &BatchConfig {
            max_iterations: 3,
            quality_threshold: 8.0,
        },
        &NullSink,
        &CancelFlag::new(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("enumerate batch files"));
}
