//! Batch coordination: enumerate files, run the per-file loop, aggregate.
//!
//! Files are processed strictly sequentially in enumeration order. One
//! file's failure never stops the batch; the only batch-fatal error is
//! failing to enumerate the file list at all.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::controller::{CancelFlag, LoopConfig, run_file};
use crate::core::score_gate::ScoreGate;
use crate::core::types::{Disposition, FailureReason, FileResult, FileTask, Stage};
use crate::events::{EventSink, StageEvent};
use crate::io::analyzer::Analyzer;
use crate::io::fixer::Fixer;
use crate::io::test_runner::TestRunner;
use crate::io::workspace::Workspace;

/// Session-wide counters. Owned by the coordinator for one run; reset at the
/// start, discarded at the end. Monotonic within the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub total_files: usize,
    pub processed_files: usize,
    pub succeeded_files: usize,
    pub failed_files: usize,
    pub total_iterations: u64,
}

impl SessionMetrics {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    /// Record one terminal file result. Called exactly once per file.
    pub fn record(&mut self, result: &FileResult) {
        self.processed_files += 1;
        if result.succeeded() {
            self.succeeded_files += 1;
        } else {
            self.failed_files += 1;
        }
        self.total_iterations += u64::from(result.iterations_used);
        debug_assert!(self.processed_files == self.succeeded_files + self.failed_files);
        debug_assert!(self.processed_files <= self.total_files);
    }
}

/// Final session summary returned to the caller and persisted as
/// `report.json`. Every requested file appears with a disposition; when the
/// run is cancelled, `incomplete` is set and unstarted files are reported
/// as failed with reason `cancelled`, zero iterations consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub average_initial_score: f64,
    pub average_final_score: f64,
    pub total_iterations: u64,
    pub incomplete: bool,
    pub files: Vec<FileResult>,
}

impl SessionReport {
    fn from_results(metrics: &SessionMetrics, files: Vec<FileResult>, incomplete: bool) -> Self {
        let processed = files.len() as f64;
        let (avg_initial, avg_final) = if files.is_empty() {
            (0.0, 0.0)
        } else {
            (
                files.iter().map(|file| file.initial_score).sum::<f64>() / processed,
                files.iter().map(|file| file.final_score).sum::<f64>() / processed,
            )
        };
        Self {
            total_files: metrics.total_files,
            succeeded: metrics.succeeded_files,
            failed: metrics.failed_files,
            average_initial_score: avg_initial,
            average_final_score: avg_final,
            total_iterations: metrics.total_iterations,
            incomplete,
            files,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        !self.incomplete && self.failed == 0
    }
}

/// Batch-level knobs.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub max_iterations: u32,
    pub quality_threshold: f64,
}

impl BatchConfig {
    fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_iterations: self.max_iterations,
            gate: ScoreGate::new(self.quality_threshold),
        }
    }
}

/// Run the repair loop over an already-enumerated file list.
///
/// The list is fixed for the run: files a fix stage creates along the way
/// are incidental artifacts, never queued.
#[instrument(skip_all, fields(total_files = files.len()))]
pub fn run_batch_files<A, F, T, S>(
    files: Vec<PathBuf>,
    analyzer: &A,
    fixer: &F,
    test_runner: &T,
    config: &BatchConfig,
    sink: &S,
    cancel: &CancelFlag,
) -> SessionReport
where
    A: Analyzer,
    F: Fixer,
    T: TestRunner,
    S: EventSink,
{
    let mut metrics = SessionMetrics::new(files.len());
    let mut results = Vec::with_capacity(files.len());
    let loop_config = config.loop_config();
    let mut incomplete = false;

    sink.emit(&StageEvent::SessionStarted {
        total_files: files.len(),
    });

    let mut pending = files.into_iter();
    while let Some(path) = pending.next() {
        if cancel.is_cancelled() {
            info!("cancelled; marking remaining files cancelled");
            incomplete = true;
            for path in std::iter::once(path).chain(pending.by_ref()) {
                let result = cancelled_result(&path);
                sink.emit(&StageEvent::FileFinished {
                    path: result.path.clone(),
                    disposition: result.disposition,
                    iterations_used: 0,
                });
                metrics.record(&result);
                results.push(result);
            }
            break;
        }

        // Initial audit seeds the plan and the baseline score. An audit
        // failure fails this file only; the batch continues.
        let result = match analyzer.audit(&path) {
            Ok(report) => {
                sink.emit(&StageEvent::AuditDone {
                    path: path.to_string_lossy().into_owned(),
                    iteration: 0,
                    score: report.score,
                });
                let mut task = FileTask::new(path, &report);
                run_file(
                    &mut task,
                    analyzer,
                    fixer,
                    test_runner,
                    &loop_config,
                    sink,
                    cancel,
                )
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "initial audit failed");
                let result = FileResult {
                    path: path.to_string_lossy().into_owned(),
                    initial_score: 0.0,
                    final_score: 0.0,
                    iterations_used: 0,
                    modified: false,
                    disposition: Disposition::Failed(FailureReason::Stage(Stage::Audit)),
                    error: Some(err.to_string()),
                };
                sink.emit(&StageEvent::FileFinished {
                    path: result.path.clone(),
                    disposition: result.disposition,
                    iterations_used: 0,
                });
                result
            }
        };

        if result.disposition == Disposition::Failed(FailureReason::Cancelled) {
            incomplete = true;
        }
        metrics.record(&result);
        results.push(result);
    }

    let report = SessionReport::from_results(&metrics, results, incomplete);
    sink.emit(&StageEvent::SessionFinished {
        succeeded: report.succeeded,
        failed: report.failed,
        incomplete: report.incomplete,
    });
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        incomplete = report.incomplete,
        "batch finished"
    );
    report
}

/// Terminal record for a file the run never started on.
fn cancelled_result(path: &Path) -> FileResult {
    FileResult {
        path: path.to_string_lossy().into_owned(),
        initial_score: 0.0,
        final_score: 0.0,
        iterations_used: 0,
        modified: false,
        disposition: Disposition::Failed(FailureReason::Cancelled),
        error: None,
    }
}

/// Enumerate source files in the workspace and run the batch over them.
///
/// Enumeration failure is the only error that aborts the whole run.
pub fn run_batch<A, F, T, S>(
    workspace: &Workspace,
    source_extension: &str,
    analyzer: &A,
    fixer: &F,
    test_runner: &T,
    config: &BatchConfig,
    sink: &S,
    cancel: &CancelFlag,
) -> Result<SessionReport>
where
    A: Analyzer,
    F: Fixer,
    T: TestRunner,
    S: EventSink,
{
    let files = workspace
        .list_source_files(source_extension)
        .context("enumerate batch files")?;
    Ok(run_batch_files(
        files,
        analyzer,
        fixer,
        test_runner,
        config,
        sink,
        cancel,
    ))
}
