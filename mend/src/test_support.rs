//! Test-only scripted collaborators and fixture helpers.
//!
//! Scripted doubles pop predetermined results in call order and panic when
//! called more times than scripted, which keeps stage-call-count assertions
//! honest.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::core::types::{
    AuditReport, FileTask, FixOutcome, FixRequest, ValidationOutcome,
};
use crate::events::{EventSink, StageEvent};
use crate::io::analyzer::{AnalysisError, Analyzer};
use crate::io::fixer::{FixError, Fixer};
use crate::io::test_runner::{TestRunner, ValidationError};

/// Audit report with the given score, no issues, and a null plan.
pub fn audit_report(score: f64) -> AuditReport {
    AuditReport {
        score,
        issues: Vec::new(),
        plan: Value::Null,
    }
}

/// Fix outcome that changed content.
pub fn fix_changed() -> FixOutcome {
    FixOutcome { changed: true }
}

/// Fix outcome that left content untouched.
pub fn fix_unchanged() -> FixOutcome {
    FixOutcome { changed: false }
}

/// Passing validation outcome.
pub fn outcome_pass() -> ValidationOutcome {
    ValidationOutcome {
        passed: true,
        retry_eligible: true,
        diagnostics: String::new(),
    }
}

/// Failing validation outcome with explicit retry eligibility.
pub fn outcome_fail(retry_eligible: bool, diagnostics: &str) -> ValidationOutcome {
    ValidationOutcome {
        passed: false,
        retry_eligible,
        diagnostics: diagnostics.to_string(),
    }
}

/// File task seeded as if the initial audit scored `initial_score`.
pub fn task_for(path: &str, initial_score: f64) -> FileTask {
    FileTask::new(PathBuf::from(path), &audit_report(initial_score))
}

/// Analyzer returning scripted reports in call order.
pub struct ScriptedAnalyzer {
    audits: RefCell<VecDeque<Result<AuditReport, AnalysisError>>>,
    calls: RefCell<usize>,
}

impl ScriptedAnalyzer {
    pub fn new(audits: Vec<Result<AuditReport, AnalysisError>>) -> Self {
        Self {
            audits: RefCell::new(audits.into()),
            calls: RefCell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl Analyzer for ScriptedAnalyzer {
    fn audit(&self, _path: &Path) -> Result<AuditReport, AnalysisError> {
        *self.calls.borrow_mut() += 1;
        self.audits
            .borrow_mut()
            .pop_front()
            .expect("unexpected analyzer call")
    }
}

/// Fixer returning scripted outcomes and recording every request it saw.
pub struct ScriptedFixer {
    results: RefCell<VecDeque<Result<FixOutcome, FixError>>>,
    requests: RefCell<Vec<FixRequest>>,
}

impl ScriptedFixer {
    pub fn new(results: Vec<Result<FixOutcome, FixError>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Requests in call order, for diagnostics carry-forward assertions.
    pub fn requests(&self) -> Vec<FixRequest> {
        self.requests.borrow().clone()
    }
}

impl Fixer for ScriptedFixer {
    fn apply(&self, request: &FixRequest) -> Result<FixOutcome, FixError> {
        self.requests.borrow_mut().push(request.clone());
        self.results
            .borrow_mut()
            .pop_front()
            .expect("unexpected fixer call")
    }
}

/// Test runner returning scripted outcomes in call order.
pub struct ScriptedTestRunner {
    outcomes: RefCell<VecDeque<Result<ValidationOutcome, ValidationError>>>,
    calls: RefCell<usize>,
}

impl ScriptedTestRunner {
    pub fn new(outcomes: Vec<Result<ValidationOutcome, ValidationError>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            calls: RefCell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl TestRunner for ScriptedTestRunner {
    fn validate(&self, _path: &Path) -> Result<ValidationOutcome, ValidationError> {
        *self.calls.borrow_mut() += 1;
        self.outcomes
            .borrow_mut()
            .pop_front()
            .expect("unexpected test runner call")
    }
}

/// Sink that records every event for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: RefCell<Vec<StageEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StageEvent> {
        self.events.borrow().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &StageEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
