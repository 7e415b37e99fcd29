//! Retry decision policy for the per-file repair loop.
//!
//! Pure function of the current iteration, the budget, the latest validation
//! outcome, and the quality-gate verdict. The controller applies the decision;
//! nothing here performs I/O or holds state.

use serde::Serialize;

use crate::core::score_gate::ScoreVerdict;
use crate::core::types::{FailureReason, Stage, ValidationOutcome};

/// What the controller should do after one validate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Retry,
    StopSuccess,
    StopFailure(FailureReason),
}

/// Decide whether to retry, stop successfully, or stop with failure.
///
/// Rules, first match wins:
/// 1. passed and acceptable: stop, success.
/// 2. passed but not acceptable: retry to raise the score, unless the budget
///    is exhausted, which stops with `QualityGateNotMet` (a partial failure,
///    distinct from budget exhaustion on failing tests).
/// 3. not passed and not retry-eligible: the validator says retrying is
///    futile; stop with a validate-stage failure.
/// 4. not passed, retry-eligible, budget remaining: retry.
/// 5. not passed, budget exhausted: stop with `BudgetExhausted`.
pub fn decide(
    iteration: u32,
    max_iterations: u32,
    outcome: &ValidationOutcome,
    verdict: ScoreVerdict,
) -> Decision {
    if outcome.passed {
        if verdict.acceptable {
            return Decision::StopSuccess;
        }
        if iteration >= max_iterations {
            return Decision::StopFailure(FailureReason::QualityGateNotMet);
        }
        return Decision::Retry;
    }
    if !outcome.retry_eligible {
        return Decision::StopFailure(FailureReason::Stage(Stage::Validate));
    }
    if iteration < max_iterations {
        return Decision::Retry;
    }
    Decision::StopFailure(FailureReason::BudgetExhausted)
}
