//! Analyzer abstraction for the audit stage.
//!
//! The [`Analyzer`] trait decouples the loop from the scoring backend.
//! Production runs use [`CommandAnalyzer`], which invokes a configured
//! command and reads an [`AuditReport`] as JSON from its stdout. Tests use
//! scripted analyzers that return predetermined reports.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::types::AuditReport;
use crate::io::config::MendConfig;
use crate::io::process::{build_command, run_command_with_timeout};
use crate::io::workspace::confine;

/// Audit-stage failure. Treated by the loop as a non-retryable stage failure.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analyzer timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("analyzer exited with status {code:?}: {detail}")]
    Tool { code: Option<i32>, detail: String },
    #[error("unparseable analyzer output: {detail}")]
    Parse { detail: String },
    #[error("analyzer failed to run: {detail}")]
    Spawn { detail: String },
}

/// Scoring backend contract: audit one file, return score, issues, and plan.
pub trait Analyzer {
    fn audit(&self, path: &Path) -> Result<AuditReport, AnalysisError>;
}

/// Analyzer that runs `command + [path]` and parses stdout as JSON.
pub struct CommandAnalyzer {
    command: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandAnalyzer {
    pub fn new(
        command: Vec<String>,
        workdir: PathBuf,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            command,
            workdir,
            timeout,
            output_limit_bytes,
        }
    }

    pub fn from_config(cfg: &MendConfig, workdir: &Path) -> Self {
        Self::new(
            cfg.analyzer.command.clone(),
            workdir.to_path_buf(),
            Duration::from_secs(cfg.stage_timeout_secs),
            cfg.output_limit_bytes,
        )
    }
}

impl Analyzer for CommandAnalyzer {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn audit(&self, path: &Path) -> Result<AuditReport, AnalysisError> {
        confine(&self.workdir, path).map_err(|err| AnalysisError::Spawn {
            detail: format!("{err:#}"),
        })?;
        let mut cmd = build_command(&self.command, &self.workdir);
        cmd.arg(path);

        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .map_err(|err| AnalysisError::Spawn {
                detail: format!("{err:#}"),
            })?;

        if output.timed_out {
            return Err(AnalysisError::Timeout {
                timeout: self.timeout,
            });
        }
        if !output.status.success() {
            return Err(AnalysisError::Tool {
                code: output.status.code(),
                detail: output.merged_text(),
            });
        }

        let report = parse_audit_output(&output.stdout)?;
        debug!(score = report.score, issues = report.issues.len(), "audit parsed");
        Ok(report)
    }
}

/// Parse analyzer stdout as an [`AuditReport`].
pub fn parse_audit_output(stdout: &[u8]) -> Result<AuditReport, AnalysisError> {
    serde_json::from_slice(stdout).map_err(|err| AnalysisError::Parse {
        detail: err.to_string(),
    })
}
