//! Test runner abstraction for the validate stage.
//!
//! [`CommandTestRunner`] runs the configured test command in the sandbox and
//! derives a [`ValidationOutcome`] from the exit status. A timeout is mapped
//! to `passed=false, retry_eligible=false` rather than an error, so the
//! retry policy makes a clean stop decision instead of the loop crashing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::types::ValidationOutcome;
use crate::io::config::MendConfig;
use crate::io::process::{build_command, run_command_with_timeout};
use crate::io::workspace::confine;

/// Environment variable naming the file under validation, for test commands
/// that want to scope their run.
pub const TARGET_FILE_ENV: &str = "MEND_TARGET_FILE";

/// Validate-stage failure (the command could not be run at all). The loop
/// maps this to a non-retryable failed outcome.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("test runner failed to run: {detail}")]
    Spawn { detail: String },
}

/// Validation backend contract.
pub trait TestRunner {
    fn validate(&self, path: &Path) -> Result<ValidationOutcome, ValidationError>;
}

/// Test runner that executes the configured command in the sandbox. The file
/// under validation is exposed via [`TARGET_FILE_ENV`].
pub struct CommandTestRunner {
    command: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandTestRunner {
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
            cfg.tests.command.clone(),
            workdir.to_path_buf(),
            Duration::from_secs(cfg.stage_timeout_secs),
            cfg.output_limit_bytes,
        )
    }
}

impl TestRunner for CommandTestRunner {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn validate(&self, path: &Path) -> Result<ValidationOutcome, ValidationError> {
        confine(&self.workdir, path).map_err(|err| ValidationError::Spawn {
            detail: format!("{err:#}"),
        })?;
        let mut cmd = build_command(&self.command, &self.workdir);
        cmd.env(TARGET_FILE_ENV, path);

        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .map_err(|err| ValidationError::Spawn {
                detail: format!("{err:#}"),
            })?;

        if output.timed_out {
            debug!("test run timed out");
            return Ok(ValidationOutcome {
                passed: false,
                retry_eligible: false,
                diagnostics: format!("tests timed out after {:?}", self.timeout),
            });
        }

        let passed = output.status.success();
        debug!(passed, exit_code = ?output.status.code(), "test run finished");
        Ok(ValidationOutcome {
            passed,
            retry_eligible: !passed,
            diagnostics: if passed {
                String::new()
            } else {
                output.merged_text()
            },
        })
    }
}
