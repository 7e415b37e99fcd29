//! Fixer abstraction for the mutation stage.
//!
//! [`CommandFixer`] hands the remediation plan and prior diagnostics to a
//! configured command through a JSON request file, then detects whether the
//! file content actually changed by comparing bytes before and after. The
//! backend's own change reporting is not trusted; the original fix tooling
//! rewrote files unconditionally, so self-reported flags carried no signal.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::types::{FixOutcome, FixRequest};
use crate::io::config::MendConfig;
use crate::io::process::{build_command, run_command_with_timeout};
use crate::io::workspace::confine;

/// Relative location of the per-iteration fix request inside the sandbox.
const REQUEST_PATH: &str = ".mend/fix_request.json";

/// Fix-stage failure. Never retried within a file.
#[derive(Debug, Error)]
pub enum FixError {
    #[error("fixer timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("fixer exited with status {code:?}: {detail}")]
    Tool { code: Option<i32>, detail: String },
    #[error("fixer i/o failed: {detail}")]
    Io { detail: String },
}

/// Mutation backend contract.
pub trait Fixer {
    fn apply(&self, request: &FixRequest) -> Result<FixOutcome, FixError>;
}

/// Fixer that runs `command + [path, request_path]` inside the sandbox.
pub struct CommandFixer {
    command: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandFixer {
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
            cfg.fixer.command.clone(),
            workdir.to_path_buf(),
            Duration::from_secs(cfg.stage_timeout_secs),
            cfg.output_limit_bytes,
        )
    }

    fn write_request(&self, request: &FixRequest) -> Result<(), FixError> {
        let path = self.workdir.join(REQUEST_PATH);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_detail)?;
        }
        let mut buf = serde_json::to_string_pretty(request).map_err(|err| FixError::Io {
            detail: err.to_string(),
        })?;
        buf.push('\n');
        fs::write(&path, buf).map_err(io_detail)?;
        Ok(())
    }
}

impl Fixer for CommandFixer {
    #[instrument(skip_all, fields(path = %request.path.display()))]
    fn apply(&self, request: &FixRequest) -> Result<FixOutcome, FixError> {
        let file_path = confine(&self.workdir, &request.path).map_err(|err| FixError::Io {
            detail: format!("{err:#}"),
        })?;
        let before = fs::read(&file_path).map_err(io_detail)?;

        self.write_request(request)?;

        let mut cmd = build_command(&self.command, &self.workdir);
        cmd.arg(&request.path).arg(REQUEST_PATH);

        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .map_err(|err| FixError::Io {
                detail: format!("{err:#}"),
            })?;

        if output.timed_out {
            return Err(FixError::Timeout {
                timeout: self.timeout,
            });
        }
        if !output.status.success() {
            return Err(FixError::Tool {
                code: output.status.code(),
                detail: output.merged_text(),
            });
        }

        let after = fs::read(&file_path).map_err(io_detail)?;
        let changed = before != after;
        debug!(changed, "fix applied");
        Ok(FixOutcome { changed })
    }
}

fn io_detail(err: std::io::Error) -> FixError {
    FixError::Io {
        detail: err.to_string(),
    }
}
