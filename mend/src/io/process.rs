//! Child process execution with a timeout and bounded output capture.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Merge stdout and stderr into one diagnostics blob with stream markers.
    pub fn merged_text(&self) -> String {
        let mut buf = String::new();
        buf.push_str("=== stdout ===\n");
        buf.push_str(&String::from_utf8_lossy(&self.stdout));
        if self.stdout_truncated > 0 {
            buf.push_str(&format!("\n[stdout truncated {} bytes]\n", self.stdout_truncated));
        }
        buf.push_str("\n=== stderr ===\n");
        buf.push_str(&String::from_utf8_lossy(&self.stderr));
        if self.stderr_truncated > 0 {
            buf.push_str(&format!("\n[stderr truncated {} bytes]\n", self.stderr_truncated));
        }
        buf
    }
}

/// Run a command with a timeout, capturing stdout/stderr without risking pipe
/// deadlocks. Output beyond `output_limit_bytes` per stream is discarded while
/// still draining the pipe.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Build a `Command` from an argv-style vector with a working directory.
/// Caller guarantees `argv` is non-empty (config validation enforces it).
pub fn build_command(argv: &[String], workdir: &Path) -> Command {
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]).current_dir(workdir);
    cmd
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_within_limit() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello"]);
        let output =
            run_command_with_timeout(cmd, Duration::from_secs(5), 1000).expect("run");
        assert!(output.status.success());
        assert!(!output.timed_out);
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
        assert_eq!(output.stdout_truncated, 0);
    }

    #[test]
    fn truncates_output_beyond_limit() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf 'aaaaaaaaaa'"]);
        let output = run_command_with_timeout(cmd, Duration::from_secs(5), 4).expect("run");
        assert_eq!(output.stdout.len(), 4);
        assert_eq!(output.stdout_truncated, 6);
        assert!(output.merged_text().contains("truncated 6 bytes"));
    }

    #[test]
    fn reports_timeout_without_hanging() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let output =
            run_command_with_timeout(cmd, Duration::from_millis(100), 1000).expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn nonzero_exit_is_not_success() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 3"]);
        let output =
            run_command_with_timeout(cmd, Duration::from_secs(5), 1000).expect("run");
        assert!(!output.status.success());
        assert_eq!(output.status.code(), Some(3));
    }
}
