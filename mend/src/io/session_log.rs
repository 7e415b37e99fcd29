//! Per-run artifacts under `.mend/runs/<run-id>/`.
//!
//! # Separation of Concerns
//!
//! - **Tracing (`logging`)**: dev diagnostics via `RUST_LOG`, stderr only.
//! - **Run artifacts (this module)**: product output. `events.jsonl` holds
//!   one stage event per line as the run progresses; `report.json` holds the
//!   final session report.

use std::fs::{self, File};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use crate::batch::SessionReport;
use crate::events::{EventSink, StageEvent};

/// Stable locations of one run's artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub dir: PathBuf,
    pub events_path: PathBuf,
    pub report_path: PathBuf,
}

impl RunPaths {
    pub fn new(root: &Path, run_id: &str) -> Self {
        let dir = root.join(".mend").join("runs").join(run_id);
        Self {
            events_path: dir.join("events.jsonl"),
            report_path: dir.join("report.json"),
            dir,
        }
    }
}

/// Event sink that appends one JSON line per stage event, flushed per line so
/// the file is observable while the run is live. Emit failures are logged and
/// swallowed; telemetry must never fail the run.
pub struct JsonlEventSink {
    writer: Mutex<LineWriter<File>>,
}

impl JsonlEventSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create events dir {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("create events file {}", path.display()))?;
        Ok(Self {
            writer: Mutex::new(LineWriter::new(file)),
        })
    }
}

impl EventSink for JsonlEventSink {
    fn emit(&self, event: &StageEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to serialize stage event");
                return;
            }
        };
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        if let Err(err) = writeln!(writer, "{line}") {
            warn!(error = %err, "failed to write stage event");
        }
    }
}

/// Write the final session report as pretty-printed JSON.
pub fn write_report(path: &Path, report: &SessionReport) -> Result<()> {
    write_json(path, report)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
