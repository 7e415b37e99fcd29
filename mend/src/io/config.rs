//! Tool configuration stored under `.mend/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::score_gate::DEFAULT_QUALITY_THRESHOLD;

/// Repair-loop configuration (TOML).
///
/// Intended to be edited by humans; missing fields default to sensible
/// values so a partial file stays valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MendConfig {
    /// Iteration budget per file.
    pub max_iterations: u32,

    /// Score a file must reach for the quality gate (0-10 scale).
    pub quality_threshold: f64,

    /// Wall-clock budget in seconds for one external stage invocation.
    pub stage_timeout_secs: u64,

    /// Truncate captured stage stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// File extension (without dot) selecting files for the batch.
    pub source_extension: String,

    pub analyzer: StageCommand,
    pub fixer: StageCommand,
    pub tests: StageCommand,
}

/// Command line for one external stage backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StageCommand {
    pub command: Vec<String>,
}

impl StageCommand {
    fn new(parts: &[&str]) -> Self {
        Self {
            command: parts.iter().map(|part| (*part).to_string()).collect(),
        }
    }
}

impl Default for MendConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            stage_timeout_secs: 60,
            output_limit_bytes: 100_000,
            source_extension: "py".to_string(),
            analyzer: StageCommand::new(&["mend-analyzer"]),
            fixer: StageCommand::new(&["mend-fixer"]),
            tests: StageCommand::new(&["pytest", "-q"]),
        }
    }
}

impl MendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stage_timeout_secs == 0 {
            return Err(anyhow!("stage_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if !self.quality_threshold.is_finite() {
            return Err(anyhow!("quality_threshold must be finite"));
        }
        if self.source_extension.trim().is_empty() {
            return Err(anyhow!("source_extension must be non-empty"));
        }
        for (name, stage) in [
            ("analyzer", &self.analyzer),
            ("fixer", &self.fixer),
            ("tests", &self.tests),
        ] {
            if stage.command.is_empty() || stage.command[0].trim().is_empty() {
                return Err(anyhow!("{name}.command must be a non-empty array"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `MendConfig::default()`.
pub fn load_config(path: &Path) -> Result<MendConfig> {
    if !path.exists() {
        let cfg = MendConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MendConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &MendConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, MendConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = MendConfig::default();
        cfg.max_iterations = 3;
        cfg.quality_threshold = 7.5;
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_iterations = 2\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 2);
        assert_eq!(cfg.quality_threshold, DEFAULT_QUALITY_THRESHOLD);
    }

    #[test]
    fn empty_stage_command_is_rejected() {
        let mut cfg = MendConfig::default();
        cfg.fixer.command.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("fixer.command"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut cfg = MendConfig::default();
        cfg.stage_timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }
}
