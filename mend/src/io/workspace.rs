//! Sandbox workspace: copy-in of the target directory, deterministic file
//! enumeration, and path confinement.
//!
//! Every path the loop hands to a stage backend is relative to the sandbox
//! root; `resolve` rejects absolute paths and parent traversal so no stage
//! can be pointed outside the working area.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;
use walkdir::WalkDir;

/// Working area for one run. All file tasks live under `root`.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `target_dir` into the sandbox, preserving relative layout.
    /// Hidden directories (leading dot) are skipped. Returns the number of
    /// files copied.
    pub fn copy_from(&self, target_dir: &Path) -> Result<usize> {
        if !target_dir.is_dir() {
            return Err(anyhow!("target directory not found: {}", target_dir.display()));
        }
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create sandbox {}", self.root.display()))?;

        let mut copied = 0usize;
        for entry in WalkDir::new(target_dir)
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry.path(), target_dir))
        {
            let entry = entry.with_context(|| format!("walk {}", target_dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(target_dir)
                .context("strip target prefix")?;
            let dest = self.root.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &dest)
                .with_context(|| format!("copy {}", entry.path().display()))?;
            copied += 1;
        }
        debug!(copied, sandbox = %self.root.display(), "copied target into sandbox");
        Ok(copied)
    }

    /// Enumerate source files by extension, as paths relative to the sandbox
    /// root, sorted for a deterministic batch order. The `.mend` state
    /// directory and hidden directories are excluded.
    pub fn list_source_files(&self, extension: &str) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(anyhow!("sandbox not found: {}", self.root.display()));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry.path(), &self.root))
        {
            let entry = entry.with_context(|| format!("walk {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|ext| ext.to_str()) != Some(extension) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .context("strip sandbox prefix")?;
            files.push(relative.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    /// Resolve a relative path against the sandbox root, rejecting escapes.
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf> {
        confine(&self.root, relative)
    }
}

/// Resolve `relative` against `root`, rejecting absolute paths and parent
/// traversal. Every collaborator implementation must route file paths
/// through this before touching the filesystem or spawning a tool.
pub fn confine(root: &Path, relative: &Path) -> Result<PathBuf> {
    if relative.is_absolute() {
        return Err(anyhow!(
            "refusing absolute path {} (sandbox paths are relative)",
            relative.display()
        ));
    }
    for component in relative.components() {
        if matches!(component, Component::ParentDir) {
            return Err(anyhow!(
                "refusing path {} (parent traversal escapes the sandbox)",
                relative.display()
            ));
        }
    }
    Ok(root.join(relative))
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    if path == root {
        return false;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}
