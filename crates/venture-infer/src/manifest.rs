//! Run manifest: a terminal summary of one inference run, mirroring
//! `asm_mcmc::manifest::RunManifest`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use venture_core::{ErrorInfo, VentureError};

/// Structured manifest describing a completed (or in-progress) inference
/// run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Master seed the run was driven by.
    pub master_seed: u64,
    /// Optional human-readable seed label, carried from `SeedPolicy`.
    pub seed_label: Option<String>,
    /// Total inference steps executed.
    pub steps_completed: usize,
    /// Number of directives registered in the trace at manifest time.
    pub directive_count: usize,
    /// Canonical hash of the trace's terminal state.
    pub trace_hash: String,
    /// Metrics file produced during the run, relative to the run directory.
    pub metrics_file: Option<PathBuf>,
    /// Checkpoint files written during the run, in write order.
    pub checkpoints: Vec<PathBuf>,
}

impl RunManifest {
    /// Writes the manifest as pretty JSON, creating parent directories as
    /// needed.
    pub fn write(&self, path: &Path) -> Result<(), VentureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                VentureError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            VentureError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            VentureError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest previously written by [`RunManifest::write`].
    pub fn load(path: &Path) -> Result<Self, VentureError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            VentureError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            VentureError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
