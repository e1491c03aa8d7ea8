//! Checkpointing: enough bookkeeping to resume an inference run, mirroring
//! `asm_mcmc::checkpoint::CheckpointPayload`'s store/load/path-naming shape.
//!
//! Unlike the teacher's `CSSCode`/`HypergraphImpl` (plain serializable data),
//! this crate's `Trace` holds `Rc<dyn OutputPsp>`/`Box<dyn SpAux>` trait
//! objects that have no portable serialization without a stable SP-name
//! registry (out of scope here — spec.md §1 excludes durable storage as a
//! load-bearing feature). A checkpoint therefore records the run-level state
//! needed to keep substream derivation correctly offset on resume (the
//! master seed and how many steps have already run), not a snapshot of trace
//! internals; resuming means the host replays its own directive log (which
//! it already owns per spec.md §6) and continues stepping the kernel from
//! `steps_completed`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use venture_core::{ErrorInfo, VentureError};

/// A single checkpoint's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointPayload {
    /// Inference step count when the checkpoint was written.
    pub steps_completed: usize,
    /// Master seed the run was driven by.
    pub master_seed: u64,
    /// Number of directives registered in the trace at checkpoint time.
    pub directive_count: usize,
    /// Canonical hash of the trace's terminal state at checkpoint time.
    pub trace_hash: String,
}

impl CheckpointPayload {
    /// Writes the payload to `path` as pretty JSON, creating parent
    /// directories as needed.
    pub fn store(&self, path: &Path) -> Result<(), VentureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                VentureError::Serde(
                    ErrorInfo::new("checkpoint-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            VentureError::Serde(
                ErrorInfo::new("checkpoint-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            VentureError::Serde(
                ErrorInfo::new("checkpoint-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Restores a payload previously written by [`CheckpointPayload::store`].
    pub fn load(path: &Path) -> Result<Self, VentureError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            VentureError::Serde(
                ErrorInfo::new("checkpoint-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            VentureError::Serde(
                ErrorInfo::new("checkpoint-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Deterministic checkpoint file naming, mirroring
/// `asm_mcmc::checkpoint::checkpoint_path`.
pub fn checkpoint_path(root: &Path, steps_completed: usize) -> PathBuf {
    root.join(format!("ckpt_{steps_completed:08}.json"))
}
