//! Checkpoint documents.
//!
//! A checkpoint captures everything needed to continue a run on a freshly
//! built board of the same topology: driver state, every core slot, memory
//! pages and controller rows, cache tag arrays, pending events, and the
//! statistics gathered so far. Documents are JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::error::CheckpointError;
use crate::core::processor::SlotImage;
use crate::sim::driver::SimulationState;
use crate::sim::event::QueueImage;
use crate::soc::binding::CacheImage;
use crate::soc::memory::MemoryImage;
use crate::stats::SimStats;
use crate::topology::Topology;

/// Format version written into every checkpoint.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Full simulator state at one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version.
    pub version: u32,
    /// Topology of the board the checkpoint was taken on.
    pub topology: Topology,
    /// Driver state.
    pub state: SimulationState,
    /// Per-core slots.
    pub slots: Vec<SlotImage>,
    /// Memory contents and controller state.
    pub memory: MemoryImage,
    /// Cache tag arrays.
    pub caches: CacheImage,
    /// Pending events.
    pub queue: QueueImage,
    /// Statistics gathered so far.
    pub stats: SimStats,
}

impl Checkpoint {
    /// Conventional file name for a checkpoint taken at `tick`.
    pub fn file_name(tick: u64) -> String {
        format!("cpt.{tick}.json")
    }

    /// Encodes the checkpoint as JSON.
    ///
    /// # Errors
    ///
    /// `CheckpointError::Encoding` if serialization fails.
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a checkpoint and checks its version.
    ///
    /// # Errors
    ///
    /// `Encoding` for malformed JSON, `Incompatible` for an unknown version.
    pub fn from_json(text: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(text)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Incompatible(format!(
                "format version {} (expected {CHECKPOINT_VERSION})",
                checkpoint.version
            )));
        }
        Ok(checkpoint)
    }

    /// Writes the checkpoint to `path`.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be written, `Encoding` if serialization fails.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let text = self.to_json()?;
        fs::write(path, text).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the checkpoint into `dir` under its conventional name.
    ///
    /// # Errors
    ///
    /// As `save`, plus `Io` if the directory cannot be created.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf, CheckpointError> {
        fs::create_dir_all(dir).map_err(|source| CheckpointError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(Self::file_name(self.state.tick));
        self.save(&path)?;
        Ok(path)
    }

    /// Reads a checkpoint from `path`.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as `from_json`.
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let text = fs::read_to_string(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}
