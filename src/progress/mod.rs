use anyhow::Context;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::youtube::VideoRecord;
use crate::Result;

/// Persisted snapshot of unfinished channel work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub channel_id: String,
    #[serde(default)]
    pub processed_count: usize,
    #[serde(default)]
    pub remaining_videos: Vec<VideoRecord>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Local>>,
}

/// Where a channel run should pick up from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumePoint {
    pub processed_count: usize,
    pub remaining: Vec<VideoRecord>,
}

impl ResumePoint {
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Reads and writes `progreso_{channel}.json` checkpoints in an output directory
pub struct ProgressStore {
    output_dir: PathBuf,
}

impl ProgressStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path(&self, channel_id: &str) -> PathBuf {
        self.output_dir.join(format!("progreso_{}.json", channel_id))
    }

    /// Overwrite the checkpoint for a channel.
    ///
    /// Transcript outcomes are stripped from the remaining records before writing.
    pub fn save(
        &self,
        channel_id: &str,
        processed_count: usize,
        remaining: &[VideoRecord],
    ) -> Result<PathBuf> {
        let checkpoint = Checkpoint {
            channel_id: channel_id.to_string(),
            processed_count,
            remaining_videos: remaining.iter().map(VideoRecord::pending).collect(),
            timestamp: Some(Local::now()),
        };

        let path = self.path(channel_id);
        let content = serde_json::to_string_pretty(&checkpoint)
            .context("Failed to serialize checkpoint")?;

        // Write then rename so an interrupted write never leaves a truncated checkpoint
        let temp_path = path.with_extension("json.tmp");
        fs_err::write(&temp_path, content).context("Failed to write checkpoint")?;
        fs_err::rename(&temp_path, &path).context("Failed to move checkpoint into place")?;

        tracing::info!(
            "Progress saved to {} ({} processed, {} pending)",
            path.display(),
            processed_count,
            remaining.len()
        );
        Ok(path)
    }

    /// Load the checkpoint for a channel.
    ///
    /// Missing, malformed, or foreign-channel checkpoints yield an empty resume point.
    pub fn load(&self, channel_id: &str) -> ResumePoint {
        let path = self.path(channel_id);
        if !path.exists() {
            return ResumePoint::default();
        }

        match read_checkpoint(&path) {
            Ok(checkpoint) if checkpoint.channel_id == channel_id => ResumePoint {
                processed_count: checkpoint.processed_count,
                remaining: checkpoint.remaining_videos,
            },
            Ok(checkpoint) => {
                tracing::warn!(
                    "Progress file {} belongs to channel {}, ignoring it",
                    path.display(),
                    checkpoint.channel_id
                );
                ResumePoint::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load progress from {}: {:#}", path.display(), e);
                ResumePoint::default()
            }
        }
    }

    /// Delete the checkpoint for a channel; returns whether one existed
    pub fn remove(&self, channel_id: &str) -> Result<bool> {
        let path = self.path(channel_id);
        if !path.exists() {
            return Ok(false);
        }

        fs_err::remove_file(&path).context("Failed to remove checkpoint")?;
        tracing::debug!("Removed progress file {}", path.display());
        Ok(true)
    }
}

fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let content = fs_err::read_to_string(path)?;
    let checkpoint = serde_json::from_str(&content).context("Invalid checkpoint JSON")?;
    Ok(checkpoint)
}
