use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod captions;
pub mod data_api;

pub use captions::InnertubeClient;
pub use data_api::DataApiClient;

use crate::utils;
use crate::Result;

/// Snapshot of a channel's metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub video_count: u64,
    pub subscriber_count: u64,
    pub view_count: u64,
    pub uploads_playlist_id: String,
}

/// One entry of a playlist page
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItem {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
}

/// A page of playlist items plus the cursor for the next page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistPage {
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

/// Metadata for a single video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub channel_title: String,
    pub channel_id: String,
    pub published_at: String,
}

/// One available caption track for a video
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptTrack {
    /// Human readable language name
    pub language: String,
    pub language_code: String,
    pub is_generated: bool,
    /// Timed-text endpoint for this track
    pub base_url: String,
}

/// A timed caption segment
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    /// Start offset in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
}

/// A video tracked by the batch pipeline along with its transcript outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    pub published_at: String,
    pub channel_title: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_is_generated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_error: Option<String>,
}

/// Language marker for videos whose transcript file already existed
pub const ALREADY_PROCESSED: &str = "already_processed";

impl VideoRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        published_at: impl Into<String>,
        channel_title: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            url: utils::watch_url(&id),
            id,
            title: title.into(),
            published_at: published_at.into(),
            channel_title: channel_title.into(),
            channel_id: channel_id.into(),
            transcript_success: None,
            transcript_language: None,
            transcript_is_generated: None,
            transcript_error: None,
        }
    }

    pub fn from_metadata(metadata: VideoMetadata) -> Self {
        Self::new(
            metadata.id,
            metadata.title,
            metadata.published_at,
            metadata.channel_title,
            metadata.channel_id,
        )
    }

    pub fn record_success(&mut self, language: &str, is_generated: bool) {
        self.transcript_success = Some(true);
        self.transcript_language = Some(language.to_string());
        self.transcript_is_generated = Some(is_generated);
        self.transcript_error = None;
    }

    /// Mark as a trivially successful skip of an existing transcript file
    pub fn record_skip(&mut self) {
        self.transcript_success = Some(true);
        self.transcript_language = Some(ALREADY_PROCESSED.to_string());
        self.transcript_is_generated = None;
        self.transcript_error = None;
    }

    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.transcript_success = Some(false);
        self.transcript_language = None;
        self.transcript_is_generated = None;
        self.transcript_error = Some(reason.into());
    }

    pub fn clear_outcome(&mut self) {
        self.transcript_success = None;
        self.transcript_language = None;
        self.transcript_is_generated = None;
        self.transcript_error = None;
    }

    /// Copy of the record without any transcript outcome
    pub fn pending(&self) -> Self {
        let mut copy = self.clone();
        copy.clear_outcome();
        copy
    }

    pub fn has_transcript(&self) -> bool {
        self.transcript_success == Some(true)
    }

    pub fn is_skip(&self) -> bool {
        self.transcript_language.as_deref() == Some(ALREADY_PROCESSED)
    }
}

/// Failure modes of the transcript listing query
#[derive(thiserror::Error, Debug)]
pub enum CaptionError {
    #[error("no transcript found for video {0}")]
    NotFound(String),

    #[error("transcripts are disabled for video {0}")]
    Disabled(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Channel, playlist and video metadata queries
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Look up a channel; `None` when it does not exist
    async fn channel_info(&self, channel_id: &str) -> Result<Option<ChannelInfo>>;

    /// Fetch one page of a playlist
    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<PlaylistPage>;

    /// Look up a single video; `None` when it does not exist
    async fn video_info(&self, video_id: &str) -> Result<Option<VideoMetadata>>;
}

/// Caption track listing and retrieval
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// List available tracks in preference order
    async fn list_tracks(&self, video_id: &str) -> std::result::Result<Vec<TranscriptTrack>, CaptionError>;

    /// Fetch the timed segments of one track
    async fn fetch_track(&self, track: &TranscriptTrack) -> Result<Vec<Segment>>;
}
