//! Channel Transcripts - A Rust CLI tool for harvesting transcripts from YouTube channels
//!
//! This library enumerates a channel's uploads (or a single video), fetches the best
//! available caption track for each video and writes one text file per transcript plus
//! a CSV summary. Long channel runs checkpoint their progress and can be resumed.

pub mod channel;
pub mod cli;
pub mod config;
pub mod output;
pub mod pacing;
pub mod pipeline;
pub mod progress;
pub mod transcript;
pub mod utils;
pub mod youtube;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pacing::Pacing;
pub use pipeline::{BatchPipeline, ChannelReport, InterruptFlag, ResumePrompt};
pub use transcript::{TranscriptOutcome, TranscriptResolver};
pub use youtube::{ChannelInfo, MetadataSource, TranscriptSource, VideoRecord};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the harvester
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Interrupted by user after checkpointing {remaining} pending videos")]
    Interrupted { remaining: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}
