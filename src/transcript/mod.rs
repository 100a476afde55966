use std::fmt;
use std::sync::Arc;

use crate::utils::format_timestamp;
use crate::youtube::{CaptionError, Segment, TranscriptSource};

/// A successfully fetched transcript, rendered as timestamped lines
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub language: String,
    pub is_generated: bool,
    /// One `[HH:MM:SS] text` line per segment
    pub lines: Vec<String>,
}

/// Why no transcript could be obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptFailure {
    NoTranscriptFound,
    TranscriptsDisabled,
    NoUsableTranscript,
    Service(String),
}

impl fmt::Display for TranscriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptFailure::NoTranscriptFound => write!(f, "No transcript found"),
            TranscriptFailure::TranscriptsDisabled => {
                write!(f, "Transcripts are disabled for this video")
            }
            TranscriptFailure::NoUsableTranscript => write!(f, "No usable transcript found"),
            TranscriptFailure::Service(message) => write!(f, "{}", message),
        }
    }
}

/// Result of a single resolution attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    Success(Transcript),
    Failure(TranscriptFailure),
}

/// Render segments as timestamped transcript lines
pub fn render_lines(segments: &[Segment]) -> Vec<String> {
    segments
        .iter()
        .map(|segment| format!("{} {}", format_timestamp(segment.start), segment.text))
        .collect()
}

/// Picks the first caption track that can actually be fetched
pub struct TranscriptResolver {
    source: Arc<dyn TranscriptSource>,
}

impl TranscriptResolver {
    pub fn new(source: Arc<dyn TranscriptSource>) -> Self {
        Self { source }
    }

    /// Try every listed track in order and return the first one that fetches
    pub async fn resolve(&self, video_id: &str) -> TranscriptOutcome {
        tracing::info!("Fetching transcript for video {}", video_id);

        let tracks = match self.source.list_tracks(video_id).await {
            Ok(tracks) => tracks,
            Err(CaptionError::NotFound(_)) => {
                tracing::info!("No transcript found for video {}", video_id);
                return TranscriptOutcome::Failure(TranscriptFailure::NoTranscriptFound);
            }
            Err(CaptionError::Disabled(_)) => {
                tracing::info!("Transcripts are disabled for video {}", video_id);
                return TranscriptOutcome::Failure(TranscriptFailure::TranscriptsDisabled);
            }
            Err(CaptionError::Other(e)) => {
                tracing::warn!("Failed to list transcripts for video {}: {:#}", video_id, e);
                return TranscriptOutcome::Failure(TranscriptFailure::Service(e.to_string()));
            }
        };

        for track in &tracks {
            tracing::debug!(
                "Trying {} transcript (generated: {})",
                track.language,
                track.is_generated
            );

            match self.source.fetch_track(track).await {
                Ok(segments) => {
                    return TranscriptOutcome::Success(Transcript {
                        language: track.language.clone(),
                        is_generated: track.is_generated,
                        lines: render_lines(&segments),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to fetch {} transcript for video {}: {:#}",
                        track.language,
                        video_id,
                        e
                    );
                }
            }
        }

        tracing::info!("No usable transcript for video {}", video_id);
        TranscriptOutcome::Failure(TranscriptFailure::NoUsableTranscript)
    }
}
