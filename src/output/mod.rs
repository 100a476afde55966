use anyhow::Context;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::transcript::Transcript;
use crate::utils::sanitize_title;
use crate::youtube::{ChannelInfo, VideoRecord};
use crate::Result;

/// Subdirectory of the output directory holding transcript text files
pub const TEXT_DIR: &str = "texto";

/// Number of transcript lines shown in single-video previews
pub const PREVIEW_LINES: usize = 10;

const SUMMARY_HEADER: [&str; 10] = [
    "ID",
    "URL",
    "Título",
    "Canal",
    "ID del Canal",
    "Fecha de Publicación",
    "Idioma",
    "Generada Automáticamente",
    "Éxito",
    "Error",
];

/// Create the output directory and its text subdirectory
pub fn ensure_output_dirs(output_dir: &Path) -> Result<PathBuf> {
    let text_dir = output_dir.join(TEXT_DIR);
    fs_err::create_dir_all(&text_dir).context("Failed to create output directories")?;
    Ok(text_dir)
}

/// `{id}_{sanitized title}.txt`
pub fn transcript_file_name(video: &VideoRecord) -> String {
    format!("{}_{}.txt", video.id, sanitize_title(&video.title))
}

pub fn transcript_path(text_dir: &Path, video: &VideoRecord) -> PathBuf {
    text_dir.join(transcript_file_name(video))
}

/// Render the transcript text file: metadata header followed by timed lines
pub fn format_transcript(video: &VideoRecord, transcript: &Transcript) -> String {
    let mut content = String::new();
    content.push_str(&format!("Título: {}\n", video.title));
    content.push_str(&format!("URL: {}\n", video.url));
    content.push_str(&format!("Canal: {}\n", video.channel_title));
    content.push_str(&format!("ID del Canal: {}\n", video.channel_id));
    content.push_str(&format!("Fecha de publicación: {}\n", video.published_at));
    content.push_str(&format!("Idioma: {}\n", transcript.language));
    content.push_str(&format!(
        "Generada automáticamente: {}\n",
        if transcript.is_generated { "Sí" } else { "No" }
    ));
    content.push_str("\n--- TRANSCRIPCIÓN ---\n\n");
    for line in &transcript.lines {
        content.push_str(line);
        content.push('\n');
    }
    content
}

/// Write a transcript file to `path`
pub fn save_transcript(path: &Path, video: &VideoRecord, transcript: &Transcript) -> Result<()> {
    fs_err::write(path, format_transcript(video, transcript))
        .with_context(|| format!("Failed to write transcript for video {}", video.id))?;
    tracing::info!("Transcript saved to {}", path.display());
    Ok(())
}

/// Write `canal_{id}_info.json` next to the transcripts
pub fn save_channel_info(output_dir: &Path, info: &ChannelInfo) -> Result<PathBuf> {
    let path = output_dir.join(format!("canal_{}_info.json", info.id));
    let content = serde_json::to_string_pretty(info).context("Failed to serialize channel info")?;
    fs_err::write(&path, content).context("Failed to write channel info")?;
    tracing::info!("Channel info saved to {}", path.display());
    Ok(path)
}

pub fn summary_file_name(channel_id: &str, at: DateTime<Local>) -> String {
    format!(
        "videos_transcripciones_{}_{}.csv",
        channel_id,
        at.format("%Y%m%d_%H%M%S")
    )
}

fn csv_field(value: &str) -> String {
    if value.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_bool(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "True",
        Some(false) => "False",
        None => "",
    }
}

/// Render the per-video summary as CSV
pub fn format_summary(videos: &[VideoRecord]) -> String {
    let mut content = SUMMARY_HEADER.join(",");
    content.push('\n');

    for video in videos {
        let row = [
            csv_field(&video.id),
            csv_field(&video.url),
            csv_field(&video.title),
            csv_field(&video.channel_title),
            csv_field(&video.channel_id),
            csv_field(&video.published_at),
            csv_field(video.transcript_language.as_deref().unwrap_or_default()),
            csv_bool(video.transcript_is_generated).to_string(),
            csv_bool(Some(video.has_transcript())).to_string(),
            csv_field(video.transcript_error.as_deref().unwrap_or_default()),
        ];
        content.push_str(&row.join(","));
        content.push('\n');
    }

    content
}

/// Write the summary CSV for a channel run
pub fn save_summary(
    output_dir: &Path,
    channel_id: &str,
    videos: &[VideoRecord],
    at: DateTime<Local>,
) -> Result<PathBuf> {
    let path = output_dir.join(summary_file_name(channel_id, at));
    fs_err::write(&path, format_summary(videos)).context("Failed to write summary CSV")?;
    tracing::info!("Summary saved to {}", path.display());
    Ok(path)
}

/// First transcript lines for display, plus whether they cover the whole transcript
pub fn preview(transcript: &Transcript) -> (Vec<String>, bool) {
    let lines: Vec<String> = transcript.lines.iter().take(PREVIEW_LINES).cloned().collect();
    let complete = transcript.lines.len() <= PREVIEW_LINES;
    (lines, complete)
}
