use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::channel::{ChannelEnumerator, Enumeration};
use crate::config::Config;
use crate::output;
use crate::pacing::Pacing;
use crate::progress::ProgressStore;
use crate::transcript::{TranscriptOutcome, TranscriptResolver};
use crate::utils::extract_video_id;
use crate::youtube::{
    ChannelInfo, DataApiClient, InnertubeClient, MetadataSource, TranscriptSource, VideoRecord,
};
use crate::{HarvestError, Result};

/// Cooperative interruption flag checked between videos
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Set the flag when Ctrl-C is received instead of killing the process
    pub fn listen_for_ctrl_c(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if flag.is_triggered() {
                    tracing::warn!("Interrupt already requested, ignoring; waiting for the current step to finish");
                } else {
                    tracing::warn!("Interrupt received, stopping after the current step");
                    flag.trigger();
                }
            }
        });
    }
}

/// Decides whether a saved checkpoint should be resumed
pub trait ResumePrompt: Send + Sync {
    fn confirm_resume(&self, pending: usize, processed: usize) -> Result<bool>;
}

/// Asks on stdout and reads the answer from stdin
pub struct ConsolePrompt;

impl ResumePrompt for ConsolePrompt {
    fn confirm_resume(&self, pending: usize, processed: usize) -> Result<bool> {
        ask_resume(
            &mut std::io::stdin().lock(),
            &mut std::io::stdout(),
            pending,
            processed,
        )
    }
}

/// Write the resume question to `output` and read one answer line from `input`.
///
/// End of input counts as a refusal.
pub fn ask_resume<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    pending: usize,
    processed: usize,
) -> Result<bool> {
    writeln!(
        output,
        "Found saved progress: {} videos processed, {} pending.",
        processed, pending
    )?;
    write!(output, "Resume the previous run? (s/n): ")?;
    output.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read the resume answer")?;
    Ok(is_affirmative(&answer))
}

/// Always gives the same answer
pub struct FixedAnswer(pub bool);

impl ResumePrompt for FixedAnswer {
    fn confirm_resume(&self, _pending: usize, _processed: usize) -> Result<bool> {
        Ok(self.0)
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "si" | "sí" | "y" | "yes"
    )
}

/// Options for a channel run
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub channel_id: String,
    pub output_dir: PathBuf,
    /// Maximum videos to process from the starting point (0 = all)
    pub limit: usize,
    /// Ignore checkpoints and existing transcript files
    pub force: bool,
}

/// Aggregate result of a completed channel run
#[derive(Debug, Clone)]
pub struct ChannelReport {
    pub channel: ChannelInfo,
    /// Videos completed by earlier runs that this run resumed from
    pub previously_processed: usize,
    /// Per-video outcomes of this run
    pub videos: Vec<VideoRecord>,
    /// False when enumeration stopped early on a service error
    pub enumeration_complete: bool,
    pub summary_path: PathBuf,
    pub text_dir: PathBuf,
}

impl ChannelReport {
    pub fn attempted(&self) -> usize {
        self.videos.len()
    }

    pub fn total(&self) -> usize {
        self.previously_processed + self.videos.len()
    }

    pub fn with_transcript(&self) -> usize {
        self.videos.iter().filter(|v| v.has_transcript()).count()
    }

    pub fn without_transcript(&self) -> usize {
        self.attempted() - self.with_transcript()
    }

    pub fn skipped(&self) -> usize {
        self.videos.iter().filter(|v| v.is_skip()).count()
    }
}

/// Result of single-video mode
#[derive(Debug, Clone)]
pub struct VideoReport {
    pub video: VideoRecord,
    pub transcript_path: PathBuf,
    pub preview: Vec<String>,
    pub preview_complete: bool,
}

enum ItemResult {
    Skipped,
    Fetched,
}

/// Drives enumeration, resume, transcript resolution and persistence
pub struct BatchPipeline {
    config: Config,
    metadata: Arc<dyn MetadataSource>,
    resolver: TranscriptResolver,
    prompt: Box<dyn ResumePrompt>,
    interrupt: InterruptFlag,
    item_pacing: Pacing,
    page_pacing: Pacing,
    show_progress: bool,
}

impl BatchPipeline {
    /// Create a pipeline backed by the YouTube services
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let api_key = config
            .api_key()
            .ok_or_else(|| HarvestError::Config("YouTube API key is not configured".to_string()))?
            .to_string();
        let metadata = DataApiClient::new(api_key, config.youtube.api_base_url.clone())?;
        let transcripts = InnertubeClient::new(&config.youtube.user_agent)?;

        Ok(Self::with_sources(config, Arc::new(metadata), Arc::new(transcripts)))
    }

    /// Create a pipeline over arbitrary service implementations
    pub fn with_sources(
        config: Config,
        metadata: Arc<dyn MetadataSource>,
        transcripts: Arc<dyn TranscriptSource>,
    ) -> Self {
        let item_pacing = Pacing::from_millis(config.app.item_delay_ms);
        let page_pacing = Pacing::from_millis(config.app.page_delay_ms);

        Self {
            config,
            metadata,
            resolver: TranscriptResolver::new(transcripts),
            prompt: Box::new(ConsolePrompt),
            interrupt: InterruptFlag::new(),
            item_pacing,
            page_pacing,
            show_progress: true,
        }
    }

    pub fn with_prompt(mut self, prompt: Box<dyn ResumePrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_pacing(mut self, item: Pacing, page: Pacing) -> Self {
        self.item_pacing = item;
        self.page_pacing = page;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.show_progress = !quiet;
        self
    }

    /// Fetch and save the transcript of one video
    pub async fn run_video(&self, input: &str, output_dir: &Path) -> Result<VideoReport> {
        let video_id = extract_video_id(input);
        tracing::info!("Processing single video {}", video_id);

        let metadata = self
            .metadata
            .video_info(&video_id)
            .await?
            .ok_or_else(|| HarvestError::VideoNotFound(video_id.clone()))?;
        let mut video = VideoRecord::from_metadata(metadata);

        let transcript = match self.resolver.resolve(&video.id).await {
            TranscriptOutcome::Success(transcript) => transcript,
            TranscriptOutcome::Failure(failure) => {
                return Err(HarvestError::TranscriptUnavailable(failure.to_string()).into());
            }
        };

        let text_dir = output::ensure_output_dirs(output_dir)?;
        let transcript_path = output::transcript_path(&text_dir, &video);
        output::save_transcript(&transcript_path, &video, &transcript)?;
        video.record_success(&transcript.language, transcript.is_generated);

        let (preview, preview_complete) = output::preview(&transcript);
        Ok(VideoReport {
            video,
            transcript_path,
            preview,
            preview_complete,
        })
    }

    /// Process every video of a channel, resuming from a checkpoint when asked
    pub async fn run_channel(&self, options: &ChannelOptions) -> Result<ChannelReport> {
        let channel_id = options.channel_id.as_str();
        let output_dir = options.output_dir.as_path();
        let text_dir = output::ensure_output_dirs(output_dir)?;

        let channel = match self.metadata.channel_info(channel_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                tracing::error!("Channel {} not found, aborting", channel_id);
                return Err(HarvestError::ChannelNotFound(channel_id.to_string()).into());
            }
            Err(e) => {
                tracing::error!("Could not fetch channel {}: {:#}", channel_id, e);
                return Err(e.context(format!("Failed to look up channel {}", channel_id)));
            }
        };
        tracing::info!("Channel: {} ({} videos)", channel.title, channel.video_count);

        if let Err(e) = output::save_channel_info(output_dir, &channel) {
            tracing::warn!("Could not save channel info: {:#}", e);
        }

        let store = ProgressStore::new(output_dir);
        let saved = store.load(channel_id);

        let resume = !saved.is_empty()
            && !options.force
            && self
                .prompt
                .confirm_resume(saved.remaining.len(), saved.processed_count)?;

        let (mut videos, previously_processed, enumeration_complete) = if resume {
            tracing::info!(
                "Resuming from video {} with {} pending",
                saved.processed_count + 1,
                saved.remaining.len()
            );
            (saved.remaining, saved.processed_count, true)
        } else {
            let enumeration = self.enumerate(&channel).await;
            (enumeration.videos, 0, enumeration.complete)
        };

        if self.interrupt.is_triggered() && !videos.is_empty() {
            let remaining = videos.len();
            store.save(channel_id, previously_processed, &videos)?;
            tracing::warn!("Interrupted before processing started, progress saved; run again to resume");
            return Err(HarvestError::Interrupted { remaining }.into());
        }

        if options.limit > 0 && videos.len() > options.limit {
            tracing::info!("Limiting this run to {} videos", options.limit);
            videos.truncate(options.limit);
        }

        self.process_videos(
            &store,
            channel_id,
            &mut videos,
            previously_processed,
            &text_dir,
            options.force,
        )
        .await?;

        let summary_path =
            output::save_summary(output_dir, channel_id, &videos, chrono::Local::now())?;
        store.remove(channel_id)?;

        Ok(ChannelReport {
            channel,
            previously_processed,
            videos,
            enumeration_complete,
            summary_path,
            text_dir,
        })
    }

    async fn enumerate(&self, channel: &ChannelInfo) -> Enumeration {
        let spinner = self.spinner("Listing channel videos...");
        let enumeration = ChannelEnumerator::new(self.metadata.as_ref(), self.page_pacing)
            .enumerate_uploads(channel)
            .await;
        spinner.finish_with_message(format!("Found {} videos", enumeration.videos.len()));
        enumeration
    }

    /// Iterate the working list, checkpointing periodically and on interruption or error
    async fn process_videos(
        &self,
        store: &ProgressStore,
        channel_id: &str,
        videos: &mut [VideoRecord],
        previously_processed: usize,
        text_dir: &Path,
        force: bool,
    ) -> Result<()> {
        let total = previously_processed + videos.len();
        let interval = self.config.app.checkpoint_interval.max(1);
        let progress = self.progress_bar(videos.len() as u64);

        for index in 0..videos.len() {
            progress.set_message(videos[index].title.clone());
            tracing::info!(
                "Processing video {}/{}: {}",
                previously_processed + index + 1,
                total,
                videos[index].title
            );

            let result = match self.process_video(&mut videos[index], text_dir, force).await {
                Ok(result) => result,
                Err(e) => {
                    // The failing video never finished, so it stays pending
                    tracing::error!("Processing stopped by an unexpected error: {:#}", e);
                    emergency_checkpoint(
                        store,
                        channel_id,
                        previously_processed + index,
                        &videos[index..],
                    );
                    progress.abandon();
                    return Err(e);
                }
            };
            progress.inc(1);

            let done = index + 1;
            if done % interval == 0 && done < videos.len() {
                if let Err(e) = store.save(channel_id, previously_processed + done, &videos[done..]) {
                    tracing::error!("Periodic checkpoint failed: {:#}", e);
                    emergency_checkpoint(
                        store,
                        channel_id,
                        previously_processed + done,
                        &videos[done..],
                    );
                    progress.abandon();
                    return Err(e);
                }
            }

            if self.interrupt.is_triggered() && done < videos.len() {
                let remaining = videos.len() - done;
                store.save(channel_id, previously_processed + done, &videos[done..])?;
                progress.abandon_with_message("Interrupted");
                tracing::warn!("Interrupted by user, progress saved; run again to resume");
                return Err(HarvestError::Interrupted { remaining }.into());
            }

            if matches!(result, ItemResult::Fetched) && done < videos.len() {
                self.item_pacing.pause().await;
            }
        }

        progress.finish_with_message("Done");
        Ok(())
    }

    async fn process_video(
        &self,
        video: &mut VideoRecord,
        text_dir: &Path,
        force: bool,
    ) -> Result<ItemResult> {
        video.clear_outcome();
        let path = output::transcript_path(text_dir, video);

        let exists = !force
            && path
                .try_exists()
                .with_context(|| format!("Failed to check transcript file {}", path.display()))?;
        if exists {
            tracing::info!("Transcript already exists for {}, skipping", video.id);
            video.record_skip();
            return Ok(ItemResult::Skipped);
        }

        match self.resolver.resolve(&video.id).await {
            TranscriptOutcome::Success(transcript) => {
                match output::save_transcript(&path, video, &transcript) {
                    Ok(()) => video.record_success(&transcript.language, transcript.is_generated),
                    Err(e) => {
                        tracing::warn!("{:#}", e);
                        video.record_failure(format!("{:#}", e));
                    }
                }
            }
            TranscriptOutcome::Failure(failure) => {
                video.record_failure(failure.to_string());
            }
        }

        Ok(ItemResult::Fetched)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(120));
        spinner
    }
}

fn emergency_checkpoint(
    store: &ProgressStore,
    channel_id: &str,
    processed_count: usize,
    remaining: &[VideoRecord],
) {
    if let Err(e) = store
        .save(channel_id, processed_count, remaining)
        .context("Emergency checkpoint failed")
    {
        tracing::error!("{:#}", e);
    }
}
