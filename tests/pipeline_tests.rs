use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use channel_transcripts::pipeline::{ChannelOptions, FixedAnswer};
use channel_transcripts::progress::ProgressStore;
use channel_transcripts::youtube::{
    CaptionError, PlaylistItem, PlaylistPage, Segment, TranscriptTrack, VideoMetadata,
};
use channel_transcripts::{
    BatchPipeline, ChannelInfo, Config, HarvestError, InterruptFlag, MetadataSource, Pacing,
    TranscriptSource, VideoRecord,
};

const CHANNEL: &str = "UC1";

struct FakeMetadata {
    channel: Option<ChannelInfo>,
    items: Vec<PlaylistItem>,
    fail_from_page: Option<usize>,
    page_calls: AtomicUsize,
}

impl FakeMetadata {
    fn with_videos(count: usize) -> Self {
        Self {
            channel: Some(channel_info(count)),
            items: (0..count)
                .map(|i| PlaylistItem {
                    video_id: format!("v{}", i),
                    title: format!("Video {}", i),
                    published_at: format!("2024-01-{:02}T00:00:00Z", i % 28 + 1),
                })
                .collect(),
            fail_from_page: None,
            page_calls: AtomicUsize::new(0),
        }
    }

    fn unknown_channel() -> Self {
        Self {
            channel: None,
            ..Self::with_videos(0)
        }
    }

    fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn channel_info(&self, channel_id: &str) -> anyhow::Result<Option<ChannelInfo>> {
        Ok(self.channel.clone().filter(|c| c.id == channel_id))
    }

    async fn playlist_page(
        &self,
        _playlist_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<PlaylistPage> {
        let call = self.page_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_from_page.is_some_and(|page| call >= page) {
            anyhow::bail!("quotaExceeded");
        }

        let offset: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (offset + page_size as usize).min(self.items.len());
        Ok(PlaylistPage {
            items: self.items[offset..end].to_vec(),
            next_page_token: (end < self.items.len()).then(|| end.to_string()),
        })
    }

    async fn video_info(&self, video_id: &str) -> anyhow::Result<Option<VideoMetadata>> {
        Ok(self
            .items
            .iter()
            .find(|item| item.video_id == video_id)
            .map(|item| VideoMetadata {
                id: item.video_id.clone(),
                title: item.title.clone(),
                channel_title: "Test Channel".to_string(),
                channel_id: CHANNEL.to_string(),
                published_at: item.published_at.clone(),
            }))
    }
}

#[derive(Default)]
struct FakeTranscripts {
    /// Videos without any caption track
    missing: HashSet<String>,
    /// Track URLs whose download fails
    broken: HashSet<String>,
    list_calls: AtomicUsize,
    interrupt_at: Option<(usize, InterruptFlag)>,
    /// Read the checkpoint file when the n-th video is listed
    snapshot_at: Option<(usize, PathBuf)>,
    snapshot: Mutex<Option<String>>,
}

impl FakeTranscripts {
    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptSource for FakeTranscripts {
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TranscriptTrack>, CaptionError> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some((at, flag)) = &self.interrupt_at {
            if call == *at {
                flag.trigger();
            }
        }
        if let Some((at, path)) = &self.snapshot_at {
            if call == *at {
                *self.snapshot.lock().unwrap() = std::fs::read_to_string(path).ok();
            }
        }

        if self.missing.contains(video_id) {
            return Err(CaptionError::NotFound(video_id.to_string()));
        }

        Ok(vec![
            TranscriptTrack {
                language: "Spanish".to_string(),
                language_code: "es".to_string(),
                is_generated: false,
                base_url: format!("{}/es", video_id),
            },
            TranscriptTrack {
                language: "English (auto-generated)".to_string(),
                language_code: "en".to_string(),
                is_generated: true,
                base_url: format!("{}/en", video_id),
            },
        ])
    }

    async fn fetch_track(&self, track: &TranscriptTrack) -> anyhow::Result<Vec<Segment>> {
        if self.broken.contains(&track.base_url) {
            anyhow::bail!("timed text request failed");
        }
        Ok(vec![
            Segment {
                text: format!("hello from {}", track.base_url),
                start: 0.0,
                duration: 2.5,
            },
            Segment {
                text: "second line".to_string(),
                start: 3661.9,
                duration: 1.0,
            },
        ])
    }
}

fn channel_info(video_count: usize) -> ChannelInfo {
    ChannelInfo {
        id: CHANNEL.to_string(),
        title: "Test Channel".to_string(),
        description: "A channel used in tests".to_string(),
        published_at: "2020-01-01T00:00:00Z".to_string(),
        video_count: video_count as u64,
        subscriber_count: 100,
        view_count: 1000,
        uploads_playlist_id: "UU1".to_string(),
    }
}

fn pipeline(
    metadata: &Arc<FakeMetadata>,
    transcripts: &Arc<FakeTranscripts>,
    resume: bool,
) -> BatchPipeline {
    BatchPipeline::with_sources(Config::default(), metadata.clone(), transcripts.clone())
        .with_prompt(Box::new(FixedAnswer(resume)))
        .with_pacing(Pacing::None, Pacing::None)
        .quiet(true)
}

fn options(dir: &Path) -> ChannelOptions {
    ChannelOptions {
        channel_id: CHANNEL.to_string(),
        output_dir: dir.to_path_buf(),
        limit: 0,
        force: false,
    }
}

fn pending(range: std::ops::Range<usize>) -> Vec<VideoRecord> {
    range
        .map(|i| {
            VideoRecord::new(
                format!("v{}", i),
                format!("Video {}", i),
                "2024-01-01T00:00:00Z",
                "Test Channel",
                CHANNEL,
            )
        })
        .collect()
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == extension))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_channel_run_writes_transcripts_summary_and_sidecar() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(3));
    let transcripts = Arc::new(FakeTranscripts {
        missing: HashSet::from(["v1".to_string()]),
        ..Default::default()
    });

    let report = pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.with_transcript(), 2);
    assert_eq!(report.without_transcript(), 1);
    assert!(report.enumeration_complete);
    assert_eq!(
        report.videos[1].transcript_error.as_deref(),
        Some("No transcript found")
    );

    let transcript = std::fs::read_to_string(dir.path().join("texto").join("v0_Video 0.txt")).unwrap();
    assert!(transcript.starts_with("Título: Video 0\nURL: https://www.youtube.com/watch?v=v0\n"));
    assert!(transcript.contains("Idioma: Spanish\nGenerada automáticamente: No\n"));
    assert!(transcript.ends_with("[00:00:00] hello from v0/es\n[01:01:01] second line\n"));
    assert!(!dir.path().join("texto").join("v1_Video 1.txt").exists());

    let summary = std::fs::read_to_string(&report.summary_path).unwrap();
    let rows: Vec<_> = summary.lines().collect();
    assert_eq!(rows.len(), 4);
    assert!(rows[2].starts_with("v1,"));
    assert!(rows[2].ends_with(",False,No transcript found"));

    let sidecar = std::fs::read_to_string(dir.path().join("canal_UC1_info.json")).unwrap();
    let info: ChannelInfo = serde_json::from_str(&sidecar).unwrap();
    assert_eq!(info, channel_info(3));

    assert!(!ProgressStore::new(dir.path()).path(CHANNEL).exists());
}

#[tokio::test]
async fn test_second_run_skips_existing_transcripts() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(4));
    let transcripts = Arc::new(FakeTranscripts::default());

    pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();
    assert_eq!(transcripts.list_calls(), 4);

    let report = pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert_eq!(transcripts.list_calls(), 4);
    assert_eq!(report.skipped(), 4);
    assert_eq!(report.with_transcript(), 4);
    assert!(report
        .videos
        .iter()
        .all(|v| v.transcript_language.as_deref() == Some("already_processed")
            && v.transcript_is_generated.is_none()));
}

#[tokio::test]
async fn test_force_refetches_existing_transcripts() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(2));
    let transcripts = Arc::new(FakeTranscripts::default());

    pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    let mut forced = options(dir.path());
    forced.force = true;
    let report = pipeline(&metadata, &transcripts, false)
        .run_channel(&forced)
        .await
        .unwrap();

    assert_eq!(transcripts.list_calls(), 4);
    assert_eq!(report.skipped(), 0);
    assert_eq!(report.videos[0].transcript_language.as_deref(), Some("Spanish"));
}

#[tokio::test]
async fn test_resume_continues_from_checkpoint() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(10));
    let transcripts = Arc::new(FakeTranscripts::default());
    let store = ProgressStore::new(dir.path());
    store.save(CHANNEL, 7, &pending(7..10)).unwrap();

    let report = pipeline(&metadata, &transcripts, true)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert_eq!(metadata.page_calls(), 0);
    assert_eq!(transcripts.list_calls(), 3);
    assert_eq!(report.previously_processed, 7);
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.total(), 10);
    assert_eq!(report.videos[0].id, "v7");
    assert!(!store.path(CHANNEL).exists());
}

#[tokio::test]
async fn test_declined_resume_enumerates_again() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(10));
    let transcripts = Arc::new(FakeTranscripts::default());
    ProgressStore::new(dir.path())
        .save(CHANNEL, 7, &pending(7..10))
        .unwrap();

    let report = pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert_eq!(metadata.page_calls(), 1);
    assert_eq!(report.previously_processed, 0);
    assert_eq!(report.attempted(), 10);
}

#[tokio::test]
async fn test_checkpoint_for_other_channel_is_ignored() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(5));
    let transcripts = Arc::new(FakeTranscripts::default());

    let store = ProgressStore::new(dir.path());
    let foreign = store.save("UCother", 3, &pending(0..2)).unwrap();
    std::fs::rename(&foreign, store.path(CHANNEL)).unwrap();

    let report = pipeline(&metadata, &transcripts, true)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert_eq!(report.previously_processed, 0);
    assert_eq!(report.attempted(), 5);
}

#[tokio::test]
async fn test_unknown_channel_fails_without_writing_files() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::unknown_channel());
    let transcripts = Arc::new(FakeTranscripts::default());

    let err = pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HarvestError>(),
        Some(HarvestError::ChannelNotFound(id)) if id == CHANNEL
    ));
    assert_eq!(transcripts.list_calls(), 0);
    assert!(files_with_extension(dir.path(), "csv").is_empty());
    assert!(files_with_extension(dir.path(), "json").is_empty());
    assert!(files_with_extension(&dir.path().join("texto"), "txt").is_empty());
}

#[tokio::test]
async fn test_limit_applies_from_starting_point() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(10));
    let transcripts = Arc::new(FakeTranscripts::default());

    let mut limited = options(dir.path());
    limited.limit = 4;
    let report = pipeline(&metadata, &transcripts, false)
        .run_channel(&limited)
        .await
        .unwrap();
    assert_eq!(report.attempted(), 4);
    assert_eq!(report.videos.last().unwrap().id, "v3");

    ProgressStore::new(dir.path())
        .save(CHANNEL, 7, &pending(7..10))
        .unwrap();
    limited.limit = 2;
    let report = pipeline(&metadata, &transcripts, true)
        .run_channel(&limited)
        .await
        .unwrap();
    assert_eq!(report.attempted(), 2);
    assert_eq!(report.videos[0].id, "v7");
    assert_eq!(report.total(), 9);
}

#[tokio::test]
async fn test_interrupt_checkpoints_exact_progress_and_resumes() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(25));
    let interrupt = InterruptFlag::new();
    let transcripts = Arc::new(FakeTranscripts {
        interrupt_at: Some((12, interrupt.clone())),
        ..Default::default()
    });

    let err = pipeline(&metadata, &transcripts, false)
        .with_interrupt(interrupt)
        .run_channel(&options(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HarvestError>(),
        Some(HarvestError::Interrupted { remaining: 13 })
    ));
    assert_eq!(transcripts.list_calls(), 12);
    assert!(files_with_extension(dir.path(), "csv").is_empty());

    let store = ProgressStore::new(dir.path());
    let saved = store.load(CHANNEL);
    assert_eq!(saved.processed_count, 12);
    assert_eq!(saved.remaining.len(), 13);
    assert_eq!(saved.remaining[0].id, "v12");
    assert!(saved.remaining.iter().all(|v| v.transcript_success.is_none()));

    let resumed_source = Arc::new(FakeTranscripts::default());
    let report = pipeline(&metadata, &resumed_source, true)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert_eq!(resumed_source.list_calls(), 13);
    assert_eq!(report.total(), 25);
    assert!(!store.path(CHANNEL).exists());
    assert_eq!(files_with_extension(&dir.path().join("texto"), "txt").len(), 25);
}

#[tokio::test]
async fn test_periodic_checkpoint_every_ten_videos() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(15));
    let transcripts = Arc::new(FakeTranscripts {
        snapshot_at: Some((11, ProgressStore::new(dir.path()).path(CHANNEL))),
        ..Default::default()
    });

    pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    let snapshot = transcripts.snapshot.lock().unwrap().clone().unwrap();
    let checkpoint: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(checkpoint["channel_id"], CHANNEL);
    assert_eq!(checkpoint["processed_count"], 10);
    assert_eq!(checkpoint["remaining_videos"].as_array().unwrap().len(), 5);
    assert_eq!(checkpoint["remaining_videos"][0]["id"], "v10");
}

#[tokio::test]
async fn test_failed_page_keeps_partial_enumeration() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata {
        fail_from_page: Some(1),
        ..FakeMetadata::with_videos(60)
    });
    let transcripts = Arc::new(FakeTranscripts::default());

    let report = pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert!(!report.enumeration_complete);
    assert_eq!(report.attempted(), 50);
}

#[tokio::test]
async fn test_falls_back_to_next_track() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(2));
    let transcripts = Arc::new(FakeTranscripts {
        broken: HashSet::from(["v0/es".to_string(), "v1/es".to_string(), "v1/en".to_string()]),
        ..Default::default()
    });

    let report = pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert_eq!(
        report.videos[0].transcript_language.as_deref(),
        Some("English (auto-generated)")
    );
    assert_eq!(report.videos[0].transcript_is_generated, Some(true));
    assert_eq!(
        report.videos[1].transcript_error.as_deref(),
        Some("No usable transcript found")
    );

    let text = std::fs::read_to_string(dir.path().join("texto").join("v0_Video 0.txt")).unwrap();
    assert!(text.contains("Generada automáticamente: Sí\n"));
    assert!(text.contains("hello from v0/en"));
}

#[tokio::test]
async fn test_single_video_from_short_url() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(3));
    let transcripts = Arc::new(FakeTranscripts::default());

    let report = pipeline(&metadata, &transcripts, false)
        .run_video("https://youtu.be/v2?si=shared", dir.path())
        .await
        .unwrap();

    assert_eq!(report.video.id, "v2");
    assert_eq!(report.video.url, "https://www.youtube.com/watch?v=v2");
    assert_eq!(report.transcript_path, dir.path().join("texto").join("v2_Video 2.txt"));
    assert!(report.transcript_path.exists());
    assert_eq!(report.preview.len(), 2);
    assert!(report.preview_complete);
}

#[tokio::test]
async fn test_single_video_errors() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(2));
    let transcripts = Arc::new(FakeTranscripts {
        missing: HashSet::from(["v1".to_string()]),
        ..Default::default()
    });
    let pipeline = pipeline(&metadata, &transcripts, false);

    let err = pipeline
        .run_video("https://www.youtube.com/watch?v=nope&t=4", dir.path())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HarvestError>(),
        Some(HarvestError::VideoNotFound(id)) if id == "nope"
    ));

    let err = pipeline.run_video("v1", dir.path()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HarvestError>(),
        Some(HarvestError::TranscriptUnavailable(_))
    ));
    assert!(files_with_extension(&dir.path().join("texto"), "txt").is_empty());
}

#[tokio::test]
async fn test_unexpected_error_keeps_failing_video_pending() {
    let dir = TempDir::new().unwrap();
    let mut source = FakeMetadata::with_videos(3);
    // 300 bytes of title exceed the file name limit, so even checking for the file fails
    source.items[1].title = "あ".repeat(100);
    let metadata = Arc::new(source);
    let transcripts = Arc::new(FakeTranscripts::default());

    let err = pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to check transcript file"));
    assert_eq!(transcripts.list_calls(), 1);
    assert!(files_with_extension(dir.path(), "csv").is_empty());

    let saved = ProgressStore::new(dir.path()).load(CHANNEL);
    assert_eq!(saved.processed_count, 1);
    let ids: Vec<_> = saved.remaining.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, ["v1", "v2"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_transcript_write_error_marks_row_failed_and_continues() {
    let dir = TempDir::new().unwrap();
    let text_dir = dir.path().join("texto");
    std::fs::create_dir_all(&text_dir).unwrap();
    // A dangling link into a missing directory: the file looks absent but cannot be created
    std::os::unix::fs::symlink(
        dir.path().join("missing").join("target.txt"),
        text_dir.join("v1_Video 1.txt"),
    )
    .unwrap();

    let metadata = Arc::new(FakeMetadata::with_videos(3));
    let transcripts = Arc::new(FakeTranscripts::default());

    let report = pipeline(&metadata, &transcripts, false)
        .run_channel(&options(dir.path()))
        .await
        .unwrap();

    assert_eq!(transcripts.list_calls(), 3);
    assert_eq!(report.with_transcript(), 2);
    assert_eq!(report.videos[1].transcript_success, Some(false));
    assert!(report.videos[1]
        .transcript_error
        .as_deref()
        .unwrap()
        .contains("Failed to write transcript for video v1"));
    assert!(report.videos[2].has_transcript());
    assert!(report.summary_path.exists());
    assert!(!ProgressStore::new(dir.path()).path(CHANNEL).exists());
}

#[tokio::test]
async fn test_interrupt_during_enumeration_saves_full_list() {
    let dir = TempDir::new().unwrap();
    let metadata = Arc::new(FakeMetadata::with_videos(5));
    let transcripts = Arc::new(FakeTranscripts::default());
    let interrupt = InterruptFlag::new();
    interrupt.trigger();

    let err = pipeline(&metadata, &transcripts, false)
        .with_interrupt(interrupt)
        .run_channel(&options(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<HarvestError>(),
        Some(HarvestError::Interrupted { remaining: 5 })
    ));
    assert_eq!(transcripts.list_calls(), 0);

    let saved = ProgressStore::new(dir.path()).load(CHANNEL);
    assert_eq!(saved.processed_count, 0);
    assert_eq!(saved.remaining.len(), 5);
}
