use anyhow::{anyhow, Context};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use super::{CaptionError, Segment, TranscriptSource, TranscriptTrack};
use crate::Result;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const INNERTUBE_PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player?key=";

/// Caption client that talks to the InnerTube player endpoint
pub struct InnertubeClient {
    client: reqwest::Client,
    api_key_pattern: Regex,
    text_pattern: Regex,
    tag_pattern: Regex,
}

impl InnertubeClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US"),
        );

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key_pattern: Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#)?,
            text_pattern: Regex::new(
                r#"(?s)<text start="([^"]*)"(?:\s+dur="([^"]*)")?[^>]*>(.*?)</text>"#,
            )?,
            tag_pattern: Regex::new(r"<[^>]*>")?,
        })
    }

    async fn fetch_watch_page(&self, video_id: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}{}", WATCH_URL, urlencoding::encode(video_id)))
            .send()
            .await
            .context("Failed to fetch watch page")?;

        if !response.status().is_success() {
            anyhow::bail!("Watch page returned HTTP {}", response.status());
        }

        Ok(response.text().await?)
    }

    fn extract_api_key(&self, html: &str) -> Result<String> {
        if html.contains("g-recaptcha") {
            anyhow::bail!("Request blocked by a captcha challenge");
        }

        self.api_key_pattern
            .captures(html)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| anyhow!("Could not find the InnerTube API key in the watch page"))
    }

    async fn fetch_player_data(&self, video_id: &str, api_key: &str) -> Result<Value> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": "20.10.38"
                }
            },
            "videoId": video_id
        });

        let response = self
            .client
            .post(format!("{}{}", INNERTUBE_PLAYER_URL, api_key))
            .json(&body)
            .send()
            .await
            .context("Failed to query the player endpoint")?;

        if !response.status().is_success() {
            anyhow::bail!("Player endpoint returned HTTP {}", response.status());
        }

        Ok(response.json().await.context("Failed to parse player response")?)
    }

    /// Parse timed-text XML into segments
    pub fn parse_timed_text(&self, xml: &str) -> Vec<Segment> {
        self.text_pattern
            .captures_iter(xml)
            .map(|captures| {
                let start = captures
                    .get(1)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .unwrap_or(0.0);
                let duration = captures
                    .get(2)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .unwrap_or(0.0);
                let raw = captures.get(3).map(|m| m.as_str()).unwrap_or_default();
                // Caption text is escaped twice: once as XML, once as HTML
                let once = html_escape::decode_html_entities(raw);
                let decoded = html_escape::decode_html_entities(&once);
                let text = self.tag_pattern.replace_all(&decoded, "").trim().to_string();

                Segment { text, start, duration }
            })
            .collect()
    }
}

/// Extract caption tracks from an InnerTube player response.
///
/// Manually created tracks come first, then generated ones, each group in the
/// order the service returned them.
pub fn tracks_from_player_response(
    video_id: &str,
    player: &Value,
) -> std::result::Result<Vec<TranscriptTrack>, CaptionError> {
    if let Some(status) = player.get("playabilityStatus") {
        let state = status.get("status").and_then(Value::as_str).unwrap_or("OK");
        if state != "OK" {
            let reason = status
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown reason");
            return Err(CaptionError::Other(anyhow!(
                "Video {} is not playable ({}): {}",
                video_id,
                state,
                reason
            )));
        }
    }

    let renderer = player
        .get("captions")
        .and_then(|c| c.get("playerCaptionsTracklistRenderer"))
        .ok_or_else(|| CaptionError::Disabled(video_id.to_string()))?;

    let mut manual = Vec::new();
    let mut generated = Vec::new();

    for caption in renderer
        .get("captionTracks")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let (Some(language_code), Some(base_url)) = (
            caption.get("languageCode").and_then(Value::as_str),
            caption.get("baseUrl").and_then(Value::as_str),
        ) else {
            continue;
        };

        let language = caption
            .get("name")
            .and_then(|n| {
                n.get("simpleText").or_else(|| {
                    n.get("runs")
                        .and_then(Value::as_array)
                        .and_then(|runs| runs.first())
                        .and_then(|run| run.get("text"))
                })
            })
            .and_then(Value::as_str)
            .unwrap_or(language_code)
            .to_string();

        let is_generated = caption.get("kind").and_then(Value::as_str) == Some("asr");

        let track = TranscriptTrack {
            language,
            language_code: language_code.to_string(),
            is_generated,
            base_url: base_url.replace("&fmt=srv3", ""),
        };

        if is_generated {
            generated.push(track);
        } else {
            manual.push(track);
        }
    }

    if manual.is_empty() && generated.is_empty() {
        return Err(CaptionError::NotFound(video_id.to_string()));
    }

    manual.extend(generated);
    Ok(manual)
}

#[async_trait]
impl TranscriptSource for InnertubeClient {
    async fn list_tracks(
        &self,
        video_id: &str,
    ) -> std::result::Result<Vec<TranscriptTrack>, CaptionError> {
        tracing::debug!("Listing caption tracks for {}", video_id);

        let html = self.fetch_watch_page(video_id).await?;
        let api_key = self.extract_api_key(&html)?;
        let player = self.fetch_player_data(video_id, &api_key).await?;

        tracks_from_player_response(video_id, &player)
    }

    async fn fetch_track(&self, track: &TranscriptTrack) -> Result<Vec<Segment>> {
        if track.base_url.contains("&exp=xpe") {
            anyhow::bail!("Track {} requires a proof-of-origin token", track.language_code);
        }

        let response = self
            .client
            .get(&track.base_url)
            .send()
            .await
            .context("Failed to fetch timed text")?;

        if !response.status().is_success() {
            anyhow::bail!("Timed text returned HTTP {}", response.status());
        }

        let xml = response.text().await?;
        let segments = self.parse_timed_text(&xml);
        if segments.is_empty() {
            anyhow::bail!("Timed text for {} contained no segments", track.language_code);
        }

        Ok(segments)
    }
}
