use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{ChannelInfo, MetadataSource, PlaylistItem, PlaylistPage, VideoMetadata};
use crate::{HarvestError, Result};

/// Client for the YouTube Data API v3
pub struct DataApiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: ChannelStatistics,
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    description: String,
    published_at: String,
}

// Counts arrive as decimal strings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    video_count: Option<String>,
    subscriber_count: Option<String>,
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistEntry {
    snippet: PlaylistSnippet,
    content_details: PlaylistContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    title: String,
    published_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    channel_title: String,
    channel_id: String,
    published_at: String,
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

impl DataApiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/{}?key={}",
            self.base_url,
            resource,
            urlencoding::encode(&self.api_key)
        );
        for (name, value) in params {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<ListResponse<T>> {
        let url = self.endpoint(resource, params);
        tracing::debug!("GET {} {:?}", resource, params);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HarvestError::ExternalService(format!("{} request failed: {}", resource, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::ExternalService(format!(
                "{} returned HTTP {}: {}",
                resource, status, body
            ))
            .into());
        }

        let parsed = response
            .json::<ListResponse<T>>()
            .await
            .with_context(|| format!("Failed to parse {} response", resource))?;

        Ok(parsed)
    }
}

#[async_trait]
impl MetadataSource for DataApiClient {
    async fn channel_info(&self, channel_id: &str) -> Result<Option<ChannelInfo>> {
        let response: ListResponse<ChannelItem> = self
            .get(
                "channels",
                &[("part", "snippet,statistics,contentDetails"), ("id", channel_id)],
            )
            .await?;

        Ok(response.items.into_iter().next().map(|item| ChannelInfo {
            id: channel_id.to_string(),
            title: item.snippet.title,
            description: item.snippet.description,
            published_at: item.snippet.published_at,
            video_count: parse_count(item.statistics.video_count.as_deref()),
            subscriber_count: parse_count(item.statistics.subscriber_count.as_deref()),
            view_count: parse_count(item.statistics.view_count.as_deref()),
            uploads_playlist_id: item.content_details.related_playlists.uploads,
        }))
    }

    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<PlaylistPage> {
        let max_results = page_size.to_string();
        let mut params = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let response: ListResponse<PlaylistEntry> = self.get("playlistItems", &params).await?;

        Ok(PlaylistPage {
            items: response
                .items
                .into_iter()
                .map(|entry| PlaylistItem {
                    video_id: entry.content_details.video_id,
                    title: entry.snippet.title,
                    published_at: entry.snippet.published_at,
                })
                .collect(),
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn video_info(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        let response: ListResponse<VideoItem> = self
            .get("videos", &[("part", "snippet"), ("id", video_id)])
            .await?;

        Ok(response.items.into_iter().next().map(|item| VideoMetadata {
            id: video_id.to_string(),
            title: item.snippet.title,
            channel_title: item.snippet.channel_title,
            channel_id: item.snippet.channel_id,
            published_at: item.snippet.published_at,
        }))
    }
}
