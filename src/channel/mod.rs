use crate::pacing::Pacing;
use crate::youtube::{ChannelInfo, MetadataSource, VideoRecord};

/// Maximum page size accepted by the playlist query
pub const PAGE_SIZE: u32 = 50;

/// Videos collected from a channel's uploads playlist
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    pub videos: Vec<VideoRecord>,
    /// False when a page failed and the list may be truncated
    pub complete: bool,
}

/// Pages through a channel's uploads playlist
pub struct ChannelEnumerator<'a> {
    source: &'a dyn MetadataSource,
    pacing: Pacing,
    page_size: u32,
}

impl<'a> ChannelEnumerator<'a> {
    pub fn new(source: &'a dyn MetadataSource, pacing: Pacing) -> Self {
        Self {
            source,
            pacing,
            page_size: PAGE_SIZE,
        }
    }

    /// List every upload of an already resolved channel.
    ///
    /// A failing page stops the walk and returns what was collected so far.
    pub async fn enumerate_uploads(&self, info: &ChannelInfo) -> Enumeration {
        tracing::info!(
            "Listing uploads for channel {} ({} videos reported)",
            info.title,
            info.video_count
        );

        let mut videos = Vec::new();
        let mut page_token: Option<String> = None;
        let mut complete = true;

        loop {
            let page = match self
                .source
                .playlist_page(&info.uploads_playlist_id, page_token.as_deref(), self.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        "Failed to fetch uploads page after {} videos, list may be incomplete: {:#}",
                        videos.len(),
                        e
                    );
                    complete = false;
                    break;
                }
            };

            videos.extend(page.items.into_iter().map(|item| {
                VideoRecord::new(
                    item.video_id,
                    item.title,
                    item.published_at,
                    info.title.clone(),
                    info.id.clone(),
                )
            }));
            tracing::debug!("Fetched {} videos so far", videos.len());

            match page.next_page_token {
                Some(token) => {
                    page_token = Some(token);
                    self.pacing.pause().await;
                }
                None => break,
            }
        }

        tracing::info!("Found {} videos", videos.len());
        Enumeration { videos, complete }
    }
}
