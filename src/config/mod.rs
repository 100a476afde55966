use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::mask_secret;
use crate::HarvestError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// YouTube service settings
    pub youtube: YoutubeConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// YouTube Data API key
    pub api_key: Option<String>,

    /// Base URL of the Data API
    pub api_base_url: String,

    /// User agent sent to the caption endpoints
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Channel processed when no channel id is given
    pub default_channel_id: Option<String>,

    /// Directory receiving transcripts, summaries and checkpoints
    pub output_dir: PathBuf,

    /// Maximum videos per channel run (0 = no limit)
    pub video_limit: usize,

    /// Delay between videos in milliseconds
    pub item_delay_ms: u64,

    /// Delay between playlist pages in milliseconds
    pub page_delay_ms: u64,

    /// Write a checkpoint every this many videos
    pub checkpoint_interval: usize,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_channel_id: None,
            output_dir: PathBuf::from("transcripciones"),
            video_limit: 0,
            item_delay_ms: 200,
            page_delay_ms: 500,
            checkpoint_interval: 10,
        }
    }
}

impl Config {
    /// Load configuration from file (or defaults) and apply environment overrides
    pub async fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match Self::config_path()? {
            Some(path) => {
                let content = fs_err::read_to_string(&path)
                    .context("Failed to read config file")?;

                serde_yaml::from_str::<Config>(&content)
                    .context("Failed to parse config file")?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Save configuration to the user config directory
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::user_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Existing configuration file, if any
    fn config_path() -> Result<Option<PathBuf>> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(Some(local_config));
        }

        let user_config = Self::user_config_path()?;
        Ok(user_config.exists().then_some(user_config))
    }

    fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("channel-transcripts").join("config.yaml"))
    }

    /// Apply `YOUTUBE_API_KEY`, `DEFAULT_CHANNEL_ID`, `DEFAULT_OUTPUT_DIR` and
    /// `DEFAULT_VIDEO_LIMIT` from the given lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(api_key) = lookup("YOUTUBE_API_KEY") {
            self.youtube.api_key = Some(api_key);
        }
        if let Some(channel_id) = lookup("DEFAULT_CHANNEL_ID") {
            self.app.default_channel_id = Some(channel_id);
        }
        if let Some(output_dir) = lookup("DEFAULT_OUTPUT_DIR") {
            self.app.output_dir = PathBuf::from(output_dir);
        }
        if let Some(limit) = lookup("DEFAULT_VIDEO_LIMIT") {
            self.app.video_limit = limit.trim().parse().map_err(|_| {
                HarvestError::Config(format!("DEFAULT_VIDEO_LIMIT is not a number: {}", limit))
            })?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key().is_none() {
            return Err(HarvestError::Config(
                "YouTube API key is not configured. Set YOUTUBE_API_KEY in the environment or a .env file".to_string(),
            )
            .into());
        }

        let base = url::Url::parse(&self.youtube.api_base_url).map_err(|_| {
            HarvestError::Config(format!("Invalid API base URL: {}", self.youtube.api_base_url))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(HarvestError::Config("API base URL must use HTTP or HTTPS".to_string()).into());
        }

        if self.app.checkpoint_interval == 0 {
            return Err(HarvestError::Config("checkpoint_interval must be at least 1".to_string()).into());
        }

        Ok(())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.youtube
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!(
            "  API Key: {}",
            self.api_key().map(mask_secret).unwrap_or_else(|| "(not set)".to_string())
        );
        println!("  API Base URL: {}", self.youtube.api_base_url);
        println!(
            "  Default Channel: {}",
            self.app.default_channel_id.as_deref().unwrap_or("(not set)")
        );
        println!("  Output Directory: {}", self.app.output_dir.display());
        println!("  Video Limit: {}", self.app.video_limit);
        println!("  Delay Between Videos: {} ms", self.app.item_delay_ms);
        println!("  Delay Between Pages: {} ms", self.app.page_delay_ms);
        println!("  Checkpoint Interval: {}", self.app.checkpoint_interval);
    }

    /// Write the current configuration to the user config file and report where it went
    pub async fn write_template(&self) -> Result<()> {
        let path = self.save().await?;
        println!("Configuration written to {}", path.display());
        println!("Edit it to set your API key and default channel.");
        Ok(())
    }
}
