use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "transcriptor",
    about = "Channel Transcripts - Download YouTube transcripts for a video or a whole channel",
    version,
    long_about = "A CLI tool that lists every upload of a YouTube channel, fetches the best available caption track for each video and saves them as text files with a CSV summary. Interrupted channel runs can be resumed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output directory for transcripts, summaries and progress files
    #[arg(short, long, global = true, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Fetch the transcript of a single video
    Video {
        /// Video URL (youtube.com/watch?v=..., youtu.be/...) or video id
        #[arg(value_name = "URL_OR_ID")]
        url: String,
    },

    /// Fetch transcripts for every video of a channel
    Channel {
        /// Channel id (defaults to the configured channel)
        #[arg(value_name = "CHANNEL_ID")]
        channel_id: Option<String>,

        /// Maximum number of videos to process (0 = no limit)
        #[arg(short, long, value_name = "COUNT")]
        limit: Option<usize>,

        /// Ignore saved progress and re-fetch existing transcripts
        #[arg(short, long)]
        force: bool,
    },

    /// Show or write the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

impl Cli {
    /// The subcommand to run; no subcommand means channel mode with defaults
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Channel {
            channel_id: None,
            limit: None,
            force: false,
        })
    }
}
