use anyhow::Result;
use clap::Parser;
use console::style;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use channel_transcripts::pipeline::{ChannelOptions, ChannelReport, VideoReport};
use channel_transcripts::utils::format_duration;
use channel_transcripts::{BatchPipeline, Cli, Commands, Config, HarvestError, InterruptFlag};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "channel_transcripts=debug"
    } else {
        "channel_transcripts=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;
    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| config.app.output_dir.clone());

    match cli.command_or_default() {
        Commands::Video { url } => {
            let pipeline = BatchPipeline::new(config)?.quiet(cli.quiet);
            println!("Processing single video: {}", url);

            let report = pipeline.run_video(&url, &output_dir).await?;
            print_video_report(&report);
        }
        Commands::Channel {
            channel_id,
            limit,
            force,
        } => {
            let channel_id = channel_id
                .or_else(|| config.app.default_channel_id.clone())
                .ok_or_else(|| {
                    HarvestError::Config(
                        "No channel id given and DEFAULT_CHANNEL_ID is not configured".to_string(),
                    )
                })?;
            let options = ChannelOptions {
                channel_id,
                output_dir,
                limit: limit.unwrap_or(config.app.video_limit),
                force,
            };

            let interrupt = InterruptFlag::new();
            interrupt.listen_for_ctrl_c();
            let pipeline = BatchPipeline::new(config)?
                .with_interrupt(interrupt)
                .quiet(cli.quiet);

            println!("Processing channel: {}", options.channel_id);
            let started = Instant::now();

            match pipeline.run_channel(&options).await {
                Ok(report) => print_channel_report(&report, started),
                Err(e) => match e.downcast_ref::<HarvestError>() {
                    Some(HarvestError::Interrupted { remaining }) => {
                        println!(
                            "\nProcessing interrupted. Progress saved with {} videos pending; run the same command again to resume.",
                            remaining
                        );
                    }
                    _ => return Err(e),
                },
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.write_template().await?;
            }
        }
    }

    Ok(())
}

fn print_video_report(report: &VideoReport) {
    println!("Transcript saved to: {}", report.transcript_path.display());
    println!(
        "Language: {} (auto-generated: {})",
        report.video.transcript_language.as_deref().unwrap_or_default(),
        report.video.transcript_is_generated.unwrap_or_default()
    );

    println!("\n--- VISTA PREVIA DE LA TRANSCRIPCIÓN ---");
    for line in &report.preview {
        println!("{}", line);
    }
    if report.preview_complete {
        println!("(Transcripción completa)");
    } else {
        println!("...");
    }
}

fn print_channel_report(report: &ChannelReport, started: Instant) {
    println!("\n{}", style("--- SUMMARY ---").bold());
    println!("Channel: {} (ID: {})", report.channel.title, report.channel.id);
    println!("Total videos processed: {}", report.total());
    if report.previously_processed > 0 {
        println!("  from earlier runs: {}", report.previously_processed);
    }
    println!(
        "Videos with transcripts: {}",
        style(report.with_transcript()).green()
    );
    if report.skipped() > 0 {
        println!("  already on disk: {}", report.skipped());
    }
    println!(
        "Videos without transcripts: {}",
        style(report.without_transcript()).yellow()
    );
    if !report.enumeration_complete {
        println!(
            "{}",
            style("Warning: the video list may be incomplete, see the log for details").red()
        );
    }
    println!("Summary CSV: {}", report.summary_path.display());
    println!("Transcripts directory: {}", report.text_dir.display());
    println!(
        "Finished in {}",
        format_duration(started.elapsed().as_secs_f64())
    );
}
