//! Mosaic player binary
//!
//! Plays a container through the stand-in demuxer and stacks every
//! discovered stream on one compositor (or one sink per stream).

use clap::Parser;
use mosaic::pipeline::{
    AttachMode, Player, PlayerConfig, Properties, StreamGeometry, TeardownReport,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "mosaic-play")]
#[command(version, about = "Stack every stream of a container on one compositor", long_about = None)]
struct Args {
    /// Container file to play
    #[arg(value_name = "LOCATION", required_unless_present = "pattern")]
    location: Option<PathBuf>,

    /// Feed a test pattern into the demuxer instead of a file
    #[arg(long, value_name = "N", conflicts_with = "location")]
    pattern: Option<u32>,

    /// Drop streams beyond this many
    #[arg(long, value_name = "N")]
    max_streams: Option<usize>,

    /// Give each stream its own video sink instead of a compositor slot
    #[arg(long)]
    separate_sinks: bool,

    /// Number of streams the demuxer exposes
    #[arg(long, value_name = "N", default_value_t = 2)]
    streams: u32,

    /// End the stream after this many frames at 30 fps
    #[arg(long, value_name = "N")]
    frames: Option<u64>,

    /// Directory for DOT graph snapshots
    #[arg(long = "dot-dir", value_name = "DIR")]
    dot_dir: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> PlayerConfig {
        let mut config = match (&self.location, self.pattern) {
            (_, Some(pattern)) => PlayerConfig::pattern(pattern),
            (Some(location), None) => PlayerConfig::file(location),
            (None, None) => PlayerConfig::file(""),
        };

        let framerate = StreamGeometry::default().framerate;
        let mut demux = Properties::new().with("streams", self.streams);
        if let Some(frames) = self.frames {
            let ms = frames.saturating_mul(framerate.frame_duration_ns()) / 1_000_000;
            demux.set("eos-after-ms", i64::try_from(ms).unwrap_or(i64::MAX));
        }
        config = config.with_demuxer("matroskademux", demux);

        if let Some(max) = self.max_streams {
            config = config.with_max_streams(max);
        }
        if self.separate_sinks {
            config = config.with_mode(AttachMode::SeparateSinks);
        }
        match &self.dot_dir {
            Some(dir) => config.with_dot_dir(dir),
            None => config.with_dot_dir_from_env(),
        }
    }
}

async fn play(config: PlayerConfig) -> mosaic::Result<TeardownReport> {
    let mut player = Player::new(config)?;
    if let Err(err) = player.start() {
        player.stop_and_teardown();
        return Err(err);
    }

    let result = player.run().await;
    let report = player.stop_and_teardown();
    result.map(|()| report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let usage = err.use_stderr();
            let _ = err.print();
            return if usage {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match play(args.config()).await {
        Ok(report) => {
            tracing::info!(
                attached = report.attached,
                released = report.released,
                "playback finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(kind = err.kind(), error = %err, "playback failed");
            ExitCode::FAILURE
        }
    }
}
