use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hlsforged")]
#[command(author, version, about = "On-demand HLS segmenting server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the ffmpeg command a playlist request would launch
    Args {
        /// Library-relative media item
        #[arg(required = true)]
        item: String,

        /// Seek position in seconds
        #[arg(long, default_value_t = 0.0)]
        start: f64,

        /// Segment container (ts, aac, mp3)
        #[arg(long, default_value = "ts")]
        container: String,

        /// Video codec (copy, h264)
        #[arg(long)]
        video_codec: Option<String>,

        /// Audio codec (copy, aac, mp3)
        #[arg(long)]
        audio_codec: Option<String>,
    },

    /// Delete the manifest and segments left behind for an output
    Clean {
        /// Output manifest path
        #[arg(required = true)]
        output: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
