mod cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use hf_av::{build_arguments, cleanup_partial, ToolRegistry};
use hf_core::config::Config;
use hf_core::{SegmentContainer, StreamRequest};
use hf_server::RequestStreamState;

/// Config locations tried when `--config` is not given.
const DEFAULT_CONFIG_PATHS: &[&str] = &["./hlsforged.toml", "~/.config/hlsforged/config.toml"];

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
        .find(|p| p.exists())
}

fn load_config(explicit: Option<&Path>) -> Config {
    let path = resolve_config_path(explicit);
    if let Some(ref p) = path {
        tracing::info!("Using config file {}", p.display());
    }
    Config::load_or_default(path.as_deref())
}

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path);

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting hlsforged");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    hf_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsforged=trace,hf_server=trace,hf_media=trace,hf_av=trace,ffmpeg=debug,tower_http=debug"
                .to_string()
        } else {
            "hlsforged=info,hf_server=info,hf_media=info,hf_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Args {
            item,
            start,
            container,
            video_codec,
            audio_codec,
        } => print_arguments(
            cli.config.as_deref(),
            item,
            start,
            &container,
            video_codec,
            audio_codec,
        ),
        Commands::Clean { output } => clean_output(&output),
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn print_arguments(
    config_path: Option<&Path>,
    item: String,
    start: f64,
    container: &str,
    video_codec: Option<String>,
    audio_codec: Option<String>,
) -> Result<()> {
    let config = load_config(config_path);

    if !start.is_finite() || start < 0.0 {
        anyhow::bail!("--start must be a non-negative number of seconds");
    }
    let container: SegmentContainer = container.parse()?;

    let mut request = StreamRequest::new(item)
        .with_start(Duration::from_secs_f64(start))
        .with_container(container);
    request.video_codec = video_codec;
    request.audio_codec = audio_codec;

    let input = config.library.root.join(request.relative_item_path()?);
    let state = RequestStreamState::new(request, input)?;
    let output = state.output_path(&config.streaming.transcode_dir);
    let arguments = build_arguments(&state, &output);

    let tools = ToolRegistry::discover(&config.tools);
    let ffmpeg = tools
        .require("ffmpeg")
        .map(|t| t.path.display().to_string())
        .unwrap_or_else(|_| "ffmpeg".to_string());

    println!("Output: {}", output.display());
    println!("{ffmpeg} {arguments}");
    Ok(())
}

fn clean_output(output: &Path) -> Result<()> {
    let report = cleanup_partial(output);

    for path in &report.deleted {
        println!("deleted {}", path.display());
    }
    for failure in &report.failures {
        println!("failed  {} ({})", failure.path.display(), failure.message);
    }
    println!(
        "\n{} deleted, {} failed",
        report.deleted.len(),
        report.failures.len()
    );
    Ok(())
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all().await {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or set tools.ffmpeg_path.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Library root: {}", config.library.root.display());
            println!(
                "  Transcode dir: {}",
                config.streaming.transcode_dir.display()
            );
            println!(
                "  Poll interval: {}ms, min segments: {}",
                config.streaming.poll_interval_ms, config.streaming.min_segments
            );
            for warning in config.validate() {
                println!("  ⚠ {warning}");
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
