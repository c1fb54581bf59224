//! Remix - command-line audio clip remixer
//!
//! Reads a remix request (JSON, from a file or stdin), resolves its
//! `/uploads/...` references under the configured media root, and writes
//! the finished mix.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use remix_codec::ExportFormat;
use remix_engine::{Config, RemixRequest, Remixer, UploadDirResolver};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Request JSON file, or `-` for stdin
    #[arg(value_name = "REQUEST")]
    request: PathBuf,

    /// Output path (defaults to `<output_dir>/remix.<ext>`)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Config file (defaults to the per-user config location)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory references are resolved against, overriding the config
    #[arg(long, value_name = "DIR")]
    media_root: Option<PathBuf>,

    /// Export format (mp3 or wav), overriding the config
    #[arg(long, value_name = "FORMAT")]
    format: Option<ExportFormat>,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(root) = cli.media_root {
        config.media_root = root;
    }
    if let Some(format) = cli.format {
        config.export_format = format;
    }

    let body = read_request(&cli.request)?;
    let request = RemixRequest::from_json(&body).map_err(|e| anyhow!(e.public_message()))?;

    info!(
        clips = request.clips.len(),
        media_root = %config.media_root.display(),
        "Starting remix"
    );

    let remixer = Remixer::new(
        UploadDirResolver::new(&config.media_root),
        config.remix_options(),
    );
    let result = remixer.remix(&request).map_err(|e| {
        error!(
            kind = e.kind().as_str(),
            status = e.kind().status_code(),
            error = %e,
            "Remix failed"
        );
        anyhow!(e.public_message())
    })?;

    let output = cli
        .output
        .unwrap_or_else(|| config.output_path(&result.file_name()));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&output, &result.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        path = %output.display(),
        mime = result.mime_type(),
        duration_secs = result.duration_secs,
        "Wrote remix"
    );

    Ok(())
}

fn read_request(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut body = String::new();
        io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read request from stdin")?;
        return Ok(body);
    }

    fs::read_to_string(path).with_context(|| format!("Failed to read request {}", path.display()))
}
