//! smingest - Add audio files to the catalog
//!
//! Usage:
//!   smingest song.mp3 --title "Song" --artist "Band"
//!   smingest --config soundmark.toml music/*.flac

use anyhow::Result;
use clap::Parser;
use rayon::prelude::*;
use soundmark_cli::output::{print_ingest, IngestOutcome};
use soundmark_cli::{init_logging, load_settings, open_recognizer};
use soundmark_core::{AudioFormat, TrackMetadata};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "smingest")]
#[command(about = "Fingerprint audio files and add them to the catalog", long_about = None)]
struct Args {
    /// Audio files to ingest
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Track title (single file only; defaults to the file name)
    #[arg(long)]
    title: Option<String>,

    /// Track artist
    #[arg(long)]
    artist: Option<String>,

    /// Album name
    #[arg(long)]
    album: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.title.is_some() && args.files.len() > 1 {
        anyhow::bail!("--title can only be used with a single file");
    }

    let settings = load_settings(args.config.as_deref())?;
    let recognizer = open_recognizer(&settings)?;

    let files: Vec<&PathBuf> = args
        .files
        .iter()
        .filter(|path| {
            let supported = AudioFormat::from_path(path).is_supported();
            if !supported {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
            supported
        })
        .collect();

    let start = std::time::Instant::now();
    let outcomes: Vec<IngestOutcome> = files
        .par_iter()
        .map(|path| {
            let metadata = metadata_for(&args, path);
            let result = recognizer.ingest_file(&metadata, path);
            if let Err(e) = &result {
                log::warn!("Failed to ingest {}: {}", path.display(), e);
            }
            IngestOutcome::new(path, result)
        })
        .collect();

    recognizer.flush()?;

    let failed = outcomes.iter().filter(|o| o.failed()).count();
    log::info!(
        "Ingested {} of {} files in {:.2}s",
        outcomes.len() - failed,
        outcomes.len(),
        start.elapsed().as_secs_f64()
    );
    print_ingest(&outcomes);

    if failed > 0 && failed == outcomes.len() {
        anyhow::bail!("No file could be ingested");
    }
    Ok(())
}

fn metadata_for(args: &Args, path: &Path) -> TrackMetadata {
    let title = args.title.clone().or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
    });
    TrackMetadata {
        title,
        artist: args.artist.clone(),
        album: args.album.clone(),
    }
}
