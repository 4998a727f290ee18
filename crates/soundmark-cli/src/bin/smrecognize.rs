//! smrecognize - Identify an audio sample against the catalog
//!
//! Usage:
//!   smrecognize clip.wav
//!   smrecognize --config soundmark.toml clip.m4a

use anyhow::Result;
use clap::Parser;
use soundmark_cli::output::print_recognition;
use soundmark_cli::{init_logging, load_settings, open_recognizer};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smrecognize")]
#[command(about = "Recognize an audio sample", long_about = None)]
struct Args {
    /// Query audio file
    query: PathBuf,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the maximum number of results
    #[arg(short = 'n', long)]
    max_results: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.query.exists() {
        anyhow::bail!("Query file not found: {}", args.query.display());
    }

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(n) = args.max_results {
        settings.pipeline.max_results = n;
    }
    let recognizer = open_recognizer(&settings)?;

    let recognition = recognizer.recognize_file(&args.query)?;
    if let Some(best) = recognition.best() {
        log::info!(
            "Best match: '{}' by {} (confidence {:.3})",
            best.title,
            best.artist,
            best.candidate.confidence
        );
    }
    print_recognition(&args.query.display().to_string(), &recognition);
    Ok(())
}
