//! smcatalog - Inspect and maintain the fingerprint catalog
//!
//! Usage:
//!   smcatalog list
//!   smcatalog show 12 --landmarks 20
//!   smcatalog remove 12
//!   smcatalog stale
//!   smcatalog export 12 track12.bson
//!   smcatalog import track12.bson
//!   smcatalog --config soundmark.postgresql.toml migrate --snapshot catalog.smcat

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use soundmark_cli::output::{print_catalog, print_json};
use soundmark_cli::{init_logging, load_settings, open_recognizer};
use soundmark_core::store::{from_snapshot_track, to_snapshot_track, NewTrack};
use soundmark_core::{FingerprintStore, MemoryStore, PostgresStore, TrackId, TrackRecord};
use soundmark_fp::TrackExport;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "smcatalog")]
#[command(about = "Inspect and maintain the fingerprint catalog", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all tracks with their fingerprint counts
    List,
    /// Show one track and its first landmarks
    Show {
        track_id: TrackId,
        /// Number of landmarks to include
        #[arg(long, default_value_t = 10)]
        landmarks: usize,
    },
    /// Remove a track and all its fingerprints
    Remove { track_id: TrackId },
    /// List tracks fingerprinted with a different pipeline configuration
    Stale,
    /// Write one track to a JSON or BSON file
    Export { track_id: TrackId, output: PathBuf },
    /// Add a track from a JSON or BSON export file
    Import { input: PathBuf },
    /// Copy a snapshot catalog into the configured PostgreSQL database
    Migrate {
        /// Source snapshot file
        #[arg(long)]
        snapshot: PathBuf,
        /// Show what would be migrated without writing
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let settings = load_settings(args.config.as_deref())?;

    if let Command::Migrate { snapshot, dry_run } = &args.command {
        let source = MemoryStore::open(snapshot)
            .with_context(|| format!("Failed to open snapshot {}", snapshot.display()))?;
        if *dry_run {
            return migrate(&source, None);
        }
        let dest = PostgresStore::connect(&settings.storage.postgresql)
            .context("Failed to connect to PostgreSQL")?;
        return migrate(&source, Some(&dest));
    }

    let recognizer = open_recognizer(&settings)?;

    match args.command {
        Command::List => print_catalog(&recognizer.list_tracks()?),
        Command::Show {
            track_id,
            landmarks,
        } => print_json(&recognizer.track_detail(track_id, landmarks)?),
        Command::Remove { track_id } => {
            recognizer.remove_track(track_id)?;
            recognizer.flush()?;
            print_json(&serde_json::json!({ "removed": track_id }));
        }
        Command::Stale => {
            let stale = recognizer.stale_tracks()?;
            if !stale.is_empty() {
                log::warn!(
                    "{} tracks need re-ingesting for pipeline {}",
                    stale.len(),
                    recognizer.pipeline_tag()
                );
            }
            print_catalog(&stale);
        }
        Command::Export { track_id, output } => {
            let store = recognizer.store();
            export_track(store, track_id, &output)?;
            log::info!("Exported track {} to {}", track_id, output.display());
        }
        Command::Import { input } => {
            let export = TrackExport::load_auto(&input)?;
            let (record, landmarks) = from_snapshot_track(export.track)?;
            if record.pipeline_tag != recognizer.pipeline_tag() {
                log::warn!(
                    "Imported track '{}' was fingerprinted with {}; it will be reported as stale",
                    record.title,
                    record.pipeline_tag
                );
            }
            let track_id = recognizer
                .store()
                .insert_track(&new_track(&record), &landmarks)?;
            recognizer.flush()?;
            print_json(&serde_json::json!({
                "track_id": track_id,
                "fingerprint_count": landmarks.len(),
            }));
        }
        Command::Migrate { .. } => {}
    }

    Ok(())
}

fn export_track(store: &dyn FingerprintStore, track_id: TrackId, output: &Path) -> Result<()> {
    let record = store
        .track(track_id)?
        .with_context(|| format!("Track {} not found", track_id))?;
    let landmarks = store.landmarks(track_id)?;
    TrackExport::new(to_snapshot_track(&record, &landmarks)).save_auto(output)
}

fn new_track(record: &TrackRecord) -> NewTrack {
    NewTrack {
        title: record.title.clone(),
        artist: record.artist.clone(),
        album: record.album.clone(),
        duration_seconds: record.duration_seconds,
        pipeline_tag: record.pipeline_tag.clone(),
    }
}

fn migrate(source: &MemoryStore, dest: Option<&PostgresStore>) -> Result<()> {
    let tracks = source.list_tracks()?;
    log::info!("Migrating {} tracks", tracks.len());

    let mut migrated = 0usize;
    let mut landmarks_total = 0usize;
    for record in &tracks {
        let landmarks = source.landmarks(record.track_id)?;
        match dest {
            Some(dest) => {
                let new_id = dest
                    .insert_track(&new_track(record), &landmarks)
                    .with_context(|| format!("Failed to migrate track {}", record.track_id))?;
                log::info!(
                    "Track {} '{}' -> {} ({} landmarks)",
                    record.track_id,
                    record.title,
                    new_id,
                    landmarks.len()
                );
            }
            None => log::info!(
                "[dry run] would migrate track {} '{}' ({} landmarks)",
                record.track_id,
                record.title,
                landmarks.len()
            ),
        }
        migrated += 1;
        landmarks_total += landmarks.len();
    }

    print_json(&serde_json::json!({
        "tracks": migrated,
        "landmarks": landmarks_total,
        "dry_run": dest.is_none(),
    }));
    Ok(())
}
