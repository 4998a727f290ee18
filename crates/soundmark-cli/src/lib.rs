//! Shared plumbing for the soundmark command line tools

pub mod output;

use anyhow::{Context, Result};
use soundmark_core::{Recognizer, SoundmarkSettings};
use std::path::Path;

/// Settings file used when `--config` is not given
pub const DEFAULT_CONFIG: &str = "soundmark.toml";

/// Route `log` output to stderr; silent unless `verbose`
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

/// Load settings from `path`, or defaults when the default file is absent
pub fn load_settings(path: Option<&Path>) -> Result<SoundmarkSettings> {
    match path {
        Some(path) => SoundmarkSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            SoundmarkSettings::load(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("Failed to load settings from {}", DEFAULT_CONFIG))
        }
        None => {
            log::info!("No {} found, using default settings", DEFAULT_CONFIG);
            Ok(SoundmarkSettings::default())
        }
    }
}

/// Open the configured catalog and decoder
pub fn open_recognizer(settings: &SoundmarkSettings) -> Result<Recognizer> {
    if let Some(conn) = settings.connection_string() {
        log::info!("Using PostgreSQL catalog at {}", conn);
    } else {
        log::info!(
            "Using snapshot catalog at {}",
            settings.storage.snapshot.path.display()
        );
    }
    Recognizer::from_settings(settings).context("Failed to open catalog")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_settings_file_must_exist() {
        let err = load_settings(Some(Path::new("/nonexistent/soundmark.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/soundmark.toml"));
    }

    #[test]
    fn test_open_recognizer_on_fresh_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = SoundmarkSettings::default();
        settings.storage.snapshot.path = dir.path().join("catalog.smcat");

        let recognizer = open_recognizer(&settings).unwrap();
        assert!(recognizer.list_tracks().unwrap().is_empty());
    }
}
