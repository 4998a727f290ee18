//! JSON output formatting

use serde::Serialize;
use soundmark_core::{IngestReport, Recognition, RecognizedMatch, TrackRecord};
use std::path::Path;

#[derive(Serialize)]
struct RecognitionOutput<'a> {
    query_path: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_match: Option<&'a RecognizedMatch>,
    #[serde(flatten)]
    recognition: &'a Recognition,
}

/// Result of ingesting one file: the report, or why it failed
#[derive(Debug, Serialize)]
pub struct IngestOutcome {
    pub path: String,
    #[serde(flatten)]
    pub report: Option<IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestOutcome {
    pub fn new(path: &Path, result: soundmark_core::Result<IngestReport>) -> Self {
        let path = path.display().to_string();
        match result {
            Ok(report) => Self {
                path,
                report: Some(report),
                error: None,
            },
            Err(e) => Self {
                path,
                report: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Serialize)]
struct IngestOutput<'a> {
    ingested: usize,
    failed: usize,
    files: &'a [IngestOutcome],
}

#[derive(Serialize)]
struct CatalogOutput<'a> {
    count: usize,
    tracks: &'a [TrackRecord],
}

/// Pretty-print any serializable value to stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

pub fn print_recognition(query_path: &str, recognition: &Recognition) {
    print_json(&RecognitionOutput {
        query_path,
        success: recognition.is_confident(),
        message: recognition.diagnosis(),
        best_match: recognition.best(),
        recognition,
    });
}

pub fn print_ingest(outcomes: &[IngestOutcome]) {
    let failed = outcomes.iter().filter(|o| o.failed()).count();
    print_json(&IngestOutput {
        ingested: outcomes.len() - failed,
        failed,
        files: outcomes,
    });
}

pub fn print_catalog(tracks: &[TrackRecord]) {
    print_json(&CatalogOutput {
        count: tracks.len(),
        tracks,
    });
}
