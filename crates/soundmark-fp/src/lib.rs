//! Soundmark catalog file format library

pub mod format;
pub mod json_format;
pub mod reader;
pub mod writer;

pub use format::{
    CatalogSnapshot, FormatError, SnapshotHeader, SnapshotLandmark, SnapshotTrack, HEADER_SIZE,
    MAGIC, VERSION,
};
pub use json_format::TrackExport;
pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;
