//! Row types for videos, frames and search records.

use serde::Serialize;
use std::path::PathBuf;

/// Metadata for a video about to be registered. Frame count starts at 0.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub filename: String,
    pub original_name: String,
    pub file_path: PathBuf,
    pub duration: f64,
    pub fps: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoRecord {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
    pub file_path: PathBuf,
    pub duration: f64,
    pub fps: f64,
    pub frames_extracted: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub id: i64,
    pub video_id: i64,
    pub frame_number: u64,
    pub timestamp: f64,
    pub frame_path: PathBuf,
    /// Opaque identity marker. Stored for every frame, not consulted when matching.
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRecord {
    pub id: i64,
    pub query_path: PathBuf,
    /// Serialized `SearchResults` JSON.
    pub results: String,
    pub created_at: String,
}
