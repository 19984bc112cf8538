//! Frame Store abstraction.
//!
//! The matcher, extractor and search layers only depend on this trait, so the
//! backing technology can change without touching them.

use anyhow::Result;
use std::path::Path;

use super::records::{FrameRecord, NewVideo, SearchRecord, VideoRecord};

/// Keyed persistence of videos, their sampled frames, and the search log.
pub trait FrameStore: Send + Sync {
    // === Videos ===

    /// Register a video with a frame count of 0, returning its id
    fn add_video(&self, video: &NewVideo) -> Result<i64>;

    /// Get one video by id
    fn get_video(&self, video_id: i64) -> Result<Option<VideoRecord>>;

    /// Get all videos, newest first
    fn get_all_videos(&self) -> Result<Vec<VideoRecord>>;

    /// Set the number of frames extracted for a video
    fn update_video_frame_count(&self, video_id: i64, count: usize) -> Result<()>;

    // === Frames ===

    /// Register one sampled frame
    fn add_frame(
        &self,
        video_id: i64,
        frame_number: u64,
        timestamp: f64,
        frame_path: &Path,
        fingerprint: Option<&str>,
    ) -> Result<i64>;

    /// Get all frames of a video ordered by frame number ascending
    fn get_video_frames(&self, video_id: i64) -> Result<Vec<FrameRecord>>;

    // === Search log ===

    /// Append a search record, returning its id
    fn save_search_record(&self, query_path: &Path, results: &str) -> Result<i64>;

    /// Get one search record by id
    fn get_search_record(&self, search_id: i64) -> Result<Option<SearchRecord>>;

    /// Get the most recent search records, newest first
    fn recent_searches(&self, limit: usize) -> Result<Vec<SearchRecord>>;
}
