//! Find where a still image appears in a video.
//!
//! Videos are sampled into JPEG frames once at ingestion. A query image is then
//! scored against the stored frames with classical color, template and
//! structural metrics, and the hits are collapsed into time ranges.

pub mod config;
pub mod db;
pub mod extractor;
pub mod library;
pub mod logging;
pub mod matcher;
pub mod ranges;
pub mod search;
pub mod similarity;
pub mod status;
pub mod tasks;
pub mod video;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use library::Library;
