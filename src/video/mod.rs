//! Video decode interface.
//!
//! A [`VideoSource`] opens a path into a [`VideoStream`] that yields decoded
//! RGB frames in order. Sources:
//! - [`SequenceSource`]: a directory of image files treated as consecutive frames
//! - [`MemorySource`]: frames held in memory, keyed by path
//! - `FfmpegSource`: container formats via FFmpeg (`ffmpeg` feature)
//! - [`AutoSource`]: picks one of the above by looking at the path

pub mod memory;
pub mod sequence;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use memory::MemorySource;
pub use sequence::SequenceSource;

#[cfg(feature = "ffmpeg")]
pub use self::ffmpeg::FfmpegSource;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("could not open video {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("no video stream found in {0}")]
    NoVideoStream(PathBuf),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unsupported video source {0} (build with the `ffmpeg` feature for container formats)")]
    Unsupported(PathBuf),
}

/// Properties reported by an opened stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    /// Reported frame rate. May be 0 when the container does not say.
    pub fps: f64,
    /// Reported number of frames. May be 0 when unknown.
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl StreamInfo {
    /// Duration in seconds, or 0 when the frame rate is unusable.
    pub fn duration(&self) -> f64 {
        if self.fps > 0.0 && self.fps.is_finite() {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

pub trait VideoStream {
    fn info(&self) -> StreamInfo;

    /// Decode the next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError>;
}

pub trait VideoSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoStream>, VideoError>;
}

/// Directories are read as image sequences, files go to FFmpeg when it is compiled in.
pub struct AutoSource {
    sequence: SequenceSource,
    #[cfg(feature = "ffmpeg")]
    ffmpeg: FfmpegSource,
}

impl AutoSource {
    pub fn new(sequence_fps: f64) -> Self {
        Self {
            sequence: SequenceSource::new(sequence_fps),
            #[cfg(feature = "ffmpeg")]
            ffmpeg: FfmpegSource::new(),
        }
    }

    #[cfg(feature = "ffmpeg")]
    fn open_file(&self, path: &Path) -> Result<Box<dyn VideoStream>, VideoError> {
        self.ffmpeg.open(path)
    }

    #[cfg(not(feature = "ffmpeg"))]
    fn open_file(&self, path: &Path) -> Result<Box<dyn VideoStream>, VideoError> {
        if !path.exists() {
            return Err(VideoError::Open {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        Err(VideoError::Unsupported(path.to_path_buf()))
    }
}

impl VideoSource for AutoSource {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoStream>, VideoError> {
        if path.is_dir() {
            return self.sequence.open(path);
        }
        self.open_file(path)
    }
}

/// Basic information about a video, or the reason it cannot be opened.
pub fn probe(source: &dyn VideoSource, path: &Path) -> Result<StreamInfo, VideoError> {
    source.open(path).map(|stream| stream.info())
}

/// Decode the frame shown at `timestamp` seconds (raw index `floor(timestamp * fps)`).
pub fn extract_single_frame(
    source: &dyn VideoSource,
    path: &Path,
    timestamp: f64,
) -> Option<RgbImage> {
    let mut stream = source.open(path).ok()?;
    let fps = stream.info().fps;
    let target = if fps > 0.0 && timestamp > 0.0 {
        (timestamp * fps).floor() as u64
    } else {
        0
    };

    let mut index = 0u64;
    loop {
        let frame = stream.next_frame().ok()??;
        if index == target {
            return Some(frame);
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(value: u8) -> RgbImage {
        RgbImage::from_pixel(4, 4, Rgb([value, value, value]))
    }

    #[test]
    fn test_duration_handles_zero_fps() {
        let info = StreamInfo { fps: 0.0, frame_count: 300, width: 1, height: 1 };
        assert_eq!(info.duration(), 0.0);

        let info = StreamInfo { fps: 30.0, frame_count: 300, width: 1, height: 1 };
        assert_eq!(info.duration(), 10.0);
    }

    #[test]
    fn test_extract_single_frame() {
        let source = MemorySource::new();
        source.insert("clip", 2.0, (0..10).map(|i| solid(i * 10)).collect());

        let frame = extract_single_frame(&source, Path::new("clip"), 1.5).unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgb([30, 30, 30]));

        assert!(extract_single_frame(&source, Path::new("clip"), 60.0).is_none());
        assert!(extract_single_frame(&source, Path::new("missing"), 0.0).is_none());
    }

    #[test]
    fn test_stream_info_of_clip() {
        let source = MemorySource::new();
        source.insert("clip", 25.0, (0..50).map(|_| solid(0)).collect());

        let info = probe(&source, Path::new("clip")).unwrap();
        assert_eq!(info.frame_count, 50);
        assert_eq!(info.duration(), 2.0);
        assert!(matches!(
            probe(&source, Path::new("nope")),
            Err(VideoError::Open { .. })
        ));
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn test_auto_source_rejects_files_without_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"not a video").unwrap();

        let source = AutoSource::new(30.0);
        assert!(matches!(source.open(&file), Err(VideoError::Unsupported(_))));
        assert!(matches!(
            source.open(&dir.path().join("absent.mp4")),
            Err(VideoError::Open { .. })
        ));
    }
}
