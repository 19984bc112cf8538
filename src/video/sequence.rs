//! A directory of still images read as consecutive video frames.

use image::RgbImage;
use std::path::{Path, PathBuf};

use super::{StreamInfo, VideoError, VideoSource, VideoStream};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Treats every image in a directory, sorted by filename, as one frame at a fixed rate.
pub struct SequenceSource {
    fps: f64,
}

impl SequenceSource {
    pub fn new(fps: f64) -> Self {
        Self { fps }
    }
}

fn list_frames(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(directory)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy().to_lowercase();
                    FRAME_EXTENSIONS.contains(&ext.as_str())
                })
                .unwrap_or(false)
        })
        .collect();

    frames.sort();
    Ok(frames)
}

impl VideoSource for SequenceSource {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoStream>, VideoError> {
        let frames = list_frames(path).map_err(|e| VideoError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if frames.is_empty() {
            return Err(VideoError::NoVideoStream(path.to_path_buf()));
        }

        let (width, height) = image::image_dimensions(&frames[0]).map_err(|e| VideoError::Open {
            path: frames[0].clone(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(SequenceStream {
            info: StreamInfo {
                fps: self.fps,
                frame_count: frames.len() as u64,
                width,
                height,
            },
            frames,
            position: 0,
        }))
    }
}

struct SequenceStream {
    info: StreamInfo,
    frames: Vec<PathBuf>,
    position: usize,
}

impl VideoStream for SequenceStream {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let img = image::open(path)
            .map_err(|e| VideoError::Decode(format!("{}: {}", path.display(), e)))?;
        Ok(Some(img.to_rgb8()))
    }
}
