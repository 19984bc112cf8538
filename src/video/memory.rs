//! Frames held in memory, for pre-decoded content and tests.

use image::RgbImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::{StreamInfo, VideoError, VideoSource, VideoStream};

#[derive(Clone)]
struct Clip {
    fps: f64,
    frames: Arc<Vec<RgbImage>>,
}

/// A source whose "videos" are registered frame lists keyed by path.
#[derive(Default)]
pub struct MemorySource {
    clips: RwLock<HashMap<PathBuf, Clip>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, fps: f64, frames: Vec<RgbImage>) {
        let clip = Clip {
            fps,
            frames: Arc::new(frames),
        };
        if let Ok(mut clips) = self.clips.write() {
            clips.insert(path.into(), clip);
        }
    }
}

impl VideoSource for MemorySource {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoStream>, VideoError> {
        let clip = self
            .clips
            .read()
            .ok()
            .and_then(|clips| clips.get(path).cloned())
            .ok_or_else(|| VideoError::Open {
                path: path.to_path_buf(),
                reason: "no such clip".to_string(),
            })?;

        Ok(Box::new(MemoryStream { clip, position: 0 }))
    }
}

struct MemoryStream {
    clip: Clip,
    position: usize,
}

impl VideoStream for MemoryStream {
    fn info(&self) -> StreamInfo {
        let (width, height) = self
            .clip
            .frames
            .first()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0));
        StreamInfo {
            fps: self.clip.fps,
            frame_count: self.clip.frames.len() as u64,
            width,
            height,
        }
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let frame = self.clip.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }
}
