//! Synthetic video content shared by unit tests.

use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::video::{StreamInfo, VideoError, VideoSource, VideoStream};

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;

/// A textured frame whose content changes once per `scene`.
pub fn scene_frame(scene: u32) -> RgbImage {
    RgbImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        let r = (x * (3 + scene % 5) + y * 2 + scene * 37) % 256;
        let g = (y * (4 + scene % 3) + x + scene * 61) % 256;
        let b = ((x ^ y) * 5 + scene * 23) % 256;
        Rgb([r as u8, g as u8, b as u8])
    })
}

/// `n` raw frames at 30fps where each second shows a different scene.
pub fn synthetic_clip(n: usize) -> Vec<RgbImage> {
    (0..n).map(|i| scene_frame(i as u32 / 30)).collect()
}

/// Endless stream of scene 0 that holds its first frame until `released` is set.
pub struct GatedSource {
    pub released: Arc<AtomicBool>,
}

struct GatedStream {
    released: Arc<AtomicBool>,
}

impl VideoSource for GatedSource {
    fn open(&self, _path: &Path) -> Result<Box<dyn VideoStream>, VideoError> {
        Ok(Box::new(GatedStream {
            released: self.released.clone(),
        }))
    }
}

impl VideoStream for GatedStream {
    fn info(&self) -> StreamInfo {
        StreamInfo {
            fps: 30.0,
            frame_count: 0,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
        }
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        while !self.released.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(Some(scene_frame(0)))
    }
}
