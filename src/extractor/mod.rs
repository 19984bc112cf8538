//! Frame extraction: decode a video, sample every `stride`-th raw frame, write each
//! sample as a JPEG and register it in the frame store.
//!
//! Extraction is best effort. A source that cannot be opened yields a zero-frame
//! summary rather than an error, and a decode error mid-stream ends the stream
//! early. Frames written before a failure stay registered; nothing is rolled back.

pub mod fingerprint;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::db::FrameStore;
use crate::tasks::{TaskProgress, TaskUpdate};
use crate::video::VideoSource;

pub use fingerprint::frame_fingerprint;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionSummary {
    pub frames_extracted: usize,
    /// Raw frames decoded, sampled or not.
    pub frames_decoded: u64,
    pub fps: f64,
    /// False when the source could not be opened.
    pub opened: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct FrameExtractor {
    stride: u64,
    jpeg_quality: u8,
}

impl FrameExtractor {
    pub fn new(stride: u64, jpeg_quality: u8) -> Self {
        Self {
            stride: stride.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.stride, config.jpeg_quality)
    }

    /// `video_<id>_frame_<counter, 6 digits>.jpg`
    pub fn frame_filename(video_id: i64, counter: usize) -> String {
        format!("video_{}_frame_{:06}.jpg", video_id, counter)
    }

    pub fn extract(
        &self,
        source: &dyn VideoSource,
        store: &dyn FrameStore,
        video_id: i64,
        video_path: &Path,
        output_dir: &Path,
    ) -> Result<ExtractionSummary> {
        self.extract_cancellable(
            source,
            store,
            video_id,
            video_path,
            output_dir,
            None,
            &AtomicBool::new(false),
        )
    }

    /// Extract with progress updates and cooperative cancellation, checked between frames.
    #[allow(clippy::too_many_arguments)]
    pub fn extract_cancellable(
        &self,
        source: &dyn VideoSource,
        store: &dyn FrameStore,
        video_id: i64,
        video_path: &Path,
        output_dir: &Path,
        progress_tx: Option<&UnboundedSender<TaskUpdate>>,
        cancel_flag: &AtomicBool,
    ) -> Result<ExtractionSummary> {
        let mut stream = match source.open(video_path) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(video_id, path = %video_path.display(), error = %e, "Could not open video");
                return Ok(ExtractionSummary::default());
            }
        };

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let stream_info = stream.info();
        let fps = stream_info.fps;
        let known_fps = fps > 0.0 && fps.is_finite();
        if !known_fps {
            warn!(video_id, fps, "Unknown frame rate, using raw frame index as timestamp");
        }

        info!(
            video_id,
            fps,
            total_frames = stream_info.frame_count,
            stride = self.stride,
            "Extracting frames"
        );

        let send = |update: TaskUpdate| {
            if let Some(tx) = progress_tx {
                let _ = tx.send(update);
            }
        };
        send(TaskUpdate::Started {
            total: stream_info.frame_count as usize,
        });

        let mut summary = ExtractionSummary {
            fps,
            opened: true,
            ..Default::default()
        };
        let mut frame_index: u64 = 0;

        loop {
            if cancel_flag.load(Ordering::SeqCst) {
                summary.cancelled = true;
                break;
            }

            let frame = match stream.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(video_id, frame_index, error = %e, "Decode failed, stopping extraction");
                    break;
                }
            };

            if frame_index % self.stride == 0 {
                let timestamp = if known_fps {
                    frame_index as f64 / fps
                } else {
                    frame_index as f64
                };

                let frame_path = output_dir.join(Self::frame_filename(
                    video_id,
                    summary.frames_extracted,
                ));
                self.write_jpeg(&frame, &frame_path)?;

                let fingerprint = frame_fingerprint(&frame);
                store.add_frame(
                    video_id,
                    frame_index,
                    timestamp,
                    &frame_path,
                    Some(&fingerprint),
                )?;

                summary.frames_extracted += 1;
                if summary.frames_extracted % 100 == 0 {
                    debug!(video_id, extracted = summary.frames_extracted, "Extracted frames");
                }

                send(TaskUpdate::Progress(
                    TaskProgress::new(
                        frame_index as usize + 1,
                        stream_info.frame_count as usize,
                    )
                    .with_item(frame_path.to_string_lossy()),
                ));
            }

            frame_index += 1;
        }

        summary.frames_decoded = frame_index;
        store.update_video_frame_count(video_id, summary.frames_extracted)?;

        info!(
            video_id,
            extracted = summary.frames_extracted,
            decoded = summary.frames_decoded,
            cancelled = summary.cancelled,
            "Extraction complete"
        );

        Ok(summary)
    }

    fn write_jpeg(&self, frame: &RgbImage, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
        frame
            .write_with_encoder(encoder)
            .with_context(|| format!("Failed to encode {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}
