//! Container decoding through FFmpeg (`ffmpeg-next`).
//!
//! Frames are decoded one at a time from the best video stream and converted to
//! RGB24 at the source resolution.

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use image::RgbImage;
use std::path::Path;

use super::{StreamInfo, VideoError, VideoSource, VideoStream};

pub struct FfmpegSource;

impl FfmpegSource {
    pub fn new() -> Self {
        // Safe to call more than once.
        ffmpeg_next::init().ok();
        Self
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSource for FfmpegSource {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoStream>, VideoError> {
        let open_err = |reason: String| VideoError::Open {
            path: path.to_path_buf(),
            reason,
        };

        let input = ffmpeg_next::format::input(&path).map_err(|e| open_err(e.to_string()))?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| VideoError::NoVideoStream(path.to_path_buf()))?;
        let stream_index = stream.index();

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            f64::from(rate)
        } else {
            0.0
        };
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 0.0 };
        let frame_count = stream.frames().max(0) as u64;

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| open_err(format!("failed to create decoder: {}", e)))?;

        let info = StreamInfo {
            fps,
            frame_count,
            width: decoder.width(),
            height: decoder.height(),
        };

        Ok(Box::new(FfmpegStream {
            input,
            decoder,
            stream_index,
            scaler: None,
            info,
            eof_sent: false,
        }))
    }
}

struct FfmpegStream {
    input: Input,
    decoder: ffmpeg_next::decoder::Video,
    stream_index: usize,
    /// Created on the first frame, once the pixel format is known.
    scaler: Option<scaling::Context>,
    info: StreamInfo,
    eof_sent: bool,
}

impl FfmpegStream {
    fn to_rgb(&mut self, decoded: &Video) -> Result<RgbImage, VideoError> {
        let (width, height) = (decoded.width(), decoded.height());

        if self.scaler.is_none() {
            let scaler = scaling::Context::get(
                decoded.format(),
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| VideoError::Decode(format!("failed to create scaler: {}", e)))?;
            self.scaler = Some(scaler);
        }

        let mut rgb_frame = Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler
                .run(decoded, &mut rgb_frame)
                .map_err(|e| VideoError::Decode(e.to_string()))?;
        }

        let data = rgb_frame.data(0);
        let stride = rgb_frame.stride(0);
        let row_len = width as usize * 3;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            let end = start + row_len;
            if end > data.len() {
                return Err(VideoError::Decode("short RGB frame".to_string()));
            }
            pixels.extend_from_slice(&data[start..end]);
        }

        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| VideoError::Decode("RGB buffer size mismatch".to_string()))
    }
}

impl VideoStream for FfmpegStream {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let mut decoded = Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.to_rgb(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let packet = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));

            match packet {
                Some((index, packet)) => {
                    if index != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| VideoError::Decode(e.to_string()))?;
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| VideoError::Decode(e.to_string()))?;
                    self.eof_sent = true;
                }
            }
        }
    }
}
