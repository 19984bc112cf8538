use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use md5::{Digest, Md5};

const FINGERPRINT_SIZE: u32 = 64;

/// md5 (hex) of the frame resized to 64x64 grayscale.
///
/// An identity marker only: equal frames give equal fingerprints, nothing more.
pub fn frame_fingerprint(frame: &RgbImage) -> String {
    let gray = DynamicImage::ImageRgb8(frame.clone())
        .resize_exact(FINGERPRINT_SIZE, FINGERPRINT_SIZE, FilterType::Triangle)
        .to_luma8();

    let mut hasher = Md5::new();
    hasher.update(gray.as_raw());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_fingerprint_is_stable_and_fixed_length() {
        let frame = RgbImage::from_fn(80, 60, |x, y| Rgb([x as u8, y as u8, 7]));
        let a = frame_fingerprint(&frame);
        let b = frame_fingerprint(&frame);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_different_frames_differ() {
        let dark = RgbImage::from_pixel(16, 16, Rgb([10, 10, 10]));
        let light = RgbImage::from_pixel(16, 16, Rgb([240, 240, 240]));
        assert_ne!(frame_fingerprint(&dark), frame_fingerprint(&light));
    }
}
