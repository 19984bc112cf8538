//! Joint hue/saturation/value histograms compared by correlation.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

pub const HUE_BINS: usize = 50;
pub const SATURATION_BINS: usize = 60;
pub const VALUE_BINS: usize = 60;

/// Hue uses the 8-bit convention of 0..180 (degrees / 2).
const HUE_RANGE: f64 = 180.0;

#[derive(Debug, Clone)]
pub struct ColorHistogram {
    bins: Vec<f32>,
}

impl ColorHistogram {
    /// Histogram of the image resized to `size`x`size`.
    pub fn from_image(img: &DynamicImage, size: u32) -> Self {
        let resized = img.resize_exact(size, size, FilterType::Triangle).to_rgb8();
        Self::from_rgb(&resized)
    }

    pub fn from_rgb(img: &RgbImage) -> Self {
        let mut bins = vec![0f32; HUE_BINS * SATURATION_BINS * VALUE_BINS];

        for pixel in img.pixels() {
            let [r, g, b] = pixel.0;
            let (h, s, v) = rgb_to_hsv(r, g, b);

            let h_bin = ((h * HUE_BINS as f64 / HUE_RANGE) as usize).min(HUE_BINS - 1);
            let s_bin = (s as usize * SATURATION_BINS) / 256;
            let v_bin = (v as usize * VALUE_BINS) / 256;

            bins[(h_bin * SATURATION_BINS + s_bin) * VALUE_BINS + v_bin] += 1.0;
        }

        Self { bins }
    }

    /// Pearson correlation between the two histograms, in -1..=1.
    ///
    /// Two flat histograms (zero variance) correlate at 1.0.
    pub fn correlation(&self, other: &ColorHistogram) -> f64 {
        let n = self.bins.len() as f64;
        let mean_a = self.bins.iter().map(|&x| x as f64).sum::<f64>() / n;
        let mean_b = other.bins.iter().map(|&x| x as f64).sum::<f64>() / n;

        let mut num = 0.0;
        let mut den_a = 0.0;
        let mut den_b = 0.0;
        for (&a, &b) in self.bins.iter().zip(other.bins.iter()) {
            let da = a as f64 - mean_a;
            let db = b as f64 - mean_b;
            num += da * db;
            den_a += da * da;
            den_b += db * db;
        }

        let den = den_a * den_b;
        if den.abs() > f64::EPSILON {
            num / den.sqrt()
        } else {
            1.0
        }
    }
}

/// RGB to (hue 0..180, saturation 0..=255, value 0..=255).
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, u8, u8) {
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;

    let s = if max > 0.0 { 255.0 * diff / max } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    (h / 2.0, s.round() as u8, max as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0.0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60.0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120.0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 0), (0.0, 0, 0));
        assert_eq!(rgb_to_hsv(128, 128, 128), (0.0, 0, 128));
    }

    #[test]
    fn test_identical_images_correlate_fully() {
        let img = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 90]));
        let a = ColorHistogram::from_rgb(&img);
        let b = ColorHistogram::from_rgb(&img);
        assert!((a.correlation(&b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_colors_correlate_less() {
        let red = RgbImage::from_pixel(16, 16, Rgb([220, 30, 30]));
        let mostly_red = RgbImage::from_fn(16, 16, |x, _| {
            if x < 12 { Rgb([220, 30, 30]) } else { Rgb([30, 30, 220]) }
        });
        let blue = RgbImage::from_pixel(16, 16, Rgb([30, 30, 220]));

        let red = ColorHistogram::from_rgb(&red);
        let close = red.correlation(&ColorHistogram::from_rgb(&mostly_red));
        let far = red.correlation(&ColorHistogram::from_rgb(&blue));

        assert!(close > far);
        assert!(far < 0.1);
    }
}
