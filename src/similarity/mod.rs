//! Similarity scoring between two still images.
//!
//! Three independent metrics, each "higher is more similar":
//! - color: correlation of joint HSV histograms (ignores layout)
//! - template: best normalized cross-correlation of the query inside the candidate (ignores color)
//! - structural: `1 - mse / 255²` of 256x256 grayscale versions (sensitive to alignment and scale)
//!
//! Any image that fails to decode scores 0.0 on every metric.

pub mod histogram;
pub mod structural;
pub mod template;

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use histogram::ColorHistogram;

/// Side length both images are resized to for color and structural comparison.
pub const COMPARE_SIZE: u32 = 256;

pub const COLOR_WEIGHT: f64 = 0.3;
pub const TEMPLATE_WEIGHT: f64 = 0.4;
pub const STRUCTURAL_WEIGHT: f64 = 0.3;

/// Display-only estimates used by the fast matcher, which measures color alone.
pub const ESTIMATED_TEMPLATE_FACTOR: f64 = 0.8;
pub const ESTIMATED_STRUCTURAL_FACTOR: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub color: f64,
    pub template: f64,
    pub structural: f64,
}

impl Scores {
    pub const ZERO: Scores = Scores {
        color: 0.0,
        template: 0.0,
        structural: 0.0,
    };

    /// Weighted combination of the three measured metrics.
    pub fn combined(&self) -> f64 {
        COLOR_WEIGHT * self.color
            + TEMPLATE_WEIGHT * self.template
            + STRUCTURAL_WEIGHT * self.structural
    }

    /// Scores derived from a color measurement only. Template and structural
    /// values are estimates for display, not measurements.
    pub fn estimated_from_color(color: f64) -> Self {
        Self {
            color,
            template: color * ESTIMATED_TEMPLATE_FACTOR,
            structural: color * ESTIMATED_STRUCTURAL_FACTOR,
        }
    }
}

/// A decoded image with the derived forms every metric needs.
///
/// Preparing the query once per search avoids decoding it again for each frame.
pub struct PreparedImage {
    histogram: ColorHistogram,
    gray: GrayImage,
    gray_small: GrayImage,
}

impl PreparedImage {
    pub fn from_image(img: &DynamicImage) -> Self {
        let gray = img.to_luma8();
        let gray_small = structural::normalize(&gray, COMPARE_SIZE);
        Self {
            histogram: ColorHistogram::from_image(img, COMPARE_SIZE),
            gray,
            gray_small,
        }
    }

    /// Decode and prepare an image file, or `None` if it cannot be read.
    pub fn load(path: &Path) -> Option<Self> {
        load_image(path).map(|img| Self::from_image(&img))
    }

    pub fn histogram(&self) -> &ColorHistogram {
        &self.histogram
    }

    /// All three metrics, with `self` as the template searched for inside `candidate`.
    pub fn compare(&self, candidate: &PreparedImage) -> Scores {
        Scores {
            color: self.histogram.correlation(&candidate.histogram),
            template: template::best_match(&self.gray, &candidate.gray),
            structural: structural::structural_score(&self.gray_small, &candidate.gray_small),
        }
    }
}

fn load_image(path: &Path) -> Option<DynamicImage> {
    match image::open(path) {
        Ok(img) => Some(img),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Could not decode image");
            None
        }
    }
}

/// Decode an image file and build its color histogram, or `None` if it cannot be read.
pub fn load_histogram(path: &Path) -> Option<ColorHistogram> {
    load_image(path).map(|img| ColorHistogram::from_image(&img, COMPARE_SIZE))
}

/// Color-distribution correlation of two image files.
pub fn color_similarity(a: &Path, b: &Path) -> f64 {
    match (load_histogram(a), load_histogram(b)) {
        (Some(a), Some(b)) => a.correlation(&b),
        _ => 0.0,
    }
}

/// Best normalized correlation of the `template` image inside the `target` image.
pub fn template_similarity(template: &Path, target: &Path) -> f64 {
    match (load_image(template), load_image(target)) {
        (Some(t), Some(img)) => template::best_match(&t.to_luma8(), &img.to_luma8()),
        _ => 0.0,
    }
}

/// Pixel-intensity similarity of two image files at 256x256.
pub fn structural_similarity(a: &Path, b: &Path) -> f64 {
    match (load_image(a), load_image(b)) {
        (Some(a), Some(b)) => structural::structural_score(
            &structural::normalize(&a.to_luma8(), COMPARE_SIZE),
            &structural::normalize(&b.to_luma8(), COMPARE_SIZE),
        ),
        _ => 0.0,
    }
}

/// All three metrics between two image files; zeros if either fails to decode.
pub fn compare_files(query: &Path, candidate: &Path) -> Scores {
    match (PreparedImage::load(query), PreparedImage::load(candidate)) {
        (Some(q), Some(c)) => q.compare(&c),
        _ => Scores::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn scene(seed: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, y| {
            Rgb([
                ((x * 4 + seed * 40) % 256) as u8,
                ((y * 5 + seed * 70) % 256) as u8,
                (((x + y) * 3 + seed * 25) % 256) as u8,
            ])
        }))
    }

    #[test]
    fn test_combined_weights() {
        let scores = Scores { color: 1.0, template: 0.5, structural: 0.0 };
        assert!((scores.combined() - 0.5).abs() < 1e-12);

        let all = Scores { color: 1.0, template: 1.0, structural: 1.0 };
        assert!((all.combined() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_estimated_scores() {
        let scores = Scores::estimated_from_color(0.5);
        assert_eq!(scores.color, 0.5);
        assert!((scores.template - 0.4).abs() < 1e-12);
        assert!((scores.structural - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_identical_images() {
        let a = PreparedImage::from_image(&scene(1));
        let b = PreparedImage::from_image(&scene(1));
        let scores = a.compare(&b);

        assert_eq!(scores.structural, 1.0);
        assert!((scores.color - 1.0).abs() < 1e-9);
        assert!((scores.template - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_beats_different() {
        let query = PreparedImage::from_image(&scene(1));
        let same = query.compare(&PreparedImage::from_image(&scene(1)));
        let other = query.compare(&PreparedImage::from_image(&scene(4)));

        assert!(same.color >= other.color);
        assert!(same.template >= other.template);
        assert!(same.structural > other.structural);
        assert!(same.combined() > other.combined());
    }

    #[test]
    fn test_unreadable_files_score_zero() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.png");
        scene(2).save(&good).unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not an image").unwrap();
        let missing = dir.path().join("missing.png");

        assert_eq!(compare_files(&bad, &good), Scores::ZERO);
        assert_eq!(compare_files(&good, &missing), Scores::ZERO);
        assert_eq!(color_similarity(&good, &bad), 0.0);
        assert_eq!(template_similarity(&missing, &good), 0.0);
        assert_eq!(structural_similarity(&good, &bad), 0.0);
    }

    #[test]
    fn test_file_level_metrics_on_identical_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.png");
        scene(3).save(&path).unwrap();

        assert_eq!(structural_similarity(&path, &path), 1.0);
        assert!((color_similarity(&path, &path) - 1.0).abs() < 1e-9);
        assert!((template_similarity(&path, &path) - 1.0).abs() < 1e-9);
    }
}
