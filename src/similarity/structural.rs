use image::imageops::{self, FilterType};
use image::GrayImage;

const MAX_PIXEL: f64 = 255.0;

/// Resize a grayscale image to `size`x`size` for pixel-wise comparison.
pub fn normalize(img: &GrayImage, size: u32) -> GrayImage {
    if img.dimensions() == (size, size) {
        return img.clone();
    }
    imageops::resize(img, size, size, FilterType::Triangle)
}

/// `1 - mse / 255²` over two equally sized grayscale images.
///
/// Identical images score exactly 1.0. Mismatched sizes score 0.0.
pub fn structural_score(a: &GrayImage, b: &GrayImage) -> f64 {
    if a.dimensions() != b.dimensions() || a.as_raw().is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    let mse = sum_sq / a.as_raw().len() as f64;

    1.0 - mse / (MAX_PIXEL * MAX_PIXEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_identical_is_exactly_one() {
        let img = GrayImage::from_fn(8, 8, |x, y| Luma([(x * 20 + y) as u8]));
        assert_eq!(structural_score(&img, &img), 1.0);
    }

    #[test]
    fn test_opposite_extremes_score_zero() {
        let black = GrayImage::from_pixel(8, 8, Luma([0]));
        let white = GrayImage::from_pixel(8, 8, Luma([255]));
        assert_eq!(structural_score(&black, &white), 0.0);
    }

    #[test]
    fn test_small_difference_scores_high() {
        let a = GrayImage::from_pixel(8, 8, Luma([100]));
        let b = GrayImage::from_pixel(8, 8, Luma([110]));
        let score = structural_score(&a, &b);
        assert!(score > 0.99 && score < 1.0);
    }

    #[test]
    fn test_normalize_resizes() {
        let img = GrayImage::from_pixel(30, 10, Luma([7]));
        assert_eq!(normalize(&img, 16).dimensions(), (16, 16));
    }
}
