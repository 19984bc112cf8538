//! Normalized cross-correlation template matching on grayscale images.
//!
//! The template slides over every position of the target at the target's own
//! resolution; each position scores the mean-subtracted correlation of the
//! template against the window under it, and the best score wins. Window sums
//! come from integral images, so only the cross term costs a full pass over the
//! template per position. Rows of positions are scored in parallel.

use image::imageops::{self, FilterType};
use image::GrayImage;
use rayon::prelude::*;
use std::borrow::Cow;

/// Templates larger than the target are shrunk to this fraction of the largest fit.
pub const FIT_MARGIN: f64 = 0.8;

/// Best normalized correlation of `template` anywhere inside `target`, in -1..=1.
///
/// Returns 0.0 for empty images or when the template has no variance.
pub fn best_match(template: &GrayImage, target: &GrayImage) -> f64 {
    let template = fit_template(template, target);

    let (tw, th) = template.dimensions();
    let (w, h) = target.dimensions();
    if tw == 0 || th == 0 || tw > w || th > h {
        return 0.0;
    }

    let n = (tw * th) as f64;
    let t_mean = template.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
    let t_centered: Vec<f64> = template.pixels().map(|p| p.0[0] as f64 - t_mean).collect();
    let t_norm2: f64 = t_centered.iter().map(|v| v * v).sum();
    if t_norm2 <= f64::EPSILON {
        return 0.0;
    }

    let integral = Integral::new(target);
    let stride = w as usize;
    let pixels = target.as_raw();

    let score_at = |x: u32, y: u32| -> f64 {
        let (sum, sum_sq) = integral.window(x, y, tw, th);
        let w_var = sum_sq - sum * sum / n;
        if w_var <= f64::EPSILON {
            return 0.0;
        }

        let mut cross = 0.0;
        for ty in 0..th as usize {
            let row = (y as usize + ty) * stride + x as usize;
            let t_row = &t_centered[ty * tw as usize..(ty + 1) * tw as usize];
            for (tx, t) in t_row.iter().enumerate() {
                cross += t * pixels[row + tx] as f64;
            }
        }
        (cross / (w_var * t_norm2).sqrt()).clamp(-1.0, 1.0)
    };

    (0..=(h - th))
        .into_par_iter()
        .map(|y| {
            (0..=(w - tw))
                .map(|x| score_at(x, y))
                .fold(f64::MIN, f64::max)
        })
        .reduce(|| f64::MIN, f64::max)
}

/// Shrink a template that does not fit inside the target, keeping its aspect ratio.
pub fn fit_template<'a>(template: &'a GrayImage, target: &GrayImage) -> Cow<'a, GrayImage> {
    let (tw, th) = template.dimensions();
    let (w, h) = target.dimensions();
    if tw <= w && th <= h {
        return Cow::Borrowed(template);
    }

    let factor = (h as f64 / th as f64).min(w as f64 / tw as f64) * FIT_MARGIN;
    Cow::Owned(scale(template, factor))
}

fn scale(img: &GrayImage, factor: f64) -> GrayImage {
    let width = ((img.width() as f64 * factor) as u32).max(1);
    let height = ((img.height() as f64 * factor) as u32).max(1);
    imageops::resize(img, width, height, FilterType::Triangle)
}

/// Summed-area tables of pixel values and squared pixel values.
struct Integral {
    width: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Integral {
    fn new(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let width = w + 1;
        let mut sum = vec![0.0; width * (h + 1)];
        let mut sum_sq = vec![0.0; width * (h + 1)];

        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = img.as_raw()[y * w + x] as f64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * width + x + 1;
                sum[idx] = sum[idx - width] + row_sum;
                sum_sq[idx] = sum_sq[idx - width] + row_sq;
            }
        }

        Self { width, sum, sum_sq }
    }

    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |table: &[f64], x: usize, y: usize| table[y * self.width + x];

        let sum = at(&self.sum, x1, y1) - at(&self.sum, x0, y1) - at(&self.sum, x1, y0)
            + at(&self.sum, x0, y0);
        let sum_sq = at(&self.sum_sq, x1, y1) - at(&self.sum_sq, x0, y1)
            - at(&self.sum_sq, x1, y0)
            + at(&self.sum_sq, x0, y0);
        (sum, sum_sq)
    }
}
