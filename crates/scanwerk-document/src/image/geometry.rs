// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometric estimators: minimum bounding rectangles and skew angle.

use image::{GrayImage, Rgb, RgbImage};
use scanwerk_core::CropGeometry;
use tracing::{debug, instrument};

/// Smallest rectangle containing every `(x, y)` for which `is_content` holds.
fn content_box(width: u32, height: u32, is_content: impl Fn(u32, u32) -> bool) -> Option<CropGeometry> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;

    for y in 0..height {
        for x in 0..width {
            if is_content(x, y) {
                found = true;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }

    found.then(|| CropGeometry {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Whether `pixel` lies within `fuzz` (fraction of full scale) of `reference`.
pub fn within_fuzz(pixel: Rgb<u8>, reference: Rgb<u8>, fuzz: f32) -> bool {
    let distance_sq: f32 = pixel
        .0
        .iter()
        .zip(reference.0.iter())
        .map(|(&a, &b)| {
            let d = a as f32 - b as f32;
            d * d
        })
        .sum::<f32>()
        / 3.0;
    let limit = fuzz * 255.0;
    distance_sq <= limit * limit
}

/// Minimum bounding rectangle of everything that is not `background`, treating
/// colours within `fuzz` of the background as background. `None` when the
/// whole image is background.
pub fn fuzzy_bounding_box(rgb: &RgbImage, background: Rgb<u8>, fuzz: f32) -> Option<CropGeometry> {
    content_box(rgb.width(), rgb.height(), |x, y| {
        !within_fuzz(*rgb.get_pixel(x, y), background, fuzz)
    })
}

/// Zero-tolerance trim: rectangle of every pixel that differs from `background`.
pub fn trim_box(gray: &GrayImage, background: u8) -> Option<CropGeometry> {
    content_box(gray.width(), gray.height(), |x, y| gray.get_pixel(x, y).0[0] != background)
}

/// Estimate the skew of dark content in `gray` by projection profiles.
///
/// Pixels darker than `ink_threshold` are treated as ink. For every candidate
/// angle in `[-max_angle, max_angle]` the ink is projected onto the rotated
/// vertical axis; the angle whose row profile is sharpest wins. Candidates
/// are visited outward from zero and only a strictly better score replaces
/// the current best, so flat or empty inputs report `0.0`.
///
/// A positive result means the content is rotated clockwise.
#[instrument(skip(gray), fields(width = gray.width(), height = gray.height()))]
pub fn estimate_skew(gray: &GrayImage, ink_threshold: u8, max_angle: f64, step: f64) -> f64 {
    let ink: Vec<(f64, f64)> = gray
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] < ink_threshold)
        .map(|(x, y, _)| (x as f64, y as f64))
        .collect();

    if ink.is_empty() || step <= 0.0 {
        debug!("No ink found for skew estimation");
        return 0.0;
    }

    let offset = gray.width() as f64 + 1.0;
    let bins = (gray.height() as f64 + 2.0 * offset).ceil() as usize + 1;
    let score = |degrees: f64| -> f64 {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let mut profile = vec![0u32; bins];
        for &(x, y) in &ink {
            let projected = y * cos - x * sin + offset;
            let bin = (projected.max(0.0) as usize).min(bins - 1);
            profile[bin] += 1;
        }
        profile.iter().map(|&c| (c as f64) * (c as f64)).sum()
    };

    let steps = (max_angle / step).round() as i64;
    let mut best_angle = 0.0;
    let mut best_score = score(0.0);
    for i in 1..=steps {
        for angle in [i as f64 * step, -(i as f64) * step] {
            let s = score(angle);
            if s > best_score {
                best_score = s;
                best_angle = angle;
            }
        }
    }

    debug!(angle = best_angle, ink_pixels = ink.len(), "Skew estimated");
    best_angle
}
