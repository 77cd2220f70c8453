// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Channel statistics and histogram thresholds. All statistics are reported on
// the 0-255 display scale.

use image::{GrayImage, Luma, RgbImage};

/// Mean, standard deviation and peak of one 8-bit channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: f64,
    pub stddev: f64,
    pub max: u8,
}

impl ChannelStats {
    /// Statistics of a single-channel image. An empty image yields zeros.
    pub fn of(gray: &GrayImage) -> Self {
        let count = gray.width() as u64 * gray.height() as u64;
        if count == 0 {
            return Self {
                mean: 0.0,
                stddev: 0.0,
                max: 0,
            };
        }

        let mut sum = 0u64;
        let mut sum_sq = 0u64;
        let mut max = 0u8;
        for Luma([v]) in gray.pixels() {
            sum += *v as u64;
            sum_sq += (*v as u64) * (*v as u64);
            max = max.max(*v);
        }

        let n = count as f64;
        let mean = sum as f64 / n;
        let variance = (sum_sq as f64 / n - mean * mean).max(0.0);
        Self {
            mean,
            stddev: variance.sqrt(),
            max,
        }
    }

    /// Mean as a fraction of full scale.
    pub fn mean_fraction(&self) -> f64 {
        self.mean / 255.0
    }
}

/// 256-bin intensity histogram.
pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    histogram
}

/// Compute the Otsu threshold for a grayscale image.
///
/// Finds the threshold value that maximises the between-class variance of the
/// dark and light pixel groups. Values `<=` the returned level belong to the
/// dark class.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let histogram = histogram(gray);

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return 128;
    }

    let mut sum_total: f64 = 0.0;
    for (i, &count) in histogram.iter().enumerate() {
        sum_total += i as f64 * count as f64;
    }

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Compute the Kapur maximum-entropy threshold for a grayscale image.
///
/// Picks the level that maximises the summed Shannon entropy of the two
/// classes. Tends to give cleaner backgrounds than Otsu on plain pages.
/// Values `<=` the returned level belong to the dark class.
pub fn kapur_threshold(gray: &GrayImage) -> u8 {
    let histogram = histogram(gray);
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return 128;
    }

    let p: Vec<f64> = histogram
        .iter()
        .map(|&count| count as f64 / total as f64)
        .collect();

    let mut cumulative = [0.0f64; 256];
    let mut acc = 0.0;
    for (i, &pi) in p.iter().enumerate() {
        acc += pi;
        cumulative[i] = acc;
    }

    let mut best_threshold = 0u8;
    let mut best_entropy = f64::MIN;
    for t in 0..255usize {
        let low = cumulative[t];
        let high = 1.0 - low;
        if low <= f64::EPSILON || high <= f64::EPSILON {
            continue;
        }

        let entropy_low: f64 = p[..=t]
            .iter()
            .filter(|&&pi| pi > 0.0)
            .map(|&pi| {
                let q = pi / low;
                -q * q.ln()
            })
            .sum();
        let entropy_high: f64 = p[t + 1..]
            .iter()
            .filter(|&&pi| pi > 0.0)
            .map(|&pi| {
                let q = pi / high;
                -q * q.ln()
            })
            .sum();

        let entropy = entropy_low + entropy_high;
        if entropy > best_entropy {
            best_entropy = entropy;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Hue/saturation/brightness saturation channel: `(max - min) / max` per pixel,
/// scaled to 0-255. Black pixels have zero saturation.
pub fn saturation_channel(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        if max == 0 {
            Luma([0])
        } else {
            let s = (max - min) as u32 * 255 / max as u32;
            Luma([s as u8])
        }
    })
}
