// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — the pixel kernels used by the digestion stages: despeckle,
// rotate, flip, crop, gamma, brightness/contrast, levels, unsharp mask,
// solarize, thresholds and colourspace conversion. Operates on in-memory
// images using the `image` and `imageproc` crates.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use scanwerk_core::CropGeometry;
use tracing::{debug, instrument};

use super::geometry::within_fuzz;
use super::stats::{kapur_threshold, otsu_threshold};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping
/// the transformed image, enabling method chaining.
///
/// ```ignore
/// let page = ImageProcessor::from_dynamic(scan)
///     .despeckle()
///     .gamma(2.2)
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Per-channel helpers --------------------------------------------------

    /// Apply a lookup table to every colour channel. Gray images stay gray;
    /// everything else becomes RGB8.
    fn map_channels(self, lut: &[u8; 256]) -> Self {
        let image = match self.image {
            DynamicImage::ImageLuma8(mut gray) => {
                for p in gray.pixels_mut() {
                    p.0[0] = lut[p.0[0] as usize];
                }
                DynamicImage::ImageLuma8(gray)
            }
            other => {
                let mut rgb = other.to_rgb8();
                for p in rgb.pixels_mut() {
                    for c in p.0.iter_mut() {
                        *c = lut[*c as usize];
                    }
                }
                DynamicImage::ImageRgb8(rgb)
            }
        };
        Self { image }
    }

    // -- Noise / geometry -----------------------------------------------------

    /// Remove isolated noise pixels with a 3x3 median filter.
    #[instrument(skip(self))]
    pub fn despeckle(self) -> Self {
        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(median_filter(&gray, 1, 1)),
            other => DynamicImage::ImageRgb8(median_filter(&other.to_rgb8(), 1, 1)),
        };
        debug!("Despeckle complete");
        Self { image }
    }

    /// Mirror top to bottom.
    pub fn flip_vertical(self) -> Self {
        Self {
            image: self.image.flipv(),
        }
    }

    /// Rotate by an arbitrary angle in degrees (clockwise).
    ///
    /// Quarter turns are lossless. Other angles expand the canvas to hold the
    /// whole rotated page and fill uncovered corners with `fill`.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate(self, degrees: f64, fill: Rgb<u8>) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }

        let rgb = self.image.to_rgb8();
        let (w, h) = rgb.dimensions();
        let radians = degrees.to_radians();
        let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
        let new_w = (w as f64 * cos + h as f64 * sin).ceil() as u32;
        let new_h = (w as f64 * sin + h as f64 * cos).ceil() as u32;

        let mut canvas = RgbImage::from_pixel(new_w.max(w), new_h.max(h), fill);
        let left = (canvas.width() - w) / 2;
        let top = (canvas.height() - h) / 2;
        image::imageops::overlay(&mut canvas, &rgb, left as i64, top as i64);

        let rotated = rotate_about_center(&canvas, radians as f32, Interpolation::Bilinear, fill);
        debug!(
            width = rotated.width(),
            height = rotated.height(),
            "General rotation applied"
        );
        Self {
            image: DynamicImage::ImageRgb8(rotated),
        }
    }

    /// Crop to `geometry`, clamped to the image bounds.
    #[instrument(skip(self))]
    pub fn crop(self, geometry: CropGeometry) -> Self {
        let img_w = self.image.width();
        let img_h = self.image.height();

        let safe_x = geometry.x.min(img_w.saturating_sub(1));
        let safe_y = geometry.y.min(img_h.saturating_sub(1));
        let safe_w = geometry.width.min(img_w - safe_x);
        let safe_h = geometry.height.min(img_h - safe_y);

        debug!(safe_x, safe_y, safe_w, safe_h, "Cropping image");
        Self {
            image: self.image.crop_imm(safe_x, safe_y, safe_w, safe_h),
        }
    }

    /// Scale both sides by `factor` (at least one pixel each).
    pub fn scale(self, factor: f32) -> Self {
        let w = ((self.image.width() as f32 * factor).round() as u32).max(1);
        let h = ((self.image.height() as f32 * factor).round() as u32).max(1);
        Self {
            image: self
                .image
                .resize_exact(w, h, image::imageops::FilterType::Triangle),
        }
    }

    // -- Tone -----------------------------------------------------------------

    /// Gamma adjustment: `out = in ^ (1 / gamma)` on normalised values.
    #[instrument(skip(self), fields(gamma))]
    pub fn gamma(self, gamma: f32) -> Self {
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            let normalised = i as f32 / 255.0;
            *v = (normalised.powf(1.0 / gamma) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        self.map_channels(&lut)
    }

    /// Brightness/contrast in percent (-100..=100 each), using a linear slope
    /// around mid-gray: `slope = tan(pi * (contrast / 100 + 1) / 4)`.
    #[instrument(skip(self), fields(brightness, contrast))]
    pub fn brightness_contrast(self, brightness: f64, contrast: f64) -> Self {
        let brightness = brightness.clamp(-100.0, 100.0);
        let contrast = contrast.clamp(-100.0, 100.0);
        let slope = (std::f64::consts::PI * (contrast / 100.0 + 1.0) / 4.0)
            .tan()
            .max(0.0);
        let intercept = brightness / 100.0 + ((100.0 - brightness) / 200.0) * (1.0 - slope);

        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            let x = i as f64 / 255.0;
            *v = ((slope * x + intercept) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        self.map_channels(&lut)
    }

    /// Stretch the darkest and lightest values present to the full range.
    #[instrument(skip(self))]
    pub fn auto_level(self) -> Self {
        let (lo, hi) = match &self.image {
            DynamicImage::ImageLuma8(gray) => gray
                .pixels()
                .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0]))),
            other => other.to_rgb8().pixels().fold((255u8, 0u8), |(lo, hi), p| {
                let [r, g, b] = p.0;
                (lo.min(r).min(g).min(b), hi.max(r).max(g).max(b))
            }),
        };
        if hi <= lo {
            return self;
        }

        let span = (hi - lo) as f32;
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            let stretched = (i as f32 - lo as f32) / span * 255.0;
            *v = stretched.round().clamp(0.0, 255.0) as u8;
        }
        debug!(lo, hi, "Levels stretched");
        self.map_channels(&lut)
    }

    /// Unsharp mask: add `amount` times the difference to a Gaussian blur,
    /// wherever that difference exceeds `threshold` (fraction of full scale).
    #[instrument(skip(self), fields(sigma, amount, threshold))]
    pub fn unsharp(self, sigma: f32, amount: f32, threshold: f32) -> Self {
        let limit = threshold * 255.0;
        let sharpen = |orig: u8, blur: u8| -> u8 {
            let diff = orig as f32 - blur as f32;
            if diff.abs() < limit {
                orig
            } else {
                (orig as f32 + amount * diff).round().clamp(0.0, 255.0) as u8
            }
        };

        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => {
                let blurred = gaussian_blur_f32(&gray, sigma);
                DynamicImage::ImageLuma8(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                    Luma([sharpen(gray.get_pixel(x, y).0[0], blurred.get_pixel(x, y).0[0])])
                }))
            }
            other => {
                let rgb = other.to_rgb8();
                let blurred = gaussian_blur_f32(&rgb, sigma);
                DynamicImage::ImageRgb8(RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                    let o = rgb.get_pixel(x, y).0;
                    let b = blurred.get_pixel(x, y).0;
                    Rgb([sharpen(o[0], b[0]), sharpen(o[1], b[1]), sharpen(o[2], b[2])])
                }))
            }
        };
        Self { image }
    }

    /// Gaussian blur with standard deviation `sigma`.
    pub fn blur(self, sigma: f32) -> Self {
        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(gaussian_blur_f32(&gray, sigma)),
            other => DynamicImage::ImageRgb8(gaussian_blur_f32(&other.to_rgb8(), sigma)),
        };
        Self { image }
    }

    /// Invert every channel.
    pub fn negate(self) -> Self {
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = 255 - i as u8;
        }
        self.map_channels(&lut)
    }

    /// Invert channel values above `fraction` of full scale.
    pub fn solarize(self, fraction: f32) -> Self {
        let level = (fraction * 255.0).round();
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = if i as f32 > level { 255 - i as u8 } else { i as u8 };
        }
        self.map_channels(&lut)
    }

    /// Force every channel above `fraction` of full scale to white.
    pub fn white_threshold(self, fraction: f32) -> Self {
        let level = (fraction * 255.0).round();
        let mut lut = [0u8; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = if i as f32 >= level { 255 } else { i as u8 };
        }
        self.map_channels(&lut)
    }

    /// Replace every colour within `fuzz` of white with pure white.
    pub fn whiten_near_white(self, fuzz: f32) -> Self {
        let white = Rgb([255u8, 255, 255]);
        let image = match self.image {
            DynamicImage::ImageLuma8(mut gray) => {
                let limit = 255.0 - fuzz * 255.0;
                for p in gray.pixels_mut() {
                    if p.0[0] as f32 >= limit {
                        p.0[0] = 255;
                    }
                }
                DynamicImage::ImageLuma8(gray)
            }
            other => {
                let mut rgb = other.to_rgb8();
                for p in rgb.pixels_mut() {
                    if within_fuzz(*p, white, fuzz) {
                        *p = white;
                    }
                }
                DynamicImage::ImageRgb8(rgb)
            }
        };
        Self { image }
    }

    // -- Colourspace / thresholds ---------------------------------------------

    /// Convert to perceptual luma.
    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Convert to linear-light gray: decode sRGB, weight with Rec. 709
    /// coefficients and store the linear value without re-encoding.
    #[instrument(skip(self))]
    pub fn linear_grayscale(self) -> Self {
        let mut decode = [0f32; 256];
        for (i, v) in decode.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *v = if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }

        let rgb = self.image.to_rgb8();
        let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            let linear = 0.2126 * decode[r as usize]
                + 0.7152 * decode[g as usize]
                + 0.0722 * decode[b as usize];
            Luma([(linear * 255.0).round().clamp(0.0, 255.0) as u8])
        });
        Self {
            image: DynamicImage::ImageLuma8(gray),
        }
    }

    /// Binarize: luma values `<= level` become black, others white.
    pub fn threshold(self, level: u8) -> Self {
        let mut gray = self.image.to_luma8();
        for p in gray.pixels_mut() {
            p.0[0] = if p.0[0] <= level { 0 } else { 255 };
        }
        Self {
            image: DynamicImage::ImageLuma8(gray),
        }
    }

    /// Binarize at the Otsu level of the luma histogram.
    #[instrument(skip(self))]
    pub fn threshold_otsu(self) -> Self {
        let level = otsu_threshold(&self.image.to_luma8());
        debug!(level, "Otsu threshold computed");
        self.threshold(level)
    }

    /// Binarize at the Kapur maximum-entropy level of the luma histogram.
    #[instrument(skip(self))]
    pub fn threshold_kapur(self) -> Self {
        let level = kapur_threshold(&self.image.to_luma8());
        debug!(level, "Kapur threshold computed");
        self.threshold(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(value: u8) -> ImageProcessor {
        ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            8,
            8,
            Luma([value]),
        )))
    }

    fn luma_at(p: &ImageProcessor) -> u8 {
        p.as_dynamic().to_luma8().get_pixel(0, 0).0[0]
    }

    #[test]
    fn gamma_brightens_midtones_and_keeps_extremes() {
        assert!(luma_at(&gray(128).gamma(2.2)) > 128);
        assert_eq!(luma_at(&gray(0).gamma(2.2)), 0);
        assert_eq!(luma_at(&gray(255).gamma(2.2)), 255);
    }

    #[test]
    fn contrast_boost_pushes_away_from_mid_gray() {
        assert!(luma_at(&gray(200).brightness_contrast(0.0, 30.0)) > 200);
        assert!(luma_at(&gray(60).brightness_contrast(0.0, 30.0)) < 60);
    }

    #[test]
    fn zero_contrast_is_identity() {
        assert_eq!(luma_at(&gray(77).brightness_contrast(0.0, 0.0)), 77);
    }

    #[test]
    fn despeckle_removes_isolated_pixel() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([255]));
        img.put_pixel(4, 4, Luma([0]));
        let out = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(img))
            .despeckle()
            .into_dynamic()
            .to_luma8();
        assert_eq!(out.get_pixel(4, 4).0[0], 255);
    }

    #[test]
    fn small_rotation_expands_canvas_with_fill() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 50, Rgb([0, 0, 0])));
        let rotated = ImageProcessor::from_dynamic(img).rotate(10.0, Rgb([255, 0, 0]));
        assert!(rotated.width() > 100);
        assert!(rotated.height() > 50);
        let corner = rotated.as_dynamic().to_rgb8().get_pixel(0, 0).0;
        assert_eq!(corner, [255, 0, 0]);
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(30, 20));
        let rotated = ImageProcessor::from_dynamic(img).rotate(270.0, Rgb([0, 0, 0]));
        assert_eq!((rotated.width(), rotated.height()), (20, 30));
    }

    #[test]
    fn crop_is_clamped() {
        let cropped = gray(10).crop(CropGeometry {
            x: 4,
            y: 4,
            width: 100,
            height: 2,
        });
        assert_eq!((cropped.width(), cropped.height()), (4, 2));
    }

    #[test]
    fn solarize_inverts_only_bright_values() {
        assert_eq!(luma_at(&gray(200).solarize(0.5)), 55);
        assert_eq!(luma_at(&gray(100).solarize(0.5)), 100);
    }

    #[test]
    fn auto_level_stretches_range() {
        let img = GrayImage::from_fn(4, 1, |x, _| Luma([100 + x as u8 * 10]));
        let out = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(img))
            .auto_level()
            .into_dynamic()
            .to_luma8();
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn near_white_is_flattened() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([240, 245, 250])));
        let out = ImageProcessor::from_dynamic(img).whiten_near_white(0.1);
        assert_eq!(out.as_dynamic().to_rgb8().get_pixel(1, 1).0, [255, 255, 255]);
    }
}
