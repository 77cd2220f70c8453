// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Correction stage: despeckle, deskew, edge trim, shadow trim, gamma.
//
// Each geometric step computes a `CorrectionResult` from a disposable
// snapshot and applies it to the page. A step that cannot find anything to
// correct leaves the page alone; none of them may fail the run.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use scanwerk_core::config::CorrectionConfig;
use scanwerk_core::{CorrectionResult, CropGeometry};
use tracing::{debug, info, instrument, warn};

use crate::image::geometry::{estimate_skew, fuzzy_bounding_box, trim_box};
use crate::image::processor::ImageProcessor;
use crate::page::PageImage;
use crate::scan::dump::DebugDump;

/// What each correction step decided for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionReport {
    pub deskew: CorrectionResult,
    pub edge_trim: CorrectionResult,
    pub shadow_trim: CorrectionResult,
    /// Shadow-trim passes used (at most the configured attempt cap).
    pub shadow_attempts: u32,
}

/// Outcome of the shadow-trim search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowTrim {
    pub result: CorrectionResult,
    pub attempts: u32,
}

/// Runs the correction steps in their fixed order.
pub struct Corrector {
    config: CorrectionConfig,
    dump: DebugDump,
}

impl Corrector {
    pub fn new(config: CorrectionConfig, dump: DebugDump) -> Self {
        Self { config, dump }
    }

    /// Correct one page. Gamma runs last, after geometry is settled, because
    /// it shifts the statistics the geometric steps rely on.
    #[instrument(skip(self, page), fields(width = page.width(), height = page.height()))]
    pub fn correct(&self, index: usize, page: PageImage) -> (PageImage, CorrectionReport) {
        self.dump.write(index, 1, "initial", &page.image);

        let page = despeckle(page);
        self.dump.write(index, 2, "despeckled", &page.image);

        let (page, deskew) = self.deskew(page);
        self.dump.write(index, 3, "deskewed", &page.image);

        let edge_trim = self.edge_trim(&page);
        let page = apply(page, edge_trim);
        self.dump.write(index, 4, "cropped", &page.image);

        let shadow = self.shadow_trim(&page);
        let page = apply(page, shadow.result);
        self.dump.write(index, 5, "shadow-trimmed", &page.image);

        let image = ImageProcessor::from_dynamic(page.image)
            .gamma(self.config.gamma)
            .into_dynamic();
        let page = PageImage { image, ..page };

        info!(
            page = index,
            width = page.width(),
            height = page.height(),
            "Page corrected"
        );
        (
            page,
            CorrectionReport {
                deskew,
                edge_trim,
                shadow_trim: shadow.result,
                shadow_attempts: shadow.attempts,
            },
        )
    }

    /// Sample the background, flip, estimate and remove skew, flip back.
    ///
    /// The feeder shadow usually sits opposite the leading edge and biases the
    /// estimator; estimating on the flipped page normalises that.
    pub fn deskew(&self, page: PageImage) -> (PageImage, CorrectionResult) {
        let background = page.sample_background(self.config.background_sample_offset);
        debug!(?background, "Background sampled");
        let PageImage { image, density, .. } = page;

        let flipped = ImageProcessor::from_dynamic(image).flip_vertical();

        let snapshot = ImageProcessor::from_dynamic(flipped.as_dynamic().clone())
            .scale(self.config.skew_analysis_scale)
            .grayscale()
            .threshold_otsu()
            .into_dynamic()
            .to_luma8();
        let ink_threshold = (self.config.skew_contrast_threshold * 255.0).round() as u8;
        let angle = estimate_skew(
            &snapshot,
            ink_threshold,
            self.config.skew_max_angle as f64,
            self.config.skew_step as f64,
        );

        let result = if angle == 0.0 {
            CorrectionResult::Unchanged
        } else {
            CorrectionResult::Rotate(angle)
        };
        debug!(angle, "Deskew angle");

        let image = flipped.rotate(-angle, background).flip_vertical().into_dynamic();
        let page = PageImage {
            image,
            density,
            background: Some(background),
        };
        (page, result)
    }

    /// Crop to the minimum bounding rectangle of non-background content.
    pub fn edge_trim(&self, page: &PageImage) -> CorrectionResult {
        let background = page
            .background
            .unwrap_or_else(|| page.sample_background(self.config.background_sample_offset));
        let rgb = page.image.to_rgb8();
        let Some(bbox) = fuzzy_bounding_box(&rgb, background, self.config.edge_fuzz) else {
            debug!("Page is all background; no edge trim");
            return CorrectionResult::Unchanged;
        };

        let geometry = if bbox.width < 2 || bbox.height < 2 {
            bbox
        } else {
            // Solid background with the content region drawn over it, then a
            // zero-tolerance trim around the drawn region.
            let mut mask = GrayImage::from_pixel(rgb.width(), rgb.height(), Luma([0]));
            let (x0, y0) = (bbox.x as i32, bbox.y as i32);
            let (x1, y1) = (x0 + bbox.width as i32 - 1, y0 + bbox.height as i32 - 1);
            let polygon = [
                Point::new(x0, y0),
                Point::new(x1, y0),
                Point::new(x1, y1),
                Point::new(x0, y1),
            ];
            draw_polygon_mut(&mut mask, &polygon, Luma([255]));
            trim_box(&mask, 0).unwrap_or(bbox)
        };

        if geometry == page.geometry() {
            CorrectionResult::Unchanged
        } else {
            debug!(%geometry, "Edge trim");
            CorrectionResult::Crop(geometry)
        }
    }

    /// Look for a shadow band and trim it.
    ///
    /// Builds a binary silhouette (blur, negate, Otsu, negate) and trims black
    /// from it with zero tolerance. The first pass that changes the geometry
    /// wins. A pass with no change shaves one more row off the top and tries
    /// again, up to the configured attempt cap; if nothing converges the
    /// page keeps its current geometry.
    #[instrument(skip(self, page), fields(width = page.width(), height = page.height()))]
    pub fn shadow_trim(&self, page: &PageImage) -> ShadowTrim {
        let (width, height) = (page.width(), page.height());
        let silhouette = ImageProcessor::from_dynamic(page.image.clone())
            .grayscale()
            .blur(self.config.shadow_blur_sigma)
            .negate()
            .threshold_otsu()
            .negate()
            .into_dynamic()
            .to_luma8();

        let mut attempts = 0;
        for shaved in 0..self.config.shadow_trim_attempts {
            attempts += 1;
            if shaved >= height {
                break;
            }
            let view = image::imageops::crop_imm(&silhouette, 0, shaved, width, height - shaved).to_image();
            let current = CropGeometry::full(view.width(), view.height());

            match trim_box(&view, 0) {
                Some(bbox) if bbox != current => {
                    let geometry = bbox.offset(0, shaved);
                    let min = self.config.min_trimmed_at(page.density);
                    if geometry.width < min || geometry.height < min {
                        warn!(%geometry, min, "Shadow trim would shrink page too far; keeping geometry");
                        return ShadowTrim {
                            result: CorrectionResult::Unchanged,
                            attempts,
                        };
                    }
                    debug!(%geometry, attempts, "Shadow trimmed");
                    return ShadowTrim {
                        result: CorrectionResult::Crop(geometry),
                        attempts,
                    };
                }
                _ => debug!(shaved, "No shadow change; shaving one row"),
            }
        }

        warn!(attempts, "Shadow trim did not converge; keeping geometry");
        ShadowTrim {
            result: CorrectionResult::Unchanged,
            attempts,
        }
    }
}

fn despeckle(page: PageImage) -> PageImage {
    let image = ImageProcessor::from_dynamic(page.image).despeckle().into_dynamic();
    PageImage { image, ..page }
}

/// Apply a crop result to the page; other results leave it untouched here.
fn apply(page: PageImage, result: CorrectionResult) -> PageImage {
    match result {
        CorrectionResult::Crop(geometry) if geometry.fits_within(page.width(), page.height()) => {
            let image = ImageProcessor::from_dynamic(page.image).crop(geometry).into_dynamic();
            PageImage { image, ..page }
        }
        CorrectionResult::Crop(geometry) => {
            warn!(%geometry, width = page.width(), height = page.height(), "Crop outside page; ignored");
            page
        }
        CorrectionResult::Rotate(_) | CorrectionResult::Unchanged => page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

    fn test_config() -> CorrectionConfig {
        CorrectionConfig {
            skew_analysis_scale: 1.0,
            min_trimmed_dimension: 50,
            ..CorrectionConfig::default()
        }
    }

    fn corrector() -> Corrector {
        Corrector::new(test_config(), DebugDump::disabled())
    }

    fn page(rgb: RgbImage) -> PageImage {
        PageImage::new(DynamicImage::ImageRgb8(rgb), 300)
    }

    #[test]
    fn uniform_page_keeps_geometry() {
        let input = page(RgbImage::from_pixel(120, 160, Rgb([255, 255, 255])));
        let before = input.geometry();
        let (out, report) = corrector().correct(0, input);
        assert_eq!(out.geometry(), before);
        assert_eq!(report.deskew, CorrectionResult::Unchanged);
        assert_eq!(report.edge_trim, CorrectionResult::Unchanged);
        assert_eq!(report.shadow_trim, CorrectionResult::Unchanged);
    }

    #[test]
    fn shadow_search_is_capped() {
        let input = page(RgbImage::from_pixel(120, 160, Rgb([255, 255, 255])));
        let shadow = corrector().shadow_trim(&input);
        assert_eq!(shadow.result, CorrectionResult::Unchanged);
        assert_eq!(shadow.attempts, 10);
    }

    #[test]
    fn edge_trim_finds_content() {
        let mut rgb = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
        for y in 50..150 {
            for x in 40..120 {
                rgb.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
        let result = corrector().edge_trim(&page(rgb));
        assert_eq!(
            result,
            CorrectionResult::Crop(CropGeometry {
                x: 40,
                y: 50,
                width: 80,
                height: 100
            })
        );
    }

    #[test]
    fn shadow_band_is_trimmed() {
        let mut rgb = RgbImage::from_pixel(150, 200, Rgb([245, 245, 245]));
        for y in 180..200 {
            for x in 0..150 {
                rgb.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let shadow = corrector().shadow_trim(&page(rgb));
        let CorrectionResult::Crop(geometry) = shadow.result else {
            panic!("expected a crop, got {:?}", shadow.result);
        };
        assert_eq!(shadow.attempts, 1);
        assert!(geometry.fits_within(150, 200));
        assert!(geometry.height < 200 && geometry.height > 160, "{geometry}");
    }

    #[test]
    fn shadow_trim_respects_minimum_dimension() {
        let mut rgb = RgbImage::from_pixel(150, 200, Rgb([245, 245, 245]));
        for y in 180..200 {
            for x in 0..150 {
                rgb.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let strict = Corrector::new(
            CorrectionConfig {
                min_trimmed_dimension: 500,
                ..test_config()
            },
            DebugDump::disabled(),
        );
        assert_eq!(strict.shadow_trim(&page(rgb)).result, CorrectionResult::Unchanged);
    }

    #[test]
    fn minimum_dimension_scales_with_density() {
        let mut rgb = RgbImage::from_pixel(150, 200, Rgb([245, 245, 245]));
        for y in 180..200 {
            for x in 0..150 {
                rgb.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let corrector = Corrector::new(
            CorrectionConfig {
                min_trimmed_dimension: 500,
                ..test_config()
            },
            DebugDump::disabled(),
        );
        let low_res = PageImage::new(DynamicImage::ImageRgb8(rgb), 60);
        assert!(matches!(corrector.shadow_trim(&low_res).result, CorrectionResult::Crop(_)));
    }

    #[test]
    fn crop_outside_the_page_is_ignored() {
        let input = page(RgbImage::from_pixel(40, 30, Rgb([200, 200, 200])));
        let oversized = CorrectionResult::Crop(CropGeometry {
            x: 10,
            y: 0,
            width: 40,
            height: 30,
        });
        assert_eq!(apply(input, oversized).geometry(), CropGeometry::full(40, 30));
    }

    #[test]
    fn deskew_levels_rotated_lines() {
        let mut gray = GrayImage::from_pixel(300, 300, Luma([255]));
        for row in (40..260).step_by(25) {
            for x in 30..270 {
                gray.put_pixel(x, row, Luma([0]));
                gray.put_pixel(x, row + 1, Luma([0]));
            }
        }
        let rotated = rotate_about_center(&gray, 2.5f32.to_radians(), Interpolation::Bilinear, Luma([255]));
        let input = PageImage::new(DynamicImage::ImageLuma8(rotated), 300);

        let c = corrector();
        let (out, result) = c.deskew(input);
        assert!(matches!(result, CorrectionResult::Rotate(a) if (a.abs() - 2.5).abs() < 0.35));
        assert_eq!(out.density, 300);
        assert_eq!(out.background, Some(Rgb([255, 255, 255])));

        let residual = estimate_skew(&out.image.to_luma8(), 204, 5.0, 0.1);
        assert!(residual.abs() < 0.35, "residual skew {residual}");
    }

    #[test]
    fn crop_never_exceeds_page() {
        let mut rgb = RgbImage::from_pixel(100, 120, Rgb([255, 255, 255]));
        rgb.put_pixel(99, 119, Rgb([0, 0, 0]));
        rgb.put_pixel(0, 0, Rgb([0, 0, 0]));
        let (out, _) = corrector().correct(0, page(rgb));
        assert!(out.width() <= 100 && out.height() <= 120);
    }
}
