// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transform stage: the pixel transform selected by the page classification.

use scanwerk_core::ClassificationLabel;
use tracing::{debug, instrument};

use crate::image::processor::ImageProcessor;
use crate::page::PageImage;

const CONTRAST_BOOST: f64 = 30.0;
const UNSHARP_SIGMA: f32 = 2.0;
const UNSHARP_AMOUNT: f32 = 1.5;
const UNSHARP_THRESHOLD: f32 = 0.05;
const NEAR_WHITE_FUZZ: f32 = 0.1;

/// Transform chosen for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Blank page: excluded from the output.
    Discard,
    /// Level stretch, unsharp mask, Otsu. Keeps anti-aliased glyph edges.
    BinarizeText,
    /// Contrast boost, Kapur. Favours a clean background over edge fidelity.
    BinarizePlain,
    /// Contrast boost, flatten near-white, linear gray.
    FlattenGrayscale,
    /// Colour pages are left as they are.
    Keep,
}

impl Transform {
    pub fn select(label: ClassificationLabel, has_text: bool) -> Self {
        match (label, has_text) {
            (ClassificationLabel::Blank, _) => Self::Discard,
            (ClassificationLabel::BlackAndWhite, true) => Self::BinarizeText,
            (ClassificationLabel::BlackAndWhite, false) => Self::BinarizePlain,
            (ClassificationLabel::Grayscale, _) => Self::FlattenGrayscale,
            (ClassificationLabel::Color, _) => Self::Keep,
        }
    }

    /// Apply to `page`. `Discard` consumes the page and yields `None`.
    #[instrument(skip(page), fields(width = page.width(), height = page.height()))]
    pub fn apply(self, page: PageImage) -> Option<PageImage> {
        let processor = ImageProcessor::from_dynamic(page.image.clone());
        let image = match self {
            Self::Discard => return None,
            Self::Keep => return Some(page),
            Self::BinarizeText => processor
                .auto_level()
                .unsharp(UNSHARP_SIGMA, UNSHARP_AMOUNT, UNSHARP_THRESHOLD)
                .threshold_otsu(),
            Self::BinarizePlain => processor
                .brightness_contrast(0.0, CONTRAST_BOOST)
                .threshold_kapur(),
            Self::FlattenGrayscale => processor
                .brightness_contrast(0.0, CONTRAST_BOOST)
                .whiten_near_white(NEAR_WHITE_FUZZ)
                .linear_grayscale(),
        };
        debug!(transform = ?self, "Transform applied");
        Some(page.with_image(image.into_dynamic()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn page() -> PageImage {
        let mut rgb = RgbImage::from_pixel(60, 60, Rgb([230, 230, 230]));
        for x in 10..50 {
            rgb.put_pixel(x, 30, Rgb([30, 30, 30]));
        }
        PageImage::new(DynamicImage::ImageRgb8(rgb), 300)
    }

    #[test]
    fn selection_table() {
        use ClassificationLabel::*;
        assert_eq!(Transform::select(Blank, true), Transform::Discard);
        assert_eq!(Transform::select(BlackAndWhite, true), Transform::BinarizeText);
        assert_eq!(Transform::select(BlackAndWhite, false), Transform::BinarizePlain);
        assert_eq!(Transform::select(Grayscale, false), Transform::FlattenGrayscale);
        assert_eq!(Transform::select(Color, true), Transform::Keep);
    }

    #[test]
    fn discard_drops_page() {
        assert!(Transform::Discard.apply(page()).is_none());
    }

    #[test]
    fn binarize_paths_produce_two_levels() {
        for transform in [Transform::BinarizeText, Transform::BinarizePlain] {
            let out = transform.apply(page()).expect("kept");
            let gray = out.image.as_luma8().expect("gray output");
            assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
            assert_eq!(gray.get_pixel(5, 5).0[0], 255);
            assert_eq!(gray.get_pixel(20, 30).0[0], 0);
        }
    }

    #[test]
    fn flatten_grayscale_whitens_paper() {
        let out = Transform::FlattenGrayscale.apply(page()).expect("kept");
        let gray = out.image.as_luma8().expect("gray output");
        assert_eq!(gray.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn colour_is_untouched() {
        let original = page();
        let raw = original.image.to_rgb8().into_raw();
        let out = Transform::Keep.apply(original).expect("kept");
        assert_eq!(out.image.to_rgb8().into_raw(), raw);
    }
}
