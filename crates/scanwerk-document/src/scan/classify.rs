// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Classification stage. Every test works on a disposable snapshot; the page
// under test is never mutated.

use scanwerk_core::ClassificationLabel;
use scanwerk_core::config::ClassificationConfig;
use tracing::{debug, instrument, warn};

use crate::image::processor::ImageProcessor;
use crate::image::stats::{ChannelStats, saturation_channel};
use crate::page::PageImage;
use crate::scan::ocr::OcrEngine;

pub struct Classifier {
    config: ClassificationConfig,
}

impl Classifier {
    pub fn new(config: ClassificationConfig) -> Self {
        Self { config }
    }

    /// Mean whiteness (0..=1) after clipping everything above the white
    /// clip level to pure white.
    pub fn whiteness(&self, page: &PageImage) -> f64 {
        let clipped = ImageProcessor::from_dynamic(page.image.clone())
            .white_threshold(self.config.white_clip)
            .into_dynamic()
            .to_luma8();
        ChannelStats::of(&clipped).mean_fraction()
    }

    pub fn is_white(&self, page: &PageImage) -> bool {
        let whiteness = self.whiteness(page);
        debug!(whiteness, "Blank test");
        whiteness > self.config.blank_threshold
    }

    /// Solarize at 50% and compare mean and spread of the resulting luma.
    pub fn is_black_and_white(&self, page: &PageImage) -> bool {
        let solarized = ImageProcessor::from_dynamic(page.image.clone())
            .solarize(0.5)
            .into_dynamic()
            .to_luma8();
        let stats = ChannelStats::of(&solarized);
        debug!(mean = stats.mean, stddev = stats.stddev, "Black-and-white test");
        stats.mean < self.config.bw_mean_max
            && (stats.stddev - stats.mean).abs() < self.config.bw_spread_max
    }

    /// Mean and peak saturation, in percent, of a downscaled snapshot.
    pub fn is_grayscale(&self, page: &PageImage) -> bool {
        let small = ImageProcessor::from_dynamic(page.image.clone())
            .scale(self.config.saturation_analysis_scale)
            .into_dynamic()
            .to_rgb8();
        let stats = ChannelStats::of(&saturation_channel(&small));
        let mean_pct = stats.mean / 255.0 * 100.0;
        let peak_pct = stats.max as f64 / 255.0 * 100.0;
        debug!(mean_pct, peak_pct, "Grayscale test");
        mean_pct < self.config.grayscale_mean_max && peak_pct < self.config.grayscale_peak_max
    }

    /// Full decision: Blank, then BlackAndWhite, Grayscale, Color.
    #[instrument(skip_all, fields(width = page.width(), height = page.height()))]
    pub fn classify(&self, page: &PageImage) -> ClassificationLabel {
        if self.is_white(page) {
            return ClassificationLabel::Blank;
        }
        self.classify_content(page)
    }

    /// Decision for a page already known to be kept. BlackAndWhite must be
    /// tested on the full-colour snapshot before Grayscale.
    pub fn classify_content(&self, page: &PageImage) -> ClassificationLabel {
        let label = if self.is_black_and_white(page) {
            ClassificationLabel::BlackAndWhite
        } else if self.is_grayscale(page) {
            ClassificationLabel::Grayscale
        } else {
            ClassificationLabel::Color
        };
        debug!(%label, "Page classified");
        label
    }
}

/// Whether the OCR engine reads any text from a throwaway copy of the page.
/// Engine failures count as "no text".
pub fn has_text(page: &PageImage, ocr: &dyn OcrEngine) -> bool {
    let bitmap = page.image.clone();
    match ocr.extract_text(&bitmap) {
        Ok(text) => !text.trim().is_empty(),
        Err(err) => {
            warn!(%err, "Text probe failed; treating page as text-free");
            false
        }
    }
}
