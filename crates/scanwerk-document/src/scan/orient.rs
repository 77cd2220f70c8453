// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orientation/OCR stage: turn the page upright, read it, and add both to the
// document.

use image::Rgb;
use scanwerk_core::Orientation;
use tracing::{debug, instrument, warn};

use crate::image::processor::ImageProcessor;
use crate::page::{DocumentAccumulator, PageImage};
use crate::scan::ocr::OcrEngine;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Detect orientation, rotate page and OCR bitmap upright, extract text, and
/// append page and text to `document`. Detection failure means upright;
/// extraction failure means no text. Neither stops the run.
#[instrument(skip(page, ocr, document), fields(engine = ocr.name()))]
pub fn orient_and_collect(
    index: usize,
    page: PageImage,
    ocr: &dyn OcrEngine,
    document: &mut DocumentAccumulator,
) -> Orientation {
    let bitmap = page.image.clone();

    let orientation = ocr.detect_orientation(&bitmap).unwrap_or_else(|err| {
        warn!(page = index, %err, "Orientation detection failed; assuming upright");
        Orientation::Upright
    });
    let turn = orientation.correction_degrees() as f64;
    debug!(page = index, detected = orientation.degrees(), turn, "Orientation");

    let image = ImageProcessor::from_dynamic(page.image.clone())
        .rotate(turn, WHITE)
        .into_dynamic();
    let page = page.with_image(image);

    let bitmap = ImageProcessor::from_dynamic(bitmap).rotate(turn, WHITE).into_dynamic();
    let text = ocr.extract_text(&bitmap).unwrap_or_else(|err| {
        warn!(page = index, %err, "Text extraction failed; page has no text");
        String::new()
    });

    document.append_text(&text);
    document.push_page(page);
    orientation
}
