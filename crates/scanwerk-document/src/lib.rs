// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document — Page processing for the Scanwerk scan pipeline.
//
// Provides the page raster and document accumulator, pixel kernels, the
// per-page stages (correction, classification, transform, orientation/OCR),
// PDF rendering and inspection, output naming, and delivery.

pub mod image;
pub mod naming;
pub mod output;
pub mod page;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `scanwerk_document::PdfWriter` etc.
pub use crate::image::processor::ImageProcessor;
pub use naming::{CommandGuesser, FilenameTemplate, OrganizationGuesser, resolve_destination};
pub use output::{Delivered, deliver_with};
pub use page::{DocumentAccumulator, PageImage};
pub use pdf::reader::PdfReader;
pub use pdf::writer::PdfWriter;
pub use scan::{
    Classifier, CorrectionReport, Corrector, DebugDump, OcrEngine, TesseractEngine, Transform,
    has_text, orient_and_collect,
};

#[cfg(feature = "ocr")]
pub use scan::{OcrsEngine, OcrsModels};
