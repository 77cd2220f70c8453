// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page digestion stages: correction, classification, transform, and
// orientation/OCR, plus the OCR engines they drive.

pub mod classify;
pub mod correct;
pub mod dump;
pub mod ocr;
pub mod orient;
pub mod transform;

#[cfg(feature = "ocr")]
pub mod ocrs_engine;

pub use classify::{Classifier, has_text};
pub use correct::{CorrectionReport, Corrector};
pub use dump::DebugDump;
pub use ocr::{OcrEngine, TesseractEngine};
pub use orient::orient_and_collect;
pub use transform::Transform;

#[cfg(feature = "ocr")]
pub use ocrs_engine::{OcrsEngine, OcrsModels};
