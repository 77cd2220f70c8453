// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pure-Rust OCR backend using the `ocrs` crate, with neural network models
// executed via `rten`.
//
// # Feature Gate
//
// Only available when the `ocr` feature is enabled:
//
// ```toml
// scanwerk-document = { path = "crates/scanwerk-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The engine requires two model files:
//
// - **Detection model** (`text-detection.rten`) — locates text regions.
// - **Recognition model** (`text-recognition.rten`) — decodes characters.
//
// Running `ocrs-cli` once downloads them to `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is the default model directory.
//
// `ocrs` cannot produce a text-layer PDF, so documents read with this
// backend are always assembled image-only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{DynamicImage, Rgb};
use ocrs::{ImageSource, OcrEngine as OcrsInner, OcrEngineParams};
use rten::Model;
use scanwerk_core::Orientation;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument};

use crate::image::processor::ImageProcessor;
use crate::scan::ocr::OcrEngine;

/// Longest side of the bitmap used for orientation voting.
const ORIENTATION_PROBE_SIZE: u32 = 1024;

/// Default directory for cached OCR model files.
///
/// Follows the XDG Base Directory specification: `$XDG_CACHE_HOME/ocrs`, falling
/// back to `~/.cache/ocrs` when `XDG_CACHE_HOME` is unset.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Locations of the two model files.
#[derive(Debug, Clone)]
pub struct OcrsModels {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrsModels {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrsModels {
    /// Expects `dir` to contain `text-detection.rten` and `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Models from `dir`, or the default cache directory.
    pub fn from_optional_dir(dir: Option<&Path>) -> Self {
        dir.map(Self::from_dir).unwrap_or_default()
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<()> {
        for path in [&self.detection_model_path, &self.recognition_model_path] {
            if !path.exists() {
                return Err(ScanwerkError::OcrUnavailable(format!(
                    "model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// OCR engine backed by `ocrs`. Models load once at construction.
pub struct OcrsEngine {
    engine: OcrsInner,
}

impl OcrsEngine {
    /// Load both models. This is the expensive step; keep the engine for the
    /// whole run. `ocrs` and `rten` are very slow in debug builds.
    #[instrument(skip_all, fields(
        detection = %models.detection_model_path.display(),
        recognition = %models.recognition_model_path.display(),
    ))]
    pub fn new(models: OcrsModels) -> Result<Self> {
        models.validate()?;

        info!("Loading OCR detection model");
        let detection_model = Model::load_file(&models.detection_model_path).map_err(|err| {
            ScanwerkError::OcrUnavailable(format!(
                "failed to load detection model from {}: {}",
                models.detection_model_path.display(),
                err
            ))
        })?;

        info!("Loading OCR recognition model");
        let recognition_model =
            Model::load_file(&models.recognition_model_path).map_err(|err| {
                ScanwerkError::OcrUnavailable(format!(
                    "failed to load recognition model from {}: {}",
                    models.recognition_model_path.display(),
                    err
                ))
            })?;

        let engine = OcrsInner::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| ScanwerkError::OcrUnavailable(format!("failed to initialise OCR engine: {}", err)))?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            ScanwerkError::OcrError(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| ScanwerkError::OcrError(format!("OCR preprocessing failed: {}", err)))?;

        self.engine
            .get_text(&input)
            .map_err(|err| ScanwerkError::OcrError(format!("OCR text recognition failed: {}", err)))
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &str {
        "ocrs"
    }

    /// Recognise each quarter turn of a downscaled copy; the turn that reads
    /// the most alphanumeric characters is upright. Ties keep the page as is.
    #[instrument(skip_all)]
    fn detect_orientation(&self, image: &DynamicImage) -> Result<Orientation> {
        let longest = image.width().max(image.height()).max(1);
        let factor = (ORIENTATION_PROBE_SIZE as f32 / longest as f32).min(1.0);
        let probe = ImageProcessor::from_dynamic(image.clone())
            .scale(factor)
            .into_dynamic();

        let mut best = (0u32, 0usize);
        for turn in [0u32, 90, 180, 270] {
            let rotated = ImageProcessor::from_dynamic(probe.clone())
                .rotate(turn as f64, Rgb([255, 255, 255]))
                .into_dynamic();
            let score = self
                .recognize(&rotated)?
                .chars()
                .filter(|c| c.is_alphanumeric())
                .count();
            debug!(turn, score, "Orientation vote");
            if score > best.1 {
                best = (turn, score);
            }
        }

        // The winning turn is the correction; the detected orientation is its complement.
        let detected = (360 - best.0) % 360;
        Ok(Orientation::from_degrees(detected as i32).unwrap_or_default())
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn extract_text(&self, image: &DynamicImage) -> Result<String> {
        let text = self.recognize(image)?;
        debug!(lines = text.lines().count(), chars = text.len(), "OCR recognition complete");
        Ok(text)
    }

    fn render_document(
        &self,
        _pages: &[PathBuf],
        _density: u32,
        _output_base: &Path,
        _budget: Duration,
    ) -> Result<PathBuf> {
        Err(ScanwerkError::OcrUnavailable(
            "ocrs cannot render text-layer documents".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_from_dir() {
        let models = OcrsModels::from_dir("/tmp/my-models");
        assert_eq!(
            models.detection_model_path,
            PathBuf::from("/tmp/my-models/text-detection.rten")
        );
        assert_eq!(
            models.recognition_model_path,
            PathBuf::from("/tmp/my-models/text-recognition.rten")
        );
    }

    #[test]
    fn default_models_live_in_cache_dir() {
        let models = OcrsModels::default();
        assert!(models
            .detection_model_path
            .to_string_lossy()
            .ends_with(DETECTION_MODEL_FILENAME));
    }

    #[test]
    fn missing_models_are_unavailable() {
        let models = OcrsModels::from_dir("/nonexistent/path/ocr-models");
        assert!(matches!(
            models.validate(),
            Err(ScanwerkError::OcrUnavailable(_))
        ));
    }
}
