// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. One explicit struct handed to the pipeline
// constructor; every tuning constant of the correction and classification
// stages lives here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanwerkError};

/// Complete configuration for one scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scanner: ScannerConfig,
    pub correction: CorrectionConfig,
    pub classification: ClassificationConfig,
    pub ocr: OcrSettings,
    pub output: OutputConfig,
    /// Maximum number of acquired pages waiting for the consumer.
    pub queue_capacity: usize,
    /// Write a PNG snapshot after every stage into this directory.
    pub debug_dump_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            correction: CorrectionConfig::default(),
            classification: ClassificationConfig::default(),
            ocr: OcrSettings::default(),
            output: OutputConfig::default(),
            queue_capacity: 4,
            debug_dump_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(ScanwerkError::Config("queue_capacity must be at least 1".into()));
        }
        if !(50..=600).contains(&self.scanner.resolution) {
            return Err(ScanwerkError::Config(format!(
                "resolution {} outside [50, 600] dpi",
                self.scanner.resolution
            )));
        }
        if self.correction.shadow_trim_attempts == 0 {
            return Err(ScanwerkError::Config(
                "shadow_trim_attempts must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("skew_contrast_threshold", self.correction.skew_contrast_threshold),
            ("edge_fuzz", self.correction.edge_fuzz),
            ("white_clip", self.classification.white_clip),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScanwerkError::Config(format!("{name} {value} outside [0, 1]")));
            }
        }
        for (name, value) in [
            ("gamma", self.correction.gamma),
            ("shadow_blur_sigma", self.correction.shadow_blur_sigma),
            ("skew_step", self.correction.skew_step),
            ("skew_analysis_scale", self.correction.skew_analysis_scale),
            ("saturation_analysis_scale", self.classification.saturation_analysis_scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ScanwerkError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// A typed scanner option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Fixed(f64),
    Str(String),
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("yes"),
            Self::Bool(false) => f.write_str("no"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Fixed(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// A named option to set on the scanner before acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerOption {
    pub name: String,
    pub value: OptionValue,
}

impl ScannerOption {
    pub fn new(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// SANE device name. `None` picks the first device typed as a scanner.
    pub device: Option<String>,
    /// Scan resolution in dpi; also recorded as the page pixel density.
    pub resolution: u32,
    /// Options applied when the device offers them.
    pub options: Vec<ScannerOption>,
    /// The `scanimage` executable.
    pub scanimage_path: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            device: None,
            resolution: 300,
            options: vec![
                ScannerOption::new("source", OptionValue::Str("ADF Duplex".into())),
                ScannerOption::new("mode", OptionValue::Str("Color".into())),
                // Oversized extents; the backend clamps them to the feeder maximum.
                ScannerOption::new("page-height", OptionValue::Fixed(10_000.0)),
                ScannerOption::new("page-width", OptionValue::Fixed(10_000.0)),
                ScannerOption::new("ald", OptionValue::Bool(false)),
            ],
            scanimage_path: PathBuf::from("scanimage"),
        }
    }
}

impl ScannerConfig {
    /// Configured options plus the resolution, in the order they are applied.
    pub fn effective_options(&self) -> Vec<ScannerOption> {
        let mut options: Vec<ScannerOption> = self
            .options
            .iter()
            .filter(|opt| opt.name != "resolution")
            .cloned()
            .collect();
        options.push(ScannerOption::new(
            "resolution",
            OptionValue::Int(self.resolution as i32),
        ));
        options
    }
}

// ---------------------------------------------------------------------------
// Correction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Background colour is sampled at (offset, offset), away from border artifacts.
    pub background_sample_offset: u32,
    /// Contrast threshold for skew estimation, as a fraction of the dynamic range.
    pub skew_contrast_threshold: f32,
    /// Largest skew angle searched, in degrees either side of zero.
    pub skew_max_angle: f32,
    /// Angular resolution of the skew search, in degrees.
    pub skew_step: f32,
    /// Downscale factor applied before skew estimation.
    pub skew_analysis_scale: f32,
    /// Colour-fuzz tolerance for the edge trim, as a fraction of the dynamic range.
    pub edge_fuzz: f32,
    /// Maximum trim passes while digging for a shadow band.
    pub shadow_trim_attempts: u32,
    /// A shadow trim that leaves either side shorter than this is rejected.
    /// Stated in pixels at [`TRIM_REFERENCE_DPI`]; see [`Self::min_trimmed_at`].
    pub min_trimmed_dimension: u32,
    /// Blur applied to the shadow silhouette before thresholding.
    pub shadow_blur_sigma: f32,
    /// Gamma applied once geometry is settled.
    pub gamma: f32,
}

/// Density at which `min_trimmed_dimension` is expressed.
pub const TRIM_REFERENCE_DPI: u32 = 300;

impl CorrectionConfig {
    /// The minimum trimmed side in pixels for a page scanned at `density` dpi.
    pub fn min_trimmed_at(&self, density: u32) -> u32 {
        let scaled = u64::from(self.min_trimmed_dimension) * u64::from(density) / u64::from(TRIM_REFERENCE_DPI);
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            background_sample_offset: 5,
            skew_contrast_threshold: 0.8,
            skew_max_angle: 5.0,
            skew_step: 0.1,
            skew_analysis_scale: 0.1,
            edge_fuzz: 0.1,
            shadow_trim_attempts: 10,
            min_trimmed_dimension: 500,
            shadow_blur_sigma: 5.0,
            gamma: 2.2,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classification thresholds. Statistics are on the 0-255 display scale;
/// saturation thresholds are percentages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Channel values above this fraction are clipped to white before the blank test.
    pub white_clip: f32,
    /// Mean whiteness above which a page is blank.
    pub blank_threshold: f64,
    /// Solarized luma mean below which a page may be black-and-white.
    pub bw_mean_max: f64,
    /// Allowed |stddev - mean| of the solarized luma for black-and-white.
    pub bw_spread_max: f64,
    /// Mean saturation (percent) below which a page may be grayscale.
    pub grayscale_mean_max: f64,
    /// Peak saturation (percent) below which a page may be grayscale.
    pub grayscale_peak_max: f64,
    /// Downscale factor applied before the saturation statistics.
    pub saturation_analysis_scale: f32,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            white_clip: 0.75,
            blank_threshold: 0.99,
            bw_mean_max: 255.0 / 6.0,
            bw_spread_max: 15.5,
            grayscale_mean_max: 5.0,
            grayscale_peak_max: 10.0,
            saturation_analysis_scale: 0.02,
        }
    }
}

// ---------------------------------------------------------------------------
// OCR
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackendKind {
    /// The `tesseract` command-line engine.
    Tesseract,
    /// The pure-Rust `ocrs` engine (requires the `ocr` feature).
    Ocrs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub backend: OcrBackendKind,
    /// Recognition language (tesseract language code).
    pub language: String,
    pub tesseract_path: PathBuf,
    /// Text-layer render budget per kept page, in seconds.
    pub render_budget_per_page_secs: u64,
    /// Directory holding the `ocrs` detection and recognition models.
    pub model_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackendKind::Tesseract,
            language: "eng".into(),
            tesseract_path: PathBuf::from("tesseract"),
            render_budget_per_page_secs: 10,
            model_dir: None,
        }
    }
}

impl OcrSettings {
    /// Total render budget for a document of `pages` pages.
    pub fn render_budget(&self, pages: usize) -> std::time::Duration {
        std::time::Duration::from_secs(self.render_budget_per_page_secs * pages.max(1) as u64)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination file. With `auto_name`, its file name is a token template.
    pub destination: PathBuf,
    /// Substitute `%o`, `%d`, `%s`, `%t`, `%a` from the recognised text.
    pub auto_name: bool,
    /// Ask the operator before discarding a page that looks blank.
    pub interactive_blank_gate: bool,
    /// External organization guesser: text on stdin, organization on stdout.
    pub organization_command: Option<Vec<String>>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            auto_name: false,
            interactive_blank_gate: false,
            organization_command: None,
        }
    }
}

/// `<cwd>/<local timestamp>.pdf`, the name used when no outfile is given.
pub fn default_destination() -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string();
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(format!("{stamp}.pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.correction.shadow_trim_attempts, 10);
        assert!((config.classification.bw_mean_max - 42.5).abs() < 1e-9);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let json = r#"{ "scanner": { "resolution": 150 }, "queue_capacity": 2 }"#;
        let config: PipelineConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.scanner.resolution, 150);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.ocr.language, "eng");
        assert!((config.correction.gamma - 2.2).abs() < 1e-6);
    }

    #[test]
    fn option_values_round_trip_tagged() {
        let opt = ScannerOption::new("source", OptionValue::Str("ADF Duplex".into()));
        let json = serde_json::to_string(&opt).expect("serialize");
        assert!(json.contains(r#""type":"str""#));
        let back: ScannerOption = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, opt);
    }

    #[test]
    fn effective_options_carry_resolution_once() {
        let mut scanner = ScannerConfig::default();
        scanner.resolution = 200;
        scanner
            .options
            .push(ScannerOption::new("resolution", OptionValue::Int(600)));
        let resolutions: Vec<_> = scanner
            .effective_options()
            .into_iter()
            .filter(|o| o.name == "resolution")
            .collect();
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].value, OptionValue::Int(200));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = PipelineConfig::default();
        config.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.scanner.resolution = 1200;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.correction.edge_fuzz = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blur_and_step_sizes_must_be_positive() {
        let mut config = PipelineConfig::default();
        config.correction.shadow_blur_sigma = 0.0;
        assert!(matches!(config.validate(), Err(ScanwerkError::Config(msg)) if msg.contains("shadow_blur_sigma")));

        let mut config = PipelineConfig::default();
        config.correction.skew_step = -0.1;
        assert!(config.validate().is_err());

        let json = r#"{ "correction": { "shadow_blur_sigma": 0.0 } }"#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, json).expect("write");
        assert!(matches!(PipelineConfig::load(&path), Err(ScanwerkError::Config(_))));
    }

    #[test]
    fn minimum_trim_follows_resolution() {
        let correction = CorrectionConfig::default();
        assert_eq!(correction.min_trimmed_at(300), 500);
        assert_eq!(correction.min_trimmed_at(150), 250);
        assert_eq!(correction.min_trimmed_at(50), 83);
        assert_eq!(correction.min_trimmed_at(600), 1000);
    }

    #[test]
    fn option_value_display_matches_scanimage_syntax() {
        assert_eq!(OptionValue::Bool(true).to_string(), "yes");
        assert_eq!(OptionValue::Int(300).to_string(), "300");
        assert_eq!(OptionValue::Str("Color".into()).to_string(), "Color");
    }

    #[test]
    fn render_budget_scales_with_pages() {
        let ocr = OcrSettings::default();
        assert_eq!(ocr.render_budget(3).as_secs(), 30);
        assert_eq!(ocr.render_budget(0).as_secs(), 10);
    }
}
