// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scan pipeline.

use serde::{Deserialize, Serialize};

/// Colour class assigned to a corrected page.
///
/// Computed fresh for every page and never cached. `Blank` pages are dropped
/// unless the operator keeps them at the blank-page gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationLabel {
    Blank,
    BlackAndWhite,
    Grayscale,
    Color,
}

impl std::fmt::Display for ClassificationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Blank => "blank",
            Self::BlackAndWhite => "black-and-white",
            Self::Grayscale => "grayscale",
            Self::Color => "color",
        };
        f.write_str(name)
    }
}

/// Coarse lifecycle of one scan run, used for error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Pages are still arriving from the scanner.
    Scanning,
    /// The scanner is done; remaining queued pages are being digested.
    Processing,
    /// Pages are being combined into the output document.
    Assembling,
    /// The output file has been delivered.
    Done,
    /// The run stopped with a fatal error.
    Failed(String),
}

/// An axis-aligned crop rectangle in page pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropGeometry {
    /// Geometry covering a whole `width` x `height` canvas.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether this rectangle lies entirely inside a `width` x `height` canvas.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x.saturating_add(self.width) <= width && self.y.saturating_add(self.height) <= height
    }

    /// Translate by a non-negative offset.
    pub fn offset(self, dx: u32, dy: u32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

impl std::fmt::Display for CropGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Result of one geometric correction step. Consumed once, never retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrectionResult {
    /// Rotate by this many degrees (positive is clockwise).
    Rotate(f64),
    /// Crop the page to this rectangle.
    Crop(CropGeometry),
    /// The step found nothing to change.
    Unchanged,
}

/// Page orientation reported by the OCR engine, as the clockwise rotation
/// the page content currently has relative to upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Upright,
    Rotated90,
    Rotated180,
    Rotated270,
}

impl Orientation {
    /// Parse a detected angle; anything other than a quarter turn is `None`.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Upright),
            90 => Some(Self::Rotated90),
            180 => Some(Self::Rotated180),
            270 => Some(Self::Rotated270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Upright => 0,
            Self::Rotated90 => 90,
            Self::Rotated180 => 180,
            Self::Rotated270 => 270,
        }
    }

    /// Clockwise rotation that presents the page upright: `360 - detected`.
    pub fn correction_degrees(self) -> u32 {
        (360 - self.degrees()) % 360
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Pages received from the scanner.
    pub pages_scanned: usize,
    /// Pages kept in the output document.
    pub pages_kept: usize,
    /// Whether the output carries an OCR text layer.
    pub text_layer: bool,
    /// Final location of the document.
    pub output: std::path::PathBuf,
}
