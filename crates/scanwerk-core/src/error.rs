// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Acquisition errors --
    #[error("scanner error: {0}")]
    Scanner(String),

    #[error("no scanner found")]
    NoScanner,

    #[error("remaining bytes after reading page {page}")]
    TrailingBytes { page: usize },

    #[error("page queue closed")]
    QueueClosed,

    // -- Page processing errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR render exceeded its budget of {budget_secs}s")]
    RenderTimeout { budget_secs: u64 },

    // -- Assembly / output errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("too few pages to output a pdf")]
    NoPages,

    #[error("failed to move or copy {} to {}: {detail}", .from.display(), .to.display())]
    Delivery {
        from: PathBuf,
        to: PathBuf,
        detail: String,
    },

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
