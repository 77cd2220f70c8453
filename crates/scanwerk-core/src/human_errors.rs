// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing error messages.
//
// Every technical error is mapped to a plain sentence plus what to do next.
// The CLI prints these on stdout before exiting with a failure status.

use crate::error::ScanwerkError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Running the scan again will probably work.
    Transient,
    /// The operator must do something first (load paper, plug in, fix a path).
    ActionRequired,
    /// Re-running with the same inputs will fail the same way.
    Permanent,
}

/// A readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Whether re-running the same command may succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n  {}", self.message, self.suggestion)
    }
}

/// Convert a `ScanwerkError` into a `HumanError`.
pub fn humanize_error(err: &ScanwerkError) -> HumanError {
    match err {
        // -- Acquisition --
        ScanwerkError::Scanner(detail) => humanize_scanner_error(detail),

        ScanwerkError::NoScanner => HumanError {
            message: "No scanner was found.".into(),
            suggestion: "Check the scanner is switched on and connected, then run `scanwerk --list-devices`.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::TrailingBytes { page } => HumanError {
            message: format!("The scanner sent more data than expected for page {page}."),
            suggestion: "The scan was stopped to avoid a corrupted document. Try scanning again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::QueueClosed => HumanError {
            message: "Scanning was cancelled.".into(),
            suggestion: "Page processing stopped early. See the earlier messages for the cause.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Page processing --
        ScanwerkError::ImageError(_) => HumanError {
            message: "A scanned page could not be processed.".into(),
            suggestion: "The image data may be damaged. Try scanning again at a different resolution.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::OcrError(_) => HumanError {
            message: "Text recognition failed.".into(),
            suggestion: "The document will not be searchable. Check the OCR engine is installed correctly.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::OcrUnavailable(detail) => HumanError {
            message: "The text recognition engine is not available.".into(),
            suggestion: format!("Install tesseract or configure the ocrs models. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::RenderTimeout { budget_secs } => HumanError {
            message: "Building the searchable document took too long.".into(),
            suggestion: format!(
                "An image-only document was written instead. Raise the per-page render budget (currently {budget_secs}s in total) to keep the text layer."
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Assembly / output --
        ScanwerkError::PdfError(_) => HumanError {
            message: "The PDF could not be written.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::NoPages => HumanError {
            message: "Too few pages to output a PDF.".into(),
            suggestion: "Every page looked blank. Check the paper is loaded face-down, or use --interactive to keep blank pages.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::Delivery { to, .. } => HumanError {
            message: "The finished PDF could not be saved.".into(),
            suggestion: format!(
                "Check that {} exists and is writable, and that the disk is not full.",
                to.parent().map(|p| p.display().to_string()).unwrap_or_default()
            ),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::IntegrityMismatch { .. } => HumanError {
            message: "The saved PDF does not match the one that was built.".into(),
            suggestion: "The copy was corrupted in transit. Check the destination disk and scan again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Configuration --
        ScanwerkError::Config(detail) => HumanError {
            message: "The configuration is invalid.".into(),
            suggestion: format!("Fix the setting and try again. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Storage --
        ScanwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "A file or program couldn't be found.".into(),
                    suggestion: "Check the paths in your command line and configuration.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Permission denied.".into(),
                    suggestion: "Check the permissions of the output directory and the scanner device.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        ScanwerkError::Serialization(_) => HumanError {
            message: "The configuration file could not be read.".into(),
            suggestion: "Check that it is valid JSON.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

/// Map scanner backend messages to readable ones.
fn humanize_scanner_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("jam") {
        HumanError {
            message: "Paper is stuck in the scanner.".into(),
            suggestion: "Clear the jam, reload the remaining pages and scan again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("cover") && lower.contains("open") {
        HumanError {
            message: "The scanner cover is open.".into(),
            suggestion: "Close the cover and scan again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("busy") {
        HumanError {
            message: "The scanner is busy.".into(),
            suggestion: "Another program may be using it. Wait a moment and try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else if lower.contains("access") || lower.contains("permission") {
        HumanError {
            message: "Access to the scanner was denied.".into(),
            suggestion: "Make sure your user is allowed to use the scanner (often the `scanner` group).".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else {
        HumanError {
            message: "The scanner reported a problem.".into(),
            suggestion: format!("Try again. If this keeps happening, power-cycle the scanner. (Detail: {detail})"),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}
