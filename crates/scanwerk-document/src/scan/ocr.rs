// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR engine contract and the `tesseract` command-line backend.
//
// The engine is an owned resource acquired at construction and released on
// drop; the pipeline borrows it. Scratch files live in a private temporary
// directory that disappears with the engine.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use image::DynamicImage;
use scanwerk_core::Orientation;
use scanwerk_core::config::OcrSettings;
use scanwerk_core::error::{Result, ScanwerkError};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

/// Capabilities the pipeline needs from an OCR engine.
pub trait OcrEngine {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Rotation the page content currently has relative to upright.
    fn detect_orientation(&self, image: &DynamicImage) -> Result<Orientation>;

    /// Recognised text of one bitmap.
    fn extract_text(&self, image: &DynamicImage) -> Result<String>;

    /// Render `pages` (image files, in order, scanned at `density` dpi) into a
    /// text-layer PDF at `<output_base>.pdf` within `budget`. Returns the
    /// written path.
    fn render_document(
        &self,
        pages: &[PathBuf],
        density: u32,
        output_base: &Path,
        budget: Duration,
    ) -> Result<PathBuf>;
}

/// Poll interval while waiting on a bounded child process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `command` to completion, killing it once `budget` elapses.
pub fn run_with_deadline(mut command: Command, budget: Duration) -> Result<()> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let started = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return if status.success() {
                Ok(())
            } else {
                Err(ScanwerkError::OcrError(format!("renderer exited with {status}")))
            };
        }
        if started.elapsed() >= budget {
            warn!(budget_ms = budget.as_millis() as u64, "Renderer over budget; killing it");
            if let Err(err) = child.kill() {
                debug!(%err, "Renderer already gone");
            }
            let _ = child.wait();
            return Err(ScanwerkError::RenderTimeout {
                budget_secs: budget.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Parse `tesseract --psm 0` output for `Orientation in degrees: N`.
pub fn parse_osd(output: &str) -> Option<Orientation> {
    output.lines().find_map(|line| {
        let value = line.trim().strip_prefix("Orientation in degrees:")?;
        Orientation::from_degrees(value.trim().parse().ok()?)
    })
}

/// OCR through the `tesseract` executable.
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    scratch: TempDir,
}

impl TesseractEngine {
    /// Probe the binary and create the scratch directory.
    #[instrument(skip_all, fields(binary = %settings.tesseract_path.display()))]
    pub fn new(settings: &OcrSettings) -> Result<Self> {
        let probe = Command::new(&settings.tesseract_path).arg("--version").output();
        match probe {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!(version = version.lines().next().unwrap_or_default(), "tesseract available");
            }
            Ok(output) => {
                return Err(ScanwerkError::OcrUnavailable(format!(
                    "tesseract --version failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanwerkError::OcrUnavailable(
                    "tesseract not found (install tesseract-ocr)".into(),
                ));
            }
            Err(err) => return Err(ScanwerkError::Io(err)),
        }

        Ok(Self {
            binary: settings.tesseract_path.clone(),
            language: settings.language.clone(),
            scratch: TempDir::new()?,
        })
    }

    /// Write `image` to the scratch directory for the child process.
    fn stage(&self, image: &DynamicImage, name: &str) -> Result<PathBuf> {
        let path = self.scratch.path().join(name);
        image
            .save(&path)
            .map_err(|err| ScanwerkError::OcrError(format!("failed to stage bitmap: {err}")))?;
        Ok(path)
    }

    /// Staged PNGs carry no resolution, so the page density is passed with
    /// `--dpi` to keep rendered pages at their scanned size.
    fn render_command(&self, list: &Path, output_base: &Path, density: u32) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(list)
            .arg(output_base)
            .args(["-l", &self.language])
            .args(["--dpi", &density.to_string()])
            .arg("pdf");
        command
    }

    fn run_to_stdout(&self, input: &Path, extra: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg(input)
            .arg("stdout")
            .args(["-l", &self.language])
            .args(extra)
            .output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ScanwerkError::OcrError(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn detect_orientation(&self, image: &DynamicImage) -> Result<Orientation> {
        let path = self.stage(image, "osd.png")?;
        let output = self.run_to_stdout(&path, &["--psm", "0"])?;
        parse_osd(&output).ok_or_else(|| ScanwerkError::OcrError("no orientation in OSD output".into()))
    }

    fn extract_text(&self, image: &DynamicImage) -> Result<String> {
        let path = self.stage(image, "page.png")?;
        self.run_to_stdout(&path, &[])
    }

    #[instrument(skip(self, pages), fields(pages = pages.len()))]
    fn render_document(
        &self,
        pages: &[PathBuf],
        density: u32,
        output_base: &Path,
        budget: Duration,
    ) -> Result<PathBuf> {
        let list = self.scratch.path().join("pages.txt");
        let listing: String = pages
            .iter()
            .map(|p| format!("{}\n", p.display()))
            .collect();
        std::fs::write(&list, listing)?;

        run_with_deadline(self.render_command(&list, output_base, density), budget)?;

        let mut rendered = output_base.as_os_str().to_owned();
        rendered.push(".pdf");
        let rendered = PathBuf::from(rendered);
        if !rendered.exists() {
            return Err(ScanwerkError::OcrError(format!(
                "renderer produced no {}",
                rendered.display()
            )));
        }
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_osd_orientation() {
        let osd = "Page number: 0\nOrientation in degrees: 270\nRotate: 90\nOrientation confidence: 4.2\n";
        assert_eq!(parse_osd(osd), Some(Orientation::Rotated270));
    }

    #[test]
    fn osd_without_orientation_is_none() {
        assert_eq!(parse_osd("Too few characters. Skipping this page\n"), None);
        assert_eq!(parse_osd("Orientation in degrees: 45\n"), None);
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let settings = OcrSettings {
            tesseract_path: PathBuf::from("/nonexistent/tesseract-binary"),
            ..OcrSettings::default()
        };
        assert!(matches!(
            TesseractEngine::new(&settings),
            Err(ScanwerkError::OcrUnavailable(_))
        ));
    }

    #[test]
    fn render_passes_page_density() {
        let engine = TesseractEngine {
            binary: PathBuf::from("tesseract"),
            language: "deu".into(),
            scratch: TempDir::new().expect("scratch"),
        };
        let command = engine.render_command(Path::new("pages.txt"), Path::new("out/combined"), 150);
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["pages.txt", "out/combined", "-l", "deu", "--dpi", "150", "pdf"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn deadline_kills_slow_child() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let started = Instant::now();
        let result = run_with_deadline(command, Duration::from_millis(100));
        assert!(matches!(result, Err(ScanwerkError::RenderTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn deadline_passes_fast_child() {
        let command = Command::new("true");
        assert!(run_with_deadline(command, Duration::from_secs(5)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn failing_child_is_an_error() {
        let command = Command::new("false");
        assert!(matches!(
            run_with_deadline(command, Duration::from_secs(5)),
            Err(ScanwerkError::OcrError(_))
        ));
    }
}
