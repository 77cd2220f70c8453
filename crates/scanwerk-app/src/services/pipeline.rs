// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline orchestration.
//
// One producer thread runs the acquisition loop into the page queue; the
// calling thread consumes pages in scan order, digests each one, and then
// assembles the kept pages into the output PDF. The only state shared between
// the two threads is the queue and its completion signal.

use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{PipelineConfig, PipelineStatus, RunReport};
use scanwerk_document::{
    DocumentAccumulator, OcrEngine, OrganizationGuesser, PageImage, PdfReader, PdfWriter,
    deliver_with, resolve_destination,
};
use scanwerk_scan::{PageQueue, ScannerSource, acquire};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use super::digest::{PageDigester, PageOutcome};
use super::gate::BlankGate;

/// Aborts the queue if the consumer unwinds, releasing a producer blocked on
/// a full queue so the scope can join.
struct AbortOnUnwind<'q>(&'q PageQueue<PageImage>);

impl Drop for AbortOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

/// Largest accepted difference between a rendered page and its scan, in points.
const PAGE_SIZE_TOLERANCE_PT: f32 = 1.0;

/// Moves the finished file into place.
pub trait FileRelocation {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// The local filesystem.
pub struct LocalFs;

impl FileRelocation for LocalFs {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::copy(from, to).map(|_| ())
    }
}

pub struct Pipeline<'a> {
    config: PipelineConfig,
    ocr: &'a dyn OcrEngine,
    guesser: Option<&'a dyn OrganizationGuesser>,
    relocation: &'a dyn FileRelocation,
    status: PipelineStatus,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, ocr: &'a dyn OcrEngine) -> Self {
        Self {
            config,
            ocr,
            guesser: None,
            relocation: &LocalFs,
            status: PipelineStatus::Scanning,
        }
    }

    pub fn with_guesser(mut self, guesser: &'a dyn OrganizationGuesser) -> Self {
        self.guesser = Some(guesser);
        self
    }

    #[cfg(test)]
    pub fn with_relocation(mut self, relocation: &'a dyn FileRelocation) -> Self {
        self.relocation = relocation;
        self
    }

    pub fn status(&self) -> &PipelineStatus {
        &self.status
    }

    fn set_status(&mut self, status: PipelineStatus) {
        info!(?status, "Pipeline status");
        self.status = status;
    }

    /// Scan, digest, and assemble one document.
    #[instrument(skip_all, fields(destination = %self.config.output.destination.display()))]
    pub fn run(&mut self, source: &mut dyn ScannerSource, gate: &mut dyn BlankGate) -> Result<RunReport> {
        let started = Instant::now();
        self.set_status(PipelineStatus::Scanning);

        let result = self
            .collect(source, gate)
            .and_then(|(document, scanned)| self.assemble(document, scanned));

        match &result {
            Ok(report) => {
                self.set_status(PipelineStatus::Done);
                debug!(elapsed_ms = started.elapsed().as_millis() as u64, ?report, "Run finished");
            }
            Err(err) => self.set_status(PipelineStatus::Failed(err.to_string())),
        }
        result
    }

    /// Producer/consumer phase. Returns the kept pages and the number scanned.
    fn collect(
        &mut self,
        source: &mut dyn ScannerSource,
        gate: &mut dyn BlankGate,
    ) -> Result<(DocumentAccumulator, usize)> {
        let queue: PageQueue<PageImage> = PageQueue::new(self.config.queue_capacity);
        let mut digester = PageDigester::new(&self.config, self.ocr, gate);
        let mut document = DocumentAccumulator::new();

        let acquired = thread::scope(|scope| {
            let producer = scope.spawn(|| acquire(&mut *source, &queue));
            let _abort = AbortOnUnwind(&queue);

            let mut index = 0;
            while let Some(page) = queue.pop_wait() {
                if self.status == PipelineStatus::Scanning {
                    self.set_status(PipelineStatus::Processing);
                }
                println!("Digesting page {}", index + 1);
                debug!(page = index, backlog = queue.len(), "Page dequeued");
                match digester.digest(index, page, &mut document) {
                    PageOutcome::Kept {
                        label,
                        transform,
                        orientation,
                    } => debug!(page = index, %label, ?transform, ?orientation, "Page kept"),
                    PageOutcome::Discarded => println!("Page {} discarded", index + 1),
                }
                index += 1;
                if queue.is_empty() && !queue.is_complete() {
                    debug!("Waiting for the scanner");
                }
            }
            debug!(
                digested = index,
                complete = queue.is_complete(),
                aborted = queue.is_aborted(),
                "Consumer finished"
            );

            producer
                .join()
                .unwrap_or_else(|_| Err(ScanwerkError::Scanner("acquisition thread panicked".into())))
        })?;

        info!(scanned = acquired, kept = document.len(), "All pages digested");
        Ok((document, acquired))
    }

    /// Render and deliver. A failed or over-budget text-layer render falls back
    /// to an image-only PDF of the same pages.
    fn assemble(&mut self, document: DocumentAccumulator, scanned: usize) -> Result<RunReport> {
        self.set_status(PipelineStatus::Assembling);
        if document.is_empty() {
            return Err(ScanwerkError::NoPages);
        }
        let (pages, text) = document.into_parts();

        let staging = TempDir::new()?;
        let files = stage_pages(&pages, staging.path())?;

        let destination = if self.config.output.auto_name {
            resolve_destination(
                &self.config.output.destination,
                &text,
                self.guesser,
                Local::now().date_naive(),
            )
        } else {
            self.config.output.destination.clone()
        };
        info!(destination = %destination.display(), "Output name resolved");

        let budget = self.config.ocr.render_budget(pages.len());
        let base = staging.path().join("combined");
        let (staged, text_layer) = match self.render_text_layer(&pages, &files, &base, budget) {
            Ok(path) => (path, true),
            Err(err) => {
                warn!(%err, "Text-layer render failed; writing image-only PDF");
                let path = staging.path().join("image-only.pdf");
                let mut writer = PdfWriter::new();
                if let Some(stem) = destination.file_stem() {
                    writer.set_title(stem.to_string_lossy());
                }
                writer.write_pages_to_file(&pages, &path)?;
                (path, false)
            }
        };

        deliver_with(
            &staged,
            &destination,
            |from, to| self.relocation.rename(from, to),
            |from, to| self.relocation.copy(from, to),
        )?;
        println!("Document ready!");

        Ok(RunReport {
            pages_scanned: scanned,
            pages_kept: pages.len(),
            text_layer,
            output: destination,
        })
    }

    /// Text-layer render through the OCR engine, accepted only if it has
    /// exactly one page per staged image, each printed at the scan density.
    fn render_text_layer(
        &self,
        pages: &[PageImage],
        files: &[PathBuf],
        base: &Path,
        budget: Duration,
    ) -> Result<PathBuf> {
        let density = pages.first().map_or(0, |page| page.density);
        info!(
            engine = self.ocr.name(),
            density,
            budget_secs = budget.as_secs(),
            "Rendering text layer"
        );
        let rendered = self.ocr.render_document(files, density, base, budget)?;

        let reader = PdfReader::open(&rendered)?;
        let count = reader.page_count();
        if count != files.len() {
            return Err(ScanwerkError::PdfError(format!(
                "renderer produced {count} of {} pages",
                files.len()
            )));
        }
        let resized = reader
            .page_sizes()
            .iter()
            .zip(pages)
            .filter(|&(&(width, height), page)| {
                let (expected_width, expected_height) = page.size_points();
                (width - expected_width).abs() > PAGE_SIZE_TOLERANCE_PT
                    || (height - expected_height).abs() > PAGE_SIZE_TOLERANCE_PT
            })
            .count();
        if resized > 0 {
            return Err(ScanwerkError::PdfError(format!(
                "renderer resized {resized} of {count} pages away from {density} dpi"
            )));
        }
        if !reader.has_text_layer() {
            warn!("Rendered document carries no text");
        }
        Ok(rendered)
    }
}

/// Write each page as a numbered PNG for the renderer.
fn stage_pages(pages: &[PageImage], dir: &Path) -> Result<Vec<PathBuf>> {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let path = dir.join(format!("page-{:04}.png", i + 1));
            page.image
                .save(&path)
                .map_err(|err| ScanwerkError::ImageError(format!("failed to stage page {}: {err}", i + 1)))?;
            Ok(path)
        })
        .collect()
}
