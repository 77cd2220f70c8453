// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — image-only multi-page documents using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::Path;

use image::DynamicImage;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument};

use crate::page::PageImage;

/// Builds a PDF with one full-bleed page per scanned image.
///
/// Each page is sized from the image's pixel dimensions and density, so a
/// 2550x3300 scan at 300 dpi becomes a US Letter page. Images are not scaled
/// and no margins are added.
pub struct PdfWriter {
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self { title: None }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Create an image-only PDF, one page per entry, in order.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn create_from_pages(&self, pages: &[PageImage]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(ScanwerkError::NoPages);
        }
        let title = self.title.as_deref().unwrap_or("Scanwerk Document");
        info!(title, pages = pages.len(), "Creating image PDF");

        let mut doc = PdfDocument::new(title);
        let mut pdf_pages = Vec::with_capacity(pages.len());

        for (index, page) in pages.iter().enumerate() {
            let dpi = page.density.max(1) as f32;
            let raw = raw_image(&page.image);
            let xobject_id = doc.add_image(&raw);

            let width = Mm(page.width() as f32 / dpi * 25.4);
            let height = Mm(page.height() as f32 / dpi * 25.4);

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    scale_x: None,
                    scale_y: None,
                    dpi: Some(dpi),
                    rotate: None,
                },
            }];
            debug!(index, width_mm = width.0, height_mm = height.0, "Page placed");
            pdf_pages.push(PdfPage::new(width, height, ops));
        }

        doc.with_pages(pdf_pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }
        Ok(output)
    }

    /// Create an image-only PDF and write it directly to a file.
    pub fn write_pages_to_file(&self, pages: &[PageImage], path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.create_from_pages(pages)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote image PDF to {}", path.as_ref().display());
        Ok(())
    }
}

/// Gray pages stay single-channel; everything else is embedded as RGB8.
fn raw_image(image: &DynamicImage) -> RawImage {
    let (width, height) = (image.width() as usize, image.height() as usize);
    match image {
        DynamicImage::ImageLuma8(gray) => RawImage {
            pixels: RawImageData::U8(gray.as_raw().clone()),
            width,
            height,
            data_format: RawImageFormat::R8,
            tag: Vec::new(),
        },
        other => RawImage {
            pixels: RawImageData::U8(other.to_rgb8().into_raw()),
            width,
            height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::reader::PdfReader;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn pages() -> Vec<PageImage> {
        vec![
            PageImage::new(
                DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 600, Rgb([200, 10, 10]))),
                100,
            ),
            PageImage::new(
                DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 100, Luma([128]))),
                100,
            ),
        ]
    }

    #[test]
    fn one_pdf_page_per_image() {
        let bytes = PdfWriter::new().create_from_pages(&pages()).expect("pdf");
        let reader = PdfReader::from_bytes(&bytes).expect("readable");
        assert_eq!(reader.page_count(), 2);
        assert!(!reader.has_text_layer());
    }

    #[test]
    fn page_size_follows_density() {
        let bytes = PdfWriter::new().create_from_pages(&pages()).expect("pdf");
        let sizes = PdfReader::from_bytes(&bytes).expect("readable").page_sizes();
        // 300x600 px at 100 dpi is 3x6 inches, 216x432 pt.
        let (w, h) = sizes[0];
        assert!((w - 216.0).abs() < 1.0, "width {w}");
        assert!((h - 432.0).abs() < 1.0, "height {h}");
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(matches!(
            PdfWriter::new().create_from_pages(&[]),
            Err(ScanwerkError::NoPages)
        ));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.pdf");
        PdfWriter::new()
            .write_pages_to_file(&pages(), &path)
            .expect("write");
        assert_eq!(PdfReader::open(&path).expect("open").page_count(), 2);
    }
}
