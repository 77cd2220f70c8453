// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page raster and the per-run document accumulator.

use image::{DynamicImage, Rgb};
use scanwerk_core::CropGeometry;

/// One scanned sheet: raster plus metadata.
///
/// Owned by exactly one stage at a time and moved between them. Analysis
/// stages work on snapshots and never mutate the canonical page.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub image: DynamicImage,
    /// Pixel density in dots per inch.
    pub density: u32,
    /// Background colour sampled during correction.
    pub background: Option<Rgb<u8>>,
}

impl PageImage {
    pub fn new(image: DynamicImage, density: u32) -> Self {
        Self {
            image,
            density,
            background: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Printed size in PDF points (1/72 inch) at the page's density.
    pub fn size_points(&self) -> (f32, f32) {
        let dpi = self.density.max(1) as f32;
        (
            self.width() as f32 / dpi * 72.0,
            self.height() as f32 / dpi * 72.0,
        )
    }

    /// Geometry covering the whole page.
    pub fn geometry(&self) -> CropGeometry {
        CropGeometry::full(self.width(), self.height())
    }

    /// Colour at `(offset, offset)`, clamped into the page. Sampling away from
    /// the corner avoids border artifacts of the feeder.
    pub fn sample_background(&self, offset: u32) -> Rgb<u8> {
        if self.width() == 0 || self.height() == 0 {
            return Rgb([255, 255, 255]);
        }
        let x = offset.min(self.width() - 1);
        let y = offset.min(self.height() - 1);
        match &self.image {
            DynamicImage::ImageRgb8(rgb) => *rgb.get_pixel(x, y),
            DynamicImage::ImageLuma8(gray) => {
                let v = gray.get_pixel(x, y).0[0];
                Rgb([v, v, v])
            }
            other => {
                let image::Rgba([r, g, b, _]) = image::GenericImageView::get_pixel(other, x, y);
                Rgb([r, g, b])
            }
        }
    }

    /// Replace the raster, keeping metadata.
    pub fn with_image(self, image: DynamicImage) -> Self {
        Self { image, ..self }
    }
}

/// Kept pages in scan order plus the OCR text gathered so far.
#[derive(Debug, Default)]
pub struct DocumentAccumulator {
    pages: Vec<PageImage>,
    text: String,
}

impl DocumentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a kept page. Pages are never reordered.
    pub fn push_page(&mut self, page: PageImage) {
        self.pages.push(page);
    }

    /// Append one page's OCR text.
    pub fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Consume the accumulator for assembly.
    pub fn into_parts(self) -> (Vec<PageImage>, String) {
        (self.pages, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};

    #[test]
    fn background_sample_is_clamped() {
        let mut rgb = RgbImage::from_pixel(3, 3, Rgb([1, 2, 3]));
        rgb.put_pixel(2, 2, Rgb([9, 9, 9]));
        let page = PageImage::new(DynamicImage::ImageRgb8(rgb), 300);
        assert_eq!(page.sample_background(5), Rgb([9, 9, 9]));
        assert_eq!(page.sample_background(0), Rgb([1, 2, 3]));
    }

    #[test]
    fn gray_background_is_expanded() {
        let page = PageImage::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([77]))),
            150,
        );
        assert_eq!(page.sample_background(5), Rgb([77, 77, 77]));
    }

    #[test]
    fn printed_size_follows_density() {
        let page = PageImage::new(DynamicImage::ImageLuma8(GrayImage::new(2550, 3300)), 300);
        assert_eq!(page.size_points(), (612.0, 792.0));
        let coarse = PageImage::new(DynamicImage::ImageLuma8(GrayImage::new(850, 1100)), 100);
        assert_eq!(coarse.size_points(), (612.0, 792.0));
    }

    #[test]
    fn accumulator_keeps_insertion_order() {
        let mut doc = DocumentAccumulator::new();
        for width in [10, 20, 30] {
            doc.push_page(PageImage::new(
                DynamicImage::ImageLuma8(GrayImage::new(width, 5)),
                300,
            ));
        }
        doc.append_text("first ");
        doc.append_text("second");
        let (pages, text) = doc.into_parts();
        let widths: Vec<u32> = pages.iter().map(PageImage::width).collect();
        assert_eq!(widths, vec![10, 20, 30]);
        assert_eq!(text, "first second");
    }
}
