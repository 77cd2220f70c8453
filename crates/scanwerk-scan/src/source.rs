// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner source contract and page assembly from scanlines.

use image::{DynamicImage, GrayImage, RgbImage};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_document::PageImage;
use tracing::{debug, instrument};

/// Colour layout of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Gray,
    Rgb,
}

impl Frame {
    pub fn channels(self) -> usize {
        match self {
            Frame::Gray => 1,
            Frame::Rgb => 3,
        }
    }
}

/// Geometry of the page the source is about to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParameters {
    pub frame: Frame,
    pub pixels_per_line: u32,
    pub lines: u32,
    /// Bits per sample: 1, 8 or 16.
    pub depth: u8,
}

impl ScanParameters {
    /// Packed bytes in one scanline.
    pub fn bytes_per_line(&self) -> usize {
        let bits = self.pixels_per_line as usize * self.frame.channels() * self.depth as usize;
        bits.div_ceil(8)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.depth, 1 | 8 | 16) {
            return Err(ScanwerkError::Scanner(format!("unsupported bit depth {}", self.depth)));
        }
        if self.pixels_per_line == 0 || self.lines == 0 {
            return Err(ScanwerkError::Scanner(format!(
                "empty frame {}x{}",
                self.pixels_per_line, self.lines
            )));
        }
        Ok(())
    }
}

/// A device (or stand-in) that yields pages as scanlines.
pub trait ScannerSource: Send {
    /// Begin the next page. `false` means there are no more documents.
    fn start_page(&mut self) -> Result<bool>;

    /// Parameters of the page started last.
    fn parameters(&self) -> Result<ScanParameters>;

    /// Fill `line` with the next scanline. `false` means end of page.
    fn read_line(&mut self, line: &mut [u8]) -> Result<bool>;

    /// Pixel density of the delivered pages, in dpi.
    fn resolution(&self) -> u32;
}

/// Read one full page. Any data left after the last line is fatal.
#[instrument(skip(source))]
pub fn read_page(source: &mut dyn ScannerSource, page: usize) -> Result<PageImage> {
    let params = source.parameters()?;
    params.validate()?;
    let stride = params.bytes_per_line();
    let mut raw = vec![0u8; stride * params.lines as usize];

    for (row, line) in raw.chunks_exact_mut(stride).enumerate() {
        if !source.read_line(line)? {
            return Err(ScanwerkError::Scanner(format!(
                "page {page} ended after {row} of {} lines",
                params.lines
            )));
        }
    }

    let mut probe = vec![0u8; stride];
    if source.read_line(&mut probe)? {
        return Err(ScanwerkError::TrailingBytes { page });
    }

    debug!(
        width = params.pixels_per_line,
        height = params.lines,
        depth = params.depth,
        "Page read"
    );
    let image = assemble(&params, &raw)?;
    Ok(PageImage::new(image, source.resolution()))
}

/// One 8-bit sample from a packed scanline.
fn sample(line: &[u8], index: usize, depth: u8) -> u8 {
    match depth {
        // A set bit is black.
        1 => {
            if line[index / 8] & (0x80 >> (index % 8)) != 0 {
                0
            } else {
                255
            }
        }
        // Big-endian; keep the high byte.
        16 => line[index * 2],
        _ => line[index],
    }
}

/// Convert packed scanlines into an 8-bit gray or RGB raster.
pub fn assemble(params: &ScanParameters, raw: &[u8]) -> Result<DynamicImage> {
    let (width, height) = (params.pixels_per_line, params.lines);
    let stride = params.bytes_per_line();
    let channels = params.frame.channels();
    let mut pixels = Vec::with_capacity(width as usize * height as usize * channels);

    for line in raw.chunks_exact(stride).take(height as usize) {
        for index in 0..width as usize * channels {
            pixels.push(sample(line, index, params.depth));
        }
    }

    let overflow = || ScanwerkError::Scanner(format!("frame {width}x{height} does not match its data"));
    Ok(match params.frame {
        Frame::Gray => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, pixels).ok_or_else(overflow)?),
        Frame::Rgb => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, pixels).ok_or_else(overflow)?),
    })
}
