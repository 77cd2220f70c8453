// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Replay source: feeds the image files of a directory, in name order, through
// the same scanline interface a scanner uses.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument};

use crate::source::{Frame, ScanParameters, ScannerSource};

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "tif", "tiff", "bmp", "pnm", "pbm", "pgm", "ppm",
];

struct Replay {
    params: ScanParameters,
    data: Vec<u8>,
    next_line: usize,
}

pub struct DirectorySource {
    files: VecDeque<PathBuf>,
    resolution: u32,
    current: Option<Replay>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl DirectorySource {
    #[instrument]
    pub fn open(dir: &Path, resolution: u32) -> Result<Self> {
        let mut files = std::fs::read_dir(dir)
            .map_err(|err| ScanwerkError::Scanner(format!("cannot read {}: {err}", dir.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect::<Vec<_>>();
        files.sort();
        info!(pages = files.len(), "Replaying images from {}", dir.display());

        Ok(Self {
            files: files.into(),
            resolution,
            current: None,
        })
    }
}

impl ScannerSource for DirectorySource {
    fn start_page(&mut self) -> Result<bool> {
        let Some(path) = self.files.pop_front() else {
            self.current = None;
            return Ok(false);
        };
        let image = image::open(&path)
            .map_err(|err| ScanwerkError::Scanner(format!("cannot read {}: {err}", path.display())))?;
        debug!(file = %path.display(), "Replaying page");

        let (width, height) = (image.width(), image.height());
        let (frame, data) = match image {
            DynamicImage::ImageLuma8(gray) => (Frame::Gray, gray.into_raw()),
            other => (Frame::Rgb, other.to_rgb8().into_raw()),
        };
        self.current = Some(Replay {
            params: ScanParameters {
                frame,
                pixels_per_line: width,
                lines: height,
                depth: 8,
            },
            data,
            next_line: 0,
        });
        Ok(true)
    }

    fn parameters(&self) -> Result<ScanParameters> {
        self.current
            .as_ref()
            .map(|r| r.params)
            .ok_or_else(|| ScanwerkError::Scanner("no page in progress".into()))
    }

    fn read_line(&mut self, line: &mut [u8]) -> Result<bool> {
        let Some(replay) = self.current.as_mut() else {
            return Ok(false);
        };
        let stride = replay.params.bytes_per_line();
        let start = replay.next_line * stride;
        let Some(row) = replay.data.get(start..start + stride) else {
            return Ok(false);
        };
        line[..stride].copy_from_slice(row);
        replay.next_line += 1;
        Ok(true)
    }

    fn resolution(&self) -> u32 {
        self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::read_page;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn replays_images_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        RgbImage::from_pixel(6, 4, Rgb([10, 20, 30]))
            .save(dir.path().join("b.png"))
            .expect("save b");
        GrayImage::from_pixel(3, 5, Luma([200]))
            .save(dir.path().join("a.png"))
            .expect("save a");
        std::fs::write(dir.path().join("notes.txt"), "skip me").expect("write");

        let mut source = DirectorySource::open(dir.path(), 200).expect("open");
        assert!(source.start_page().expect("start a"));
        let first = read_page(&mut source, 0).expect("page a");
        assert_eq!((first.width(), first.height()), (3, 5));
        assert!(first.image.as_luma8().is_some());
        assert_eq!(first.density, 200);

        assert!(source.start_page().expect("start b"));
        let second = read_page(&mut source, 1).expect("page b");
        assert_eq!(second.image.to_rgb8().get_pixel(5, 3).0, [10, 20, 30]);

        assert!(!source.start_page().expect("end"));
    }

    #[test]
    fn missing_directory_is_a_scanner_error() {
        assert!(matches!(
            DirectorySource::open(Path::new("/nonexistent/scans"), 300),
            Err(ScanwerkError::Scanner(_))
        ));
    }
}
