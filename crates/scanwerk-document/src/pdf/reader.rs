// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspection with `lopdf`. Used to check a text-layer render before it
// replaces the image-only document.

use std::path::Path;

use lopdf::{Document, Object};
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, instrument};

/// Read-only view of a produced PDF.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = Document::load(path).map_err(|err| {
            ScanwerkError::PdfError(format!("cannot read {}: {err}", path.display()))
        })?;
        debug!(pages = document.get_pages().len(), "PDF opened");
        Ok(Self { document })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| ScanwerkError::PdfError(format!("cannot parse PDF bytes: {err}")))?;
        Ok(Self { document })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Whether any font object is present, i.e. the document carries text.
    pub fn has_text_layer(&self) -> bool {
        self.document.objects.values().any(|object| match object {
            Object::Dictionary(dict) => {
                matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name.as_slice() == b"Font")
            }
            _ => false,
        })
    }

    /// Width and height in points of each page's media box, in page order.
    pub fn page_sizes(&self) -> Vec<(f32, f32)> {
        self.document
            .get_pages()
            .values()
            .filter_map(|&page_id| {
                let dict = self.document.get_object(page_id).ok()?.as_dict().ok()?;
                let media_box = dict.get(b"MediaBox").ok()?.as_array().ok()?;
                let coords: Vec<f32> = media_box.iter().filter_map(|v| v.as_float().ok()).collect();
                match coords.as_slice() {
                    [x0, y0, x1, y1] => Some((x1 - x0, y1 - y0)),
                    _ => None,
                }
            })
            .collect()
    }
}
