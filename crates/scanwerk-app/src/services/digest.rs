// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page digestion: correction, classification (with the blank-page gate),
// transform, then orientation/OCR into the document accumulator.

use scanwerk_core::{ClassificationLabel, Orientation, PipelineConfig};
use scanwerk_document::{
    Classifier, Corrector, DebugDump, DocumentAccumulator, OcrEngine, PageImage, Transform,
    has_text, orient_and_collect,
};
use tracing::{debug, info, instrument};

use super::gate::BlankGate;

/// What happened to one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageOutcome {
    Kept {
        label: ClassificationLabel,
        transform: Transform,
        orientation: Orientation,
    },
    Discarded,
}

pub struct PageDigester<'a> {
    corrector: Corrector,
    classifier: Classifier,
    dump: DebugDump,
    ocr: &'a dyn OcrEngine,
    gate: &'a mut dyn BlankGate,
}

impl<'a> PageDigester<'a> {
    pub fn new(config: &PipelineConfig, ocr: &'a dyn OcrEngine, gate: &'a mut dyn BlankGate) -> Self {
        let dump = DebugDump::new(config.debug_dump_dir.clone());
        Self {
            corrector: Corrector::new(config.correction.clone(), dump.clone()),
            classifier: Classifier::new(config.classification.clone()),
            dump,
            ocr,
            gate,
        }
    }

    /// Run every stage on `page`, appending it to `document` unless discarded.
    #[instrument(skip(self, page, document))]
    pub fn digest(&mut self, index: usize, page: PageImage, document: &mut DocumentAccumulator) -> PageOutcome {
        let (page, report) = self.corrector.correct(index, page);
        debug!(?report, "Correction report");

        let mut label = self.classifier.classify(&page);
        if label == ClassificationLabel::Blank {
            let whiteness = self.classifier.whiteness(&page);
            if !self.gate.keep_blank(index, whiteness) {
                return PageOutcome::Discarded;
            }
            label = self.classifier.classify_content(&page);
        }

        let text = label == ClassificationLabel::BlackAndWhite && has_text(&page, self.ocr);
        let transform = Transform::select(label, text);
        info!(page = index, %label, has_text = text, ?transform, "Transform selected");

        let Some(page) = transform.apply(page) else {
            return PageOutcome::Discarded;
        };
        self.dump.write(index, 6, "reduced", &page.image);

        let orientation = orient_and_collect(index, page, self.ocr, document);
        PageOutcome::Kept {
            label,
            transform,
            orientation,
        }
    }
}
