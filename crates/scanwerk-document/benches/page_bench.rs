// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the per-page hot path: correction followed by
// classification, on a synthetic letter-sized page at 100 dpi.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};

use scanwerk_core::config::{ClassificationConfig, CorrectionConfig};
use scanwerk_document::{Classifier, Corrector, DebugDump, PageImage};

/// White page with a dark band along the top edge and a block of "text".
fn synthetic_page() -> PageImage {
    let (width, height) = (850u32, 1100u32);
    let mut img = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
    for y in 0..40 {
        for x in 0..width {
            img.put_pixel(x, y, Rgb([20, 20, 20]));
        }
    }
    for line in 0..20 {
        let y0 = 150 + line * 40;
        for y in y0..y0 + 12 {
            for x in 100..750 {
                img.put_pixel(x, y, Rgb([10, 10, 10]));
            }
        }
    }
    PageImage::new(DynamicImage::ImageRgb8(img), 100)
}

fn bench_correct_and_classify(c: &mut Criterion) {
    let page = synthetic_page();
    let corrector = Corrector::new(CorrectionConfig::default(), DebugDump::disabled());
    let classifier = Classifier::new(ClassificationConfig::default());

    c.bench_function("correct (850x1100)", |b| {
        b.iter(|| black_box(corrector.correct(0, black_box(page.clone()))));
    });

    c.bench_function("classify (850x1100)", |b| {
        b.iter(|| black_box(classifier.classify(black_box(&page))));
    });
}

criterion_group!(benches, bench_correct_and_classify);
criterion_main!(benches);
