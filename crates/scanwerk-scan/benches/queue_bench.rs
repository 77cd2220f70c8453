// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the producer/consumer hand-off through the page
// queue and for page assembly from scanlines.

use std::thread;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use scanwerk_scan::source::assemble;
use scanwerk_scan::{Frame, PageQueue, ScanParameters};

/// 1000 items through a queue of capacity 4, one producer and one consumer.
fn bench_queue_handoff(c: &mut Criterion) {
    c.bench_function("queue_handoff (1000 items, cap 4)", |b| {
        b.iter(|| {
            let queue = PageQueue::new(4);
            thread::scope(|scope| {
                scope.spawn(|| {
                    for i in 0..1000u32 {
                        if queue.push(i).is_err() {
                            break;
                        }
                    }
                    queue.signal_complete();
                });
                let mut sum = 0u64;
                while let Some(item) = queue.pop_wait() {
                    sum += u64::from(item);
                }
                black_box(sum);
            });
        });
    });
}

/// Assemble a 1-bit letter page at 300 dpi.
fn bench_assemble_bitmap(c: &mut Criterion) {
    let params = ScanParameters {
        frame: Frame::Gray,
        pixels_per_line: 2550,
        lines: 3300,
        depth: 1,
    };
    let raw = vec![0b1010_1010u8; params.bytes_per_line() * params.lines as usize];

    c.bench_function("assemble 1-bit (2550x3300)", |b| {
        b.iter(|| black_box(assemble(black_box(&params), black_box(&raw))));
    });
}

criterion_group!(benches, bench_queue_handoff, bench_assemble_bitmap);
criterion_main!(benches);
