// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Acquisition loop — the producer side of the pipeline.

use scanwerk_core::error::Result;
use scanwerk_document::PageImage;
use tracing::{error, info, instrument};

use crate::queue::PageQueue;
use crate::source::{ScannerSource, read_page};

/// Signals completion when dropped, so every exit path (including a panic)
/// releases the consumer exactly once.
struct CompletionGuard<'q>(&'q PageQueue<PageImage>);

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.0.signal_complete();
    }
}

/// Scan pages until the source reports no more documents, pushing each whole
/// page into `queue`. Returns the number of pages acquired.
///
/// A failure aborts the queue so the consumer stops without producing output.
#[instrument(skip_all)]
pub fn acquire(source: &mut dyn ScannerSource, queue: &PageQueue<PageImage>) -> Result<usize> {
    let _complete = CompletionGuard(queue);

    let result = scan_all(source, queue);
    match &result {
        Ok(pages) => info!(pages, "No more documents"),
        Err(err) => {
            error!(%err, "Acquisition failed");
            queue.abort();
        }
    }
    result
}

fn scan_all(source: &mut dyn ScannerSource, queue: &PageQueue<PageImage>) -> Result<usize> {
    let mut acquired = 0;
    while source.start_page()? {
        let page = read_page(source, acquired)?;
        info!(page = acquired, "Page acquired");
        queue.push(page)?;
        acquired += 1;
    }
    Ok(acquired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::MemorySource;
    use crate::source::{Frame, ScanParameters};
    use scanwerk_core::error::ScanwerkError;
    use std::thread;

    #[test]
    fn pages_arrive_in_scan_order() {
        let queue = PageQueue::new(2);
        let mut source = MemorySource::gray_pages(5, 4, 4);

        let seen = thread::scope(|scope| {
            let producer = scope.spawn(|| acquire(&mut source, &queue));
            let mut seen = Vec::new();
            while let Some(page) = queue.pop_wait() {
                seen.push(page.image.to_luma8().get_pixel(0, 0).0[0]);
            }
            assert_eq!(producer.join().expect("producer").expect("acquire"), 5);
            seen
        });

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_complete());
    }

    #[test]
    fn empty_feeder_completes_immediately() {
        let queue = PageQueue::new(1);
        let mut source = MemorySource::gray_pages(0, 1, 1);
        assert_eq!(acquire(&mut source, &queue).expect("acquire"), 0);
        assert!(queue.is_complete());
        assert_eq!(queue.pop_wait().map(|p| p.width()), None);
    }

    #[test]
    fn trailing_bytes_abort_the_run() {
        let params = ScanParameters {
            frame: Frame::Gray,
            pixels_per_line: 2,
            lines: 1,
            depth: 8,
        };
        let good = (params, vec![vec![0, 0]]);
        let bad = (params, vec![vec![1, 1], vec![2, 2]]);
        let mut source = MemorySource::new(vec![good, bad]);
        let queue = PageQueue::new(4);

        let result = acquire(&mut source, &queue);
        assert!(matches!(result, Err(ScanwerkError::TrailingBytes { page: 1 })));
        assert!(queue.is_aborted());
        assert!(queue.is_complete());
        // The consumer sees no pages once the run is aborted.
        assert!(queue.pop_wait().is_none());
    }

    #[test]
    fn consumer_abort_stops_the_scanner() {
        let queue = PageQueue::new(1);
        let mut source = MemorySource::gray_pages(10, 2, 2);
        queue.abort();
        assert!(matches!(
            acquire(&mut source, &queue),
            Err(ScanwerkError::QueueClosed)
        ));
        assert_eq!(source.pages_started, 1);
    }
}
