//! Scanline batching.
//!
//! Large images are processed as horizontal strips so one dispatch never
//! addresses more than a fixed amount of elements.

use std::ops::Range;

/// Scanlines per batch so that `batch_height * width` stays within `max_elements`.
///
/// Always at least one scanline.
#[inline]
pub fn batch_height(width: u32, max_elements: u32) -> u32 {
    (max_elements / width.max(1)).max(1)
}

/// Iterator over the row ranges of consecutive scanline batches.
#[derive(Clone, Debug)]
pub struct ScanlineBatches {
    height: u32,
    batch_height: u32,
    next: u32,
}

impl ScanlineBatches {
    /// Batches of `batch_height` rows (the last one may be shorter).
    pub fn new(height: u32, batch_height: u32) -> Self {
        Self { height, batch_height: batch_height.max(1), next: 0 }
    }

    /// Batches sized for an image of `width` columns and an element ceiling.
    pub fn for_width(width: u32, height: u32, max_elements: u32) -> Self {
        Self::new(height, batch_height(width, max_elements))
    }

    /// Rows per full batch (also the dispatch height).
    #[inline]
    pub fn batch_height(&self) -> u32 {
        self.batch_height
    }

    /// Total number of batches.
    #[inline]
    pub fn batch_count(&self) -> usize {
        self.height.div_ceil(self.batch_height) as usize
    }
}

impl Iterator for ScanlineBatches {
    type Item = Range<u32>;

    fn next(&mut self) -> Option<Range<u32>> {
        if self.next >= self.height {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.batch_height).min(self.height);
        self.next = end;
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.height - self.next.min(self.height)).div_ceil(self.batch_height) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ScanlineBatches {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_height() {
        assert_eq!(batch_height(1024, 16 * 1024), 16);
        assert_eq!(batch_height(4096, 16 * 1024), 4);
        assert_eq!(batch_height(100_000, 16 * 1024), 1);
    }

    #[test]
    fn test_batches_cover_image() {
        let batches = ScanlineBatches::new(10, 4);
        assert_eq!(batches.batch_count(), 3);
        assert_eq!(batches.len(), 3);
        let rows: Vec<_> = batches.collect();
        assert_eq!(rows, vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn test_single_batch() {
        let rows: Vec<_> = ScanlineBatches::for_width(8, 8, 1 << 20).collect();
        assert_eq!(rows, vec![0..8]);
    }
}
