//! Progress reporting between batches.
//!
//! Stages report the percentage of their own work; [`ProgressSpan`] maps it
//! onto a slice of a larger task so a multi-stage bake reports one
//! monotonically increasing percentage.

/// Receives progress percentages in [0, 100].
///
/// Called once per batch or bounce on the orchestrating thread. It is also
/// the yield point: a UI can pump its events here.
pub trait Progress {
    fn report(&mut self, percent: f32);
}

impl<F: FnMut(f32)> Progress for F {
    fn report(&mut self, percent: f32) {
        self(percent)
    }
}

/// Discards every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _percent: f32) {}
}

/// Maps a stage's [0, 100] onto `[start, end]` of the parent, never going backwards.
pub struct ProgressSpan<'a> {
    parent: &'a mut dyn Progress,
    start: f32,
    end: f32,
    last: f32,
}

impl<'a> ProgressSpan<'a> {
    pub fn new(parent: &'a mut dyn Progress, start: f32, end: f32) -> Self {
        Self { parent, start, end, last: start }
    }

    /// Report `done` out of `total` steps.
    pub fn step(&mut self, done: usize, total: usize) {
        let percent = if total == 0 { 100.0 } else { 100.0 * done as f32 / total as f32 };
        self.report(percent);
    }
}

impl Progress for ProgressSpan<'_> {
    fn report(&mut self, percent: f32) {
        let mapped = self.start + (self.end - self.start) * percent.clamp(0.0, 100.0) / 100.0;
        self.last = self.last.max(mapped);
        self.parent.report(self.last);
    }
}
