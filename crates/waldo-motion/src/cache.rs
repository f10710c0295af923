//! Bounded ring buffer of recent joint positions.

use std::collections::VecDeque;

/// Keeps the last `capacity` axis positions for stall detection.
///
/// The spread (max − min) over a full window tells the drive whether the
/// joint is still making progress: contact forces below the sensing
/// resolution pin the realized position, collapsing the spread toward zero
/// while the commanded position keeps marching.
#[derive(Debug, Clone)]
pub struct PositionCache {
    buf: VecDeque<f32>,
    capacity: usize,
}

impl PositionCache {
    /// A cache holding at most `capacity` samples (minimum 2).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, dropping the oldest when full.
    pub fn push(&mut self, position: f32) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(position);
    }

    /// Overwrite the most recent sample (physics read-back after a step).
    /// Pushes instead when empty.
    pub fn replace_last(&mut self, position: f32) {
        match self.buf.back_mut() {
            Some(last) => *last = position,
            None => self.buf.push_back(position),
        }
    }

    /// Max − min over the current samples; 0.0 with fewer than 2 samples.
    #[must_use]
    pub fn spread(&self) -> f32 {
        if self.buf.len() < 2 {
            return 0.0;
        }
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &p in &self.buf {
            min = min.min(p);
            max = max.max(p);
        }
        max - min
    }

    /// Whether the window holds `capacity` samples.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Most recent sample, if any.
    #[must_use]
    pub fn latest(&self) -> Option<f32> {
        self.buf.back().copied()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
