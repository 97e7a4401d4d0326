//! Rolling window of recent phase-error magnitudes for the gain scheduler.

use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent |phase error| samples.
///
/// Pushing into a full window evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct ErrorWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl ErrorWindow {
    /// `capacity` is raised to 1 if zero is passed.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Arithmetic mean of the retained samples; 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
