use std::collections::VecDeque;

use crate::shared::constants::FPS_WINDOW_CAPACITY;

/// Bounded FIFO of instantaneous frame-rate samples.
#[derive(Clone, Debug)]
pub struct FpsWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl FpsWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest once full.
    pub fn push(&mut self, fps: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);
    }

    /// Arithmetic mean of the retained samples, 0 when empty.
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
}

impl Default for FpsWindow {
    fn default() -> Self {
        Self::new(FPS_WINDOW_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_mean_is_zero() {
        assert_relative_eq!(FpsWindow::default().mean(), 0.0);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut window = FpsWindow::new(3);
        for v in [100.0, 10.0, 10.0, 10.0] {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        assert_relative_eq!(window.mean(), 10.0);
    }

    #[test]
    fn test_default_capacity() {
        let mut window = FpsWindow::default();
        for _ in 0..100 {
            window.push(1.0);
        }
        assert_eq!(window.len(), FPS_WINDOW_CAPACITY);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = FpsWindow::new(0);
        window.push(5.0);
        window.push(7.0);
        assert_eq!(window.len(), 1);
        assert_relative_eq!(window.mean(), 7.0);
    }
}
