/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Fixed-capacity sample windows and their aggregates.

use std::collections::VecDeque;

/// FIFO of the most recent samples of one signal. Pushing into a full window evicts the oldest
/// sample.
#[derive(Clone, Debug)]
pub struct MetricWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

/// Aggregates over the samples currently in a [`MetricWindow`]. Percentiles use the nearest-rank
/// method.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowStats {
    pub count: usize,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

impl MetricWindow {
    /// A window holding at most `capacity` samples. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample. Non-finite samples are ignored.
    pub fn push(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
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

    /// Samples from oldest to newest.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
        }
    }

    pub fn percentile(&self, percent: f64) -> Option<f64> {
        let sorted = self.sorted();
        nearest_rank(&sorted, percent)
    }

    pub fn stats(&self) -> Option<WindowStats> {
        let sorted = self.sorted();
        Some(WindowStats {
            count: sorted.len(),
            mean: self.mean()?,
            p50: nearest_rank(&sorted, 50.0)?,
            p90: nearest_rank(&sorted, 90.0)?,
            p95: nearest_rank(&sorted, 95.0)?,
            p99: nearest_rank(&sorted, 99.0)?,
            max: *sorted.last()?,
        })
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted
    }
}

fn nearest_rank(sorted: &[f64], percent: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (percent.clamp(0.0, 100.0) * sorted.len() as f64 / 100.0).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_sample_is_evicted() {
        let mut window = MetricWindow::new(3);
        for sample in [1.0, 2.0, 3.0, 4.0] {
            window.push(sample);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.samples().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn nearest_rank_percentiles() {
        let mut window = MetricWindow::new(100);
        for sample in 1..=100 {
            window.push(sample as f64);
        }
        let stats = window.stats().unwrap();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.mean, 50.5);
        assert_eq!(stats.p50, 50.0);
        assert_eq!(stats.p90, 90.0);
        assert_eq!(stats.p95, 95.0);
        assert_eq!(stats.p99, 99.0);
        assert_eq!(stats.max, 100.0);
    }

    #[test]
    fn empty_window_has_no_stats() {
        let mut window = MetricWindow::new(0);
        assert_eq!(window.capacity(), 1);
        assert!(window.stats().is_none());
        window.push(f64::NAN);
        assert!(window.is_empty());
    }
}
