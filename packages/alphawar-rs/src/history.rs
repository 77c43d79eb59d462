// Feature history and plot scaling

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded FIFO of recent feature values
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest value when full
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Shared y-axis for both competitors' histories, split into four intervals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisScale {
    pub min: f64,
    pub max: f64,
    pub tick: f64,
}

impl AxisScale {
    pub const INTERVALS: usize = 4;

    /// Fit an axis around `series`. `None` until every series has two points.
    pub fn fit(series: &[&[f64]], min_tick: f64) -> Option<Self> {
        if series.is_empty() || series.iter().any(|s| s.len() < 2) {
            return None;
        }

        let values = series.iter().flat_map(|s| s.iter().copied());
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !lo.is_finite() || !hi.is_finite() {
            return None;
        }

        let min = (lo - 2.0).floor();
        let raw_max = (hi * 1.1).ceil();
        let tick = ((raw_max - min) / Self::INTERVALS as f64).floor().max(min_tick);
        Some(Self {
            min,
            max: min + Self::INTERVALS as f64 * tick,
            tick,
        })
    }

    pub fn ticks(&self) -> Vec<f64> {
        (0..=Self::INTERVALS)
            .map(|i| self.min + i as f64 * self.tick)
            .collect()
    }

    /// Map `value` into [0, 1] on this axis
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_past_capacity_keeps_latest() {
        let mut history = HistoryBuffer::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            history.push(v);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.snapshot(), vec![2.0, 3.0, 4.0]);
        assert_eq!(history.latest(), Some(4.0));

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut history = HistoryBuffer::new(0);
        history.push(1.0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_axis_needs_two_points_per_series() {
        assert!(AxisScale::fit(&[&[1.0, 2.0], &[3.0]], 1.0).is_none());
        assert!(AxisScale::fit(&[], 1.0).is_none());
    }

    #[test]
    fn test_axis_fit() {
        let a = [0.5, 3.0];
        let b = [1.0, 10.0];
        let axis = AxisScale::fit(&[&a, &b], 1.0).unwrap();
        // min = floor(0.5 - 2) = -2, raw_max = ceil(10 * 1.1) >= 11, tick = 3
        assert_eq!(axis.min, -2.0);
        assert_eq!(axis.tick, 3.0);
        assert_eq!(axis.max, 10.0);
        assert_eq!(axis.ticks(), vec![-2.0, 1.0, 4.0, 7.0, 10.0]);
        assert_eq!(axis.normalize(4.0), 0.5);
        assert_eq!(axis.normalize(100.0), 1.0);
    }

    #[test]
    fn test_axis_respects_min_tick() {
        let axis = AxisScale::fit(&[&[0.1, 0.2], &[0.15, 0.3]], 1.0).unwrap();
        assert_eq!(axis.tick, 1.0);
        assert_eq!(axis.max - axis.min, 4.0);
    }
}
