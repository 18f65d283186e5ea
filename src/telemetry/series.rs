//! # Channel Buffer
//!
//! Append-only numeric time series with a fixed capacity.
//!
//! The buffer grows lazily up to its cap and never wraps or evicts: an
//! append at capacity is a [`StationError::Capacity`] so a long-running
//! acquisition fails loudly instead of overwriting history.

use crate::error::{Result, StationError};

/// One timestamped value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since acquisition start
    pub t: f64,
    pub v: f64,
}

/// Fixed-capacity, append-only sample buffer for one channel
#[derive(Debug)]
pub struct Series {
    label: &'static str,
    samples: Vec<Sample>,
    capacity: usize,
}

impl Series {
    /// Create an empty series holding at most `capacity` samples.
    ///
    /// `label` names the owning channel in capacity errors.
    pub fn new(label: &'static str, capacity: usize) -> Self {
        Self {
            label,
            samples: Vec::new(),
            capacity,
        }
    }

    /// Append one sample in O(1).
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Capacity`] when the series is full. The
    /// stored data is left untouched.
    pub fn append(&mut self, t: f64, v: f64) -> Result<()> {
        if self.samples.len() >= self.capacity {
            return Err(StationError::Capacity {
                channel: self.label,
                capacity: self.capacity,
            });
        }
        self.samples.push(Sample { t, v });
        Ok(())
    }

    /// All stored samples in append order
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
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

    /// Rewrite every stored value in place.
    ///
    /// Used only by the unit-conversion engine; timestamps are untouched.
    pub fn apply(&mut self, convert: impl Fn(f64) -> f64) {
        for sample in &mut self.samples {
            sample.v = convert(sample.v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let mut series = Series::new("temperature", 8);
        series.append(0.0, 1.0).unwrap();
        series.append(0.1, 2.0).unwrap();

        let samples = series.as_slice();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], Sample { t: 0.0, v: 1.0 });
        assert_eq!(samples[1], Sample { t: 0.1, v: 2.0 });
    }

    #[test]
    fn test_length_is_non_decreasing() {
        let mut series = Series::new("pressure", 16);
        let mut last_len = 0;
        for i in 0..16 {
            series.append(i as f64, 0.0).unwrap();
            assert!(series.len() > last_len);
            last_len = series.len();
        }
    }

    #[test]
    fn test_append_beyond_capacity_errors() {
        let mut series = Series::new("particulates", 2);
        series.append(0.0, 1.0).unwrap();
        series.append(0.1, 2.0).unwrap();

        let err = series.append(0.2, 3.0).unwrap_err();
        match err {
            StationError::Capacity { channel, capacity } => {
                assert_eq!(channel, "particulates");
                assert_eq!(capacity, 2);
            }
            other => panic!("expected Capacity error, got: {:?}", other),
        }

        // Neither wrapped nor overwrote index 0
        assert_eq!(series.len(), 2);
        assert_eq!(series.as_slice()[0].v, 1.0);
    }

    #[test]
    fn test_apply_rewrites_values_only() {
        let mut series = Series::new("temperature", 4);
        series.append(0.0, 273.15).unwrap();
        series.append(1.0, 274.15).unwrap();

        series.apply(|v| v - 273.15);

        let samples = series.as_slice();
        assert_eq!(samples[0].t, 0.0);
        assert!((samples[0].v - 0.0).abs() < 1e-9);
        assert!((samples[1].v - 1.0).abs() < 1e-9);
    }
}
