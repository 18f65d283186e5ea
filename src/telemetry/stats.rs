//! # Running Statistics
//!
//! Arithmetic running mean over a retained sample list, plus an
//! interquartile (trimmed) mean estimator.

/// Appended-to sample list with its arithmetic mean.
///
/// The mean is recomputed over the full list on every push; O(n) per update
/// is fine at the multi-second statistics cadence.
#[derive(Debug, Default)]
pub struct RunningMean {
    samples: Vec<f64>,
    mean: f64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.samples.push(value);
        self.mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Rewrite every retained sample in place and recompute the mean.
    ///
    /// Used by the unit-conversion engine when display history is rescaled.
    pub fn apply(&mut self, convert: impl Fn(f64) -> f64) {
        for sample in &mut self.samples {
            *sample = convert(*sample);
        }
        if !self.samples.is_empty() {
            self.mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        }
    }
}

/// Interquartile mean: average of roughly the middle half of the samples.
///
/// Sorts a copy, starts at `round(n/4)` and takes `round(3n/6)` consecutive
/// elements, scaling the sum by `2/n`. Robust against outliers; returns
/// `None` for an empty slice.
pub fn interquartile_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let start = (n as f64 / 4.0).round() as usize;
    let count = (3.0 * n as f64 / 6.0).round() as usize;
    let sum: f64 = sorted[start..start + count].iter().sum();

    Some(2.0 / n as f64 * sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean_recomputes_over_full_list() {
        let mut stats = RunningMean::new();
        stats.push(1.0);
        assert!((stats.mean() - 1.0).abs() < 1e-9);
        stats.push(2.0);
        assert!((stats.mean() - 1.5).abs() < 1e-9);
        stats.push(6.0);
        assert!((stats.mean() - 3.0).abs() < 1e-9);
        assert_eq!(stats.len(), 3);
    }

    #[test]
    fn test_apply_converts_samples_and_mean() {
        let mut stats = RunningMean::new();
        stats.push(273.15);
        stats.push(283.15);

        stats.apply(|v| v - 273.15);

        assert!((stats.samples()[0] - 0.0).abs() < 1e-9);
        assert!((stats.samples()[1] - 10.0).abs() < 1e-9);
        assert!((stats.mean() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_interquartile_mean_averages_middle_half() {
        // n = 8: start 2, count 4 -> (3+4+5+6) * 2/8 = 4.5
        let values = [8.0, 1.0, 3.0, 5.0, 2.0, 7.0, 4.0, 6.0];
        let iqm = interquartile_mean(&values).unwrap();
        assert!((iqm - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_interquartile_mean_ignores_outliers() {
        let calm = [10.0, 10.5, 9.5, 10.2, 9.8, 10.1, 9.9, 10.3];
        let mut spiked = calm;
        spiked[0] = 10_000.0;

        let a = interquartile_mean(&calm).unwrap();
        let b = interquartile_mean(&spiked).unwrap();
        assert!((a - b).abs() < 1.0, "one spike should barely move the estimate");
    }

    #[test]
    fn test_interquartile_mean_empty() {
        assert!(interquartile_mean(&[]).is_none());
    }

    #[test]
    fn test_interquartile_mean_small_inputs_stay_in_bounds() {
        // The rounding selection must never index past the end
        for n in 1..16 {
            let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
            assert!(interquartile_mean(&values).is_some());
        }
    }
}
