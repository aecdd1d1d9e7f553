use crate::error::{MorseError, Result};
use std::ops::Range;

/// Time span of a recording, in seconds from its first sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !(start >= 0.0) || !(end > start) || !end.is_finite() {
            return Err(MorseError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Half-open index range `trunc(start·fs) .. trunc(end·fs)`, clamped to `len`
    pub fn sample_range(&self, sample_rate: u32, len: usize) -> Range<usize> {
        let fs = sample_rate as f64;
        let first = ((self.start * fs) as usize).min(len);
        let last = ((self.end * fs) as usize).min(len);
        first..last.max(first)
    }

    /// Every index whose timestamp `n / fs` falls inside `[start, end]`
    pub fn inclusive_range(&self, sample_rate: u32, len: usize) -> Range<usize> {
        let fs = sample_rate as f64;
        let first = ((self.start * fs).ceil() as usize).min(len);
        let last = (((self.end * fs).floor() as usize) + 1).min(len);
        first..last.max(first)
    }

    pub fn slice<'a>(&self, samples: &'a [f32], sample_rate: u32) -> &'a [f32] {
        &samples[self.sample_range(sample_rate, samples.len())]
    }
}

/// Timestamps for `len` consecutive samples starting at `offset` seconds
pub fn sample_times(len: usize, sample_rate: u32, offset: f64) -> Vec<f64> {
    let fs = sample_rate as f64;
    (0..len).map(|n| offset + n as f64 / fs).collect()
}

/// Scale so the largest magnitude becomes 1.0. Silent input is returned as is.
pub fn normalize(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    if peak == 0.0 {
        return samples.to_vec();
    }
    samples.iter().map(|&s| s / peak).collect()
}

/// Magnitude envelope
pub fn rectify(samples: &[f32]) -> Vec<f32> {
    samples.iter().map(|s| s.abs()).collect()
}

/// Y-axis limits for a zoomed plot: 10% beyond the extremes when the data
/// crosses zero, 5% of the span otherwise, ±1 around flat data.
pub fn padded_limits(samples: &[f32]) -> (f64, f64) {
    if samples.is_empty() {
        return (-1.0, 1.0);
    }

    let min = samples.iter().cloned().fold(f32::INFINITY, f32::min) as f64;
    let max = samples.iter().cloned().fold(f32::NEG_INFINITY, f32::max) as f64;

    if max - min <= f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    if min < 0.0 && max > 0.0 {
        return (min * 1.1, max * 1.1);
    }
    let pad = 0.05 * (max - min);
    (min - pad, max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_validation() {
        assert!(TimeWindow::new(0.0, 1.0).is_ok());
        assert!(TimeWindow::new(1.0, 1.0).is_err());
        assert!(TimeWindow::new(-0.1, 1.0).is_err());
        assert!(TimeWindow::new(0.0, f64::NAN).is_err());
        assert!(TimeWindow::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_sample_range_truncates() {
        let window = TimeWindow::new(0.5, 0.505).unwrap();
        // 0.5 * 44100 = 22050, 0.505 * 44100 = 22270.5 -> 22270
        assert_eq!(window.sample_range(44100, 100_000), 22050..22270);
    }

    #[test]
    fn test_sample_range_clamps() {
        let window = TimeWindow::new(1.0, 2.0).unwrap();
        assert_eq!(window.sample_range(1000, 1500), 1000..1500);
        assert_eq!(window.sample_range(1000, 500), 500..500);
    }

    #[test]
    fn test_inclusive_range() {
        // both ends land exactly on samples 12 and 13
        let window = TimeWindow::new(1.5, 1.625).unwrap();
        assert_eq!(window.inclusive_range(8, 100), 12..14);
        assert_eq!(window.sample_range(8, 100), 12..13);
    }

    #[test]
    fn test_slice() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let window = TimeWindow::new(0.2, 0.5).unwrap();
        assert_eq!(window.slice(&samples, 10), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sample_times_with_offset() {
        let times = sample_times(3, 4, 1.0);
        assert_eq!(times, vec![1.0, 1.25, 1.5]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[2.0, -4.0, 1.0]), vec![0.5, -1.0, 0.25]);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_rectify() {
        assert_eq!(rectify(&[-1.5, 0.0, 2.0]), vec![1.5, 0.0, 2.0]);
    }

    #[test]
    fn test_padded_limits() {
        let (lo, hi) = padded_limits(&[-2.0, 1.0]);
        assert!((lo + 2.2).abs() < 1e-6 && (hi - 1.1).abs() < 1e-6);

        let (lo, hi) = padded_limits(&[1.0, 3.0]);
        assert!((lo - 0.9).abs() < 1e-6 && (hi - 3.1).abs() < 1e-6);

        assert_eq!(padded_limits(&[0.0, 0.0]), (-1.0, 1.0));
        assert_eq!(padded_limits(&[]), (-1.0, 1.0));
    }
}
