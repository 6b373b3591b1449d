//! Raw sample sources for covariance estimation.

use crate::error::{CovError, Result};
use ndarray::{Array1, Array2, Axis, s};

/// A continuous multichannel recording that can be read in pieces.
///
/// Sample indices are absolute: the first readable sample is
/// [`first_sample`](Self::first_sample), not zero.
pub trait SampleSource {
    /// Sampling rate in Hz.
    fn sampling_rate(&self) -> f64;

    /// Index of the first sample.
    fn first_sample(&self) -> usize;

    /// Number of samples in the recording.
    fn n_samples(&self) -> usize;

    /// Channel names, in row order of [`read`](Self::read) with all channels picked.
    fn ch_names(&self) -> &[String];

    /// Read channels `picks` over the half-open sample range `start..stop`.
    ///
    /// Returns a `picks.len() × (stop - start)` block and the time of each
    /// sample in seconds relative to the first sample.
    fn read(&self, picks: &[usize], start: usize, stop: usize) -> Result<(Array2<f64>, Array1<f64>)>;

    /// Index of the last sample, inclusive; `None` for an empty recording.
    fn last_sample(&self) -> Option<usize> {
        (self.n_samples() > 0).then(|| self.first_sample() + self.n_samples() - 1)
    }
}

/// In-memory recording.
#[derive(Debug, Clone)]
pub struct ArraySource {
    data: Array2<f64>,
    ch_names: Vec<String>,
    sfreq: f64,
    first_sample: usize,
}

impl ArraySource {
    /// Wrap a `channels × samples` array.
    pub fn new(data: Array2<f64>, ch_names: Vec<String>, sfreq: f64) -> Result<Self> {
        if data.nrows() != ch_names.len() {
            return Err(CovError::NameCountMismatch {
                expected: data.nrows(),
                actual: ch_names.len(),
            });
        }
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(CovError::InvalidParameter(format!(
                "sampling rate must be positive, got {sfreq}"
            )));
        }
        Ok(Self {
            data,
            ch_names,
            sfreq,
            first_sample: 0,
        })
    }

    /// Shift the sample numbering so the recording starts at `first_sample`.
    pub const fn with_first_sample(mut self, first_sample: usize) -> Self {
        self.first_sample = first_sample;
        self
    }
}

impl SampleSource for ArraySource {
    fn sampling_rate(&self) -> f64 {
        self.sfreq
    }

    fn first_sample(&self) -> usize {
        self.first_sample
    }

    fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    fn read(&self, picks: &[usize], start: usize, stop: usize) -> Result<(Array2<f64>, Array1<f64>)> {
        let end = self.first_sample + self.n_samples();
        if start < self.first_sample || stop > end || start > stop {
            return Err(CovError::InvalidParameter(format!(
                "sample range {start}..{stop} outside recording {}..{end}",
                self.first_sample
            )));
        }
        if let Some(&bad) = picks.iter().find(|&&p| p >= self.data.nrows()) {
            return Err(CovError::InvalidParameter(format!(
                "channel index {bad} out of range for {} channels",
                self.data.nrows()
            )));
        }

        let (a, b) = (start - self.first_sample, stop - self.first_sample);
        let block = self.data.slice(s![.., a..b]).select(Axis(0), picks);
        let times = Array1::from_iter((a..b).map(|i| i as f64 / self.sfreq));
        Ok((block, times))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ArraySource {
        let data = Array2::from_shape_fn((3, 10), |(c, t)| (c * 100 + t) as f64);
        ArraySource::new(data, vec!["A".into(), "B".into(), "C".into()], 100.0)
            .unwrap()
            .with_first_sample(50)
    }

    #[test]
    fn test_bounds() {
        let src = source();
        assert_eq!(src.first_sample(), 50);
        assert_eq!(src.last_sample(), Some(59));
        assert_eq!(src.n_samples(), 10);
    }

    #[test]
    fn test_read_picks_and_range() {
        let (block, times) = source().read(&[2, 0], 52, 55).unwrap();
        assert_eq!(block.dim(), (2, 3));
        assert_eq!(block[[0, 0]], 202.0);
        assert_eq!(block[[1, 2]], 4.0);
        assert_eq!(times.len(), 3);
        assert!((times[0] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_read_out_of_range() {
        let src = source();
        assert!(src.read(&[0], 40, 52).is_err());
        assert!(src.read(&[0], 55, 61).is_err());
        assert!(src.read(&[3], 50, 51).is_err());
    }

    #[test]
    fn test_empty_recording_has_no_last_sample() {
        let src = ArraySource::new(Array2::zeros((1, 0)), vec!["A".into()], 10.0).unwrap();
        assert_eq!(src.last_sample(), None);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(ArraySource::new(Array2::zeros((2, 4)), vec!["A".into()], 10.0).is_err());
        assert!(ArraySource::new(Array2::zeros((1, 4)), vec!["A".into()], 0.0).is_err());
    }
}
