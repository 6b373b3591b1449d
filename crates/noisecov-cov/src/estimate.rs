//! Streaming covariance estimation
//!
//! The recording is read in fixed-length chunks. Each chunk contributes
//! `X·Xᵀ` (full) or its per-channel sum of squares (diagonal) to a running
//! total, and the result is the total divided by the pooled sample count.
//! The data are not mean-corrected.

use crate::config::EstimatorConfig;
use crate::error::{CovError, Result};
use crate::kind::CovarianceKind;
use crate::model::{Covariance, CovarianceData};
use crate::source::SampleSource;
use ndarray::{Array1, Array2, Axis};

/// Running sum for one estimation pass.
#[derive(Debug)]
enum Accumulator {
    Full(Array2<f64>),
    Diagonal(Array1<f64>),
}

impl Accumulator {
    fn add(&mut self, chunk: &Array2<f64>) {
        match self {
            Self::Full(sum) => *sum += &chunk.dot(&chunk.t()),
            Self::Diagonal(sum) => *sum += &chunk.mapv(|x| x * x).sum_axis(Axis(1)),
        }
    }

    fn finish(self, n_samples: usize) -> CovarianceData {
        let n = n_samples as f64;
        match self {
            Self::Full(sum) => CovarianceData::Full(sum / n),
            Self::Diagonal(sum) => CovarianceData::Diagonal(sum / n),
        }
    }
}

/// Estimates a noise covariance from a [`SampleSource`] in bounded memory.
#[derive(Debug, Clone, Default)]
pub struct StreamingEstimator {
    config: EstimatorConfig,
}

impl StreamingEstimator {
    /// Create an estimator.
    pub const fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Estimator configuration.
    pub const fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimate the covariance of channels `picks` (all channels if `None`).
    ///
    /// The returned model carries the picked channel names and
    /// `n_free` equal to the number of samples read.
    ///
    /// # Errors
    /// * [`CovError::UnsupportedKind`] for sparse estimation, before any read
    /// * [`CovError::InvalidChunkDuration`] if a chunk would hold no sample
    /// * [`CovError::EmptyRecording`] if the source has no samples
    pub fn estimate<S: SampleSource + ?Sized>(
        &self,
        source: &S,
        picks: Option<&[usize]>,
    ) -> Result<Covariance> {
        let kind = self.config.kind;
        if kind == CovarianceKind::Sparse {
            return Err(CovError::UnsupportedKind(kind));
        }

        let quantum = self.config.chunk_duration * source.sampling_rate();
        if !quantum.is_finite() || quantum.round() < 1.0 {
            return Err(CovError::InvalidChunkDuration(self.config.chunk_duration));
        }
        let quantum = quantum.round() as usize;

        let all: Vec<usize>;
        let picks = match picks {
            Some(p) => p,
            None => {
                all = (0..source.ch_names().len()).collect();
                &all
            }
        };
        let names = picks
            .iter()
            .map(|&p| {
                source.ch_names().get(p).cloned().ok_or_else(|| {
                    CovError::InvalidParameter(format!("channel index {p} out of range"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let Some(last) = source.last_sample() else {
            return Err(CovError::EmptyRecording);
        };
        let start = source.first_sample();
        let stop = last + 1;

        let nchan = picks.len();
        let mut acc = match kind {
            CovarianceKind::Diagonal => Accumulator::Diagonal(Array1::zeros(nchan)),
            _ => Accumulator::Full(Array2::zeros((nchan, nchan))),
        };

        let mut n_samples = 0;
        for first in (start..stop).step_by(quantum) {
            let last = (first + quantum).min(stop);
            let (data, _times) = source.read(picks, first, last)?;
            acc.add(&data);
            n_samples += data.ncols();
            log::debug!("Read samples {first}..{last} ({} in total)", n_samples);
        }

        if n_samples == 0 {
            return Err(CovError::EmptyRecording);
        }
        log::info!(
            "Estimated {kind} covariance from {n_samples} samples on {nchan} channels"
        );

        let n_free = i64::try_from(n_samples)
            .map_err(|_| CovError::InvalidParameter(format!("{n_samples} samples")))?;
        Ok(Covariance::new(kind, names, acc.finish(n_samples))?.with_n_free(n_free))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ArraySource;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};
    use rstest::rstest;

    fn recording(nchan: usize, n: usize, seed: u64) -> ArraySource {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let data = Array2::from_shape_fn((nchan, n), |(c, _)| {
            (c as f64 + 1.0) * normal.sample(&mut rng)
        });
        let names = (0..nchan).map(|c| format!("CH{c:03}")).collect();
        ArraySource::new(data, names, 100.0).unwrap().with_first_sample(17)
    }

    fn estimator(kind: CovarianceKind, chunk_duration: f64) -> StreamingEstimator {
        StreamingEstimator::new(EstimatorConfig {
            kind,
            chunk_duration,
        })
    }

    #[rstest]
    #[case(0.13, 2.0)]
    #[case(1.0, 0.07)]
    #[case(0.5, 100.0)]
    fn test_chunk_size_invariance(#[case] x: f64, #[case] y: f64) {
        let src = recording(3, 503, 7);
        let a = estimator(CovarianceKind::Full, x).estimate(&src, None).unwrap();
        let b = estimator(CovarianceKind::Full, y).estimate(&src, None).unwrap();
        assert_eq!(a.n_free(), 503);
        assert_eq!(b.n_free(), 503);
        let (a, b) = (a.data().to_dense(), b.data().to_dense());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_diagonal_matches_full_diagonal() {
        let src = recording(4, 2000, 11);
        let full = estimator(CovarianceKind::Full, 1.0).estimate(&src, None).unwrap();
        let diag = estimator(CovarianceKind::Diagonal, 1.0)
            .estimate(&src, None)
            .unwrap();
        assert!(diag.is_diagonal());
        assert_eq!(diag.kind(), CovarianceKind::Diagonal);
        let CovarianceData::Diagonal(variances) = diag.data() else {
            panic!("expected diagonal data");
        };
        let full = full.data().to_dense();
        for (i, &v) in variances.iter().enumerate() {
            assert_abs_diff_eq!(v, full[[i, i]], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_picks_select_names() {
        let src = recording(4, 100, 3);
        let cov = StreamingEstimator::default()
            .estimate(&src, Some(&[3, 1]))
            .unwrap();
        assert_eq!(cov.names(), &["CH003".to_string(), "CH001".to_string()]);
        assert_eq!(cov.dim(), 2);

        assert!(StreamingEstimator::default().estimate(&src, Some(&[9])).is_err());
    }

    #[test]
    fn test_sparse_rejected_before_reading() {
        struct Unreadable;
        impl SampleSource for Unreadable {
            fn sampling_rate(&self) -> f64 {
                100.0
            }
            fn first_sample(&self) -> usize {
                0
            }
            fn n_samples(&self) -> usize {
                10
            }
            fn ch_names(&self) -> &[String] {
                &[]
            }
            fn read(&self, _: &[usize], _: usize, _: usize) -> Result<(Array2<f64>, Array1<f64>)> {
                panic!("read must not be called");
            }
        }
        let result = estimator(CovarianceKind::Sparse, 1.0).estimate(&Unreadable, None);
        assert!(matches!(
            result,
            Err(CovError::UnsupportedKind(CovarianceKind::Sparse))
        ));
    }

    #[rstest]
    #[case(0.0)]
    #[case(0.004)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    fn test_invalid_chunk_duration(#[case] seconds: f64) {
        let result = estimator(CovarianceKind::Full, seconds).estimate(&recording(2, 10, 1), None);
        assert!(matches!(result, Err(CovError::InvalidChunkDuration(_))));
    }

    #[test]
    fn test_empty_recording() {
        let src = ArraySource::new(Array2::zeros((2, 0)), vec!["A".into(), "B".into()], 100.0)
            .unwrap();
        let result = StreamingEstimator::default().estimate(&src, None);
        assert!(matches!(result, Err(CovError::EmptyRecording)));
    }
}
