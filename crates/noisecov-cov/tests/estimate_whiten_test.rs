//! Estimation and whitening scenarios on synthetic recordings.

use approx::assert_abs_diff_eq;
use ndarray::{Array2, Axis};
use noisecov_cov::proj::PROJ_ITEM_FIELD;
use noisecov_cov::{
    ArraySource, ChannelInfo, ChannelKind, Covariance, CovarianceData, CovarianceKind,
    EstimatorConfig, MeasurementInfo, Projection, StreamingEstimator, WhitenerConfig,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;

const SFREQ: f64 = 1000.0;

fn names() -> Vec<String> {
    ["MEG 0111", "MEG 0121", "EEG 001", "EEG 002"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn info() -> MeasurementInfo {
    MeasurementInfo::new(vec![
        ChannelInfo::new("MEG 0111", ChannelKind::Magnetometer),
        ChannelInfo::new("MEG 0121", ChannelKind::Magnetometer),
        ChannelInfo::new("EEG 001", ChannelKind::Eeg),
        ChannelInfo::new("EEG 002", ChannelKind::Eeg),
    ])
    .unwrap()
}

/// Mixing matrix; the generating covariance is `L·Lᵀ`.
fn mixing() -> Array2<f64> {
    Array2::from_shape_vec(
        (4, 4),
        vec![
            2.0, 0.0, 0.0, 0.0, //
            0.5, 1.5, 0.0, 0.0, //
            0.0, 0.0, 1.4, 0.0, //
            0.0, 0.0, 0.3, 0.8,
        ],
    )
    .unwrap()
}

/// Rows are sinusoids with whole numbers of cycles, so `Z·Zᵀ / n = I`.
fn orthonormal_sources(n: usize) -> Array2<f64> {
    Array2::from_shape_fn((4, n), |(k, t)| {
        let cycles = (k + 1) as f64 * 3.0;
        2.0_f64.sqrt() * (2.0 * PI * cycles * t as f64 / n as f64).sin()
    })
}

fn gaussian_sources(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((4, n), |_| StandardNormal.sample(&mut rng))
}

fn source(z: &Array2<f64>) -> ArraySource {
    ArraySource::new(mixing().dot(z), names(), SFREQ).unwrap()
}

fn full_estimator(chunk_duration: f64) -> StreamingEstimator {
    StreamingEstimator::new(EstimatorConfig {
        kind: CovarianceKind::Full,
        chunk_duration,
    })
}

#[test]
fn test_four_channel_recording_in_chunks_of_100() {
    let truth = mixing().dot(&mixing().t());
    let cov = full_estimator(0.1)
        .estimate(&source(&orthonormal_sources(1000)), None)
        .unwrap();

    assert_eq!(cov.n_free(), 1000);
    assert_eq!(cov.names(), names().as_slice());
    let estimate = cov.data().to_dense();
    for ((i, j), &expected) in truth.indexed_iter() {
        let error = (estimate[[i, j]] - expected).abs();
        assert!(
            error <= 0.05 * expected.abs().max(1e-9),
            "entry ({i}, {j}): {} vs {expected}",
            estimate[[i, j]]
        );
    }
}

#[test]
fn test_gaussian_recording_variances() {
    let truth = mixing().dot(&mixing().t());
    let cov = full_estimator(2.0)
        .estimate(&source(&gaussian_sources(50_000, 2024)), None)
        .unwrap();
    let estimate = cov.data().to_dense();
    for i in 0..4 {
        let relative = (estimate[[i, i]] - truth[[i, i]]).abs() / truth[[i, i]];
        assert!(relative < 0.1, "variance {i} off by {relative}");
    }
}

#[test]
fn test_diagonal_mode_matches_full_mode() {
    let src = source(&gaussian_sources(5_000, 99));
    let full = full_estimator(0.25).estimate(&src, None).unwrap();
    let diagonal = StreamingEstimator::new(EstimatorConfig {
        kind: CovarianceKind::Diagonal,
        chunk_duration: 0.3,
    })
    .estimate(&src, None)
    .unwrap();

    let full = full.data().to_dense();
    let diag = diagonal.data().to_dense();
    for i in 0..4 {
        assert_abs_diff_eq!(diag[[i, i]], full[[i, i]], epsilon = 1e-10);
    }
}

#[test]
fn test_whitened_recording_has_identity_covariance() {
    let z = orthonormal_sources(2000);
    let data = mixing().dot(&z);
    let cov = full_estimator(0.5).estimate(&source(&z), None).unwrap();

    let config = WhitenerConfig {
        mag_reg: 0.0,
        grad_reg: 0.0,
        eeg_reg: 0.0,
        ..Default::default()
    };
    let whitener = cov.whitener(&info(), &config).unwrap();
    assert_eq!(whitener.ch_names, names());
    assert_eq!(whitener.meg_rank, Some(2));
    assert_eq!(whitener.eeg_rank, Some(2));

    let white = whitener.apply(&data).unwrap();
    let n = white.len_of(Axis(1)) as f64;
    let white_cov = white.dot(&white.t()) / n;
    for ((i, j), &x) in white_cov.indexed_iter() {
        let expected = if i == j { 1.0 } else { 0.0 };
        assert_abs_diff_eq!(x, expected, epsilon = 1e-8);
    }
}

#[test]
fn test_average_reference_reduces_eeg_rank() {
    let cov = full_estimator(1.0)
        .estimate(&source(&gaussian_sources(3_000, 5)), None)
        .unwrap();
    let average = Projection::new(
        "Average EEG reference",
        10,
        true,
        vec!["EEG 001".into(), "EEG 002".into()],
        Array2::from_elem((1, 2), 1.0),
    )
    .unwrap();
    let info = info().with_projs(vec![average]);

    let whitener = cov.whitener(&info, &WhitenerConfig::default()).unwrap();
    assert_eq!(whitener.eeg_rank, Some(1));
    assert_eq!(whitener.n_components(), 3);

    // Without PCA the projected EEG block is only invertible thanks to loading
    let config = WhitenerConfig {
        use_pca: false,
        ..Default::default()
    };
    assert_eq!(cov.whitener(&info, &config).unwrap().n_components(), 4);
}

#[test]
fn test_ssp_vectors_remove_exactly_their_rank_on_large_array() {
    const NCHAN: usize = 150;
    const NVEC: usize = 8;
    let mut rng = StdRng::seed_from_u64(7);
    let ch_names: Vec<String> = (0..NCHAN).map(|i| format!("MEG {i:04}")).collect();

    // Well-conditioned full-rank covariance at gradiometer scale
    let b = Array2::from_shape_fn((NCHAN, 4 * NCHAN), |_| {
        let x: f64 = StandardNormal.sample(&mut rng);
        x * 1e-12
    });
    let values = b.dot(&b.t()) / (4 * NCHAN) as f64;
    let cov = Covariance::new(
        CovarianceKind::Full,
        ch_names.clone(),
        CovarianceData::Full(values),
    )
    .unwrap();

    let vectors = Array2::from_shape_fn((NVEC, NCHAN), |_| StandardNormal.sample(&mut rng));
    let ssp = Projection::new("Empty-room PCA", PROJ_ITEM_FIELD, true, ch_names.clone(), vectors)
        .unwrap();
    let info = MeasurementInfo::new(
        ch_names
            .iter()
            .map(|name| ChannelInfo::new(name.as_str(), ChannelKind::Gradiometer))
            .collect(),
    )
    .unwrap()
    .with_projs(vec![ssp]);

    let whitener = cov.whitener(&info, &WhitenerConfig::default()).unwrap();
    assert_eq!(whitener.meg_rank, Some(NCHAN - NVEC));
    assert_eq!(whitener.eeg_rank, None);
    assert_eq!(whitener.n_components(), NCHAN - NVEC);
}
