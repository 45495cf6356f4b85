//! Property-based tests for xover-analysis.
//!
//! Grid construction, measurement interpolation, way summation and the
//! calibration fixed point.

use proptest::prelude::*;
use xover_analysis::{
    CalibrationSolver, Measurement, Way, WayResponse, compose, log_grid, sum,
};
use xover_core::{CorrectionParam, FilterFamily, FilterSpec, PassBand, evaluate_specs};

const SAMPLE_RATE: f64 = 48000.0;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Log grids are strictly ascending and hit both endpoints exactly.
    #[test]
    fn log_grid_ascending_with_exact_ends(
        low in 1.0f64..1000.0,
        ratio in 1.01f64..1000.0,
        points in 2usize..4000,
    ) {
        let high = low * ratio;
        let grid = log_grid(low, high, points).unwrap();
        prop_assert_eq!(grid.len(), points);
        prop_assert_eq!(grid[0], low);
        prop_assert_eq!(grid[points - 1], high);
        prop_assert!(grid.windows(2).all(|w| w[0] < w[1]));
    }

    /// Interpolating a measurement at its own frequencies returns its samples.
    #[test]
    fn interpolation_passes_through_samples(
        mags in prop::collection::vec(-40.0f64..20.0, 2..64),
    ) {
        let n = mags.len();
        let freqs = log_grid(20.0, 20000.0, n).unwrap();
        let phases: Vec<f64> = (0..n).map(|i| -(i as f64) * 3.0).collect();
        let m = Measurement::from_columns(freqs.clone(), mags.clone(), phases).unwrap();
        let (mag, _) = m.interpolate(&freqs).unwrap();
        for (a, b) in mag.iter().zip(&mags) {
            prop_assert!((a - b).abs() < 1e-9);
        }
    }

    /// Summation does not depend on the order of the ways.
    #[test]
    fn sum_is_order_independent(
        fc in 100.0f64..5000.0,
        trim in -12.0f64..12.0,
    ) {
        let grid = log_grid(20.0, 20000.0, 64).unwrap();
        let flat = Measurement::from_columns(grid.clone(), vec![0.0; 64], vec![0.0; 64]).unwrap();
        let low = Way::new("low", flat.clone())
            .with_filter(FilterSpec::butterworth(3, PassBand::Lowpass(fc)).unwrap());
        let high = Way::new("high", flat)
            .with_gain_db(trim)
            .with_filter(FilterSpec::butterworth(3, PassBand::Highpass(fc)).unwrap());

        let a = compose(&low, &grid, SAMPLE_RATE, None).unwrap();
        let b = compose(&high, &grid, SAMPLE_RATE, None).unwrap();
        let ab: WayResponse = sum(&[a.clone(), b.clone()]).unwrap();
        let ba = sum(&[b, a]).unwrap();
        for (x, y) in ab.response().iter().zip(ba.response()) {
            prop_assert!((x - y).norm() < 1e-12);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// A sweep of the uncorrected design fits to unit scales.
    #[test]
    fn unbiased_peq_sweep_fits_unit_scales(
        f0 in 200.0f64..5000.0,
        q in 0.5f64..4.0,
        gain_db in 1.0f64..12.0,
    ) {
        let expected = FilterSpec::peq(f0, q, gain_db).unwrap();
        let grid = log_grid(20.0, 20000.0, 100).unwrap();
        let response = evaluate_specs(&[expected], &grid, SAMPLE_RATE, None).unwrap();
        let sweep = Measurement::from_response(&grid, &response).unwrap();

        let result = CalibrationSolver::default()
            .fit(FilterFamily::Peq, &sweep, &expected, SAMPLE_RATE)
            .unwrap();
        for param in [CorrectionParam::FreqScale, CorrectionParam::GainScale, CorrectionParam::QScale] {
            let value = result.parameter(param).unwrap();
            prop_assert!((value - 1.0).abs() < 1e-5, "{} = {}", param, value);
        }
    }
}
