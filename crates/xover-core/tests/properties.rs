//! Property-based tests for xover-core filter design.
//!
//! Checks the invariants that must hold for every valid parameter set:
//! PEQ center gain, Linkwitz-Riley summation, pole stability, flat gain
//! blocks and linear-phase delay blocks.

use proptest::prelude::*;
use xover_core::{
    FamilyCorrection, FilterSpec, PassBand, apply_correction, design, linear_to_db,
};

const SAMPLE_RATE: f64 = 48000.0;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// For any valid (f0, q, gain), the PEQ magnitude at f0 equals the gain.
    #[test]
    fn peq_center_gain_exact(
        f0 in 20.0f64..20000.0,
        q in 0.1f64..20.0,
        gain_db in -24.0f64..24.0,
    ) {
        let filter = design(&FilterSpec::peq(f0, q, gain_db).unwrap(), SAMPLE_RATE, None).unwrap();
        let h = filter.response_at(f0, SAMPLE_RATE);
        prop_assert!((linear_to_db(h.norm()) - gain_db).abs() < 1e-6,
            "f0={} q={} gain={} got {}", f0, q, gain_db, linear_to_db(h.norm()));
    }

    /// LR4 and LR8 lowpass/highpass pairs sum to unity at the crossover.
    #[test]
    fn linkwitz_riley_pair_sums_to_unity(
        fc in 40.0f64..15000.0,
        order in prop::sample::select(vec![4usize, 8]),
    ) {
        let lp = design(
            &FilterSpec::linkwitz_riley(order, PassBand::Lowpass(fc)).unwrap(),
            SAMPLE_RATE,
            None,
        ).unwrap();
        let hp = design(
            &FilterSpec::linkwitz_riley(order, PassBand::Highpass(fc)).unwrap(),
            SAMPLE_RATE,
            None,
        ).unwrap();
        let sum = lp.response_at(fc, SAMPLE_RATE) + hp.response_at(fc, SAMPLE_RATE);
        prop_assert!((sum.norm() - 1.0).abs() < 1e-6, "fc={} order={} |sum|={}", fc, order, sum.norm());
    }

    /// Every Butterworth section is stable, for all modes and orders.
    #[test]
    fn butterworth_sections_stable(
        order in 1usize..=12,
        low in 20.0f64..5000.0,
        ratio in 1.05f64..4.0,
        mode in 0usize..4,
    ) {
        let high = low * ratio;
        let band = match mode {
            0 => PassBand::Lowpass(low),
            1 => PassBand::Highpass(low),
            2 => PassBand::Bandpass { low, high },
            _ => PassBand::Bandstop { low, high },
        };
        let filter = design(&FilterSpec::butterworth(order, band).unwrap(), SAMPLE_RATE, None).unwrap();
        for section in &filter.sections {
            prop_assert!(section.is_stable(), "unstable section {:?}", section.coefficients());
        }
    }

    /// Gain blocks are flat at 10^(G/20).
    #[test]
    fn gain_block_flat(gain_db in -60.0f64..60.0, f in 1.0f64..23999.0) {
        let filter = design(&FilterSpec::gain(gain_db).unwrap(), SAMPLE_RATE, None).unwrap();
        let h = filter.response_at(f, SAMPLE_RATE);
        prop_assert!((h.norm() - 10f64.powf(gain_db / 20.0)).abs() < 1e-9 * h.norm().max(1.0));
        prop_assert!(h.im.abs() < 1e-12);
    }

    /// Delay blocks have unity magnitude and phase -360·f·τ modulo 360.
    #[test]
    fn delay_block_linear_phase(delay_us in 0.0f64..20000.0, f in 1.0f64..23999.0) {
        let filter = design(&FilterSpec::delay(delay_us).unwrap(), SAMPLE_RATE, None).unwrap();
        let h = filter.response_at(f, SAMPLE_RATE);
        prop_assert!((h.norm() - 1.0).abs() < 1e-9);
        let expected = -360.0 * f * delay_us * 1e-6;
        let diff = (h.arg().to_degrees() - expected).rem_euclid(360.0);
        prop_assert!(diff.min(360.0 - diff) < 1e-6, "diff {}", diff);
    }

    /// Clamps always win over scaled spec values.
    #[test]
    fn clamps_override_scales(
        q in 0.1f64..10.0,
        q_scale in 0.1f64..10.0,
        q_max in 0.2f64..5.0,
        gain_db in -30.0f64..30.0,
        limit in 0.0f64..12.0,
    ) {
        let correction = FamilyCorrection {
            q_scale: Some(q_scale),
            q_max: Some(q_max),
            gain_limit_db: Some(limit),
            ..FamilyCorrection::default()
        };
        let spec = FilterSpec::peq(1000.0, q, gain_db).unwrap();
        match apply_correction(spec.kind(), &correction) {
            xover_core::FilterKind::Peq { q: corrected_q, gain_db: corrected_gain, .. } => {
                prop_assert!(corrected_q <= q_max);
                prop_assert!(corrected_gain.abs() <= limit);
            }
            other => prop_assert!(false, "unexpected kind {:?}", other),
        }
    }
}
