//! Angle helpers for rotation smoothing and unwrapping.

use std::f64::consts::{PI, TAU};

/// Wrap an angle into (-PI, PI].
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid lands on [-PI, PI); fold -PI onto PI
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Signed shortest rotation taking `from` to `to`, in (-PI, PI].
pub fn shortest_angle_delta(from: f64, to: f64) -> f64 {
    wrap_angle(to - from)
}

/// Continue an unwrapped angle sequence with a new (possibly wrapped) sample.
///
/// The result differs from `previous_unwrapped` by the shortest delta to
/// `sample`, so a sample crossing the +-PI seam never produces a 2*PI jump.
pub fn unwrap_angle(previous_unwrapped: f64, sample: f64) -> f64 {
    previous_unwrapped + shortest_angle_delta(previous_unwrapped, sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_keeps_small_angles() {
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_angle(-0.5) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn wrap_folds_full_turns() {
        assert!((wrap_angle(TAU + 0.25) - 0.25).abs() < 1e-12);
        assert!((wrap_angle(-3.0 * TAU - 0.25) + 0.25).abs() < 1e-9);
    }

    #[test]
    fn wrap_maps_minus_pi_to_pi() {
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn shortest_delta_crosses_seam() {
        let from = PI - 0.1;
        let to = -PI + 0.1;
        let delta = shortest_angle_delta(from, to);
        assert!((delta - 0.2).abs() < 1e-12, "got {delta}");
    }

    #[test]
    fn unwrap_continues_past_pi() {
        let mut unwrapped = 0.0;
        for step in 1..=40 {
            let raw = step as f64 * 0.2;
            unwrapped = unwrap_angle(unwrapped, wrap_angle(raw));
            assert!((unwrapped - raw).abs() < 1e-9, "step {step}: {unwrapped} vs {raw}");
        }
    }

    #[test]
    fn non_finite_wraps_to_zero() {
        assert_eq!(wrap_angle(f64::NAN), 0.0);
    }
}
