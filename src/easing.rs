//! Easing curves shared by the time-driven effects.

use serde::{Deserialize, Serialize};

/// Easing curves for time-based interpolation.
///
/// Input is a normalized progress value; it is clamped to 0-1 before the
/// curve is applied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    QuadraticIn,
    QuadraticOut,
    /// Cubic ease-in, `t^3`.
    #[default]
    CubicIn,
    CubicOut,
    CubicInOut,
    ExponentialIn,
    SmoothStep,
    /// Caller-supplied curve.
    #[serde(skip)]
    Custom(fn(f32) -> f32),
}

// `Custom` never compares equal, not even to itself.
impl PartialEq for Easing {
    fn eq(&self, other: &Self) -> bool {
        use Easing::*;
        matches!(
            (self, other),
            (Linear, Linear)
                | (QuadraticIn, QuadraticIn)
                | (QuadraticOut, QuadraticOut)
                | (CubicIn, CubicIn)
                | (CubicOut, CubicOut)
                | (CubicInOut, CubicInOut)
                | (ExponentialIn, ExponentialIn)
                | (SmoothStep, SmoothStep)
        )
    }
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Easing::Linear => t,
            Easing::QuadraticIn => t * t,
            Easing::QuadraticOut => t * (2.0 - t),
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => {
                let t1 = t - 1.0;
                t1 * t1 * t1 + 1.0
            }
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let t1 = 2.0 * t - 2.0;
                    0.5 * t1 * t1 * t1 + 1.0
                }
            }
            Easing::ExponentialIn => {
                if t == 0.0 {
                    0.0
                } else {
                    (2.0_f32).powf(10.0 * (t - 1.0))
                }
            }
            Easing::SmoothStep => t * t * (3.0 - 2.0 * t),
            Easing::Custom(f) => f(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_in_is_default() {
        assert_eq!(Easing::default(), Easing::CubicIn);
        assert!((Easing::default().apply(0.5) - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_input_is_clamped() {
        assert_eq!(Easing::CubicIn.apply(2.0), 1.0);
        assert_eq!(Easing::CubicIn.apply(-1.0), 0.0);
        assert_eq!(Easing::Linear.apply(f32::NAN), 0.0);
    }

    #[test]
    fn test_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::QuadraticIn,
            Easing::QuadraticOut,
            Easing::CubicIn,
            Easing::CubicOut,
            Easing::CubicInOut,
            Easing::SmoothStep,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-6, "{:?}", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{:?}", easing);
        }
    }

    #[test]
    fn test_custom_curve() {
        fn half(t: f32) -> f32 {
            t * 0.5
        }
        assert_eq!(Easing::Custom(half).apply(1.0), 0.5);
    }

    #[test]
    fn test_custom_curves_compare_unequal() {
        fn half(t: f32) -> f32 {
            t * 0.5
        }
        assert_ne!(Easing::Custom(half), Easing::Custom(half));
        assert_ne!(Easing::Custom(half), Easing::Linear);
        assert_eq!(Easing::SmoothStep, Easing::SmoothStep);
        assert_ne!(Easing::CubicIn, Easing::CubicOut);
    }

    #[test]
    fn test_parse_from_config() {
        let e: Easing = serde_json::from_str("\"smooth_step\"").unwrap();
        assert_eq!(e, Easing::SmoothStep);
    }
}
