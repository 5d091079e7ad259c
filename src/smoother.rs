//! Per-feature exponential moving average, keyed by category (§4.2). One
//! smoother state per *feature*; category only selects which time-constant
//! to use.

use std::collections::HashMap;

use crate::feature_key::{Category, FeatureKey};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothingConfig {
    pub position_ms: f64,
    pub movement_ms: f64,
    pub curvature_ms: f64,
    pub gesture_ms: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        SmoothingConfig {
            position_ms: 120.0,
            movement_ms: 120.0,
            curvature_ms: 80.0,
            gesture_ms: 80.0,
        }
    }
}

impl SmoothingConfig {
    fn tau_for(&self, category: Category) -> f64 {
        match category {
            Category::Position => self.position_ms,
            Category::Movement => self.movement_ms,
            Category::Curvature => self.curvature_ms,
            Category::Gesture => self.gesture_ms,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct SmootherState {
    value: f64,
    t_last_ms: u64,
}

/// Smooths every feature key independently. Construction takes the fixed
/// key set up front (§9: "resolution happens once at engine construction
/// into direct handles") so the hot loop never allocates.
pub struct Smoother {
    config: SmoothingConfig,
    state: HashMap<FeatureKey, SmootherState>,
}

impl Smoother {
    pub fn new(config: SmoothingConfig) -> Self {
        Smoother {
            config,
            state: HashMap::new(),
        }
    }

    /// Feed a new raw sample for `key` at time `t_ms`, returning the
    /// smoothed value. The first sample for a key, or one at `t_ms <=
    /// t_last`, passes through unchanged.
    pub fn update(&mut self, key: FeatureKey, raw: f64, t_ms: u64) -> f64 {
        let tau = self.config.tau_for(key.category());

        let Some(prev) = self.state.get(&key).copied() else {
            self.state.insert(key, SmootherState { value: raw, t_last_ms: t_ms });
            return raw;
        };

        if tau <= 0.0 || t_ms <= prev.t_last_ms {
            self.state.insert(key, SmootherState { value: raw, t_last_ms: t_ms });
            return raw;
        }

        let dt = (t_ms - prev.t_last_ms) as f64;
        let alpha = 1.0 - (-dt / tau).exp();
        let smoothed = prev.value + alpha * (raw - prev.value);
        self.state.insert(
            key,
            SmootherState {
                value: smoothed,
                t_last_ms: t_ms,
            },
        );
        smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_key::MotionAxisName;
    use crate::types::Handedness;

    fn key() -> FeatureKey {
        FeatureKey::Motion(Handedness::Right, MotionAxisName::Left)
    }

    #[test]
    fn first_sample_passes_through() {
        let mut s = Smoother::new(SmoothingConfig::default());
        assert_eq!(s.update(key(), 0.5, 0), 0.5);
    }

    #[test]
    fn exponential_smoothing_matches_formula() {
        let mut s = Smoother::new(SmoothingConfig {
            movement_ms: 100.0,
            ..SmoothingConfig::default()
        });
        s.update(key(), 0.0, 0);
        let smoothed = s.update(key(), 1.0, 100);
        let alpha = 1.0 - (-1.0_f64).exp();
        assert!((smoothed - alpha).abs() < 1e-9);
    }

    #[test]
    fn non_increasing_timestamp_resets() {
        let mut s = Smoother::new(SmoothingConfig::default());
        s.update(key(), 0.0, 100);
        let v = s.update(key(), 1.0, 100);
        assert_eq!(v, 1.0);
        let v2 = s.update(key(), 2.0, 50);
        assert_eq!(v2, 2.0);
    }

    #[test]
    fn zero_tau_passes_through_always() {
        let mut s = Smoother::new(SmoothingConfig {
            movement_ms: 0.0,
            ..SmoothingConfig::default()
        });
        s.update(key(), 0.0, 0);
        assert_eq!(s.update(key(), 1.0, 50), 1.0);
    }
}
