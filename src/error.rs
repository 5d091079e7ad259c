//! Error kinds surfaced to callers (§7). Transient per-tick problems never
//! produce an `Err` anywhere in this crate — they manifest as feature
//! invalidity and policy-driven behavior instead.

use thiserror::Error;

/// Pre-run configuration problems. The engine refuses to start when any of
/// these are present; none of them can occur once `Engine::new` succeeds.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown feature name '{0}'")]
    UnknownFeature(String),

    #[error(
        "hysteresis thresholds invalid for '{name}': op '{op}' requires trigger {rule}, got trigger={trigger} release={release}"
    )]
    InvalidHysteresis {
        name: String,
        op: &'static str,
        rule: &'static str,
        trigger: f64,
        release: f64,
    },

    #[error("unknown output kind '{0}'")]
    UnknownKind(String),

    #[error("unparsable sensitivity '{0}'")]
    UnparsableSensitivity(String),

    #[error("calibration range is degenerate for '{0}' (min == max, or zero-length axis)")]
    DegenerateCalibration(String),

    #[error("'{name}': max ({max}) must be greater than min ({min})")]
    InvalidRange { name: String, min: f64, max: f64 },
}

/// Raised by [`crate::calibration::CalibrationAcquisition::advance`] when a
/// step has not collected enough samples to fit its parameters.
#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("step {0:?} needs at least {1} sample(s), got {2}")]
    NotEnoughSamples(crate::calibration::CalibrationStep, usize, usize),
}
