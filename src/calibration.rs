//! Calibration parameters (§3) and the guided acquisition state machine
//! that produces them (§4.5). Acquisition output is the engine's input:
//! a degenerate commit here (zero-length axis, `min == max`) would make
//! every dependent feature permanently invalid, so `advance()` refuses to
//! commit under-populated steps rather than silently producing one.

use crate::error::CalibrationError;
use crate::geometry;
use crate::types::{HandObservation, Handedness};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionAxis {
    pub axis: (f64, f64),
    pub range_norm: f64,
}

/// Corners in order TL, TR, BR, BL, in camera-normalized coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub points: [(f64, f64); 4],
}

impl Quad {
    pub fn viewport() -> Quad {
        Quad {
            points: [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    /// `(v - min) / (max - min)`, clamped to `[0,1]`. `None` when the
    /// range is degenerate (§3: "a feature ... invalid when min == max").
    pub fn normalize(&self, v: f64) -> Option<f64> {
        let span = self.max - self.min;
        if span.abs() < 1e-12 {
            return None;
        }
        Some(((v - self.min) / span).clamp(0.0, 1.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandCalibration {
    pub motion_up: MotionAxis,
    pub motion_left: MotionAxis,
    pub quad: Quad,
    pub gesture_closed: MinMax,
    pub curv_diff_index_minus_middle: MinMax,
    pub curv_diff_middle_minus_avg_index_ring: MinMax,
}

impl Default for HandCalibration {
    /// Autofill defaults from §6.
    fn default() -> Self {
        HandCalibration {
            motion_up: MotionAxis {
                axis: (0.0, -1.0),
                range_norm: 0.20,
            },
            motion_left: MotionAxis {
                axis: (1.0, 0.0),
                range_norm: 0.20,
            },
            quad: Quad::viewport(),
            gesture_closed: MinMax {
                min: 0.30,
                max: 0.95,
            },
            curv_diff_index_minus_middle: MinMax {
                min: -0.20,
                max: 0.50,
            },
            curv_diff_middle_minus_avg_index_ring: MinMax {
                min: -0.20,
                max: 0.50,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationSet {
    pub left: HandCalibration,
    pub right: HandCalibration,
    pub hands_distance: MinMax,
}

impl Default for CalibrationSet {
    fn default() -> Self {
        CalibrationSet {
            left: HandCalibration::default(),
            right: HandCalibration::default(),
            hands_distance: MinMax { min: 0.10, max: 0.80 },
        }
    }
}

impl CalibrationSet {
    pub fn hand(&self, handedness: Handedness) -> &HandCalibration {
        match handedness {
            Handedness::Left => &self.left,
            Handedness::Right => &self.right,
        }
    }

    pub fn hand_mut(&mut self, handedness: Handedness) -> &mut HandCalibration {
        match handedness {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationStep {
    VerticalAxis,
    HorizontalAxis,
    ClosedRange,
    LeftClickRange,
    RightClickRange,
}

impl CalibrationStep {
    fn next(self) -> Option<CalibrationStep> {
        match self {
            CalibrationStep::VerticalAxis => Some(CalibrationStep::HorizontalAxis),
            CalibrationStep::HorizontalAxis => Some(CalibrationStep::ClosedRange),
            CalibrationStep::ClosedRange => Some(CalibrationStep::LeftClickRange),
            CalibrationStep::LeftClickRange => Some(CalibrationStep::RightClickRange),
            CalibrationStep::RightClickRange => None,
        }
    }

    fn min_samples(self) -> usize {
        match self {
            CalibrationStep::VerticalAxis | CalibrationStep::HorizontalAxis => 2,
            CalibrationStep::ClosedRange
            | CalibrationStep::LeftClickRange
            | CalibrationStep::RightClickRange => 1,
        }
    }
}

enum PendingSamples {
    Points(Vec<(f64, f64)>),
    Scalars(Vec<f64>),
}

impl PendingSamples {
    fn len(&self) -> usize {
        match self {
            PendingSamples::Points(v) => v.len(),
            PendingSamples::Scalars(v) => v.len(),
        }
    }
}

/// Drives one target hand through the five ordered steps of §4.5. Holds
/// its own pending-sample buffer; committed calibration lives in
/// `calibration`, which starts as a clone of whatever was already loaded
/// so that cancelling a step, or stopping partway through, keeps prior
/// values for the steps not yet reached.
pub struct CalibrationAcquisition {
    target: Handedness,
    step: Option<CalibrationStep>,
    pending: PendingSamples,
    calibration: CalibrationSet,
}

impl CalibrationAcquisition {
    pub fn new(target: Handedness, starting_from: CalibrationSet) -> Self {
        Self {
            target,
            step: Some(CalibrationStep::VerticalAxis),
            pending: PendingSamples::Points(Vec::new()),
            calibration: starting_from,
        }
    }

    pub fn target(&self) -> Handedness {
        self.target
    }

    pub fn current_step(&self) -> Option<CalibrationStep> {
        self.step
    }

    pub fn is_done(&self) -> bool {
        self.step.is_none()
    }

    /// Record one frame's hand observation as a sample for the current
    /// step, if there is one. No-op once acquisition has finished.
    pub fn record(&mut self, hand: &HandObservation) {
        let Some(step) = self.step else { return };
        match step {
            CalibrationStep::VerticalAxis | CalibrationStep::HorizontalAxis => {
                if let PendingSamples::Points(points) = &mut self.pending {
                    points.push(geometry::palm_center(hand));
                }
            }
            CalibrationStep::ClosedRange => {
                if let PendingSamples::Scalars(values) = &mut self.pending {
                    values.push(geometry::mean_finger_curvature(hand));
                }
            }
            CalibrationStep::LeftClickRange => {
                if let PendingSamples::Scalars(values) = &mut self.pending {
                    values.push(geometry::curv_diff_index_minus_middle(hand));
                }
            }
            CalibrationStep::RightClickRange => {
                if let PendingSamples::Scalars(values) = &mut self.pending {
                    values.push(geometry::curv_diff_middle_minus_avg_index_ring(hand));
                }
            }
        }
    }

    /// Discard the current step's pending samples, keeping prior
    /// calibration and staying on the same step so the user can retry.
    pub fn cancel_step(&mut self) {
        if let Some(step) = self.step {
            self.pending = Self::fresh_buffer(step);
        }
    }

    fn fresh_buffer(step: CalibrationStep) -> PendingSamples {
        match step {
            CalibrationStep::VerticalAxis | CalibrationStep::HorizontalAxis => {
                PendingSamples::Points(Vec::new())
            }
            _ => PendingSamples::Scalars(Vec::new()),
        }
    }

    /// Fit and commit the current step's parameters, then move to the
    /// next step (or finish). Rejects (leaving state unchanged) when the
    /// step hasn't collected enough samples to fit.
    pub fn advance(&mut self) -> Result<(), CalibrationError> {
        let Some(step) = self.step else {
            return Ok(());
        };
        let have = self.pending.len();
        let need = step.min_samples();
        if have < need {
            return Err(CalibrationError::NotEnoughSamples(step, need, have));
        }

        match step {
            CalibrationStep::VerticalAxis => {
                let PendingSamples::Points(points) = &self.pending else {
                    unreachable!()
                };
                let Some(raw_axis) = geometry::fit_principal_axis(points) else {
                    return Err(CalibrationError::NotEnoughSamples(step, need, have));
                };
                // Upward-in-frame (smaller y) must project positive.
                let axis = if raw_axis.1 > 0.0 {
                    (-raw_axis.0, -raw_axis.1)
                } else {
                    raw_axis
                };
                let range_norm = sweep(points, axis);
                self.hand_mut().motion_up = MotionAxis { axis, range_norm };
            }
            CalibrationStep::HorizontalAxis => {
                let PendingSamples::Points(points) = &self.pending else {
                    unreachable!()
                };
                let Some(raw_axis) = geometry::fit_principal_axis(points) else {
                    return Err(CalibrationError::NotEnoughSamples(step, need, have));
                };
                let vertical = self.hand().motion_up.axis;
                let Some(orthogonal) = geometry::orthogonalize(raw_axis, vertical) else {
                    return Err(CalibrationError::NotEnoughSamples(step, need, have));
                };
                // Leftward-in-frame (smaller x) must project positive.
                let axis = if orthogonal.0 > 0.0 {
                    (-orthogonal.0, -orthogonal.1)
                } else {
                    orthogonal
                };
                let range_norm = sweep(points, axis);
                self.hand_mut().motion_left = MotionAxis { axis, range_norm };
            }
            CalibrationStep::ClosedRange => {
                let PendingSamples::Scalars(values) = &self.pending else {
                    unreachable!()
                };
                self.hand_mut().gesture_closed = extremes(values);
            }
            CalibrationStep::LeftClickRange => {
                let PendingSamples::Scalars(values) = &self.pending else {
                    unreachable!()
                };
                self.hand_mut().curv_diff_index_minus_middle = extremes(values);
            }
            CalibrationStep::RightClickRange => {
                let PendingSamples::Scalars(values) = &self.pending else {
                    unreachable!()
                };
                self.hand_mut().curv_diff_middle_minus_avg_index_ring = extremes(values);
            }
        }

        log::info!("calibration step {step:?} committed for {}", self.target);
        self.step = step.next();
        self.pending = self.step.map(Self::fresh_buffer).unwrap_or(PendingSamples::Scalars(Vec::new()));
        Ok(())
    }

    /// Consumes the acquisition, returning the calibration set it was
    /// building (possibly mid-flight, if the caller finished early).
    pub fn into_calibration(self) -> CalibrationSet {
        self.calibration
    }

    fn hand(&self) -> &HandCalibration {
        self.calibration.hand(self.target)
    }

    fn hand_mut(&mut self) -> &mut HandCalibration {
        self.calibration.hand_mut(self.target)
    }
}

fn sweep(points: &[(f64, f64)], axis: (f64, f64)) -> f64 {
    let projections: Vec<f64> = points.iter().map(|p| p.0 * axis.0 + p.1 * axis.1).collect();
    let min = projections.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = projections.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    max - min
}

fn extremes(values: &[f64]) -> MinMax {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    MinMax { min, max }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LANDMARK_COUNT, Landmark};

    fn hand_at(handedness: Handedness, x: f64, y: f64) -> HandObservation {
        // Flat hand with every landmark at the same point means
        // palm_center == (x, y) exactly.
        HandObservation {
            handedness,
            landmarks: [Landmark::new(x, y, 0.0); LANDMARK_COUNT],
        }
    }

    #[test]
    fn vertical_axis_fit_matches_s5() {
        let mut acq = CalibrationAcquisition::new(Handedness::Left, CalibrationSet::default());
        for i in 0..=60 {
            let y = 0.2 + (i as f64 / 60.0) * 0.6;
            acq.record(&hand_at(Handedness::Left, 0.5, y));
        }
        acq.advance().unwrap();
        let axis = acq.hand().motion_up;
        assert!((axis.axis.0).abs() < 1e-6);
        assert!((axis.axis.1 - -1.0).abs() < 1e-3);
        assert!((axis.range_norm - 0.6).abs() < 1e-3);
    }

    #[test]
    fn advance_rejects_under_populated_step() {
        let mut acq = CalibrationAcquisition::new(Handedness::Right, CalibrationSet::default());
        acq.record(&hand_at(Handedness::Right, 0.5, 0.5));
        let err = acq.advance().unwrap_err();
        assert_eq!(
            err,
            CalibrationError::NotEnoughSamples(CalibrationStep::VerticalAxis, 2, 1)
        );
        assert_eq!(acq.current_step(), Some(CalibrationStep::VerticalAxis));
    }

    #[test]
    fn cancel_step_discards_pending_but_keeps_prior_calibration() {
        let mut base = CalibrationSet::default();
        base.left.gesture_closed = MinMax { min: 0.1, max: 0.9 };
        let mut acq = CalibrationAcquisition::new(Handedness::Left, base);
        acq.step = Some(CalibrationStep::ClosedRange);
        acq.pending = PendingSamples::Scalars(vec![0.4, 0.6]);
        acq.cancel_step();
        assert_eq!(acq.pending.len(), 0);
        assert_eq!(acq.hand().gesture_closed, MinMax { min: 0.1, max: 0.9 });
    }

    #[test]
    fn full_sequence_reaches_done() {
        let mut acq = CalibrationAcquisition::new(Handedness::Left, CalibrationSet::default());
        for i in 0..=10 {
            let y = 0.2 + (i as f64 / 10.0) * 0.6;
            acq.record(&hand_at(Handedness::Left, 0.5, y));
        }
        acq.advance().unwrap();
        for i in 0..=10 {
            let x = 0.2 + (i as f64 / 10.0) * 0.6;
            acq.record(&hand_at(Handedness::Left, x, 0.5));
        }
        acq.advance().unwrap();
        for step_values in [[0.2, 0.9], [-0.1, 0.4], [-0.1, 0.4]] {
            for v in step_values {
                match &mut acq.pending {
                    PendingSamples::Scalars(buf) => buf.push(v),
                    _ => unreachable!(),
                }
            }
            acq.advance().unwrap();
        }
        assert!(acq.is_done());
    }
}
