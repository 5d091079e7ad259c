//! Feature extractor (§4.1): landmark frame + calibration -> named scalar
//! features, each with a validity bit.

use std::collections::HashMap;

use crate::calibration::{CalibrationSet, Quad};
use crate::feature_key::{CurvDiffName, FeatureKey, MotionAxisName, PosAxisName};
use crate::geometry::{self, Homography};
use crate::types::{HandObservation, Handedness, LandmarkFrame};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureValue {
    pub value: f64,
    pub valid: bool,
}

impl FeatureValue {
    fn invalid() -> Self {
        FeatureValue {
            value: 0.0,
            valid: false,
        }
    }

    fn valid(value: f64) -> Self {
        FeatureValue { value, valid: true }
    }
}

pub type FeatureSet = HashMap<FeatureKey, FeatureValue>;

pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn extract(frame: &LandmarkFrame, calibration: &CalibrationSet) -> FeatureSet {
        let mut out = FeatureSet::with_capacity(FeatureKey::all().len());

        let left = frame.hand(Handedness::Left);
        let right = frame.hand(Handedness::Right);

        for &hand_side in &[Handedness::Left, Handedness::Right] {
            let observation = match hand_side {
                Handedness::Left => left,
                Handedness::Right => right,
            };
            let hand_cal = calibration.hand(hand_side);
            Self::extract_single_hand(hand_side, observation, hand_cal, &mut out);
        }

        let distance = match (left, right) {
            (Some(l), Some(r)) => {
                let (lx, ly) = geometry::palm_center(l);
                let (rx, ry) = geometry::palm_center(r);
                let raw = ((lx - rx).powi(2) + (ly - ry).powi(2)).sqrt();
                let mean_width = (geometry::palm_width(l) + geometry::palm_width(r)) / 2.0;
                if mean_width > 1e-9 {
                    calibration
                        .hands_distance
                        .normalize(raw / mean_width)
                        .map(FeatureValue::valid)
                        .unwrap_or_else(FeatureValue::invalid)
                } else {
                    FeatureValue::invalid()
                }
            }
            _ => FeatureValue::invalid(),
        };
        out.insert(FeatureKey::HandsDistance, distance);

        out
    }

    fn extract_single_hand(
        hand_side: Handedness,
        observation: Option<&HandObservation>,
        cal: &crate::calibration::HandCalibration,
        out: &mut FeatureSet,
    ) {
        let Some(hand) = observation else {
            out.insert(FeatureKey::Motion(hand_side, MotionAxisName::Up), FeatureValue::invalid());
            out.insert(FeatureKey::Motion(hand_side, MotionAxisName::Left), FeatureValue::invalid());
            out.insert(FeatureKey::Pos(hand_side, PosAxisName::X), FeatureValue::invalid());
            out.insert(FeatureKey::Pos(hand_side, PosAxisName::Y), FeatureValue::invalid());
            out.insert(FeatureKey::GestureClosed(hand_side), FeatureValue::invalid());
            out.insert(
                FeatureKey::CurvDiff(hand_side, CurvDiffName::IndexMinusMiddle),
                FeatureValue::invalid(),
            );
            out.insert(
                FeatureKey::CurvDiff(hand_side, CurvDiffName::MiddleMinusAvgIndexRing),
                FeatureValue::invalid(),
            );
            return;
        };

        let center = geometry::palm_center(hand);

        let motion_up = project_motion(center, cal.motion_up);
        let motion_left = project_motion(center, cal.motion_left);
        out.insert(FeatureKey::Motion(hand_side, MotionAxisName::Up), motion_up);
        out.insert(FeatureKey::Motion(hand_side, MotionAxisName::Left), motion_left);

        let (pos_x, pos_y) = position_via_quad(center, cal.quad);
        out.insert(FeatureKey::Pos(hand_side, PosAxisName::X), pos_x);
        out.insert(FeatureKey::Pos(hand_side, PosAxisName::Y), pos_y);

        let raw_closed = geometry::mean_finger_curvature(hand);
        let closed = cal
            .gesture_closed
            .normalize(raw_closed)
            .map(FeatureValue::valid)
            .unwrap_or_else(FeatureValue::invalid);
        out.insert(FeatureKey::GestureClosed(hand_side), closed);

        let raw_im = geometry::curv_diff_index_minus_middle(hand);
        let im = cal
            .curv_diff_index_minus_middle
            .normalize(raw_im)
            .map(FeatureValue::valid)
            .unwrap_or_else(FeatureValue::invalid);
        out.insert(FeatureKey::CurvDiff(hand_side, CurvDiffName::IndexMinusMiddle), im);

        let raw_mar = geometry::curv_diff_middle_minus_avg_index_ring(hand);
        let mar = cal
            .curv_diff_middle_minus_avg_index_ring
            .normalize(raw_mar)
            .map(FeatureValue::valid)
            .unwrap_or_else(FeatureValue::invalid);
        out.insert(
            FeatureKey::CurvDiff(hand_side, CurvDiffName::MiddleMinusAvgIndexRing),
            mar,
        );
    }
}

fn project_motion(center: (f64, f64), axis: crate::calibration::MotionAxis) -> FeatureValue {
    if axis.range_norm.abs() < 1e-12 {
        return FeatureValue::invalid();
    }
    let raw = center.0 * axis.axis.0 + center.1 * axis.axis.1;
    FeatureValue::valid((raw / axis.range_norm).clamp(0.0, 1.0))
}

fn position_via_quad(center: (f64, f64), quad: Quad) -> (FeatureValue, FeatureValue) {
    let dst = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    let Some(homography) = Homography::fit(quad.points, dst) else {
        return (FeatureValue::invalid(), FeatureValue::invalid());
    };
    let (u, v) = homography.apply(center);
    (
        FeatureValue::valid(u.clamp(0.0, 1.0)),
        FeatureValue::valid(v.clamp(0.0, 1.0)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LANDMARK_COUNT, Landmark};

    fn flat_hand(handedness: Handedness, x: f64, y: f64) -> HandObservation {
        HandObservation {
            handedness,
            landmarks: [Landmark::new(x, y, 0.0); LANDMARK_COUNT],
        }
    }

    #[test]
    fn absent_hand_is_invalid_everywhere() {
        let frame = LandmarkFrame::new(0, vec![]);
        let features = FeatureExtractor::extract(&frame, &CalibrationSet::default());
        for key in FeatureKey::all() {
            assert!(!features[&key].valid, "{key} should be invalid");
        }
    }

    #[test]
    fn homography_corners_map_to_unit_square() {
        let quad = Quad::viewport();
        let cal = crate::calibration::HandCalibration {
            quad,
            ..crate::calibration::HandCalibration::default()
        };
        let mut calibration = CalibrationSet::default();
        calibration.right = cal;

        for (corner, expected) in quad.points.iter().zip([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]) {
            let hand = flat_hand(Handedness::Right, corner.0, corner.1);
            let frame = LandmarkFrame::new(0, vec![hand]);
            let features = FeatureExtractor::extract(&frame, &calibration);
            let x = features[&FeatureKey::Pos(Handedness::Right, PosAxisName::X)].value;
            let y = features[&FeatureKey::Pos(Handedness::Right, PosAxisName::Y)].value;
            assert!((x - expected.0).abs() < 1e-6);
            assert!((y - expected.1).abs() < 1e-6);
        }
    }

    #[test]
    fn hands_distance_requires_both_hands() {
        let frame = LandmarkFrame::new(0, vec![flat_hand(Handedness::Left, 0.3, 0.3)]);
        let features = FeatureExtractor::extract(&frame, &CalibrationSet::default());
        assert!(!features[&FeatureKey::HandsDistance].valid);
    }
}
