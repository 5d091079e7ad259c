//! Feature naming (§3). Names are resolved once, at engine construction,
//! into this typed key — nothing in the hot loop does string matching.

use std::fmt;

use crate::error::ConfigError;
use crate::types::Handedness;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionAxisName {
    Up,
    Left,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PosAxisName {
    X,
    Y,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurvDiffName {
    IndexMinusMiddle,
    MiddleMinusAvgIndexRing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKey {
    Motion(Handedness, MotionAxisName),
    Pos(Handedness, PosAxisName),
    GestureClosed(Handedness),
    CurvDiff(Handedness, CurvDiffName),
    HandsDistance,
}

/// Smoothing category (§4.2) — selects the time-constant, nothing else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Position,
    Movement,
    Curvature,
    Gesture,
}

impl FeatureKey {
    /// All feature keys the extractor ever produces, in a stable order.
    /// Used to build per-feature runtime state up front.
    pub fn all() -> Vec<FeatureKey> {
        let mut keys = Vec::with_capacity(15);
        for &hand in &[Handedness::Left, Handedness::Right] {
            keys.push(FeatureKey::Motion(hand, MotionAxisName::Up));
            keys.push(FeatureKey::Motion(hand, MotionAxisName::Left));
            keys.push(FeatureKey::Pos(hand, PosAxisName::X));
            keys.push(FeatureKey::Pos(hand, PosAxisName::Y));
            keys.push(FeatureKey::GestureClosed(hand));
            keys.push(FeatureKey::CurvDiff(hand, CurvDiffName::IndexMinusMiddle));
            keys.push(FeatureKey::CurvDiff(
                hand,
                CurvDiffName::MiddleMinusAvgIndexRing,
            ));
        }
        keys.push(FeatureKey::HandsDistance);
        keys
    }

    /// Decided here (not in the source spec, which enumerates only four
    /// smoothing categories for five feature shapes): `hands.distance` is
    /// smoothed as a `gesture` signal, since it behaves like a continuous
    /// hand-shape/configuration measure rather than a position or a raw
    /// per-frame motion delta. See DESIGN.md.
    pub fn category(self) -> Category {
        match self {
            FeatureKey::Motion(_, _) => Category::Movement,
            FeatureKey::Pos(_, _) => Category::Position,
            FeatureKey::GestureClosed(_) => Category::Gesture,
            FeatureKey::CurvDiff(_, _) => Category::Curvature,
            FeatureKey::HandsDistance => Category::Gesture,
        }
    }

    pub fn hand(self) -> Option<Handedness> {
        match self {
            FeatureKey::Motion(h, _)
            | FeatureKey::Pos(h, _)
            | FeatureKey::GestureClosed(h)
            | FeatureKey::CurvDiff(h, _) => Some(h),
            FeatureKey::HandsDistance => None,
        }
    }

    pub fn parse(name: &str) -> Result<FeatureKey, ConfigError> {
        let (hand_part, rest) = name
            .split_once('.')
            .ok_or_else(|| ConfigError::UnknownFeature(name.to_string()))?;

        if hand_part == "hands" && rest == "distance" {
            return Ok(FeatureKey::HandsDistance);
        }

        let hand = match hand_part {
            "left_hand" => Handedness::Left,
            "right_hand" => Handedness::Right,
            _ => return Err(ConfigError::UnknownFeature(name.to_string())),
        };

        let key = match rest {
            "motion.up" => FeatureKey::Motion(hand, MotionAxisName::Up),
            "motion.left" => FeatureKey::Motion(hand, MotionAxisName::Left),
            "pos.x" => FeatureKey::Pos(hand, PosAxisName::X),
            "pos.y" => FeatureKey::Pos(hand, PosAxisName::Y),
            "gesture.closed" => FeatureKey::GestureClosed(hand),
            "curv.diff.index_minus_middle" => {
                FeatureKey::CurvDiff(hand, CurvDiffName::IndexMinusMiddle)
            }
            "curv.diff.middle_minus_avg_index_ring" => {
                FeatureKey::CurvDiff(hand, CurvDiffName::MiddleMinusAvgIndexRing)
            }
            _ => return Err(ConfigError::UnknownFeature(name.to_string())),
        };
        Ok(key)
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKey::Motion(hand, MotionAxisName::Up) => write!(f, "{hand}_hand.motion.up"),
            FeatureKey::Motion(hand, MotionAxisName::Left) => write!(f, "{hand}_hand.motion.left"),
            FeatureKey::Pos(hand, PosAxisName::X) => write!(f, "{hand}_hand.pos.x"),
            FeatureKey::Pos(hand, PosAxisName::Y) => write!(f, "{hand}_hand.pos.y"),
            FeatureKey::GestureClosed(hand) => write!(f, "{hand}_hand.gesture.closed"),
            FeatureKey::CurvDiff(hand, CurvDiffName::IndexMinusMiddle) => {
                write!(f, "{hand}_hand.curv.diff.index_minus_middle")
            }
            FeatureKey::CurvDiff(hand, CurvDiffName::MiddleMinusAvgIndexRing) => {
                write!(f, "{hand}_hand.curv.diff.middle_minus_avg_index_ring")
            }
            FeatureKey::HandsDistance => write!(f, "hands.distance"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_key_through_display_and_parse() {
        for key in FeatureKey::all() {
            let name = key.to_string();
            assert_eq!(FeatureKey::parse(&name).unwrap(), key, "name = {name}");
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(FeatureKey::parse("left_hand.motion.up.extra").is_err());
        assert!(FeatureKey::parse("middle_hand.pos.x").is_err());
        assert!(FeatureKey::parse("nonsense").is_err());
    }
}
