//! Persisted config (§6): a `serde`-deserializable, all-optional
//! `RawConfig` mirroring the YAML-shaped document, and the
//! validation/autofill pass that turns it into the `Config` the engine
//! binds against. Reading the document off disk is out of scope — this
//! module only deserializes and validates the value.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::feature_key::FeatureKey;
use crate::gate::{CompareOp, LostHandPolicy};
use crate::output::{DeltaAxis, DeltaLostPolicy, Sensitivity, ScreenSize, StatefulKind};
use crate::sink::ButtonId;

#[derive(Clone, Copy, Debug, Deserialize, Default)]
pub struct RawSmoothing {
    pub position: Option<f64>,
    pub movement: Option<f64>,
    pub curvature: Option<f64>,
    pub gesture: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RawMotionAxis {
    pub axis: Option<(f64, f64)>,
    pub range_norm: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RawQuad {
    pub points: Option<[(f64, f64); 4]>,
}

#[derive(Clone, Copy, Debug, Deserialize, Default)]
pub struct RawMinMax {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RawHandCalibration {
    pub motion_up: Option<RawMotionAxis>,
    pub motion_left: Option<RawMotionAxis>,
    pub quad: Option<RawQuad>,
    pub gesture_closed: Option<RawMinMax>,
    pub curv_diff_index_minus_middle: Option<RawMinMax>,
    pub curv_diff_middle_minus_avg_index_ring: Option<RawMinMax>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RawCalibration {
    pub left_hand: Option<RawHandCalibration>,
    pub right_hand: Option<RawHandCalibration>,
    pub hands_distance: Option<RawMinMax>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum RawOutput {
    #[serde(rename = "mouse.move.x")]
    MoveX(RawDeltaBody),
    #[serde(rename = "mouse.move.y")]
    MoveY(RawDeltaBody),
    #[serde(rename = "mouse.scroll.x")]
    ScrollX(RawDeltaBody),
    #[serde(rename = "mouse.scroll.y")]
    ScrollY(RawDeltaBody),
    #[serde(rename = "mouse.pos.x")]
    PosX(RawAbsoluteBody),
    #[serde(rename = "mouse.pos.y")]
    PosY(RawAbsoluteBody),
    #[serde(rename = "mouse.click.left")]
    ClickLeft(RawStatefulBody),
    #[serde(rename = "mouse.click.right")]
    ClickRight(RawStatefulBody),
    #[serde(rename = "mouse.click.middle")]
    ClickMiddle(RawStatefulBody),
    #[serde(rename = "key")]
    Key(RawKeyBody),
    #[serde(rename = "key.edge")]
    Edge(RawEdgeBody),
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawGate {
    pub input: String,
    pub op: String,
    pub trigger_pct: f64,
    pub release_pct: f64,
    #[serde(default)]
    pub refractory_ms: Option<u64>,
    #[serde(default)]
    pub lost_hand_policy: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawDeltaBody {
    pub input: String,
    #[serde(default)]
    pub sensitivity: Option<String>,
    #[serde(default)]
    pub lost_hand_policy: Option<String>,
    #[serde(default)]
    pub gate: Option<RawGate>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawAbsoluteBody {
    pub input: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub gate: Option<RawGate>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawStatefulBody {
    pub input: String,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub trigger_pct: Option<f64>,
    #[serde(default)]
    pub release_pct: Option<f64>,
    #[serde(default)]
    pub refractory_ms: Option<u64>,
    #[serde(default)]
    pub lost_hand_policy: Option<String>,
    #[serde(default)]
    pub gate: Option<RawGate>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawKeyBody {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub trigger_pct: Option<f64>,
    #[serde(default)]
    pub release_pct: Option<f64>,
    #[serde(default)]
    pub refractory_ms: Option<u64>,
    #[serde(default)]
    pub lost_hand_policy: Option<String>,
    #[serde(default)]
    pub gate: Option<RawGate>,
}

/// `{trigger: X.down, release: X.up}` form (§4.4): two distinct one-shot
/// button ids fired on their own edge, rather than one id pressed/released.
#[derive(Clone, Debug, Deserialize)]
pub struct RawEdgeBody {
    pub trigger: String,
    pub release: String,
    pub input: String,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub trigger_pct: Option<f64>,
    #[serde(default)]
    pub release_pct: Option<f64>,
    #[serde(default)]
    pub refractory_ms: Option<u64>,
    #[serde(default)]
    pub lost_hand_policy: Option<String>,
    #[serde(default)]
    pub gate: Option<RawGate>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RawConfig {
    pub version: Option<u32>,
    pub last_camera: Option<String>,
    #[serde(default)]
    pub smoothing: RawSmoothing,
    #[serde(default)]
    pub calibration: RawCalibration,
    #[serde(default)]
    pub outputs: Vec<RawOutput>,
}

/// A bound gate, ready for `Engine` construction.
pub struct GateConfig {
    pub input: FeatureKey,
    pub op: CompareOp,
    pub trigger_pct: f64,
    pub release_pct: f64,
    pub refractory_ms: u64,
    pub lost_hand_policy: LostHandPolicy,
}

pub enum OutputConfig {
    Delta {
        axis: DeltaAxis,
        input: FeatureKey,
        sensitivity: Sensitivity,
        lost_hand_policy: DeltaLostPolicy,
        gate: Option<GateConfig>,
    },
    Absolute {
        axis: crate::output::AbsoluteAxis,
        input: FeatureKey,
        min: f64,
        max: f64,
        gate: Option<GateConfig>,
    },
    Stateful {
        kind: StatefulKind,
        input: FeatureKey,
        op: CompareOp,
        trigger_pct: f64,
        release_pct: f64,
        refractory_ms: u64,
        lost_hand_policy: LostHandPolicy,
        gate: Option<GateConfig>,
    },
}

/// Validated, autofilled config the engine consumes (§6).
pub struct Config {
    pub smoothing: crate::smoother::SmoothingConfig,
    pub calibration: crate::calibration::CalibrationSet,
    pub outputs: Vec<OutputConfig>,
}

fn parse_op(raw: &str, name: &str) -> Result<CompareOp, ConfigError> {
    CompareOp::parse(raw).ok_or_else(|| ConfigError::UnknownKind(format!("{name}: op '{raw}'")))
}

fn parse_lost_hand_policy(raw: Option<&str>, default: LostHandPolicy) -> Result<LostHandPolicy, ConfigError> {
    match raw {
        None => Ok(default),
        Some(s) => LostHandPolicy::parse(s).ok_or_else(|| ConfigError::UnknownKind(format!("lost_hand_policy '{s}'"))),
    }
}

fn parse_delta_lost_hand_policy(raw: Option<&str>) -> Result<DeltaLostPolicy, ConfigError> {
    match raw {
        None => Ok(DeltaLostPolicy::Zero),
        Some(s) => {
            DeltaLostPolicy::parse(s).ok_or_else(|| ConfigError::UnknownKind(format!("lost_hand_policy '{s}'")))
        }
    }
}

fn convert_gate(raw: &RawGate) -> Result<GateConfig, ConfigError> {
    let input = FeatureKey::parse(&raw.input)?;
    let op = parse_op(&raw.op, &raw.input)?;
    let spec_check = crate::gate::HysteresisSpec {
        op,
        trigger_pct: raw.trigger_pct,
        release_pct: raw.release_pct,
        refractory_ms: raw.refractory_ms.unwrap_or(250),
    };
    spec_check.validate(&raw.input)?;
    Ok(GateConfig {
        input,
        op,
        trigger_pct: raw.trigger_pct,
        release_pct: raw.release_pct,
        refractory_ms: spec_check.refractory_ms,
        lost_hand_policy: parse_lost_hand_policy(raw.lost_hand_policy.as_deref(), LostHandPolicy::Release)?,
    })
}

impl RawConfig {
    /// Parse, autofill, and validate. `screen` resolves symbolic
    /// sensitivities and absolute-axis screen-edge defaults.
    pub fn into_config(self, screen: ScreenSize) -> Result<Config, ConfigError> {
        let smoothing = crate::smoother::SmoothingConfig {
            position_ms: self.smoothing.position.unwrap_or(120.0),
            movement_ms: self.smoothing.movement.unwrap_or(120.0),
            curvature_ms: self.smoothing.curvature.unwrap_or(80.0),
            gesture_ms: self.smoothing.gesture.unwrap_or(80.0),
        };

        let calibration = build_calibration(&self.calibration)?;

        let mut outputs = Vec::with_capacity(self.outputs.len());
        for raw in &self.outputs {
            outputs.push(convert_output(raw, screen)?);
        }

        Ok(Config {
            smoothing,
            calibration,
            outputs,
        })
    }
}

/// Degeneracy threshold below which a calibration range normalizes to a
/// permanently invalid feature (`MinMax::normalize`'s own `< 1e-12` cutoff,
/// given headroom so a config is rejected before that silent runtime fallback
/// ever triggers).
const DEGENERATE_SPAN: f64 = 1e-9;

fn build_min_max(raw: Option<&RawMinMax>, default: crate::calibration::MinMax, name: &str) -> Result<crate::calibration::MinMax, ConfigError> {
    let min = raw.and_then(|r| r.min).unwrap_or(default.min);
    let max = raw.and_then(|r| r.max).unwrap_or(default.max);
    if max <= min {
        return Err(ConfigError::InvalidRange {
            name: name.to_string(),
            min,
            max,
        });
    }
    if max - min < DEGENERATE_SPAN {
        return Err(ConfigError::DegenerateCalibration(name.to_string()));
    }
    Ok(crate::calibration::MinMax { min, max })
}

fn build_motion_axis(
    raw: Option<&RawMotionAxis>,
    default: crate::calibration::MotionAxis,
    name: &str,
) -> Result<crate::calibration::MotionAxis, ConfigError> {
    let axis = raw.and_then(|r| r.axis).unwrap_or(default.axis);
    let range_norm = raw.and_then(|r| r.range_norm).unwrap_or(default.range_norm);
    if range_norm.abs() < DEGENERATE_SPAN {
        return Err(ConfigError::DegenerateCalibration(name.to_string()));
    }
    Ok(crate::calibration::MotionAxis { axis, range_norm })
}

fn build_quad(raw: Option<&RawQuad>, default: crate::calibration::Quad) -> crate::calibration::Quad {
    let points = raw.and_then(|r| r.points).unwrap_or(default.points);
    crate::calibration::Quad { points }
}

fn build_hand_calibration(
    raw: Option<&RawHandCalibration>,
    hand_label: &str,
) -> Result<crate::calibration::HandCalibration, ConfigError> {
    let default = crate::calibration::HandCalibration::default();
    Ok(crate::calibration::HandCalibration {
        motion_up: build_motion_axis(
            raw.and_then(|r| r.motion_up.as_ref()),
            default.motion_up,
            &format!("{hand_label}.motion.up"),
        )?,
        motion_left: build_motion_axis(
            raw.and_then(|r| r.motion_left.as_ref()),
            default.motion_left,
            &format!("{hand_label}.motion.left"),
        )?,
        quad: build_quad(raw.and_then(|r| r.quad.as_ref()), default.quad),
        gesture_closed: build_min_max(
            raw.and_then(|r| r.gesture_closed.as_ref()),
            default.gesture_closed,
            &format!("{hand_label}.gesture.closed"),
        )?,
        curv_diff_index_minus_middle: build_min_max(
            raw.and_then(|r| r.curv_diff_index_minus_middle.as_ref()),
            default.curv_diff_index_minus_middle,
            &format!("{hand_label}.curv.diff.index_minus_middle"),
        )?,
        curv_diff_middle_minus_avg_index_ring: build_min_max(
            raw.and_then(|r| r.curv_diff_middle_minus_avg_index_ring.as_ref()),
            default.curv_diff_middle_minus_avg_index_ring,
            &format!("{hand_label}.curv.diff.middle_minus_avg_index_ring"),
        )?,
    })
}

fn build_calibration(raw: &RawCalibration) -> Result<crate::calibration::CalibrationSet, ConfigError> {
    let default = crate::calibration::CalibrationSet::default();
    Ok(crate::calibration::CalibrationSet {
        left: build_hand_calibration(raw.left_hand.as_ref(), "left_hand")?,
        right: build_hand_calibration(raw.right_hand.as_ref(), "right_hand")?,
        hands_distance: build_min_max(raw.hands_distance.as_ref(), default.hands_distance, "hands.distance")?,
    })
}

fn convert_gate_opt(raw: Option<&RawGate>) -> Result<Option<GateConfig>, ConfigError> {
    raw.map(convert_gate).transpose()
}

fn convert_output(raw: &RawOutput, screen: ScreenSize) -> Result<OutputConfig, ConfigError> {
    match raw {
        RawOutput::MoveX(body) => convert_delta(body, DeltaAxis::MoveX, screen, Sensitivity::ScreenWidth),
        RawOutput::MoveY(body) => convert_delta(body, DeltaAxis::MoveY, screen, Sensitivity::ScreenHeight),
        RawOutput::ScrollX(body) => convert_delta(body, DeltaAxis::ScrollX, screen, Sensitivity::Number(120.0)),
        RawOutput::ScrollY(body) => convert_delta(body, DeltaAxis::ScrollY, screen, Sensitivity::Number(120.0)),
        RawOutput::PosX(body) => convert_absolute(body, crate::output::AbsoluteAxis::PosX, 0.0, screen.width as f64),
        RawOutput::PosY(body) => convert_absolute(body, crate::output::AbsoluteAxis::PosY, 0.0, screen.height as f64),
        RawOutput::ClickLeft(body) => convert_stateful(body, StatefulKind::Paired(ButtonId::MouseLeft)),
        RawOutput::ClickRight(body) => convert_stateful(body, StatefulKind::Paired(ButtonId::MouseRight)),
        RawOutput::ClickMiddle(body) => convert_stateful(body, StatefulKind::Paired(ButtonId::MouseMiddle)),
        RawOutput::Key(body) => convert_key(body),
        RawOutput::Edge(body) => convert_edge(body),
    }
}

fn convert_delta(
    body: &RawDeltaBody,
    axis: DeltaAxis,
    screen: ScreenSize,
    default_sensitivity: Sensitivity,
) -> Result<OutputConfig, ConfigError> {
    let input = FeatureKey::parse(&body.input)?;
    let sensitivity = match &body.sensitivity {
        Some(s) => Sensitivity::parse(s)?,
        None => default_sensitivity,
    };
    let _ = screen; // resolved later, at engine construction time
    Ok(OutputConfig::Delta {
        axis,
        input,
        sensitivity,
        lost_hand_policy: parse_delta_lost_hand_policy(body.lost_hand_policy.as_deref())?,
        gate: convert_gate_opt(body.gate.as_ref())?,
    })
}

fn convert_absolute(
    body: &RawAbsoluteBody,
    axis: crate::output::AbsoluteAxis,
    default_min: f64,
    default_max: f64,
) -> Result<OutputConfig, ConfigError> {
    let input = FeatureKey::parse(&body.input)?;
    Ok(OutputConfig::Absolute {
        axis,
        input,
        min: body.min.unwrap_or(default_min),
        max: body.max.unwrap_or(default_max),
        gate: convert_gate_opt(body.gate.as_ref())?,
    })
}

fn convert_stateful(body: &RawStatefulBody, kind: StatefulKind) -> Result<OutputConfig, ConfigError> {
    let input = FeatureKey::parse(&body.input)?;
    let op = parse_op(body.op.as_deref().unwrap_or(">"), &body.input)?;
    let trigger_pct = body.trigger_pct.unwrap_or(0.80);
    let release_pct = body.release_pct.unwrap_or(0.60);
    let refractory_ms = body.refractory_ms.unwrap_or(250);
    let spec = crate::gate::HysteresisSpec {
        op,
        trigger_pct,
        release_pct,
        refractory_ms,
    };
    spec.validate(&body.input)?;
    Ok(OutputConfig::Stateful {
        kind,
        input,
        op,
        trigger_pct,
        release_pct,
        refractory_ms,
        lost_hand_policy: parse_lost_hand_policy(body.lost_hand_policy.as_deref(), LostHandPolicy::Release)?,
        gate: convert_gate_opt(body.gate.as_ref())?,
    })
}

fn convert_key(body: &RawKeyBody) -> Result<OutputConfig, ConfigError> {
    let stateful_body = RawStatefulBody {
        input: body.input.clone(),
        op: body.op.clone(),
        trigger_pct: body.trigger_pct,
        release_pct: body.release_pct,
        refractory_ms: body.refractory_ms,
        lost_hand_policy: body.lost_hand_policy.clone(),
        gate: body.gate.clone(),
    };
    convert_stateful(&stateful_body, StatefulKind::Paired(ButtonId::Key(body.name.clone())))
}

fn convert_edge(body: &RawEdgeBody) -> Result<OutputConfig, ConfigError> {
    let stateful_body = RawStatefulBody {
        input: body.input.clone(),
        op: body.op.clone(),
        trigger_pct: body.trigger_pct,
        release_pct: body.release_pct,
        refractory_ms: body.refractory_ms,
        lost_hand_policy: body.lost_hand_policy.clone(),
        gate: body.gate.clone(),
    };
    convert_stateful(
        &stateful_body,
        StatefulKind::ExplicitEdge {
            trigger: ButtonId::Key(body.trigger.clone()),
            release: ButtonId::Key(body.release.clone()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> ScreenSize {
        ScreenSize { width: 1920, height: 1080 }
    }

    #[test]
    fn empty_config_autofills_smoothing_and_calibration() {
        let raw = RawConfig::default();
        let config = raw.into_config(screen()).unwrap();
        assert_eq!(config.smoothing.position_ms, 120.0);
        assert_eq!(config.smoothing.curvature_ms, 80.0);
        assert_eq!(config.calibration.left.gesture_closed.min, 0.30);
    }

    #[test]
    fn invalid_hysteresis_is_rejected() {
        let raw = RawConfig {
            outputs: vec![RawOutput::ClickLeft(RawStatefulBody {
                input: "right_hand.curv.diff.index_minus_middle".to_string(),
                op: Some(">".to_string()),
                trigger_pct: Some(0.5),
                release_pct: Some(0.9),
                refractory_ms: None,
                lost_hand_policy: None,
                gate: None,
            })],
            ..RawConfig::default()
        };
        let err = raw.into_config(screen()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHysteresis { .. }));
    }

    #[test]
    fn unknown_feature_name_is_rejected() {
        let raw = RawConfig {
            outputs: vec![RawOutput::MoveX(RawDeltaBody {
                input: "middle_hand.motion.up".to_string(),
                sensitivity: None,
                lost_hand_policy: None,
                gate: None,
            })],
            ..RawConfig::default()
        };
        assert!(matches!(
            raw.into_config(screen()).unwrap_err(),
            ConfigError::UnknownFeature(_)
        ));
    }

    #[test]
    fn sensitivity_defaults_to_screen_width_for_move_x() {
        let raw = RawConfig {
            outputs: vec![RawOutput::MoveX(RawDeltaBody {
                input: "right_hand.motion.left".to_string(),
                sensitivity: None,
                lost_hand_policy: None,
                gate: None,
            })],
            ..RawConfig::default()
        };
        let config = raw.into_config(screen()).unwrap();
        match &config.outputs[0] {
            OutputConfig::Delta { sensitivity, .. } => {
                assert_eq!(*sensitivity, Sensitivity::ScreenWidth);
            }
            _ => panic!("expected delta output"),
        }
    }

    #[test]
    fn key_output_uses_named_button_id() {
        let raw = RawConfig {
            outputs: vec![RawOutput::Key(RawKeyBody {
                name: "SPACE".to_string(),
                input: "right_hand.gesture.closed".to_string(),
                op: None,
                trigger_pct: None,
                release_pct: None,
                refractory_ms: None,
                lost_hand_policy: None,
                gate: None,
            })],
            ..RawConfig::default()
        };
        let config = raw.into_config(screen()).unwrap();
        match &config.outputs[0] {
            OutputConfig::Stateful { kind, .. } => {
                assert_eq!(*kind, StatefulKind::Paired(ButtonId::Key("SPACE".to_string())))
            }
            _ => panic!("expected stateful output"),
        }
    }

    #[test]
    fn edge_output_resolves_to_explicit_edge_kind() {
        let raw = RawConfig {
            outputs: vec![RawOutput::Edge(RawEdgeBody {
                trigger: "SCROLL_LOCK.down".to_string(),
                release: "SCROLL_LOCK.up".to_string(),
                input: "right_hand.gesture.closed".to_string(),
                op: None,
                trigger_pct: None,
                release_pct: None,
                refractory_ms: None,
                lost_hand_policy: None,
                gate: None,
            })],
            ..RawConfig::default()
        };
        let config = raw.into_config(screen()).unwrap();
        match &config.outputs[0] {
            OutputConfig::Stateful { kind, .. } => assert_eq!(
                *kind,
                StatefulKind::ExplicitEdge {
                    trigger: ButtonId::Key("SCROLL_LOCK.down".to_string()),
                    release: ButtonId::Key("SCROLL_LOCK.up".to_string()),
                }
            ),
            _ => panic!("expected stateful output"),
        }
    }

    #[test]
    fn degenerate_range_calibration_is_rejected() {
        let raw = RawConfig {
            calibration: RawCalibration {
                hands_distance: Some(RawMinMax { min: Some(0.2), max: Some(0.2 + 1e-12) }),
                ..RawCalibration::default()
            },
            ..RawConfig::default()
        };
        assert!(matches!(
            raw.into_config(screen()).unwrap_err(),
            ConfigError::DegenerateCalibration(_)
        ));
    }
}
