//! Output evaluator (§4.4): the three output-binding kinds, each
//! maintaining its own runtime state and emitting zero or more pending
//! axis/button emissions. Emissions are collected rather than sent to the
//! sink directly so the engine can combine same-tick axis pairs into a
//! single `set_position`/`move_relative`/`scroll` call (§5 ordering
//! guarantee: "the last value within a frame wins for each axis").

use crate::error::ConfigError;
use crate::feature_key::FeatureKey;
use crate::features::FeatureSet;
use crate::gate::{Gate, HysteresisSpec, HysteresisState, LostHandPolicy};
use crate::sink::ButtonId;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sensitivity {
    Number(f64),
    ScreenWidth,
    ScreenHeight,
    NegScreenWidth,
    NegScreenHeight,
}

impl Sensitivity {
    pub fn parse(raw: &str) -> Result<Sensitivity, ConfigError> {
        match raw {
            "screen.width" => Ok(Sensitivity::ScreenWidth),
            "screen.height" => Ok(Sensitivity::ScreenHeight),
            "-screen.width" => Ok(Sensitivity::NegScreenWidth),
            "-screen.height" => Ok(Sensitivity::NegScreenHeight),
            other => other
                .parse::<f64>()
                .map(Sensitivity::Number)
                .map_err(|_| ConfigError::UnparsableSensitivity(other.to_string())),
        }
    }

    pub fn resolve(self, screen: ScreenSize) -> f64 {
        match self {
            Sensitivity::Number(n) => n,
            Sensitivity::ScreenWidth => screen.width as f64,
            Sensitivity::ScreenHeight => screen.height as f64,
            Sensitivity::NegScreenWidth => -(screen.width as f64),
            Sensitivity::NegScreenHeight => -(screen.height as f64),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaLostPolicy {
    Zero,
    Min,
    Max,
    Center,
    Hold,
    Numeric(i64), // millis of the substituted value, to keep the enum Eq
}

impl DeltaLostPolicy {
    pub fn numeric(v: f64) -> DeltaLostPolicy {
        DeltaLostPolicy::Numeric((v * 1000.0).round() as i64)
    }

    pub fn parse(raw: &str) -> Option<DeltaLostPolicy> {
        match raw {
            "zero" => Some(DeltaLostPolicy::Zero),
            "min" => Some(DeltaLostPolicy::Min),
            "max" => Some(DeltaLostPolicy::Max),
            "center" => Some(DeltaLostPolicy::Center),
            "hold" => Some(DeltaLostPolicy::Hold),
            other => other.parse::<f64>().ok().map(DeltaLostPolicy::numeric),
        }
    }

    fn substitute(self, v_prev: Option<f64>) -> Option<f64> {
        match self {
            DeltaLostPolicy::Zero => None,
            DeltaLostPolicy::Hold => v_prev,
            DeltaLostPolicy::Min => Some(0.0),
            DeltaLostPolicy::Max => Some(1.0),
            DeltaLostPolicy::Center => Some(0.5),
            DeltaLostPolicy::Numeric(milli) => Some(milli as f64 / 1000.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaAxis {
    MoveX,
    MoveY,
    ScrollX,
    ScrollY,
}

#[derive(Clone, Copy, Debug, Default)]
struct DeltaState {
    v_prev: Option<f64>,
    residual: f64,
}

pub struct DeltaBinding {
    pub axis: DeltaAxis,
    pub input: FeatureKey,
    pub sensitivity: Sensitivity,
    pub gate: Option<Gate>,
    pub lost_hand_policy: DeltaLostPolicy,
    state: DeltaState,
}

impl DeltaBinding {
    pub fn new(
        axis: DeltaAxis,
        input: FeatureKey,
        sensitivity: Sensitivity,
        gate: Option<Gate>,
        lost_hand_policy: DeltaLostPolicy,
    ) -> Self {
        DeltaBinding {
            axis,
            input,
            sensitivity,
            gate,
            lost_hand_policy,
            state: DeltaState::default(),
        }
    }

    pub fn evaluate(
        &mut self,
        features: &FeatureSet,
        screen: ScreenSize,
        t_ms: u64,
    ) -> Option<(DeltaAxis, i32)> {
        let gate_on = self
            .gate
            .as_mut()
            .map(|g| g.evaluate(features, t_ms))
            .unwrap_or(true);

        let feature = features.get(&self.input).copied();
        let valid = feature.map(|f| f.valid).unwrap_or(false);

        let effective = if valid {
            feature.unwrap().value
        } else {
            match self.lost_hand_policy.substitute(self.state.v_prev) {
                Some(v) => v,
                None => {
                    // `zero` policy: fresh baseline on next engage.
                    self.state.v_prev = None;
                    self.state.residual = 0.0;
                    return None;
                }
            }
        };

        if !gate_on {
            // Still track the baseline so re-engaging doesn't jump.
            self.state.v_prev = Some(effective);
            return None;
        }

        let Some(prev) = self.state.v_prev else {
            self.state.v_prev = Some(effective);
            return None;
        };
        self.state.v_prev = Some(effective);

        let delta = effective - prev;
        let scaled = self.sensitivity.resolve(screen) * delta + self.state.residual;
        let whole = scaled.trunc();
        self.state.residual = scaled - whole;
        let pixels = whole as i32;
        if pixels == 0 {
            None
        } else {
            Some((self.axis, pixels))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbsoluteAxis {
    PosX,
    PosY,
}

pub struct AbsoluteBinding {
    pub axis: AbsoluteAxis,
    pub input: FeatureKey,
    pub min: f64,
    pub max: f64,
    pub gate: Option<Gate>,
}

impl AbsoluteBinding {
    pub fn new(axis: AbsoluteAxis, input: FeatureKey, min: f64, max: f64, gate: Option<Gate>) -> Self {
        AbsoluteBinding {
            axis,
            input,
            min,
            max,
            gate,
        }
    }

    /// Default (and only implemented) `lost_hand_policy` is `hold`
    /// (§4.4): on gate-false or hand-lost, emit nothing and let the sink
    /// retain whatever position it last committed.
    pub fn evaluate(&mut self, features: &FeatureSet, t_ms: u64) -> Option<(AbsoluteAxis, i32)> {
        let gate_on = self
            .gate
            .as_mut()
            .map(|g| g.evaluate(features, t_ms))
            .unwrap_or(true);
        if !gate_on {
            return None;
        }
        let feature = features.get(&self.input).copied()?;
        if !feature.valid {
            return None;
        }
        let v = feature.value.clamp(0.0, 1.0);
        let pos = self.min + v * (self.max - self.min);
        Some((self.axis, pos.round() as i32))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatefulKind {
    /// `mouse.click.*` / `key.<NAME>`: a press/release pair on one id.
    Paired(ButtonId),
    /// `{trigger: X.down, release: X.up}`: two distinct one-shot ids,
    /// each fired (as a momentary `down=true` event) on its own edge.
    ExplicitEdge { trigger: ButtonId, release: ButtonId },
}

pub struct StatefulBinding {
    pub kind: StatefulKind,
    pub input: FeatureKey,
    pub spec: HysteresisSpec,
    pub gate: Option<Gate>,
    pub lost_hand_policy: LostHandPolicy,
    state: HysteresisState,
    toggled_on_loss: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatefulEmission {
    Button(ButtonId, bool),
}

impl StatefulBinding {
    pub fn new(
        kind: StatefulKind,
        input: FeatureKey,
        spec: HysteresisSpec,
        gate: Option<Gate>,
        lost_hand_policy: LostHandPolicy,
    ) -> Self {
        StatefulBinding {
            kind,
            input,
            spec,
            gate,
            lost_hand_policy,
            state: HysteresisState::default(),
            toggled_on_loss: false,
        }
    }

    pub fn pressed(&self) -> bool {
        self.state.on
    }

    fn emit_for_transition(&self, now_pressed: bool) -> StatefulEmission {
        match &self.kind {
            StatefulKind::Paired(id) => StatefulEmission::Button(id.clone(), now_pressed),
            StatefulKind::ExplicitEdge { trigger, release } => {
                if now_pressed {
                    StatefulEmission::Button(trigger.clone(), true)
                } else {
                    StatefulEmission::Button(release.clone(), true)
                }
            }
        }
    }

    pub fn evaluate(&mut self, features: &FeatureSet, t_ms: u64) -> Vec<StatefulEmission> {
        let mut emissions = Vec::new();

        let gate_on = self
            .gate
            .as_mut()
            .map(|g| g.evaluate(features, t_ms))
            .unwrap_or(true);

        if !gate_on {
            // Gate-false: immediate forced release, bypassing refractory;
            // no press edges emitted while false (§4.4).
            if self.state.force(false, t_ms) {
                emissions.push(self.emit_for_transition(false));
            }
            self.toggled_on_loss = false;
            return emissions;
        }

        let feature = features.get(&self.input).copied();
        let valid = feature.map(|f| f.valid).unwrap_or(false);

        if !valid {
            match self.lost_hand_policy {
                LostHandPolicy::Release => {
                    if self.state.force(false, t_ms) {
                        emissions.push(self.emit_for_transition(false));
                    }
                    self.toggled_on_loss = false;
                }
                LostHandPolicy::Hold => {}
                LostHandPolicy::True => {
                    if self.state.force(true, t_ms) {
                        emissions.push(self.emit_for_transition(true));
                    }
                }
                LostHandPolicy::Toggle => {
                    if !self.toggled_on_loss {
                        let now = !self.state.on;
                        if self.state.force(now, t_ms) {
                            emissions.push(self.emit_for_transition(now));
                        }
                        self.toggled_on_loss = true;
                    }
                }
            }
            return emissions;
        }

        self.toggled_on_loss = false;
        if let Some(now_on) = self.state.step(&self.spec, feature.unwrap().value, t_ms) {
            emissions.push(self.emit_for_transition(now_on));
        }
        emissions
    }

    /// Best-effort release at shutdown/fatal-error time (§5, §7): if
    /// currently pressed, force a release regardless of refractory.
    pub fn release_if_pressed(&mut self, t_ms: u64) -> Option<StatefulEmission> {
        if self.state.force(false, t_ms) {
            Some(self.emit_for_transition(false))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_key::MotionAxisName;
    use crate::features::FeatureValue;
    use crate::gate::{CompareOp, GateComponent};
    use crate::types::Handedness;

    fn key() -> FeatureKey {
        FeatureKey::Motion(Handedness::Right, MotionAxisName::Left)
    }

    fn features_with(v: f64, valid: bool) -> FeatureSet {
        let mut fs = FeatureSet::new();
        fs.insert(key(), FeatureValue { value: v, valid });
        fs
    }

    #[test]
    fn delta_accumulates_fractional_residual_and_sums_correctly() {
        let mut binding = DeltaBinding::new(
            DeltaAxis::MoveX,
            key(),
            Sensitivity::Number(1000.0),
            None,
            DeltaLostPolicy::Zero,
        );
        let screen = ScreenSize { width: 1920, height: 1080 };
        let values = [0.1000, 0.1004, 0.1008, 0.1012];
        let mut total = 0i32;
        for (i, &v) in values.iter().enumerate() {
            if let Some((_, px)) = binding.evaluate(&features_with(v, true), screen, i as u64) {
                total += px;
            }
        }
        let expected = ((values[3] - values[0]) * 1000.0).round() as i32;
        assert!((total - expected).abs() <= 1, "total={total} expected={expected}");
    }

    #[test]
    fn delta_gate_false_updates_baseline_without_emitting() {
        let component = GateComponent::new(
            key(),
            HysteresisSpec {
                op: CompareOp::GreaterThan,
                trigger_pct: 0.9,
                release_pct: 0.1,
                refractory_ms: 0,
            },
            LostHandPolicy::Hold,
        );
        let mut binding = DeltaBinding::new(
            DeltaAxis::MoveX,
            key(),
            Sensitivity::Number(1000.0),
            Some(Gate::single(component)),
            DeltaLostPolicy::Zero,
        );
        let screen = ScreenSize { width: 100, height: 100 };
        // Gate stays closed (feature never exceeds 0.9): no emissions ever,
        // but v_prev keeps tracking so re-engaging won't jump.
        assert!(binding.evaluate(&features_with(0.1, true), screen, 0).is_none());
        assert!(binding.evaluate(&features_with(0.5, true), screen, 10).is_none());
    }

    #[test]
    fn absolute_clamps_and_maps_to_pixel_range_s3() {
        let mut binding = AbsoluteBinding::new(AbsoluteAxis::PosX, key(), 0.0, 1920.0, None);
        let (_, px) = binding.evaluate(&features_with(0.5, true), 0).unwrap();
        assert_eq!(px, 960);

        let (_, px_clamped) = binding.evaluate(&features_with(1.2, true), 1).unwrap();
        assert_eq!(px_clamped, 1920);
    }

    #[test]
    fn stateful_clutch_release_drops_click_s1() {
        let clutch = GateComponent::new(
            FeatureKey::GestureClosed(Handedness::Right),
            HysteresisSpec {
                op: CompareOp::LessThan,
                trigger_pct: 0.5,
                release_pct: 0.5,
                refractory_ms: 0,
            },
            LostHandPolicy::Hold,
        );
        let mut binding = StatefulBinding::new(
            StatefulKind::Paired(ButtonId::MouseLeft),
            FeatureKey::CurvDiff(Handedness::Right, crate::feature_key::CurvDiffName::IndexMinusMiddle),
            HysteresisSpec {
                op: CompareOp::GreaterThan,
                trigger_pct: 0.8,
                release_pct: 0.6,
                refractory_ms: 250,
            },
            Some(Gate::single(clutch)),
            LostHandPolicy::Release,
        );

        let mut fs0 = FeatureSet::new();
        fs0.insert(FeatureKey::GestureClosed(Handedness::Right), FeatureValue { value: 0.2, valid: true });
        fs0.insert(
            FeatureKey::CurvDiff(Handedness::Right, crate::feature_key::CurvDiffName::IndexMinusMiddle),
            FeatureValue { value: 0.0, valid: true },
        );
        assert!(binding.evaluate(&fs0, 0).is_empty());

        let mut fs1 = fs0.clone();
        fs1.insert(
            FeatureKey::CurvDiff(Handedness::Right, crate::feature_key::CurvDiffName::IndexMinusMiddle),
            FeatureValue { value: 0.9, valid: true },
        );
        let emitted = binding.evaluate(&fs1, 50);
        assert_eq!(emitted, vec![StatefulEmission::Button(ButtonId::MouseLeft, true)]);

        let mut fs2 = fs1.clone();
        fs2.insert(FeatureKey::GestureClosed(Handedness::Right), FeatureValue { value: 0.9, valid: true });
        let emitted2 = binding.evaluate(&fs2, 100);
        assert_eq!(emitted2, vec![StatefulEmission::Button(ButtonId::MouseLeft, false)]);
    }

    #[test]
    fn stateful_hand_lost_mid_press_releases_immediately_s4() {
        let mut binding = StatefulBinding::new(
            StatefulKind::Paired(ButtonId::MouseLeft),
            key(),
            HysteresisSpec {
                op: CompareOp::GreaterThan,
                trigger_pct: 0.8,
                release_pct: 0.6,
                refractory_ms: 250,
            },
            None,
            LostHandPolicy::Release,
        );
        assert_eq!(
            binding.evaluate(&features_with(0.9, true), 0),
            vec![StatefulEmission::Button(ButtonId::MouseLeft, true)]
        );
        assert_eq!(
            binding.evaluate(&features_with(0.0, false), 10),
            vec![StatefulEmission::Button(ButtonId::MouseLeft, false)]
        );
        assert!(binding.evaluate(&features_with(0.0, false), 20).is_empty());
    }
}
