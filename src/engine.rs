//! Runtime evaluation engine (§2, §5, §9): wires the feature extractor,
//! smoother, gates, and output bindings into one per-tick pipeline.
//! Bindings are resolved once here, at construction, into direct state —
//! nothing in `tick` does a name lookup.

use std::collections::HashMap;

use crate::calibration::CalibrationSet;
use crate::config::{Config, GateConfig, OutputConfig};
use crate::feature_key::FeatureKey;
use crate::features::FeatureExtractor;
use crate::gate::{Gate, GateComponent};
use crate::output::{AbsoluteAxis, AbsoluteBinding, DeltaAxis, DeltaBinding, ScreenSize, StatefulBinding, StatefulEmission};
use crate::sink::{self, ActionSink};
use crate::smoother::Smoother;
use crate::types::LandmarkFrame;

fn build_gate(gate: &GateConfig) -> Gate {
    Gate::single(GateComponent::new(gate.input, gate.spec(), gate.lost_hand_policy))
}

impl GateConfig {
    fn spec(&self) -> crate::gate::HysteresisSpec {
        crate::gate::HysteresisSpec {
            op: self.op,
            trigger_pct: self.trigger_pct,
            release_pct: self.release_pct,
            refractory_ms: self.refractory_ms,
        }
    }
}

/// Resolved, ready-to-run engine. Holds everything named in the config
/// already converted into direct handles and per-binding runtime state.
pub struct Engine {
    calibration: CalibrationSet,
    smoother: Smoother,
    deltas: Vec<DeltaBinding>,
    absolutes: Vec<AbsoluteBinding>,
    statefuls: Vec<StatefulBinding>,
    screen: ScreenSize,
    last_position: (Option<i32>, Option<i32>),
}

#[derive(Default)]
struct TickAccumulator {
    move_dx: i32,
    move_dy: i32,
    moved: bool,
    scroll_dx: i32,
    scroll_dy: i32,
    scrolled: bool,
    pos_x: Option<i32>,
    pos_y: Option<i32>,
}

impl Engine {
    pub fn new(config: Config, screen: ScreenSize) -> Self {
        let smoother = Smoother::new(config.smoothing);

        let mut deltas = Vec::new();
        let mut absolutes = Vec::new();
        let mut statefuls = Vec::new();

        for output in config.outputs {
            match output {
                OutputConfig::Delta {
                    axis,
                    input,
                    sensitivity,
                    lost_hand_policy,
                    gate,
                } => {
                    deltas.push(DeltaBinding::new(
                        axis,
                        input,
                        sensitivity,
                        gate.as_ref().map(build_gate),
                        lost_hand_policy,
                    ));
                }
                OutputConfig::Absolute { axis, input, min, max, gate } => {
                    absolutes.push(AbsoluteBinding::new(axis, input, min, max, gate.as_ref().map(build_gate)));
                }
                OutputConfig::Stateful {
                    kind,
                    input,
                    op,
                    trigger_pct,
                    release_pct,
                    refractory_ms,
                    lost_hand_policy,
                    gate,
                } => {
                    let spec = crate::gate::HysteresisSpec {
                        op,
                        trigger_pct,
                        release_pct,
                        refractory_ms,
                    };
                    statefuls.push(StatefulBinding::new(
                        kind,
                        input,
                        spec,
                        gate.as_ref().map(build_gate),
                        lost_hand_policy,
                    ));
                }
            }
        }

        log::info!(
            "engine constructed: {} delta, {} absolute, {} stateful bindings",
            deltas.len(),
            absolutes.len(),
            statefuls.len(),
        );

        Engine {
            calibration: config.calibration,
            smoother,
            deltas,
            absolutes,
            statefuls,
            screen,
            last_position: (None, None),
        }
    }

    /// One full pipeline pass: extract -> smooth -> gate -> output ->
    /// sink (§2, §5). Action emissions for the tick are combined so that
    /// axis-pair outputs (cursor move/scroll/absolute position) reach the
    /// sink as a single call per primitive.
    pub fn tick(&mut self, frame: &LandmarkFrame, sink: &mut dyn ActionSink) {
        let raw = FeatureExtractor::extract(frame, &self.calibration);
        let t_ms = frame.t_ms;

        let mut smoothed: HashMap<FeatureKey, crate::features::FeatureValue> = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let v = if value.valid {
                crate::features::FeatureValue {
                    value: self.smoother.update(key, value.value, t_ms),
                    valid: true,
                }
            } else {
                value
            };
            smoothed.insert(key, v);
        }

        let mut acc = TickAccumulator::default();

        for binding in &mut self.deltas {
            if let Some((axis, px)) = binding.evaluate(&smoothed, self.screen, t_ms) {
                match axis {
                    DeltaAxis::MoveX => {
                        acc.move_dx = px;
                        acc.moved = true;
                    }
                    DeltaAxis::MoveY => {
                        acc.move_dy = px;
                        acc.moved = true;
                    }
                    DeltaAxis::ScrollX => {
                        acc.scroll_dx = px;
                        acc.scrolled = true;
                    }
                    DeltaAxis::ScrollY => {
                        acc.scroll_dy = px;
                        acc.scrolled = true;
                    }
                }
            }
        }

        for binding in &mut self.absolutes {
            if let Some((axis, px)) = binding.evaluate(&smoothed, t_ms) {
                match axis {
                    AbsoluteAxis::PosX => acc.pos_x = Some(px),
                    AbsoluteAxis::PosY => acc.pos_y = Some(px),
                }
            }
        }

        if acc.moved {
            sink::emit("move_relative", || sink.move_relative(acc.move_dx, acc.move_dy));
        }
        if acc.scrolled {
            sink::emit("scroll", || sink.scroll(acc.scroll_dx, acc.scroll_dy));
        }

        if acc.pos_x.is_some() {
            self.last_position.0 = acc.pos_x;
        }
        if acc.pos_y.is_some() {
            self.last_position.1 = acc.pos_y;
        }
        if let (Some(x), Some(y)) = self.last_position {
            if acc.pos_x.is_some() || acc.pos_y.is_some() {
                sink::emit("set_position", || sink.set_position(x, y));
            }
        }

        for binding in &mut self.statefuls {
            for emission in binding.evaluate(&smoothed, t_ms) {
                emit_stateful(sink, emission);
            }
        }
    }

    /// Best-effort release of every pressed stateful binding (§5, §7):
    /// invoked from a fatal-error path, or on quit, so no button is left
    /// held down past the engine's lifetime.
    pub fn release_all(&mut self, sink: &mut dyn ActionSink, t_ms: u64) {
        for binding in &mut self.statefuls {
            if let Some(emission) = binding.release_if_pressed(t_ms) {
                emit_stateful(sink, emission);
            }
        }
    }
}

fn emit_stateful(sink: &mut dyn ActionSink, emission: StatefulEmission) {
    let StatefulEmission::Button(id, down) = emission;
    sink::emit("button", || sink.button(id, down));
}
