//! Gate evaluator (§4.3): stateful booleans derived from a smoothed
//! feature via hysteresis + refractory timing, optionally AND-combined.

use crate::error::ConfigError;
use crate::feature_key::FeatureKey;
use crate::features::FeatureSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
}

impl CompareOp {
    pub fn parse(s: &str) -> Option<CompareOp> {
        match s {
            ">" => Some(CompareOp::GreaterThan),
            "<" => Some(CompareOp::LessThan),
            _ => None,
        }
    }
}

/// Behavior when a gate's (or binding's) input feature goes invalid
/// because the required hand observation is absent (§4.3, §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LostHandPolicy {
    Release,
    Hold,
    True,
    Toggle,
}

impl LostHandPolicy {
    pub fn parse(s: &str) -> Option<LostHandPolicy> {
        match s {
            "release" => Some(LostHandPolicy::Release),
            "hold" => Some(LostHandPolicy::Hold),
            "true" => Some(LostHandPolicy::True),
            "toggle" => Some(LostHandPolicy::Toggle),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HysteresisSpec {
    pub op: CompareOp,
    pub trigger_pct: f64,
    pub release_pct: f64,
    pub refractory_ms: u64,
}

impl HysteresisSpec {
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let ok = match self.op {
            CompareOp::GreaterThan => self.trigger_pct > self.release_pct,
            CompareOp::LessThan => self.trigger_pct < self.release_pct,
        };
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidHysteresis {
                name: name.to_string(),
                op: match self.op {
                    CompareOp::GreaterThan => ">",
                    CompareOp::LessThan => "<",
                },
                rule: match self.op {
                    CompareOp::GreaterThan => "trigger_pct > release_pct",
                    CompareOp::LessThan => "trigger_pct < release_pct",
                },
                trigger: self.trigger_pct,
                release: self.release_pct,
            })
        }
    }
}

/// Shared hysteresis + refractory FSM used by both gates and the edge
/// detection inside stateful output bindings (§4.3, §4.4).
#[derive(Clone, Copy, Debug, Default)]
pub struct HysteresisState {
    pub on: bool,
    last_transition_ms: Option<u64>,
}

impl HysteresisState {
    /// Evaluate one tick against a valid, smoothed input. Returns
    /// `Some(new_on)` when a transition fires, `None` otherwise (either
    /// no edge crossed, or it was suppressed by the refractory window).
    pub fn step(&mut self, spec: &HysteresisSpec, v: f64, t_ms: u64) -> Option<bool> {
        let in_refractory = self
            .last_transition_ms
            .is_some_and(|last| t_ms.saturating_sub(last) < spec.refractory_ms);

        let should_transition = if !self.on {
            match spec.op {
                CompareOp::GreaterThan => v > spec.trigger_pct,
                CompareOp::LessThan => v < spec.trigger_pct,
            }
        } else {
            match spec.op {
                CompareOp::GreaterThan => v <= spec.release_pct,
                CompareOp::LessThan => v >= spec.release_pct,
            }
        };

        if !should_transition || in_refractory {
            return None;
        }

        self.on = !self.on;
        self.last_transition_ms = Some(t_ms);
        Some(self.on)
    }

    /// Force a transition immediately, bypassing hysteresis and
    /// refractory (used for `release` lost-hand policy and gate-false
    /// forced releases, §4.4).
    pub fn force(&mut self, on: bool, t_ms: u64) -> bool {
        let changed = self.on != on;
        self.on = on;
        if changed {
            self.last_transition_ms = Some(t_ms);
        }
        changed
    }
}

pub struct GateComponent {
    pub input: FeatureKey,
    pub spec: HysteresisSpec,
    pub lost_hand_policy: LostHandPolicy,
    state: HysteresisState,
    toggled_on_loss: bool,
}

impl GateComponent {
    pub fn new(input: FeatureKey, spec: HysteresisSpec, lost_hand_policy: LostHandPolicy) -> Self {
        GateComponent {
            input,
            spec,
            lost_hand_policy,
            state: HysteresisState::default(),
            toggled_on_loss: false,
        }
    }

    pub fn on(&self) -> bool {
        self.state.on
    }

    pub fn evaluate(&mut self, features: &FeatureSet, t_ms: u64) -> bool {
        let feature = features.get(&self.input).copied();
        let valid = feature.map(|f| f.valid).unwrap_or(false);

        if !valid {
            match self.lost_hand_policy {
                LostHandPolicy::Release => {
                    self.state.force(false, t_ms);
                    self.toggled_on_loss = false;
                }
                LostHandPolicy::Hold => {}
                LostHandPolicy::True => {
                    self.state.force(true, t_ms);
                }
                LostHandPolicy::Toggle => {
                    if !self.toggled_on_loss {
                        self.state.force(!self.state.on, t_ms);
                        self.toggled_on_loss = true;
                    }
                }
            }
            return self.state.on;
        }

        self.toggled_on_loss = false;
        self.state.step(&self.spec, feature.unwrap().value, t_ms);
        self.state.on
    }
}

/// A (possibly composite) gate: AND of one or more components, each with
/// independent hysteresis/refractory/lost-hand tracking (§4.3, §9 open
/// question: refractory is tracked per component, not on the composite).
pub struct Gate {
    components: Vec<GateComponent>,
}

impl Gate {
    pub fn new(components: Vec<GateComponent>) -> Self {
        Gate { components }
    }

    pub fn single(component: GateComponent) -> Self {
        Gate::new(vec![component])
    }

    pub fn evaluate(&mut self, features: &FeatureSet, t_ms: u64) -> bool {
        let mut all = true;
        for component in &mut self.components {
            let on = component.evaluate(features, t_ms);
            all &= on;
        }
        all
    }
}
