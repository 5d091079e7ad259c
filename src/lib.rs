//! Hand-landmark to OS pointer/button evaluation engine. See `SPEC_FULL.md`
//! for the full design; this crate is the runtime evaluation graph only —
//! camera capture, landmark detection, and OS input injection are external
//! collaborators consumed/produced through this crate's types.

pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod feature_key;
pub mod features;
pub mod gate;
pub mod geometry;
pub mod output;
pub mod sink;
pub mod smoother;
pub mod types;

pub use config::{Config, RawConfig};
pub use engine::Engine;
pub use error::{CalibrationError, ConfigError};
pub use output::ScreenSize;
pub use sink::{ActionSink, ButtonId, RecordingSink};
pub use types::{HandObservation, Handedness, Landmark, LandmarkFrame};
