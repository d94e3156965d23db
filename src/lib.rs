//! Jog wheel handling for DJ decks.
//!
//! Relative encoder ticks are decoded, turned into a speed factor by a
//! tick-rate estimator, and routed either into an inertial scratch simulation
//! (deck playing) or into a direct position scrub (deck stopped).

pub mod config;
pub mod controller;
pub mod engine;
pub mod jog;

pub use config::{ConfigError, JogConfig, Preset};
pub use controller::{Deck, MidiMessage};
pub use engine::{ScratchParameters, TimerScheduler, TimerToken, TransportEngine};
pub use jog::{JogWheel, OutputMode, TurnOutcome};
