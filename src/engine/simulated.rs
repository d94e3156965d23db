//! In-memory decks standing in for a real playback engine.
//!
//! Each deck has a play flag, a normalized position and a track length. While
//! a scratch is enabled, every tick moves the position by the fraction of a
//! platter revolution it represents:
//!
//! ```text
//! seconds = tick / ticks_per_revolution * 60 / rpm
//! position += seconds / track_seconds
//! ```
//!
//! The handle is cheap to clone; clones share the same decks, so the collector
//! can toggle play state while the dispatcher owns another clone.

use super::{ScratchParameters, TransportEngine};
use crate::controller::decoder::Deck;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Track length assumed for decks that were never given one
pub const DEFAULT_TRACK_SECONDS: f64 = 180.0;

#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedDeck {
    pub playing: bool,
    pub position: f64,
    pub track_seconds: f64,
    pub scratch: Option<ScratchParameters>,
    pub scratch_ticks: f64,
}

impl Default for SimulatedDeck {
    fn default() -> Self {
        Self {
            playing: false,
            position: 0.0,
            track_seconds: DEFAULT_TRACK_SECONDS,
            scratch: None,
            scratch_ticks: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimulatedTransport {
    decks: Arc<Mutex<HashMap<Deck, SimulatedDeck>>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Deck, SimulatedDeck>> {
        // The map holds plain values, so a panic elsewhere cannot leave it torn
        self.decks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_playing(&self, deck: Deck, playing: bool) {
        self.lock().entry(deck).or_default().playing = playing;
        info!("{} {}", deck, if playing { "playing" } else { "paused" });
    }

    pub fn set_track_seconds(&self, deck: Deck, seconds: f64) {
        self.lock().entry(deck).or_default().track_seconds = seconds;
    }

    pub fn seek(&self, deck: Deck, position: f64) {
        self.lock().entry(deck).or_default().position = position.clamp(0.0, 1.0);
    }

    pub fn snapshot(&self, deck: Deck) -> SimulatedDeck {
        self.lock().get(&deck).cloned().unwrap_or_default()
    }
}

impl TransportEngine for SimulatedTransport {
    fn playback_active(&mut self, deck: Deck) -> bool {
        self.lock().get(&deck).map(|d| d.playing).unwrap_or(false)
    }

    fn position(&mut self, deck: Deck) -> f64 {
        self.lock().get(&deck).map(|d| d.position).unwrap_or(0.0)
    }

    fn set_position(&mut self, deck: Deck, position: f64) {
        self.lock().entry(deck).or_default().position = position;
    }

    fn enable_inertial_simulation(&mut self, deck: Deck, params: ScratchParameters) {
        let mut decks = self.lock();
        let state = decks.entry(deck).or_default();
        state.scratch = Some(params);
        state.scratch_ticks = 0.0;
    }

    fn feed_inertial_tick(&mut self, deck: Deck, tick: f64) {
        let mut decks = self.lock();
        let state = decks.entry(deck).or_default();
        let Some(params) = state.scratch else {
            warn!("Tick {:.3} on {} without an enabled scratch", tick, deck);
            return;
        };

        let seconds =
            tick / f64::from(params.ticks_per_revolution) * 60.0 / params.rotation_speed_rpm;
        state.scratch_ticks += tick;
        state.position = (state.position + seconds / state.track_seconds).clamp(0.0, 1.0);
        debug!(
            "{} scratched {:+.4}s to {:.6} ({:.2} ticks this scratch)",
            deck, seconds, state.position, state.scratch_ticks
        );
    }

    fn disable_inertial_simulation(&mut self, deck: Deck) {
        let mut decks = self.lock();
        let state = decks.entry(deck).or_default();
        state.scratch = None;
        debug!("{} scratch off after {:.2} ticks", deck, state.scratch_ticks);
    }
}
