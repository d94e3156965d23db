//! Jog wheel handler
//!
//! Turns relative jog messages into either scratch ticks or direct position
//! changes, one message at a time.
//!
//! # Pipeline
//!
//! ```text
//! MidiMessage ──► Decoder ──► Estimator ──► Arbiter ─┬─► scratch (playing)
//!                 (step)      (speed factor)          └─► scrub   (stopped)
//! ```
//!
//! All per-deck state lives in [`JogWheel`], which the dispatch layer owns and
//! passes by `&mut` into every call together with the transport and the timer
//! facility. Time is injected, never read, so tests can fabricate timestamps.

pub mod arbiter;
pub mod dispatcher;
pub mod error;
pub mod estimator;
pub mod scratch;
pub mod scrub;
pub mod state;

pub use arbiter::{ArbitrationPolicy, OutputMode};
pub use dispatcher::{DispatchEvent, DispatchStats, DispatcherHandle, EventDispatcher};
pub use error::DispatchError;
pub use estimator::{RateEstimator, RateSample};
pub use state::{DeckState, SimulationHandle};

use crate::config::JogConfig;
use crate::controller::decoder::{Deck, StepDecoder};
use crate::controller::midi::MidiMessage;
use crate::engine::{TimerScheduler, TimerToken, TransportEngine};
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// What one handled message did, mostly for logging and tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurnOutcome {
    pub deck: Deck,
    pub step: i8,
    pub sample: RateSample,
    pub mode: OutputMode,
}

#[derive(Debug)]
pub struct JogWheel {
    config: JogConfig,
    decoder: StepDecoder,
    decks: HashMap<Deck, DeckState>,
}

impl JogWheel {
    pub fn new(config: JogConfig) -> Self {
        let decoder = config.step_decoder();
        Self {
            config,
            decoder,
            decks: HashMap::new(),
        }
    }

    pub fn config(&self) -> &JogConfig {
        &self.config
    }

    pub fn deck(&self, deck: Deck) -> Option<&DeckState> {
        self.decks.get(&deck)
    }

    fn deck_mut(&mut self, deck: Deck) -> &mut DeckState {
        let kind = self.config.estimator;
        let max_gain = self.config.max_dynamic_gain;
        self.decks
            .entry(deck)
            .or_insert_with(|| DeckState::new(kind.build(max_gain)))
    }

    /// Handles one jog message received at `now`.
    ///
    /// Channel, control and status are carried for logging only; the deck comes
    /// from the group.
    pub fn turn<T, S>(
        &mut self,
        message: &MidiMessage,
        now: Instant,
        transport: &mut T,
        timers: &mut S,
    ) -> TurnOutcome
    where
        T: TransportEngine + ?Sized,
        S: TimerScheduler + ?Sized,
    {
        let deck = Deck::from_group(&message.group);
        let step = self.decoder.decode(message.value);
        let arbitration = self.config.arbitration;
        let scrub_policy = self.config.scrub_policy;
        let scrub_gain = self.config.direct_scrub_gain;
        let params = self.config.scratch_parameters();

        let state = self.deck_mut(deck);
        let sample = state.estimator.observe(now);
        let mode = arbiter::select_mode(arbitration, deck, transport);

        debug!(
            "ch {} cc 0x{:02X} status 0x{:02X} value {} -> {} step {} ticks {} factor {:.3} mode {}",
            message.channel,
            message.control,
            message.status,
            message.value,
            deck,
            step,
            sample.tick_count,
            sample.speed_factor,
            mode
        );

        match mode {
            OutputMode::Inertial => {
                let tick = f64::from(step) * sample.speed_factor;
                scratch::scratch(&mut state.simulation, deck, tick, params, transport, timers);
            }
            OutputMode::DirectScrub => {
                let scaling = scrub_policy.effective_scaling(sample);
                scrub::scrub(transport, deck, step, scaling, scrub_gain);
            }
        }

        TurnOutcome {
            deck,
            step,
            sample,
            mode,
        }
    }

    /// Handles an expired release timer. Returns whether the deck was released.
    pub fn release_timer_expired<T>(&mut self, deck: Deck, token: TimerToken, transport: &mut T) -> bool
    where
        T: TransportEngine + ?Sized,
    {
        match self.decks.get_mut(&deck) {
            Some(state) => scratch::release(&mut state.simulation, deck, token, transport),
            None => {
                debug!("Release {} for untouched {}", token, deck);
                false
            }
        }
    }

    /// Cancels every pending release and disables every active simulation.
    pub fn release_all<T, S>(&mut self, transport: &mut T, timers: &mut S)
    where
        T: TransportEngine + ?Sized,
        S: TimerScheduler + ?Sized,
    {
        for (deck, state) in self.decks.iter_mut() {
            scratch::force_release(&mut state.simulation, *deck, transport, timers);
        }
    }
}
