//! Seams to the outside world: the deck transport and the one-shot timer facility.
//!
//! The jog wheel core never owns playback state. Every read of the play flag or
//! position and every scratch call goes through [`TransportEngine`], and the idle
//! release of a scratch goes through [`TimerScheduler`]. Implementations:
//!
//! - [`simulated::SimulatedTransport`] - in-memory decks used by the binary
//! - [`timer::TokioTimerScheduler`] - posts expiries back into the dispatch queue
//! - [`recording`] - recording doubles with a manual clock, for tests

pub mod recording;
pub mod simulated;
pub mod timer;

use crate::controller::decoder::Deck;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use simulated::SimulatedTransport;
pub use timer::TokioTimerScheduler;

/// Parameters handed to the transport when a scratch simulation is switched on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScratchParameters {
    /// Ticks the transport treats as one full platter revolution
    pub ticks_per_revolution: u32,
    /// Simulated platter speed in RPM
    pub rotation_speed_rpm: f64,
    /// Filter inertia
    pub alpha: f64,
    /// Filter damping
    pub beta: f64,
}

/// Playback engine owning position and play state for every deck.
///
/// All methods take `&mut self` so that test doubles can script answers (for
/// example a play flag that flaps between two polls).
pub trait TransportEngine {
    fn playback_active(&mut self, deck: Deck) -> bool;

    /// Normalized position in `[0, 1]`.
    fn position(&mut self, deck: Deck) -> f64;

    fn set_position(&mut self, deck: Deck, position: f64);

    fn enable_inertial_simulation(&mut self, deck: Deck, params: ScratchParameters);

    /// Feeds a signed, real-valued tick into an enabled simulation.
    fn feed_inertial_tick(&mut self, deck: Deck, tick: f64);

    fn disable_inertial_simulation(&mut self, deck: Deck);
}

/// Opaque handle for a scheduled release timer.
///
/// Tokens are unique for the lifetime of a scheduler, which lets the receiver of
/// an expiry tell a live timer from one that was superseded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(pub u64);

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// One-shot timer facility.
///
/// An expiry is not a callback: the scheduler arranges for a
/// `ReleaseTimerExpired { deck, token }` event to reach the same single-threaded
/// consumer that handles input events.
pub trait TimerScheduler {
    fn schedule_release(&mut self, deck: Deck, delay: Duration) -> TimerToken;

    /// Cancelling an unknown or already fired token is a no-op.
    fn cancel(&mut self, token: TimerToken);
}
