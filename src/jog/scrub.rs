// Direct position scrubbing while the transport is stopped
use crate::controller::decoder::Deck;
use crate::engine::TransportEngine;
use crate::jog::estimator::RateSample;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ticks a burst needs before the dynamic gain applies to scrubbing
pub const DAMPENING_THRESHOLD: u32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrubPolicy {
    /// Unit gain until the burst has more than three ticks
    #[default]
    Dampened,
    /// Superseded: always apply the speed factor, even to a single slow tick
    Undampened,
}

impl ScrubPolicy {
    pub fn effective_scaling(self, sample: RateSample) -> f64 {
        match self {
            ScrubPolicy::Undampened => sample.speed_factor,
            ScrubPolicy::Dampened if sample.tick_count > DAMPENING_THRESHOLD => {
                sample.speed_factor
            }
            ScrubPolicy::Dampened => 1.0,
        }
    }
}

/// `clamp(position + step * scaling * gain, 0, 1)`.
///
/// A non-finite position read from the transport counts as 0.
pub fn adjusted_position(position: f64, step: i8, scaling: f64, gain: f64) -> f64 {
    let position = if position.is_finite() { position } else { 0.0 };
    let moved = position + f64::from(step) * scaling * gain;
    if moved.is_nan() {
        return position.clamp(0.0, 1.0);
    }
    moved.clamp(0.0, 1.0)
}

/// Moves the deck's position for one decoded step.
pub fn scrub<T: TransportEngine + ?Sized>(
    transport: &mut T,
    deck: Deck,
    step: i8,
    scaling: f64,
    gain: f64,
) -> f64 {
    let position = transport.position(deck);
    let new_position = adjusted_position(position, step, scaling, gain);
    transport.set_position(deck, new_position);
    debug!(
        "Scrub {} step {} x{:.3}: {:.6} -> {:.6}",
        deck, step, scaling, position, new_position
    );
    new_position
}
