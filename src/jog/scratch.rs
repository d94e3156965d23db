//! Inertial scratch adapter
//!
//! Presents jog ticks to the transport's scratch simulation and makes sure the
//! simulation is switched off again once the wheel goes quiet. Every tick
//! cancels the pending release timer and schedules a fresh one, so a deck never
//! has more than one release outstanding.

use crate::controller::decoder::Deck;
use crate::engine::{ScratchParameters, TimerScheduler, TimerToken, TransportEngine};
use crate::jog::state::SimulationHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Quiet time after the last tick before the scratch is released
pub const RELEASE_DELAY: Duration = Duration::from_millis(50);

/// Feeds one scaled tick into the deck's simulation, enabling it on first use.
pub fn scratch<T, S>(
    handle: &mut SimulationHandle,
    deck: Deck,
    tick: f64,
    params: ScratchParameters,
    transport: &mut T,
    timers: &mut S,
) where
    T: TransportEngine + ?Sized,
    S: TimerScheduler + ?Sized,
{
    if !handle.active {
        info!(
            "Enabling scratch on {} ({} ticks/rev, {:.2} rpm, alpha {:.5}, beta {:.6})",
            deck, params.ticks_per_revolution, params.rotation_speed_rpm, params.alpha, params.beta
        );
        transport.enable_inertial_simulation(deck, params);
        handle.active = true;
    }

    transport.feed_inertial_tick(deck, tick);
    debug!("Scratch tick {:.3} on {}", tick, deck);

    if let Some(previous) = handle.pending_release.take() {
        timers.cancel(previous);
        debug!("Cancelled {} on {}", previous, deck);
    }
    let token = timers.schedule_release(deck, RELEASE_DELAY);
    handle.pending_release = Some(token);
    debug!("Scheduled {} for {} in {:?}", token, deck, RELEASE_DELAY);
}

/// Handles an expired release timer.
///
/// Returns `false` and leaves the deck alone when `token` is not the timer the
/// deck is waiting on, which happens when an expiry was already queued at the
/// moment a newer tick cancelled it.
pub fn release<T>(
    handle: &mut SimulationHandle,
    deck: Deck,
    token: TimerToken,
    transport: &mut T,
) -> bool
where
    T: TransportEngine + ?Sized,
{
    if handle.pending_release != Some(token) {
        warn!(
            "Ignoring stale {} for {} (pending: {:?})",
            token, deck, handle.pending_release
        );
        return false;
    }

    transport.disable_inertial_simulation(deck);
    handle.active = false;
    handle.pending_release = None;
    info!("Released scratch on {}", deck);
    true
}

/// Tears a deck down immediately, cancelling its timer. Used on shutdown.
pub fn force_release<T, S>(handle: &mut SimulationHandle, deck: Deck, transport: &mut T, timers: &mut S)
where
    T: TransportEngine + ?Sized,
    S: TimerScheduler + ?Sized,
{
    if let Some(token) = handle.pending_release.take() {
        timers.cancel(token);
    }
    if handle.active {
        transport.disable_inertial_simulation(deck);
        handle.active = false;
        info!("Force-released scratch on {}", deck);
    }
}
