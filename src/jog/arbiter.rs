//! Mode arbitration
//!
//! The output mode is never stored. It is read from the transport on every
//! event, so a play flag that flips between two ticks switches the very next
//! tick to the other branch.

use crate::controller::decoder::Deck;
use crate::engine::TransportEngine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a decoded tick goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Transport running: feed the scratch simulation
    Inertial,
    /// Transport stopped: move the position directly
    DirectScrub,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Inertial => write!(f, "inertial"),
            OutputMode::DirectScrub => write!(f, "direct-scrub"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArbitrationPolicy {
    /// Scratch while playing, scrub while stopped
    #[default]
    FollowTransport,
    /// Always scratch and never ask the transport
    AlwaysInertial,
}

pub fn select_mode<T: TransportEngine + ?Sized>(
    policy: ArbitrationPolicy,
    deck: Deck,
    transport: &mut T,
) -> OutputMode {
    match policy {
        ArbitrationPolicy::AlwaysInertial => OutputMode::Inertial,
        ArbitrationPolicy::FollowTransport => {
            if transport.playback_active(deck) {
                OutputMode::Inertial
            } else {
                OutputMode::DirectScrub
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::recording::RecordingTransport;

    #[test]
    fn playing_deck_scratches() {
        let mut transport = RecordingTransport::new();
        transport.set_playing(Deck::ONE, true);
        assert_eq!(
            select_mode(ArbitrationPolicy::FollowTransport, Deck::ONE, &mut transport),
            OutputMode::Inertial
        );
    }

    #[test]
    fn stopped_deck_scrubs() {
        let mut transport = RecordingTransport::new();
        assert_eq!(
            select_mode(ArbitrationPolicy::FollowTransport, Deck::TWO, &mut transport),
            OutputMode::DirectScrub
        );
    }

    #[test]
    fn flapping_transport_is_followed_per_event() {
        let mut transport = RecordingTransport::new();
        transport.script_playback(Deck::ONE, [true, false, true]);
        let modes: Vec<_> = (0..3)
            .map(|_| select_mode(ArbitrationPolicy::FollowTransport, Deck::ONE, &mut transport))
            .collect();
        assert_eq!(
            modes,
            vec![
                OutputMode::Inertial,
                OutputMode::DirectScrub,
                OutputMode::Inertial
            ]
        );
    }

    #[test]
    fn always_inertial_skips_the_query() {
        let mut transport = RecordingTransport::new();
        assert_eq!(
            select_mode(ArbitrationPolicy::AlwaysInertial, Deck::ONE, &mut transport),
            OutputMode::Inertial
        );
        assert_eq!(transport.playback_queries(), 0);
    }
}
