//! Event decoding: 7-bit relative values to signed steps, group strings to decks.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Size of the 7-bit value range carried by a MIDI data byte
pub const RANGE_SIZE: i16 = 128;

/// Values above this decode to negative steps
pub const MIDPOINT: u8 = 64;

/// Highest deck number a group string can address
pub const MAX_DECKS: u8 = 4;

/// A controllable playback device, numbered from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Deck(u8);

impl Deck {
    pub const ONE: Deck = Deck(1);
    pub const TWO: Deck = Deck(2);

    /// Returns `None` for 0 or anything above [`MAX_DECKS`].
    pub fn new(number: u8) -> Option<Self> {
        (1..=MAX_DECKS).contains(&number).then_some(Deck(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Resolves a group such as `"[Channel2]"` to its deck.
    ///
    /// Anything that does not name a known channel falls back to deck 1, which
    /// is how the controller mapping has always treated unexpected groups.
    pub fn from_group(group: &str) -> Self {
        let parsed = group
            .strip_prefix("[Channel")
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(Deck::new);

        match parsed {
            Some(deck) => deck,
            None => {
                debug!("Unknown group {:?}, routing to deck 1", group);
                Deck::ONE
            }
        }
    }

    pub fn group(self) -> String {
        format!("[Channel{}]", self.0)
    }
}

impl fmt::Display for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deck {}", self.0)
    }
}

/// Decodes a relative encoder value into a signed step.
///
/// `1..=64` are clockwise steps, `65..=127` wrap around to `-63..=-1`.
pub fn decode_step(value: u8) -> i8 {
    if value > MIDPOINT {
        (i16::from(value) - RANGE_SIZE) as i8
    } else {
        value as i8
    }
}

/// Inverse of [`decode_step`] for steps in `-63..=64`.
pub fn encode_step(step: i8) -> u8 {
    if step < 0 {
        (i16::from(step) + RANGE_SIZE) as u8
    } else {
        step as u8
    }
}

/// How a controller encodes direction into the data byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelativeEncoding {
    /// `1` is +1, `127` is -1
    #[default]
    TwosComplement,
    /// `65` is +1, `63` is -1
    BinaryOffset,
}

/// Highest accepted step multiplier
pub const MAX_SENSITIVITY: u8 = 16;

/// Step decoder configured for one controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepDecoder {
    pub encoding: RelativeEncoding,
    pub invert: bool,
    /// Multiplier applied to every decoded step
    pub sensitivity: u8,
}

impl Default for StepDecoder {
    fn default() -> Self {
        Self::new(RelativeEncoding::default(), false)
    }
}

impl StepDecoder {
    pub fn new(encoding: RelativeEncoding, invert: bool) -> Self {
        Self {
            encoding,
            invert,
            sensitivity: 1,
        }
    }

    pub fn with_sensitivity(self, sensitivity: u8) -> Self {
        Self {
            sensitivity,
            ..self
        }
    }

    /// Decodes `value`, then applies inversion and sensitivity. Saturates at the
    /// `i8` range.
    pub fn decode(&self, value: u8) -> i8 {
        let step = match self.encoding {
            RelativeEncoding::TwosComplement => decode_step(value),
            RelativeEncoding::BinaryOffset => (i16::from(value) - i16::from(MIDPOINT)) as i8,
        };
        let step = if self.invert {
            step.saturating_neg()
        } else {
            step
        };
        step.saturating_mul(i8::try_from(self.sensitivity).unwrap_or(i8::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_half_decodes_to_itself() {
        assert_eq!(decode_step(0), 0);
        assert_eq!(decode_step(1), 1);
        assert_eq!(decode_step(64), 64);
    }

    #[test]
    fn upper_half_wraps_negative() {
        assert_eq!(decode_step(65), -63);
        assert_eq!(decode_step(127), -1);
    }

    #[test]
    fn encode_inverts_decode() {
        assert_eq!(encode_step(-1), 127);
        assert_eq!(encode_step(1), 1);
        assert_eq!(encode_step(-63), 65);
    }

    #[test]
    fn binary_offset_centres_on_64() {
        let decoder = StepDecoder::new(RelativeEncoding::BinaryOffset, false);
        assert_eq!(decoder.decode(65), 1);
        assert_eq!(decoder.decode(63), -1);
        assert_eq!(decoder.decode(64), 0);
    }

    #[test]
    fn inversion_flips_sign() {
        let decoder = StepDecoder::new(RelativeEncoding::TwosComplement, true);
        assert_eq!(decoder.decode(1), -1);
        assert_eq!(decoder.decode(127), 1);
    }

    #[test]
    fn side_swipe_decoding_doubles_and_inverts() {
        let decoder = StepDecoder::new(RelativeEncoding::BinaryOffset, true).with_sensitivity(2);
        assert_eq!(decoder.decode(65), -2);
        assert_eq!(decoder.decode(63), 2);
    }

    #[test]
    fn sensitivity_saturates() {
        let decoder = StepDecoder::new(RelativeEncoding::TwosComplement, false).with_sensitivity(4);
        assert_eq!(decoder.decode(64), i8::MAX);
        assert_eq!(decoder.decode(65), i8::MIN);
    }

    #[test]
    fn groups_resolve_to_decks() {
        assert_eq!(Deck::from_group("[Channel1]"), Deck::ONE);
        assert_eq!(Deck::from_group("[Channel2]"), Deck::TWO);
        assert_eq!(Deck::from_group("[Channel4]").number(), 4);
        assert_eq!(Deck::from_group("[Channel9]"), Deck::ONE);
        assert_eq!(Deck::from_group("[Master]"), Deck::ONE);
        assert_eq!(Deck::TWO.group(), "[Channel2]");
    }
}
