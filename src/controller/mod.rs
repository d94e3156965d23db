//! Controller input: from encoder messages to decoded jog events
//!
//! 1. [`event_collector`] - reads input lines and feeds the dispatch queue
//! 2. [`midi`] - MIDI framing, text and raw Control Change parsing
//! 3. [`decoder`] - relative values to signed steps, groups to decks
//!
//! ```text
//! stdin ──► LineCollector ──► MidiMessage ──► DispatchEvent::Turn
//! ```

pub mod decoder;
pub mod event_collector;
pub mod midi;

pub use decoder::{decode_step, encode_step, Deck, RelativeEncoding, StepDecoder};
pub use event_collector::{InputLine, LineCollector};
pub use midi::{DecodeError, MidiConfig, MidiMessage};
