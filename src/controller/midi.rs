// MIDI framing for jog wheel messages
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Status nibble of a Control Change message
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Default CC number the encoder firmware sends jog ticks on
pub const JOG_CC: u8 = 0x10;

// A jog message as handed over by the dispatch layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiMessage {
    pub channel: u8,
    pub control: u8,
    pub value: u8,
    pub status: u8,
    pub group: String,
}

// Errors while parsing wire or text input
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Expected {expected} fields, got {got}")]
    FieldCount { expected: &'static str, got: usize },

    #[error("Invalid number {0:?}")]
    InvalidNumber(String),

    #[error("Not a control change message: status 0x{0:02X}")]
    NotControlChange(u8),

    #[error("No group mapped for MIDI channel {0}")]
    UnmappedChannel(u8),
}

/// Maps a 1-based MIDI channel to the group it drives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub channel: u8,
    pub group: String,
}

/// Channel routing for raw messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub channels: Vec<ChannelGroup>,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            channels: vec![
                ChannelGroup {
                    channel: 1,
                    group: "[Channel1]".to_string(),
                },
                ChannelGroup {
                    channel: 2,
                    group: "[Channel2]".to_string(),
                },
            ],
        }
    }
}

impl MidiConfig {
    pub fn group_for(&self, channel: u8) -> Option<&str> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| c.group.as_str())
    }
}

impl MidiMessage {
    /// Parses `"<channel> <control> <value> <status> <group>"`.
    ///
    /// Numbers may be decimal or `0x` hex. The value is masked to 7 bits.
    pub fn parse_line(line: &str) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(DecodeError::FieldCount {
                expected: "5",
                got: fields.len(),
            });
        }

        Ok(Self {
            channel: parse_number(fields[0])?,
            control: parse_number(fields[1])?,
            value: parse_number(fields[2])? & 0x7F,
            status: parse_number(fields[3])?,
            group: fields[4].to_string(),
        })
    }

    /// Parses a raw 3-byte Control Change message, resolving the group from the
    /// channel in the low nibble of the status byte.
    pub fn from_bytes(bytes: [u8; 3], routing: &MidiConfig) -> Result<Self, DecodeError> {
        let [status, control, value] = bytes;
        if status & 0xF0 != CONTROL_CHANGE {
            return Err(DecodeError::NotControlChange(status));
        }

        let channel = (status & 0x0F) + 1;
        let group = routing
            .group_for(channel)
            .ok_or(DecodeError::UnmappedChannel(channel))?;
        debug!("Raw CC on channel {} routed to {}", channel, group);

        Ok(Self {
            channel,
            control,
            value: value & 0x7F,
            status,
            group: group.to_string(),
        })
    }

    /// Parses a line of three hex bytes such as `"b0 10 7f"`.
    pub fn parse_hex_bytes(line: &str, routing: &MidiConfig) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(DecodeError::FieldCount {
                expected: "3",
                got: fields.len(),
            });
        }

        let mut bytes = [0u8; 3];
        for (slot, field) in bytes.iter_mut().zip(fields.iter().copied()) {
            *slot = u8::from_str_radix(strip_hex_prefix(field).unwrap_or(field), 16)
                .map_err(|_| DecodeError::InvalidNumber(field.to_string()))?;
        }
        Self::from_bytes(bytes, routing)
    }
}

fn strip_hex_prefix(field: &str) -> Option<&str> {
    field.strip_prefix("0x").or_else(|| field.strip_prefix("0X"))
}

fn parse_number(field: &str) -> Result<u8, DecodeError> {
    let parsed = match strip_hex_prefix(field) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => field.parse::<u8>(),
    };
    parsed.map_err(|_| DecodeError::InvalidNumber(field.to_string()))
}
