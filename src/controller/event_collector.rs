use crate::controller::decoder::Deck;
use crate::controller::midi::{DecodeError, MidiConfig, MidiMessage};
use crate::engine::SimulatedTransport;
use crate::jog::{DispatchError, DispatchEvent};
use chrono::Local;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Jog(MidiMessage),
    Transport { deck: Deck, playing: bool },
    Seek { deck: Deck, position_permille: u16 },
    TrackLength { deck: Deck, seconds: u32 },
    Blank,
}

impl InputLine {
    /// Parses one line of collector input.
    ///
    /// Accepted forms, `#` starts a comment:
    ///
    /// ```text
    /// 1 0x10 127 0xB0 [Channel1]   # channel control value status group
    /// b0 10 01                     # raw control change, routed by channel
    /// play [Channel2]
    /// pause [Channel2]
    /// seek [Channel1] 500          # position in permille
    /// track [Channel1] 240         # track length in seconds
    /// ```
    pub fn parse(line: &str, routing: &MidiConfig) -> Result<Self, DecodeError> {
        let line = line.split('#').next().unwrap_or("").trim();
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields.as_slice() {
            [] => Ok(InputLine::Blank),
            ["play", group] => Ok(InputLine::Transport {
                deck: Deck::from_group(group),
                playing: true,
            }),
            ["pause", group] => Ok(InputLine::Transport {
                deck: Deck::from_group(group),
                playing: false,
            }),
            ["seek", group, permille] => {
                let position_permille = permille
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p <= 1000)
                    .ok_or_else(|| DecodeError::InvalidNumber(permille.to_string()))?;
                Ok(InputLine::Seek {
                    deck: Deck::from_group(group),
                    position_permille,
                })
            }
            ["track", group, seconds] => {
                let seconds = seconds
                    .parse::<u32>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| DecodeError::InvalidNumber(seconds.to_string()))?;
                Ok(InputLine::TrackLength {
                    deck: Deck::from_group(group),
                    seconds,
                })
            }
            [_, _, _] => MidiMessage::parse_hex_bytes(line, routing).map(InputLine::Jog),
            _ => MidiMessage::parse_line(line).map(InputLine::Jog),
        }
    }
}

// Line-oriented input collector feeding the dispatch queue
pub struct LineCollector {
    sender: mpsc::Sender<DispatchEvent>,
    transport: SimulatedTransport,
    routing: MidiConfig,
}

impl LineCollector {
    pub fn new(
        sender: mpsc::Sender<DispatchEvent>,
        transport: SimulatedTransport,
        routing: MidiConfig,
    ) -> Self {
        Self {
            sender,
            transport,
            routing,
        }
    }

    /// Reads lines until EOF. Unparseable lines are logged and skipped.
    ///
    /// Returns the number of jog messages forwarded.
    pub async fn run<R>(&self, reader: R) -> Result<u64, DispatchError>
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Starting line collector");
        let mut lines = reader.lines();
        let mut forwarded = 0;

        while let Some(line) = lines.next_line().await? {
            match InputLine::parse(&line, &self.routing) {
                Ok(InputLine::Jog(message)) => {
                    let received_at = tokio::time::Instant::now().into_std();
                    debug!(
                        "Jog {} value {} at {}",
                        message.group,
                        message.value,
                        Local::now().format("%H:%M:%S.%3f")
                    );
                    self.sender
                        .send(DispatchEvent::Turn {
                            message,
                            received_at,
                        })
                        .await
                        .map_err(|e| DispatchError::ChannelError(e.to_string()))?;
                    forwarded += 1;
                }
                Ok(InputLine::Transport { deck, playing }) => {
                    self.transport.set_playing(deck, playing);
                }
                Ok(InputLine::Seek {
                    deck,
                    position_permille,
                }) => {
                    self.transport
                        .seek(deck, f64::from(position_permille) / 1000.0);
                }
                Ok(InputLine::TrackLength { deck, seconds }) => {
                    self.transport.set_track_seconds(deck, f64::from(seconds));
                }
                Ok(InputLine::Blank) => {}
                Err(e) => warn!("Skipping input line {:?}: {}", line, e),
            }
        }

        info!("Input closed after {} jog messages", forwarded);
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transport_commands() {
        let routing = MidiConfig::default();
        assert_eq!(
            InputLine::parse("play [Channel2]", &routing),
            Ok(InputLine::Transport {
                deck: Deck::TWO,
                playing: true
            })
        );
        assert_eq!(
            InputLine::parse("pause [Channel1]  # stop", &routing),
            Ok(InputLine::Transport {
                deck: Deck::ONE,
                playing: false
            })
        );
    }

    #[test]
    fn parses_seek() {
        let routing = MidiConfig::default();
        assert_eq!(
            InputLine::parse("seek [Channel1] 250", &routing),
            Ok(InputLine::Seek {
                deck: Deck::ONE,
                position_permille: 250
            })
        );
        assert!(InputLine::parse("seek [Channel1] 1001", &routing).is_err());
    }

    #[test]
    fn parses_track_length() {
        let routing = MidiConfig::default();
        assert_eq!(
            InputLine::parse("track [Channel2] 240", &routing),
            Ok(InputLine::TrackLength {
                deck: Deck::TWO,
                seconds: 240
            })
        );
        assert!(InputLine::parse("track [Channel2] 0", &routing).is_err());
    }

    #[test]
    fn comments_and_blanks() {
        let routing = MidiConfig::default();
        assert_eq!(InputLine::parse("   # nothing", &routing), Ok(InputLine::Blank));
        assert_eq!(InputLine::parse("", &routing), Ok(InputLine::Blank));
    }

    #[test]
    fn three_fields_are_raw_bytes() {
        let routing = MidiConfig::default();
        match InputLine::parse("b1 10 7f", &routing) {
            Ok(InputLine::Jog(message)) => {
                assert_eq!(message.group, "[Channel2]");
                assert_eq!(message.value, 127);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn forwards_jog_lines_and_applies_transport_commands() {
        let (sender, mut receiver) = mpsc::channel(16);
        let transport = SimulatedTransport::new();
        let collector = LineCollector::new(sender, transport.clone(), MidiConfig::default());

        let input: &[u8] = b"play [Channel1]\n1 16 1 176 [Channel1]\nnonsense here\nb0 10 7f\n";
        let forwarded = collector.run(input).await.unwrap();

        assert_eq!(forwarded, 2);
        assert!(transport.snapshot(Deck::ONE).playing);
        let mut values = Vec::new();
        while let Ok(DispatchEvent::Turn { message, .. }) = receiver.try_recv() {
            values.push(message.value);
        }
        assert_eq!(values, vec![1, 127]);
    }
}
