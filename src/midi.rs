use anyhow::{anyhow, Result};
use std::sync::mpsc;

use midir::MidiInputConnection;
use midly::live::LiveEvent;
use midly::MidiMessage;

use crate::util::log_if_error;

const MIDI_QUEUE_SIZE: usize = 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventContent {
    NoteOff { key: u8, vel: u8 },
    NoteOn { key: u8, vel: u8 },
    Controller { controller: u8, value: u8 },
    /// 14 bit, centre is 8192.
    PitchBend { bend: u16 },
    ChannelAftertouch { vel: u8 },
}

impl EventContent {
    fn from_midly(message: MidiMessage) -> Option<Self> {
        Some(match message {
            MidiMessage::NoteOff { key, vel } => EventContent::NoteOff {
                key: key.into(),
                vel: vel.into(),
            },

            MidiMessage::NoteOn { key, vel } => EventContent::NoteOn {
                key: key.into(),
                vel: vel.into(),
            },

            MidiMessage::Controller { controller, value } => EventContent::Controller {
                controller: controller.into(),
                value: value.into(),
            },

            MidiMessage::PitchBend { bend } => EventContent::PitchBend {
                bend: bend.0.into(),
            },

            MidiMessage::ChannelAftertouch { vel } => {
                EventContent::ChannelAftertouch { vel: vel.into() }
            }

            _ => return None,
        })
    }

    /// The raw three-byte message on `channel`. Unused data bytes are zero.
    pub fn to_bytes(self, channel: u8) -> [u8; 3] {
        let channel = channel & 0x0F;
        match self {
            EventContent::NoteOff { key, vel } => [0x80 | channel, key, vel],
            EventContent::NoteOn { key, vel } => [0x90 | channel, key, vel],
            EventContent::Controller { controller, value } => [0xB0 | channel, controller, value],
            EventContent::ChannelAftertouch { vel } => [0xD0 | channel, vel, 0],
            EventContent::PitchBend { bend } => {
                [0xE0 | channel, (bend & 0x7F) as u8, ((bend >> 7) & 0x7F) as u8]
            }
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Event {
    pub timestamp: u64,
    pub channel: u8,
    pub content: EventContent,
}

/// Parse one live MIDI message, ignoring everything the synth has no use for.
pub fn parse_event(timestamp: u64, bytes: &[u8]) -> Option<Event> {
    match LiveEvent::parse(bytes) {
        Ok(LiveEvent::Midi { channel, message }) => {
            EventContent::from_midly(message).map(|content| Event {
                timestamp,
                channel: channel.into(),
                content,
            })
        }

        Err(err) => {
            tracing::warn!("midly failed to parse {:?}, error: {:?}", bytes, err);
            None
        }

        _ => None,
    }
}

pub fn list_devices() -> Result<Vec<String>> {
    let midi_in = midir::MidiInput::new("blit-synth port listing")?;
    let names = midi_in
        .ports()
        .iter()
        .filter_map(|p| log_if_error("could not read MIDI port name", midi_in.port_name(p)))
        .collect();
    Ok(names)
}

pub struct Connection(MidiInputConnection<mpsc::SyncSender<Event>>);

pub fn connect_to_ports(
    midi_ports: Vec<String>,
) -> Result<(mpsc::Receiver<Event>, Vec<Connection>)> {
    let (sender, receiver) = mpsc::sync_channel(MIDI_QUEUE_SIZE);

    let connections: Result<Vec<Connection>> = midi_ports
        .into_iter()
        .map(|port_name| {
            let midi_in = midir::MidiInput::new(&format!("blit-synth to {}", port_name))?;

            let selected_port = midi_in
                .ports()
                .into_iter()
                .find(|p| midi_in.port_name(p).map_or(false, |name| name == port_name))
                .ok_or_else(|| anyhow!("could not find MIDI port {}", port_name))?;

            let connect_result = midi_in.connect(
                &selected_port,
                &format!("blit-synth conn to {}", port_name),
                |timestamp, bytes, sender| {
                    if let Some(event) = parse_event(timestamp, bytes) {
                        log_if_error("failed to send MIDI event", sender.send(event));
                    }
                },
                sender.clone(),
            );

            match connect_result {
                Ok(conn) => {
                    tracing::info!("listening on MIDI port {}", port_name);
                    Ok(Connection(conn))
                }
                Err(err) => Err(anyhow!("could not connect to {}: {}", port_name, err)),
            }
        })
        .collect();

    connections.map(|conn| (receiver, conn))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_and_controller_messages_parse() {
        let event = parse_event(7, &[0x93, 60, 100]).unwrap();
        assert_eq!(event.timestamp, 7);
        assert_eq!(event.channel, 3);
        assert_eq!(event.content, EventContent::NoteOn { key: 60, vel: 100 });

        let event = parse_event(0, &[0xB0, 64, 127]).unwrap();
        assert_eq!(
            event.content,
            EventContent::Controller {
                controller: 64,
                value: 127
            }
        );
    }

    #[test]
    fn pitch_bend_and_pressure_parse() {
        let event = parse_event(0, &[0xE1, 0x00, 0x40]).unwrap();
        assert_eq!(event.content, EventContent::PitchBend { bend: 8192 });

        let event = parse_event(0, &[0xD0, 90]).unwrap();
        assert_eq!(event.content, EventContent::ChannelAftertouch { vel: 90 });
    }

    #[test]
    fn unused_messages_are_dropped() {
        // Program change
        assert!(parse_event(0, &[0xC0, 5]).is_none());
        // Timing clock
        assert!(parse_event(0, &[0xF8]).is_none());
    }

    #[test]
    fn bytes_survive_parsing() {
        for bytes in [[0x85, 61, 12], [0x9F, 1, 2], [0xB2, 71, 64], [0xE0, 0x7F, 0x7F]].iter() {
            let event = parse_event(0, bytes).unwrap();
            assert_eq!(&event.content.to_bytes(event.channel), bytes);
        }
    }
}
