// MIDI messages sent to output sinks

use crate::midi::DeviceError;
use crate::sequencer::timeline::{Action, ActionKind};
use std::fmt;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const PROGRAM_CHANGE: u8 = 0xC0;

/// Controller number of "All Notes Off"
pub const CC_ALL_NOTES_OFF: u8 = 123;
/// Controller numbers of bank select (MSB, LSB)
pub const CC_BANK_SELECT_MSB: u8 = 0;
pub const CC_BANK_SELECT_LSB: u8 = 32;

/// Channel voice message. Channels are 0-15, data bytes 0-127.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiMessage {
    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. } => channel,
        }
    }

    /// Check channel and data ranges before anything goes on the wire
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.channel() > 15 {
            return Err(DeviceError::InvalidMessage(format!(
                "channel {} out of range 0-15",
                self.channel()
            )));
        }

        let data_ok = match *self {
            MidiMessage::NoteOn { key, velocity, .. }
            | MidiMessage::NoteOff { key, velocity, .. } => key <= 127 && velocity <= 127,
            MidiMessage::ControlChange {
                controller, value, ..
            } => controller <= 127 && value <= 127,
            MidiMessage::ProgramChange { program, .. } => program <= 127,
        };

        if data_ok {
            Ok(())
        } else {
            Err(DeviceError::InvalidMessage(format!(
                "data byte out of range in {}",
                self
            )))
        }
    }

    /// Encode as a short MIDI message (2 or 3 bytes)
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOn {
                channel,
                key,
                velocity,
            } => vec![NOTE_ON | channel, key, velocity],
            MidiMessage::NoteOff {
                channel,
                key,
                velocity,
            } => vec![NOTE_OFF | channel, key, velocity],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => vec![CONTROL_CHANGE | channel, controller, value],
            MidiMessage::ProgramChange { channel, program } => {
                vec![PROGRAM_CHANGE | channel, program]
            }
        }
    }

    /// Parse a raw MIDI message
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let channel = status & 0x0F;

        match status & 0xF0 {
            NOTE_ON if bytes.len() >= 3 => {
                let (key, velocity) = (bytes[1], bytes[2]);
                // Velocity 0 = Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        channel,
                        key,
                        velocity,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        key,
                        velocity,
                    })
                }
            }
            NOTE_OFF if bytes.len() >= 3 => Some(MidiMessage::NoteOff {
                channel,
                key: bytes[1],
                velocity: bytes[2],
            }),
            CONTROL_CHANGE if bytes.len() >= 3 => Some(MidiMessage::ControlChange {
                channel,
                controller: bytes[1],
                value: bytes[2],
            }),
            PROGRAM_CHANGE if bytes.len() >= 2 => Some(MidiMessage::ProgramChange {
                channel,
                program: bytes[1],
            }),
            _ => None,
        }
    }
}

impl From<Action> for MidiMessage {
    fn from(action: Action) -> Self {
        match action.kind {
            ActionKind::NoteOn => MidiMessage::NoteOn {
                channel: action.channel,
                key: action.key,
                velocity: action.velocity,
            },
            ActionKind::NoteOff => MidiMessage::NoteOff {
                channel: action.channel,
                key: action.key,
                velocity: action.velocity,
            },
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOn {
                channel,
                key,
                velocity,
            } => write!(f, "NOTE_ON chan #{}, key {}, velocity {}", channel, key, velocity),
            MidiMessage::NoteOff {
                channel,
                key,
                velocity,
            } => write!(f, "NOTE_OFF chan #{}, key {}, velocity {}", channel, key, velocity),
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => write!(
                f,
                "CONTROL_CHANGE chan #{}, controller {}, value {}",
                channel, controller, value
            ),
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "PROGRAM_CHANGE chan #{}, program {}", channel, program)
            }
        }
    }
}
