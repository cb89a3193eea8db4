// MIDI output side: messages, sinks and devices

pub mod drum;
pub mod message;
pub mod output;
pub mod sink;

pub use message::MidiMessage;
pub use output::{MidiPortInfo, MidirOutputSink, list_output_ports};
pub use sink::{OutputSink, RecordingSink};

use thiserror::Error;

/// Output device errors
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Output device is closed")]
    Closed,

    #[error("Invalid MIDI message: {0}")]
    InvalidMessage(String),

    #[error("MIDI send failed: {0}")]
    Send(String),

    #[error("Failed to initialize MIDI: {0}")]
    Init(String),

    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("Failed to connect to MIDI port: {0}")]
    Connect(String),
}
