// Pattern Sequencer - Library exports for the player binary, tests and benchmarks

pub mod config;
pub mod messaging;
pub mod midi;
pub mod pattern;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use config::{ConfigError, MidiOutputConfig, SchedulingMode, SequencerConfig};
pub use messaging::{Notification, NotificationCategory, create_notification_channel};
pub use midi::{DeviceError, MidiMessage, MidirOutputSink, OutputSink, RecordingSink};
pub use pattern::{Dynamic, PatternError, PatternFile};
pub use sequencer::{
    Action, ActionKind, ChordResolver, DirectKeys, Event, HoldRecorder, LevelResolver, Sequencer,
    SequencerError, SequencerState, Tempo, TimeSignature, Timeline,
};
