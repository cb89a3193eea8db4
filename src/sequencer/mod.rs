// Sequencer module
// Musical time, event timeline and the real-time playback engine

pub mod clock;
pub mod engine;
pub mod hold;
pub mod player;
pub mod resolver;
pub mod state;
pub mod timeline;

pub use clock::{Tempo, TimeSignature, compute_bar_index, tick_duration_ms, tick_time_ms};
pub use engine::Sequencer;
pub use hold::HoldRecorder;
pub use player::PlaybackCursor;
pub use resolver::{ChordResolver, DirectKeys, LevelResolver, NULL_LEVEL};
pub use state::SequencerState;
pub use timeline::{Action, ActionKind, Event, Timeline};

use crate::midi::DeviceError;
use std::time::Duration;
use thiserror::Error;

/// Sequencer control errors
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("No timeline set")]
    NoTimeline,

    #[error("Timed out after {1:?} waiting for the player to {0}")]
    RendezvousTimeout(&'static str, Duration),

    #[error("Player thread exited before signalling")]
    PlayerExited,

    #[error("Player thread panicked")]
    PlayerPanicked,

    #[error("Failed to spawn player thread: {0}")]
    Spawn(#[from] std::io::Error),
}
