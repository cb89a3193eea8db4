// Sequencer state - Shared between controller and player threads

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    #[default]
    NotRunning = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl SequencerState {
    /// A player thread exists and has not finished
    pub fn is_active(&self) -> bool {
        !matches!(self, SequencerState::NotRunning)
    }
}

impl From<u8> for SequencerState {
    fn from(value: u8) -> Self {
        match value {
            1 => SequencerState::Starting,
            2 => SequencerState::Running,
            3 => SequencerState::Stopping,
            _ => SequencerState::NotRunning,
        }
    }
}

/// Atomic wrapper so both thread roles can read the state without locking
#[derive(Debug, Default)]
pub struct AtomicSequencerState {
    inner: AtomicU8,
}

impl AtomicSequencerState {
    pub fn new(state: SequencerState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    pub fn get(&self) -> SequencerState {
        SequencerState::from(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SequencerState) {
        self.inner.store(state as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        let state = AtomicSequencerState::default();
        assert_eq!(state.get(), SequencerState::NotRunning);

        for s in [
            SequencerState::Starting,
            SequencerState::Running,
            SequencerState::Stopping,
            SequencerState::NotRunning,
        ] {
            state.set(s);
            assert_eq!(state.get(), s);
        }
    }

    #[test]
    fn test_is_active() {
        assert!(!SequencerState::NotRunning.is_active());
        assert!(SequencerState::Starting.is_active());
        assert!(SequencerState::Running.is_active());
        assert!(SequencerState::Stopping.is_active());
    }
}
