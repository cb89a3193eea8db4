// Output sinks - Anything that accepts one MIDI message now

use crate::midi::DeviceError;
use crate::midi::message::MidiMessage;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Receiver of timed note messages (a MIDI port, a synthesizer, a recorder).
///
/// `send` delivers the message immediately. A sink that is closed or
/// rejects the message returns a [`DeviceError`]; the caller decides whether
/// to retry (the sequencer never does).
pub trait OutputSink: Send {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DeviceError>;
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DeviceError> {
        (**self).send(message)
    }
}

/// Sink that stores every accepted message.
///
/// Clones share the same log, so a test can keep one clone and hand the
/// other to a sequencer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<MidiMessage>>>,
    closed: Arc<AtomicBool>,
    rejected_keys: Arc<Mutex<HashSet<u8>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the accepted messages, oldest first
    pub fn messages(&self) -> Vec<MidiMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }

    /// A closed sink fails every send with [`DeviceError::Closed`]
    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::Release);
    }

    /// Fail note messages for `key` with [`DeviceError::Send`]
    pub fn reject_key(&self, key: u8) {
        if let Ok(mut keys) = self.rejected_keys.lock() {
            keys.insert(key);
        }
    }
}

impl OutputSink for RecordingSink {
    fn send(&mut self, message: &MidiMessage) -> Result<(), DeviceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeviceError::Closed);
        }
        message.validate()?;

        if let MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } = *message {
            let rejected = self
                .rejected_keys
                .lock()
                .map(|keys| keys.contains(&key))
                .unwrap_or(false);
            if rejected {
                return Err(DeviceError::Send(format!("rejected {}", message)));
            }
        }

        if let Ok(mut messages) = self.messages.lock() {
            messages.push(*message);
        }
        Ok(())
    }
}
