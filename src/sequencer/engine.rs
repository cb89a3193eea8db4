// Sequencer Engine - Start/stop handshake, looping policy and live notes

use crate::config::SequencerConfig;
use crate::messaging::channels::{
    NotificationConsumer, NotificationProducer, create_notification_channel,
};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::midi::DeviceError;
use crate::midi::message::{CC_ALL_NOTES_OFF, CC_BANK_SELECT_LSB, CC_BANK_SELECT_MSB, MidiMessage};
use crate::midi::sink::OutputSink;
use crate::sequencer::SequencerError;
use crate::sequencer::clock::Tempo;
use crate::sequencer::player::{PlayerLoop, SharedPlayback, SharedSink, push_notification};
use crate::sequencer::state::SequencerState;
use crate::sequencer::timeline::{DEFAULT_NOTE_OFF_VELOCITY, Timeline};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Highest bank number reachable with the two 7-bit bank select controllers
const MAX_BANK: u16 = 0x3FFF;

/// Controller side of a running player thread
struct PlayerHandle {
    cancel_tx: Sender<()>,
    stopped_rx: Receiver<()>,
    thread: JoinHandle<()>,
}

/// Real-time pattern sequencer.
///
/// One background thread per `start()` walks the current [`Timeline`] and
/// sends its actions to the output sink. Every method takes `&self`, so a
/// `Sequencer` can be shared between controller threads behind an `Arc`.
pub struct Sequencer {
    shared: Arc<SharedPlayback>,
    sink: SharedSink,
    config: SequencerConfig,
    notification_tx: Option<Arc<Mutex<NotificationProducer>>>,
    player: Mutex<Option<PlayerHandle>>,
}

impl Sequencer {
    pub fn new(sink: impl OutputSink + 'static, config: SequencerConfig) -> Self {
        let tempo = Tempo::new(config.tempo_bpm);

        Self {
            shared: Arc::new(SharedPlayback::new(tempo.bpm())),
            sink: Arc::new(Mutex::new(Box::new(sink))),
            config,
            notification_tx: None,
            player: Mutex::new(None),
        }
    }

    /// Route player notifications to `notification_tx`
    pub fn with_notifications(mut self, notification_tx: Arc<Mutex<NotificationProducer>>) -> Self {
        self.notification_tx = Some(notification_tx);
        self
    }

    /// Create a notification channel sized from the config and return its consumer.
    ///
    /// Takes effect from the next `start()`.
    pub fn subscribe_notifications(&mut self) -> NotificationConsumer {
        let (tx, rx) = create_notification_channel(self.config.notification_capacity);
        self.notification_tx = Some(Arc::new(Mutex::new(tx)));
        rx
    }

    /// Spawn the player thread and wait until it runs.
    ///
    /// No-op if already running.
    pub fn start(&self) -> Result<(), SequencerError> {
        let mut player = self.lock_player();

        if let Some(handle) = player.as_ref() {
            // The stop signal (or its sender dropping) marks the end of the loop,
            // even if the thread has not returned yet
            if let Err(TryRecvError::Empty) = handle.stopped_rx.try_recv() {
                log::debug!("Sequencer already running");
                return Ok(());
            }
        }
        // Reap a player that ended on its own
        if let Some(handle) = player.take() {
            if handle.thread.join().is_err() {
                log::error!("Previous player thread panicked");
            }
        }

        let timeline = self.shared.timeline().ok_or(SequencerError::NoTimeline)?;

        let (started_tx, started_rx) = bounded(1);
        let (stopped_tx, stopped_rx) = bounded(1);
        let (cancel_tx, cancel_rx) = bounded(1);

        let player_loop = PlayerLoop {
            shared: Arc::clone(&self.shared),
            sink: Arc::clone(&self.sink),
            notification_tx: self.notification_tx.clone(),
            scheduling: self.config.scheduling,
            all_notes_off_on_stop: self.config.all_notes_off_on_stop,
            started_tx,
            stopped_tx,
            cancel_rx,
        };

        self.shared.running.store(true, Ordering::Release);
        self.shared.state.set(SequencerState::Starting);

        let thread = thread::Builder::new()
            .name("sequencer-player".to_string())
            .spawn(move || player_loop.run())
            .inspect_err(|_| self.reset_state())?;

        self.shared.start_count.fetch_add(1, Ordering::AcqRel);

        let timeout = self.rendezvous_timeout();
        match started_rx.recv_timeout(timeout) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => {
                log::error!("Player did not start within {:?}", timeout);
                self.notify_error(format!("Player did not start within {:?}", timeout));
                self.shared.running.store(false, Ordering::Release);
                let _ = cancel_tx.try_send(());
                // Kept so that stop() can reap it
                *player = Some(PlayerHandle {
                    cancel_tx,
                    stopped_rx,
                    thread,
                });
                return Err(SequencerError::RendezvousTimeout("start", timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.reset_state();
                return match thread.join() {
                    Ok(()) => Err(SequencerError::PlayerExited),
                    Err(_) => Err(SequencerError::PlayerPanicked),
                };
            }
        }

        log::info!(
            "Sequencer started: {} bar(s), {} ticks at {}",
            timeline.bars(),
            timeline.size(),
            self.tempo()
        );

        *player = Some(PlayerHandle {
            cancel_tx,
            stopped_rx,
            thread,
        });
        Ok(())
    }

    /// Stop the player and wait until it has sent its last message.
    ///
    /// No-op if no player was started. After a natural end this only reaps
    /// the finished thread.
    pub fn stop(&self) -> Result<(), SequencerError> {
        let mut player = self.lock_player();
        let Some(handle) = player.take() else {
            return Ok(());
        };

        self.shared.running.store(false, Ordering::Release);
        let _ = handle.cancel_tx.try_send(());

        let timeout = self.rendezvous_timeout();
        match handle.stopped_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                log::error!("Player did not stop within {:?}", timeout);
                self.notify_error(format!("Player did not stop within {:?}", timeout));
                *player = Some(handle);
                return Err(SequencerError::RendezvousTimeout("stop", timeout));
            }
        }

        let joined = handle.thread.join();
        self.reset_state();

        match joined {
            Ok(()) => {
                log::info!(
                    "Sequencer stopped after {} ticks",
                    self.shared.ticks_played.load(Ordering::Acquire)
                );
                Ok(())
            }
            Err(_) => {
                log::error!("Player thread panicked");
                Err(SequencerError::PlayerPanicked)
            }
        }
    }

    /// Swap in a new timeline snapshot.
    ///
    /// Allowed while playing: the player picks it up on its next tick. With
    /// looping enabled the loop point moves to the new timeline's size.
    pub fn set(&self, timeline: impl Into<Arc<Timeline>>) {
        let timeline = timeline.into();
        log::debug!(
            "Timeline set: {} event(s), {} ticks",
            timeline.event_count(),
            timeline.size()
        );

        let mut playlist = self.shared.playlist();
        if playlist.loop_point.is_some() {
            playlist.loop_point = Some(timeline.size());
        }
        playlist.timeline = Some(timeline);
    }

    pub fn timeline(&self) -> Option<Arc<Timeline>> {
        self.shared.timeline()
    }

    /// Loop at the current timeline's size, or play once when disabled
    pub fn enable_looping(&self, enable: bool) -> Result<(), SequencerError> {
        let mut playlist = self.shared.playlist();
        playlist.loop_point = if enable {
            let timeline = playlist.timeline.as_ref().ok_or(SequencerError::NoTimeline)?;
            Some(timeline.size())
        } else {
            None
        };
        Ok(())
    }

    pub fn is_looping(&self) -> bool {
        self.loop_point().is_some()
    }

    pub fn loop_point(&self) -> Option<u64> {
        self.shared.loop_point()
    }

    pub fn set_tempo(&self, bpm: u32) {
        assert!(bpm > 0, "Tempo must be > 0 BPM");
        self.shared.tempo_bpm.store(bpm, Ordering::Relaxed);
    }

    pub fn tempo(&self) -> Tempo {
        self.shared.tempo()
    }

    pub fn state(&self) -> SequencerState {
        self.shared.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_active()
    }

    /// Timeline tick the player evaluates next
    pub fn position(&self) -> u64 {
        self.shared.position.load(Ordering::Acquire)
    }

    /// Ticks dispatched since the last start, wraps included
    pub fn ticks_played(&self) -> u64 {
        self.shared.ticks_played.load(Ordering::Acquire)
    }

    /// Number of player threads spawned so far
    pub fn start_count(&self) -> u64 {
        self.shared.start_count.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    // Live notes, independent of playback

    pub fn press_note(&self, channel: u8, key: u8, velocity: u8) -> Result<(), SequencerError> {
        self.send(&MidiMessage::NoteOn {
            channel,
            key,
            velocity,
        })
    }

    pub fn release_note(&self, channel: u8, key: u8) -> Result<(), SequencerError> {
        self.send(&MidiMessage::NoteOff {
            channel,
            key,
            velocity: DEFAULT_NOTE_OFF_VELOCITY,
        })
    }

    /// Note-on, block the caller for `duration_ms`, note-off
    pub fn play_note(
        &self,
        channel: u8,
        key: u8,
        velocity: u8,
        duration_ms: u64,
    ) -> Result<(), SequencerError> {
        self.press_note(channel, key, velocity)?;
        thread::sleep(Duration::from_millis(duration_ms));
        self.release_note(channel, key)
    }

    /// Like [`play_note`](Self::play_note) for several keys at once.
    ///
    /// If a note-on fails, the keys already pressed are released before the
    /// error is returned.
    pub fn play_chord(
        &self,
        channel: u8,
        keys: &[u8],
        velocity: u8,
        duration_ms: u64,
    ) -> Result<(), SequencerError> {
        for (pressed, key) in keys.iter().enumerate() {
            if let Err(e) = self.press_note(channel, *key, velocity) {
                for key in &keys[..pressed] {
                    let _ = self.release_note(channel, *key);
                }
                return Err(e);
            }
        }

        thread::sleep(Duration::from_millis(duration_ms));

        let mut result = Ok(());
        for key in keys {
            if let Err(e) = self.release_note(channel, *key) {
                result = Err(e);
            }
        }
        result
    }

    /// Bank select (MSB, LSB) followed by a program change.
    ///
    /// Banks are 14-bit; nothing is sent for a bank above 16383.
    pub fn select_instrument(
        &self,
        channel: u8,
        bank: u16,
        program: u8,
    ) -> Result<(), SequencerError> {
        if bank > MAX_BANK {
            return Err(DeviceError::InvalidMessage(format!(
                "bank {} out of range 0-{}",
                bank, MAX_BANK
            ))
            .into());
        }
        self.send(&MidiMessage::ControlChange {
            channel,
            controller: CC_BANK_SELECT_MSB,
            value: (bank >> 7) as u8,
        })?;
        self.send(&MidiMessage::ControlChange {
            channel,
            controller: CC_BANK_SELECT_LSB,
            value: (bank & 0x7f) as u8,
        })?;
        self.send(&MidiMessage::ProgramChange { channel, program })
    }

    pub fn all_notes_off(&self, channel: u8) -> Result<(), SequencerError> {
        self.send(&MidiMessage::ControlChange {
            channel,
            controller: CC_ALL_NOTES_OFF,
            value: 0,
        })
    }

    fn send(&self, message: &MidiMessage) -> Result<(), SequencerError> {
        lock(&self.sink).send(message)?;
        Ok(())
    }

    fn lock_player(&self) -> MutexGuard<'_, Option<PlayerHandle>> {
        lock(&self.player)
    }

    fn notify_error(&self, message: String) {
        push_notification(
            self.notification_tx.as_ref(),
            Notification::error(NotificationCategory::Playback, message),
        );
    }

    fn reset_state(&self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.state.set(SequencerState::NotRunning);
    }

    fn rendezvous_timeout(&self) -> Duration {
        Duration::from_millis(self.config.rendezvous_timeout_ms)
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Failed to stop sequencer on drop: {}", e);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
