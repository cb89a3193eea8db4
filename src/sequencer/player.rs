// Sequencer Player - Walks the timeline tick by tick on a dedicated thread

use crate::config::SchedulingMode;
use crate::messaging::channels::NotificationProducer;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::midi::message::{CC_ALL_NOTES_OFF, MidiMessage};
use crate::midi::sink::OutputSink;
use crate::sequencer::clock::Tempo;
use crate::sequencer::state::{AtomicSequencerState, SequencerState};
use crate::sequencer::timeline::{Action, Timeline};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Output sink shared by live sends and the player thread
pub(crate) type SharedSink = Arc<Mutex<Box<dyn OutputSink>>>;

/// Immutable timeline snapshot, swapped whole by `set()`, and its loop point
#[derive(Debug, Clone, Default)]
pub(crate) struct Playlist {
    pub timeline: Option<Arc<Timeline>>,
    pub loop_point: Option<u64>,
}

/// State shared between the controller and the player thread
#[derive(Debug)]
pub(crate) struct SharedPlayback {
    /// Continue flag, cleared by `stop()`
    pub running: AtomicBool,
    pub state: AtomicSequencerState,
    /// Timeline and loop point, always replaced together
    pub playlist: Mutex<Playlist>,
    pub tempo_bpm: AtomicU32,
    /// Tick the player will evaluate next
    pub position: AtomicU64,
    /// Ticks evaluated since the last start
    pub ticks_played: AtomicU64,
    pub start_count: AtomicU64,
}

impl SharedPlayback {
    pub fn new(tempo_bpm: u32) -> Self {
        Self {
            running: AtomicBool::new(false),
            state: AtomicSequencerState::new(SequencerState::NotRunning),
            playlist: Mutex::new(Playlist::default()),
            tempo_bpm: AtomicU32::new(tempo_bpm),
            position: AtomicU64::new(0),
            ticks_played: AtomicU64::new(0),
            start_count: AtomicU64::new(0),
        }
    }

    pub fn playlist(&self) -> MutexGuard<'_, Playlist> {
        self.playlist.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn timeline(&self) -> Option<Arc<Timeline>> {
        self.playlist().timeline.clone()
    }

    pub fn loop_point(&self) -> Option<u64> {
        self.playlist().loop_point
    }

    pub fn tempo(&self) -> Tempo {
        Tempo::new(self.tempo_bpm.load(Ordering::Relaxed))
    }
}

/// Playback position within a timeline.
///
/// `tick` is the timeline tick evaluated next; it wraps to 0 at the loop
/// point. `steps` counts every evaluated tick and never wraps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    tick: u64,
    steps: u64,
    wrapped: bool,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The tick `size()` is still played so the last note-offs go out
    pub fn is_exhausted(&self, timeline: &Timeline) -> bool {
        self.tick > timeline.size()
    }

    /// Actions due at the current tick.
    ///
    /// Right after a wrap, the note-offs that fall on the loop point come
    /// first, since that tick is never evaluated while looping.
    pub fn actions(&self, timeline: &Timeline, loop_point: Option<u64>) -> Vec<Action> {
        let mut actions = Vec::new();

        if self.wrapped && self.tick == 0 {
            if let Some(loop_point) = loop_point {
                actions.extend(
                    timeline
                        .actions_at(loop_point)
                        .into_iter()
                        .filter(Action::is_note_off),
                );
            }
        }

        actions.extend(timeline.actions_at(self.tick));
        actions
    }

    pub fn advance(&mut self, loop_point: Option<u64>) {
        self.steps += 1;
        self.tick += 1;
        self.wrapped = false;

        if let Some(loop_point) = loop_point {
            if self.tick >= loop_point {
                self.tick = 0;
                self.wrapped = true;
            }
        }
    }
}

/// Computes how long to sleep before dispatching each tick
#[derive(Debug)]
struct TickScheduler {
    mode: SchedulingMode,
    last_tick: Instant,
    // Absolute mode: deadlines are offsets from `origin`, rebased when the
    // tempo or resolution changes
    origin: Instant,
    origin_step: u64,
    rate: (u32, u32),
}

impl TickScheduler {
    fn new(mode: SchedulingMode, now: Instant) -> Self {
        Self {
            mode,
            last_tick: now,
            origin: now,
            origin_step: 0,
            rate: (0, 0),
        }
    }

    fn wait(&mut self, step: u64, tempo: Tempo, ticks_per_beat: u32) -> Duration {
        match self.mode {
            SchedulingMode::SelfCorrecting => tempo
                .tick_duration(ticks_per_beat)
                .saturating_sub(self.last_tick.elapsed()),
            SchedulingMode::Absolute => {
                let rate = (tempo.bpm(), ticks_per_beat);
                if rate != self.rate {
                    self.rate = rate;
                    self.origin = self.last_tick;
                    self.origin_step = step;
                }
                let deadline =
                    self.origin + tempo.tick_time(step - self.origin_step + 1, ticks_per_beat);
                deadline.saturating_duration_since(Instant::now())
            }
        }
    }

    fn mark_tick(&mut self) {
        self.last_tick = Instant::now();
    }
}

/// Why the loop exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    /// Timeline exhausted or removed
    Finished,
    /// Continue flag cleared or sleep cancelled
    Stopped,
}

/// Body of the player thread
pub(crate) struct PlayerLoop {
    pub shared: Arc<SharedPlayback>,
    pub sink: SharedSink,
    pub notification_tx: Option<Arc<Mutex<NotificationProducer>>>,
    pub scheduling: SchedulingMode,
    pub all_notes_off_on_stop: bool,
    pub started_tx: Sender<()>,
    pub stopped_tx: Sender<()>,
    pub cancel_rx: Receiver<()>,
}

impl PlayerLoop {
    pub fn run(self) {
        let _guard = ExitGuard {
            shared: &self.shared,
            stopped_tx: &self.stopped_tx,
            notification_tx: self.notification_tx.as_ref(),
        };
        let mut cursor = PlaybackCursor::new();
        let mut scheduler = TickScheduler::new(self.scheduling, Instant::now());
        let mut last_channel = None;

        self.shared.position.store(0, Ordering::Release);
        self.shared.ticks_played.store(0, Ordering::Release);
        self.shared.state.set(SequencerState::Running);
        let _ = self.started_tx.send(());

        let exit = loop {
            if !self.shared.running.load(Ordering::Acquire) {
                break LoopExit::Stopped;
            }

            let Playlist {
                timeline,
                loop_point,
            } = self.shared.playlist().clone();
            let Some(timeline) = timeline else {
                break LoopExit::Finished;
            };
            last_channel = Some(timeline.channel());

            if cursor.is_exhausted(&timeline) {
                break LoopExit::Finished;
            }

            let actions = cursor.actions(&timeline, loop_point);

            let wait = scheduler.wait(
                cursor.steps(),
                self.shared.tempo(),
                timeline.ticks_per_beat(),
            );
            match self.cancel_rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break LoopExit::Stopped,
            }
            scheduler.mark_tick();

            if !self.shared.running.load(Ordering::Acquire) {
                break LoopExit::Stopped;
            }

            log::trace!("Tick {} ({} actions)", cursor.tick(), actions.len());
            self.dispatch(cursor.tick(), &actions);

            cursor.advance(loop_point);
            self.shared.position.store(cursor.tick(), Ordering::Release);
            self.shared
                .ticks_played
                .store(cursor.steps(), Ordering::Release);
        };

        self.shared.running.store(false, Ordering::Release);
        self.shared.state.set(SequencerState::Stopping);

        if exit == LoopExit::Finished {
            log::info!("Sequence finished after {} ticks", cursor.steps());
            self.notify(Notification::info(
                NotificationCategory::Playback,
                format!("Sequence finished after {} ticks", cursor.steps()),
            )
            .at_tick(cursor.tick()));
        }

        if self.all_notes_off_on_stop {
            if let Some(channel) = last_channel {
                let message = MidiMessage::ControlChange {
                    channel,
                    controller: CC_ALL_NOTES_OFF,
                    value: 0,
                };
                if let Err(e) = self.send(&message) {
                    log::warn!("All notes off failed on channel {}: {}", channel, e);
                }
            }
        }

        // Signal before going idle: whoever sees NotRunning can reap the thread
        let _ = self.stopped_tx.send(());
        self.shared.state.set(SequencerState::NotRunning);
    }

    /// Send every action in order, dropping the rest of the tick on the first failure
    fn dispatch(&self, tick: u64, actions: &[Action]) {
        for (index, action) in actions.iter().enumerate() {
            if let Err(e) = self.send(&MidiMessage::from(*action)) {
                let skipped = actions.len() - index;
                log::warn!(
                    "Tick {}: {} failed ({}), skipping {} action(s)",
                    tick,
                    action,
                    e,
                    skipped
                );
                self.notify(Notification::warning(
                    NotificationCategory::Device,
                    format!("{} action(s) skipped: {}", skipped, e),
                )
                .at_tick(tick));
                return;
            }
        }
    }

    fn send(&self, message: &MidiMessage) -> Result<(), crate::midi::DeviceError> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(message)
    }

    fn notify(&self, notification: Notification) {
        push_notification(self.notification_tx.as_ref(), notification);
    }
}

/// Leaves the shared state stopped when `run` returns or unwinds.
///
/// A panicking sink would otherwise keep `state()` at `Running` until the
/// controller calls `stop()`.
struct ExitGuard<'a> {
    shared: &'a SharedPlayback,
    stopped_tx: &'a Sender<()>,
    notification_tx: Option<&'a Arc<Mutex<NotificationProducer>>>,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let panicking = thread::panicking();
        if panicking {
            let _ = self.stopped_tx.try_send(());
        }
        self.shared.running.store(false, Ordering::Release);
        self.shared.state.set(SequencerState::NotRunning);

        if panicking {
            log::error!("Player thread panicked");
            push_notification(
                self.notification_tx,
                Notification::error(
                    NotificationCategory::Playback,
                    "Player thread panicked, playback stopped".to_string(),
                )
                .at_tick(self.shared.position.load(Ordering::Acquire)),
            );
        }
    }
}

pub(crate) fn push_notification(
    notification_tx: Option<&Arc<Mutex<NotificationProducer>>>,
    notification: Notification,
) {
    if let Some(tx) = notification_tx {
        if let Ok(mut tx) = tx.try_lock() {
            let _ = ringbuf::traits::Producer::try_push(&mut *tx, notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::clock::TimeSignature;
    use crate::sequencer::timeline::ActionKind;

    // 4/4, 1 tick per beat: size 4
    fn short_timeline() -> Timeline {
        let mut timeline = Timeline::new(TimeSignature::four_four(), 1, 0);
        timeline.add(&[60], 100, 0, 1);
        timeline.add(&[64], 100, 2, 4);
        timeline
    }

    #[test]
    fn test_cursor_without_loop_exhausts_after_size() {
        let timeline = short_timeline();
        let mut cursor = PlaybackCursor::new();

        for _ in 0..=timeline.size() {
            assert!(!cursor.is_exhausted(&timeline));
            cursor.advance(None);
        }

        assert!(cursor.is_exhausted(&timeline));
        assert_eq!(cursor.steps(), timeline.size() + 1);
    }

    #[test]
    fn test_cursor_wraps_at_loop_point() {
        let timeline = short_timeline();
        let size = timeline.size();
        let mut cursor = PlaybackCursor::new();

        // N * S + k steps land on tick k
        for _ in 0..(3 * size + 2) {
            cursor.advance(Some(size));
            assert!(!cursor.is_exhausted(&timeline));
        }

        assert_eq!(cursor.tick(), 2);
        assert_eq!(cursor.steps(), 3 * size + 2);
    }

    #[test]
    fn test_wrap_carries_loop_point_note_offs() {
        let timeline = short_timeline();
        let size = timeline.size();
        let mut cursor = PlaybackCursor::new();

        for _ in 0..size {
            cursor.advance(Some(size));
        }
        assert_eq!(cursor.tick(), 0);

        let actions = cursor.actions(&timeline, Some(size));
        // Note-off for key 64 (ends at tick 4), then note-on for key 60
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], Action::note_off(0, 64));
        assert_eq!(actions[1].kind, ActionKind::NoteOn);
        assert_eq!(actions[1].key, 60);
    }

    #[test]
    fn test_first_pass_has_no_carry() {
        let timeline = short_timeline();
        let cursor = PlaybackCursor::new();

        let actions = cursor.actions(&timeline, Some(timeline.size()));
        assert_eq!(actions, vec![Action::note_on(0, 60, 100)]);
    }

    #[test]
    fn test_self_correcting_wait_subtracts_elapsed() {
        let start = Instant::now() - Duration::from_millis(100);
        let mut scheduler = TickScheduler::new(SchedulingMode::SelfCorrecting, start);

        // 120 BPM, 1 tick per beat: 500ms per tick
        let wait = scheduler.wait(0, Tempo::new(120), 1);
        assert!(wait <= Duration::from_millis(400));
        assert!(wait > Duration::from_millis(300));
    }

    #[test]
    fn test_absolute_wait_targets_grid() {
        let start = Instant::now();
        let mut scheduler = TickScheduler::new(SchedulingMode::Absolute, start);

        let wait = scheduler.wait(0, Tempo::new(120), 1);
        assert!(wait <= Duration::from_millis(500));
        assert!(wait > Duration::from_millis(400));
    }

    #[test]
    fn test_overdue_tick_does_not_sleep() {
        let start = Instant::now() - Duration::from_secs(2);
        let mut scheduler = TickScheduler::new(SchedulingMode::SelfCorrecting, start);

        assert_eq!(scheduler.wait(0, Tempo::new(120), 1), Duration::ZERO);
    }
}
