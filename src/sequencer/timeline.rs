// Timeline - Events keyed by start tick
// A timeline is what the sequencer plays: it owns its events and resolves
// them to note-on/note-off actions one tick at a time

use crate::sequencer::clock::{self, Tempo, TimeSignature};
use crate::sequencer::resolver::{DirectKeys, LevelResolver};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Velocity carried by note-off actions
pub const DEFAULT_NOTE_OFF_VELOCITY: u8 = 0;

/// One or more simultaneous articulations sharing velocity and duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Keys or intervals, unique within the event, in insertion order
    levels: Vec<i32>,

    /// MIDI velocity (0-127)
    velocity: u8,

    /// Sustain length in ticks (> 0)
    duration_ticks: u64,
}

impl Event {
    /// Creates a new event, dropping repeated levels
    pub fn new(levels: &[i32], velocity: u8, duration_ticks: u64) -> Self {
        assert!(velocity <= 127, "MIDI velocity must be 0-127");
        assert!(duration_ticks > 0, "Event duration must be > 0");

        let mut unique = Vec::with_capacity(levels.len());
        for level in levels {
            if !unique.contains(level) {
                unique.push(*level);
            }
        }

        Self {
            levels: unique,
            velocity,
            duration_ticks,
        }
    }

    pub fn levels(&self) -> &[i32] {
        &self.levels
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn duration_ticks(&self) -> u64 {
        self.duration_ticks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    NoteOn,
    NoteOff,
}

/// A resolved note instruction, ready for an output sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
}

impl Action {
    pub fn note_on(channel: u8, key: u8, velocity: u8) -> Self {
        Self {
            kind: ActionKind::NoteOn,
            channel,
            key,
            velocity,
        }
    }

    pub fn note_off(channel: u8, key: u8) -> Self {
        Self {
            kind: ActionKind::NoteOff,
            channel,
            key,
            velocity: DEFAULT_NOTE_OFF_VELOCITY,
        }
    }

    pub fn is_note_on(&self) -> bool {
        self.kind == ActionKind::NoteOn
    }

    pub fn is_note_off(&self) -> bool {
        self.kind == ActionKind::NoteOff
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            ActionKind::NoteOn => "ON",
            ActionKind::NoteOff => "OFF",
        };
        write!(
            f,
            "{} chan #{}, key {}, velocity {}",
            name, self.channel, self.key, self.velocity
        )
    }
}

/// Events of one pattern, bucketed by start tick.
///
/// The length is always a whole number of bars and grows as events are added
/// past the end. It never shrinks.
#[derive(Debug, Clone)]
pub struct Timeline {
    time_signature: TimeSignature,
    ticks_per_beat: u32,
    channel: u8,
    bars: u64,
    tick_events: BTreeMap<u64, Vec<Event>>,
    resolver: Arc<dyn LevelResolver>,
}

impl Timeline {
    /// Create an empty one-bar timeline whose levels are MIDI keys
    pub fn new(time_signature: TimeSignature, ticks_per_beat: u32, channel: u8) -> Self {
        assert!(ticks_per_beat > 0, "Ticks per beat must be > 0");
        assert!(channel <= 15, "MIDI channel must be 0-15");

        Self {
            time_signature,
            ticks_per_beat,
            channel,
            bars: 1,
            tick_events: BTreeMap::new(),
            resolver: Arc::new(DirectKeys),
        }
    }

    /// Use another level-to-key strategy (e.g. a chord for melodic patterns)
    pub fn with_resolver(mut self, resolver: Arc<dyn LevelResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Make the timeline at least `bars` long
    pub fn with_bars(mut self, bars: u64) -> Self {
        self.bars = self.bars.max(bars);
        self
    }

    /// Add an event spanning `[tick_start, tick_stop)`
    pub fn add(&mut self, levels: &[i32], velocity: u8, tick_start: u64, tick_stop: u64) {
        assert!(tick_stop > tick_start, "Event must stop after it starts");

        let event = Event::new(levels, velocity, tick_stop - tick_start);
        self.tick_events.entry(tick_start).or_default().push(event);

        let bar_index = clock::compute_bar_index(
            tick_stop - 1,
            self.ticks_per_beat,
            self.time_signature.beats_per_bar(),
        );
        self.bars = self.bars.max(bar_index + 1);
    }

    /// Events starting exactly at `tick`
    pub fn events_at(&self, tick: u64) -> &[Event] {
        self.tick_events
            .get(&tick)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_events(&self, tick: u64) -> bool {
        self.tick_events.contains_key(&tick)
    }

    /// All buckets in ascending tick order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[Event])> {
        self.tick_events
            .iter()
            .map(|(tick, events)| (*tick, events.as_slice()))
    }

    /// Resolve the actions that fire at `tick`.
    ///
    /// Events starting at `tick` produce note-ons. Events that started at an
    /// earlier tick and whose duration equals the distance to `tick` produce
    /// note-offs. Buckets are visited in ascending order, so note-offs come
    /// before the note-ons of the same tick.
    pub fn actions_at(&self, tick: u64) -> Vec<Action> {
        let mut actions = Vec::new();

        for (start, events) in self.tick_events.range(..=tick) {
            if *start < tick {
                let distance = tick - start;
                for event in events.iter().filter(|e| e.duration_ticks == distance) {
                    for key in self.keys(event) {
                        actions.push(Action::note_off(self.channel, key));
                    }
                }
            } else {
                for event in events {
                    for key in self.keys(event) {
                        actions.push(Action::note_on(self.channel, key, event.velocity));
                    }
                }
            }
        }

        actions
    }

    fn keys<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = u8> + 'a {
        event
            .levels
            .iter()
            .filter_map(move |level| self.resolver.resolve(*level))
    }

    /// Number of ticks spanned, capped at `u64::MAX`
    pub fn size(&self) -> u64 {
        self.time_signature
            .ticks_in_bar(self.ticks_per_beat)
            .saturating_mul(self.bars)
    }

    /// Wall-clock length of one pass, including the final note-off tick
    pub fn duration_ms(&self, tempo: Tempo) -> u64 {
        self.size()
            .saturating_add(1)
            .saturating_mul(clock::tick_duration_ms(tempo.bpm(), self.ticks_per_beat))
    }

    pub fn bars(&self) -> u64 {
        self.bars
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_beat
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn resolver(&self) -> &Arc<dyn LevelResolver> {
        &self.resolver
    }

    /// Number of events (not buckets)
    pub fn event_count(&self) -> usize {
        self.tick_events.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tick_events.is_empty()
    }
}
