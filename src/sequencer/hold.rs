// Hold recorder - Builds timeline events from press/release interactions
// An editor presses a level at one tick and releases it at another

use crate::sequencer::timeline::Timeline;
use std::collections::HashMap;

/// Tracks held levels until they are released into a timeline
#[derive(Debug, Default)]
pub struct HoldRecorder {
    held: HashMap<i32, (u8, u64)>, // level -> (velocity, start_tick)
}

impl HoldRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start holding `level`. Pressing a level that is already held restarts it.
    pub fn press(&mut self, level: i32, velocity: u8, tick: u64) {
        assert!(velocity <= 127, "MIDI velocity must be 0-127");
        self.held.insert(level, (velocity, tick));
    }

    /// Release `level` and add the held span to `timeline`.
    ///
    /// Returns `false` if the level was not held. A release on (or before)
    /// the press tick still yields a one-tick event.
    pub fn release(&mut self, level: i32, tick: u64, timeline: &mut Timeline) -> bool {
        match self.held.remove(&level) {
            Some((velocity, start_tick)) => {
                let stop_tick = tick.max(start_tick + 1);
                timeline.add(&[level], velocity, start_tick, stop_tick);
                true
            }
            None => false,
        }
    }

    /// Release everything still held at `tick`.
    /// Returns the number of events added.
    pub fn finalize(&mut self, tick: u64, timeline: &mut Timeline) -> usize {
        let mut held: Vec<(i32, (u8, u64))> = self.held.drain().collect();
        held.sort_by_key(|(level, (_, start))| (*start, *level));

        for (level, (velocity, start_tick)) in &held {
            let stop_tick = tick.max(start_tick + 1);
            timeline.add(&[*level], *velocity, *start_tick, stop_tick);
        }

        held.len()
    }

    pub fn is_held(&self, level: i32) -> bool {
        self.held.contains_key(&level)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}
