// Level resolution - Maps event levels to MIDI keys
// Drum patterns store keys directly, melodic patterns store chord intervals

use std::fmt::Debug;

/// Level value meaning "no note"
pub const NULL_LEVEL: i32 = 0;

/// Strategy turning an event level into a MIDI key.
///
/// Returns `None` when the level produces no note (the NULL level, an
/// interval outside the chord, or a key outside 0-127).
pub trait LevelResolver: Debug + Send + Sync {
    fn resolve(&self, level: i32) -> Option<u8>;
}

/// Levels are MIDI keys (drum patterns)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectKeys;

impl LevelResolver for DirectKeys {
    fn resolve(&self, level: i32) -> Option<u8> {
        if level == NULL_LEVEL {
            return None;
        }
        to_key(level)
    }
}

/// Levels are 1-based intervals into a chord (melodic and guitar patterns)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordResolver {
    chord: Vec<i32>,
    octave_offset: i32,
}

impl ChordResolver {
    pub fn new(chord: Vec<i32>) -> Self {
        Self {
            chord,
            octave_offset: 0,
        }
    }

    /// Transpose every resolved key by whole octaves
    pub fn with_octave_offset(mut self, octave_offset: i32) -> Self {
        self.octave_offset = octave_offset;
        self
    }

    pub fn chord(&self) -> &[i32] {
        &self.chord
    }
}

impl LevelResolver for ChordResolver {
    fn resolve(&self, level: i32) -> Option<u8> {
        if level < 1 {
            return None;
        }
        let note = *self.chord.get(level as usize - 1)?;
        if note == NULL_LEVEL {
            return None;
        }
        to_key(note + 12 * self.octave_offset)
    }
}

fn to_key(value: i32) -> Option<u8> {
    u8::try_from(value).ok().filter(|key| *key <= 127)
}
