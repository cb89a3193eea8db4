// Pattern files - Line-based text interchange for timelines
//
//   # comment
//   ticks_per_beat=4
//   36,42;0;1;100      levels;tick;duration;velocity
//   38;4;1;mf

use crate::pattern::PatternError;
use crate::pattern::dynamic::parse_velocity;
use crate::sequencer::clock::TimeSignature;
use crate::sequencer::resolver::LevelResolver;
use crate::sequencer::timeline::Timeline;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_TICKS_PER_BEAT: u32 = 96;
pub const OPTION_TICKS_PER_BEAT: &str = "ticks_per_beat";

/// One data line of a pattern file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternLine {
    pub levels: Vec<i32>,
    pub tick: u64,
    pub duration: u64,
    pub velocity: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFile {
    pub ticks_per_beat: u32,
    pub lines: Vec<PatternLine>,
}

impl Default for PatternFile {
    fn default() -> Self {
        Self {
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
            lines: Vec::new(),
        }
    }
}

impl PatternFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PatternError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let pattern = Self::parse(&contents)?;
        log::debug!(
            "Loaded pattern {} ({} line(s), {} ticks per beat)",
            path.display(),
            pattern.lines.len(),
            pattern.ticks_per_beat
        );
        Ok(pattern)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PatternError> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }

    /// Line numbers in errors are 1-based
    pub fn parse(contents: &str) -> Result<Self, PatternError> {
        let mut pattern = Self::default();

        for (index, raw) in contents.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();

            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            if let Some((name, value)) = text.split_once('=') {
                pattern.apply_option(line, name.trim(), value.trim())?;
            } else {
                pattern.lines.push(parse_data_line(line, text)?);
            }
        }

        Ok(pattern)
    }

    fn apply_option(&mut self, line: usize, name: &str, value: &str) -> Result<(), PatternError> {
        if name.eq_ignore_ascii_case(OPTION_TICKS_PER_BEAT) {
            self.ticks_per_beat = value
                .parse::<u32>()
                .ok()
                .filter(|tpb| *tpb > 0)
                .ok_or_else(|| invalid(line, format!("bad {} '{}'", OPTION_TICKS_PER_BEAT, value)))?;
        } else {
            log::debug!("Pattern line {}: ignoring unknown option '{}'", line, name);
        }
        Ok(())
    }

    /// Last tick covered by any line
    pub fn end_tick(&self) -> u64 {
        self.lines
            .iter()
            .map(|l| l.tick.saturating_add(l.duration))
            .max()
            .unwrap_or(0)
    }

    /// Timeline whose levels are MIDI keys
    pub fn to_timeline(&self, time_signature: TimeSignature, channel: u8) -> Timeline {
        self.fill(Timeline::new(time_signature, self.ticks_per_beat, channel))
    }

    /// Timeline whose levels go through `resolver`
    pub fn to_timeline_with(
        &self,
        time_signature: TimeSignature,
        channel: u8,
        resolver: Arc<dyn LevelResolver>,
    ) -> Timeline {
        self.fill(Timeline::new(time_signature, self.ticks_per_beat, channel).with_resolver(resolver))
    }

    fn fill(&self, mut timeline: Timeline) -> Timeline {
        for l in &self.lines {
            timeline.add(&l.levels, l.velocity, l.tick, l.tick.saturating_add(l.duration));
        }
        timeline
    }

    pub fn from_timeline(timeline: &Timeline) -> Self {
        let lines = timeline
            .iter()
            .flat_map(|(tick, events)| {
                events.iter().map(move |event| PatternLine {
                    levels: event.levels().to_vec(),
                    tick,
                    duration: event.duration_ticks(),
                    velocity: event.velocity(),
                })
            })
            .collect();

        Self {
            ticks_per_beat: timeline.ticks_per_beat(),
            lines,
        }
    }
}

impl fmt::Display for PatternFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}={}", OPTION_TICKS_PER_BEAT, self.ticks_per_beat)?;
        for l in &self.lines {
            let levels: Vec<String> = l.levels.iter().map(|level| level.to_string()).collect();
            writeln!(f, "{};{};{};{}", levels.join(","), l.tick, l.duration, l.velocity)?;
        }
        Ok(())
    }
}

fn parse_data_line(line: usize, text: &str) -> Result<PatternLine, PatternError> {
    let words: Vec<&str> = text.split(';').map(str::trim).collect();
    if words.len() != 4 {
        return Err(invalid(
            line,
            format!("expected 4 ';'-separated fields, found {}", words.len()),
        ));
    }

    let levels = words[0]
        .split(',')
        .map(|level| level.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid(line, format!("bad levels '{}'", words[0])))?;

    let tick = words[1]
        .parse::<u64>()
        .map_err(|_| invalid(line, format!("bad tick '{}'", words[1])))?;

    let duration = words[2]
        .parse::<u64>()
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| invalid(line, format!("bad duration '{}'", words[2])))?;

    if tick.checked_add(duration).is_none() {
        return Err(invalid(
            line,
            format!("event at tick {} with duration {} ends past the last tick", tick, duration),
        ));
    }

    let velocity = match parse_velocity(words[3]) {
        Some(velocity) => velocity,
        None if words[3].bytes().all(|b| b.is_ascii_digit()) => {
            return Err(invalid(line, format!("velocity '{}' out of range", words[3])));
        }
        None => {
            return Err(PatternError::UnknownDynamic {
                line,
                label: words[3].to_string(),
            });
        }
    };

    Ok(PatternLine {
        levels,
        tick,
        duration,
        velocity,
    })
}

fn invalid(line: usize, reason: String) -> PatternError {
    PatternError::InvalidLine { line, reason }
}
