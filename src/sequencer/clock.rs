// Clock - Musical timebase
// Converts tempo and tick resolution into wall-clock durations

use std::fmt;
use std::time::Duration;

/// Milliseconds in one minute, the numerator of every tick computation
const MS_PER_MINUTE: u64 = 60_000;

/// Time signature (beats per bar / beat division)
/// Example: 4/4 time = TimeSignature::new(4, 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "TimeSignatureFields")]
pub struct TimeSignature {
    beats_per_bar: u32, // Beats in one bar
    beat_division: u32, // Note value of one beat (4 = quarter note)
}

#[derive(serde::Deserialize)]
struct TimeSignatureFields {
    beats_per_bar: u32,
    beat_division: u32,
}

impl TryFrom<TimeSignatureFields> for TimeSignature {
    type Error = String;

    fn try_from(fields: TimeSignatureFields) -> Result<Self, Self::Error> {
        if fields.beats_per_bar == 0 || fields.beat_division == 0 {
            return Err(format!(
                "invalid time signature {}/{}",
                fields.beats_per_bar, fields.beat_division
            ));
        }
        Ok(Self::new(fields.beats_per_bar, fields.beat_division))
    }
}

impl TimeSignature {
    /// Creates a new time signature
    pub fn new(beats_per_bar: u32, beat_division: u32) -> Self {
        assert!(beats_per_bar > 0, "Time signature beats per bar must be > 0");
        assert!(beat_division > 0, "Time signature beat division must be > 0");
        Self {
            beats_per_bar,
            beat_division,
        }
    }

    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Common 3/4 time signature (waltz)
    pub fn three_four() -> Self {
        Self::new(3, 4)
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn beat_division(&self) -> u32 {
        self.beat_division
    }

    /// Number of ticks in one bar at the given resolution
    pub fn ticks_in_bar(&self, ticks_per_beat: u32) -> u64 {
        self.beats_per_bar as u64 * ticks_per_beat as u64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_bar, self.beat_division)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "TempoFields")]
pub struct Tempo {
    bpm: u32,
}

#[derive(serde::Deserialize)]
struct TempoFields {
    bpm: u32,
}

impl TryFrom<TempoFields> for Tempo {
    type Error = String;

    fn try_from(fields: TempoFields) -> Result<Self, Self::Error> {
        if fields.bpm == 0 {
            return Err("Tempo must be > 0 BPM".to_string());
        }
        Ok(Self::new(fields.bpm))
    }
}

impl Tempo {
    /// Creates a new tempo
    pub fn new(bpm: u32) -> Self {
        assert!(bpm > 0, "Tempo must be > 0 BPM");
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Duration of one tick, truncated to whole milliseconds
    pub fn tick_duration(&self, ticks_per_beat: u32) -> Duration {
        Duration::from_millis(tick_duration_ms(self.bpm, ticks_per_beat))
    }

    /// Offset of `tick` from the start of the sequence
    pub fn tick_time(&self, tick: u64, ticks_per_beat: u32) -> Duration {
        Duration::from_millis(tick_time_ms(tick, self.bpm, ticks_per_beat))
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM", self.bpm)
    }
}

/// Duration of one tick in milliseconds.
///
/// Integer division truncates toward zero: at 7 BPM and 1 tick per beat the
/// result is 8571, not 8572. Callers must tolerate that rounding.
pub fn tick_duration_ms(tempo_bpm: u32, ticks_per_beat: u32) -> u64 {
    assert!(tempo_bpm > 0, "Tempo must be > 0 BPM");
    assert!(ticks_per_beat > 0, "Ticks per beat must be > 0");
    MS_PER_MINUTE / tempo_bpm as u64 / ticks_per_beat as u64
}

/// Absolute offset of `tick` from sequence start, in milliseconds.
///
/// Unlike summing [`tick_duration_ms`], the truncation error does not
/// accumulate, so this is the basis for drift-free scheduling.
pub fn tick_time_ms(tick: u64, tempo_bpm: u32, ticks_per_beat: u32) -> u64 {
    assert!(tempo_bpm > 0, "Tempo must be > 0 BPM");
    assert!(ticks_per_beat > 0, "Ticks per beat must be > 0");
    tick * MS_PER_MINUTE / tempo_bpm as u64 / ticks_per_beat as u64
}

/// Index (0-based) of the bar containing `tick`
pub fn compute_bar_index(tick: u64, ticks_per_beat: u32, beats_in_bar: u32) -> u64 {
    (tick / ticks_per_beat as u64) / beats_in_bar as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_duration() {
        assert_eq!(tick_duration_ms(60, 1), 1000);
        assert_eq!(tick_duration_ms(120, 1), 500);
        assert_eq!(tick_duration_ms(60, 2), 500);
    }

    #[test]
    fn test_tick_duration_truncates() {
        // 60000 / 7 = 8571.43
        assert_eq!(tick_duration_ms(7, 1), 8571);
        // 60000 / 120 / 96 = 5.2
        assert_eq!(tick_duration_ms(120, 96), 5);
    }

    #[test]
    fn test_tick_time_does_not_accumulate_truncation() {
        // 96 ticks per beat at 120 BPM: one beat is exactly 500 ms
        assert_eq!(tick_time_ms(96, 120, 96), 500);
        // Summing truncated tick durations would give 480 ms
        assert_eq!(tick_duration_ms(120, 96) * 96, 480);
        assert_eq!(tick_time_ms(0, 120, 96), 0);
    }

    #[test]
    fn test_compute_bar_index() {
        let ticks_per_beat = 16;
        let beats_in_bar = 4;

        for tick in 0..=63 {
            assert_eq!(compute_bar_index(tick, ticks_per_beat, beats_in_bar), 0, "tick #{}", tick);
        }
        for tick in 64..=127 {
            assert_eq!(compute_bar_index(tick, ticks_per_beat, beats_in_bar), 1, "tick #{}", tick);
        }
    }

    #[test]
    fn test_time_signature() {
        let ts = TimeSignature::four_four();
        assert_eq!(ts.beats_per_bar(), 4);
        assert_eq!(ts.beat_division(), 4);
        assert_eq!(ts.ticks_in_bar(16), 64);
        assert_eq!(ts.to_string(), "4/4");
        assert_eq!(TimeSignature::three_four().ticks_in_bar(2), 6);
    }

    #[test]
    fn test_tempo() {
        let tempo = Tempo::new(120);
        assert_eq!(tempo.bpm(), 120);
        assert_eq!(tempo.tick_duration(2), Duration::from_millis(250));
        assert_eq!(tempo.tick_time(8, 2), Duration::from_millis(2000));
        assert_eq!(tempo.to_string(), "120 BPM");
        assert_eq!(Tempo::default().bpm(), 120);
    }

    #[test]
    #[should_panic(expected = "Tempo must be > 0 BPM")]
    fn test_zero_tempo() {
        tick_duration_ms(0, 4);
    }

    #[test]
    fn test_deserialize_rejects_zero_fields() {
        let ts: TimeSignature =
            serde_json::from_str(r#"{"beats_per_bar":3,"beat_division":4}"#).unwrap();
        assert_eq!(ts, TimeSignature::three_four());

        assert!(
            serde_json::from_str::<TimeSignature>(r#"{"beats_per_bar":0,"beat_division":4}"#)
                .is_err()
        );
        assert!(
            serde_json::from_str::<TimeSignature>(r#"{"beats_per_bar":4,"beat_division":0}"#)
                .is_err()
        );
        assert!(serde_json::from_str::<Tempo>(r#"{"bpm":0}"#).is_err());
        assert_eq!(
            serde_json::from_str::<Tempo>(r#"{"bpm":90}"#).unwrap(),
            Tempo::new(90)
        );
    }

    #[test]
    #[should_panic(expected = "beats per bar must be > 0")]
    fn test_invalid_time_signature() {
        TimeSignature::new(0, 4);
    }
}
