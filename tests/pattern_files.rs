// Integration test: Pattern files on disk
//
// Loads text patterns from temporary files and checks the timelines and
// actions they produce.

use pattern_sequencer::midi::drum::DRUM_CHANNEL;
use pattern_sequencer::{
    Action, ChordResolver, HoldRecorder, PatternError, PatternFile, TimeSignature, Timeline,
};
use std::io::Write;
use std::sync::Arc;

const ROCK_BEAT: &str = "\
# Kick on 1 and 3, snare on 2 and 4, closed hi-hat on every eighth
ticks_per_beat=2

36,42;0;1;f
42;1;1;mp
38,42;2;1;f
42;3;1;mp
36,42;4;1;f
42;5;1;mp
38,42;6;1;f
42;7;1;mp
";

fn write_pattern(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_drum_pattern() {
    let file = write_pattern(ROCK_BEAT);
    let pattern = PatternFile::load(file.path()).unwrap();
    let timeline = pattern.to_timeline(TimeSignature::four_four(), DRUM_CHANNEL);

    assert_eq!(timeline.bars(), 1);
    assert_eq!(timeline.size(), 8);
    assert_eq!(timeline.event_count(), 8);

    // Offs of the previous eighth first, then this eighth's hits
    assert_eq!(
        timeline.actions_at(2),
        vec![
            Action::note_off(DRUM_CHANNEL, 42),
            Action::note_on(DRUM_CHANNEL, 38, 95),
            Action::note_on(DRUM_CHANNEL, 42, 95),
        ]
    );
    // Final tick only releases the last hi-hat
    assert_eq!(
        timeline.actions_at(8),
        vec![Action::note_off(DRUM_CHANNEL, 42)]
    );
}

#[test]
fn test_load_missing_file() {
    let result = PatternFile::load("/nonexistent/pattern.txt");
    assert!(matches!(result, Err(PatternError::Io(_))));
}

#[test]
fn test_error_reports_line_number() {
    let file = write_pattern("ticks_per_beat=2\n# ok\n36;0;1;100\n36;zero;1;100\n");
    match PatternFile::load(file.path()) {
        Err(PatternError::InvalidLine { line, reason }) => {
            assert_eq!(line, 4);
            assert!(reason.contains("tick"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_melodic_pattern_through_chord() {
    // C major triad, intervals 1-3, one octave up
    let resolver = Arc::new(ChordResolver::new(vec![60, 64, 67]).with_octave_offset(1));
    let pattern = PatternFile::parse("ticks_per_beat=1\n1,3;0;2;100\n2,4;2;2;100\n").unwrap();
    let timeline = pattern.to_timeline_with(TimeSignature::four_four(), 0, resolver);

    assert_eq!(
        timeline.actions_at(0),
        vec![Action::note_on(0, 72, 100), Action::note_on(0, 79, 100)]
    );
    // Interval 4 is outside the triad and stays silent
    assert_eq!(
        timeline.actions_at(2),
        vec![
            Action::note_off(0, 72),
            Action::note_off(0, 79),
            Action::note_on(0, 76, 100),
        ]
    );
}

#[test]
fn test_recorded_timeline_saves_and_reloads() {
    let mut timeline = Timeline::new(TimeSignature::three_four(), 4, DRUM_CHANNEL);
    let mut recorder = HoldRecorder::new();

    recorder.press(36, 100, 0);
    recorder.press(46, 80, 2);
    assert!(recorder.release(36, 4, &mut timeline));
    recorder.finalize(13, &mut timeline);

    // Held past the first bar of 12 ticks
    assert_eq!(timeline.bars(), 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recorded.pattern");
    PatternFile::from_timeline(&timeline).save(&path).unwrap();

    let reloaded = PatternFile::load(&path)
        .unwrap()
        .to_timeline(TimeSignature::three_four(), DRUM_CHANNEL);

    assert_eq!(reloaded.ticks_per_beat(), 4);
    assert_eq!(reloaded.bars(), 2);
    for tick in 0..=reloaded.size() {
        assert_eq!(reloaded.actions_at(tick), timeline.actions_at(tick));
    }
}
