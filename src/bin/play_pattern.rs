// Play a pattern file once on the General MIDI drum channel
// Run with: cargo run --bin play_pattern -- <pattern-file> [config.(ron|json)]
//           cargo run --bin play_pattern -- --list-ports

use pattern_sequencer::midi::drum::DRUM_CHANNEL;
use pattern_sequencer::midi::list_output_ports;
use pattern_sequencer::{
    MidirOutputSink, PatternFile, Sequencer, SequencerConfig, SequencerState, Tempo, TimeSignature,
};
use ringbuf::traits::Consumer;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("--list-ports") {
        let config = SequencerConfig::default();
        for port in list_output_ports(&config.midi.client_name)? {
            let marker = if port.is_default { " (default)" } else { "" };
            println!("{}: {}{}", port.index, port.name, marker);
        }
        return Ok(());
    }

    let Some(pattern_path) = args.first() else {
        eprintln!("Usage: play_pattern <pattern-file> [config.(ron|json)]");
        eprintln!("       play_pattern --list-ports");
        std::process::exit(2);
    };

    let config = match args.get(1) {
        Some(path) => SequencerConfig::load(path)?,
        None => SequencerConfig::default(),
    };

    let pattern = PatternFile::load(pattern_path)?;
    let timeline = pattern.to_timeline(TimeSignature::four_four(), DRUM_CHANNEL);
    let tempo = Tempo::new(config.tempo_bpm);

    log::info!(
        "{}: {} event(s), {} bar(s), ~{} ms at {}",
        pattern_path,
        timeline.event_count(),
        timeline.bars(),
        timeline.duration_ms(tempo),
        tempo
    );

    let sink = MidirOutputSink::connect(&config.midi)?;
    log::info!("Playing on '{}'", sink.port_name());

    let mut sequencer = Sequencer::new(sink, config);
    let mut notifications = sequencer.subscribe_notifications();

    sequencer.set(timeline);
    sequencer.start()?;

    while sequencer.state() != SequencerState::NotRunning {
        std::thread::sleep(POLL_INTERVAL);
        while let Some(notification) = notifications.try_pop() {
            log::info!("{}", notification);
        }
    }

    // Reap the finished player thread
    sequencer.stop()?;
    while let Some(notification) = notifications.try_pop() {
        log::info!("{}", notification);
    }

    Ok(())
}
