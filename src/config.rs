// Sequencer configuration - Loaded from RON or JSON files

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the player computes each inter-tick sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchedulingMode {
    /// Sleep one tick duration minus the time spent since the previous tick
    #[default]
    SelfCorrecting,
    /// Sleep until `origin + tick_time(steps)`, no drift accumulation
    Absolute,
}

/// MIDI output port selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiOutputConfig {
    pub client_name: String,
    /// `None` picks the first available port
    pub port_name: Option<String>,
}

impl Default for MidiOutputConfig {
    fn default() -> Self {
        Self {
            client_name: "Pattern Sequencer".to_string(),
            port_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub tempo_bpm: u32,
    pub scheduling: SchedulingMode,
    /// Upper bound for the start/stop handshakes with the player thread
    pub rendezvous_timeout_ms: u64,
    /// Send CC 123 on the timeline channel when the player exits
    pub all_notes_off_on_stop: bool,
    pub notification_capacity: usize,
    pub midi: MidiOutputConfig,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: 120,
            scheduling: SchedulingMode::default(),
            rendezvous_timeout_ms: 2000,
            all_notes_off_on_stop: false,
            notification_capacity: 256,
            midi: MidiOutputConfig::default(),
        }
    }
}

impl SequencerConfig {
    /// Load a config file, JSON if the extension is `.json`, RON otherwise
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_ron_str(&contents)?
        };

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tempo_bpm == 0 {
            return Err(ConfigError::Invalid("tempo_bpm must be > 0".to_string()));
        }
        if self.rendezvous_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "rendezvous_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notification_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SequencerConfig::default();
        assert_eq!(config.tempo_bpm, 120);
        assert_eq!(config.scheduling, SchedulingMode::SelfCorrecting);
        assert!(!config.all_notes_off_on_stop);
        assert!(config.midi.port_name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = SequencerConfig::from_ron_str("(tempo_bpm: 90, scheduling: Absolute)").unwrap();
        assert_eq!(config.tempo_bpm, 90);
        assert_eq!(config.scheduling, SchedulingMode::Absolute);
        assert_eq!(config.rendezvous_timeout_ms, 2000);
    }

    #[test]
    fn test_zero_tempo_rejected() {
        let result = SequencerConfig::from_ron_str("(tempo_bpm: 0)");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_json_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"tempo_bpm": 140, "midi": {{"port_name": "IAC Bus 1"}}}}"#
        )
        .unwrap();

        let config = SequencerConfig::load(file.path()).unwrap();
        assert_eq!(config.tempo_bpm, 140);
        assert_eq!(config.midi.port_name.as_deref(), Some("IAC Bus 1"));
        assert_eq!(config.midi.client_name, "Pattern Sequencer");
    }

    #[test]
    fn test_save_and_load_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sequencer.ron");

        let config = SequencerConfig {
            tempo_bpm: 100,
            all_notes_off_on_stop: true,
            ..SequencerConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(SequencerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let result = SequencerConfig::load("/nonexistent/sequencer.ron");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
