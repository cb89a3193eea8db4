// General MIDI percussion key map (GM level 1 sound set)

/// GM channel 10, 0-based
pub const DRUM_CHANNEL: u8 = 9;

// Bass drum
pub const ACOUSTIC_BASS_DRUM: u8 = 35;
pub const BASS_DRUM_1: u8 = 36;

// Toms
pub const LOW_FLOOR_TOM: u8 = 41;
pub const HIGH_FLOOR_TOM: u8 = 43;
pub const LOW_TOM: u8 = 45;
pub const LOW_MID_TOM: u8 = 47;
pub const HIGH_MID_TOM: u8 = 48;
pub const HIGH_TOM: u8 = 50;

// Hi-hat
pub const CLOSED_HI_HAT: u8 = 42;
pub const PEDAL_HI_HAT: u8 = 44;
pub const OPEN_HI_HAT: u8 = 46;

// Snare
pub const SIDE_STICK: u8 = 37;
pub const ACOUSTIC_SNARE: u8 = 38;
pub const HAND_CLAP: u8 = 39;
pub const ELECTRIC_SNARE: u8 = 40;

// Cymbals
pub const CRASH_CYMBAL_1: u8 = 49;
pub const RIDE_CYMBAL_1: u8 = 51;
pub const CHINESE_CYMBAL: u8 = 52;
pub const RIDE_BELL: u8 = 53;
pub const SPLASH_CYMBAL: u8 = 55;
pub const CRASH_CYMBAL_2: u8 = 57;
pub const RIDE_CYMBAL_2: u8 = 59;

// Hand percussion
pub const TAMBOURINE: u8 = 54;
pub const COWBELL: u8 = 56;
pub const HIGH_BONGO: u8 = 60;
pub const LOW_BONGO: u8 = 61;
pub const MUTE_HIGH_CONGA: u8 = 62;
pub const OPEN_HIGH_CONGA: u8 = 63;
pub const LOW_CONGA: u8 = 64;
pub const MARACAS: u8 = 70;
pub const CLAVES: u8 = 75;

/// Row layout of a basic drum grid: label and key, top to bottom
pub fn basic_key_mapping() -> Vec<(&'static str, u8)> {
    vec![
        ("Bass", BASS_DRUM_1),
        ("Open HH", OPEN_HI_HAT),
        ("Pedal HH", PEDAL_HI_HAT),
        ("Snare", ACOUSTIC_SNARE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_key_mapping() {
        let mapping = basic_key_mapping();
        assert_eq!(mapping.len(), 4);
        assert_eq!(mapping[0], ("Bass", 36));
        assert_eq!(mapping[3], ("Snare", 38));
    }
}
