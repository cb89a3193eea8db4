// Dynamics - Named velocity levels (ppp to fff)

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dynamic {
    PianoPianissimo,
    Pianissimo,
    Piano,
    MezzoPiano,
    MezzoForte,
    Forte,
    Fortissimo,
    ForteFortissimo,
}

impl Dynamic {
    pub const ALL: [Dynamic; 8] = [
        Dynamic::PianoPianissimo,
        Dynamic::Pianissimo,
        Dynamic::Piano,
        Dynamic::MezzoPiano,
        Dynamic::MezzoForte,
        Dynamic::Forte,
        Dynamic::Fortissimo,
        Dynamic::ForteFortissimo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Dynamic::PianoPianissimo => "ppp",
            Dynamic::Pianissimo => "pp",
            Dynamic::Piano => "p",
            Dynamic::MezzoPiano => "mp",
            Dynamic::MezzoForte => "mf",
            Dynamic::Forte => "f",
            Dynamic::Fortissimo => "ff",
            Dynamic::ForteFortissimo => "fff",
        }
    }

    pub fn velocity(&self) -> u8 {
        match self {
            Dynamic::PianoPianissimo => 15,
            Dynamic::Pianissimo => 31,
            Dynamic::Piano => 47,
            Dynamic::MezzoPiano => 63,
            Dynamic::MezzoForte => 79,
            Dynamic::Forte => 95,
            Dynamic::Fortissimo => 111,
            Dynamic::ForteFortissimo => 127,
        }
    }

    /// Case-insensitive lookup
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|dynamic| dynamic.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Velocity from a raw integer (0-127) or a dynamic label
pub fn parse_velocity(word: &str) -> Option<u8> {
    let word = word.trim();
    if !word.is_empty() && word.bytes().all(|b| b.is_ascii_digit()) {
        word.parse::<u8>().ok().filter(|v| *v <= 127)
    } else {
        Dynamic::from_label(word).map(|dynamic| dynamic.velocity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocities_are_evenly_spaced() {
        let velocities: Vec<u8> = Dynamic::ALL.iter().map(Dynamic::velocity).collect();
        assert_eq!(velocities, vec![15, 31, 47, 63, 79, 95, 111, 127]);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Dynamic::from_label("mf"), Some(Dynamic::MezzoForte));
        assert_eq!(Dynamic::from_label("FFF"), Some(Dynamic::ForteFortissimo));
        assert_eq!(Dynamic::from_label("loud"), None);
    }

    #[test]
    fn test_parse_velocity() {
        assert_eq!(parse_velocity("100"), Some(100));
        assert_eq!(parse_velocity("0"), Some(0));
        assert_eq!(parse_velocity("pp"), Some(31));
        assert_eq!(parse_velocity("128"), None);
        assert_eq!(parse_velocity("-5"), None);
        assert_eq!(parse_velocity(""), None);
    }
}
