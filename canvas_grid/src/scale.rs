//! Mood → scale table.
//!
//! Every mood carries a fixed seven-degree scale of base MIDI note numbers.
//! Moods are a closed set; the only place an arbitrary string turns into a
//! scale is [`scale_for`], which falls back to [`DEFAULT_SCALE`] instead of
//! failing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of degrees in every scale.
pub const DEGREES: usize = 7;

/// Scale used when a mood name is not recognised.
pub const DEFAULT_SCALE: Scale = Scale([42, 44, 46, 47, 49, 51, 53]);

// ════════════════════════════════════════════════════════════════════════════
// ScaleError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScaleError {
    #[error("a scale needs exactly {DEGREES} degrees, got {0}")]
    WrongLength(usize),

    #[error("unknown mood \"{0}\"")]
    UnknownMood(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Scale: seven base pitches, one octave's worth of degrees
// ════════════════════════════════════════════════════════════════════════════

/// Seven base pitches (MIDI note numbers). Index 0..6 is the scale degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Scale([u8; DEGREES]);

impl Scale {
    pub const fn new(degrees: [u8; DEGREES]) -> Self {
        Scale(degrees)
    }

    /// Base pitch of `degree` (0–6).
    ///
    /// # Panics
    /// If `degree >= 7`.
    pub fn degree(&self, degree: usize) -> u8 {
        self.0[degree]
    }

    pub fn degrees(&self) -> &[u8; DEGREES] {
        &self.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        DEFAULT_SCALE
    }
}

impl TryFrom<&[u8]> for Scale {
    type Error = ScaleError;

    fn try_from(values: &[u8]) -> Result<Self, Self::Error> {
        let degrees: [u8; DEGREES] = values
            .try_into()
            .map_err(|_| ScaleError::WrongLength(values.len()))?;
        Ok(Scale(degrees))
    }
}

impl TryFrom<Vec<u8>> for Scale {
    type Error = ScaleError;

    fn try_from(values: Vec<u8>) -> Result<Self, Self::Error> {
        Scale::try_from(values.as_slice())
    }
}

impl From<Scale> for Vec<u8> {
    fn from(scale: Scale) -> Self {
        scale.0.to_vec()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Mood: the closed set of presets
// ════════════════════════════════════════════════════════════════════════════

/// A named preset selecting one of the built-in scales.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(clap::ValueEnum)]
pub enum Mood {
    #[default]
    Happy,
    Sad,
    Peaceful,
    Excited,
    Energetic,
    Mysterious,
    Epic,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Peaceful,
        Mood::Excited,
        Mood::Energetic,
        Mood::Mysterious,
        Mood::Epic,
    ];

    /// The mood's fixed scale.
    pub fn scale(self) -> Scale {
        match self {
            Mood::Happy      => Scale([42, 44, 46, 47, 49, 51, 53]),
            Mood::Sad        => Scale([42, 44, 45, 47, 49, 50, 52]),
            Mood::Peaceful   => Scale([42, 44, 46, 48, 49, 51, 53]),
            Mood::Excited    => Scale([42, 46, 49, 54, 58, 61, 66]),
            Mood::Energetic  => Scale([42, 44, 46, 49, 51, 53, 55]),
            Mood::Mysterious => Scale([42, 46, 50, 54, 58, 62, 66]),
            Mood::Epic       => Scale([42, 44, 46, 48, 50, 51, 53]),
        }
    }

    /// Display name, also the persisted form.
    pub fn name(self) -> &'static str {
        match self {
            Mood::Happy      => "Happy",
            Mood::Sad        => "Sad",
            Mood::Peaceful   => "Peaceful",
            Mood::Excited    => "Excited",
            Mood::Energetic  => "Energetic",
            Mood::Mysterious => "Mysterious",
            Mood::Epic       => "Epic",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Mood> {
        let name = name.trim();
        Mood::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mood {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::from_name(s).ok_or_else(|| ScaleError::UnknownMood(s.to_string()))
    }
}

/// Scale for a mood name, or [`DEFAULT_SCALE`] when the name is unknown.
pub fn scale_for(mood: &str) -> Scale {
    Mood::from_name(mood).map(Mood::scale).unwrap_or(DEFAULT_SCALE)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_moods_resolve() {
        assert_eq!(scale_for("Sad").degrees(), &[42, 44, 45, 47, 49, 50, 52]);
        assert_eq!(scale_for("Mysterious").degrees(), &[42, 46, 50, 54, 58, 62, 66]);
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(scale_for(" epic "), Mood::Epic.scale());
        assert_eq!(Mood::from_name("EXCITED"), Some(Mood::Excited));
    }

    #[test]
    fn unknown_mood_falls_back_to_default() {
        assert_eq!(scale_for("Grumpy"), DEFAULT_SCALE);
        assert_eq!(scale_for(""), DEFAULT_SCALE);
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert_eq!(
            "Grumpy".parse::<Mood>(),
            Err(ScaleError::UnknownMood("Grumpy".into()))
        );
        assert_eq!("peaceful".parse::<Mood>(), Ok(Mood::Peaceful));
    }

    #[test]
    fn names_round_trip() {
        for mood in Mood::ALL {
            assert_eq!(Mood::from_name(mood.name()), Some(mood));
        }
    }

    #[test]
    fn every_scale_starts_on_the_same_root() {
        for mood in Mood::ALL {
            assert_eq!(mood.scale().degree(0), 42, "{mood}");
        }
    }

    #[test]
    fn scale_rejects_wrong_length() {
        assert_eq!(Scale::try_from(&[1u8, 2, 3][..]), Err(ScaleError::WrongLength(3)));
        assert!(Scale::try_from(vec![0u8; 7]).is_ok());
    }

    #[test]
    fn scale_serialises_as_plain_list() {
        let json = serde_json::to_string(&Mood::Happy.scale()).unwrap();
        assert_eq!(json, "[42,44,46,47,49,51,53]");
        assert!(serde_json::from_str::<Scale>("[1,2,3]").is_err());
    }
}
