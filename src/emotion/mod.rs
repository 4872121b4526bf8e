//! Emotion result mapping
//!
//! The inference service returns `(label, score)` pairs in arbitrary order.
//! They are folded into a fixed mapping over eight canonical labels with
//! integer percentages.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// The closed set of emotion labels, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Emotion {
    Angry,
    Calm,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    /// Canonical order, also used for tie-breaking
    pub const ALL: [Emotion; 8] = [
        Emotion::Angry,
        Emotion::Calm,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Calm => "calm",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEmotion(pub String);

impl fmt::Display for UnknownEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown emotion label: {}", self.0)
    }
}

impl std::error::Error for UnknownEmotion {}

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == lower)
            .ok_or(UnknownEmotion(s.to_string()))
    }
}

/// One `(label, score)` entry as returned by the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Score in [0, 1] to an integer percentage, rounding halves up
pub fn to_percent(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    (score * 100.0 + 0.5).floor().clamp(0.0, 100.0) as u8
}

/// Percentages for each canonical emotion; immutable once built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmotionResult {
    percents: [u8; 8],
}

impl EmotionResult {
    /// Build from explicit percentages, mostly useful for tests and rendering
    pub fn from_percents(pairs: impl IntoIterator<Item = (Emotion, u8)>) -> Self {
        let mut percents = [0u8; 8];
        for (emotion, pct) in pairs {
            percents[emotion.index()] = pct.min(100);
        }
        Self { percents }
    }

    /// Map raw API scores; unrecognized labels are dropped, missing ones stay 0
    pub fn from_scores<'a>(scores: impl IntoIterator<Item = &'a LabelScore>) -> Self {
        let mut percents = [0u8; 8];
        for entry in scores {
            if let Ok(emotion) = entry.label.parse::<Emotion>() {
                percents[emotion.index()] = to_percent(entry.score);
            }
        }
        Self { percents }
    }

    pub fn get(&self, emotion: Emotion) -> u8 {
        self.percents[emotion.index()]
    }

    /// Pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, u8)> + '_ {
        Emotion::ALL.iter().map(move |&e| (e, self.get(e)))
    }

    /// Highest percentage; ties go to the earliest canonical label
    pub fn dominant(&self) -> (Emotion, u8) {
        self.iter()
            .fold((Emotion::Angry, self.get(Emotion::Angry)), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            })
    }

    /// All emotions, highest first, canonical order among equals
    pub fn ranked(&self) -> Vec<(Emotion, u8)> {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1));
        pairs
    }
}

impl Serialize for EmotionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Emotion::ALL.len()))?;
        for (emotion, pct) in self.iter() {
            map.serialize_entry(emotion.as_str(), &pct)?;
        }
        map.end()
    }
}
