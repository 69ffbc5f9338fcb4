//! Closed emotion label set and normalization of classifier output.
//!
//! Classifiers name their classes differently ("happiness", "happy",
//! "feliz"). Everything is mapped onto [`EmotionLabel`] once, at the
//! collaborator boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "angry",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
        }
    }

    /// Map a raw classifier label (any case, synonyms included) to a label.
    pub fn parse(raw: &str) -> Option<Self> {
        let label = match raw.trim().to_lowercase().as_str() {
            "angry" | "anger" | "raiva" => EmotionLabel::Angry,
            "disgust" | "disgusted" | "desgosto" => EmotionLabel::Disgust,
            "fear" | "fearful" | "medo" => EmotionLabel::Fear,
            "happy" | "happiness" | "feliz" => EmotionLabel::Happy,
            "sad" | "sadness" | "triste" => EmotionLabel::Sad,
            "surprise" | "surprised" | "surpresa" => EmotionLabel::Surprise,
            "neutral" | "neutro" => EmotionLabel::Neutral,
            _ => return None,
        };
        Some(label)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score per emotion label, every label always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Emotions {
    scores: [f32; 7],
}

impl Emotions {
    /// Build from raw `(label, score)` pairs.
    ///
    /// Unknown labels are dropped, missing labels are zero, and a label
    /// reached through several synonyms accumulates their scores.
    pub fn from_raw<'a, I>(raw: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut scores = [0.0f32; 7];
        for (name, score) in raw {
            match EmotionLabel::parse(name) {
                Some(label) if score.is_finite() => scores[label.index()] += score,
                Some(label) => {
                    tracing::debug!(label = %label, score, "non-finite emotion score dropped")
                }
                None => tracing::trace!(label = name, "unknown emotion label dropped"),
            }
        }
        Self { scores }
    }

    pub fn get(&self, label: EmotionLabel) -> f32 {
        self.scores[label.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f32)> + '_ {
        EmotionLabel::ALL.iter().map(|&l| (l, self.get(l)))
    }

    /// Highest-scoring label; ties go to the earliest label in [`EmotionLabel::ALL`].
    pub fn dominant(&self) -> Option<EmotionLabel> {
        let mut best: Option<(EmotionLabel, f32)> = None;
        for (label, score) in self.iter() {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((label, score));
            }
        }
        best.filter(|(_, s)| *s > 0.0).map(|(l, _)| l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_labels_filled_with_zero() {
        let e = Emotions::from_raw([("happy", 80.0), ("sad", 20.0)]);
        assert_eq!(e.get(EmotionLabel::Happy), 80.0);
        assert_eq!(e.get(EmotionLabel::Fear), 0.0);
        assert_eq!(e.iter().count(), 7);
    }

    #[test]
    fn test_synonyms_and_case() {
        let e = Emotions::from_raw([("Happiness", 10.0), ("ANGER", 5.0), ("neutro", 3.0)]);
        assert_eq!(e.get(EmotionLabel::Happy), 10.0);
        assert_eq!(e.get(EmotionLabel::Angry), 5.0);
        assert_eq!(e.get(EmotionLabel::Neutral), 3.0);
    }

    #[test]
    fn test_unknown_labels_dropped() {
        let e = Emotions::from_raw([("contempt", 40.0), ("surprise", 1.0)]);
        let total: f32 = e.iter().map(|(_, s)| s).sum();
        assert_eq!(total, 1.0);
    }

    #[test]
    fn test_dominant() {
        let e = Emotions::from_raw([("sad", 30.0), ("neutral", 60.0), ("fear", 10.0)]);
        assert_eq!(e.dominant(), Some(EmotionLabel::Neutral));
        assert_eq!(Emotions::default().dominant(), None);
    }
}
