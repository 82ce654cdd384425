//! Lexical parent-child bonding heuristic.
//!
//! Scores are tracked in whole tenths so tier boundaries compare exactly.

use serde::{Deserialize, Serialize};

pub const POSITIVE_WORDS: [&str; 6] = ["love", "happy", "play", "hug", "smile", "together"];
pub const NEGATIVE_WORDS: [&str; 5] = ["angry", "sad", "fight", "cry", "ignore"];

const BASELINE_TENTHS: i32 = 5;
const MAX_TENTHS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondingTier {
    Excellent,
    Good,
    Moderate,
    NeedsMoreConnection,
}

impl BondingTier {
    pub fn for_score(score: f64) -> Self {
        if score >= 0.8 {
            BondingTier::Excellent
        } else if score >= 0.6 {
            BondingTier::Good
        } else if score >= 0.4 {
            BondingTier::Moderate
        } else {
            BondingTier::NeedsMoreConnection
        }
    }

    pub fn intervention(&self) -> &'static str {
        match self {
            BondingTier::Excellent => {
                "Excellent bonding! Keep celebrating small moments together."
            }
            BondingTier::Good => "Good bonding. Try adding more playtime or hugs.",
            BondingTier::Moderate => {
                "Moderate bonding. Spend a few minutes listening calmly today."
            }
            BondingTier::NeedsMoreConnection => {
                "Needs more connection. Plan a simple joyful activity together."
            }
        }
    }
}

/// Bonding score in `[0, 1]` with its tier and canonical intervention message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondingAssessment {
    pub score: f64,
    pub tier: BondingTier,
    pub intervention: String,
}

impl BondingAssessment {
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        let tier = BondingTier::for_score(score);
        Self {
            score,
            tier,
            intervention: tier.intervention().to_string(),
        }
    }
}

/// Each listed word that appears anywhere in the text (case-insensitive substring)
/// moves the score by 0.1 once, however often it repeats.
pub fn bonding_score(text: &str) -> BondingAssessment {
    let lowered = text.to_lowercase();

    let positive = POSITIVE_WORDS
        .iter()
        .filter(|word| lowered.contains(*word))
        .count() as i32;
    let negative = NEGATIVE_WORDS
        .iter()
        .filter(|word| lowered.contains(*word))
        .count() as i32;

    let tenths = (BASELINE_TENTHS + positive - negative).clamp(0, MAX_TENTHS);
    BondingAssessment::from_score(f64::from(tenths) / 10.0)
}
