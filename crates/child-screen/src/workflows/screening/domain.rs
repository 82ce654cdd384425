use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::age;

/// One screening mini-activity. Declaration order is the fixed presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleId {
    Emotion,
    Story,
    Sound,
    Sensor,
    Voice,
    Quiz,
}

impl ModuleId {
    pub fn key(&self) -> &'static str {
        match self {
            ModuleId::Emotion => "emotion",
            ModuleId::Story => "story",
            ModuleId::Sound => "sound",
            ModuleId::Sensor => "sensor",
            ModuleId::Voice => "voice",
            ModuleId::Quiz => "quiz",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModuleId::Emotion => "Emotion Matching",
            ModuleId::Story => "Story Time",
            ModuleId::Sound => "Sound Recognition",
            ModuleId::Sensor => "Sensor Play",
            ModuleId::Voice => "Voice Response",
            ModuleId::Quiz => "Age Quiz",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Score reported by a single module, bounded to `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ModuleScore(u8);

impl ModuleScore {
    pub const MAX: u8 = 5;
    pub const ZERO: ModuleScore = ModuleScore(0);

    /// Out-of-range values are rejected, never clamped.
    pub fn new(value: i64) -> Result<Self, ScoreError> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScoreError::OutOfRange { value })
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ModuleScore {
    type Error = ScoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModuleScore> for u8 {
    fn from(score: ModuleScore) -> Self {
        score.0
    }
}

impl fmt::Display for ModuleScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("module score {value} is outside the supported range 0..=5")]
    OutOfRange { value: i64 },
}

/// Content tier a module should present, derived from the module's current score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }
}

/// Accumulating module -> score mapping for one screening attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreCard {
    scores: BTreeMap<ModuleId, ModuleScore>,
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest report wins; a report without a score clears any earlier value.
    pub fn record(&mut self, module: ModuleId, score: Option<ModuleScore>) {
        match score {
            Some(score) => {
                self.scores.insert(module, score);
            }
            None => {
                self.scores.remove(&module);
            }
        }
    }

    pub fn get(&self, module: ModuleId) -> Option<ModuleScore> {
        self.scores.get(&module).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, ModuleScore)> + '_ {
        self.scores.iter().map(|(module, score)| (*module, *score))
    }

    pub fn clear(&mut self) {
        self.scores.clear();
    }
}

impl FromIterator<(ModuleId, ModuleScore)> for ScoreCard {
    fn from_iter<T: IntoIterator<Item = (ModuleId, ModuleScore)>>(iter: T) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

/// The three persisted sub-scores after missing modules are normalized to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionScores {
    pub emotion_score: ModuleScore,
    pub sound_score: ModuleScore,
    pub quiz_score: ModuleScore,
}

impl SubmissionScores {
    pub fn total(&self) -> u8 {
        self.emotion_score.value() + self.sound_score.value() + self.quiz_score.value()
    }
}

impl Default for SubmissionScores {
    fn default() -> Self {
        Self {
            emotion_score: ModuleScore::ZERO,
            sound_score: ModuleScore::ZERO,
            quiz_score: ModuleScore::ZERO,
        }
    }
}

/// Emotion, sound, and quiz modules feed the persisted record; absent ones count as zero.
pub fn default_missing_scores_to_zero(scores: &ScoreCard) -> SubmissionScores {
    SubmissionScores {
        emotion_score: scores.get(ModuleId::Emotion).unwrap_or(ModuleScore::ZERO),
        sound_score: scores.get(ModuleId::Sound).unwrap_or(ModuleScore::ZERO),
        quiz_score: scores.get(ModuleId::Quiz).unwrap_or(ModuleScore::ZERO),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(pub String);

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreeningId(pub String);

/// Stored child profile. The date of birth is the source of truth for age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
}

impl Child {
    pub fn age_months_on(&self, today: NaiveDate) -> u32 {
        age::age_in_months(self.date_of_birth, today)
    }

    pub fn age_readable_on(&self, today: NaiveDate) -> String {
        age::age_readable(self.date_of_birth, today)
    }

    pub fn view_on(&self, today: NaiveDate) -> ChildView {
        ChildView {
            id: self.id.clone(),
            name: self.name.clone(),
            date_of_birth: self.date_of_birth,
            gender: self.gender.clone(),
            age_months: self.age_months_on(today),
            age_readable: self.age_readable_on(today),
        }
    }
}

/// Create/update payload for a child profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDraft {
    #[serde(default)]
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: String,
}

impl ChildDraft {
    pub fn validate(&self, today: NaiveDate) -> Result<NaiveDate, ChildError> {
        if self.name.trim().is_empty() {
            return Err(ChildError::MissingField("name"));
        }
        if self.gender.trim().is_empty() {
            return Err(ChildError::MissingField("gender"));
        }
        let date_of_birth = self
            .date_of_birth
            .ok_or(ChildError::MissingField("date_of_birth"))?;
        if date_of_birth > today {
            return Err(ChildError::FutureDateOfBirth(date_of_birth));
        }
        Ok(date_of_birth)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChildError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("date of birth {0} cannot be in the future")]
    FutureDateOfBirth(NaiveDate),
    #[error("date of birth cannot change once the child is registered")]
    DateOfBirthChanged,
}

/// Read model with age fields recomputed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildView {
    pub id: ChildId,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub age_months: u32,
    pub age_readable: String,
}

/// Optional qualitative notes captured alongside a screening.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreeningFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concerns: Option<String>,
}

/// Payload accepted by the screening store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningSubmission {
    pub child_id: ChildId,
    #[serde(default)]
    pub age_months: u32,
    #[serde(default)]
    pub emotion_score: Option<ModuleScore>,
    #[serde(default)]
    pub sound_score: Option<ModuleScore>,
    #[serde(default)]
    pub quiz_score: Option<ModuleScore>,
    #[serde(default)]
    pub feedback: ScreeningFeedback,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<CapturedImage>,
}

/// Immutable, append-only screening history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub screening_id: ScreeningId,
    pub child_id: ChildId,
    pub age_months: u32,
    pub emotion_score: Option<ModuleScore>,
    pub sound_score: Option<ModuleScore>,
    pub quiz_score: Option<ModuleScore>,
    pub feedback: ScreeningFeedback,
    pub created_at: DateTime<Utc>,
}

impl ScreeningRecord {
    pub fn scores(&self) -> SubmissionScores {
        SubmissionScores {
            emotion_score: self.emotion_score.unwrap_or(ModuleScore::ZERO),
            sound_score: self.sound_score.unwrap_or(ModuleScore::ZERO),
            quiz_score: self.quiz_score.unwrap_or(ModuleScore::ZERO),
        }
    }

    pub fn total_score(&self) -> u8 {
        self.scores().total()
    }
}

/// Base64 (optionally data-URL prefixed) camera frame captured by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapturedImage(pub String);

/// One observation appended by the emotion module while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionLogEntry {
    pub emotion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Extra payload a module may attach when it reports completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleMetadata {
    pub image: Option<CapturedImage>,
    pub emotion_log: Option<EmotionLogEntry>,
}

impl ModuleMetadata {
    pub fn with_image(image: CapturedImage) -> Self {
        Self {
            image: Some(image),
            emotion_log: None,
        }
    }

    pub fn with_emotion_log(entry: EmotionLogEntry) -> Self {
        Self {
            image: None,
            emotion_log: Some(entry),
        }
    }
}
