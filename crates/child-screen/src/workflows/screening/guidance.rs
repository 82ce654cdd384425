use serde::{Deserialize, Serialize};

/// Daily tips plus a single headline tip for the micro-intervention card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipSheet {
    #[serde(default)]
    pub tips: Vec<String>,
    pub tip: String,
}

impl TipSheet {
    pub fn standard() -> Self {
        Self {
            tips: vec![
                "Spend 15 minutes of screen-free play time together.".to_string(),
                "Practice naming everyday objects to boost vocabulary.".to_string(),
                "Establish a calming 10-minute bedtime routine.".to_string(),
            ],
            tip: "Focus on interactive play to improve social response.".to_string(),
        }
    }
}

/// Age-banded activity suggestions.
pub fn age_recommendations(age_months: u32) -> Vec<&'static str> {
    let suggestion = match age_months {
        0..=35 => "Introduce sensory play and basic motor skills.",
        36..=71 => "Start basic reading and storytelling.",
        72..=143 => "Encourage group activities and emotional awareness.",
        144..=215 => "Introduce coding games and logical puzzles.",
        _ => "Explore career aptitude tests and mental wellness check-ins.",
    };
    vec![suggestion]
}

/// Sub-scores for the milestone estimate, each on the caller's own scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MilestoneInput {
    pub age_months: u32,
    pub cognitive_score: u32,
    pub emotional_score: u32,
    pub physical_score: u32,
}

pub fn predict_milestone(input: &MilestoneInput) -> &'static str {
    let total = input.cognitive_score + input.emotional_score + input.physical_score;

    match input.age_months {
        0..=35 if total < 150 => "Focus on sensory play and basic motor skills",
        0..=35 => "Ready for early storytelling and shape recognition",
        36..=71 if total < 210 => "Practice short sentences and 2-step instructions",
        36..=71 => "Ready for group play and basic counting",
        72..=143 if total < 270 => "Encourage emotional awareness and cooperative play",
        72..=143 => "Ready for logic puzzles and storytelling",
        _ if total < 300 => "Support creative expression and emotional regulation",
        _ => "Ready for career exploration and mental wellness check-ins",
    }
}
