use serde::{Deserialize, Serialize};

/// Below this combined score the report suggests closer observation.
pub const OBSERVATION_THRESHOLD: u8 = 5;
/// At or above this combined score the report flags exceptional growth.
pub const EXCEPTIONAL_THRESHOLD: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreeningStatus {
    #[serde(rename = "Observation Suggested")]
    ObservationSuggested,
    #[serde(rename = "Healthy Progress")]
    HealthyProgress,
    #[serde(rename = "Exceptional Growth")]
    ExceptionalGrowth,
}

impl ScreeningStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ScreeningStatus::ObservationSuggested => "Observation Suggested",
            ScreeningStatus::HealthyProgress => "Healthy Progress",
            ScreeningStatus::ExceptionalGrowth => "Exceptional Growth",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            ScreeningStatus::ObservationSuggested => {
                "Focus more on communication and sound recognition games."
            }
            ScreeningStatus::HealthyProgress => {
                "Keep engaging in sensory activities and daily play."
            }
            ScreeningStatus::ExceptionalGrowth => {
                "Child is performing above average. Introduce complex puzzles."
            }
        }
    }
}

/// Status plus the canned recommendation shown to the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: ScreeningStatus,
    pub recommendation: &'static str,
}

/// Classify the 0-15 combined emotion + sound + quiz score.
pub fn classify(total_score: u8) -> Classification {
    let status = if total_score < OBSERVATION_THRESHOLD {
        ScreeningStatus::ObservationSuggested
    } else if total_score >= EXCEPTIONAL_THRESHOLD {
        ScreeningStatus::ExceptionalGrowth
    } else {
        ScreeningStatus::HealthyProgress
    };

    Classification {
        status,
        recommendation: status.recommendation(),
    }
}
