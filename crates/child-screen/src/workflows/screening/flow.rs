use std::collections::BTreeSet;

use super::domain::{Difficulty, ModuleId, ScoreCard};

/// Fixed presentation order shared by every session.
pub const MODULE_SEQUENCE: [ModuleId; 6] = [
    ModuleId::Emotion,
    ModuleId::Story,
    ModuleId::Sound,
    ModuleId::Sensor,
    ModuleId::Voice,
    ModuleId::Quiz,
];

/// First module of the fixed sequence not yet completed, or `None` once every module is done.
///
/// Ordering is purely positional: scores never reorder or skip modules.
pub fn next_module(_scores: &ScoreCard, completed: &BTreeSet<ModuleId>) -> Option<ModuleId> {
    MODULE_SEQUENCE
        .iter()
        .copied()
        .find(|module| !completed.contains(module))
}

/// Modules still outstanding, in sequence order.
pub fn remaining_modules(completed: &BTreeSet<ModuleId>) -> Vec<ModuleId> {
    MODULE_SEQUENCE
        .iter()
        .copied()
        .filter(|module| !completed.contains(module))
        .collect()
}

/// Score 0-2 is easy, 3 normal, 4-5 hard; no score yet means normal.
pub fn difficulty_for(module: ModuleId, scores: &ScoreCard) -> Difficulty {
    match scores.get(module).map(|score| score.value()) {
        None => Difficulty::Normal,
        Some(value) if value <= 2 => Difficulty::Easy,
        Some(value) if value >= 4 => Difficulty::Hard,
        Some(_) => Difficulty::Normal,
    }
}
