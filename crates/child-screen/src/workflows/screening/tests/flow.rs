use super::common::*;
use std::collections::BTreeSet;

use crate::workflows::screening::{
    difficulty_for, next_module, remaining_modules, Difficulty, ModuleId, ScoreCard,
    MODULE_SEQUENCE,
};

fn subset(mask: u8) -> BTreeSet<ModuleId> {
    MODULE_SEQUENCE
        .iter()
        .enumerate()
        .filter(|(index, _)| mask & (1 << index) != 0)
        .map(|(_, module)| *module)
        .collect()
}

#[test]
fn next_module_is_first_incomplete_for_every_subset() {
    let scores = ScoreCard::new();
    for mask in 0u8..64 {
        let completed = subset(mask);
        let expected = MODULE_SEQUENCE
            .iter()
            .copied()
            .find(|module| !completed.contains(module));

        assert_eq!(next_module(&scores, &completed), expected, "mask {mask:06b}");
        assert_eq!(expected.is_none(), mask == 0b11_1111);
    }
}

#[test]
fn scores_never_reorder_the_sequence() {
    let low: ScoreCard = MODULE_SEQUENCE.iter().map(|module| (*module, score(0))).collect();
    let high: ScoreCard = MODULE_SEQUENCE.iter().map(|module| (*module, score(5))).collect();

    for mask in 0u8..64 {
        let completed = subset(mask);
        let baseline = next_module(&ScoreCard::new(), &completed);
        assert_eq!(next_module(&low, &completed), baseline);
        assert_eq!(next_module(&high, &completed), baseline);
    }
}

#[test]
fn next_module_is_pure() {
    let scores: ScoreCard = [(ModuleId::Emotion, score(4))].into_iter().collect();
    let completed = completed_modules(&[ModuleId::Emotion, ModuleId::Sound]);
    let scores_before = scores.clone();
    let completed_before = completed.clone();

    let first = next_module(&scores, &completed);
    let second = next_module(&scores, &completed);

    assert_eq!(first, Some(ModuleId::Story));
    assert_eq!(first, second);
    assert_eq!(scores, scores_before);
    assert_eq!(completed, completed_before);
}

#[test]
fn remaining_modules_preserve_sequence_order() {
    let completed = completed_modules(&[ModuleId::Story, ModuleId::Voice]);
    assert_eq!(
        remaining_modules(&completed),
        vec![
            ModuleId::Emotion,
            ModuleId::Sound,
            ModuleId::Sensor,
            ModuleId::Quiz
        ]
    );
    assert!(remaining_modules(&subset(0b11_1111)).is_empty());
}

#[test]
fn difficulty_boundaries() {
    let module = ModuleId::Sound;
    let card = |value: i64| -> ScoreCard { [(module, score(value))].into_iter().collect() };

    assert_eq!(difficulty_for(module, &ScoreCard::new()), Difficulty::Normal);
    assert_eq!(difficulty_for(module, &card(0)), Difficulty::Easy);
    assert_eq!(difficulty_for(module, &card(2)), Difficulty::Easy);
    assert_eq!(difficulty_for(module, &card(3)), Difficulty::Normal);
    assert_eq!(difficulty_for(module, &card(4)), Difficulty::Hard);
    assert_eq!(difficulty_for(module, &card(5)), Difficulty::Hard);
}

#[test]
fn difficulty_only_reads_the_requested_module() {
    let scores: ScoreCard = [(ModuleId::Quiz, score(5))].into_iter().collect();
    assert_eq!(difficulty_for(ModuleId::Emotion, &scores), Difficulty::Normal);
    assert_eq!(difficulty_for(ModuleId::Quiz, &scores), Difficulty::Hard);
}
