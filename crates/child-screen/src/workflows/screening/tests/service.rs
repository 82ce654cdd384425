use super::common::*;
use std::sync::Arc;

use crate::workflows::screening::{
    BondingRequest, BondingTier, ChildDirectory, ChildDraft, ChildError, ChildId,
    EmotionLogEntry, RepositoryError, ScreeningFeedback, ScreeningRepository, ScreeningService,
    ScreeningServiceError, ScreeningStatus, ScreeningSubmission, TipRequest, TipSheet,
    ValidationError,
};

fn submission_for(child_id: &ChildId, emotion: i64, sound: i64, quiz: i64) -> ScreeningSubmission {
    ScreeningSubmission {
        child_id: child_id.clone(),
        age_months: 0,
        emotion_score: Some(score(emotion)),
        sound_score: Some(score(sound)),
        quiz_score: Some(score(quiz)),
        feedback: ScreeningFeedback::default(),
        image: None,
    }
}

#[test]
fn add_child_returns_age_derived_view() {
    let (service, _, _) = build_service();

    let child = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");

    assert!(child.id.0.starts_with("child-"));
    assert_eq!(child.age_months, 38);
    assert_eq!(child.age_readable, "3 years 2 months");
    assert_eq!(service.list_children().expect("listed"), vec![child]);
}

#[test]
fn add_child_rejects_missing_fields_and_future_birthdays() {
    let (service, children, _) = build_service();

    let nameless = ChildDraft {
        name: "  ".to_string(),
        ..draft("x", date(2022, 1, 1))
    };
    assert!(matches!(
        service.add_child(nameless),
        Err(ScreeningServiceError::Child(ChildError::MissingField("name")))
    ));

    let future = draft("Ravi", date(2025, 6, 2));
    assert!(matches!(
        service.add_child(future),
        Err(ScreeningServiceError::Child(ChildError::FutureDateOfBirth(_)))
    ));
    assert!(children.list().expect("listed").is_empty());
}

#[test]
fn update_child_keeps_date_of_birth_fixed() {
    let (service, _, _) = build_service();
    let child = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");

    let renamed = ChildDraft {
        name: "Asha K".to_string(),
        date_of_birth: None,
        gender: "Female".to_string(),
    };
    let updated = service.update_child(&child.id, renamed).expect("updated");
    assert_eq!(updated.name, "Asha K");
    assert_eq!(updated.date_of_birth, date(2022, 3, 14));

    let moved = draft("Asha K", date(2021, 3, 14));
    assert!(matches!(
        service.update_child(&child.id, moved),
        Err(ScreeningServiceError::Child(ChildError::DateOfBirthChanged))
    ));
}

#[test]
fn unknown_children_are_reported() {
    let (service, _, _) = build_service();
    let ghost = ChildId("child-999999".to_string());

    assert!(matches!(
        service.get_child(&ghost),
        Err(ScreeningServiceError::UnknownChild(_))
    ));
    assert!(matches!(
        service.delete_child(&ghost),
        Err(ScreeningServiceError::UnknownChild(_))
    ));
    assert!(matches!(
        service.save_screening(submission_for(&ghost, 1, 1, 1)),
        Err(ScreeningServiceError::UnknownChild(_))
    ));
}

#[test]
fn classification_boundaries_through_save() {
    let (service, _, _) = build_service();
    let child = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");

    let cases = [
        ((2, 1, 1), ScreeningStatus::ObservationSuggested),
        ((2, 2, 1), ScreeningStatus::HealthyProgress),
        ((5, 5, 1), ScreeningStatus::HealthyProgress),
        ((5, 5, 2), ScreeningStatus::ExceptionalGrowth),
    ];
    for ((emotion, sound, quiz), expected) in cases {
        let receipt = service
            .save_screening(submission_for(&child.id, emotion, sound, quiz))
            .expect("saved");
        assert_eq!(receipt.status, expected, "total {}", receipt.total_score);
        assert_eq!(receipt.recommendation, expected.recommendation());
    }
}

#[test]
fn skipped_modules_count_as_zero_but_stay_null_in_history() {
    let (service, _, screenings) = build_service();
    let child = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");
    let mut submission = submission_for(&child.id, 4, 0, 0);
    submission.sound_score = None;
    submission.quiz_score = None;

    let receipt = service.save_screening(submission).expect("saved");

    assert_eq!(receipt.total_score, 4);
    assert_eq!(receipt.status, ScreeningStatus::ObservationSuggested);
    assert_eq!(receipt.age_months, 38);
    let stored = screenings.all().expect("records");
    assert_eq!(stored[0].sound_score, None);
}

#[test]
fn latest_screening_prefers_later_insert_on_equal_timestamps() {
    let (service, _, _) = build_service();
    let child = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");

    assert_eq!(service.latest_screening(&child.id).expect("read"), None);

    service
        .save_screening(submission_for(&child.id, 1, 1, 1))
        .expect("saved");
    let second = service
        .save_screening(submission_for(&child.id, 5, 5, 5))
        .expect("saved");

    let latest = service
        .latest_screening(&child.id)
        .expect("read")
        .expect("present");
    assert_eq!(latest.screening_id, second.screening_id);
    assert_eq!(latest.total_score(), 15);
}

#[test]
fn latest_per_child_keeps_one_record_each() {
    let (service, _, _) = build_service();
    let asha = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");
    let ravi = service
        .add_child(draft("Ravi", date(2020, 1, 2)))
        .expect("child added");

    service
        .save_screening(submission_for(&asha.id, 1, 1, 1))
        .expect("saved");
    service
        .save_screening(submission_for(&ravi.id, 2, 2, 2))
        .expect("saved");
    service
        .save_screening(submission_for(&asha.id, 3, 3, 3))
        .expect("saved");

    let latest = service.latest_per_child().expect("read");
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].child_id, asha.id);
    assert_eq!(latest[0].total_score(), 9);
    assert_eq!(latest[1].child_id, ravi.id);
}

#[test]
fn analytics_join_latest_screening_with_child() {
    let (service, _, _) = build_service();
    let asha = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");
    let ravi = service
        .add_child(draft("Ravi", date(2020, 1, 2)))
        .expect("child added");

    assert!(matches!(
        service.analytics(&asha.id),
        Err(ScreeningServiceError::NoScreening(_))
    ));

    service
        .save_screening(submission_for(&asha.id, 4, 5, 4))
        .expect("saved");
    service
        .save_screening(submission_for(&ravi.id, 1, 1, 1))
        .expect("saved");

    let analytics = service.analytics(&asha.id).expect("analytics");
    assert_eq!(analytics.child.name, "Asha");
    assert_eq!(analytics.total_score, 13);
    assert_eq!(analytics.status, "Exceptional Growth");

    service.delete_child(&ravi.id).expect("deleted");
    let all = service.all_analytics().expect("all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].child.id, asha.id);
}

#[test]
fn bonding_validates_before_scoring() {
    let (service, _, _) = build_service();

    let blank = BondingRequest {
        child_id: ChildId("child-000001".to_string()),
        text: "   ".to_string(),
    };
    assert!(matches!(
        service.bonding(&blank),
        Err(ScreeningServiceError::Validation(ValidationError::BondingInput))
    ));

    let anonymous = BondingRequest {
        child_id: ChildId(String::new()),
        text: "we hug".to_string(),
    };
    assert!(service.bonding(&anonymous).is_err());

    let request = BondingRequest {
        child_id: ChildId("child-000001".to_string()),
        text: "We love to play and hug, then smile".to_string(),
    };
    let assessment = service.bonding(&request).expect("scored");
    assert_eq!(assessment.score, 0.9);
    assert_eq!(assessment.tier, BondingTier::Excellent);
}

#[test]
fn tips_require_a_child_id() {
    let (service, _, _) = build_service();
    let request = TipRequest {
        child_id: ChildId("child-000001".to_string()),
        scores: Default::default(),
    };
    assert_eq!(service.tips(&request).expect("tips"), TipSheet::standard());

    let anonymous = TipRequest {
        child_id: ChildId(" ".to_string()),
        scores: Default::default(),
    };
    assert!(service.tips(&anonymous).is_err());
}

#[test]
fn growth_input_defaults_to_zero_scores() {
    let (service, _, _) = build_service();
    let child = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");

    let empty = service.growth_input(&child.id).expect("input");
    assert_eq!(empty.age_months, 38);
    assert_eq!(empty.scores.total(), 0);

    service
        .save_screening(submission_for(&child.id, 2, 3, 4))
        .expect("saved");
    let input = service.growth_input(&child.id).expect("input");
    assert_eq!(input.scores.total(), 9);
}

#[test]
fn emotion_logs_are_appended_for_known_children() {
    let (service, _, screenings) = build_service();
    let child = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");

    let entries = vec![
        happy_log(),
        EmotionLogEntry {
            emotion: "surprise".to_string(),
            confidence: None,
            captured_at: Some(fixed_now()),
        },
    ];
    assert_eq!(
        service
            .record_emotion_logs(&child.id, entries)
            .expect("saved"),
        2
    );
    assert_eq!(screenings.logs().len(), 2);
    assert_eq!(screenings.logs()[1].entry.emotion, "surprise");

    assert!(matches!(
        service.record_emotion_logs(&child.id, Vec::new()),
        Err(ScreeningServiceError::Validation(ValidationError::MissingField("logs")))
    ));
}

#[test]
fn repository_outages_surface_as_repository_errors() {
    let children = Arc::new(MemoryChildren::default());
    let service =
        ScreeningService::with_clock(children, Arc::new(UnavailableScreenings), fixed_now);
    let child = service
        .add_child(draft("Asha", date(2022, 3, 14)))
        .expect("child added");

    assert!(matches!(
        service.save_screening(submission_for(&child.id, 1, 1, 1)),
        Err(ScreeningServiceError::Repository(RepositoryError::Unavailable(_)))
    ));
}
