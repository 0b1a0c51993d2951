//! Boundary validation tests.

use tourney_server::matchmaking::types::TreatmentGroup;
use tourney_server::validate::{
    validate_participant_id, validate_round_number, validate_skill_level,
    validate_start_request, validate_treatment_group, ValidationError, DEFAULT_SKILL,
};

#[test]
fn accepts_rfc4122_uuids() {
    // v4, variant 10xx
    assert!(validate_participant_id("00000000-0000-4000-8000-000000000001").is_ok());
    assert!(validate_participant_id("9f8b7c6d-5e4f-4a3b-9c2d-1e0f9a8b7c6d").is_ok());
    // v1 is fine too
    assert!(validate_participant_id("a6edfc44-6f83-11ee-b962-0242ac120002").is_ok());
}

#[test]
fn rejects_non_rfc4122_uuids() {
    // nil UUID: version 0
    assert!(validate_participant_id("00000000-0000-0000-0000-000000000000").is_err());
    // bad variant bits (Microsoft-reserved "c")
    assert!(validate_participant_id("00000000-0000-4000-c000-000000000001").is_err());
    // not a UUID at all
    assert!(validate_participant_id("not-a-uuid").is_err());
    assert!(validate_participant_id("").is_err());
}

#[test]
fn round_number_bounds() {
    assert!(validate_round_number(0).is_err());
    assert!(validate_round_number(11).is_err());
    for round in 1..=10 {
        assert_eq!(validate_round_number(round), Ok(round));
    }
}

#[test]
fn skill_level_bounds_and_default() {
    assert_eq!(validate_skill_level(None), Ok(DEFAULT_SKILL));
    assert_eq!(validate_skill_level(Some(1.0)), Ok(1.0));
    assert_eq!(validate_skill_level(Some(10.0)), Ok(10.0));
    assert_eq!(validate_skill_level(Some(0.9)), Err(ValidationError::SkillLevel));
    assert_eq!(validate_skill_level(Some(10.1)), Err(ValidationError::SkillLevel));
    assert_eq!(validate_skill_level(Some(f64::NAN)), Err(ValidationError::SkillLevel));
}

#[test]
fn treatment_groups_accept_long_labels_and_aliases() {
    assert_eq!(
        validate_treatment_group(Some("Group 1: Control")),
        Ok(TreatmentGroup::Control)
    );
    assert_eq!(
        validate_treatment_group(Some("control")),
        Ok(TreatmentGroup::Control)
    );
    assert_eq!(
        validate_treatment_group(Some("goal_setting")),
        Ok(TreatmentGroup::GoalSetting)
    );
    assert_eq!(
        validate_treatment_group(Some("goal_ai")),
        Ok(TreatmentGroup::GoalAi)
    );
    assert_eq!(
        validate_treatment_group(Some("tournament")),
        Ok(TreatmentGroup::Tournament)
    );
    assert_eq!(
        validate_treatment_group(Some(
            "Group 5: Goal Setting + AI Assistant + Blind Competition"
        )),
        Ok(TreatmentGroup::BlindTournament)
    );
    assert_eq!(validate_treatment_group(None), Ok(TreatmentGroup::Control));
}

#[test]
fn treatment_groups_reject_everything_else() {
    assert!(validate_treatment_group(Some("Group 6: Mystery")).is_err());
    assert!(validate_treatment_group(Some("CONTROL")).is_err());
    assert!(validate_treatment_group(Some("")).is_err());
}

#[test]
fn start_request_assembles_validated_fields() {
    let req = validate_start_request(
        "00000000-0000-4000-8000-000000000001",
        2,
        Some(7.5),
        Some("tournament"),
        Some("Ada".into()),
    )
    .unwrap();
    assert_eq!(req.round_number, 2);
    assert_eq!(req.skill_level, 7.5);
    assert_eq!(req.treatment_group, TreatmentGroup::Tournament);
    assert_eq!(req.participant_name.as_deref(), Some("Ada"));
}

#[test]
fn start_request_rejects_any_bad_field() {
    let good_id = "00000000-0000-4000-8000-000000000001";
    assert!(validate_start_request("nope", 2, None, None, None).is_err());
    assert!(validate_start_request(good_id, 0, None, None, None).is_err());
    assert!(validate_start_request(good_id, 2, Some(0.0), None, None).is_err());
    assert!(validate_start_request(good_id, 2, None, Some("x"), None).is_err());
}
