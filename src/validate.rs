//! Boundary validation.
//
//  Raw payload fields are parsed into owned, validated records before the
//  engine sees them; nothing downstream re-checks these rules.

use std::str::FromStr;

use thiserror::Error;
use uuid::{Uuid, Variant};

use crate::matchmaking::types::{StartRequest, TreatmentGroup};

pub const MIN_ROUND: u32 = 1;
pub const MAX_ROUND: u32 = 10;
pub const MIN_SKILL: f64 = 1.0;
pub const MAX_SKILL: f64 = 10.0;

/// Midpoint default when the client does not report a skill level.
pub const DEFAULT_SKILL: f64 = 5.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid participant id: {0}")]
    ParticipantId(String),
    #[error("invalid match id: {0}")]
    MatchId(String),
    #[error("round number must be between 1 and 10, got {0}")]
    RoundNumber(u32),
    #[error("skill level must be between 1 and 10")]
    SkillLevel,
    #[error("unrecognized treatment group: {0}")]
    TreatmentGroup(String),
}

/// RFC 4122 UUID, versions 1 through 5 (variant bits 10xx).
fn parse_rfc4122(raw: &str) -> Option<Uuid> {
    let id = Uuid::parse_str(raw).ok()?;
    let version_ok = (1..=5).contains(&id.get_version_num());
    let variant_ok = id.get_variant() == Variant::RFC4122;
    (version_ok && variant_ok).then_some(id)
}

pub fn validate_participant_id(raw: &str) -> Result<Uuid, ValidationError> {
    parse_rfc4122(raw).ok_or_else(|| ValidationError::ParticipantId(raw.to_string()))
}

pub fn validate_match_id(raw: &str) -> Result<Uuid, ValidationError> {
    parse_rfc4122(raw).ok_or_else(|| ValidationError::MatchId(raw.to_string()))
}

pub fn validate_round_number(round: u32) -> Result<u32, ValidationError> {
    if (MIN_ROUND..=MAX_ROUND).contains(&round) {
        Ok(round)
    } else {
        Err(ValidationError::RoundNumber(round))
    }
}

pub fn validate_skill_level(skill: Option<f64>) -> Result<f64, ValidationError> {
    match skill {
        None => Ok(DEFAULT_SKILL),
        Some(s) if s.is_finite() && (MIN_SKILL..=MAX_SKILL).contains(&s) => Ok(s),
        Some(_) => Err(ValidationError::SkillLevel),
    }
}

pub fn validate_treatment_group(raw: Option<&str>) -> Result<TreatmentGroup, ValidationError> {
    match raw {
        None => Ok(TreatmentGroup::Control),
        Some(label) => TreatmentGroup::from_str(label)
            .map_err(|_| ValidationError::TreatmentGroup(label.to_string())),
    }
}

/// Assemble a validated start-search request from raw payload fields.
pub fn validate_start_request(
    participant_id: &str,
    round_number: u32,
    skill_level: Option<f64>,
    treatment_group: Option<&str>,
    participant_name: Option<String>,
) -> Result<StartRequest, ValidationError> {
    Ok(StartRequest {
        participant_id: validate_participant_id(participant_id)?,
        round_number: validate_round_number(round_number)?,
        skill_level: validate_skill_level(skill_level)?,
        treatment_group: validate_treatment_group(treatment_group)?,
        participant_name,
    })
}
