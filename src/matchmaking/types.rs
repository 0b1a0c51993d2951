//! Domain types shared by the queue, engine and dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Experimental-condition label attached to each participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreatmentGroup {
    #[serde(rename = "Group 1: Control")]
    Control,
    #[serde(rename = "Group 2: Goal Setting Only")]
    GoalSetting,
    #[serde(rename = "Group 3: Goal Setting + AI Assistant")]
    GoalAi,
    #[serde(rename = "Group 4: Goal Setting + AI Assistant + Competition")]
    Tournament,
    #[serde(rename = "Group 5: Goal Setting + AI Assistant + Blind Competition")]
    BlindTournament,
}

impl FromStr for TreatmentGroup {
    type Err = ();

    /// Accepts both the long study labels and the short aliases used by the
    /// client. Anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Group 1: Control" | "control" => Ok(TreatmentGroup::Control),
            "Group 2: Goal Setting Only" | "goal_setting" => Ok(TreatmentGroup::GoalSetting),
            "Group 3: Goal Setting + AI Assistant" | "goal_ai" => Ok(TreatmentGroup::GoalAi),
            "Group 4: Goal Setting + AI Assistant + Competition" | "tournament" => {
                Ok(TreatmentGroup::Tournament)
            }
            "Group 5: Goal Setting + AI Assistant + Blind Competition" => {
                Ok(TreatmentGroup::BlindTournament)
            }
            _ => Err(()),
        }
    }
}

impl fmt::Display for TreatmentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TreatmentGroup::Control => "Group 1: Control",
            TreatmentGroup::GoalSetting => "Group 2: Goal Setting Only",
            TreatmentGroup::GoalAi => "Group 3: Goal Setting + AI Assistant",
            TreatmentGroup::Tournament => "Group 4: Goal Setting + AI Assistant + Competition",
            TreatmentGroup::BlindTournament => {
                "Group 5: Goal Setting + AI Assistant + Blind Competition"
            }
        };
        f.write_str(label)
    }
}

/// Participant lifecycle status as written to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Searching,
    Matching,
    Matched,
    Cancelled,
    Disconnected,
    Timeout,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Searching => "searching",
            ParticipantStatus::Matching => "matching",
            ParticipantStatus::Matched => "matched",
            ParticipantStatus::Cancelled => "cancelled",
            ParticipantStatus::Disconnected => "disconnected",
            ParticipantStatus::Timeout => "timeout",
        }
    }
}

impl FromStr for ParticipantStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "searching" => Ok(ParticipantStatus::Searching),
            "matching" => Ok(ParticipantStatus::Matching),
            "matched" => Ok(ParticipantStatus::Matched),
            "cancelled" => Ok(ParticipantStatus::Cancelled),
            "disconnected" => Ok(ParticipantStatus::Disconnected),
            "timeout" => Ok(ParticipantStatus::Timeout),
            _ => Err(()),
        }
    }
}

/// One waiting participant, JSON-encoded as the sorted-set member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub participant_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
    pub round_number: u32,
    pub skill_level: f64,
    pub treatment_group: TreatmentGroup,
    /// Epoch milliseconds; doubles as the sorted-set score.
    pub joined_at: i64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    LiveHuman,
    HumanVsAi,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::LiveHuman => "live-human",
            MatchType::HumanVsAi => "human-vs-ai",
        }
    }
}

impl FromStr for MatchType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live-human" => Ok(MatchType::LiveHuman),
            "human-vs-ai" => Ok(MatchType::HumanVsAi),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRecordStatus {
    Active,
    Completed,
    Cancelled,
    Paused,
}

impl MatchRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRecordStatus::Active => "active",
            MatchRecordStatus::Completed => "completed",
            MatchRecordStatus::Cancelled => "cancelled",
            MatchRecordStatus::Paused => "paused",
        }
    }
}

impl FromStr for MatchRecordStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MatchRecordStatus::Active),
            "completed" => Ok(MatchRecordStatus::Completed),
            "cancelled" => Ok(MatchRecordStatus::Cancelled),
            "paused" => Ok(MatchRecordStatus::Paused),
            _ => Err(()),
        }
    }
}

/// One pairing, human or AI, as stored in the `match:<id>` hash.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub id: Uuid,
    pub participant1_id: Uuid,
    /// None for human-vs-ai matches.
    pub participant2_id: Option<Uuid>,
    pub participant1_name: Option<String>,
    pub participant2_name: Option<String>,
    pub round_number: u32,
    pub match_type: MatchType,
    pub status: MatchRecordStatus,
    pub created_at: DateTime<Utc>,
    pub is_ai: bool,
    /// Serialized opponent descriptor (JSON text, never parsed by the core).
    pub opponent: String,
    /// Serialized AI settings; present only when `is_ai`.
    pub ai_settings: Option<String>,
}

pub fn match_key(id: Uuid) -> String {
    format!("match:{id}")
}

impl MatchRecord {
    /// Flatten into string fields for HSET. Nested objects stay JSON text.
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".into(), self.id.to_string()),
            ("participant1_id".into(), self.participant1_id.to_string()),
            (
                "participant2_id".into(),
                self.participant2_id.map(|p| p.to_string()).unwrap_or_default(),
            ),
            ("round_number".into(), self.round_number.to_string()),
            ("match_type".into(), self.match_type.as_str().into()),
            ("status".into(), self.status.as_str().into()),
            ("created_at".into(), self.created_at.to_rfc3339()),
            ("isAI".into(), self.is_ai.to_string()),
            ("opponent".into(), self.opponent.clone()),
        ];
        if let Some(name) = &self.participant1_name {
            fields.push(("participant1_name".into(), name.clone()));
        }
        if let Some(name) = &self.participant2_name {
            fields.push(("participant2_name".into(), name.clone()));
        }
        if let Some(settings) = &self.ai_settings {
            fields.push(("aiSettings".into(), settings.clone()));
        }
        fields
    }

    /// Rebuild from HGETALL output. The store hands everything back as text,
    /// so `isAI` tolerates "true"/"false" as well as "1"/"0".
    pub fn from_fields(key: &str, fields: &HashMap<String, String>) -> Result<Self, StoreError> {
        let malformed = |detail: &str| StoreError::Malformed {
            key: key.to_string(),
            detail: detail.to_string(),
        };

        let get = |name: &str| fields.get(name).ok_or_else(|| malformed(name));

        let id = Uuid::parse_str(get("id")?).map_err(|_| malformed("id"))?;
        let participant1_id =
            Uuid::parse_str(get("participant1_id")?).map_err(|_| malformed("participant1_id"))?;
        let participant2_id = match fields.get("participant2_id").map(String::as_str) {
            None | Some("") | Some("null") => None,
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| malformed("participant2_id"))?),
        };
        let round_number = get("round_number")?
            .parse::<u32>()
            .map_err(|_| malformed("round_number"))?;
        let match_type = get("match_type")?
            .parse::<MatchType>()
            .map_err(|_| malformed("match_type"))?;
        let status = get("status")?
            .parse::<MatchRecordStatus>()
            .map_err(|_| malformed("status"))?;
        let created_at = DateTime::parse_from_rfc3339(get("created_at")?)
            .map_err(|_| malformed("created_at"))?
            .with_timezone(&Utc);
        let is_ai = coerce_bool(get("isAI")?);

        Ok(MatchRecord {
            id,
            participant1_id,
            participant2_id,
            participant1_name: fields.get("participant1_name").cloned(),
            participant2_name: fields.get("participant2_name").cloned(),
            round_number,
            match_type,
            status,
            created_at,
            is_ai,
            opponent: get("opponent")?.clone(),
            ai_settings: fields.get("aiSettings").cloned(),
        })
    }
}

/// String-to-bool coercion for flags that round-trip through the store.
pub fn coerce_bool(raw: &str) -> bool {
    matches!(raw, "true" | "True" | "TRUE" | "1")
}

/// Placeholder display name derived from the tail of a participant id.
pub fn derived_display_name(id: Uuid) -> String {
    let s = id.simple().to_string();
    format!("Player {}", &s[s.len() - 4..])
}

/// FIFO-earliest candidate whose skill lies within `threshold` of `skill`.
/// Candidates must already be in FIFO order; deterministic in its inputs.
///
/// Human pairing stops here: a queue with nobody inside the window yields no
/// pair, and the searcher keeps waiting for the AI fallback instead of being
/// forced onto a badly mismatched human.
pub fn first_within_window<T>(
    skill: f64,
    threshold: f64,
    candidates: &[T],
    skill_of: impl Fn(&T) -> f64,
) -> Option<usize> {
    candidates
        .iter()
        .position(|c| (skill_of(c) - skill).abs() <= threshold)
}

/// Window selection with graceful degradation: the FIFO-earliest in-window
/// candidate, else the one closest in skill (earlier entry wins ties). None
/// only when `candidates` is empty.
///
/// Used for the AI roster, which must always produce an opponent even for
/// skill levels far outside its 5.5–8.0 spread.
pub fn select_by_skill_window<T>(
    skill: f64,
    threshold: f64,
    candidates: &[T],
    skill_of: impl Fn(&T) -> f64,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(idx) = first_within_window(skill, threshold, candidates, &skill_of) {
        return Some(idx);
    }

    let mut best = 0usize;
    let mut best_gap = (skill_of(&candidates[0]) - skill).abs();
    for (idx, c) in candidates.iter().enumerate().skip(1) {
        let gap = (skill_of(c) - skill).abs();
        if gap < best_gap {
            best = idx;
            best_gap = gap;
        }
    }
    Some(best)
}

/// A start-search request that already passed boundary validation.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub participant_id: Uuid,
    pub participant_name: Option<String>,
    pub round_number: u32,
    pub skill_level: f64,
    pub treatment_group: TreatmentGroup,
}

/// Snapshot of one round's queue, shared by the WS and HTTP surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub round_number: u32,
    pub total_waiting: usize,
    /// Mean wait of current entries, seconds.
    pub average_wait_time: u64,
    /// Matches produced today (human + AI).
    pub recent_matches: i64,
    /// Rough projection for a new joiner, seconds.
    pub estimated_wait_time: u64,
}
