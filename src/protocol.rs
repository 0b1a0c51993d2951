//! Wire protocol shared by the WS handler and the push dispatcher.
//
//  Client payloads arrive with camelCase keys and are validated before they
//  reach the engine; see `validate`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matchmaking::types::QueueStatus;

// ---------- client → server ----------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    Register {
        participant_id: String,
        #[serde(default)]
        round_number: Option<u32>,
        #[serde(default)]
        participant_name: Option<String>,
        #[serde(default)]
        treatment_group: Option<String>,
    },
    StartMatchmaking {
        participant_id: String,
        round_number: u32,
        #[serde(default)]
        skill_level: Option<f64>,
        #[serde(default)]
        treatment_group: Option<String>,
        #[serde(default)]
        participant_name: Option<String>,
    },
    CancelMatchmaking {
        participant_id: String,
        round_number: u32,
    },
    GetQueueStatus {
        round_number: u32,
    },
    MatchUpdate {
        match_id: String,
        update_type: String,
        #[serde(default)]
        update_data: Option<serde_json::Value>,
    },
    UpdateStatus {
        participant_id: String,
        status: String,
    },
    Ping,
}

// ---------- server → client ----------

/// Per-peer view of a found match. Key casing is part of the contract:
/// snake_case record fields with the historical camelCase exceptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFoundPayload {
    pub id: Uuid,
    pub participant1_id: Uuid,
    pub participant2_id: Option<Uuid>,
    pub round_number: u32,
    pub match_type: String,
    pub status: String,
    pub created_at: String,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    /// Opponent descriptor, passed through as JSON text.
    pub opponent: String,
    #[serde(rename = "myRole")]
    pub my_role: String,
    pub timestamp: String,
    #[serde(rename = "aiSettings", default, skip_serializing_if = "Option::is_none")]
    pub ai_settings: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    RegistrationSuccess {
        participant_id: Uuid,
        timestamp: String,
    },
    MatchmakingStarted {
        round_number: u32,
    },
    MatchmakingStatus {
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        queue_position: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_wait_seconds: Option<u64>,
    },
    MatchFound(MatchFoundPayload),
    MatchUpdate {
        match_id: Uuid,
        update_type: String,
        update_data: serde_json::Value,
        timestamp: String,
    },
    QueueStatusUpdate(QueueStatus),
    StatusUpdated {
        status: String,
    },
    MatchmakingCancelled {
        round_number: u32,
    },
    MatchmakingError {
        message: String,
    },
    Error {
        message: String,
    },
    Heartbeat {
        connected: usize,
        timestamp: String,
    },
    Pong,
}
