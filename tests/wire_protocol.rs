//! Serialization contracts for queue entries, match records and the push
//! protocol.

use std::collections::HashMap;

use tourney_server::matchmaking::types::{
    coerce_bool, derived_display_name, MatchRecord, MatchRecordStatus, MatchType, QueueEntry,
    QueueStatus, TreatmentGroup,
};
use tourney_server::protocol::{ClientMsg, MatchFoundPayload, ServerMsg};
use uuid::Uuid;

fn sample_entry() -> QueueEntry {
    QueueEntry {
        participant_id: Uuid::new_v4(),
        participant_name: Some("Ada".into()),
        round_number: 2,
        skill_level: 7.5,
        treatment_group: TreatmentGroup::Tournament,
        joined_at: 1_700_000_000_000,
        status: "waiting".into(),
    }
}

#[test]
fn queue_entry_round_trips_through_json() {
    let entry = sample_entry();
    let json = serde_json::to_string(&entry).unwrap();
    assert!(json.contains("\"participantId\""));
    assert!(json.contains("\"joinedAt\""));

    let back: QueueEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(back.participant_id, entry.participant_id);
    assert_eq!(back.joined_at, entry.joined_at);
    assert_eq!(back.treatment_group, entry.treatment_group);
}

fn sample_match() -> MatchRecord {
    MatchRecord {
        id: Uuid::new_v4(),
        participant1_id: Uuid::new_v4(),
        participant2_id: Some(Uuid::new_v4()),
        participant1_name: Some("Ada".into()),
        participant2_name: Some("Grace".into()),
        round_number: 4,
        match_type: MatchType::LiveHuman,
        status: MatchRecordStatus::Active,
        created_at: chrono::Utc::now(),
        is_ai: false,
        opponent: r#"{"id":"x","name":"Grace","isAI":false}"#.into(),
        ai_settings: None,
    }
}

#[test]
fn match_record_round_trips_through_hash_fields() {
    let record = sample_match();
    let fields: HashMap<String, String> = record.to_fields().into_iter().collect();

    let back = MatchRecord::from_fields("match:test", &fields).unwrap();
    assert_eq!(back.id, record.id);
    assert_eq!(back.participant1_id, record.participant1_id);
    assert_eq!(back.participant2_id, record.participant2_id);
    assert_eq!(back.round_number, record.round_number);
    assert_eq!(back.is_ai, record.is_ai);
    assert_eq!(back.opponent, record.opponent);
}

#[test]
fn is_ai_survives_string_coercion() {
    assert!(coerce_bool("true"));
    assert!(coerce_bool("1"));
    assert!(!coerce_bool("false"));
    assert!(!coerce_bool("0"));
    assert!(!coerce_bool(""));

    // A record written by another service as "1" still parses as AI.
    let mut fields: HashMap<String, String> = sample_match().to_fields().into_iter().collect();
    fields.insert("isAI".into(), "1".into());
    fields.insert("participant2_id".into(), "".into());
    let back = MatchRecord::from_fields("match:test", &fields).unwrap();
    assert!(back.is_ai);
    assert_eq!(back.participant2_id, None);
}

#[test]
fn missing_required_field_is_an_error() {
    let mut fields: HashMap<String, String> = sample_match().to_fields().into_iter().collect();
    fields.remove("round_number");
    assert!(MatchRecord::from_fields("match:test", &fields).is_err());
}

#[test]
fn client_events_parse_with_camel_case_keys() {
    let msg: ClientMsg = serde_json::from_str(
        r#"{"type":"start_matchmaking","participantId":"00000000-0000-4000-8000-000000000001",
            "roundNumber":3,"skillLevel":7.2,"treatmentGroup":"tournament"}"#,
    )
    .unwrap();
    match msg {
        ClientMsg::StartMatchmaking {
            round_number,
            skill_level,
            ..
        } => {
            assert_eq!(round_number, 3);
            assert_eq!(skill_level, Some(7.2));
        }
        other => panic!("parsed wrong variant: {other:?}"),
    }

    let msg: ClientMsg = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert!(matches!(msg, ClientMsg::Ping));
}

#[test]
fn non_integer_round_number_is_rejected_at_parse_time() {
    let res: Result<ClientMsg, _> = serde_json::from_str(
        r#"{"type":"start_matchmaking","participantId":"00000000-0000-4000-8000-000000000001",
            "roundNumber":2.5}"#,
    );
    assert!(res.is_err());
}

#[test]
fn unknown_event_type_is_rejected() {
    let res: Result<ClientMsg, _> = serde_json::from_str(r#"{"type":"self_destruct"}"#);
    assert!(res.is_err());
}

#[test]
fn match_found_keeps_historical_key_casing() {
    let payload = MatchFoundPayload {
        id: Uuid::new_v4(),
        participant1_id: Uuid::new_v4(),
        participant2_id: None,
        round_number: 1,
        match_type: "human-vs-ai".into(),
        status: "active".into(),
        created_at: "2026-01-01T00:00:00Z".into(),
        is_ai: true,
        opponent: "{}".into(),
        my_role: "participant1".into(),
        timestamp: "2026-01-01T00:00:00Z".into(),
        ai_settings: Some("{}".into()),
    };
    let json = serde_json::to_value(ServerMsg::MatchFound(payload)).unwrap();

    assert_eq!(json["type"], "match_found");
    assert_eq!(json["isAI"], true);
    assert_eq!(json["myRole"], "participant1");
    assert_eq!(json["round_number"], 1);
    assert!(json.get("aiSettings").is_some());
    assert!(json.get("participant2_id").is_some());
}

#[test]
fn queue_status_update_uses_camel_case() {
    let status = QueueStatus {
        round_number: 2,
        total_waiting: 4,
        average_wait_time: 12,
        recent_matches: 7,
        estimated_wait_time: 30,
    };
    let json = serde_json::to_value(ServerMsg::QueueStatusUpdate(status)).unwrap();
    assert_eq!(json["type"], "queue_status_update");
    assert_eq!(json["roundNumber"], 2);
    assert_eq!(json["totalWaiting"], 4);
    assert_eq!(json["averageWaitTime"], 12);
    assert_eq!(json["recentMatches"], 7);
    assert_eq!(json["estimatedWaitTime"], 30);
}

#[test]
fn derived_names_use_the_id_tail() {
    let id = Uuid::parse_str("00000000-0000-4000-8000-00000000abcd").unwrap();
    assert_eq!(derived_display_name(id), "Player abcd");
}
