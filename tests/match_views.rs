//! Per-peer materialization of match-found events.

use chrono::Utc;
use tourney_server::dispatch::materialize_views;
use tourney_server::matchmaking::types::{MatchRecord, MatchRecordStatus, MatchType};
use uuid::Uuid;

fn human_match(p1_name: Option<&str>, p2_name: Option<&str>) -> MatchRecord {
    MatchRecord {
        id: Uuid::new_v4(),
        participant1_id: Uuid::parse_str("00000000-0000-4000-8000-00000000aaaa").unwrap(),
        participant2_id: Some(Uuid::parse_str("00000000-0000-4000-8000-00000000bbbb").unwrap()),
        participant1_name: p1_name.map(String::from),
        participant2_name: p2_name.map(String::from),
        round_number: 2,
        match_type: MatchType::LiveHuman,
        status: MatchRecordStatus::Active,
        created_at: Utc::now(),
        is_ai: false,
        opponent: r#"{"id":"b","name":"Grace","skillLevel":7.5,"isAI":false}"#.into(),
        ai_settings: None,
    }
}

fn ai_match() -> MatchRecord {
    MatchRecord {
        participant2_id: None,
        match_type: MatchType::HumanVsAi,
        is_ai: true,
        opponent: r#"{"id":"ai-opp-05","name":"Morgan T.","skillLevel":6.9,"isAI":true}"#.into(),
        ai_settings: Some(r#"{"opponentId":"ai-opp-05"}"#.into()),
        ..human_match(Some("Ada"), None)
    }
}

#[test]
fn ai_match_yields_single_view_with_untouched_opponent() {
    let record = ai_match();
    let views = materialize_views(&record, |_| None);

    assert_eq!(views.len(), 1);
    let (pid, payload) = &views[0];
    assert_eq!(*pid, record.participant1_id);
    assert_eq!(payload.my_role, "participant1");
    assert!(payload.is_ai);
    assert_eq!(payload.opponent, record.opponent);
    assert_eq!(payload.ai_settings, record.ai_settings);
}

#[test]
fn human_match_yields_two_crossed_views() {
    let record = human_match(Some("Ada"), Some("Grace"));
    let views = materialize_views(&record, |_| None);

    assert_eq!(views.len(), 2);
    let p1 = record.participant1_id;
    let p2 = record.participant2_id.unwrap();

    let (pid_a, view_a) = &views[0];
    let (pid_b, view_b) = &views[1];
    assert_eq!(*pid_a, p1);
    assert_eq!(*pid_b, p2);
    assert_eq!(view_a.my_role, "participant1");
    assert_eq!(view_b.my_role, "participant2");
    assert!(!view_a.is_ai);
    assert!(!view_b.is_ai);

    // Each side sees the other as the opponent.
    let opp_a: serde_json::Value = serde_json::from_str(&view_a.opponent).unwrap();
    let opp_b: serde_json::Value = serde_json::from_str(&view_b.opponent).unwrap();
    assert_eq!(opp_a["id"], p2.to_string());
    assert_eq!(opp_a["name"], "Grace");
    assert_eq!(opp_b["id"], p1.to_string());
    assert_eq!(opp_b["name"], "Ada");

    // The stored descriptor's skill rides along into participant1's view.
    assert_eq!(opp_a["skillLevel"], 7.5);
}

#[test]
fn opponent_names_fall_back_to_session_then_placeholder() {
    // No names in the record; participant2 has a registered session name.
    let record = human_match(None, None);
    let p2 = record.participant2_id.unwrap();

    let views = materialize_views(&record, |pid| {
        (pid == p2).then(|| "SessionGrace".to_string())
    });

    let opp_a: serde_json::Value = serde_json::from_str(&views[0].1.opponent).unwrap();
    let opp_b: serde_json::Value = serde_json::from_str(&views[1].1.opponent).unwrap();

    // p1's opponent (p2) resolves from the session registry.
    assert_eq!(opp_a["name"], "SessionGrace");
    // p2's opponent (p1) has nothing anywhere: derived placeholder.
    assert_eq!(opp_b["name"], "Player aaaa");
}

#[test]
fn record_names_win_over_session_names() {
    let record = human_match(Some("RecordAda"), Some("RecordGrace"));
    let views = materialize_views(&record, |_| Some("SessionName".to_string()));

    let opp_a: serde_json::Value = serde_json::from_str(&views[0].1.opponent).unwrap();
    let opp_b: serde_json::Value = serde_json::from_str(&views[1].1.opponent).unwrap();
    assert_eq!(opp_a["name"], "RecordGrace");
    assert_eq!(opp_b["name"], "RecordAda");
}
