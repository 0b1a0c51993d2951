//! Push dispatcher: session registry, targeted routing, heartbeats.
//
//  One PushSession per connected participant, keyed by participant id. All
//  server-to-client traffic flows through here, including the match-found
//  materialization that gives each peer its own view of the opponent.

use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use actix_ws::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::settings;
use crate::matchmaking::types::{
    derived_display_name, MatchRecord, MatchRecordStatus, ParticipantStatus, TreatmentGroup,
};
use crate::matchmaking::{MatchObserver, MatchmakingEngine, StartOutcome};
use crate::protocol::{ClientMsg, MatchFoundPayload, ServerMsg};
use crate::validate;

/// Live push connection for one participant.
#[derive(Clone)]
pub struct PushSession {
    pub socket_id: Uuid,
    pub handle: Session,
    pub round_number: Option<u32>,
    pub display_name: Option<String>,
    pub treatment_group: Option<TreatmentGroup>,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub status: &'static str,
}

pub struct PushDispatcher {
    weak: Weak<PushDispatcher>,
    engine: Arc<MatchmakingEngine>,
    sessions: DashMap<Uuid, PushSession>,
}

/// Serialize and push one message down a session handle.
pub async fn send(session: &mut Session, msg: &ServerMsg) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if let Err(e) = session.text(json).await {
                log::warn!("WS send failed: {e:?}");
            }
        }
        Err(e) => log::error!("server message serialization failed: {e}"),
    }
}

impl PushDispatcher {
    pub fn new(engine: Arc<MatchmakingEngine>) -> Arc<Self> {
        Arc::new_cyclic(|weak| PushDispatcher {
            weak: weak.clone(),
            engine,
            sessions: DashMap::new(),
        })
    }

    pub fn connected_count(&self) -> usize {
        self.sessions.len()
    }

    /// Route one inbound client event. `registered` is the connection's
    /// bound participant id, set by the register event and used for
    /// disconnect bookkeeping.
    pub async fn handle_event(
        &self,
        socket_id: Uuid,
        session: &mut Session,
        registered: &mut Option<Uuid>,
        msg: ClientMsg,
    ) {
        if let Some(pid) = *registered {
            self.touch(pid);
        }

        match msg {
            ClientMsg::Register {
                participant_id,
                round_number,
                participant_name,
                treatment_group,
            } => {
                let pid = match validate::validate_participant_id(&participant_id) {
                    Ok(pid) => pid,
                    Err(e) => return send(session, &error_msg(e.to_string())).await,
                };
                let group = match validate::validate_treatment_group(treatment_group.as_deref()) {
                    Ok(g) => g,
                    Err(e) => return send(session, &error_msg(e.to_string())).await,
                };
                if let Some(round) = round_number {
                    if let Err(e) = validate::validate_round_number(round) {
                        return send(session, &error_msg(e.to_string())).await;
                    }
                }

                let now = Utc::now();
                self.sessions.insert(
                    pid,
                    PushSession {
                        socket_id,
                        handle: session.clone(),
                        round_number,
                        display_name: participant_name,
                        treatment_group: Some(group),
                        connected_at: now,
                        last_seen: now,
                        status: "connected",
                    },
                );
                *registered = Some(pid);
                log::info!("participant {pid} registered on socket {socket_id}");

                send(
                    session,
                    &ServerMsg::RegistrationSuccess {
                        participant_id: pid,
                        timestamp: now.to_rfc3339(),
                    },
                )
                .await;

                if let Some(round) = round_number {
                    self.emit_queue_status(session, round).await;
                }
            }

            ClientMsg::StartMatchmaking {
                participant_id,
                round_number,
                skill_level,
                treatment_group,
                participant_name,
            } => {
                let req = match validate::validate_start_request(
                    &participant_id,
                    round_number,
                    skill_level,
                    treatment_group.as_deref(),
                    participant_name,
                ) {
                    Ok(req) => req,
                    Err(e) => return send(session, &error_msg(e.to_string())).await,
                };

                // Keep the session's round current for queue broadcasts.
                if let Some(mut entry) = self.sessions.get_mut(&req.participant_id) {
                    entry.round_number = Some(req.round_number);
                }

                send(
                    session,
                    &ServerMsg::MatchmakingStarted {
                        round_number: req.round_number,
                    },
                )
                .await;

                let status = match self.engine.start_matchmaking(req).await {
                    StartOutcome::AlreadySearching => ServerMsg::MatchmakingStatus {
                        status: "already_searching".into(),
                        queue_position: None,
                        estimated_wait_seconds: None,
                    },
                    StartOutcome::AlreadyMatched | StartOutcome::Matched(_) => {
                        // match_found itself travels via the observer path.
                        ServerMsg::MatchmakingStatus {
                            status: "matched".into(),
                            queue_position: None,
                            estimated_wait_seconds: None,
                        }
                    }
                    StartOutcome::Searching {
                        queue_position,
                        estimated_wait_seconds,
                    } => ServerMsg::MatchmakingStatus {
                        status: "searching".into(),
                        queue_position: Some(queue_position),
                        estimated_wait_seconds: Some(estimated_wait_seconds),
                    },
                };
                send(session, &status).await;
            }

            ClientMsg::CancelMatchmaking {
                participant_id,
                round_number,
            } => {
                let pid = match validate::validate_participant_id(&participant_id) {
                    Ok(pid) => pid,
                    Err(e) => return send(session, &error_msg(e.to_string())).await,
                };
                self.engine.cancel_matchmaking(pid, round_number).await;
                send(
                    session,
                    &ServerMsg::MatchmakingCancelled { round_number },
                )
                .await;
            }

            ClientMsg::GetQueueStatus { round_number } => {
                self.emit_queue_status(session, round_number).await;
            }

            ClientMsg::MatchUpdate {
                match_id,
                update_type,
                update_data,
            } => {
                let mid = match validate::validate_match_id(&match_id) {
                    Ok(mid) => mid,
                    Err(e) => return send(session, &error_msg(e.to_string())).await,
                };
                let record = match self.engine.get_match(mid).await {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        return send(session, &error_msg(format!("unknown match {mid}"))).await
                    }
                    Err(e) => {
                        log::warn!("match lookup failed for {mid}: {e}");
                        return send(session, &error_msg("match lookup failed".into())).await;
                    }
                };

                // A status field in the payload mutates the live record.
                if let Some(status) = update_data
                    .as_ref()
                    .and_then(|d| d.get("status"))
                    .and_then(|s| s.as_str())
                    .and_then(|s| MatchRecordStatus::from_str(s).ok())
                {
                    if let Err(e) = self.engine.update_match_status(mid, status).await {
                        log::warn!("match status update failed for {mid}: {e}");
                    }
                }

                let outbound = ServerMsg::MatchUpdate {
                    match_id: mid,
                    update_type,
                    update_data: update_data.unwrap_or(serde_json::Value::Null),
                    timestamp: Utc::now().to_rfc3339(),
                };
                self.push_to(record.participant1_id, &outbound).await;
                if let Some(p2) = record.participant2_id {
                    self.push_to(p2, &outbound).await;
                }
            }

            ClientMsg::UpdateStatus {
                participant_id,
                status,
            } => {
                let pid = match validate::validate_participant_id(&participant_id) {
                    Ok(pid) => pid,
                    Err(e) => return send(session, &error_msg(e.to_string())).await,
                };
                let parsed = match ParticipantStatus::from_str(&status) {
                    Ok(parsed) => parsed,
                    Err(()) => {
                        return send(session, &error_msg(format!("unknown status: {status}"))).await
                    }
                };
                if let Err(e) = self.engine.registry().set_status(pid, parsed, &[]).await {
                    log::warn!("status write failed for {pid}: {e}");
                    return send(session, &error_msg("status update failed".into())).await;
                }
                send(
                    session,
                    &ServerMsg::StatusUpdated {
                        status: parsed.as_str().into(),
                    },
                )
                .await;
            }

            ClientMsg::Ping => {
                send(session, &ServerMsg::Pong).await;
            }
        }
    }

    /// Transport-level disconnect: drop the session, cancel any search.
    pub async fn disconnect(&self, participant_id: Uuid) {
        self.sessions.remove(&participant_id);
        // Round 0 is the "any round" sentinel; the engine resolves it.
        self.engine.cancel_matchmaking(participant_id, 0).await;
        if let Err(e) = self
            .engine
            .registry()
            .set_status(participant_id, ParticipantStatus::Disconnected, &[])
            .await
        {
            log::warn!("disconnect status write failed for {participant_id}: {e}");
        }
        log::info!("participant {participant_id} disconnected");
    }

    /// Heartbeat loop: drop silent sessions, then announce the connected
    /// count to everyone still here.
    pub fn start_heartbeat(&self) {
        let weak = self.weak.clone();
        tokio::spawn(async move {
            let tick = Duration::from_millis(settings().heartbeat_interval_ms);
            loop {
                sleep(tick).await;
                let Some(dispatcher) = weak.upgrade() else { return };
                dispatcher.heartbeat_tick().await;
            }
        });
    }

    async fn heartbeat_tick(&self) {
        let cutoff =
            Utc::now() - chrono::Duration::milliseconds(settings().connection_timeout_ms as i64);
        let stale: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| entry.last_seen < cutoff)
            .map(|entry| *entry.key())
            .collect();

        for pid in stale {
            log::info!("session for {pid} timed out");
            self.sessions.remove(&pid);
            self.engine.cancel_matchmaking(pid, 0).await;
            if let Err(e) = self
                .engine
                .registry()
                .set_status(pid, ParticipantStatus::Timeout, &[])
                .await
            {
                log::warn!("timeout status write failed for {pid}: {e}");
            }
        }

        let connected = self.sessions.len();
        let beat = ServerMsg::Heartbeat {
            connected,
            timestamp: Utc::now().to_rfc3339(),
        };
        let handles: Vec<Session> = self
            .sessions
            .iter()
            .map(|entry| entry.handle.clone())
            .collect();
        for mut handle in handles {
            send(&mut handle, &beat).await;
        }
    }

    // ------------------------------------------------------------ helpers

    fn touch(&self, participant_id: Uuid) {
        if let Some(mut entry) = self.sessions.get_mut(&participant_id) {
            entry.last_seen = Utc::now();
        }
    }

    async fn emit_queue_status(&self, session: &mut Session, round_number: u32) {
        match self.engine.queue_status(round_number).await {
            Ok(status) => send(session, &ServerMsg::QueueStatusUpdate(status)).await,
            Err(e) => {
                log::warn!("queue status read failed for round {round_number}: {e}");
                send(session, &error_msg("queue status unavailable".into())).await;
            }
        }
    }

    async fn push_to(&self, participant_id: Uuid, msg: &ServerMsg) {
        let handle = self
            .sessions
            .get(&participant_id)
            .map(|entry| entry.handle.clone());
        match handle {
            Some(mut handle) => send(&mut handle, msg).await,
            None => log::debug!("no live session for {participant_id}, push dropped"),
        }
    }
}

fn error_msg(message: String) -> ServerMsg {
    ServerMsg::Error { message }
}

/// Build the per-peer `match_found` views for a record.
///
/// AI matches produce a single participant1 view with the stored opponent
/// descriptor untouched. Human matches produce two views, each naming the
/// *other* peer; display names resolve record-name → registered session name
/// → derived placeholder.
pub fn materialize_views(
    record: &MatchRecord,
    resolve_name: impl Fn(Uuid) -> Option<String>,
) -> Vec<(Uuid, MatchFoundPayload)> {
    let timestamp = Utc::now().to_rfc3339();
    let base = |opponent: String, my_role: &str| MatchFoundPayload {
        id: record.id,
        participant1_id: record.participant1_id,
        participant2_id: record.participant2_id,
        round_number: record.round_number,
        match_type: record.match_type.as_str().into(),
        status: record.status.as_str().into(),
        created_at: record.created_at.to_rfc3339(),
        is_ai: record.is_ai,
        opponent,
        my_role: my_role.into(),
        timestamp: timestamp.clone(),
        ai_settings: record.ai_settings.clone(),
    };

    let p2 = match (record.is_ai, record.participant2_id) {
        (true, _) | (false, None) => {
            return vec![(
                record.participant1_id,
                base(record.opponent.clone(), "participant1"),
            )];
        }
        (false, Some(p2)) => p2,
    };

    let p1 = record.participant1_id;
    let p1_name = record
        .participant1_name
        .clone()
        .or_else(|| resolve_name(p1))
        .unwrap_or_else(|| derived_display_name(p1));
    let p2_name = record
        .participant2_name
        .clone()
        .or_else(|| resolve_name(p2))
        .unwrap_or_else(|| derived_display_name(p2));

    // Peer skill levels ride along in the stored descriptor when present.
    let p2_skill = serde_json::from_str::<serde_json::Value>(&record.opponent)
        .ok()
        .and_then(|v| v.get("skillLevel").and_then(|s| s.as_f64()));

    let mut p2_descriptor = serde_json::json!({
        "id": p2,
        "name": p2_name,
        "isAI": false,
    });
    if let Some(skill) = p2_skill {
        p2_descriptor["skillLevel"] = serde_json::json!(skill);
    }
    let p1_descriptor = serde_json::json!({
        "id": p1,
        "name": p1_name,
        "isAI": false,
    });

    vec![
        (p1, base(p2_descriptor.to_string(), "participant1")),
        (p2, base(p1_descriptor.to_string(), "participant2")),
    ]
}

#[async_trait]
impl MatchObserver for PushDispatcher {
    async fn on_match_found(&self, record: &MatchRecord) {
        let views = materialize_views(record, |pid| {
            self.sessions
                .get(&pid)
                .and_then(|entry| entry.display_name.clone())
        });
        for (pid, payload) in views {
            self.push_to(pid, &ServerMsg::MatchFound(payload)).await;
        }
    }
}
