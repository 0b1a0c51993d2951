//! Best-effort durable mirror of live match state.
//
//  The shared store stays authoritative while a match is live; everything in
//  here exists for analytics and recovery. Callers on the pairing hot path
//  treat every failure as non-fatal.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::time::sleep;
use uuid::Uuid;

use crate::matchmaking::types::MatchRecord;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Retry with exponential backoff for critical writes (3 attempts, base 1 s).
pub async fn with_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut last_err = None;
    for attempt in 1..=RETRY_ATTEMPTS {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                log::warn!("{what}: attempt {attempt}/{RETRY_ATTEMPTS} failed: {e:?}");
                last_err = Some(e);
            }
        }
        if attempt < RETRY_ATTEMPTS {
            sleep(delay).await;
            delay *= 2;
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("{what}: retries exhausted")))
}

/// A mirrored match row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredMatch {
    pub match_id: Uuid,
    pub participant1_id: Uuid,
    pub participant2_id: Option<Uuid>,
    pub round_number: i32,
    pub match_type: String,
    pub status: String,
    pub is_ai: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParticipantRow {
    pub id: Uuid,
    pub display_name: Option<String>,
}

/// Aggregates used to derive a skill level from recent answers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParticipantStats {
    pub games_played: i64,
    pub avg_accuracy: f64,
}

impl ParticipantStats {
    /// Map average accuracy onto the 1–10 skill scale.
    pub fn skill_level(&self) -> f64 {
        (self.avg_accuracy * 10.0).clamp(1.0, 10.0)
    }
}

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Idempotent upsert keyed on the match id.
    async fn create_tournament_match(&self, record: &MatchRecord) -> Result<()>;

    async fn update_tournament_match(
        &self,
        match_id: Uuid,
        status: &str,
        extras: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Most recent active/pending match for (participant, round), if any.
    async fn get_active_match_for_participant(
        &self,
        participant_id: Uuid,
        round: u32,
    ) -> Result<Option<StoredMatch>>;

    async fn get_participant(&self, id: Uuid) -> Result<Option<ParticipantRow>>;

    async fn get_participant_stats(&self, id: Uuid) -> Result<Option<ParticipantStats>>;

    async fn record_activity(
        &self,
        participant_id: Uuid,
        kind: &str,
        detail: serde_json::Value,
    ) -> Result<()>;

    async fn record_match_result(
        &self,
        match_id: Uuid,
        winner_id: Option<Uuid>,
        detail: serde_json::Value,
    ) -> Result<()>;

    async fn get_match_history(&self, participant_id: Uuid, limit: i64)
        -> Result<Vec<StoredMatch>>;
}

/// Postgres-backed sink.
#[derive(Clone)]
pub struct PgPersistence {
    pool: PgPool,
}

impl PgPersistence {
    pub fn new(pool: PgPool) -> Self {
        PgPersistence { pool }
    }
}

#[async_trait]
impl PersistenceSink for PgPersistence {
    async fn create_tournament_match(&self, record: &MatchRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO tournament_matches
                   (match_id, participant1_id, participant2_id, round_number,
                    match_type, status, is_ai, opponent_data, ai_settings, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               ON CONFLICT (match_id) DO UPDATE
                 SET status = EXCLUDED.status,
                     opponent_data = EXCLUDED.opponent_data,
                     ai_settings = EXCLUDED.ai_settings"#,
        )
        .bind(record.id)
        .bind(record.participant1_id)
        .bind(record.participant2_id)
        .bind(record.round_number as i32)
        .bind(record.match_type.as_str())
        .bind(record.status.as_str())
        .bind(record.is_ai)
        .bind(&record.opponent)
        .bind(record.ai_settings.as_deref())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_tournament_match(
        &self,
        match_id: Uuid,
        status: &str,
        extras: Option<serde_json::Value>,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE tournament_matches
                  SET status = $2,
                      extras = COALESCE($3, extras),
                      updated_at = now()
                WHERE match_id = $1"#,
        )
        .bind(match_id)
        .bind(status)
        .bind(extras)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_active_match_for_participant(
        &self,
        participant_id: Uuid,
        round: u32,
    ) -> Result<Option<StoredMatch>> {
        let rows: Vec<StoredMatch> = sqlx::query_as(
            r#"SELECT match_id, participant1_id, participant2_id, round_number,
                      match_type, status, is_ai, created_at
                 FROM tournament_matches
                WHERE (participant1_id = $1 OR participant2_id = $1)
                  AND round_number = $2
                  AND status IN ('active', 'pending')
                ORDER BY created_at DESC"#,
        )
        .bind(participant_id)
        .bind(round as i32)
        .fetch_all(&self.pool)
        .await?;

        if rows.len() > 1 {
            log::warn!(
                "participant {participant_id} has {} active matches in round {round}",
                rows.len()
            );
        }
        Ok(rows.into_iter().next())
    }

    async fn get_participant(&self, id: Uuid) -> Result<Option<ParticipantRow>> {
        let row: Option<ParticipantRow> =
            sqlx::query_as("SELECT id, display_name FROM participants WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn get_participant_stats(&self, id: Uuid) -> Result<Option<ParticipantStats>> {
        let row: Option<ParticipantStats> = sqlx::query_as(
            r#"SELECT COUNT(*) AS games_played,
                      COALESCE(AVG(CASE WHEN is_correct THEN 1.0 ELSE 0.0 END), 0.5)::float8 AS avg_accuracy
                 FROM participant_answers
                WHERE participant_id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn record_activity(
        &self,
        participant_id: Uuid,
        kind: &str,
        detail: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO participant_activity (participant_id, kind, detail, created_at)
               VALUES ($1, $2, $3, now())"#,
        )
        .bind(participant_id)
        .bind(kind)
        .bind(detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_match_result(
        &self,
        match_id: Uuid,
        winner_id: Option<Uuid>,
        detail: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE tournament_matches
                  SET status = 'completed', winner_id = $2, result = $3, updated_at = now()
                WHERE match_id = $1"#,
        )
        .bind(match_id)
        .bind(winner_id)
        .bind(detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_match_history(
        &self,
        participant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StoredMatch>> {
        let rows: Vec<StoredMatch> = sqlx::query_as(
            r#"SELECT match_id, participant1_id, participant2_id, round_number,
                      match_type, status, is_ai, created_at
                 FROM tournament_matches
                WHERE participant1_id = $1 OR participant2_id = $1
                ORDER BY created_at DESC
                LIMIT $2"#,
        )
        .bind(participant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
