//! Participant status registry.
//
//  participant:<id>:status – HASH {status, last_updated, match_id?, ...}
//  TTL one hour, renewed on every write.

use chrono::Utc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::matchmaking::types::ParticipantStatus;
use crate::store::SharedStore;

const STATUS_TTL_SECS: i64 = 3_600;

pub fn status_key(participant_id: Uuid) -> String {
    format!("participant:{participant_id}:status")
}

#[derive(Clone)]
pub struct ParticipantRegistry {
    store: SharedStore,
}

impl ParticipantRegistry {
    pub fn new(store: SharedStore) -> Self {
        ParticipantRegistry { store }
    }

    /// Write the participant's status plus any extra metadata fields.
    pub async fn set_status(
        &self,
        participant_id: Uuid,
        status: ParticipantStatus,
        extra: &[(String, String)],
    ) -> Result<(), StoreError> {
        let key = status_key(participant_id);
        let mut fields = vec![
            ("status".to_string(), status.as_str().to_string()),
            ("last_updated".to_string(), Utc::now().to_rfc3339()),
        ];
        fields.extend_from_slice(extra);
        self.store.hset_all(&key, &fields).await?;
        self.store.expire(&key, STATUS_TTL_SECS).await
    }

    /// Convenience for the common "matched, here is your match id" write.
    pub async fn set_matched(&self, participant_id: Uuid, match_id: Uuid) -> Result<(), StoreError> {
        self.set_status(
            participant_id,
            ParticipantStatus::Matched,
            &[("match_id".to_string(), match_id.to_string())],
        )
        .await
    }

    pub async fn get_status(
        &self,
        participant_id: Uuid,
    ) -> Result<Option<ParticipantStatus>, StoreError> {
        let fields = self.store.hgetall(&status_key(participant_id)).await?;
        Ok(fields.get("status").and_then(|s| s.parse().ok()))
    }
}
