//! Per-round FIFO waiting queue.
//
//  Redis layout
//  ------------
//  queue:round:<n> – ZSET  member = JSON-encoded QueueEntry, score = join-ms
//
//  FIFO comes from the score, never from parse order.

use chrono::Utc;
use uuid::Uuid;

use crate::config::settings;
use crate::error::StoreError;
use crate::matchmaking::registry::ParticipantRegistry;
use crate::matchmaking::types::{ParticipantStatus, QueueEntry};
use crate::store::SharedStore;

/// Sliding TTL on each round-queue key.
const QUEUE_KEY_TTL_SECS: i64 = 600;
/// Entries older than this are garbage.
const STALE_ENTRY_MS: i64 = 300_000;

pub fn queue_key(round: u32) -> String {
    format!("queue:round:{round}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Added,
    /// Participant status flipped to "matched" before the insert landed.
    AlreadyMatched,
    /// Round queue is at capacity.
    QueueFull,
}

#[derive(Clone)]
pub struct QueueService {
    store: SharedStore,
    registry: ParticipantRegistry,
}

impl QueueService {
    pub fn new(store: SharedStore, registry: ParticipantRegistry) -> Self {
        QueueService { store, registry }
    }

    /// Append a waiting entry. Guards against the enqueue-vs-match race by
    /// re-reading the participant status first, and refuses once the round
    /// queue is full. Refreshes the key TTL on success.
    pub async fn add_to_queue(&self, entry: &QueueEntry) -> Result<EnqueueOutcome, StoreError> {
        if self.registry.get_status(entry.participant_id).await? == Some(ParticipantStatus::Matched)
        {
            return Ok(EnqueueOutcome::AlreadyMatched);
        }

        let key = queue_key(entry.round_number);
        if self.store.zcard(&key).await? >= settings().max_queue_size {
            log::warn!(
                "round {} queue is full, refusing {}",
                entry.round_number,
                entry.participant_id
            );
            return Ok(EnqueueOutcome::QueueFull);
        }

        let member = serde_json::to_string(entry).map_err(|e| StoreError::Malformed {
            key: key.clone(),
            detail: e.to_string(),
        })?;
        self.store.zadd(&key, &member, entry.joined_at as f64).await?;
        self.store.expire(&key, QUEUE_KEY_TTL_SECS).await?;
        Ok(EnqueueOutcome::Added)
    }

    /// Remove the participant's entry, if any. Linear scan: entries are JSON
    /// blobs, so the member string has to be matched by its parsed id.
    pub async fn remove_from_queue(
        &self,
        round: u32,
        participant_id: Uuid,
    ) -> Result<bool, StoreError> {
        let key = queue_key(round);
        for raw in self.store.zrange(&key, 0, -1).await? {
            if let Ok(entry) = serde_json::from_str::<QueueEntry>(&raw) {
                if entry.participant_id == participant_id {
                    return self.store.zrem(&key, &raw).await;
                }
            }
        }
        Ok(false)
    }

    /// Entries in FIFO order, optionally excluding one participant. Malformed
    /// members are skipped, not fatal.
    pub async fn get_queue_entries(
        &self,
        round: u32,
        exclude: Option<Uuid>,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let key = queue_key(round);
        let mut entries = Vec::new();
        for raw in self.store.zrange(&key, 0, -1).await? {
            match serde_json::from_str::<QueueEntry>(&raw) {
                Ok(entry) => {
                    if exclude != Some(entry.participant_id) {
                        entries.push(entry);
                    }
                }
                Err(e) => log::warn!("skipping malformed queue entry in {key}: {e}"),
            }
        }
        Ok(entries)
    }

    /// 1-based FIFO position, or -1 when the participant is not queued.
    pub async fn get_queue_position(
        &self,
        round: u32,
        participant_id: Uuid,
    ) -> Result<i64, StoreError> {
        let entries = self.get_queue_entries(round, None).await?;
        Ok(entries
            .iter()
            .position(|e| e.participant_id == participant_id)
            .map(|idx| idx as i64 + 1)
            .unwrap_or(-1))
    }

    pub async fn get_queue_size(&self, round: u32) -> Result<usize, StoreError> {
        self.store.zcard(&queue_key(round)).await
    }

    /// Drop entries older than five minutes from every round queue. Returns
    /// how many entries were removed.
    pub async fn cleanup_expired_queues(&self) -> Result<usize, StoreError> {
        let cutoff = Utc::now().timestamp_millis() - STALE_ENTRY_MS;
        let mut removed = 0usize;
        for key in self.store.keys("queue:round:*").await? {
            for (raw, score) in self.store.zrange_withscores(&key, 0, -1).await? {
                if (score as i64) < cutoff && self.store.zrem(&key, &raw).await? {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            log::info!("queue GC removed {removed} stale entries");
        }
        Ok(removed)
    }
}
