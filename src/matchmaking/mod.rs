//! Matchmaking engine: search lifecycle, pairing, AI fallback.
//
//  Each searching participant drives three cooperating pieces:
//    - an opportunistic immediate pair attempt at start-search,
//    - a periodic re-scan until a pair lands or the search dies,
//    - a one-shot AI-fallback timer bounding the whole thing.
//
//  Pair attempts on a round are serialized through matchlock:round:<n>, so
//  two server instances can run this engine against the same store.

pub mod ai;
pub mod lock;
pub mod queue;
pub mod registry;
pub mod stats;
pub mod types;

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::settings;
use crate::error::{EngineError, StoreError};
use crate::persistence::{with_retry, PersistenceSink};
use crate::store::SharedStore;

use lock::{lock_key, LockService, MATCH_LOCK_TTL_MS};
use queue::{EnqueueOutcome, QueueService};
use registry::ParticipantRegistry;
use stats::DailyStats;
use types::{
    derived_display_name, first_within_window, match_key, MatchRecord, MatchRecordStatus,
    MatchType, ParticipantStatus, QueueEntry, QueueStatus, StartRequest,
};

/// Live match hashes auto-expire after two hours.
const MATCH_TTL_SECS: i64 = 7_200;
/// Active searches older than this are purged by the cleanup loop.
const STALE_SEARCH_SECS: i64 = 600;
/// Cleanup loop tick.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
/// A queue entry counts as "recent company" for this long.
const RECENT_ENTRY_MS: i64 = 300_000;

/// Narrow port through which the engine pushes match events without knowing
/// the transport. The dispatcher implements it.
#[async_trait]
pub trait MatchObserver: Send + Sync {
    async fn on_match_found(&self, record: &MatchRecord);
}

/// First response to a start-search request.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A search for this participant is already running.
    AlreadySearching,
    /// Status flipped to "matched" while we were enqueueing.
    AlreadyMatched,
    /// Paired immediately (human, or degraded to AI).
    Matched(MatchRecord),
    /// No pair yet; scanner and fallback timer are running.
    Searching {
        queue_position: i64,
        estimated_wait_seconds: u64,
    },
}

/// In-process record of one ongoing search.
#[derive(Debug, Clone)]
struct ActiveSearch {
    round_number: u32,
    skill_level: f64,
    treatment_group: types::TreatmentGroup,
    participant_name: Option<String>,
    started_at: DateTime<Utc>,
    attempts: u32,
}

pub struct MatchmakingEngine {
    weak: Weak<MatchmakingEngine>,
    store: SharedStore,
    queue: QueueService,
    locks: LockService,
    registry: ParticipantRegistry,
    stats: DailyStats,
    persistence: Arc<dyn PersistenceSink>,
    observer: OnceCell<Arc<dyn MatchObserver>>,
    searches: DashMap<Uuid, ActiveSearch>,
    fallback_timers: DashMap<Uuid, JoinHandle<()>>,
}

impl MatchmakingEngine {
    pub fn new(store: SharedStore, persistence: Arc<dyn PersistenceSink>) -> Arc<Self> {
        let registry = ParticipantRegistry::new(store.clone());
        Arc::new_cyclic(|weak| MatchmakingEngine {
            weak: weak.clone(),
            queue: QueueService::new(store.clone(), registry.clone()),
            locks: LockService::new(store.clone()),
            registry,
            stats: DailyStats::new(store.clone()),
            store,
            persistence,
            observer: OnceCell::new(),
            searches: DashMap::new(),
            fallback_timers: DashMap::new(),
        })
    }

    /// Wire the push side in. Set once at startup, before any search starts.
    pub fn set_observer(&self, observer: Arc<dyn MatchObserver>) {
        if self.observer.set(observer).is_err() {
            log::warn!("match observer was already set, ignoring replacement");
        }
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    // ---------------------------------------------------------------- start

    /// Register a search, enqueue, try to pair right away, otherwise arm the
    /// scanner and the AI-fallback timer. Unrecoverable errors degrade to an
    /// immediate AI match rather than leaving the participant hanging.
    pub async fn start_matchmaking(&self, req: StartRequest) -> StartOutcome {
        let pid = req.participant_id;
        if self.searches.contains_key(&pid) {
            return StartOutcome::AlreadySearching;
        }

        self.searches.insert(
            pid,
            ActiveSearch {
                round_number: req.round_number,
                skill_level: req.skill_level,
                treatment_group: req.treatment_group,
                participant_name: req.participant_name.clone(),
                started_at: Utc::now(),
                attempts: 0,
            },
        );

        match self.begin_search(&req).await {
            Ok(Some(record)) => {
                // create_human_match already cleared both searches.
                self.notify(&record).await;
                StartOutcome::Matched(record)
            }
            Ok(None) => {
                self.spawn_continuous_search(pid);
                self.arm_fallback_timer(pid);
                let queue_position = self
                    .queue
                    .get_queue_position(req.round_number, pid)
                    .await
                    .unwrap_or(-1);
                StartOutcome::Searching {
                    queue_position,
                    estimated_wait_seconds: estimate_wait_seconds(queue_position),
                }
            }
            Err(EngineError::AlreadyMatched(_)) => {
                self.clear_search_record(pid);
                StartOutcome::AlreadyMatched
            }
            Err(e) => {
                log::error!("start-search failed for {pid}: {e}; degrading to AI match");
                let record = self
                    .create_ai_match(pid, req.participant_name, req.round_number, req.skill_level)
                    .await;
                self.notify(&record).await;
                StartOutcome::Matched(record)
            }
        }
    }

    async fn begin_search(&self, req: &StartRequest) -> Result<Option<MatchRecord>, EngineError> {
        let pid = req.participant_id;

        self.registry
            .set_status(
                pid,
                ParticipantStatus::Searching,
                &[
                    ("round_number".into(), req.round_number.to_string()),
                    ("skill_level".into(), req.skill_level.to_string()),
                    ("treatment_group".into(), req.treatment_group.to_string()),
                ],
            )
            .await?;

        // A participant holds at most one entry per round queue.
        self.queue.remove_from_queue(req.round_number, pid).await?;

        let entry = QueueEntry {
            participant_id: pid,
            participant_name: req.participant_name.clone(),
            round_number: req.round_number,
            skill_level: req.skill_level,
            treatment_group: req.treatment_group,
            joined_at: Utc::now().timestamp_millis(),
            status: "waiting".into(),
        };
        match self.queue.add_to_queue(&entry).await? {
            EnqueueOutcome::Added => {
                if let Err(e) = self.stats.incr(stats::QUEUE_JOINS).await {
                    log::debug!("stats increment failed: {e}");
                }
            }
            EnqueueOutcome::AlreadyMatched => return Err(EngineError::AlreadyMatched(pid)),
            EnqueueOutcome::QueueFull => return Err(EngineError::QueueFull(req.round_number)),
        }

        self.find_immediate_match(&entry).await
    }

    // ------------------------------------------------------------- pairing

    /// One pair attempt under the round lock. Lock contention is not an
    /// error; the caller simply retries on its next tick.
    pub async fn find_immediate_match(
        &self,
        entry: &QueueEntry,
    ) -> Result<Option<MatchRecord>, EngineError> {
        let key = lock_key(entry.round_number);
        let token = LockService::new_token();
        if !self.locks.acquire(&key, &token, MATCH_LOCK_TTL_MS).await? {
            log::debug!("round {} pair lock contended", entry.round_number);
            return Ok(None);
        }

        let outcome = self.pair_under_lock(entry).await;

        // Release no matter how pairing went; the TTL covers a failure here.
        match self.locks.release(&key, &token).await {
            Ok(false) => log::warn!("pair lock for round {} expired under us", entry.round_number),
            Err(e) => log::warn!("pair lock release failed: {e}"),
            Ok(true) => {}
        }

        outcome
    }

    async fn pair_under_lock(
        &self,
        entry: &QueueEntry,
    ) -> Result<Option<MatchRecord>, EngineError> {
        let mut candidates = self
            .queue
            .get_queue_entries(entry.round_number, Some(entry.participant_id))
            .await?;

        let threshold = settings().skill_matching_threshold;
        loop {
            let Some(idx) =
                first_within_window(entry.skill_level, threshold, &candidates, |c| c.skill_level)
            else {
                return Ok(None);
            };
            let candidate = candidates.remove(idx);

            // The entry may have gone stale between enqueue and now
            // (cancelled, disconnected, matched elsewhere). Pairing a stale
            // entry would push match_found to someone who already left.
            match self.registry.get_status(candidate.participant_id).await? {
                Some(ParticipantStatus::Searching) => {
                    // The earlier-queued side is participant1.
                    return self.create_human_match(&candidate, entry).await.map(Some);
                }
                status => {
                    log::debug!(
                        "skipping stale queue entry {} ({status:?})",
                        candidate.participant_id
                    );
                    let _ = self
                        .queue
                        .remove_from_queue(candidate.round_number, candidate.participant_id)
                        .await;
                }
            }
        }
    }

    /// Write a live-human match and flip both sides over. Caller must hold
    /// the round lock; `a` is the waiting candidate, `b` the searcher that
    /// found them.
    async fn create_human_match(
        &self,
        a: &QueueEntry,
        b: &QueueEntry,
    ) -> Result<MatchRecord, EngineError> {
        if a.participant_id == b.participant_id {
            return Err(EngineError::SelfMatch(a.participant_id));
        }

        let a_name = self.resolve_display_name(a).await;
        let b_name = self.resolve_display_name(b).await;

        let opponent = json!({
            "id": b.participant_id,
            "name": b_name,
            "skillLevel": b.skill_level,
            "isAI": false,
        });

        let record = MatchRecord {
            id: Uuid::new_v4(),
            participant1_id: a.participant_id,
            participant2_id: Some(b.participant_id),
            participant1_name: Some(a_name),
            participant2_name: Some(b_name),
            round_number: a.round_number,
            match_type: MatchType::LiveHuman,
            status: MatchRecordStatus::Active,
            created_at: Utc::now(),
            is_ai: false,
            opponent: opponent.to_string(),
            ai_settings: None,
        };

        self.store_match(&record).await?;
        self.mirror(&record).await;

        self.registry.set_matched(a.participant_id, record.id).await?;
        self.registry.set_matched(b.participant_id, record.id).await?;

        self.queue
            .remove_from_queue(a.round_number, a.participant_id)
            .await?;
        self.queue
            .remove_from_queue(b.round_number, b.participant_id)
            .await?;

        // Both searches are over; b's scanner and timer must not fire again.
        self.clear_search(a.participant_id);
        self.clear_search(b.participant_id);

        if let Err(e) = self.stats.incr(stats::HUMAN_MATCHES).await {
            log::debug!("stats increment failed: {e}");
        }

        log::info!(
            "human match {} created: {} vs {} (round {})",
            record.id,
            a.participant_id,
            b.participant_id,
            a.round_number
        );
        Ok(record)
    }

    async fn resolve_display_name(&self, entry: &QueueEntry) -> String {
        if let Some(name) = &entry.participant_name {
            return name.clone();
        }
        match self.persistence.get_participant(entry.participant_id).await {
            Ok(Some(row)) => row
                .display_name
                .unwrap_or_else(|| derived_display_name(entry.participant_id)),
            _ => derived_display_name(entry.participant_id),
        }
    }

    // ------------------------------------------------------------ AI match

    /// Pair the participant with a simulated opponent. Never fails from the
    /// caller's point of view: store errors are logged and the assembled
    /// match is returned anyway so the participant always gets an opponent.
    pub async fn create_ai_match(
        &self,
        participant_id: Uuid,
        participant_name: Option<String>,
        round_number: u32,
        skill_level: f64,
    ) -> MatchRecord {
        self.clear_search(participant_id);

        let record = ai::create_ai_match(
            participant_id,
            participant_name,
            round_number,
            skill_level,
            settings().skill_matching_threshold,
        );

        if let Err(e) = self.persist_ai_match(&record).await {
            log::error!(
                "AI match {} for {participant_id} not fully recorded: {e}",
                record.id
            );
        }

        log::info!(
            "AI match {} created for {participant_id} (round {round_number})",
            record.id
        );
        record
    }

    async fn persist_ai_match(&self, record: &MatchRecord) -> Result<(), EngineError> {
        self.queue
            .remove_from_queue(record.round_number, record.participant1_id)
            .await?;
        self.store_match(record).await?;
        self.mirror(record).await;
        self.registry
            .set_matched(record.participant1_id, record.id)
            .await?;
        if let Err(e) = self.stats.incr(stats::AI_MATCHES).await {
            log::debug!("stats increment failed: {e}");
        }
        Ok(())
    }

    // ------------------------------------------------------------- cancel

    /// Stop a search. `round_number` 0 is the disconnect sentinel meaning
    /// "whatever round they were in"; the engine resolves it from its own
    /// search record.
    pub async fn cancel_matchmaking(&self, participant_id: Uuid, round_number: u32) -> bool {
        let search = self.searches.remove(&participant_id).map(|(_, s)| s);
        self.cancel_fallback_timer(participant_id);

        let round = if round_number == 0 {
            search.as_ref().map(|s| s.round_number)
        } else {
            Some(round_number)
        };
        if let Some(round) = round {
            if let Err(e) = self.queue.remove_from_queue(round, participant_id).await {
                log::warn!("dequeue on cancel failed for {participant_id}: {e}");
            }
        }

        if let Err(e) = self
            .registry
            .set_status(participant_id, ParticipantStatus::Cancelled, &[])
            .await
        {
            log::warn!("status write on cancel failed for {participant_id}: {e}");
        }

        search.is_some()
    }

    // -------------------------------------------------------- match access

    pub async fn get_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        let key = match_key(match_id);
        let fields = self.store.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        MatchRecord::from_fields(&key, &fields).map(Some)
    }

    /// Dedicated status mutation; mirrored to persistence best-effort.
    pub async fn update_match_status(
        &self,
        match_id: Uuid,
        status: MatchRecordStatus,
    ) -> Result<(), StoreError> {
        let key = match_key(match_id);
        self.store
            .hset_all(&key, &[("status".into(), status.as_str().into())])
            .await?;
        if let Err(e) = self
            .persistence
            .update_tournament_match(match_id, status.as_str(), None)
            .await
        {
            log::warn!("persistence mirror of status change failed for {match_id}: {e:?}");
        }
        Ok(())
    }

    async fn store_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        let key = match_key(record.id);
        self.store.hset_all(&key, &record.to_fields()).await?;
        self.store.expire(&key, MATCH_TTL_SECS).await
    }

    /// Best-effort mirror; live state in the shared store stays
    /// authoritative whatever happens here.
    async fn mirror(&self, record: &MatchRecord) {
        let sink = &self.persistence;
        if let Err(e) = with_retry("mirror tournament match", || {
            sink.create_tournament_match(record)
        })
        .await
        {
            log::warn!("persistence mirror failed for match {}: {e:?}", record.id);
        }
    }

    // -------------------------------------------------------- queue status

    pub async fn queue_status(&self, round_number: u32) -> Result<QueueStatus, StoreError> {
        let entries = self.queue.get_queue_entries(round_number, None).await?;
        let now_ms = Utc::now().timestamp_millis();
        let average_wait_time = if entries.is_empty() {
            0
        } else {
            let total: i64 = entries.iter().map(|e| (now_ms - e.joined_at).max(0)).sum();
            (total / entries.len() as i64 / 1_000) as u64
        };

        let human = self.stats.today(stats::HUMAN_MATCHES).await.unwrap_or(0);
        let ai_matches = self.stats.today(stats::AI_MATCHES).await.unwrap_or(0);

        Ok(QueueStatus {
            round_number,
            total_waiting: entries.len(),
            average_wait_time,
            recent_matches: human + ai_matches,
            estimated_wait_time: estimate_wait_seconds(entries.len() as i64 + 1),
        })
    }

    // ------------------------------------------------- background machinery

    /// Periodic re-scan for one participant, every `search_interval_ms`.
    /// Exits as soon as the search record disappears or a status flip is
    /// observed; a scan failure is logged and retried on the next tick.
    fn spawn_continuous_search(&self, participant_id: Uuid) {
        let weak = self.weak.clone();
        tokio::spawn(async move {
            let tick = Duration::from_millis(settings().search_interval_ms);
            loop {
                sleep(tick).await;
                let Some(engine) = weak.upgrade() else { return };
                if !engine.continuous_search_tick(participant_id).await {
                    return;
                }
            }
        });
    }

    /// One scanner tick. Returns false when the loop should stop.
    async fn continuous_search_tick(&self, participant_id: Uuid) -> bool {
        // Snapshot under the map guard, then let go before any await.
        let snapshot = match self.searches.get_mut(&participant_id) {
            Some(mut search) => {
                search.attempts += 1;
                search.value().clone()
            }
            None => return false,
        };

        match self.registry.get_status(participant_id).await {
            Ok(Some(ParticipantStatus::Matched)) | Ok(Some(ParticipantStatus::Matching)) => {
                self.clear_search(participant_id);
                return false;
            }
            Err(e) => {
                log::debug!("scanner status read failed for {participant_id}: {e}");
                return true;
            }
            _ => {}
        }

        // Another instance may have paired us and already mirrored the
        // match; the mirror is the only place that outlives its store TTLs.
        if let Ok(Some(stored)) = self
            .persistence
            .get_active_match_for_participant(participant_id, snapshot.round_number)
            .await
        {
            log::info!(
                "scanner found mirrored match {} for {participant_id}, syncing",
                stored.match_id
            );
            if let Err(e) = self
                .registry
                .set_matched(participant_id, stored.match_id)
                .await
            {
                log::warn!("status sync failed for {participant_id}: {e}");
            }
            self.clear_search(participant_id);
            return false;
        }

        let entry = QueueEntry {
            participant_id,
            participant_name: snapshot.participant_name.clone(),
            round_number: snapshot.round_number,
            skill_level: snapshot.skill_level,
            treatment_group: snapshot.treatment_group,
            joined_at: snapshot.started_at.timestamp_millis(),
            status: "waiting".into(),
        };
        match self.find_immediate_match(&entry).await {
            Ok(Some(record)) => {
                self.notify(&record).await;
                return false;
            }
            Ok(None) => {}
            Err(EngineError::SelfMatch(pid)) => {
                // Hard fault for the attempt; the scanner itself survives.
                log::error!("self-match attempt detected for {pid}");
            }
            Err(e) => log::warn!("scan tick failed for {participant_id}: {e}"),
        }

        // A long-quiet round is not worth waiting out the full deadline.
        if snapshot.attempts >= settings().min_search_attempts {
            let others = self
                .queue
                .get_queue_entries(snapshot.round_number, Some(participant_id))
                .await
                .unwrap_or_default();
            let now_ms = Utc::now().timestamp_millis();
            let any_recent = others.iter().any(|e| now_ms - e.joined_at < RECENT_ENTRY_MS);
            if !any_recent {
                log::info!(
                    "round {} is quiet after {} attempts, early AI fallback for {participant_id}",
                    snapshot.round_number,
                    snapshot.attempts
                );
                let record = self
                    .create_ai_match(
                        participant_id,
                        snapshot.participant_name,
                        snapshot.round_number,
                        snapshot.skill_level,
                    )
                    .await;
                self.notify(&record).await;
                return false;
            }
        }

        true
    }

    /// One-shot deadline: if the search is still alive when it fires, the
    /// participant gets an AI opponent.
    fn arm_fallback_timer(&self, participant_id: Uuid) {
        let weak = self.weak.clone();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(settings().human_search_timeout_ms)).await;
            let Some(engine) = weak.upgrade() else { return };

            // Drop our own handle without aborting ourselves.
            engine.fallback_timers.remove(&participant_id);

            let Some(search) = engine
                .searches
                .get(&participant_id)
                .map(|s| s.value().clone())
            else {
                return;
            };
            log::info!("human search timed out for {participant_id}, falling back to AI");
            let record = engine
                .create_ai_match(
                    participant_id,
                    search.participant_name,
                    search.round_number,
                    search.skill_level,
                )
                .await;
            engine.notify(&record).await;
        });
        if let Some(old) = self.fallback_timers.insert(participant_id, handle) {
            old.abort();
        }
    }

    /// Every five minutes: drop stale search records and GC old queue
    /// entries.
    pub fn start_cleanup_task(&self) {
        let weak = self.weak.clone();
        tokio::spawn(async move {
            loop {
                sleep(CLEANUP_INTERVAL).await;
                let Some(engine) = weak.upgrade() else { return };

                let cutoff = Utc::now() - chrono::Duration::seconds(STALE_SEARCH_SECS);
                let stale: Vec<Uuid> = engine
                    .searches
                    .iter()
                    .filter(|entry| entry.started_at < cutoff)
                    .map(|entry| *entry.key())
                    .collect();
                for pid in stale {
                    log::warn!("purging stale search for {pid}");
                    engine.clear_search(pid);
                }

                if let Err(e) = engine.queue.cleanup_expired_queues().await {
                    log::warn!("queue GC failed: {e}");
                }
            }
        });
    }

    // ------------------------------------------------------------ plumbing

    fn clear_search_record(&self, participant_id: Uuid) {
        self.searches.remove(&participant_id);
    }

    fn cancel_fallback_timer(&self, participant_id: Uuid) {
        if let Some((_, handle)) = self.fallback_timers.remove(&participant_id) {
            handle.abort();
        }
    }

    fn clear_search(&self, participant_id: Uuid) {
        self.clear_search_record(participant_id);
        self.cancel_fallback_timer(participant_id);
    }

    async fn notify(&self, record: &MatchRecord) {
        match self.observer.get() {
            Some(observer) => observer.on_match_found(record).await,
            None => log::warn!("match {} found but no observer is wired", record.id),
        }
    }
}

/// Rough projection from queue position, capped at the fallback deadline.
fn estimate_wait_seconds(queue_position: i64) -> u64 {
    let position = queue_position.max(1) as u64;
    (position * 15).min(settings().human_search_timeout_ms / 1_000)
}
