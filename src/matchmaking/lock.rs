//! Distributed pairing lock.
//
//  matchlock:round:<n> – STRING owner-token, PX 5000
//
//  The TTL is only the crash safety net; a healthy holder releases
//  explicitly via compare-and-delete so it can never drop someone else's
//  re-acquired lock.

use uuid::Uuid;

use crate::error::StoreError;
use crate::store::SharedStore;

/// Bounds the stall from a crashed pair attempt.
pub const MATCH_LOCK_TTL_MS: u64 = 5_000;

pub fn lock_key(round: u32) -> String {
    format!("matchlock:round:{round}")
}

#[derive(Clone)]
pub struct LockService {
    store: SharedStore,
}

impl LockService {
    pub fn new(store: SharedStore) -> Self {
        LockService { store }
    }

    /// Mint a fresh owner token for one acquire/release cycle.
    pub fn new_token() -> String {
        Uuid::new_v4().to_string()
    }

    /// True when the named lock was free and is now ours.
    pub async fn acquire(&self, key: &str, token: &str, ttl_ms: u64) -> Result<bool, StoreError> {
        self.store.set_nx_px(key, token, ttl_ms).await
    }

    /// True when we still held the lock and deleted it. A lock taken over by
    /// another owner (after our TTL lapsed) is left untouched.
    pub async fn release(&self, key: &str, token: &str) -> Result<bool, StoreError> {
        self.store.compare_and_delete(key, token).await
    }
}
