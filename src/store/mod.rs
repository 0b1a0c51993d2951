//! Thin typed wrapper over the shared Redis store.
//
//  Everything the matchmaking core keeps in Redis goes through here: sorted
//  sets for round queues, hashes for match/status/stat records, NX+PX strings
//  for locks. Values are always text; structured data is JSON-encoded by the
//  caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient, Script};

use crate::error::StoreError;

/// DEL the key only if it still holds the expected value (lock release).
static COMPARE_AND_DELETE: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"if redis.call('get', KEYS[1]) == ARGV[1] then
               return redis.call('del', KEYS[1])
           else
               return 0
           end"#,
    )
});

#[derive(Clone)]
pub struct SharedStore {
    client: RedisClient,
    connected: Arc<AtomicBool>,
}

impl SharedStore {
    pub fn new(client: RedisClient) -> Self {
        SharedStore {
            client,
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Last observed connection state. Callers must still tolerate a command
    /// failing afterwards; this only drives logging and health reporting.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn conn(&self) -> Result<MultiplexedConnection, StoreError> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(c) => Ok(c),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&self, e: redis::RedisError) -> StoreError {
        if self.connected.swap(false, Ordering::Relaxed) {
            log::warn!("shared store unavailable, reconnecting: {e}");
        }
        StoreError::Redis(e)
    }

    fn ok(&self) {
        if !self.connected.swap(true, Ordering::Relaxed) {
            log::info!("shared store connection restored");
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.fail(e))?;
        self.ok();
        Ok(())
    }

    // ---------- sorted sets ----------

    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.zadd(key, member, score).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(())
    }

    /// Members in ascending score order.
    pub async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn.zrange(key, start, stop).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(members)
    }

    pub async fn zrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut conn = self.conn().await?;
        let members: Vec<(String, f64)> = conn
            .zrange_withscores(key, start, stop)
            .await
            .map_err(|e| self.fail(e))?;
        self.ok();
        Ok(members)
    }

    /// Returns true when the member existed and was removed.
    pub async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.zrem(key, member).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(removed > 0)
    }

    pub async fn zcard(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn().await?;
        let n: usize = conn.zcard(key).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(n)
    }

    // ---------- hashes ----------

    pub async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.hset_multiple(key, fields).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(())
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn().await?;
        let map: HashMap<String, String> = conn.hgetall(key).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(map)
    }

    pub async fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let v: i64 = conn.hincr(key, field, by).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(v)
    }

    // ---------- strings / locks ----------

    /// SET key value NX PX ttl_ms. Returns true when the key was absent and is
    /// now set.
    pub async fn set_nx_px(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let res: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.fail(e))?;
        self.ok();
        Ok(res.is_some())
    }

    /// Atomic compare-and-delete; true when the key held `expected` and was
    /// deleted.
    pub async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let deleted: i64 = COMPARE_AND_DELETE
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| self.fail(e))?;
        self.ok();
        Ok(deleted > 0)
    }

    // ---------- keyspace ----------

    /// KEYS is O(keyspace); reserved for the periodic GC sweep.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn.keys(pattern).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(keys)
    }

    pub async fn expire(&self, key: &str, seconds: i64) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: bool = conn.expire(key, seconds).await.map_err(|e| self.fail(e))?;
        self.ok();
        Ok(())
    }
}
