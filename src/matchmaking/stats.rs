//! Daily matchmaking counters.
//
//  stats:<YYYY-MM-DD> – HASH {queue_joins, human_matches, ai_matches}
//  Buckets expire after a week.

use chrono::Utc;

use crate::error::StoreError;
use crate::store::SharedStore;

const STATS_TTL_SECS: i64 = 7 * 24 * 3_600;

pub const QUEUE_JOINS: &str = "queue_joins";
pub const HUMAN_MATCHES: &str = "human_matches";
pub const AI_MATCHES: &str = "ai_matches";

fn stats_key_today() -> String {
    format!("stats:{}", Utc::now().format("%Y-%m-%d"))
}

#[derive(Clone)]
pub struct DailyStats {
    store: SharedStore,
}

impl DailyStats {
    pub fn new(store: SharedStore) -> Self {
        DailyStats { store }
    }

    pub async fn incr(&self, counter: &str) -> Result<(), StoreError> {
        let key = stats_key_today();
        self.store.hincr(&key, counter, 1).await?;
        self.store.expire(&key, STATS_TTL_SECS).await
    }

    /// Today's value for one counter (0 when the bucket is empty).
    pub async fn today(&self, counter: &str) -> Result<i64, StoreError> {
        let fields = self.store.hgetall(&stats_key_today()).await?;
        Ok(fields
            .get(counter)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0))
    }
}
