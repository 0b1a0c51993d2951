//! Runtime configuration for the tournament matchmaking server.

use once_cell::sync::Lazy;
use std::env;

/// Hard ceiling on the AI-fallback deadline, whatever the env says.
const MAX_HUMAN_SEARCH_TIMEOUT_MS: u64 = 180_000;

#[derive(Debug)]
pub struct Settings {
    /// Deadline after which a searching participant is paired with an AI (ms).
    pub human_search_timeout_ms: u64,
    /// Continuous-scan tick (ms).
    pub search_interval_ms: u64,
    /// Scan attempts before an early AI fallback on a quiet round.
    pub min_search_attempts: u32,
    /// Skill-window radius for human pairing.
    pub skill_matching_threshold: f64,
    /// Enqueue is refused once a round queue holds this many entries.
    pub max_queue_size: usize,
    /// Dispatcher heartbeat tick (ms).
    pub heartbeat_interval_ms: u64,
    /// Push sessions silent longer than this are dropped (ms).
    pub connection_timeout_ms: u64,
}

impl Settings {
    fn from_env() -> Self {
        let human_search_timeout_ms = env::var("HUMAN_SEARCH_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(45_000)
            .min(MAX_HUMAN_SEARCH_TIMEOUT_MS);

        let search_interval_ms = env::var("SEARCH_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3_000);

        let min_search_attempts = env::var("MIN_SEARCH_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let skill_matching_threshold = env::var("SKILL_MATCHING_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(1.5);

        let max_queue_size = env::var("MAX_QUEUE_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1_000);

        let heartbeat_interval_ms = env::var("HEARTBEAT_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30_000);

        let connection_timeout_ms = env::var("CONNECTION_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60_000);

        Settings {
            human_search_timeout_ms,
            search_interval_ms,
            min_search_attempts,
            skill_matching_threshold,
            max_queue_size,
            heartbeat_interval_ms,
            connection_timeout_ms,
        }
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);

pub fn settings() -> &'static Settings {
    &SETTINGS
}
