//! Real-time tournament matchmaking service for the behavioral-economics
//! experiment platform.
//
//  Participants enter round queues over a WS push channel; the engine pairs
//  them with a skill-comparable human inside a bounded window, or with a
//  simulated opponent when nobody suitable shows up.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod matchmaking;
pub mod metrics;
pub mod persistence;
pub mod protocol;
pub mod store;
pub mod validate;
pub mod ws;
