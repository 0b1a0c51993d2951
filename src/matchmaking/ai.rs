//! Simulated opponents.
//
//  A static roster stands in for a human pool when nobody suitable is
//  waiting. Selection reuses the same skill-window rule as human pairing;
//  response simulation is parameterized by personality and speed class.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matchmaking::types::{
    select_by_skill_window, MatchRecord, MatchRecordStatus, MatchType,
};

/// Per-match jitter applied to an opponent's base skill.
const SKILL_JITTER: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    Competitive,
    Collaborative,
    Analytical,
}

struct PersonalityProfile {
    base_accuracy: f64,
    variance: f64,
    slow_start: bool,
    improves_over_time: bool,
    adapts_to_opponent: bool,
}

impl Personality {
    fn profile(&self) -> PersonalityProfile {
        match self {
            Personality::Competitive => PersonalityProfile {
                base_accuracy: 0.85,
                variance: 0.10,
                slow_start: false,
                improves_over_time: true,
                adapts_to_opponent: true,
            },
            Personality::Collaborative => PersonalityProfile {
                base_accuracy: 0.80,
                variance: 0.08,
                slow_start: false,
                improves_over_time: false,
                adapts_to_opponent: false,
            },
            Personality::Analytical => PersonalityProfile {
                base_accuracy: 0.88,
                variance: 0.05,
                slow_start: true,
                improves_over_time: true,
                adapts_to_opponent: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    Fast,
    Medium,
    Slow,
}

impl ResponseClass {
    /// Inclusive response-time bounds in milliseconds.
    pub fn range_ms(&self) -> (u64, u64) {
        match self {
            ResponseClass::Fast => (800, 2_000),
            ResponseClass::Medium => (2_000, 4_000),
            ResponseClass::Slow => (4_000, 7_000),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AiOpponent {
    pub id: &'static str,
    pub display_name: &'static str,
    pub base_skill: f64,
    pub personality: Personality,
    pub response_class: ResponseClass,
}

/// The full opponent pool. Display names read like ordinary participants so
/// AI matches are indistinguishable in the client.
pub static ROSTER: [AiOpponent; 8] = [
    AiOpponent {
        id: "ai-opp-01",
        display_name: "Sam K.",
        base_skill: 5.5,
        personality: Personality::Collaborative,
        response_class: ResponseClass::Slow,
    },
    AiOpponent {
        id: "ai-opp-02",
        display_name: "Riley M.",
        base_skill: 5.8,
        personality: Personality::Competitive,
        response_class: ResponseClass::Medium,
    },
    AiOpponent {
        id: "ai-opp-03",
        display_name: "Dana P.",
        base_skill: 6.2,
        personality: Personality::Analytical,
        response_class: ResponseClass::Slow,
    },
    AiOpponent {
        id: "ai-opp-04",
        display_name: "Casey L.",
        base_skill: 6.5,
        personality: Personality::Collaborative,
        response_class: ResponseClass::Medium,
    },
    AiOpponent {
        id: "ai-opp-05",
        display_name: "Morgan T.",
        base_skill: 6.8,
        personality: Personality::Competitive,
        response_class: ResponseClass::Fast,
    },
    AiOpponent {
        id: "ai-opp-06",
        display_name: "Jesse W.",
        base_skill: 7.2,
        personality: Personality::Analytical,
        response_class: ResponseClass::Medium,
    },
    AiOpponent {
        id: "ai-opp-07",
        display_name: "Quinn R.",
        base_skill: 7.6,
        personality: Personality::Competitive,
        response_class: ResponseClass::Fast,
    },
    AiOpponent {
        id: "ai-opp-08",
        display_name: "Avery S.",
        base_skill: 8.0,
        personality: Personality::Analytical,
        response_class: ResponseClass::Fast,
    },
];

/// Opponent descriptor as serialized into match records and pushed to
/// clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiOpponentDescriptor {
    pub id: String,
    pub name: String,
    pub skill_level: f64,
    pub is_ai: bool,
    pub personality: Personality,
}

/// Simulation parameters pinned at match creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub opponent_id: String,
    pub personality: Personality,
    pub response_class: ResponseClass,
    pub effective_skill: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub is_correct: bool,
    pub response_time_ms: u64,
    pub accuracy: f64,
    pub question_number: u32,
    pub difficulty: u32,
}

/// Same window rule as human pairing, over the static roster.
pub fn select_opponent(skill: f64, threshold: f64) -> &'static AiOpponent {
    let idx = select_by_skill_window(skill, threshold, &ROSTER, |o| o.base_skill).unwrap_or(0);
    &ROSTER[idx]
}

/// Assemble a human-vs-ai match for a participant of the given skill.
pub fn create_ai_match(
    participant_id: Uuid,
    participant_name: Option<String>,
    round_number: u32,
    skill_level: f64,
    threshold: f64,
) -> MatchRecord {
    let opponent = select_opponent(skill_level, threshold);

    let mut rng = rand::rng();
    let effective_skill =
        (opponent.base_skill + rng.random_range(-SKILL_JITTER..=SKILL_JITTER)).clamp(1.0, 10.0);

    let descriptor = AiOpponentDescriptor {
        id: opponent.id.to_string(),
        name: opponent.display_name.to_string(),
        skill_level: effective_skill,
        is_ai: true,
        personality: opponent.personality,
    };
    let ai_settings = AiSettings {
        opponent_id: opponent.id.to_string(),
        personality: opponent.personality,
        response_class: opponent.response_class,
        effective_skill,
    };

    MatchRecord {
        id: Uuid::new_v4(),
        participant1_id: participant_id,
        participant2_id: None,
        participant1_name: participant_name,
        participant2_name: Some(opponent.display_name.to_string()),
        round_number,
        match_type: MatchType::HumanVsAi,
        status: MatchRecordStatus::Active,
        created_at: Utc::now(),
        is_ai: true,
        opponent: serde_json::to_string(&descriptor).unwrap_or_default(),
        ai_settings: serde_json::to_string(&ai_settings).ok(),
    }
}

/// One simulated answer. Stochastic in output, but every adjustment below is
/// fixed by the settings and question context.
pub fn simulate_ai_response(
    settings: &AiSettings,
    question_number: u32,
    difficulty: u32,
    opponent_correct: Option<bool>,
) -> AiResponse {
    let profile = settings.personality.profile();
    let mut rng = rand::rng();

    let mut accuracy = profile.base_accuracy - (difficulty as f64 - 5.0) * 0.02;
    if profile.adapts_to_opponent && opponent_correct == Some(true) {
        accuracy += 0.05;
    }
    if profile.slow_start && question_number <= 3 {
        accuracy -= 0.10;
    }
    if profile.improves_over_time && question_number > 5 {
        accuracy += 0.05;
    }
    accuracy += rng.random_range(-profile.variance / 2.0..=profile.variance / 2.0);
    accuracy = accuracy.clamp(0.0, 1.0);

    let is_correct = rng.random::<f64>() < accuracy;

    let (min_ms, max_ms) = settings.response_class.range_ms();
    let mut response_time = rng.random_range(min_ms as f64..=max_ms as f64);
    if settings.personality == Personality::Competitive {
        if question_number > 5 {
            response_time *= 0.8;
        }
        if difficulty < 5 {
            response_time *= 0.7;
        }
    }

    AiResponse {
        is_correct,
        response_time_ms: response_time.round() as u64,
        accuracy,
        question_number,
        difficulty,
    }
}
