//! Unit tests for the AI opponent roster and response model.

use tourney_server::matchmaking::ai::{
    create_ai_match, select_opponent, simulate_ai_response, AiOpponentDescriptor, AiSettings,
    Personality, ResponseClass, ROSTER,
};
use uuid::Uuid;

#[test]
fn roster_has_eight_opponents_with_sane_skills() {
    assert_eq!(ROSTER.len(), 8);
    for opp in &ROSTER {
        assert!(
            (5.5..=8.0).contains(&opp.base_skill),
            "{} has base skill {}",
            opp.id,
            opp.base_skill
        );
    }
}

#[test]
fn selection_prefers_window_then_nearest() {
    // 7.0 ± 1.5 covers the whole roster start; earliest roster slot wins.
    let opp = select_opponent(7.0, 1.5);
    assert!((opp.base_skill - 7.0).abs() <= 1.5);

    // 1.0 is far below everyone; nearest is the 5.5 opponent.
    let opp = select_opponent(1.0, 1.5);
    assert_eq!(opp.base_skill, 5.5);

    // 10.0 degrades to the top of the roster.
    let opp = select_opponent(10.0, 1.5);
    assert_eq!(opp.base_skill, 8.0);
}

#[test]
fn ai_match_record_shape() {
    let pid = Uuid::new_v4();
    let record = create_ai_match(pid, Some("Ada".into()), 3, 7.0, 1.5);

    assert!(record.is_ai);
    assert_eq!(record.participant1_id, pid);
    assert_eq!(record.participant2_id, None);
    assert_eq!(record.round_number, 3);
    assert_eq!(record.match_type.as_str(), "human-vs-ai");
    assert_eq!(record.status.as_str(), "active");

    let descriptor: AiOpponentDescriptor = serde_json::from_str(&record.opponent).unwrap();
    assert!(descriptor.is_ai);
    assert!(!descriptor.name.is_empty());

    let settings: AiSettings =
        serde_json::from_str(record.ai_settings.as_deref().unwrap()).unwrap();
    assert_eq!(settings.opponent_id, descriptor.id);
    // Effective skill stays within ±0.3 of some roster member's base.
    let base = ROSTER
        .iter()
        .find(|o| o.id == settings.opponent_id)
        .map(|o| o.base_skill)
        .unwrap();
    assert!((settings.effective_skill - base).abs() <= 0.3 + 1e-9);
}

fn settings_for(personality: Personality, response_class: ResponseClass) -> AiSettings {
    AiSettings {
        opponent_id: "ai-opp-test".into(),
        personality,
        response_class,
        effective_skill: 6.5,
    }
}

#[test]
fn accuracy_always_clamped_to_unit_interval() {
    let settings = settings_for(Personality::Competitive, ResponseClass::Fast);
    for q in 1..=10 {
        for d in 1..=10 {
            let r = simulate_ai_response(&settings, q, d, Some(true));
            assert!((0.0..=1.0).contains(&r.accuracy));
            assert_eq!(r.question_number, q);
            assert_eq!(r.difficulty, d);
        }
    }
}

#[test]
fn analytical_slow_start_lowers_early_accuracy() {
    let settings = settings_for(Personality::Analytical, ResponseClass::Medium);
    // Question 1, difficulty 5: 0.88 - 0.10 ± 0.025.
    for _ in 0..50 {
        let r = simulate_ai_response(&settings, 1, 5, None);
        assert!(
            (0.75..=0.81).contains(&r.accuracy),
            "accuracy {} out of expected band",
            r.accuracy
        );
    }
}

#[test]
fn competitive_late_game_accuracy_is_high() {
    let settings = settings_for(Personality::Competitive, ResponseClass::Medium);
    // Question 6, difficulty 5, opponent correct:
    // 0.85 + 0.05 (adapt) + 0.05 (improve) ± 0.05, clamped.
    for _ in 0..50 {
        let r = simulate_ai_response(&settings, 6, 5, Some(true));
        assert!(r.accuracy >= 0.89, "accuracy {} too low", r.accuracy);
    }
}

#[test]
fn collaborative_ignores_opponent_and_question_number() {
    let settings = settings_for(Personality::Collaborative, ResponseClass::Slow);
    // 0.80 ± 0.04 at difficulty 5, regardless of context flags.
    for q in [1, 4, 9] {
        for _ in 0..30 {
            let r = simulate_ai_response(&settings, q, 5, Some(true));
            assert!((0.75..=0.85).contains(&r.accuracy));
        }
    }
}

#[test]
fn response_times_respect_class_ranges() {
    for (class, min, max) in [
        (ResponseClass::Fast, 800u64, 2_000u64),
        (ResponseClass::Medium, 2_000, 4_000),
        (ResponseClass::Slow, 4_000, 7_000),
    ] {
        let settings = settings_for(Personality::Collaborative, class);
        for _ in 0..50 {
            let r = simulate_ai_response(&settings, 4, 6, None);
            assert!(
                (min..=max).contains(&r.response_time_ms),
                "{} outside [{min}, {max}]",
                r.response_time_ms
            );
        }
    }
}

#[test]
fn competitive_speeds_up_late_and_on_easy_questions() {
    let settings = settings_for(Personality::Competitive, ResponseClass::Fast);
    // Question 6, difficulty 3: both multipliers apply (× 0.8 × 0.7).
    let (min, max) = (
        (800.0_f64 * 0.8 * 0.7).round() as u64,
        (2_000.0_f64 * 0.8 * 0.7).round() as u64,
    );
    for _ in 0..50 {
        let r = simulate_ai_response(&settings, 6, 3, None);
        assert!(
            (min..=max).contains(&r.response_time_ms),
            "{} outside [{min}, {max}]",
            r.response_time_ms
        );
    }
}
