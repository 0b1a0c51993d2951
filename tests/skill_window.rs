//! Unit tests for the skill-window selection rules.

use tourney_server::matchmaking::types::{first_within_window, select_by_skill_window};

/// (label, skill) pairs standing in for queue entries in FIFO order.
fn candidates(skills: &[f64]) -> Vec<(usize, f64)> {
    skills.iter().copied().enumerate().collect()
}

#[test]
fn picks_fifo_earliest_inside_window() {
    let c = candidates(&[9.0, 6.5, 7.2, 6.9]);
    // 6.5, 7.2 and 6.9 are all inside 7.0 ± 1.5; 6.5 joined first.
    let idx = first_within_window(7.0, 1.5, &c, |x| x.1);
    assert_eq!(idx, Some(1));
}

#[test]
fn window_boundary_is_inclusive() {
    let c = candidates(&[5.5]);
    assert_eq!(first_within_window(7.0, 1.5, &c, |x| x.1), Some(0));

    let c = candidates(&[5.49]);
    assert_eq!(first_within_window(7.0, 1.5, &c, |x| x.1), None);
}

#[test]
fn no_candidate_inside_window_yields_none() {
    let c = candidates(&[1.0, 9.9]);
    assert_eq!(first_within_window(5.0, 1.5, &c, |x| x.1), None);
}

#[test]
fn empty_queue_yields_none() {
    let c: Vec<(usize, f64)> = Vec::new();
    assert_eq!(first_within_window(5.0, 1.5, &c, |x| x.1), None);
    assert_eq!(select_by_skill_window(5.0, 1.5, &c, |x| x.1), None);
}

#[test]
fn degraded_selection_falls_back_to_nearest() {
    let c = candidates(&[1.0, 9.0, 8.0]);
    // Nobody within 5.0 ± 1.5; 1.0 is 4.0 away, 8.0 is 3.0 away.
    let idx = select_by_skill_window(5.0, 1.5, &c, |x| x.1);
    assert_eq!(idx, Some(2));
}

#[test]
fn degraded_selection_breaks_ties_by_fifo() {
    let c = candidates(&[8.0, 2.0]);
    // Both are 3.0 away from 5.0; the earlier entry wins.
    let idx = select_by_skill_window(5.0, 1.5, &c, |x| x.1);
    assert_eq!(idx, Some(0));
}

#[test]
fn selection_is_deterministic() {
    let c = candidates(&[9.0, 6.5, 7.2, 6.9]);
    let first = select_by_skill_window(7.0, 1.5, &c, |x| x.1);
    for _ in 0..10 {
        assert_eq!(select_by_skill_window(7.0, 1.5, &c, |x| x.1), first);
    }
}

#[test]
fn window_wins_over_closer_out_of_window_candidate() {
    // 7.1 is closer to 7.0 but arrives later than in-window 6.0; both are in
    // the window, so FIFO order decides.
    let c = candidates(&[6.0, 7.1]);
    assert_eq!(select_by_skill_window(7.0, 1.5, &c, |x| x.1), Some(0));
}
