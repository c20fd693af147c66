//! Adjustment policy: after each answer, update momentum, the rolling
//! window, and the estimated level.
//!
//! Rules are evaluated top to bottom and the first match fires; aggressive
//! jumps need clear evidence and every adjustment starts a cooldown.

use tracing::debug;

use crate::bank::Level;
use crate::config::EngineConfig;
use crate::engine::state::{AnsweredRecord, SessionState};

const MOMENTUM_GAIN: f64 = 0.3;
const MOMENTUM_LOSS: f64 = 0.5;
const MOMENTUM_MIN: f64 = -2.0;
const MOMENTUM_MAX: f64 = 2.0;

const SHORT_WINDOW: usize = 3;
const STANDARD_UP_STREAK: u32 = 3;

/// Early ceiling push: a level-4 student still hot by mid-test goes straight
/// to the ceiling.
const EARLY_PUSH_ACCURACY: f64 = 0.85;
const EARLY_PUSH_STREAK: u32 = 2;
const EARLY_PUSH_MAX_Q: usize = 10;

/// Dropping from level 5 needs at least this many misses in the last four.
const CEILING_DROP_INCORRECT: usize = 3;
const CEILING_DROP_WINDOW: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub from: Level,
    pub to: Level,
    pub rule: &'static str,
}

/// Apply one answered record to the session state. Returns the level change
/// if an adjustment rule fired.
pub fn update(
    state: &mut SessionState,
    record: AnsweredRecord,
    config: &EngineConfig,
) -> Option<LevelChange> {
    let correct = record.correct;
    let is_calibration = record.is_calibration;

    state.window.push(correct);
    state.streak = if correct { state.streak + 1 } else { 0 };
    state.momentum = (state.momentum + if correct { MOMENTUM_GAIN } else { -MOMENTUM_LOSS })
        .clamp(MOMENTUM_MIN, MOMENTUM_MAX);
    state.category_tally.record(record.mechanic.balance_side());
    state.mechanic_history.push(record.mechanic);
    state.q_index += 1;
    state.history.push(record);

    if state.cooldown_remaining > 0 {
        // Calibration answers never burn cooldown.
        if !is_calibration {
            state.cooldown_remaining -= 1;
        }
        return None;
    }

    let short_acc = state.window.accuracy_last(SHORT_WINDOW).unwrap_or(0.0);
    let long_acc = state
        .window
        .accuracy_last(config.performance_window_size)
        .unwrap_or(0.0);
    debug!(
        q_index = state.q_index,
        level = %state.current_level,
        short_acc,
        long_acc,
        streak = state.streak,
        momentum = state.momentum,
        "evaluating level adjustment"
    );

    let change = evaluate_rules(state, short_acc, config);
    if let Some(change) = change {
        state.current_level = change.to;
        state.cooldown_remaining = config.adjust_cooldown;
        debug!(
            from = %change.from,
            to = %change.to,
            rule = change.rule,
            "level adjusted"
        );
    }

    change
}

fn evaluate_rules(
    state: &SessionState,
    short_acc: f64,
    config: &EngineConfig,
) -> Option<LevelChange> {
    let level = state.current_level;

    // Level up, strongest rule first.
    if level.value() == 4
        && state.q_index <= EARLY_PUSH_MAX_Q
        && state.streak >= EARLY_PUSH_STREAK
        && short_acc >= EARLY_PUSH_ACCURACY
    {
        return Some(LevelChange {
            from: level,
            to: Level::MAX,
            rule: "early-ceiling-push",
        });
    }

    if short_acc >= config.strong_jump_accuracy
        && state.streak >= config.strong_jump_streak
        && level.value() <= 3
    {
        return Some(LevelChange {
            from: level,
            to: level.saturating_up(2),
            rule: "strong-jump",
        });
    }

    if short_acc >= config.level_up_threshold
        && state.streak >= STANDARD_UP_STREAK
        && level < Level::MAX
    {
        return Some(LevelChange {
            from: level,
            to: level.saturating_up(1),
            rule: "standard-up",
        });
    }

    // Level down. The ceiling is protected: only a clear collapse drops it.
    if level == Level::MAX {
        if state.window.incorrect_in_last(CEILING_DROP_WINDOW) >= CEILING_DROP_INCORRECT {
            return Some(LevelChange {
                from: level,
                to: level.saturating_down(1),
                rule: "ceiling-drop",
            });
        }
        return None;
    }

    if short_acc <= config.level_down_threshold && level > Level::MIN {
        return Some(LevelChange {
            from: level,
            to: level.saturating_down(1),
            rule: "standard-down",
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{Mechanic, Skill};

    fn record(correct: bool) -> AnsweredRecord {
        AnsweredRecord {
            question_id: format!("q{}", uuid::Uuid::new_v4()),
            mechanic: Mechanic::MultipleChoiceTextText,
            assigned_level: Level::new(2).unwrap(),
            skill: Skill::Grammar,
            correct,
            response_time: 0.0,
            is_calibration: false,
            anomaly: None,
        }
    }

    fn state_at(level: u8, config: &EngineConfig) -> SessionState {
        let mut state = SessionState::with_seed(config, 42);
        state.current_level = Level::new(level).unwrap();
        state
    }

    #[test]
    fn test_standard_up_after_three_correct() {
        let config = EngineConfig::default();
        let mut state = state_at(1, &config);

        update(&mut state, record(true), &config);
        update(&mut state, record(true), &config);
        let change = update(&mut state, record(true), &config).unwrap();

        assert_eq!(change.rule, "standard-up");
        assert_eq!(state.current_level.value(), 2);
        assert_eq!(state.cooldown_remaining, config.adjust_cooldown);
    }

    #[test]
    fn test_strong_jump_after_four_correct() {
        let config = EngineConfig::default();
        let mut state = state_at(2, &config);
        state.streak = 3;
        for _ in 0..3 {
            state.window.push(true);
        }

        let change = update(&mut state, record(true), &config).unwrap();
        assert_eq!(change.rule, "strong-jump");
        assert_eq!(state.current_level.value(), 4);
    }

    #[test]
    fn test_cooldown_blocks_adjustment() {
        let config = EngineConfig::default();
        let mut state = state_at(1, &config);
        state.cooldown_remaining = 2;
        state.streak = 5;
        for _ in 0..5 {
            state.window.push(true);
        }

        assert!(update(&mut state, record(true), &config).is_none());
        assert_eq!(state.current_level.value(), 1);
        assert_eq!(state.cooldown_remaining, 1);
    }

    #[test]
    fn test_calibration_answers_do_not_burn_cooldown() {
        let config = EngineConfig::default();
        let mut state = state_at(1, &config);
        state.cooldown_remaining = 2;

        let mut calibration = record(false);
        calibration.is_calibration = true;
        update(&mut state, calibration, &config);

        assert_eq!(state.cooldown_remaining, 2);
    }

    #[test]
    fn test_standard_down_on_poor_window() {
        let config = EngineConfig::default();
        let mut state = state_at(2, &config);
        state.window.push(false);
        state.window.push(false);

        let change = update(&mut state, record(false), &config).unwrap();
        assert_eq!(change.rule, "standard-down");
        assert_eq!(state.current_level.value(), 1);
    }

    #[test]
    fn test_ceiling_holds_with_two_misses_in_four() {
        let config = EngineConfig::default();
        let mut state = state_at(5, &config);
        for outcome in [true, false, true] {
            state.window.push(outcome);
        }

        assert!(update(&mut state, record(false), &config).is_none());
        assert_eq!(state.current_level.value(), 5);
    }

    #[test]
    fn test_ceiling_drops_with_three_misses_in_four() {
        let config = EngineConfig::default();
        let mut state = state_at(5, &config);
        for outcome in [false, true, false] {
            state.window.push(outcome);
        }

        let change = update(&mut state, record(false), &config).unwrap();
        assert_eq!(change.rule, "ceiling-drop");
        assert_eq!(state.current_level.value(), 4);
        assert_eq!(state.cooldown_remaining, config.adjust_cooldown);
    }

    #[test]
    fn test_early_ceiling_push() {
        let config = EngineConfig::default();
        let mut state = state_at(4, &config);
        state.q_index = 8;
        state.streak = 1;
        state.window.push(true);
        state.window.push(true);

        let change = update(&mut state, record(true), &config).unwrap();
        assert_eq!(change.rule, "early-ceiling-push");
        assert_eq!(state.current_level, Level::MAX);
    }

    #[test]
    fn test_momentum_stays_bounded() {
        let config = EngineConfig::default();
        let mut state = state_at(1, &config);

        for _ in 0..20 {
            update(&mut state, record(true), &config);
        }
        assert!(state.momentum <= 2.0);

        for _ in 0..20 {
            update(&mut state, record(false), &config);
        }
        assert!(state.momentum >= -2.0);
    }

    #[test]
    fn test_oscillation_never_levels_up() {
        let config = EngineConfig::default();
        let mut state = state_at(1, &config);

        for i in 0..10 {
            update(&mut state, record(i % 2 == 0), &config);
        }
        // streak never reaches 3, so no up rule can fire
        assert!(state.current_level.value() <= 2);
    }
}
