//! Selection policy: given the session state and the bank, pick the next
//! question.
//!
//! Calibration serves three questions from fixed levels [0, 1, 2]; the
//! adaptive phase builds a candidate level set around the current estimate
//! and narrows it through a gate ladder (curriculum, mechanic recency,
//! category balance). Gates relax in reverse order when they empty the
//! pool, and the search widens to every level before giving up.

use rand::Rng;
use tracing::debug;

use crate::bank::{BalanceSide, Level, Mechanic, Question, QuestionBank, ServedQuestion};
use crate::config::EngineConfig;
use crate::engine::state::SessionState;

const CALIBRATION_LEVELS: [Level; 3] = [
    Level::from_const(0),
    Level::from_const(1),
    Level::from_const(2),
];

/// Uniform pick among the first N filtered candidates in bank order.
const TOP_CANDIDATES: usize = 5;

/// Imbalance at which the under-represented category is forced.
const CATEGORY_FORCE_IMBALANCE: i32 = 2;
/// Coin bias toward the under-represented category below the force point.
const CATEGORY_COIN_BIAS: f64 = 0.7;

const EARLY_PHASE_END: usize = 8;
const MID_PHASE_END: usize = 13;
const END_PUSH_HIGH_ACCURACY: f64 = 0.85;
const END_PUSH_MID_ACCURACY: f64 = 0.70;

/// Pick the next question, or `None` when the unused pool is exhausted
/// everywhere.
pub fn select_next(
    state: &mut SessionState,
    bank: &QuestionBank,
    config: &EngineConfig,
) -> Option<ServedQuestion> {
    if state.calibration_index < config.calibration_questions {
        if let Some(served) = select_calibration(state, bank) {
            return Some(served);
        }
        // Calibration bucket exhausted: fall through to adaptive selection.
        debug!(
            calibration_index = state.calibration_index,
            "calibration pool exhausted, switching to adaptive selection"
        );
        state.calibration_index = config.calibration_questions;
    }

    select_adaptive(state, bank, config)
}

fn select_calibration(state: &mut SessionState, bank: &QuestionBank) -> Option<ServedQuestion> {
    let level = CALIBRATION_LEVELS
        .get(state.calibration_index)
        .copied()
        .unwrap_or(CALIBRATION_LEVELS[CALIBRATION_LEVELS.len() - 1]);

    let pool: Vec<(Level, &Question)> = bank
        .level(level)
        .iter()
        .filter(|q| is_calibration_safe(level, q.mechanic()))
        .filter(|q| !state.used.contains(&q.id))
        .map(|q| (level, q))
        .collect();

    let (assigned, question) = pick_with_gates(state, pool)?;
    state.calibration_index += 1;
    Some(finalize(state, question, assigned, true))
}

/// Mechanics simple enough to seed the estimate with.
fn is_calibration_safe(level: Level, mechanic: Mechanic) -> bool {
    match mechanic {
        Mechanic::WordPronunciationPractice => true,
        Mechanic::ImageSingleChoiceFromTexts => level.value() >= 1,
        Mechanic::MultipleChoiceTextText => level.value() >= 2,
        _ => false,
    }
}

fn select_adaptive(
    state: &mut SessionState,
    bank: &QuestionBank,
    config: &EngineConfig,
) -> Option<ServedQuestion> {
    let levels = candidate_levels(state);
    let pool = collect_pool(bank, state, &levels);

    if let Some((assigned, question)) = pick_with_gates(state, pool) {
        return Some(finalize(state, question, assigned, false));
    }

    // Last relaxation step: widen the search to every level, still
    // curriculum-gated.
    let everywhere: Vec<Level> = Level::all().collect();
    let widened = collect_pool(bank, state, &everywhere);
    if !widened.is_empty() {
        debug!(q_index = state.q_index, "candidate levels exhausted, widening to all levels");
        // The gate ladder is already fully relaxed at this point.
        state.category_relaxed = true;
        let (assigned, question) = pick_top(state, widened);
        return Some(finalize(state, question, assigned, false));
    }

    None
}

/// Candidate level set for the adaptive phase. The exploration radius grows
/// with test progress; the final stretch narrows back to the estimate and
/// probes the ceiling only for strong students.
fn candidate_levels(state: &SessionState) -> Vec<Level> {
    let current = state.current_level;
    let mut levels = vec![current];

    if state.q_index < EARLY_PHASE_END {
        levels.push(current.saturating_down(1));
        levels.push(current.saturating_up(1));
    } else if state.q_index < MID_PHASE_END {
        levels.push(current.saturating_down(2));
        levels.push(current.saturating_down(1));
        levels.push(current.saturating_up(1));
        levels.push(current.saturating_up(2));
    } else {
        let accuracy = state.overall_accuracy();
        if accuracy >= END_PUSH_HIGH_ACCURACY {
            levels.push(Level::from_const(4));
            levels.push(Level::MAX);
        }
        if accuracy >= END_PUSH_MID_ACCURACY && current.value() >= 3 {
            levels.push(current.saturating_up(1));
        }
    }

    levels.sort();
    levels.dedup();
    levels
}

/// Unused questions at the given levels, curriculum-gated, in stable bank
/// order: levels nearest the current estimate first (ties toward the lower
/// level), bucket order within a level.
fn collect_pool<'a>(
    bank: &'a QuestionBank,
    state: &SessionState,
    levels: &[Level],
) -> Vec<(Level, &'a Question)> {
    let current = state.current_level.value() as i32;
    let mut ordered: Vec<Level> = levels.to_vec();
    ordered.sort_by_key(|level| ((level.value() as i32 - current).abs(), level.value()));

    ordered
        .iter()
        .flat_map(|&level| {
            bank.level(level)
                .iter()
                .filter(move |q| level.allows(q.mechanic()))
                .filter(|q| !state.used.contains(&q.id))
                .map(move |q| (level, q))
        })
        .collect()
}

/// Apply the recency and category gates, relaxing category first and then
/// recency when a gate empties the pool.
fn pick_with_gates<'a>(
    state: &mut SessionState,
    pool: Vec<(Level, &'a Question)>,
) -> Option<(Level, &'a Question)> {
    if pool.is_empty() {
        return None;
    }

    // Recency gate: prefer mechanics not seen in the last two questions.
    let fresh_exists = pool
        .iter()
        .any(|(_, q)| !state.mechanic_history.contains(q.mechanic()));
    let after_recency: Vec<(Level, &Question)> = if fresh_exists {
        pool.iter()
            .filter(|(_, q)| !state.mechanic_history.contains(q.mechanic()))
            .copied()
            .collect()
    } else {
        pool
    };

    // Category balance gate.
    let target = category_target(state);
    let after_category: Vec<(Level, &Question)> = after_recency
        .iter()
        .filter(|(_, q)| q.mechanic().balance_side() == target)
        .copied()
        .collect();

    let final_pool = if after_category.is_empty() {
        state.category_relaxed = true;
        debug!(q_index = state.q_index, ?target, "category balance gate relaxed");
        after_recency
    } else {
        after_category
    };

    Some(pick_top(state, final_pool))
}

/// Which balance side to aim for. Forced once the tally drifts by two;
/// otherwise a coin biased toward the under-represented side.
fn category_target(state: &mut SessionState) -> BalanceSide {
    let imbalance = state.category_tally.imbalance();
    if imbalance >= CATEGORY_FORCE_IMBALANCE {
        return BalanceSide::Text;
    }
    if imbalance <= -CATEGORY_FORCE_IMBALANCE {
        return BalanceSide::Audio;
    }

    match state.category_tally.under_represented() {
        Some(under) => {
            if state.rng.random_bool(CATEGORY_COIN_BIAS) {
                under
            } else {
                under.other()
            }
        }
        None => {
            if state.rng.random_bool(0.5) {
                BalanceSide::Audio
            } else {
                BalanceSide::Text
            }
        }
    }
}

/// Uniform sample from the top candidates in bank order.
fn pick_top<'a>(
    state: &mut SessionState,
    pool: Vec<(Level, &'a Question)>,
) -> (Level, &'a Question) {
    let take = pool.len().min(TOP_CANDIDATES);
    let index = state.rng.random_range(0..take);
    pool[index]
}

fn finalize(
    state: &mut SessionState,
    question: &Question,
    assigned_level: Level,
    is_calibration: bool,
) -> ServedQuestion {
    state.used.insert(question.id.clone());
    debug!(
        question_id = %question.id,
        mechanic = %question.mechanic(),
        level = %assigned_level,
        is_calibration,
        "question selected"
    );
    ServedQuestion {
        question: question.clone(),
        assigned_level,
        is_calibration,
    }
}
