//! Per-session mutable state. Each logical session owns one `SessionState`
//! exclusively; sessions share nothing but the read-only bank.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::bank::{BalanceSide, Level, Mechanic, ServedQuestion, Skill};
use crate::config::EngineConfig;

/// How many recently served mechanics the diversity gate looks at.
pub const MECHANIC_HISTORY_LEN: usize = 2;

/// Rolling window of the most recent correctness outcomes. Eviction happens
/// at the container boundary so the length invariant cannot be violated by
/// callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceWindow {
    outcomes: VecDeque<bool>,
    capacity: usize,
}

impl PerformanceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, correct: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(correct);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Accuracy over the last `n` outcomes, or over all of them when fewer
    /// than `n` have been recorded. `None` until anything is recorded.
    pub fn accuracy_last(&self, n: usize) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let take = n.min(self.outcomes.len());
        let correct = self
            .outcomes
            .iter()
            .rev()
            .take(take)
            .filter(|&&c| c)
            .count();
        Some(correct as f64 / take as f64)
    }

    pub fn incorrect_in_last(&self, n: usize) -> usize {
        self.outcomes.iter().rev().take(n).filter(|&&c| !c).count()
    }
}

/// Bounded ring of the last served mechanics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MechanicRing {
    ring: VecDeque<Mechanic>,
}

impl MechanicRing {
    pub fn new() -> Self {
        Self {
            ring: VecDeque::with_capacity(MECHANIC_HISTORY_LEN),
        }
    }

    pub fn push(&mut self, mechanic: Mechanic) {
        if self.ring.len() == MECHANIC_HISTORY_LEN {
            self.ring.pop_front();
        }
        self.ring.push_back(mechanic);
    }

    pub fn contains(&self, mechanic: Mechanic) -> bool {
        self.ring.contains(&mechanic)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl Default for MechanicRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Running count of served questions per balance side.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CategoryTally {
    pub audio: u32,
    pub text: u32,
}

impl CategoryTally {
    pub fn record(&mut self, side: BalanceSide) {
        match side {
            BalanceSide::Audio => self.audio += 1,
            BalanceSide::Text => self.text += 1,
        }
    }

    /// Positive when audio is ahead.
    pub fn imbalance(&self) -> i32 {
        self.audio as i32 - self.text as i32
    }

    /// `None` when the sides are even.
    pub fn under_represented(&self) -> Option<BalanceSide> {
        match self.imbalance() {
            0 => None,
            d if d > 0 => Some(BalanceSide::Text),
            _ => Some(BalanceSide::Audio),
        }
    }
}

/// One answered question, as kept in the full session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsweredRecord {
    pub question_id: String,
    pub mechanic: Mechanic,
    pub assigned_level: Level,
    pub skill: Skill,
    pub correct: bool,
    pub response_time: f64,
    #[serde(default)]
    pub is_calibration: bool,
    /// Set when the renderer sent an answer shape that does not match the
    /// mechanic; the answer is scored incorrect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Calibrating,
    Adaptive,
    Complete,
}

pub struct SessionState {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub current_level: Level,
    pub momentum: f64,
    pub window: PerformanceWindow,
    pub streak: u32,
    pub used: HashSet<String>,
    pub mechanic_history: MechanicRing,
    pub category_tally: CategoryTally,
    pub history: Vec<AnsweredRecord>,
    pub cooldown_remaining: u32,
    pub calibration_index: usize,
    pub q_index: usize,
    /// Question served but not yet answered.
    pub pending: Option<ServedQuestion>,
    /// Set when selection ran out of unused questions everywhere.
    pub exhausted: bool,
    /// Set when the category balance gate had to be relaxed at least once.
    pub category_relaxed: bool,
    pub(crate) rng: Box<dyn RngCore + Send>,
}

impl SessionState {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_rng(config, Box::new(StdRng::from_os_rng()))
    }

    /// Deterministic session for tests and replays.
    pub fn with_seed(config: &EngineConfig, seed: u64) -> Self {
        Self::with_rng(config, Box::new(StdRng::seed_from_u64(seed)))
    }

    pub fn with_rng(config: &EngineConfig, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            current_level: Level::START,
            momentum: 0.0,
            window: PerformanceWindow::new(config.performance_window_size),
            streak: 0,
            used: HashSet::new(),
            mechanic_history: MechanicRing::new(),
            category_tally: CategoryTally::default(),
            history: Vec::with_capacity(config.questions_per_test),
            cooldown_remaining: 0,
            calibration_index: 0,
            q_index: 0,
            pending: None,
            exhausted: false,
            category_relaxed: false,
            rng,
        }
    }

    pub fn phase(&self, config: &EngineConfig) -> TestPhase {
        if self.q_index >= config.questions_per_test || self.exhausted {
            TestPhase::Complete
        } else if self.calibration_index < config.calibration_questions {
            TestPhase::Calibrating
        } else {
            TestPhase::Adaptive
        }
    }

    pub fn is_calibrating(&self, config: &EngineConfig) -> bool {
        self.phase(config) == TestPhase::Calibrating
    }

    pub fn overall_accuracy(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let correct = self.history.iter().filter(|r| r.correct).count();
        correct as f64 / self.history.len() as f64
    }

    /// Highest level bucket any served question was drawn from.
    pub fn best_attained_level(&self) -> Option<Level> {
        self.history.iter().map(|r| r.assigned_level).max()
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("session_id", &self.session_id)
            .field("current_level", &self.current_level)
            .field("momentum", &self.momentum)
            .field("streak", &self.streak)
            .field("q_index", &self.q_index)
            .field("cooldown_remaining", &self.cooldown_remaining)
            .field("calibration_index", &self.calibration_index)
            .field("category_tally", &self.category_tally)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = PerformanceWindow::new(5);
        for outcome in [true, true, false, true, false, false] {
            window.push(outcome);
        }
        assert_eq!(window.len(), 5);
        // oldest (first true) evicted: remaining = [true, false, true, false, false]
        assert_eq!(window.accuracy_last(5), Some(0.4));
    }

    #[test]
    fn test_window_short_accuracy_uses_available() {
        let mut window = PerformanceWindow::new(5);
        assert_eq!(window.accuracy_last(3), None);
        window.push(false);
        assert_eq!(window.accuracy_last(3), Some(0.0));
        window.push(true);
        assert_eq!(window.accuracy_last(3), Some(0.5));
    }

    #[test]
    fn test_window_incorrect_count() {
        let mut window = PerformanceWindow::new(5);
        for outcome in [false, true, false, false] {
            window.push(outcome);
        }
        assert_eq!(window.incorrect_in_last(4), 3);
        assert_eq!(window.incorrect_in_last(2), 2);
    }

    #[test]
    fn test_mechanic_ring_keeps_last_two() {
        let mut ring = MechanicRing::new();
        ring.push(Mechanic::WordPronunciationPractice);
        ring.push(Mechanic::MultipleChoiceTextText);
        ring.push(Mechanic::SentenceScramble);
        assert!(!ring.contains(Mechanic::WordPronunciationPractice));
        assert!(ring.contains(Mechanic::MultipleChoiceTextText));
        assert!(ring.contains(Mechanic::SentenceScramble));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_category_tally() {
        let mut tally = CategoryTally::default();
        assert_eq!(tally.under_represented(), None);
        tally.record(BalanceSide::Audio);
        tally.record(BalanceSide::Audio);
        tally.record(BalanceSide::Text);
        assert_eq!(tally.imbalance(), 1);
        assert_eq!(tally.under_represented(), Some(BalanceSide::Text));
    }

    #[test]
    fn test_phase_transitions_follow_q_index() {
        let config = EngineConfig::default();
        let mut state = SessionState::with_seed(&config, 7);
        assert_eq!(state.phase(&config), TestPhase::Calibrating);

        state.calibration_index = 3;
        state.q_index = 3;
        assert_eq!(state.phase(&config), TestPhase::Adaptive);

        state.q_index = 15;
        assert_eq!(state.phase(&config), TestPhase::Complete);
    }
}
