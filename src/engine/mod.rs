//! Session orchestration: select, answer, adjust, finish.
//!
//! A `PlacementEngine` owns the immutable bank and the process-wide config;
//! any number of independent sessions can run against it concurrently, each
//! owning its `SessionState` exclusively. Within a session the steps are
//! strictly ordered: the Nth answer is applied after the Nth selection, and
//! nothing else mutates the state in between.

pub mod adjustment;
pub mod selection;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::advisor::{self, AdvisoryAnalyzer, EnrichedAnswer};
use crate::answer::{check_answer, AnswerSubmission};
use crate::bank::{QuestionBank, ServedQuestion};
use crate::config::EngineConfig;
use crate::report::PlacementReport;
use crate::scorer;

pub use adjustment::LevelChange;
pub use state::{AnsweredRecord, SessionState, TestPhase};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no question is pending an answer")]
    NoPendingQuestion,
    #[error("answer targets question {got} but question {expected} is pending")]
    QuestionMismatch { expected: String, got: String },
}

/// Outcome of asking for the next question.
#[derive(Debug, Clone)]
pub enum NextQuestion {
    Question(ServedQuestion),
    /// The configured question count has been answered.
    Complete,
    /// No unused question exists anywhere; the test ends early.
    Exhausted,
}

/// What the renderer needs to know right after an answer.
#[derive(Debug, Clone)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub level_change: Option<LevelChange>,
    pub complete: bool,
}

pub struct PlacementEngine {
    bank: Arc<QuestionBank>,
    config: EngineConfig,
}

impl PlacementEngine {
    pub fn new(bank: Arc<QuestionBank>, config: EngineConfig) -> Self {
        Self { bank, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn start_session(&self) -> SessionState {
        let state = SessionState::new(&self.config);
        info!(session_id = %state.session_id, "placement session started");
        state
    }

    /// Deterministic session for tests and replays.
    pub fn start_session_with_seed(&self, seed: u64) -> SessionState {
        SessionState::with_seed(&self.config, seed)
    }

    /// Serve the next question. Calling again before the answer arrives
    /// re-serves the same pending question.
    pub fn next_question(&self, state: &mut SessionState) -> NextQuestion {
        if self.is_complete(state) {
            return NextQuestion::Complete;
        }
        if let Some(pending) = &state.pending {
            return NextQuestion::Question(pending.clone());
        }

        match selection::select_next(state, &self.bank, &self.config) {
            Some(served) => {
                state.pending = Some(served.clone());
                NextQuestion::Question(served)
            }
            None => {
                warn!(
                    session_id = %state.session_id,
                    answered = state.q_index,
                    "question pool exhausted, ending test early"
                );
                state.exhausted = true;
                NextQuestion::Exhausted
            }
        }
    }

    /// Apply the renderer's answer to the pending question.
    ///
    /// A shape that does not match the mechanic is scored incorrect and the
    /// anomaly is kept in the history; it never aborts the session.
    pub fn submit_answer(
        &self,
        state: &mut SessionState,
        submission: AnswerSubmission,
    ) -> Result<AnswerFeedback, EngineError> {
        let pending = state.pending.take().ok_or(EngineError::NoPendingQuestion)?;
        if pending.question.id != submission.question_id {
            let expected = pending.question.id.clone();
            state.pending = Some(pending);
            return Err(EngineError::QuestionMismatch {
                expected,
                got: submission.question_id,
            });
        }

        let (correct, anomaly) = match check_answer(&pending.question.payload, &submission.answer)
        {
            Ok(correct) => (correct, None),
            Err(err) => {
                warn!(
                    session_id = %state.session_id,
                    question_id = %pending.question.id,
                    error = %err,
                    "answer shape mismatch, scoring incorrect"
                );
                (false, Some(err.to_string()))
            }
        };

        let record = AnsweredRecord {
            question_id: pending.question.id.clone(),
            mechanic: pending.question.mechanic(),
            assigned_level: pending.assigned_level,
            skill: pending.question.skill,
            correct,
            response_time: submission.response_time,
            is_calibration: pending.is_calibration,
            anomaly,
        };

        let level_change = adjustment::update(state, record, &self.config);

        Ok(AnswerFeedback {
            correct,
            level_change,
            complete: self.is_complete(state),
        })
    }

    pub fn is_complete(&self, state: &SessionState) -> bool {
        state.q_index >= self.config.questions_per_test || state.exhausted
    }

    /// Rule-based report. Pure compute; always available.
    pub fn finish(&self, state: &SessionState) -> PlacementReport {
        let ended_early = state.exhausted && state.history.len() < self.config.questions_per_test;
        scorer::score(
            &state.history,
            state.current_level,
            ended_early,
            &self.config,
        )
    }

    /// Report with the advisory analyzer consulted when enabled. Any advisor
    /// failure yields the fallback unchanged.
    pub async fn finish_with_advisor<A: AdvisoryAnalyzer>(
        &self,
        state: &SessionState,
        analyzer: Option<&A>,
    ) -> PlacementReport {
        let fallback = self.finish(state);

        if !self.config.advisor_enabled {
            return fallback;
        }
        let Some(analyzer) = analyzer else {
            return fallback;
        };

        let enriched: Vec<EnrichedAnswer> = state.history.iter().map(Into::into).collect();
        advisor::resolve(
            analyzer,
            &enriched,
            fallback,
            Duration::from_secs(self.config.advisor_timeout_seconds),
        )
        .await
    }
}
