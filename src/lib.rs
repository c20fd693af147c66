//! Adaptive placement engine for the Novakid English proficiency test.
//!
//! Given a pre-generated question bank tagged by level (0..5, CEFR pre-A1
//! through B2), the engine runs a fixed-length adaptive session: a
//! calibration ramp, per-answer level adjustment with momentum and
//! cooldown, pedagogically constrained selection (curriculum gating,
//! mechanic variety, audio/text balance), and a final placement report with
//! per-skill breakdowns. An optional LLM analyzer can refine the report;
//! the rule-based fallback is always available.

pub mod advisor;
pub mod answer;
pub mod bank;
pub mod config;
pub mod engine;
pub mod logging;
pub mod report;
pub mod scorer;

pub use advisor::{AdvisoryAnalyzer, EnrichedAnswer, LlmAdvisor};
pub use answer::{AnswerSubmission, AnswerValue};
pub use bank::{BankError, Level, Mechanic, Question, QuestionBank, ServedQuestion, Skill};
pub use config::EngineConfig;
pub use engine::{
    AnswerFeedback, EngineError, NextQuestion, PlacementEngine, SessionState, TestPhase,
};
pub use report::PlacementReport;
