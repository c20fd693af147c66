//! Advisory analyzer boundary.
//!
//! The analyzer is an optional enhancement: it may return a structured
//! report that replaces the rule-based fallback verbatim, but only after
//! validation, and never in a way that can block the end-of-test flow.
//! Timeout, transport failure, malformed output, and failed validation all
//! resolve to the fallback.

pub mod llm;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::bank::{Level, Mechanic, Skill};
use crate::engine::state::AnsweredRecord;
use crate::report::PlacementReport;

pub use llm::{LlmAdvisor, LlmConfig};

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyChoices,
    #[error("advisor timed out")]
    Timeout,
    #[error("advisor report rejected: {0}")]
    Invalid(String),
}

impl AdvisorError {
    /// Worth retrying: throttling, server-side failures, and transport
    /// errors that may clear. Malformed output never is.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(err) => err.is_timeout() || err.is_connect(),
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// One answered question as forwarded to the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedAnswer {
    pub question_id: String,
    pub level: Level,
    pub mechanic: Mechanic,
    pub skill: Skill,
    pub correct: bool,
    pub response_time: f64,
}

impl From<&AnsweredRecord> for EnrichedAnswer {
    fn from(record: &AnsweredRecord) -> Self {
        Self {
            question_id: record.question_id.clone(),
            level: record.assigned_level,
            mechanic: record.mechanic,
            skill: record.skill,
            correct: record.correct,
            response_time: record.response_time,
        }
    }
}

/// Contract for the external analyzer. Implementations should complete
/// within the caller's time budget; the caller enforces it regardless.
pub trait AdvisoryAnalyzer: Send + Sync {
    fn analyze(
        &self,
        history: &[EnrichedAnswer],
    ) -> impl Future<Output = Result<PlacementReport, AdvisorError>> + Send;
}

/// Schema-level checks on an advisory report before it may replace the
/// fallback. The level bound is enforced twice: `Level` already rejects
/// out-of-range values at deserialization, and this guards reports built
/// in-process.
pub fn validate_report(report: &PlacementReport) -> Result<(), AdvisorError> {
    if !(0.0..=1.0).contains(&report.placement.confidence) {
        return Err(AdvisorError::Invalid(format!(
            "confidence {} outside [0, 1]",
            report.placement.confidence
        )));
    }
    for (name, skill) in [
        ("vocabulary", &report.skill_analysis.vocabulary),
        ("pronunciation", &report.skill_analysis.pronunciation),
        ("grammar", &report.skill_analysis.grammar),
    ] {
        if let Some(score) = skill.score {
            if !(0.0..=1.0).contains(&score) {
                return Err(AdvisorError::Invalid(format!(
                    "{name} score {score} outside [0, 1]"
                )));
            }
        }
    }
    Ok(())
}

/// Run the analyzer against the enriched history, falling back to the
/// rule-based report on any failure.
pub async fn resolve<A: AdvisoryAnalyzer>(
    advisor: &A,
    history: &[EnrichedAnswer],
    fallback: PlacementReport,
    timeout: Duration,
) -> PlacementReport {
    let outcome = match tokio::time::timeout(timeout, advisor.analyze(history)).await {
        Ok(result) => result,
        Err(_) => Err(AdvisorError::Timeout),
    };

    match outcome {
        Ok(report) => match validate_report(&report) {
            Ok(()) => {
                info!(
                    level = %report.placement.novakid_level,
                    confidence = report.placement.confidence,
                    "advisory report accepted"
                );
                report
            }
            Err(err) => {
                warn!(error = %err, "advisory report failed validation, using fallback");
                fallback
            }
        },
        Err(err) => {
            warn!(error = %err, "advisory analyzer unavailable, using fallback");
            fallback
        }
    }
}
