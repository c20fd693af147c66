//! Pure answer checking, dispatched on the question's mechanic tag.
//!
//! The renderer is expected to send the right shape for each mechanic; a
//! mismatch is not fatal — the engine scores it incorrect and records the
//! anomaly in the session history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bank::Payload;

/// Fraction of sort items that must land in the right category to pass.
const SORT_PASS_RATIO: f64 = 0.6;

/// Captured answer, one shape per mechanic family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Pronunciation self-assessment; Well and OK both arrive as `true`.
    SelfAssessment(bool),
    /// Option index for the single-choice mechanics.
    OptionIndex(usize),
    /// Word order for sentence scramble.
    WordOrder(Vec<usize>),
    /// Category name to item indices for audio category sorting.
    CategorySort(HashMap<String, Vec<usize>>),
}

impl AnswerValue {
    fn shape_name(&self) -> &'static str {
        match self {
            Self::SelfAssessment(_) => "self-assessment",
            Self::OptionIndex(_) => "option index",
            Self::WordOrder(_) => "word order",
            Self::CategorySort(_) => "category sort",
        }
    }
}

/// Answer submitted by the renderer for the pending question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: String,
    pub answer: AnswerValue,
    /// Seconds from render to capture; zero when the surface does not track it.
    #[serde(default)]
    pub response_time: f64,
}

#[derive(Debug, Error)]
#[error("mechanic {mechanic} cannot be checked against a {got} answer")]
pub struct AnswerShapeError {
    pub mechanic: &'static str,
    pub got: &'static str,
}

/// Check an answer against the question payload.
pub fn check_answer(payload: &Payload, answer: &AnswerValue) -> Result<bool, AnswerShapeError> {
    let mismatch = || AnswerShapeError {
        mechanic: payload.mechanic().as_str(),
        got: answer.shape_name(),
    };

    match payload {
        Payload::MultipleChoiceTextText { correct_answer, .. }
        | Payload::ImageSingleChoiceFromTexts { correct_answer, .. }
        | Payload::AudioSingleChoiceFromImages { correct_answer, .. } => match answer {
            AnswerValue::OptionIndex(picked) => Ok(picked == correct_answer),
            _ => Err(mismatch()),
        },
        Payload::WordPronunciationPractice { .. }
        | Payload::SentencePronunciationPractice { .. } => match answer {
            AnswerValue::SelfAssessment(passed) => Ok(*passed),
            _ => Err(mismatch()),
        },
        Payload::SentenceScramble { correct_order, .. } => match answer {
            AnswerValue::WordOrder(order) => Ok(order == correct_order),
            _ => Err(mismatch()),
        },
        Payload::AudioCategorySorting { categories, items } => match answer {
            AnswerValue::CategorySort(placements) => {
                Ok(sort_score(categories, items, placements) >= SORT_PASS_RATIO)
            }
            _ => Err(mismatch()),
        },
    }
}

/// Fraction of items placed into their correct category.
fn sort_score(
    categories: &[String],
    items: &[crate::bank::SortItem],
    placements: &HashMap<String, Vec<usize>>,
) -> f64 {
    if items.is_empty() {
        return 0.0;
    }

    let mut placed_correctly = vec![false; items.len()];
    for (category_index, category) in categories.iter().enumerate() {
        let Some(placed) = placements.get(category) else {
            continue;
        };
        for &item in placed {
            if items.get(item).is_some_and(|i| i.category == category_index) {
                placed_correctly[item] = true;
            }
        }
    }

    let correct = placed_correctly.iter().filter(|&&c| c).count();
    correct as f64 / items.len() as f64
}
