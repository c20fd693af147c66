//! Question bank: load, validate, and serve the immutable level buckets.
//!
//! The bank is a keyed blob mapping level strings `"0".."5"` to arrays of
//! question records. It is loaded once at startup and shared read-only by
//! every session; bucket order is preserved because selection treats it as
//! the stable "bank order".

pub mod question;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::info;

pub use question::{
    BalanceSide, Category, Level, Mechanic, Payload, Question, ServedQuestion, Skill, SkillBucket,
    SortItem,
};

#[derive(Debug, Error)]
pub enum BankError {
    #[error("question bank malformed: {0}")]
    Malformed(String),
    #[error("question bank has no questions at level {0}")]
    LevelGap(Level),
}

impl From<serde_json::Error> for BankError {
    fn from(err: serde_json::Error) -> Self {
        BankError::Malformed(err.to_string())
    }
}

impl From<std::io::Error> for BankError {
    fn from(err: std::io::Error) -> Self {
        BankError::Malformed(err.to_string())
    }
}

/// Immutable mapping from level to its ordered question list.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    buckets: BTreeMap<Level, Vec<Question>>,
}

impl QuestionBank {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BankError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, BankError> {
        let keyed: BTreeMap<String, Vec<Question>> = serde_json::from_reader(reader)?;
        Self::from_keyed(keyed)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, BankError> {
        let keyed: BTreeMap<String, Vec<Question>> = serde_json::from_str(raw)?;
        Self::from_keyed(keyed)
    }

    pub fn from_keyed(keyed: BTreeMap<String, Vec<Question>>) -> Result<Self, BankError> {
        let mut buckets: BTreeMap<Level, Vec<Question>> = BTreeMap::new();

        for (key, questions) in keyed {
            let value: u8 = key
                .parse()
                .map_err(|_| BankError::Malformed(format!("level key {key:?} is not a number")))?;
            let level = Level::new(value)
                .ok_or_else(|| BankError::Malformed(format!("level key {key:?} out of range")))?;

            for question in &questions {
                validate_question(level, question)?;
            }
            buckets.insert(level, questions);
        }

        for level in Level::all() {
            if buckets.get(&level).is_none_or(|bucket| bucket.is_empty()) {
                return Err(BankError::LevelGap(level));
            }
        }

        let total: usize = buckets.values().map(Vec::len).sum();
        info!(total, "question bank loaded");

        Ok(Self { buckets })
    }

    /// Questions in the given bucket, in bank order.
    pub fn level(&self, level: Level) -> &[Question] {
        self.buckets.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_questions(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

fn validate_question(level: Level, question: &Question) -> Result<(), BankError> {
    let mechanic = question.mechanic();

    if question.id.trim().is_empty() {
        return Err(BankError::Malformed(format!(
            "question at level {level} has an empty id"
        )));
    }

    if !level.allows(mechanic) {
        return Err(BankError::Malformed(format!(
            "question {}: mechanic {mechanic} is not permitted at level {level}",
            question.id
        )));
    }

    match &question.payload {
        Payload::MultipleChoiceTextText {
            options,
            correct_answer,
            ..
        }
        | Payload::ImageSingleChoiceFromTexts {
            options,
            correct_answer,
            ..
        } => check_choice(&question.id, options.len(), *correct_answer)?,
        Payload::AudioSingleChoiceFromImages {
            image_options,
            correct_answer,
            ..
        } => check_choice(&question.id, image_options.len(), *correct_answer)?,
        Payload::SentenceScramble {
            scrambled_words,
            correct_order,
        } => {
            if scrambled_words.is_empty() {
                return Err(BankError::Malformed(format!(
                    "question {}: scramble has no words",
                    question.id
                )));
            }
            if correct_order.iter().any(|&i| i >= scrambled_words.len()) {
                return Err(BankError::Malformed(format!(
                    "question {}: scramble order index out of range",
                    question.id
                )));
            }
        }
        Payload::AudioCategorySorting { categories, items } => {
            if categories.is_empty() || items.is_empty() {
                return Err(BankError::Malformed(format!(
                    "question {}: sorting needs categories and items",
                    question.id
                )));
            }
            if items.iter().any(|item| item.category >= categories.len()) {
                return Err(BankError::Malformed(format!(
                    "question {}: sort item category index out of range",
                    question.id
                )));
            }
        }
        Payload::WordPronunciationPractice { target_word, .. } => {
            if target_word.trim().is_empty() {
                return Err(BankError::Malformed(format!(
                    "question {}: empty target word",
                    question.id
                )));
            }
        }
        Payload::SentencePronunciationPractice {
            target_sentence, ..
        } => {
            if target_sentence.trim().is_empty() {
                return Err(BankError::Malformed(format!(
                    "question {}: empty target sentence",
                    question.id
                )));
            }
        }
    }

    Ok(())
}

fn check_choice(id: &str, option_count: usize, correct: usize) -> Result<(), BankError> {
    if option_count < 2 {
        return Err(BankError::Malformed(format!(
            "question {id}: choice needs at least two options"
        )));
    }
    if correct >= option_count {
        return Err(BankError::Malformed(format!(
            "question {id}: correct answer index {correct} out of range"
        )));
    }
    Ok(())
}
