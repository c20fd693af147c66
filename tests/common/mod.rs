//! Shared fixtures for the integration tests: a bank covering every
//! mechanic at its permitted levels, and helpers that script a student.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use placement_engine::bank::{Payload, SortItem};
use placement_engine::{
    AnswerSubmission, AnswerValue, EngineConfig, Level, NextQuestion, PlacementEngine, Question,
    QuestionBank, SessionState, Skill,
};

pub fn word_question(id: String) -> Question {
    Question {
        id,
        skill: Skill::Pronunciation,
        difficulty: 0.2,
        payload: Payload::WordPronunciationPractice {
            target_word: "elephant".into(),
            phonetic: "/ˈelɪfənt/".into(),
            image_description: "Large gray animal with trunk".into(),
        },
    }
}

pub fn image_choice_question(id: String) -> Question {
    Question {
        id,
        skill: Skill::Vocabulary,
        difficulty: 0.3,
        payload: Payload::ImageSingleChoiceFromTexts {
            image_description: "Clock showing 3:00".into(),
            options: vec![
                "three o'clock".into(),
                "four o'clock".into(),
                "half past three".into(),
            ],
            correct_answer: 0,
        },
    }
}

pub fn audio_choice_question(id: String) -> Question {
    Question {
        id,
        skill: Skill::Vocabulary,
        difficulty: 0.3,
        payload: Payload::AudioSingleChoiceFromImages {
            target_audio: "elephant".into(),
            image_options: vec![
                "Large gray animal with trunk".into(),
                "Small brown dog".into(),
                "Yellow bird".into(),
            ],
            correct_answer: 0,
        },
    }
}

pub fn grammar_question(id: String) -> Question {
    Question {
        id,
        skill: Skill::Grammar,
        difficulty: 0.4,
        payload: Payload::MultipleChoiceTextText {
            sentence: "She ___ to school every day.".into(),
            options: vec!["go".into(), "goes".into(), "going".into(), "went".into()],
            correct_answer: 1,
        },
    }
}

pub fn sentence_question(id: String) -> Question {
    Question {
        id,
        skill: Skill::Speaking,
        difficulty: 0.4,
        payload: Payload::SentencePronunciationPractice {
            target_sentence: "How are you today?".into(),
            phonetic: "/haʊ ɑr ju təˈdeɪ/".into(),
            image_description: "Two people greeting each other".into(),
        },
    }
}

pub fn scramble_question(id: String) -> Question {
    Question {
        id,
        skill: Skill::Grammar,
        difficulty: 0.4,
        payload: Payload::SentenceScramble {
            scrambled_words: vec!["school".into(), "I".into(), "go".into(), "to".into()],
            correct_order: vec![1, 2, 3, 0],
        },
    }
}

pub fn sorting_question(id: String) -> Question {
    Question {
        id,
        skill: Skill::Vocabulary,
        difficulty: 0.4,
        payload: Payload::AudioCategorySorting {
            categories: vec!["Animals".into(), "Food".into()],
            items: vec![
                SortItem { text: "cat".into(), category: 0 },
                SortItem { text: "apple".into(), category: 1 },
                SortItem { text: "dog".into(), category: 0 },
                SortItem { text: "bread".into(), category: 1 },
                SortItem { text: "bird".into(), category: 0 },
            ],
        },
    }
}

/// Bank with every mechanic represented at each level that permits it,
/// large enough that a full session never exhausts it.
pub fn fixture_bank() -> Arc<QuestionBank> {
    let mut keyed: BTreeMap<String, Vec<Question>> = BTreeMap::new();

    for level in 0u8..=5 {
        let mut questions = Vec::new();
        for i in 0..8 {
            questions.push(word_question(format!("L{level}_WP_{i:03}")));
        }
        if level >= 1 {
            for i in 0..6 {
                questions.push(image_choice_question(format!("L{level}_IT_{i:03}")));
            }
            for i in 0..6 {
                questions.push(audio_choice_question(format!("L{level}_AI_{i:03}")));
            }
        }
        if level >= 2 {
            for i in 0..5 {
                questions.push(grammar_question(format!("L{level}_MC_{i:03}")));
            }
            for i in 0..4 {
                questions.push(sentence_question(format!("L{level}_SP_{i:03}")));
            }
            for i in 0..4 {
                questions.push(scramble_question(format!("L{level}_SS_{i:03}")));
            }
            for i in 0..4 {
                questions.push(sorting_question(format!("L{level}_CS_{i:03}")));
            }
        }
        keyed.insert(level.to_string(), questions);
    }

    Arc::new(QuestionBank::from_keyed(keyed).expect("fixture bank is valid"))
}

/// Bank with a single pronunciation question per level; exhausts quickly.
pub fn tiny_bank() -> Arc<QuestionBank> {
    let mut keyed: BTreeMap<String, Vec<Question>> = BTreeMap::new();
    for level in 0u8..=5 {
        let mut questions = vec![word_question(format!("tiny_L{level}_WP"))];
        if level >= 1 {
            questions.push(image_choice_question(format!("tiny_L{level}_IT")));
        }
        keyed.insert(level.to_string(), questions);
    }
    Arc::new(QuestionBank::from_keyed(keyed).expect("tiny bank is valid"))
}

pub fn correct_answer_for(question: &Question) -> AnswerValue {
    match &question.payload {
        Payload::MultipleChoiceTextText { correct_answer, .. }
        | Payload::ImageSingleChoiceFromTexts { correct_answer, .. }
        | Payload::AudioSingleChoiceFromImages { correct_answer, .. } => {
            AnswerValue::OptionIndex(*correct_answer)
        }
        Payload::WordPronunciationPractice { .. }
        | Payload::SentencePronunciationPractice { .. } => AnswerValue::SelfAssessment(true),
        Payload::SentenceScramble { correct_order, .. } => {
            AnswerValue::WordOrder(correct_order.clone())
        }
        Payload::AudioCategorySorting { categories, items } => {
            let mut placements: HashMap<String, Vec<usize>> = HashMap::new();
            for (index, item) in items.iter().enumerate() {
                placements
                    .entry(categories[item.category].clone())
                    .or_default()
                    .push(index);
            }
            AnswerValue::CategorySort(placements)
        }
    }
}

pub fn wrong_answer_for(question: &Question) -> AnswerValue {
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
        } => AnswerValue::OptionIndex((correct_answer + 1) % options.len()),
        Payload::AudioSingleChoiceFromImages {
            image_options,
            correct_answer,
            ..
        } => AnswerValue::OptionIndex((correct_answer + 1) % image_options.len()),
        Payload::WordPronunciationPractice { .. }
        | Payload::SentencePronunciationPractice { .. } => AnswerValue::SelfAssessment(false),
        Payload::SentenceScramble { .. } => AnswerValue::WordOrder(Vec::new()),
        Payload::AudioCategorySorting { categories, items } => {
            let mut placements: HashMap<String, Vec<usize>> = HashMap::new();
            for (index, item) in items.iter().enumerate() {
                let wrong = (item.category + 1) % categories.len();
                placements
                    .entry(categories[wrong].clone())
                    .or_default()
                    .push(index);
            }
            AnswerValue::CategorySort(placements)
        }
    }
}

/// One step of a driven session.
pub struct StepTrace {
    pub question_id: String,
    pub assigned_level: Level,
    pub is_calibration: bool,
    pub correct: bool,
    pub level_after: Level,
    pub cooldown_after: u32,
}

/// Drive a session to completion, answering correctly wherever the plan
/// says `true`. The plan indexes by question number, repeating its last
/// entry if the session outlives it.
pub fn drive_session(
    engine: &PlacementEngine,
    state: &mut SessionState,
    plan: &[bool],
) -> Vec<StepTrace> {
    let mut trace = Vec::new();
    let mut turn = 0usize;

    loop {
        match engine.next_question(state) {
            NextQuestion::Question(served) => {
                let answer_correctly = plan
                    .get(turn)
                    .or(plan.last())
                    .copied()
                    .unwrap_or(true);
                turn += 1;

                let answer = if answer_correctly {
                    correct_answer_for(&served.question)
                } else {
                    wrong_answer_for(&served.question)
                };

                let feedback = engine
                    .submit_answer(
                        state,
                        AnswerSubmission {
                            question_id: served.question.id.clone(),
                            answer,
                            response_time: 2.0,
                        },
                    )
                    .expect("pending question was served");

                trace.push(StepTrace {
                    question_id: served.question.id,
                    assigned_level: served.assigned_level,
                    is_calibration: served.is_calibration,
                    correct: feedback.correct,
                    level_after: state.current_level,
                    cooldown_after: state.cooldown_remaining,
                });
            }
            NextQuestion::Complete | NextQuestion::Exhausted => break,
        }
    }

    trace
}

pub fn engine_with(bank: Arc<QuestionBank>) -> PlacementEngine {
    PlacementEngine::new(bank, EngineConfig::default())
}
