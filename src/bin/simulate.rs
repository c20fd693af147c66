//! Scripted end-to-end session runner.
//!
//! Loads a question bank, plays a 15-question session with a scripted
//! student profile, and prints the placement report as JSON.
//! Usage: cargo run --bin simulate -- --bank data/questions.json --profile perfect

use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use placement_engine::{
    logging, AnswerSubmission, AnswerValue, EngineConfig, LlmAdvisor, NextQuestion,
    PlacementEngine, Question, QuestionBank,
};
use placement_engine::bank::Payload;

#[derive(Parser, Debug)]
#[command(name = "simulate")]
#[command(about = "Run a scripted placement session against a question bank")]
struct Args {
    /// Path to the question bank JSON
    #[arg(short, long)]
    bank: String,

    /// Scripted student profile
    #[arg(short, long, value_enum, default_value_t = Profile::Mixed)]
    profile: Profile,

    /// Probability of a correct answer for the mixed profile
    #[arg(long, default_value = "0.7")]
    accuracy: f64,

    /// Seed for the session and the scripted student
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Consult the LLM advisor for the final report (needs LLM_API_KEY)
    #[arg(long)]
    advisor: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    /// Every answer correct
    Perfect,
    /// Every answer wrong
    Struggling,
    /// Alternating correct and wrong, starting correct
    Alternating,
    /// Correct with the given probability
    Mixed,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _log_guard = logging::init_tracing(&log_level);

    let bank = match QuestionBank::load(&args.bank) {
        Ok(bank) => Arc::new(bank),
        Err(err) => {
            tracing::error!(error = %err, "failed to load question bank");
            std::process::exit(1);
        }
    };

    let engine = PlacementEngine::new(bank, EngineConfig::from_env());
    let mut state = engine.start_session_with_seed(args.seed);
    let session = logging::session_span(&state.session_id);
    let mut student_rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let mut turn = 0usize;

    let _guard = session.enter();
    loop {
        match engine.next_question(&mut state) {
            NextQuestion::Question(served) => {
                let answer_correctly = match args.profile {
                    Profile::Perfect => true,
                    Profile::Struggling => false,
                    Profile::Alternating => turn % 2 == 0,
                    Profile::Mixed => student_rng.random_bool(args.accuracy.clamp(0.0, 1.0)),
                };
                turn += 1;

                let answer = if answer_correctly {
                    correct_answer(&served.question)
                } else {
                    wrong_answer(&served.question)
                };

                let feedback = engine
                    .submit_answer(
                        &mut state,
                        AnswerSubmission {
                            question_id: served.question.id.clone(),
                            answer,
                            response_time: student_rng.random_range(1.0..8.0),
                        },
                    )
                    .expect("pending question was just served");

                tracing::info!(
                    question = %served.question.id,
                    level = %served.assigned_level,
                    mechanic = %served.question.mechanic(),
                    correct = feedback.correct,
                    estimate = %state.current_level,
                    "answered"
                );
            }
            NextQuestion::Complete | NextQuestion::Exhausted => break,
        }
    }
    drop(_guard);

    let report = if args.advisor {
        let advisor = LlmAdvisor::from_env();
        if !advisor.is_available() {
            tracing::warn!("advisor requested but not configured, using fallback");
        }
        engine.finish_with_advisor(&state, Some(&advisor)).await
    } else {
        engine.finish(&state)
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&report).expect("report serializes")
    );
}

fn correct_answer(question: &Question) -> AnswerValue {
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

fn wrong_answer(question: &Question) -> AnswerValue {
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
        Payload::SentenceScramble { correct_order, .. } => {
            if correct_order.len() < 2 {
                return AnswerValue::WordOrder(Vec::new());
            }
            let mut order = correct_order.clone();
            order.rotate_left(1);
            AnswerValue::WordOrder(order)
        }
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
