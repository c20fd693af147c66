//! Rule-based placement synthesis. This is the guaranteed fallback: the
//! advisory analyzer may replace its output, but the end-of-test flow never
//! depends on anything beyond this module.

use std::collections::BTreeMap;

use tracing::debug;

use crate::bank::{Level, SkillBucket};
use crate::config::EngineConfig;
use crate::engine::state::AnsweredRecord;
use crate::report::{
    Placement, PlacementReport, Recommendations, SkillAnalysis, SkillReport,
};

/// A level counts toward placement once it has this many answers at this
/// accuracy.
const PLACEMENT_MIN_ITEMS: u32 = 2;
const PLACEMENT_ACCURACY: f64 = 0.70;

const WEAK_SKILL_THRESHOLD: f64 = 0.6;
const STRONG_SKILL_THRESHOLD: f64 = 0.8;
const PROGRESS_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Synthesize the placement report from the answered history.
///
/// `final_level` is the estimate at end of test; `ended_early` marks a run
/// that stopped before the full question count because the pool ran dry.
pub fn score(
    history: &[AnsweredRecord],
    final_level: Level,
    ended_early: bool,
    config: &EngineConfig,
) -> PlacementReport {
    let answered = history.len();
    let correct = history.iter().filter(|r| r.correct).count();
    let overall_accuracy = if answered > 0 {
        correct as f64 / answered as f64
    } else {
        0.0
    };

    let per_level = per_level_accuracy(history);
    let placement_level = placement_level(&per_level, final_level, history);
    let confidence = ((answered as f64 / config.questions_per_test as f64).min(1.0)
        * overall_accuracy)
        .clamp(0.0, 1.0);

    debug!(
        answered,
        overall_accuracy,
        placement = %placement_level,
        confidence,
        "fallback placement synthesized"
    );

    let mut justification = format!(
        "Overall accuracy {:.1}% with best performance at Level {placement_level}",
        overall_accuracy * 100.0
    );
    if ended_early {
        justification.push_str(&format!(
            "; test ended early after {answered} questions because the question pool was exhausted"
        ));
    }

    let skill_analysis = SkillAnalysis {
        vocabulary: skill_report(history, SkillBucket::Vocabulary),
        pronunciation: skill_report(history, SkillBucket::Pronunciation),
        grammar: skill_report(history, SkillBucket::Grammar),
    };

    let recommendations = recommendations(&skill_analysis, placement_level, confidence);

    PlacementReport {
        placement: Placement {
            novakid_level: placement_level,
            confidence,
            cefr_equivalent: placement_level.cefr_label().to_string(),
            level_justification: justification,
        },
        skill_analysis,
        recommendations,
    }
}

fn per_level_accuracy(history: &[AnsweredRecord]) -> BTreeMap<Level, (u32, u32)> {
    let mut per_level: BTreeMap<Level, (u32, u32)> = BTreeMap::new();
    for record in history {
        let entry = per_level.entry(record.assigned_level).or_default();
        entry.1 += 1;
        if record.correct {
            entry.0 += 1;
        }
    }
    per_level
}

/// Highest level held at placement accuracy over enough items; otherwise the
/// final estimate, capped by the highest level actually attempted.
fn placement_level(
    per_level: &BTreeMap<Level, (u32, u32)>,
    final_level: Level,
    history: &[AnsweredRecord],
) -> Level {
    let demonstrated = per_level
        .iter()
        .rev()
        .find(|(_, &(correct, total))| {
            total >= PLACEMENT_MIN_ITEMS && correct as f64 / total as f64 >= PLACEMENT_ACCURACY
        })
        .map(|(&level, _)| level);

    match demonstrated {
        Some(level) => level,
        None => {
            let best_attained = history.iter().map(|r| r.assigned_level).max();
            match best_attained {
                Some(best) => final_level.min(best),
                None => final_level,
            }
        }
    }
}

fn skill_report(history: &[AnsweredRecord], bucket: SkillBucket) -> SkillReport {
    let items: Vec<&AnsweredRecord> = history
        .iter()
        .filter(|r| r.skill.bucket() == bucket)
        .collect();
    if items.is_empty() {
        return SkillReport::insufficient();
    }

    let correct = items.iter().filter(|r| r.correct).count();
    let score = correct as f64 / items.len() as f64;

    let mut evidence = vec![format!(
        "Correctly answered {correct} of {} {} questions",
        items.len(),
        bucket.as_str()
    )];
    if let Some(hardest) = items
        .iter()
        .filter(|r| r.correct)
        .map(|r| r.assigned_level)
        .max()
    {
        evidence.push(format!("Succeeded at Level {hardest} {} tasks", bucket.as_str()));
    }
    let anomalies = items.iter().filter(|r| r.anomaly.is_some()).count();
    if anomalies > 0 {
        evidence.push(format!(
            "{anomalies} answer(s) arrived in an unexpected shape and were scored incorrect"
        ));
    }

    SkillReport {
        score: Some(score),
        evidence,
    }
}

fn recommendations(
    skills: &SkillAnalysis,
    placement: Level,
    confidence: f64,
) -> Recommendations {
    let named = [
        (SkillBucket::Vocabulary, &skills.vocabulary),
        (SkillBucket::Pronunciation, &skills.pronunciation),
        (SkillBucket::Grammar, &skills.grammar),
    ];

    let mut immediate_focus: Vec<String> = named
        .iter()
        .filter(|(_, report)| report.score.is_some_and(|s| s < WEAK_SKILL_THRESHOLD))
        .map(|(bucket, _)| format!("Strengthen {} with guided practice", bucket.as_str()))
        .collect();
    if immediate_focus.is_empty() {
        immediate_focus.push("Continue practicing at current level".to_string());
    }

    let mut strengths: Vec<String> = named
        .iter()
        .filter(|(_, report)| report.score.is_some_and(|s| s >= STRONG_SKILL_THRESHOLD))
        .map(|(bucket, _)| format!("Strong {} foundation", bucket.as_str()))
        .collect();
    if strengths.is_empty() {
        strengths.push("Build on demonstrated skills".to_string());
    }

    let estimated_progress = if confidence >= PROGRESS_CONFIDENCE_THRESHOLD && placement < Level::MAX
    {
        format!(
            "Ready for Level {} in 4-6 weeks with regular practice",
            placement.saturating_up(1)
        )
    } else {
        "Progress varies by individual; reassess after regular practice".to_string()
    };

    Recommendations {
        immediate_focus,
        strengths_to_build_on: strengths,
        suggested_starting_point: format!("Begin at Novakid Level {placement}"),
        estimated_progress,
    }
}
