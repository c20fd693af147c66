//! Placement report emitted at end of test. The shape is shared by the
//! rule-based fallback and the advisory analyzer, so a validated advisory
//! report can replace the fallback verbatim.

use serde::{Deserialize, Serialize};

use crate::bank::Level;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementReport {
    pub placement: Placement,
    pub skill_analysis: SkillAnalysis,
    pub recommendations: Recommendations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub novakid_level: Level,
    pub confidence: f64,
    pub cefr_equivalent: String,
    pub level_justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAnalysis {
    pub vocabulary: SkillReport,
    pub pronunciation: SkillReport,
    pub grammar: SkillReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillReport {
    /// Accuracy in [0, 1]; `None` when no question exercised the skill.
    pub score: Option<f64>,
    pub evidence: Vec<String>,
}

impl SkillReport {
    pub fn insufficient() -> Self {
        Self {
            score: None,
            evidence: vec!["insufficient-evidence".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub immediate_focus: Vec<String>,
    pub strengths_to_build_on: Vec<String>,
    pub suggested_starting_point: String,
    pub estimated_progress: String,
}
