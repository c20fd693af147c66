use serde::{Deserialize, Serialize};

/// Novakid level, 0 through 5. Maps 1:1 onto CEFR pre-A1..B2.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const MIN: Level = Level(0);
    /// Every session starts its estimate here.
    pub const START: Level = Level(1);
    pub const MAX: Level = Level(5);

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX.0).then_some(Self(value))
    }

    /// For in-crate literals known to be in range.
    pub(crate) const fn from_const(value: u8) -> Self {
        assert!(value <= 5);
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn cefr_label(self) -> &'static str {
        match self.0 {
            0 => "pre-A1",
            1 => "A1",
            2 => "A1+",
            3 => "A2",
            4 => "B1",
            _ => "B2",
        }
    }

    /// Curriculum gate: which mechanics may be served at this level.
    pub fn allows(self, mechanic: Mechanic) -> bool {
        match mechanic {
            Mechanic::WordPronunciationPractice => true,
            Mechanic::ImageSingleChoiceFromTexts | Mechanic::AudioSingleChoiceFromImages => {
                self.0 >= 1
            }
            Mechanic::MultipleChoiceTextText
            | Mechanic::SentencePronunciationPractice
            | Mechanic::AudioCategorySorting
            | Mechanic::SentenceScramble => self.0 >= 2,
        }
    }

    pub fn saturating_up(self, by: u8) -> Level {
        Level((self.0 + by).min(Self::MAX.0))
    }

    pub fn saturating_down(self, by: u8) -> Level {
        Level(self.0.saturating_sub(by))
    }

    pub fn all() -> impl Iterator<Item = Level> {
        (Self::MIN.0..=Self::MAX.0).map(Level)
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value).ok_or_else(|| format!("level {value} out of range 0..=5"))
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.0
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Question format tag. Wire names are the kebab-case forms used by the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mechanic {
    WordPronunciationPractice,
    SentencePronunciationPractice,
    AudioSingleChoiceFromImages,
    AudioCategorySorting,
    ImageSingleChoiceFromTexts,
    MultipleChoiceTextText,
    SentenceScramble,
}

impl Mechanic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordPronunciationPractice => "word-pronunciation-practice",
            Self::SentencePronunciationPractice => "sentence-pronunciation-practice",
            Self::AudioSingleChoiceFromImages => "audio-single-choice-from-images",
            Self::AudioCategorySorting => "audio-category-sorting",
            Self::ImageSingleChoiceFromTexts => "image-single-choice-from-texts",
            Self::MultipleChoiceTextText => "multiple-choice-text-text",
            Self::SentenceScramble => "sentence-scramble",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::WordPronunciationPractice | Self::SentencePronunciationPractice => {
                Category::Pronunciation
            }
            Self::AudioSingleChoiceFromImages | Self::AudioCategorySorting => Category::Audio,
            Self::ImageSingleChoiceFromTexts
            | Self::MultipleChoiceTextText
            | Self::SentenceScramble => Category::Text,
        }
    }

    /// The side this mechanic counts toward for 50/50 balancing.
    pub fn balance_side(&self) -> BalanceSide {
        self.category().balance_side()
    }
}

impl std::fmt::Display for Mechanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Audio,
    Text,
    Pronunciation,
}

impl Category {
    /// Pronunciation is its own category but balances under audio.
    pub fn balance_side(self) -> BalanceSide {
        match self {
            Self::Audio | Self::Pronunciation => BalanceSide::Audio,
            Self::Text => BalanceSide::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSide {
    Audio,
    Text,
}

impl BalanceSide {
    pub fn other(self) -> BalanceSide {
        match self {
            Self::Audio => Self::Text,
            Self::Text => Self::Audio,
        }
    }
}

/// Skill tested by a question. The bank generator emits a few long-form
/// labels; they fold into the canonical five on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    Pronunciation,
    #[serde(
        alias = "Vocabulary Recognition",
        alias = "Listening Comprehension"
    )]
    Vocabulary,
    Grammar,
    Reading,
    #[serde(alias = "Sentence Pronunciation")]
    Speaking,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pronunciation => "Pronunciation",
            Self::Vocabulary => "Vocabulary",
            Self::Grammar => "Grammar",
            Self::Reading => "Reading",
            Self::Speaking => "Speaking",
        }
    }

    /// Reporting bucket for the skill-analysis section.
    pub fn bucket(&self) -> SkillBucket {
        match self {
            Self::Vocabulary | Self::Reading => SkillBucket::Vocabulary,
            Self::Pronunciation | Self::Speaking => SkillBucket::Pronunciation,
            Self::Grammar => SkillBucket::Grammar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkillBucket {
    Vocabulary,
    Pronunciation,
    Grammar,
}

impl SkillBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vocabulary => "vocabulary",
            Self::Pronunciation => "pronunciation",
            Self::Grammar => "grammar",
        }
    }
}

/// One item to be placed into a category by the sorting mechanic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortItem {
    pub text: String,
    /// Index into the payload's `categories`.
    pub category: usize,
}

/// Mechanic-specific payload, discriminated by the `mechanic` field of the
/// bank record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mechanic", rename_all = "kebab-case")]
pub enum Payload {
    WordPronunciationPractice {
        target_word: String,
        phonetic: String,
        image_description: String,
    },
    SentencePronunciationPractice {
        target_sentence: String,
        phonetic: String,
        image_description: String,
    },
    AudioSingleChoiceFromImages {
        target_audio: String,
        image_options: Vec<String>,
        correct_answer: usize,
    },
    AudioCategorySorting {
        categories: Vec<String>,
        items: Vec<SortItem>,
    },
    ImageSingleChoiceFromTexts {
        image_description: String,
        options: Vec<String>,
        correct_answer: usize,
    },
    MultipleChoiceTextText {
        sentence: String,
        options: Vec<String>,
        correct_answer: usize,
    },
    SentenceScramble {
        scrambled_words: Vec<String>,
        correct_order: Vec<usize>,
    },
}

impl Payload {
    pub fn mechanic(&self) -> Mechanic {
        match self {
            Self::WordPronunciationPractice { .. } => Mechanic::WordPronunciationPractice,
            Self::SentencePronunciationPractice { .. } => Mechanic::SentencePronunciationPractice,
            Self::AudioSingleChoiceFromImages { .. } => Mechanic::AudioSingleChoiceFromImages,
            Self::AudioCategorySorting { .. } => Mechanic::AudioCategorySorting,
            Self::ImageSingleChoiceFromTexts { .. } => Mechanic::ImageSingleChoiceFromTexts,
            Self::MultipleChoiceTextText { .. } => Mechanic::MultipleChoiceTextText,
            Self::SentenceScramble { .. } => Mechanic::SentenceScramble,
        }
    }
}

/// Immutable bank record. `difficulty` is advisory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub skill: Skill,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Question {
    pub fn mechanic(&self) -> Mechanic {
        self.payload.mechanic()
    }
}

/// A question handed to the renderer, stamped with the level bucket it was
/// drawn from.
#[derive(Debug, Clone, Serialize)]
pub struct ServedQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub assigned_level: Level,
    pub is_calibration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bounds() {
        assert_eq!(Level::new(5), Some(Level::MAX));
        assert_eq!(Level::new(6), None);
        assert_eq!(Level::MAX.saturating_up(2), Level::MAX);
        assert_eq!(Level::MIN.saturating_down(1), Level::MIN);
    }

    #[test]
    fn test_level_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Level>("7").is_err());
        assert_eq!(serde_json::from_str::<Level>("3").unwrap(), Level::new(3).unwrap());
    }

    #[test]
    fn test_curriculum_gating() {
        let l0 = Level::new(0).unwrap();
        let l1 = Level::new(1).unwrap();
        let l2 = Level::new(2).unwrap();

        assert!(l0.allows(Mechanic::WordPronunciationPractice));
        assert!(!l0.allows(Mechanic::ImageSingleChoiceFromTexts));
        assert!(!l0.allows(Mechanic::AudioSingleChoiceFromImages));

        assert!(l1.allows(Mechanic::ImageSingleChoiceFromTexts));
        assert!(l1.allows(Mechanic::AudioSingleChoiceFromImages));
        assert!(!l1.allows(Mechanic::SentenceScramble));

        assert!(l2.allows(Mechanic::MultipleChoiceTextText));
        assert!(l2.allows(Mechanic::AudioCategorySorting));
        assert!(l2.allows(Mechanic::SentencePronunciationPractice));
    }

    #[test]
    fn test_cefr_mapping() {
        let labels: Vec<&str> = Level::all().map(|l| l.cefr_label()).collect();
        assert_eq!(labels, vec!["pre-A1", "A1", "A1+", "A2", "B1", "B2"]);
    }

    #[test]
    fn test_balance_sides() {
        assert_eq!(
            Mechanic::WordPronunciationPractice.balance_side(),
            BalanceSide::Audio
        );
        assert_eq!(
            Mechanic::AudioCategorySorting.balance_side(),
            BalanceSide::Audio
        );
        assert_eq!(Mechanic::SentenceScramble.balance_side(), BalanceSide::Text);
    }

    #[test]
    fn test_question_wire_format() {
        let json = r#"{
            "id": "L2_MC_001",
            "mechanic": "multiple-choice-text-text",
            "sentence": "She ___ to school every day.",
            "options": ["go", "goes", "going", "went"],
            "correct_answer": 1,
            "skill": "Grammar",
            "difficulty": 0.3
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.mechanic(), Mechanic::MultipleChoiceTextText);
        assert_eq!(q.skill, Skill::Grammar);
    }

    #[test]
    fn test_generator_skill_aliases() {
        let q: Question = serde_json::from_str(
            r#"{
                "id": "L1_IT_001",
                "mechanic": "image-single-choice-from-texts",
                "image_description": "Clock showing 3:00",
                "options": ["three o'clock", "four o'clock"],
                "correct_answer": 0,
                "skill": "Vocabulary Recognition",
                "difficulty": 0.3
            }"#,
        )
        .unwrap();
        assert_eq!(q.skill, Skill::Vocabulary);

        let q: Question = serde_json::from_str(
            r#"{
                "id": "L1_AI_001",
                "mechanic": "audio-single-choice-from-images",
                "target_audio": "elephant",
                "image_options": ["Large gray animal", "Small brown dog"],
                "correct_answer": 0,
                "skill": "Listening Comprehension",
                "difficulty": 0.3
            }"#,
        )
        .unwrap();
        assert_eq!(q.skill, Skill::Vocabulary);
    }
}
