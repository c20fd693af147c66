use serde::{Deserialize, Serialize};

const DEFAULT_QUESTIONS_PER_TEST: usize = 15;
const DEFAULT_CALIBRATION_QUESTIONS: usize = 3;
const DEFAULT_PERFORMANCE_WINDOW_SIZE: usize = 5;
const DEFAULT_LEVEL_UP_THRESHOLD: f64 = 0.75;
const DEFAULT_LEVEL_DOWN_THRESHOLD: f64 = 0.30;
const DEFAULT_STRONG_JUMP_ACCURACY: f64 = 0.90;
const DEFAULT_STRONG_JUMP_STREAK: u32 = 4;
const DEFAULT_ADJUST_COOLDOWN: u32 = 2;
const DEFAULT_ADVISOR_TIMEOUT_SECONDS: u64 = 30;

/// Process-wide engine options, fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub questions_per_test: usize,
    pub calibration_questions: usize,
    pub performance_window_size: usize,
    pub level_up_threshold: f64,
    pub level_down_threshold: f64,
    pub strong_jump_accuracy: f64,
    pub strong_jump_streak: u32,
    pub adjust_cooldown: u32,
    pub advisor_timeout_seconds: u64,
    pub advisor_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            questions_per_test: DEFAULT_QUESTIONS_PER_TEST,
            calibration_questions: DEFAULT_CALIBRATION_QUESTIONS,
            performance_window_size: DEFAULT_PERFORMANCE_WINDOW_SIZE,
            level_up_threshold: DEFAULT_LEVEL_UP_THRESHOLD,
            level_down_threshold: DEFAULT_LEVEL_DOWN_THRESHOLD,
            strong_jump_accuracy: DEFAULT_STRONG_JUMP_ACCURACY,
            strong_jump_streak: DEFAULT_STRONG_JUMP_STREAK,
            adjust_cooldown: DEFAULT_ADJUST_COOLDOWN,
            advisor_timeout_seconds: DEFAULT_ADVISOR_TIMEOUT_SECONDS,
            advisor_enabled: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_usize("PLACEMENT_QUESTIONS_PER_TEST") {
            config.questions_per_test = v;
        }
        if let Some(v) = env_usize("PLACEMENT_CALIBRATION_QUESTIONS") {
            config.calibration_questions = v;
        }
        if let Some(v) = env_usize("PLACEMENT_PERFORMANCE_WINDOW_SIZE") {
            config.performance_window_size = v;
        }
        if let Some(v) = env_f64("PLACEMENT_LEVEL_UP_THRESHOLD") {
            config.level_up_threshold = v;
        }
        if let Some(v) = env_f64("PLACEMENT_LEVEL_DOWN_THRESHOLD") {
            config.level_down_threshold = v;
        }
        if let Some(v) = env_f64("PLACEMENT_STRONG_JUMP_ACCURACY") {
            config.strong_jump_accuracy = v;
        }
        if let Some(v) = env_u32("PLACEMENT_STRONG_JUMP_STREAK") {
            config.strong_jump_streak = v;
        }
        if let Some(v) = env_u32("PLACEMENT_ADJUST_COOLDOWN") {
            config.adjust_cooldown = v;
        }
        if let Some(v) = env_u64("PLACEMENT_ADVISOR_TIMEOUT") {
            config.advisor_timeout_seconds = v;
        }
        if let Some(v) = env_bool("PLACEMENT_ADVISOR_ENABLED") {
            config.advisor_enabled = v;
        }

        config
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_usize(key: &str) -> Option<usize> {
    env_string(key)?.parse().ok()
}

fn env_u32(key: &str) -> Option<u32> {
    env_string(key)?.parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

fn env_f64(key: &str) -> Option<f64> {
    env_string(key)?.parse().ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| v == "true" || v == "1")
}
