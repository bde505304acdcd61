//! Session configuration: typed settings, validation, and the lenient string form used by
//! settings screens.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::Choice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalMode {
    /// A single reversal halfway through the session.
    Predetermined,
    /// A reversal every time the rolling accuracy criterion is met.
    Criterion,
}

impl ReversalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReversalMode::Predetermined => "predetermined",
            ReversalMode::Criterion => "criterion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomizationMethod {
    Urn,
    DenOuden,
}

impl RandomizationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RandomizationMethod::Urn => "urn",
            RandomizationMethod::DenOuden => "den_ouden",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseDeadline {
    Limited(u32),
    Unlimited,
}

impl ResponseDeadline {
    pub fn as_ms(self) -> Option<u32> {
        match self {
            ResponseDeadline::Limited(ms) => Some(ms),
            ResponseDeadline::Unlimited => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_trials: usize,
    pub reversal_mode: ReversalMode,
    pub window_size: usize,
    pub accuracy_threshold: usize,
    /// Probability that feedback agrees with the objective correctness of a choice.
    pub feedback_probability: f64,
    pub randomization_method: RandomizationMethod,
    pub feedback_duration_ms: u32,
    pub response_deadline: ResponseDeadline,
    /// Option that starts out correct. When absent the first response defines it.
    pub initial_correct: Option<Choice>,
    pub participant_id: String,
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_trials: 60,
            reversal_mode: ReversalMode::Predetermined,
            window_size: 10,
            accuracy_threshold: 8,
            feedback_probability: 0.7,
            randomization_method: RandomizationMethod::Urn,
            feedback_duration_ms: 750,
            response_deadline: ResponseDeadline::Limited(6_000),
            initial_correct: None,
            participant_id: "unknown".to_string(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_trials must be at least 1")]
    NoTrials,
    #[error("window_size must be at least 1")]
    EmptyWindow,
    #[error("accuracy_threshold {threshold} must lie in 1..={window_size}")]
    ThresholdOutOfRange { threshold: usize, window_size: usize },
    #[error("feedback_probability {value} must lie strictly between 0 and 1")]
    ProbabilityOutOfRange { value: f64 },
    #[error("response deadline must be positive or unlimited")]
    ZeroDeadline,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_trials == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.accuracy_threshold == 0 || self.accuracy_threshold > self.window_size {
            return Err(ConfigError::ThresholdOutOfRange {
                threshold: self.accuracy_threshold,
                window_size: self.window_size,
            });
        }
        let p = self.feedback_probability;
        if !(p > 0.0 && p < 1.0) {
            return Err(ConfigError::ProbabilityOutOfRange { value: p });
        }
        if self.response_deadline == ResponseDeadline::Limited(0) {
            return Err(ConfigError::ZeroDeadline);
        }
        Ok(())
    }

    /// Trial index of the single predetermined reversal, `None` in criterion mode.
    pub fn reversal_trial(&self) -> Option<usize> {
        match self.reversal_mode {
            ReversalMode::Predetermined => Some(self.max_trials / 2 + 1),
            ReversalMode::Criterion => None,
        }
    }

    /// Planned trial count before the first reversal; sizes the learning urns and decks.
    pub fn planned_learning_trials(&self) -> usize {
        match self.reversal_trial() {
            Some(trial) => trial - 1,
            None => self.max_trials,
        }
    }

    /// Planned trial count in the reversal phase. Criterion mode cannot know where the first
    /// reversal lands, so it sizes for the whole session.
    pub fn planned_reversal_trials(&self) -> usize {
        match self.reversal_mode {
            ReversalMode::Predetermined => self.max_trials - self.planned_learning_trials(),
            ReversalMode::Criterion => self.max_trials,
        }
    }

    /// Deck lengths for the learning and reversal phases. Criterion mode splits the session in
    /// half and relies on cyclic reuse.
    pub fn planned_deck_lengths(&self) -> (usize, usize) {
        let learning = self.max_trials / 2;
        match self.reversal_mode {
            ReversalMode::Predetermined => (
                self.planned_learning_trials(),
                self.planned_reversal_trials(),
            ),
            ReversalMode::Criterion => (learning, self.max_trials - learning),
        }
    }

    pub fn probability_bad(&self) -> f64 {
        1.0 - self.feedback_probability
    }

    /// Human readable reversal schedule, e.g. "trial 31" or "criterion 8/10".
    pub fn reversal_schedule(&self) -> String {
        match self.reversal_trial() {
            Some(trial) => format!("trial {trial}"),
            None => format!(
                "criterion {}/{}",
                self.accuracy_threshold, self.window_size
            ),
        }
    }
}

/// String-valued settings as they arrive from form inputs or query strings. Anything that
/// fails to parse falls back to its default with a warning; range checks still apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub max_trials: String,
    pub reversal_mode: String,
    pub window_size: String,
    pub accuracy_threshold: String,
    pub feedback_probability: String,
    pub randomization_method: String,
    pub feedback_duration_ms: String,
    pub response_deadline_ms: String,
    pub initial_correct: String,
    pub participant_id: String,
}

impl RawSettings {
    pub fn resolve(&self) -> Result<SessionConfig, ConfigError> {
        let defaults = SessionConfig::default();

        let reversal_mode = match self.reversal_mode.trim().to_ascii_lowercase().as_str() {
            "criterion" => ReversalMode::Criterion,
            "predetermined" => ReversalMode::Predetermined,
            other => {
                if !other.is_empty() {
                    warn!(field = "reversal_mode", value = other, "unknown value, using default");
                }
                defaults.reversal_mode
            }
        };

        let randomization_method =
            match self.randomization_method.trim().to_ascii_lowercase().as_str() {
                "urn" => RandomizationMethod::Urn,
                "denouden" | "den_ouden" | "den-ouden" => RandomizationMethod::DenOuden,
                other => {
                    if !other.is_empty() {
                        warn!(
                            field = "randomization_method",
                            value = other,
                            "unknown value, using default"
                        );
                    }
                    defaults.randomization_method
                }
            };

        let response_deadline = match self.response_deadline_ms.trim() {
            "none" | "None" | "unlimited" => ResponseDeadline::Unlimited,
            raw => ResponseDeadline::Limited(parse_or_default(
                "response_deadline_ms",
                raw,
                defaults.response_deadline.as_ms().unwrap_or(6_000),
            )),
        };

        let initial_correct = match self.initial_correct.trim() {
            "A" | "a" => Some(Choice::A),
            "B" | "b" => Some(Choice::B),
            _ => None,
        };

        let participant_id = match self.participant_id.trim() {
            "" => defaults.participant_id.clone(),
            id => id.to_string(),
        };

        let config = SessionConfig {
            max_trials: parse_or_default("max_trials", &self.max_trials, defaults.max_trials),
            reversal_mode,
            window_size: parse_or_default("window_size", &self.window_size, defaults.window_size),
            accuracy_threshold: parse_or_default(
                "accuracy_threshold",
                &self.accuracy_threshold,
                defaults.accuracy_threshold,
            ),
            feedback_probability: parse_or_default(
                "feedback_probability",
                &self.feedback_probability,
                defaults.feedback_probability,
            ),
            randomization_method,
            feedback_duration_ms: parse_or_default(
                "feedback_duration_ms",
                &self.feedback_duration_ms,
                defaults.feedback_duration_ms,
            ),
            response_deadline,
            initial_correct,
            participant_id,
            seed: None,
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_or_default<T>(field: &'static str, raw: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default;
    }
    match trimmed.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(field, value = trimmed, %default, "could not parse setting, using default");
            default
        }
    }
}
