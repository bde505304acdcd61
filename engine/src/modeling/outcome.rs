//! Outcome coding shared by the learning models.

use serde::{Deserialize, Serialize};

use crate::tasks::prlt::PrltTrial;

/// Feedback shown on an answered trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Reward,
    Punishment,
}

impl Outcome {
    pub fn from_feedback(shown: bool) -> Self {
        if shown {
            Outcome::Reward
        } else {
            Outcome::Punishment
        }
    }

    pub fn is_reward(self) -> bool {
        self == Outcome::Reward
    }

    pub fn as_zero_one(self) -> f64 {
        match self {
            Outcome::Reward => 1.0,
            Outcome::Punishment => 0.0,
        }
    }

    pub fn as_plus_minus_one(self) -> f64 {
        match self {
            Outcome::Reward => 1.0,
            Outcome::Punishment => -1.0,
        }
    }
}

/// Reward coding a model learns from, together with its matching initial value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// Rewards in {0, 1}, values start at 0.5.
    ZeroOne,
    /// Rewards in {-1, +1}, values start at 0 (fictitious-play convention).
    PlusMinusOne,
}

impl Encoding {
    pub fn q0(self) -> f64 {
        match self {
            Encoding::ZeroOne => 0.5,
            Encoding::PlusMinusOne => 0.0,
        }
    }

    pub fn code(self, outcome: Outcome) -> f64 {
        match self {
            Encoding::ZeroOne => outcome.as_zero_one(),
            Encoding::PlusMinusOne => outcome.as_plus_minus_one(),
        }
    }
}

/// Choice indices (A = 0, B = 1) paired with shown outcomes, answered trials only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceData {
    choices: Vec<usize>,
    outcomes: Vec<Outcome>,
}

impl ChoiceData {
    pub fn from_trials(trials: &[PrltTrial]) -> Self {
        let (choices, outcomes) = trials
            .iter()
            .filter_map(|trial| match (trial.choice, trial.feedback_shown) {
                (Some(choice), Some(shown)) if !trial.is_omission => {
                    Some((choice.index(), Outcome::from_feedback(shown)))
                }
                _ => None,
            })
            .unzip();
        Self { choices, outcomes }
    }

    /// Builds data from raw indices and 0/1 rewards. Extra entries in the longer slice are
    /// dropped.
    pub fn from_parts(choices: &[usize], rewards: &[u8]) -> Self {
        let (choices, outcomes) = choices
            .iter()
            .zip(rewards)
            .map(|(&choice, &reward)| (choice.min(1), Outcome::from_feedback(reward > 0)))
            .unzip();
        Self { choices, outcomes }
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Outcome)> + '_ {
        self.choices.iter().copied().zip(self.outcomes.iter().copied())
    }
}
