//! Probabilistic reversal-learning task: two options, probabilistic feedback, unannounced
//! reversals of which option is objectively correct.

pub mod agent;
pub mod config;
pub mod deck;
pub mod engine;
pub mod feedback;
pub mod metrics;
pub mod reconcile;
pub mod runner;
pub mod urn;

use serde::{Deserialize, Serialize};

pub use config::{
    ConfigError, RandomizationMethod, RawSettings, ResponseDeadline, ReversalMode, SessionConfig,
};
pub use engine::{EngineError, FeedbackDecision, PrltEngine, PrltTrial, SessionState};
pub use feedback::{FeedbackProvider, FeedbackSource};
pub use metrics::PrltMetrics;

/// One of the two response options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

impl Choice {
    pub fn other(self) -> Self {
        match self {
            Choice::A => Choice::B,
            Choice::B => Choice::A,
        }
    }

    /// Binary indicator used by the learning models (A = 0, B = 1).
    pub fn index(self) -> usize {
        match self {
            Choice::A => 0,
            Choice::B => 1,
        }
    }

    /// 1-based code used by exports (A = 1, B = 2).
    pub fn code(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            Choice::A
        } else {
            Choice::B
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
        }
    }
}

/// Learning block before the first reversal, reversal phase from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Learning,
    Reversal,
}

impl Phase {
    pub fn from_flag(in_reversal_phase: bool) -> Self {
        if in_reversal_phase {
            Phase::Reversal
        } else {
            Phase::Learning
        }
    }
}
