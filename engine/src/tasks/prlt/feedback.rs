//! Feedback selection. A source yields a congruence flag for the current phase and objective
//! correctness; the flag decides whether the shown feedback tells the truth.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use super::config::{RandomizationMethod, SessionConfig};
use super::deck::DenOudenDeck;
use super::urn::BalancedUrn;
use super::Phase;

/// Shown feedback for a choice: the truth when `congruent`, its inverse otherwise.
pub fn combine(was_correct: bool, congruent: bool) -> bool {
    if congruent {
        was_correct
    } else {
        !was_correct
    }
}

pub trait FeedbackSource {
    /// Next congruence flag for `phase` and `was_correct`. `block_start` is set on the trial
    /// that opens a new reversal block. `None` when the source has nothing to give.
    fn draw_congruence(&mut self, phase: Phase, was_correct: bool, block_start: bool)
        -> Option<bool>;

    /// Feedback to display. Falls back to the truth when no flag is available.
    fn feedback(&mut self, phase: Phase, was_correct: bool, block_start: bool) -> bool {
        match self.draw_congruence(phase, was_correct, block_start) {
            Some(congruent) => combine(was_correct, congruent),
            None => {
                warn!(
                    ?phase,
                    was_correct, "no congruence flag available, showing truthful feedback"
                );
                was_correct
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrnSet {
    pub learning_correct: BalancedUrn,
    pub learning_incorrect: BalancedUrn,
    pub reversal_correct: BalancedUrn,
    pub reversal_incorrect: BalancedUrn,
}

impl UrnSet {
    fn select(&mut self, phase: Phase, was_correct: bool) -> &mut BalancedUrn {
        match (phase, was_correct) {
            (Phase::Learning, true) => &mut self.learning_correct,
            (Phase::Learning, false) => &mut self.learning_incorrect,
            (Phase::Reversal, true) => &mut self.reversal_correct,
            (Phase::Reversal, false) => &mut self.reversal_incorrect,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeckSet {
    pub learning_correct: DenOudenDeck,
    pub learning_incorrect: DenOudenDeck,
    pub reversal_correct: DenOudenDeck,
    pub reversal_incorrect: DenOudenDeck,
}

impl DeckSet {
    fn select(&mut self, phase: Phase, was_correct: bool) -> &mut DenOudenDeck {
        match (phase, was_correct) {
            (Phase::Learning, true) => &mut self.learning_correct,
            (Phase::Learning, false) => &mut self.learning_incorrect,
            (Phase::Reversal, true) => &mut self.reversal_correct,
            (Phase::Reversal, false) => &mut self.reversal_incorrect,
        }
    }
}

/// The two randomization strategies, chosen once when the session is configured.
#[derive(Debug, Clone)]
pub enum FeedbackProvider {
    Urn { urns: Box<UrnSet>, rng: StdRng },
    DenOuden { decks: Box<DeckSet> },
}

impl FeedbackProvider {
    /// Builds the four urns or decks for `config`, seeded from `config.seed` when present.
    pub fn from_config(config: &SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: &SessionConfig, mut rng: StdRng) -> Self {
        let p = config.feedback_probability;
        match config.randomization_method {
            RandomizationMethod::Urn => {
                let learning = config.planned_learning_trials();
                let reversal = config.planned_reversal_trials();
                let urns = UrnSet {
                    learning_correct: BalancedUrn::new(&mut rng, "learning_correct", learning, p, false),
                    learning_incorrect: BalancedUrn::new(
                        &mut rng,
                        "learning_incorrect",
                        learning,
                        p,
                        false,
                    ),
                    reversal_correct: BalancedUrn::new(&mut rng, "reversal_correct", reversal, p, true),
                    reversal_incorrect: BalancedUrn::new(
                        &mut rng,
                        "reversal_incorrect",
                        reversal,
                        p,
                        false,
                    ),
                };
                FeedbackProvider::Urn {
                    urns: Box::new(urns),
                    rng,
                }
            }
            RandomizationMethod::DenOuden => {
                let (learning, reversal) = config.planned_deck_lengths();
                let decks = DeckSet {
                    learning_correct: DenOudenDeck::new(&mut rng, learning, p),
                    learning_incorrect: DenOudenDeck::new(&mut rng, learning, p),
                    reversal_correct: DenOudenDeck::new(&mut rng, reversal, p),
                    reversal_incorrect: DenOudenDeck::new(&mut rng, reversal, p),
                };
                FeedbackProvider::DenOuden {
                    decks: Box::new(decks),
                }
            }
        }
    }

    pub fn method(&self) -> RandomizationMethod {
        match self {
            FeedbackProvider::Urn { .. } => RandomizationMethod::Urn,
            FeedbackProvider::DenOuden { .. } => RandomizationMethod::DenOuden,
        }
    }
}

impl FeedbackSource for FeedbackProvider {
    fn draw_congruence(
        &mut self,
        phase: Phase,
        was_correct: bool,
        block_start: bool,
    ) -> Option<bool> {
        match self {
            FeedbackProvider::Urn { urns, rng } => {
                let urn = urns.select(phase, was_correct);
                if block_start {
                    urn.draw_front(rng)
                } else {
                    urn.draw_back(rng)
                }
            }
            FeedbackProvider::DenOuden { decks } => decks.select(phase, was_correct).draw(),
        }
    }
}
