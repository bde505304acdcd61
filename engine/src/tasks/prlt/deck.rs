//! den Ouden style decks: an exact global proportion of congruent flags, reshuffled until no
//! run of identical values is longer than three. Decks are consumed cyclically.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

pub const MAX_RUN: usize = 3;
pub const MAX_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct DeckOutcome {
    pub cards: Vec<bool>,
    /// `false` when the attempt budget ran out and `cards` still has an over-long run.
    pub valid: bool,
    pub attempts: u32,
}

pub fn generate_deck<R: Rng + ?Sized>(rng: &mut R, num_trials: usize, probability: f64) -> DeckOutcome {
    let trues = ((num_trials as f64 * probability).round() as usize).min(num_trials);
    let mut cards: Vec<bool> = (0..num_trials).map(|slot| slot < trues).collect();

    let mut attempts = 0;
    while attempts < MAX_ATTEMPTS {
        attempts += 1;
        cards.shuffle(rng);
        if longest_run(&cards) <= MAX_RUN {
            debug!(num_trials, attempts, "den Ouden deck accepted");
            return DeckOutcome {
                cards,
                valid: true,
                attempts,
            };
        }
    }

    warn!(
        num_trials,
        probability,
        attempts,
        "no den Ouden arrangement without long runs found, keeping the last shuffle"
    );
    DeckOutcome {
        cards,
        valid: false,
        attempts,
    }
}

/// Length of the longest run of identical values.
pub fn longest_run(values: &[bool]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for &value in values {
        if previous == Some(value) {
            current += 1;
        } else {
            current = 1;
            previous = Some(value);
        }
        longest = longest.max(current);
    }
    longest
}

#[derive(Debug, Clone)]
pub struct DenOudenDeck {
    cards: Vec<bool>,
    cursor: usize,
}

impl DenOudenDeck {
    pub fn new<R: Rng + ?Sized>(rng: &mut R, num_trials: usize, probability: f64) -> Self {
        Self::from_cards(generate_deck(rng, num_trials, probability).cards)
    }

    pub fn from_cards(cards: Vec<bool>) -> Self {
        Self { cards, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Next card, wrapping to the start once the deck is used up. `None` for an empty deck.
    pub fn draw(&mut self) -> Option<bool> {
        if self.cards.is_empty() {
            return None;
        }
        let card = self.cards[self.cursor % self.cards.len()];
        self.cursor += 1;
        Some(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn valid_decks_have_exact_counts_and_short_runs() {
        for seed in 0..25u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            for &(n, p) in &[(30usize, 0.7), (20, 0.7), (17, 0.6), (20, 0.5)] {
                let deck = generate_deck(&mut rng, n, p);
                assert!(deck.valid, "n={n} p={p} seed={seed}");
                assert_eq!(deck.cards.len(), n);
                let expected = (n as f64 * p).round() as usize;
                assert_eq!(deck.cards.iter().filter(|c| **c).count(), expected);
                assert!(longest_run(&deck.cards) <= MAX_RUN);
            }
        }
    }

    #[test]
    fn impossible_proportions_exhaust_the_budget_and_keep_the_last_shuffle() {
        let mut rng = StdRng::seed_from_u64(2);
        // 19 of 20 congruent cannot avoid a run of four.
        let deck = generate_deck(&mut rng, 20, 0.95);
        assert!(!deck.valid);
        assert_eq!(deck.attempts, MAX_ATTEMPTS);
        assert_eq!(deck.cards.len(), 20);
        assert_eq!(deck.cards.iter().filter(|c| **c).count(), 19);
    }

    #[test]
    fn decks_wrap_around() {
        let mut deck = DenOudenDeck::from_cards(vec![true, false, false]);
        let drawn: Vec<_> = (0..5).map(|_| deck.draw()).collect();
        assert_eq!(
            drawn,
            vec![Some(true), Some(false), Some(false), Some(true), Some(false)]
        );
    }

    #[test]
    fn empty_deck_draws_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut deck = DenOudenDeck::new(&mut rng, 0, 0.7);
        assert!(deck.is_empty());
        assert_eq!(deck.draw(), None);
    }

    #[test]
    fn run_length_scan() {
        assert_eq!(longest_run(&[]), 0);
        assert_eq!(longest_run(&[true, true, false, false, false, true]), 3);
        assert_eq!(longest_run(&[false; 5]), 5);
    }
}
