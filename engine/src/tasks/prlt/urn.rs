//! Balanced urn generator. Congruence flags are laid out in windows of ten; each window holds
//! exactly `round(len * p)` true values and is shuffled on its own, so the local feedback rate
//! never drifts more than one rounding unit per window.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

pub const URN_WINDOW: usize = 10;

/// Builds `size` congruence flags at `probability`. With `force_first_true` the very first flag
/// is pinned to `true` and the rest of the first window is shuffled around it.
pub fn create_urn<R: Rng + ?Sized>(
    rng: &mut R,
    size: usize,
    probability: f64,
    force_first_true: bool,
) -> Vec<bool> {
    let mut urn = Vec::with_capacity(size);
    let mut start = 0;

    while start < size {
        let len = URN_WINDOW.min(size - start);
        let trues = window_trues(len, probability);
        let mut window: Vec<bool> = (0..len).map(|slot| slot < trues).collect();

        if start == 0 && force_first_true {
            window[0] = true;
            let rest = &mut window[1..];
            let remaining = trues.saturating_sub(1);
            for (slot, value) in rest.iter_mut().enumerate() {
                *value = slot < remaining;
            }
            rest.shuffle(rng);
        } else {
            window.shuffle(rng);
        }

        urn.extend(window);
        start += len;
    }

    urn
}

fn window_trues(len: usize, probability: f64) -> usize {
    ((len as f64 * probability).round() as usize).min(len)
}

/// A consumable urn. Steady-state draws pop from the back; the first trial of a new block
/// shifts from the front so a forced leading flag is honoured.
#[derive(Debug, Clone)]
pub struct BalancedUrn {
    label: &'static str,
    slots: VecDeque<bool>,
    probability: f64,
    refills: u32,
}

impl BalancedUrn {
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        label: &'static str,
        size: usize,
        probability: f64,
        force_first_true: bool,
    ) -> Self {
        Self::from_slots(
            label,
            create_urn(rng, size, probability, force_first_true),
            probability,
        )
    }

    pub fn from_slots(label: &'static str, slots: Vec<bool>, probability: f64) -> Self {
        Self {
            label,
            slots: slots.into(),
            probability,
            refills: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn refills(&self) -> u32 {
        self.refills
    }

    pub fn draw_back<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<bool> {
        self.ensure_stock(rng);
        self.slots.pop_back()
    }

    pub fn draw_front<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<bool> {
        self.ensure_stock(rng);
        self.slots.pop_front()
    }

    fn ensure_stock<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if !self.slots.is_empty() {
            return;
        }
        self.refills = self.refills.saturating_add(1);
        warn!(
            urn = self.label,
            refills = self.refills,
            "feedback urn exhausted, appending a fresh balanced window"
        );
        self.slots
            .extend(create_urn(rng, URN_WINDOW, self.probability, false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn count(values: &[bool]) -> usize {
        values.iter().filter(|v| **v).count()
    }

    #[test]
    fn every_full_window_holds_the_exact_count() {
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            for &p in &[0.7, 0.8, 0.65, 0.9] {
                let urn = create_urn(&mut rng, 60, p, false);
                assert_eq!(urn.len(), 60);
                let expected = (10.0 * p).round() as usize;
                for window in urn.chunks(URN_WINDOW) {
                    assert_eq!(count(window), expected, "p={p} seed={seed}");
                }
            }
        }
    }

    #[test]
    fn short_final_window_is_rounded_on_its_own_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let urn = create_urn(&mut rng, 25, 0.7, false);
        let last = &urn[20..];
        assert_eq!(last.len(), 5);
        // round(5 * 0.7) = round(3.5) = 4
        assert_eq!(count(last), 4);
    }

    #[test]
    fn forced_first_flag_is_true_and_window_total_is_kept() {
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let urn = create_urn(&mut rng, 30, 0.7, true);
            assert!(urn[0]);
            assert_eq!(count(&urn[..10]), 7);
            assert_eq!(count(&urn[10..20]), 7);
        }
    }

    #[test]
    fn forced_flag_survives_a_zero_count_window() {
        let mut rng = StdRng::seed_from_u64(1);
        let urn = create_urn(&mut rng, 10, 0.04, true);
        assert!(urn[0]);
        assert_eq!(count(&urn), 1);
    }

    #[test]
    fn front_draw_returns_the_forced_flag() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut urn = BalancedUrn::new(&mut rng, "test", 20, 0.3, true);
        assert_eq!(urn.draw_front(&mut rng), Some(true));
        assert_eq!(urn.len(), 19);
    }

    #[test]
    fn exhausted_urn_refills_with_one_window() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut urn = BalancedUrn::from_slots("test", vec![true], 0.7);
        assert_eq!(urn.draw_back(&mut rng), Some(true));
        assert!(urn.is_empty());

        let mut drawn = Vec::new();
        for _ in 0..URN_WINDOW {
            drawn.push(urn.draw_back(&mut rng).expect("refilled"));
        }
        assert_eq!(urn.refills(), 1);
        assert_eq!(count(&drawn), 7);
        assert!(urn.is_empty());
    }
}
