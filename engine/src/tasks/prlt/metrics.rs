//! Behavioural aggregates for reversal-learning sessions.

use serde::{Deserialize, Serialize};

use super::config::ReversalMode;
use super::engine::{PrltTrial, SessionOutcome};
use super::{Choice, Phase};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PrltMetrics {
    pub total_trials: usize,
    pub valid_trials: usize,
    pub omissions: usize,
    pub learning_trials: usize,
    pub reversal_trials: usize,
    pub accuracy: f64,
    pub accuracy_learning: f64,
    pub accuracy_reversal: f64,
    pub mean_rt_ms: f64,
    pub median_rt_ms: f64,
    pub mean_rt_learning_ms: f64,
    pub mean_rt_reversal_ms: f64,
    /// Reversal-phase RT split by the feedback shown on the same trial.
    pub mean_rt_reversal_positive_ms: f64,
    pub mean_rt_reversal_negative_ms: f64,
    pub reward_rate_learning: f64,
    pub reward_rate_reversal: f64,
    pub icv_global: f64,
    pub icv_learning: f64,
    pub icv_reversal: f64,
    pub transitions: TransitionRates,
    pub perseverative_errors: u32,
    pub regressive_errors: u32,
    /// Perseverative trials that sit in runs of two or more.
    pub perseverative_streak_trials: u32,
    pub perseverative_episodes: u32,
    pub trials_to_first_criterion: Option<usize>,
    pub trials_to_reversal_criterion: Option<usize>,
    pub criterion: Option<CriterionMetrics>,
    pub audit: FeedbackAudit,
}

/// First-order choice transitions over consecutive answered trials.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct TransitionRates {
    pub win_stay: f64,
    pub win_switch: f64,
    pub lose_stay: f64,
    pub lose_shift: f64,
    /// Switch rate after a punished choice that was objectively correct.
    pub invalid_loss_switch: f64,
    /// Switch rate after any misleading feedback.
    pub probabilistic_switch: f64,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct CriterionMetrics {
    pub reversals: usize,
    pub mean_errors_per_reversal: f64,
    pub mean_trials_to_criterion: f64,
}

/// Objective correctness crossed with shown feedback, and the observed reward rate per option,
/// for one phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PhaseAudit {
    pub correct_rewarded: u32,
    pub correct_punished: u32,
    pub incorrect_rewarded: u32,
    pub incorrect_punished: u32,
    pub option_a_chosen: u32,
    pub option_a_rewarded: u32,
    pub option_b_chosen: u32,
    pub option_b_rewarded: u32,
}

impl PhaseAudit {
    fn record(&mut self, trial: &PrltTrial) {
        let (Some(choice), Some(shown)) = (trial.choice, trial.feedback_shown) else {
            return;
        };
        match (trial.actually_correct, shown) {
            (true, true) => self.correct_rewarded += 1,
            (true, false) => self.correct_punished += 1,
            (false, true) => self.incorrect_rewarded += 1,
            (false, false) => self.incorrect_punished += 1,
        }
        match choice {
            Choice::A => {
                self.option_a_chosen += 1;
                self.option_a_rewarded += u32::from(shown);
            }
            Choice::B => {
                self.option_b_chosen += 1;
                self.option_b_rewarded += u32::from(shown);
            }
        }
    }

    /// Observed reward probability and sample size for `choice`.
    pub fn observed(&self, choice: Choice) -> (f64, u32) {
        let (chosen, rewarded) = match choice {
            Choice::A => (self.option_a_chosen, self.option_a_rewarded),
            Choice::B => (self.option_b_chosen, self.option_b_rewarded),
        };
        (ratio(rewarded as usize, chosen as usize), chosen)
    }

    /// Share of objectively correct choices that were rewarded.
    pub fn congruent_rate_correct(&self) -> f64 {
        ratio(
            self.correct_rewarded as usize,
            (self.correct_rewarded + self.correct_punished) as usize,
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FeedbackAudit {
    pub learning: PhaseAudit,
    pub reversal: PhaseAudit,
}

impl FeedbackAudit {
    pub fn phase(&self, phase: Phase) -> &PhaseAudit {
        match phase {
            Phase::Learning => &self.learning,
            Phase::Reversal => &self.reversal,
        }
    }
}

impl PrltMetrics {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_session(outcome: &SessionOutcome) -> Self {
        let trials = &outcome.trials;
        if trials.is_empty() {
            return Self::default();
        }

        let valid: Vec<&PrltTrial> = outcome.valid_trials().collect();
        let learning: Vec<&PrltTrial> = valid
            .iter()
            .copied()
            .filter(|t| t.phase() == Phase::Learning)
            .collect();
        let reversal: Vec<&PrltTrial> = valid
            .iter()
            .copied()
            .filter(|t| t.phase() == Phase::Reversal)
            .collect();

        let rts = rts_of(&valid);
        let learning_rts = rts_of(&learning);
        let reversal_rts = rts_of(&reversal);
        let positive_rts: Vec<f64> = reversal
            .iter()
            .filter(|t| t.feedback_shown == Some(true))
            .map(|t| t.rt_ms as f64)
            .collect();
        let negative_rts: Vec<f64> = reversal
            .iter()
            .filter(|t| t.feedback_shown == Some(false))
            .map(|t| t.rt_ms as f64)
            .collect();

        let mut sorted_rts = rts.clone();
        sorted_rts.sort_by(f64::total_cmp);

        let (streak_trials, episodes) = perseverative_streaks(&reversal);

        let mut audit = FeedbackAudit::default();
        for trial in &valid {
            match trial.phase() {
                Phase::Learning => audit.learning.record(trial),
                Phase::Reversal => audit.reversal.record(trial),
            }
        }

        let milestones = outcome.milestones;
        let trials_to_reversal_criterion = match outcome.config.reversal_mode {
            ReversalMode::Predetermined => milestones
                .reversal_learning_trial
                .zip(milestones.reversal_trial)
                .map(|(learned, reversed)| (learned + 1).saturating_sub(reversed)),
            ReversalMode::Criterion => milestones.reversal_learning_trial,
        };

        let criterion = match outcome.config.reversal_mode {
            ReversalMode::Criterion if !outcome.reversal_summaries.is_empty() => {
                let n = outcome.reversal_summaries.len();
                let errors: u32 = outcome.reversal_summaries.iter().map(|s| s.errors).sum();
                let to_criterion: u32 = outcome.reversal_summaries.iter().map(|s| s.trials).sum();
                Some(CriterionMetrics {
                    reversals: n,
                    mean_errors_per_reversal: errors as f64 / n as f64,
                    mean_trials_to_criterion: to_criterion as f64 / n as f64,
                })
            }
            _ => None,
        };

        Self {
            total_trials: trials.len(),
            valid_trials: valid.len(),
            omissions: trials.len() - valid.len(),
            learning_trials: learning.len(),
            reversal_trials: reversal.len(),
            accuracy: accuracy(&valid),
            accuracy_learning: accuracy(&learning),
            accuracy_reversal: accuracy(&reversal),
            mean_rt_ms: mean(&rts),
            median_rt_ms: percentile(&sorted_rts, 0.5),
            mean_rt_learning_ms: mean(&learning_rts),
            mean_rt_reversal_ms: mean(&reversal_rts),
            mean_rt_reversal_positive_ms: mean(&positive_rts),
            mean_rt_reversal_negative_ms: mean(&negative_rts),
            reward_rate_learning: reward_rate(&learning),
            reward_rate_reversal: reward_rate(&reversal),
            icv_global: icv(&rts),
            icv_learning: icv(&learning_rts),
            icv_reversal: icv(&reversal_rts),
            transitions: TransitionRates::from_valid(&valid),
            perseverative_errors: reversal.iter().filter(|t| t.is_perseverative).count() as u32,
            regressive_errors: reversal.iter().filter(|t| t.is_regressive).count() as u32,
            perseverative_streak_trials: streak_trials,
            perseverative_episodes: episodes,
            trials_to_first_criterion: milestones.first_learning_trial,
            trials_to_reversal_criterion,
            criterion,
            audit,
        }
    }
}

impl TransitionRates {
    fn from_valid(valid: &[&PrltTrial]) -> Self {
        let mut wins = 0u32;
        let mut win_stays = 0u32;
        let mut losses = 0u32;
        let mut lose_shifts = 0u32;
        let mut invalid_losses = 0u32;
        let mut invalid_loss_switches = 0u32;
        let mut misleading = 0u32;
        let mut misleading_switches = 0u32;

        for pair in valid.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let switched = prev.choice != next.choice;
            let won = prev.feedback_shown == Some(true);

            if won {
                wins += 1;
                win_stays += u32::from(!switched);
            } else {
                losses += 1;
                lose_shifts += u32::from(switched);
                if prev.misleading {
                    invalid_losses += 1;
                    invalid_loss_switches += u32::from(switched);
                }
            }
            if prev.misleading {
                misleading += 1;
                misleading_switches += u32::from(switched);
            }
        }

        let win_stay = ratio(win_stays as usize, wins as usize);
        let lose_shift = ratio(lose_shifts as usize, losses as usize);
        Self {
            win_stay,
            win_switch: if wins > 0 { 1.0 - win_stay } else { 0.0 },
            lose_stay: if losses > 0 { 1.0 - lose_shift } else { 0.0 },
            lose_shift,
            invalid_loss_switch: ratio(invalid_loss_switches as usize, invalid_losses as usize),
            probabilistic_switch: ratio(misleading_switches as usize, misleading as usize),
            wins,
            losses,
        }
    }
}

/// Counts perseverative trials in runs of at least two, and the number of such runs, over the
/// answered reversal-phase trials (reversal trials themselves excluded).
fn perseverative_streaks(reversal: &[&PrltTrial]) -> (u32, u32) {
    let mut streak_trials = 0u32;
    let mut episodes = 0u32;
    let mut run = 0u32;

    let mut close_run = |run: &mut u32| {
        if *run >= 2 {
            streak_trials += *run;
            episodes += 1;
        }
        *run = 0;
    };

    for trial in reversal.iter().filter(|t| !t.is_reversal_trial) {
        if trial.is_perseverative {
            run += 1;
        } else {
            close_run(&mut run);
        }
    }
    close_run(&mut run);

    (streak_trials, episodes)
}

fn rts_of(trials: &[&PrltTrial]) -> Vec<f64> {
    trials.iter().map(|t| t.rt_ms as f64).collect()
}

fn accuracy(trials: &[&PrltTrial]) -> f64 {
    ratio(trials.iter().filter(|t| t.actually_correct).count(), trials.len())
}

fn reward_rate(trials: &[&PrltTrial]) -> f64 {
    ratio(
        trials
            .iter()
            .filter(|t| t.feedback_shown == Some(true))
            .count(),
        trials.len(),
    )
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        0.0
    } else {
        data.iter().sum::<f64>() / data.len() as f64
    }
}

/// Intra-individual coefficient of variation: population SD over mean, 0 when undefined.
pub fn icv(data: &[f64]) -> f64 {
    let m = mean(data);
    if data.is_empty() || m <= 0.0 {
        return 0.0;
    }
    let variance = data.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / data.len() as f64;
    variance.sqrt() / m
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = pct.clamp(0.0, 1.0) * (sorted.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * weight
    }
}
