//! The eight learning models and their negative log-likelihoods.
//!
//! Every model turns per-option values into choice probabilities with a two-option softmax
//! evaluated through log-sum-exp. Probabilities are floored at [`EPS`] before the log so a
//! confidently wrong prediction costs a large but finite penalty.

use serde::{Deserialize, Serialize};

use super::grid::{ALPHAS, BETAS, PHIS, RHOS_EWA, RHOS_SENS, RHOS_SENS_DU, TAUS};
use super::outcome::{ChoiceData, Encoding, Outcome};

pub const EPS: f64 = 1e-9;
pub const BETA_MIN: f64 = 1e-6;
pub const BETA_MAX: f64 = 20.0;
pub const TAU_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    /// Single learning rate, rewards in {0,1}.
    SingleRate,
    /// Single learning rate, rewards in {-1,+1}.
    SingleRateFictitious,
    /// Separate rates after rewards and punishments, {0,1}.
    DualRate,
    /// Separate rates after rewards and punishments, {-1,+1}.
    DualRateFictitious,
    /// Single rate plus a bonus for repeating the previous choice.
    Sticky,
    /// Step size alpha * rho with unit inverse temperature.
    ReinforcementSensitivity,
    /// Separate sensitivities to wins and losses, unit inverse temperature.
    DualSensitivity,
    /// Experience-weighted attraction.
    Ewa,
}

impl ModelKind {
    pub const ALL: [ModelKind; 8] = [
        ModelKind::SingleRate,
        ModelKind::SingleRateFictitious,
        ModelKind::DualRate,
        ModelKind::DualRateFictitious,
        ModelKind::Sticky,
        ModelKind::ReinforcementSensitivity,
        ModelKind::DualSensitivity,
        ModelKind::Ewa,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::SingleRate => "AB",
            ModelKind::SingleRateFictitious => "AB_fictitious",
            ModelKind::DualRate => "ABdual",
            ModelKind::DualRateFictitious => "ABdual_fictitious",
            ModelKind::Sticky => "AB_sticky",
            ModelKind::ReinforcementSensitivity => "RS",
            ModelKind::DualSensitivity => "DU2RHO",
            ModelKind::Ewa => "EWA",
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::SingleRate | ModelKind::SingleRateFictitious => &["alpha", "beta"],
            ModelKind::DualRate | ModelKind::DualRateFictitious => {
                &["alpha_pos", "alpha_neg", "beta"]
            }
            ModelKind::Sticky => &["alpha", "beta", "tau"],
            ModelKind::ReinforcementSensitivity => &["alpha", "rho"],
            ModelKind::DualSensitivity => &["alpha", "rho_win", "rho_loss"],
            ModelKind::Ewa => &["phi", "rho", "beta"],
        }
    }

    /// Grid axes in `param_names` order.
    pub fn axes(self) -> Vec<&'static [f64]> {
        let alphas: &'static [f64] = &ALPHAS;
        let betas: &'static [f64] = &BETAS;
        let taus: &'static [f64] = &TAUS;
        let phis: &'static [f64] = &PHIS;
        let rhos_ewa: &'static [f64] = &RHOS_EWA;
        let rhos_sens: &'static [f64] = &RHOS_SENS;
        let rhos_du: &'static [f64] = &RHOS_SENS_DU;
        match self {
            ModelKind::SingleRate | ModelKind::SingleRateFictitious => vec![alphas, betas],
            ModelKind::DualRate | ModelKind::DualRateFictitious => vec![alphas, alphas, betas],
            ModelKind::Sticky => vec![alphas, betas, taus],
            ModelKind::ReinforcementSensitivity => vec![alphas, rhos_sens],
            ModelKind::DualSensitivity => vec![alphas, rhos_du, rhos_du],
            ModelKind::Ewa => vec![phis, rhos_ewa, betas],
        }
    }

    pub fn encoding(self) -> Encoding {
        match self {
            ModelKind::SingleRate
            | ModelKind::DualRate
            | ModelKind::Sticky
            | ModelKind::ReinforcementSensitivity => Encoding::ZeroOne,
            ModelKind::SingleRateFictitious
            | ModelKind::DualRateFictitious
            | ModelKind::DualSensitivity
            | ModelKind::Ewa => Encoding::PlusMinusOne,
        }
    }

    /// Negative log-likelihood of `data` at `params` (in `param_names` order). Missing
    /// parameters read as zero.
    pub fn nll(self, data: &ChoiceData, params: &[f64]) -> f64 {
        let p = |i: usize| params.get(i).copied().unwrap_or(0.0);
        let encoding = self.encoding();
        match self {
            ModelKind::SingleRate | ModelKind::SingleRateFictitious => {
                let alpha = unit(p(0));
                delta_rule_nll(data, encoding, beta(p(1)), 0.0, |_| alpha)
            }
            ModelKind::DualRate | ModelKind::DualRateFictitious => {
                let (pos, neg) = (unit(p(0)), unit(p(1)));
                delta_rule_nll(data, encoding, beta(p(2)), 0.0, |outcome| {
                    if outcome.is_reward() {
                        pos
                    } else {
                        neg
                    }
                })
            }
            ModelKind::Sticky => {
                let alpha = unit(p(0));
                let tau = p(2).clamp(0.0, TAU_MAX);
                delta_rule_nll(data, encoding, beta(p(1)), tau, |_| alpha)
            }
            ModelKind::ReinforcementSensitivity => {
                let step = unit(p(0)) * unit(p(1));
                delta_rule_nll(data, encoding, 1.0, 0.0, |_| step)
            }
            ModelKind::DualSensitivity => {
                let alpha = unit(p(0));
                let (win, loss) = (alpha * unit(p(1)), alpha * unit(p(2)));
                delta_rule_nll(data, encoding, 1.0, 0.0, |outcome| {
                    if outcome.is_reward() {
                        win
                    } else {
                        loss
                    }
                })
            }
            ModelKind::Ewa => ewa_nll(data, unit(p(0)), unit(p(1)), beta(p(2))),
        }
    }
}

fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn beta(value: f64) -> f64 {
    value.clamp(BETA_MIN, BETA_MAX)
}

/// `-ln P(choice)` under a two-option softmax over `logits`.
pub fn choice_nll(logits: [f64; 2], choice: usize) -> f64 {
    let max = logits[0].max(logits[1]);
    let lse = max + ((logits[0] - max).exp() + (logits[1] - max).exp()).ln();
    let prob = (logits[choice.min(1)] - lse).exp();
    -prob.max(EPS).ln()
}

/// Probability of choosing option B given values and inverse temperature.
pub fn prob_b(values: [f64; 2], beta: f64) -> f64 {
    (-choice_nll([beta * values[0], beta * values[1]], 1)).exp()
}

fn delta_rule_nll(
    data: &ChoiceData,
    encoding: Encoding,
    beta: f64,
    tau: f64,
    step: impl Fn(Outcome) -> f64,
) -> f64 {
    let mut q = [encoding.q0(); 2];
    let mut previous: Option<usize> = None;
    let mut nll = 0.0;

    for (choice, outcome) in data.iter() {
        let mut logits = [beta * q[0], beta * q[1]];
        if let Some(prev) = previous {
            logits[prev] += tau;
        }
        nll += choice_nll(logits, choice);

        let reward = encoding.code(outcome);
        q[choice] += step(outcome) * (reward - q[choice]);
        previous = Some(choice);
    }

    nll
}

fn ewa_nll(data: &ChoiceData, phi: f64, rho: f64, beta: f64) -> f64 {
    let mut attraction = [0.0f64; 2];
    let mut experience = 1.0f64;
    let mut nll = 0.0;

    for (choice, outcome) in data.iter() {
        nll += choice_nll([beta * attraction[0], beta * attraction[1]], choice);

        let reward = outcome.as_plus_minus_one();
        let next = rho * experience + 1.0;
        let other = 1 - choice;
        attraction[choice] = (phi * experience * attraction[choice] + reward) / next;
        attraction[other] = phi * experience * attraction[other] / next;
        experience = next;
    }

    nll
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_data() -> ChoiceData {
        ChoiceData::from_parts(&[1, 0, 0, 0, 1, 1, 1, 1, 1, 1], &[1, 1, 0, 0, 1, 1, 1, 1, 0, 1])
    }

    #[test]
    fn single_rate_matches_reference_value() {
        let nll = ModelKind::SingleRate.nll(&reference_data(), &[0.173, 15.0]);
        assert!((nll - 4.759389).abs() < 1e-3, "nll = {nll}");
    }

    #[test]
    fn no_learning_gives_chance_likelihood() {
        let data = reference_data();
        let nll = ModelKind::SingleRate.nll(&data, &[0.0, 5.0]);
        assert!((nll - 10.0 * std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn softmax_survives_extreme_logits() {
        let nll = choice_nll([1_000.0, -1_000.0], 1);
        assert!(nll.is_finite());
        assert!((nll - (-EPS.ln())).abs() < 1e-9);
        assert!(choice_nll([1_000.0, -1_000.0], 0) < 1e-12);
    }

    #[test]
    fn parameters_are_clamped() {
        let data = reference_data();
        let clamped = ModelKind::SingleRate.nll(&data, &[0.5, 20.0]);
        let wild = ModelKind::SingleRate.nll(&data, &[0.5, 500.0]);
        assert_eq!(clamped, wild);
        let sticky = ModelKind::Sticky.nll(&data, &[0.5, 2.0, 10.0]);
        assert_eq!(sticky, ModelKind::Sticky.nll(&data, &[0.5, 2.0, 99.0]));
    }

    #[test]
    fn dual_rate_with_equal_rates_matches_single_rate() {
        let data = reference_data();
        let single = ModelKind::SingleRate.nll(&data, &[0.4, 3.0]);
        let dual = ModelKind::DualRate.nll(&data, &[0.4, 0.4, 3.0]);
        assert!((single - dual).abs() < 1e-12);
        let single_f = ModelKind::SingleRateFictitious.nll(&data, &[0.4, 3.0]);
        let dual_f = ModelKind::DualRateFictitious.nll(&data, &[0.4, 0.4, 3.0]);
        assert!((single_f - dual_f).abs() < 1e-12);
    }

    #[test]
    fn zero_stickiness_reduces_to_single_rate() {
        let data = reference_data();
        let single = ModelKind::SingleRate.nll(&data, &[0.25, 2.0]);
        let sticky = ModelKind::Sticky.nll(&data, &[0.25, 2.0, 0.0]);
        assert!((single - sticky).abs() < 1e-12);
    }

    #[test]
    fn sensitivity_model_is_a_scaled_single_rate() {
        let data = reference_data();
        let rs = ModelKind::ReinforcementSensitivity.nll(&data, &[0.5, 0.4]);
        let single = ModelKind::SingleRate.nll(&data, &[0.2, 1.0]);
        assert!((rs - single).abs() < 1e-12);
    }

    #[test]
    fn ewa_first_choice_is_at_chance() {
        let data = ChoiceData::from_parts(&[0], &[1]);
        let nll = ModelKind::Ewa.nll(&data, &[0.5, 0.5, 3.0]);
        assert!((nll - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn every_model_has_matching_axes_and_names() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.axes().len(), kind.param_names().len(), "{}", kind.name());
        }
    }

    #[test]
    fn prob_b_is_a_logistic() {
        let p = prob_b([0.5, 0.5], 5.0);
        assert!((p - 0.5).abs() < 1e-12);
        let favoured = prob_b([0.2, 0.8], 5.0);
        let expected = 1.0 / (1.0 + (-5.0f64 * 0.6).exp());
        assert!((favoured - expected).abs() < 1e-12);
    }
}
