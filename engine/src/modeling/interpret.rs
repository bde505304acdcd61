//! Qualitative reading of fitted parameters: three-level buckets, named profiles, and
//! likelihood comparisons between model pairs.

use serde::{Deserialize, Serialize};

use super::{ModelFits, ModelKind};

/// NLL difference beyond which one model of a pair is reported as clearly better.
pub const CLEAR_NLL_DIFFERENCE: f64 = 5.0;
/// Gap between reward and punishment learning rates reported as an asymmetry.
pub const ASYMMETRY_GAP: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn label(self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

impl Thresholds {
    pub fn classify(&self, value: f64) -> Level {
        if value < self.low {
            Level::Low
        } else if value < self.high {
            Level::Medium
        } else {
            Level::High
        }
    }
}

pub const ALPHA: Thresholds = Thresholds { low: 0.30, high: 0.90 };
pub const BETA: Thresholds = Thresholds { low: 2.60, high: 7.35 };
pub const TAU: Thresholds = Thresholds { low: 0.5, high: 2.0 };
pub const PHI: Thresholds = Thresholds { low: 0.10, high: 0.60 };
pub const RHO_EWA: Thresholds = Thresholds { low: 0.28, high: 0.88 };
pub const RHO_SENS: Thresholds = Thresholds { low: 0.30, high: 0.85 };
pub const LEARNING_SENS: Thresholds = Thresholds { low: 0.20, high: 0.75 };

/// Nine profiles from the single-rate fit, crossing learning rate and inverse temperature.
pub fn ab_profile(alpha: f64, beta: f64) -> &'static str {
    match (ALPHA.classify(alpha), BETA.classify(beta)) {
        (Level::High, Level::High) => "Flexible-adaptive",
        (Level::High, Level::Medium) => "Reactive-balanced",
        (Level::High, Level::Low) => "Volatile/exploratory",
        (Level::Medium, Level::High) => "Balanced-deterministic",
        (Level::Medium, Level::Medium) => "Intermediate-typical",
        (Level::Medium, Level::Low) => "Balanced-exploratory",
        (Level::Low, Level::High) => "Perseverant/rigid",
        (Level::Low, Level::Medium) => "Conservative-balanced",
        (Level::Low, Level::Low) => "Disorganized/chaotic",
    }
}

/// Eight profiles from the EWA fit. Each parameter is split at its upper threshold.
pub fn ewa_profile(phi: f64, rho: f64, beta: f64) -> &'static str {
    let long_memory = phi >= PHI.high;
    let stable = rho >= RHO_EWA.high;
    let exploit = beta >= BETA.high;
    match (long_memory, stable, exploit) {
        (false, false, false) => "Volatile-exploratory",
        (false, false, true) => "Volatile-exploiter",
        (false, true, false) => "Recent-exploratory",
        (false, true, true) => "Recent-exploiter",
        (true, false, false) => "Historical-exploratory",
        (true, false, true) => "Historical-exploiter",
        (true, true, false) => "Stable-exploratory",
        (true, true, true) => "Stable-exploiter",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    First,
    Second,
    Marginal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub first: ModelKind,
    pub second: ModelKind,
    /// `nll(first) - nll(second)`.
    pub nll_difference: f64,
    pub preference: Preference,
}

impl Comparison {
    fn between(fits: &ModelFits, first: ModelKind, second: ModelKind) -> Option<Self> {
        let a = fits.get(first)?.nll;
        let b = fits.get(second)?.nll;
        let nll_difference = a - b;
        let preference = if nll_difference.abs() <= CLEAR_NLL_DIFFERENCE {
            Preference::Marginal
        } else if a < b {
            Preference::First
        } else {
            Preference::Second
        };
        Some(Self {
            first,
            second,
            nll_difference,
            preference,
        })
    }

    pub fn preferred(&self) -> Option<ModelKind> {
        match self.preference {
            Preference::First => Some(self.first),
            Preference::Second => Some(self.second),
            Preference::Marginal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviourNote {
    ExploratoryChoices,
    BalancedChoices,
    ExploitativeChoices,
    SlowLearning,
    ModerateLearning,
    FastLearning,
    RewardDrivenAsymmetry,
    PunishmentDrivenAsymmetry,
    LowReinforcementSensitivity,
    StrongRepetitionBias,
}

impl BehaviourNote {
    pub fn describe(self) -> &'static str {
        match self {
            BehaviourNote::ExploratoryChoices => {
                "noisy, inconsistent choices with frequent switching"
            }
            BehaviourNote::BalancedChoices => "balance between exploration and exploitation",
            BehaviourNote::ExploitativeChoices => {
                "consistent, near-deterministic choices of the preferred option"
            }
            BehaviourNote::SlowLearning => "gradual integration of feedback",
            BehaviourNote::ModerateLearning => "moderate update rate",
            BehaviourNote::FastLearning => "strong reactivity to the latest feedback",
            BehaviourNote::RewardDrivenAsymmetry => "learns more from rewards than punishments",
            BehaviourNote::PunishmentDrivenAsymmetry => {
                "learns more from punishments than rewards"
            }
            BehaviourNote::LowReinforcementSensitivity => {
                "feedback has an attenuated impact on learning"
            }
            BehaviourNote::StrongRepetitionBias => {
                "strong tendency to repeat the previous choice regardless of feedback"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningSensitivities {
    /// alpha * rho from the reinforcement-sensitivity fit.
    pub overall: Option<f64>,
    pub win: Option<f64>,
    pub loss: Option<f64>,
}

impl LearningSensitivities {
    /// Buckets for overall, win and loss sensitivity, in that order.
    pub fn levels(&self) -> [Option<Level>; 3] {
        [self.overall, self.win, self.loss].map(|v| v.map(|v| LEARNING_SENS.classify(v)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub alpha_level: Option<Level>,
    pub beta_level: Option<Level>,
    pub tau_level: Option<Level>,
    pub rho_sensitivity_level: Option<Level>,
    pub ab_profile: Option<String>,
    pub ewa_profile: Option<String>,
    pub comparisons: Vec<Comparison>,
    pub sensitivities: LearningSensitivities,
    pub notes: Vec<BehaviourNote>,
}

pub fn interpret(fits: &ModelFits) -> Interpretation {
    let ab = fits.get(ModelKind::SingleRate);
    let alpha = ab.and_then(|f| f.param("alpha"));
    let beta = ab.and_then(|f| f.param("beta"));
    let tau = fits.get(ModelKind::Sticky).and_then(|f| f.param("tau"));

    let rs = fits.get(ModelKind::ReinforcementSensitivity);
    let rho_sens = rs.and_then(|f| f.param("rho"));
    let du = fits.get(ModelKind::DualSensitivity);

    let ewa = fits.get(ModelKind::Ewa);
    let ewa_profile = ewa.and_then(|f| {
        Some(ewa_profile(f.param("phi")?, f.param("rho")?, f.param("beta")?).to_string())
    });

    let comparisons: Vec<Comparison> = [
        (ModelKind::SingleRate, ModelKind::Ewa),
        (ModelKind::SingleRate, ModelKind::DualRate),
        (ModelKind::SingleRate, ModelKind::Sticky),
        (ModelKind::ReinforcementSensitivity, ModelKind::SingleRate),
        (ModelKind::DualSensitivity, ModelKind::DualRate),
    ]
    .into_iter()
    .filter_map(|(first, second)| Comparison::between(fits, first, second))
    .collect();

    let mut notes = Vec::new();
    if let Some(beta) = beta {
        notes.push(match BETA.classify(beta) {
            Level::Low => BehaviourNote::ExploratoryChoices,
            Level::Medium => BehaviourNote::BalancedChoices,
            Level::High => BehaviourNote::ExploitativeChoices,
        });
    }
    if let Some(alpha) = alpha {
        notes.push(match ALPHA.classify(alpha) {
            Level::Low => BehaviourNote::SlowLearning,
            Level::Medium => BehaviourNote::ModerateLearning,
            Level::High => BehaviourNote::FastLearning,
        });
    }

    let dual_preferred = comparisons.iter().any(|c| {
        c.first == ModelKind::SingleRate
            && c.second == ModelKind::DualRate
            && c.preference == Preference::Second
    });
    if dual_preferred {
        let dual = fits.get(ModelKind::DualRate);
        if let (Some(pos), Some(neg)) = (
            dual.and_then(|f| f.param("alpha_pos")),
            dual.and_then(|f| f.param("alpha_neg")),
        ) {
            if pos > neg + ASYMMETRY_GAP {
                notes.push(BehaviourNote::RewardDrivenAsymmetry);
            } else if neg > pos + ASYMMETRY_GAP {
                notes.push(BehaviourNote::PunishmentDrivenAsymmetry);
            }
        }
    }
    if rho_sens.is_some_and(|rho| rho < RHO_SENS.low) {
        notes.push(BehaviourNote::LowReinforcementSensitivity);
    }
    if tau.is_some_and(|tau| tau > TAU.high) {
        notes.push(BehaviourNote::StrongRepetitionBias);
    }

    let sensitivities = LearningSensitivities {
        overall: rs.and_then(|f| Some(f.param("alpha")? * f.param("rho")?)),
        win: du.and_then(|f| Some(f.param("alpha")? * f.param("rho_win")?)),
        loss: du.and_then(|f| Some(f.param("alpha")? * f.param("rho_loss")?)),
    };

    Interpretation {
        alpha_level: alpha.map(|v| ALPHA.classify(v)),
        beta_level: beta.map(|v| BETA.classify(v)),
        tau_level: tau.map(|v| TAU.classify(v)),
        rho_sensitivity_level: rho_sens.map(|v| RHO_SENS.classify(v)),
        ab_profile: alpha
            .zip(beta)
            .map(|(alpha, beta)| ab_profile(alpha, beta).to_string()),
        ewa_profile,
        comparisons,
        sensitivities,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::ModelFit;
    use std::collections::BTreeMap;

    fn fit(model: ModelKind, params: &[(&str, f64)], nll: f64) -> ModelFit {
        ModelFit {
            model,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            nll,
            n_trials: 60,
        }
    }

    #[test]
    fn thresholds_are_half_open() {
        assert_eq!(ALPHA.classify(0.29), Level::Low);
        assert_eq!(ALPHA.classify(0.30), Level::Medium);
        assert_eq!(ALPHA.classify(0.90), Level::High);
        assert_eq!(BETA.classify(2.59), Level::Low);
        assert_eq!(BETA.classify(7.35), Level::High);
        assert_eq!(TAU.classify(0.5), Level::Medium);
        assert_eq!(PHI.classify(0.05), Level::Low);
        assert_eq!(RHO_EWA.classify(0.88), Level::High);
        assert_eq!(RHO_SENS.classify(0.84), Level::Medium);
        assert_eq!(LEARNING_SENS.classify(0.19), Level::Low);
    }

    #[test]
    fn ab_profiles_cover_the_grid() {
        assert_eq!(ab_profile(0.95, 10.0), "Flexible-adaptive");
        assert_eq!(ab_profile(0.5, 5.0), "Intermediate-typical");
        assert_eq!(ab_profile(0.1, 10.0), "Perseverant/rigid");
        assert_eq!(ab_profile(0.1, 1.0), "Disorganized/chaotic");
        assert_eq!(ab_profile(0.95, 1.0), "Volatile/exploratory");
    }

    #[test]
    fn ewa_profiles_split_at_upper_thresholds() {
        assert_eq!(ewa_profile(0.5, 0.5, 5.0), "Volatile-exploratory");
        assert_eq!(ewa_profile(0.6, 0.88, 7.35), "Stable-exploiter");
        assert_eq!(ewa_profile(0.7, 0.2, 9.0), "Historical-exploiter");
        assert_eq!(ewa_profile(0.2, 0.9, 1.0), "Recent-exploratory");
    }

    #[test]
    fn comparisons_need_a_clear_margin() {
        let fits = ModelFits {
            fits: vec![
                fit(ModelKind::SingleRate, &[("alpha", 0.2), ("beta", 9.0)], 30.0),
                fit(
                    ModelKind::DualRate,
                    &[("alpha_pos", 0.7), ("alpha_neg", 0.1), ("beta", 9.0)],
                    20.0,
                ),
                fit(ModelKind::Sticky, &[("alpha", 0.2), ("beta", 9.0), ("tau", 3.0)], 27.0),
                fit(ModelKind::ReinforcementSensitivity, &[("alpha", 0.5), ("rho", 0.2)], 40.0),
            ],
        };
        let reading = interpret(&fits);

        let dual = reading
            .comparisons
            .iter()
            .find(|c| c.second == ModelKind::DualRate)
            .expect("pair present");
        assert_eq!(dual.preferred(), Some(ModelKind::DualRate));
        let sticky = reading
            .comparisons
            .iter()
            .find(|c| c.second == ModelKind::Sticky)
            .expect("pair present");
        assert_eq!(sticky.preference, Preference::Marginal);
        // Pairs with a missing model are skipped.
        assert_eq!(reading.comparisons.len(), 3);

        assert_eq!(reading.ab_profile.as_deref(), Some("Perseverant/rigid"));
        assert!(reading.notes.contains(&BehaviourNote::ExploitativeChoices));
        assert!(reading.notes.contains(&BehaviourNote::SlowLearning));
        assert!(reading.notes.contains(&BehaviourNote::RewardDrivenAsymmetry));
        assert!(reading.notes.contains(&BehaviourNote::LowReinforcementSensitivity));
        assert!(reading.notes.contains(&BehaviourNote::StrongRepetitionBias));
        let overall = reading.sensitivities.overall.expect("rs fitted");
        assert!((overall - 0.1).abs() < 1e-12);
        assert_eq!(reading.sensitivities.win, None);
        assert_eq!(reading.sensitivities.levels(), [Some(Level::Low), None, None]);
    }

    #[test]
    fn sensitivity_levels_follow_thresholds() {
        let sensitivities = LearningSensitivities {
            overall: Some(0.5),
            win: Some(0.8),
            loss: Some(0.05),
        };
        assert_eq!(
            sensitivities.levels(),
            [Some(Level::Medium), Some(Level::High), Some(Level::Low)]
        );
        assert_eq!(Level::Medium.label(), "medium");
    }
}
