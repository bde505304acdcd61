//! Session report: everything computed once a session ends, ready for serialization.

pub mod export;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::format::{format_param, format_rate, format_trial};
use crate::core::qc::QualityFlags;
use crate::modeling::interpret::{interpret, Interpretation};
use crate::modeling::{fit_all_models, ChoiceData, ModelFits, ModelKind};
use crate::tasks::prlt::engine::{Milestones, ReversalSummary, SessionOutcome};
use crate::tasks::prlt::reconcile::{reconcile, ReconciliationReport};
use crate::tasks::prlt::{PrltMetrics, PrltTrial, SessionConfig};

pub const TASK_NAME: &str = "prlt";
pub const TASK_VERSION: &str = concat!("prlt-", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub task: String,
    pub task_version: String,
    /// RFC 3339, UTC.
    pub created_at: String,
    pub config: SessionConfig,
    pub trials: Vec<PrltTrial>,
    pub milestones: Milestones,
    pub reversal_summaries: Vec<ReversalSummary>,
    pub metrics: PrltMetrics,
    pub reconciliation: ReconciliationReport,
    pub fits: ModelFits,
    pub interpretation: Interpretation,
    pub qc: QualityFlags,
}

impl SessionReport {
    /// Aggregates, reconciles and fits a finished session.
    pub fn build(outcome: SessionOutcome, qc: QualityFlags) -> Self {
        let metrics = PrltMetrics::from_session(&outcome);
        let reconciliation = reconcile(&outcome);
        let fits = fit_all_models(&ChoiceData::from_trials(&outcome.trials));
        let interpretation = interpret(&fits);

        Self {
            id: Uuid::new_v4(),
            task: TASK_NAME.to_string(),
            task_version: TASK_VERSION.to_string(),
            created_at: now_rfc3339(),
            config: outcome.config,
            trials: outcome.trials,
            milestones: outcome.milestones,
            reversal_summaries: outcome.reversal_summaries,
            metrics,
            reconciliation,
            fits,
            interpretation,
            qc,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Condensed plain-text block of the headline variables.
    pub fn report_variables(&self) -> String {
        let m = &self.metrics;
        let param = |model: ModelKind, name: &str| {
            self.fits
                .get(model)
                .and_then(|fit| fit.param(name))
                .map(format_param)
                .unwrap_or_else(|| "NA".to_string())
        };

        let mut lines = vec![
            format!("participant_id: {}", self.config.participant_id),
            format!("valid_trials: {}/{}", m.valid_trials, m.total_trials),
            format!("accuracy: {}", format_rate(m.accuracy)),
            format!("win_switch_rate: {}", format_rate(m.transitions.win_switch)),
            format!("lose_stay_rate: {}", format_rate(m.transitions.lose_stay)),
            format!("perseverative_errors: {}", m.perseverative_errors),
            format!("perseverative_streak_trials: {}", m.perseverative_streak_trials),
            format!("regressive_errors: {}", m.regressive_errors),
            format!(
                "trials_to_first_criterion: {}",
                format_trial(m.trials_to_first_criterion)
            ),
            format!(
                "trials_to_reversal_criterion: {}",
                format_trial(m.trials_to_reversal_criterion)
            ),
            format!("alpha: {}", param(ModelKind::SingleRateFictitious, "alpha")),
            format!("beta: {}", param(ModelKind::SingleRateFictitious, "beta")),
            format!("alpha_pos: {}", param(ModelKind::DualRateFictitious, "alpha_pos")),
            format!("alpha_neg: {}", param(ModelKind::DualRateFictitious, "alpha_neg")),
            format!("ewa_phi: {}", param(ModelKind::Ewa, "phi")),
            format!("ewa_rho: {}", param(ModelKind::Ewa, "rho")),
        ];
        if let Some(profile) = &self.interpretation.ab_profile {
            lines.push(format!("ab_profile: {profile}"));
        }
        if let Some(profile) = &self.interpretation.ewa_profile {
            lines.push(format!("ewa_profile: {profile}"));
        }
        if let Some(best) = self.fits.best_by_aic() {
            lines.push(format!(
                "best_model_aic: {} ({:.2})",
                best.model.name(),
                best.aic()
            ));
        }
        let sensitivities = &self.interpretation.sensitivities;
        let values = [sensitivities.overall, sensitivities.win, sensitivities.loss];
        for ((name, value), level) in ["overall", "win", "loss"]
            .into_iter()
            .zip(values)
            .zip(sensitivities.levels())
        {
            if let (Some(value), Some(level)) = (value, level) {
                lines.push(format!(
                    "learning_sensitivity_{name}: {} ({})",
                    format_param(value),
                    level.label()
                ));
            }
        }
        lines.push(format!(
            "congruent_feedback_learning: {}",
            format_rate(m.audit.learning.congruent_rate_correct())
        ));
        lines.push(format!(
            "congruent_feedback_reversal: {}",
            format_rate(m.audit.reversal.congruent_rate_correct())
        ));
        if let Some(criterion) = &m.criterion {
            lines.push(format!("reversals: {}", criterion.reversals));
            lines.push(format!(
                "mean_errors_per_reversal: {:.2}",
                criterion.mean_errors_per_reversal
            ));
        }

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into())
}
