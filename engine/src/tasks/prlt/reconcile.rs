//! Post-session consistency pass over the trial log.
//!
//! Phase membership is decided live, trial by trial. This pass rebuilds it from the first
//! reversal index and reports every trial where the two disagree, together with any drop in
//! the reversal block counter. The live flags stay authoritative: metrics and exports read the
//! logged values, and the report is attached for auditing.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::engine::SessionOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMismatch {
    pub trial_index: usize,
    pub logged_reversal_phase: bool,
    pub reconstructed_reversal_phase: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub checked: usize,
    /// First reversal index the reconstruction used.
    pub reversal_trial: Option<usize>,
    pub phase_mismatches: Vec<PhaseMismatch>,
    /// Trials whose reversal block is lower than the one before.
    pub block_regressions: Vec<usize>,
    /// Trials flagged as reversal trials more than once per block, or in the learning phase.
    pub stray_reversal_flags: Vec<usize>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.phase_mismatches.is_empty()
            && self.block_regressions.is_empty()
            && self.stray_reversal_flags.is_empty()
    }
}

pub fn reconcile(outcome: &SessionOutcome) -> ReconciliationReport {
    let flagged = outcome
        .trials
        .iter()
        .find(|t| t.is_reversal_trial)
        .map(|t| t.trial_index);
    // A log without a flagged reversal falls back to the recorded milestone, then to the
    // configured schedule.
    let reversal_trial = flagged
        .or(outcome.milestones.reversal_trial)
        .or_else(|| {
            outcome
                .config
                .reversal_trial()
                .filter(|at| outcome.trials.iter().any(|t| t.trial_index >= *at && t.is_valid()))
        });

    let mut report = ReconciliationReport {
        checked: outcome.trials.len(),
        reversal_trial,
        ..ReconciliationReport::default()
    };

    let mut previous_block = 0;
    let mut flagged_blocks = std::collections::BTreeSet::new();
    for trial in &outcome.trials {
        let reconstructed = reversal_trial.is_some_and(|at| trial.trial_index >= at);
        if reconstructed != trial.is_reversal_phase {
            warn!(
                trial = trial.trial_index,
                logged = trial.is_reversal_phase,
                reconstructed,
                "phase flag disagrees with reversal index"
            );
            report.phase_mismatches.push(PhaseMismatch {
                trial_index: trial.trial_index,
                logged_reversal_phase: trial.is_reversal_phase,
                reconstructed_reversal_phase: reconstructed,
            });
        }

        if trial.reversal_block < previous_block {
            warn!(trial = trial.trial_index, "reversal block decreased");
            report.block_regressions.push(trial.trial_index);
        }
        previous_block = previous_block.max(trial.reversal_block);

        if trial.is_reversal_trial
            && (!trial.is_reversal_phase || !flagged_blocks.insert(trial.reversal_block))
        {
            warn!(trial = trial.trial_index, "unexpected reversal flag");
            report.stray_reversal_flags.push(trial.trial_index);
        }
    }

    report
}
