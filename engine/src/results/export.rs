//! File serializations of a [`SessionReport`]: the full trial CSV, the two-column hBayesDM
//! text, the RT/DDM CSV and the JSON report.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use super::SessionReport;
use crate::tasks::prlt::{Choice, Phase, PrltTrial, ReversalMode};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unable to determine export directory")]
    NoExportDir,
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialise report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Paths written by [`write_exports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub trials_csv: PathBuf,
    pub hbayesdm_txt: PathBuf,
    pub rt_csv: PathBuf,
    pub report_json: PathBuf,
}

const METADATA_COLUMNS: [&str; 21] = [
    "task_version",
    "export_timestamp",
    "reversal_mode",
    "prob_good",
    "prob_bad",
    "feedback_duration_ms",
    "response_deadline_ms",
    "trials_recorded",
    "participant_id_meta",
    "reversal_schedule",
    "focus_lost_events",
    "randomization_method",
    "initial_correct",
    "obs_a_learning_rate",
    "obs_a_learning_n",
    "obs_b_learning_rate",
    "obs_b_learning_n",
    "obs_a_reversal_rate",
    "obs_a_reversal_n",
    "obs_b_reversal_rate",
    "obs_b_reversal_n",
];

const DATA_COLUMNS: [&str; 23] = [
    "participant_id",
    "trial",
    "choice",
    "reward",
    "outcome",
    "actually_correct",
    "correct_option",
    "misleading",
    "is_reversal_trial",
    "reversal_block",
    "is_reversal_phase",
    "trial_in_block",
    "perseverative",
    "regressive",
    "rt_ms",
    "omission",
    "prob_good",
    "prob_bad",
    "icv_global",
    "icv_learning",
    "icv_reversal",
    "feedback_shown",
    "choice_label",
];

pub fn build_trial_csv(report: &SessionReport, exported_at: &str) -> String {
    let criterion = report.config.reversal_mode == ReversalMode::Criterion;
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(report.trials.len() + 1);

    let mut header: Vec<String> = METADATA_COLUMNS
        .into_iter()
        .chain(DATA_COLUMNS)
        .map(String::from)
        .collect();
    if criterion {
        header.push("reversal_number".into());
    }
    rows.push(header);

    let metadata = metadata_fields(report, exported_at);
    for trial in &report.trials {
        let mut row = metadata.clone();
        row.extend(data_fields(report, trial));
        if criterion {
            row.push(trial.reversal_block.to_string());
        }
        rows.push(row);
    }

    join_rows(rows)
}

fn metadata_fields(report: &SessionReport, exported_at: &str) -> Vec<String> {
    let config = &report.config;
    let audit = &report.metrics.audit;

    let mut fields = vec![
        report.task_version.clone(),
        exported_at.to_string(),
        config.reversal_mode.as_str().to_string(),
        config.feedback_probability.to_string(),
        config.probability_bad().to_string(),
        config.feedback_duration_ms.to_string(),
        config
            .response_deadline
            .as_ms()
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "NA".into()),
        report.trials.len().to_string(),
        config.participant_id.clone(),
        config.reversal_schedule(),
        report.qc.focus_lost_events.to_string(),
        config.randomization_method.as_str().to_string(),
        report
            .milestones
            .initial_correct
            .map(|choice| choice.label().to_string())
            .unwrap_or_else(|| "NA".into()),
    ];
    for phase in [Phase::Learning, Phase::Reversal] {
        for choice in [Choice::A, Choice::B] {
            let (rate, n) = audit.phase(phase).observed(choice);
            fields.push(format!("{rate:.4}"));
            fields.push(n.to_string());
        }
    }
    fields
}

fn data_fields(report: &SessionReport, trial: &PrltTrial) -> Vec<String> {
    let na = || "NA".to_string();
    let flag = |value: bool| u8::from(value).to_string();
    let valid = trial.is_valid();
    let metrics = &report.metrics;

    vec![
        report.config.participant_id.clone(),
        trial.trial_index.to_string(),
        trial
            .choice
            .map(|choice| choice.code().to_string())
            .unwrap_or_else(na),
        trial
            .reward()
            .map(|reward| reward.to_string())
            .unwrap_or_else(na),
        trial
            .outcome()
            .map(|outcome| outcome.to_string())
            .unwrap_or_else(na),
        if valid {
            flag(trial.actually_correct)
        } else {
            na()
        },
        trial
            .correct_option
            .map(|choice| choice.code().to_string())
            .unwrap_or_else(na),
        flag(trial.misleading),
        flag(trial.is_reversal_trial),
        trial.reversal_block.to_string(),
        flag(trial.is_reversal_phase),
        trial.trial_in_block.to_string(),
        flag(trial.is_perseverative),
        flag(trial.is_regressive),
        trial.rt_ms.to_string(),
        flag(trial.is_omission),
        report.config.feedback_probability.to_string(),
        report.config.probability_bad().to_string(),
        format!("{:.4}", metrics.icv_global),
        format!("{:.4}", metrics.icv_learning),
        format!("{:.4}", metrics.icv_reversal),
        trial
            .feedback_shown
            .map(|shown| if shown { "reward" } else { "punishment" }.to_string())
            .unwrap_or_else(na),
        trial
            .choice
            .map(|choice| choice.label().to_string())
            .unwrap_or_else(na),
    ]
}

/// Two-column choice/outcome text for hBayesDM's `prl_*` models.
pub fn build_hbayesdm_txt(report: &SessionReport) -> String {
    let subject = &report.config.participant_id;
    let mut text = String::from("subjID\tchoice\toutcome\n");
    for trial in report.trials.iter().filter(|trial| trial.is_valid()) {
        if let (Some(choice), Some(outcome)) = (trial.choice, trial.outcome()) {
            text.push_str(&format!("{subject}\t{}\t{outcome}\n", choice.code()));
        }
    }
    text
}

/// Reaction-time table for drift-diffusion fitting. Response is coded A = 0, B = 1.
pub fn build_rt_csv(report: &SessionReport) -> String {
    let subject = &report.config.participant_id;
    let mut rows = vec![[
        "subjID",
        "rt",
        "response",
        "feedback",
        "phase",
        "reversal",
        "trial_in_block",
    ]
    .into_iter()
    .map(String::from)
    .collect::<Vec<_>>()];

    for trial in &report.trials {
        let (Some(choice), Some(reward)) = (trial.choice, trial.reward()) else {
            continue;
        };
        if trial.is_omission || trial.rt_ms == 0 {
            continue;
        }
        rows.push(vec![
            subject.clone(),
            format!("{:.4}", f64::from(trial.rt_ms) / 1000.0),
            choice.index().to_string(),
            reward.to_string(),
            u8::from(trial.reversal_block > 0).to_string(),
            u8::from(trial.is_reversal_phase).to_string(),
            trial.trial_in_block.to_string(),
        ]);
    }

    join_rows(rows)
}

fn join_rows(rows: Vec<Vec<String>>) -> String {
    let mut csv = String::new();
    for row in rows {
        let line = row
            .into_iter()
            .map(|field| quote_field(&field))
            .collect::<Vec<_>>()
            .join(",");
        csv.push_str(&line);
        csv.push('\n');
    }
    csv
}

/// Quotes a field holding a comma, quote or line break; inner quotes are doubled.
fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// File stem shared by a session's exports, `prlt_<participant>_<YYYYMMDD_HHMMSS>`, stamped with
/// the report's creation time. Falls back to the report id when that time cannot be read.
pub fn export_stem(report: &SessionReport) -> String {
    let stamp = OffsetDateTime::parse(&report.created_at, &Rfc3339)
        .ok()
        .and_then(|at| {
            at.format(&format_description!(
                "[year][month][day]_[hour][minute][second]"
            ))
            .ok()
        })
        .unwrap_or_else(|| report.id.simple().to_string());
    format!("prlt_{}_{stamp}", participant_slug(&report.config.participant_id))
}

/// Per-user directory for session exports when no `--out` is given.
pub fn session_export_dir() -> Result<PathBuf, ExportError> {
    directories::ProjectDirs::from("", "", "prlt")
        .map(|dirs| dirs.data_dir().join("sessions"))
        .ok_or(ExportError::NoExportDir)
}

/// Writes all four exports into `dir`, creating it if needed.
pub fn write_exports(report: &SessionReport, dir: &Path) -> Result<ExportPaths, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let stem = export_stem(report);
    let paths = ExportPaths {
        trials_csv: dir.join(format!("{stem}.csv")),
        hbayesdm_txt: dir.join(format!("{stem}_hbayesdm.txt")),
        rt_csv: dir.join(format!("{stem}_rt.csv")),
        report_json: dir.join(format!("{stem}.json")),
    };

    write_file(&paths.trials_csv, &build_trial_csv(report, &super::now_rfc3339()))?;
    write_file(&paths.hbayesdm_txt, &build_hbayesdm_txt(report))?;
    write_file(&paths.rt_csv, &build_rt_csv(report))?;
    write_file(&paths.report_json, &report.to_json()?)?;

    info!(dir = %dir.display(), stem = %stem, "exports written");
    Ok(paths)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn participant_slug(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unknown".into()
    } else {
        cleaned
    }
}
