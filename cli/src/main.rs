//! `prlt`: runs a simulated reversal-learning session end to end and writes the exports.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::core::format::{format_ms, format_rate};
use engine::core::qc::QualityFlags;
use engine::results::export::{session_export_dir, write_exports};
use engine::results::SessionReport;
use engine::tasks::prlt::agent::{AgentParams, SimulatedParticipant};
use engine::tasks::prlt::runner::run_session;
use engine::tasks::prlt::{
    Choice, PrltEngine, RandomizationMethod, ResponseDeadline, ReversalMode, SessionConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON session configuration; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    trials: Option<usize>,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    #[arg(long, value_enum)]
    method: Option<MethodArg>,
    /// Probability that feedback on the correct option is positive.
    #[arg(long)]
    probability: Option<f64>,
    #[arg(long)]
    window: Option<usize>,
    #[arg(long)]
    threshold: Option<usize>,
    #[arg(long, conflicts_with = "no_deadline")]
    deadline_ms: Option<u32>,
    #[arg(long)]
    no_deadline: bool,
    #[arg(long)]
    feedback_ms: Option<u32>,
    #[arg(long, value_enum)]
    initial: Option<ChoiceArg>,
    #[arg(long)]
    participant: Option<String>,
    #[arg(long)]
    seed: Option<u64>,

    /// Learning rate of the simulated participant.
    #[arg(long, default_value_t = 0.3)]
    alpha: f64,
    /// Inverse temperature of the simulated participant.
    #[arg(long, default_value_t = 5.0)]
    beta: f64,
    #[arg(long, default_value_t = 0.0)]
    lapse: f64,

    /// Export directory. Defaults to the platform data directory.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    no_export: bool,
    /// Wait out deadlines and feedback in wall-clock time.
    #[arg(long)]
    realtime: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    Predetermined,
    Criterion,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum MethodArg {
    Urn,
    DenOuden,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ChoiceArg {
    A,
    B,
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => SessionConfig::default(),
        };

        if let Some(trials) = self.trials {
            config.max_trials = trials;
        }
        if let Some(mode) = self.mode {
            config.reversal_mode = match mode {
                ModeArg::Predetermined => ReversalMode::Predetermined,
                ModeArg::Criterion => ReversalMode::Criterion,
            };
        }
        if let Some(method) = self.method {
            config.randomization_method = match method {
                MethodArg::Urn => RandomizationMethod::Urn,
                MethodArg::DenOuden => RandomizationMethod::DenOuden,
            };
        }
        if let Some(p) = self.probability {
            config.feedback_probability = p;
        }
        if let Some(window) = self.window {
            config.window_size = window;
        }
        if let Some(threshold) = self.threshold {
            config.accuracy_threshold = threshold;
        }
        if let Some(ms) = self.deadline_ms {
            config.response_deadline = ResponseDeadline::Limited(ms);
        }
        if self.no_deadline {
            config.response_deadline = ResponseDeadline::Unlimited;
        }
        if let Some(ms) = self.feedback_ms {
            config.feedback_duration_ms = ms;
        }
        if let Some(initial) = self.initial {
            config.initial_correct = Some(match initial {
                ChoiceArg::A => Choice::A,
                ChoiceArg::B => Choice::B,
            });
        }
        if let Some(participant) = &self.participant {
            config.participant_id = participant.clone();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }

    fn agent_params(&self) -> AgentParams {
        AgentParams {
            alpha: self.alpha,
            beta: self.beta,
            lapse_rate: self.lapse.clamp(0.0, 1.0),
            ..AgentParams::default()
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = cli.session_config()?;
    let agent_seed = config.seed.map(|seed| seed.wrapping_add(1)).unwrap_or(1);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(!cli.realtime)
        .build()
        .context("building runtime")?;

    let mut engine = PrltEngine::new(config).context("invalid session configuration")?;
    let mut participant = SimulatedParticipant::new(cli.agent_params(), agent_seed);
    let mut qc = QualityFlags::pristine();

    info!(
        schedule = %engine.config().reversal_schedule(),
        method = engine.config().randomization_method.as_str(),
        "starting simulated session"
    );
    let summary = runtime
        .block_on(run_session(&mut engine, &mut participant, &mut qc))
        .context("running session")?;

    let planned = engine.config().max_trials;
    let outcome = engine.outcome();
    qc.assess_valid_trials(outcome.valid_trials().count(), planned);
    let report = SessionReport::build(outcome, qc);

    println!(
        "run {}: {} responses, {} omissions",
        summary.run_id, summary.responses, summary.omissions
    );
    println!(
        "accuracy {} · median RT {}",
        format_rate(report.metrics.accuracy),
        format_ms(report.metrics.median_rt_ms)
    );
    print!("{}", report.report_variables());
    for note in &report.interpretation.notes {
        println!("- {}", note.describe());
    }

    if !cli.no_export {
        let dir = match cli.out {
            Some(dir) => dir,
            None => session_export_dir()?,
        };
        let paths = write_exports(&report, &dir)?;
        println!("trials: {}", paths.trials_csv.display());
        println!("hbayesdm: {}", paths.hbayesdm_txt.display());
        println!("rt: {}", paths.rt_csv.display());
        println!("report: {}", paths.report_json.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "prlt",
            "--trials",
            "80",
            "--mode",
            "criterion",
            "--method",
            "den-ouden",
            "--no-deadline",
            "--initial",
            "b",
            "--participant",
            "p7",
        ])
        .expect("valid flags");
        let config = cli.session_config().expect("valid config");

        assert_eq!(config.max_trials, 80);
        assert_eq!(config.reversal_mode, ReversalMode::Criterion);
        assert_eq!(config.randomization_method, RandomizationMethod::DenOuden);
        assert_eq!(config.response_deadline, ResponseDeadline::Unlimited);
        assert_eq!(config.initial_correct, Some(Choice::B));
        assert_eq!(config.participant_id, "p7");
        assert_eq!(config.feedback_probability, 0.7);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let cli = Cli::try_parse_from(["prlt", "--window", "5", "--threshold", "8"])
            .expect("parses");
        assert!(cli.session_config().is_err());
    }

    #[test]
    fn deadline_flags_conflict() {
        assert!(Cli::try_parse_from(["prlt", "--deadline-ms", "2000", "--no-deadline"]).is_err());
    }

    #[test]
    fn config_file_is_layered_under_flags() {
        let path = std::env::temp_dir().join(format!("prlt-cli-{}.json", std::process::id()));
        fs::write(&path, r#"{"max_trials": 40, "feedback_probability": 0.8}"#).expect("write");
        let cli = Cli::try_parse_from([
            "prlt",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--probability",
            "0.75",
        ])
        .expect("parses");
        let config = cli.session_config().expect("valid config");
        fs::remove_file(&path).ok();

        assert_eq!(config.max_trials, 40);
        assert_eq!(config.feedback_probability, 0.75);
    }
}
