//! Trial state machine for the reversal-learning task.
//!
//! [`SessionState`] holds every piece of mutable bookkeeping: the active correct option, the
//! reversal block, the rolling performance window and the per-block record of correct choices.
//! [`SessionState::advance`] applies one responded trial to it and returns the classification;
//! [`PrltEngine`] pairs that with a [`FeedbackSource`] and keeps the trial log.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::config::{ConfigError, ReversalMode, SessionConfig};
use super::feedback::{FeedbackProvider, FeedbackSource};
use super::{Choice, Phase};

/// One logged trial, responded or omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrltTrial {
    pub trial_index: usize,
    pub choice: Option<Choice>,
    /// Correct option while this trial was open. Unset only for omissions before the first
    /// response when no initial option was configured.
    pub correct_option: Option<Choice>,
    pub feedback_shown: Option<bool>,
    pub actually_correct: bool,
    pub misleading: bool,
    pub rt_ms: u32,
    pub is_omission: bool,
    pub reversal_block: u32,
    pub is_reversal_trial: bool,
    pub is_reversal_phase: bool,
    pub is_perseverative: bool,
    pub is_regressive: bool,
    /// 1-based position inside the current reversal block, omissions included.
    pub trial_in_block: usize,
}

impl PrltTrial {
    pub fn is_valid(&self) -> bool {
        !self.is_omission && self.choice.is_some()
    }

    pub fn phase(&self) -> Phase {
        Phase::from_flag(self.is_reversal_phase)
    }

    /// Shown feedback coded 0/1. `None` for omissions.
    pub fn reward(&self) -> Option<u8> {
        self.feedback_shown.map(u8::from)
    }

    /// Shown feedback coded -1/+1. `None` for omissions.
    pub fn outcome(&self) -> Option<i8> {
        self.feedback_shown.map(|shown| if shown { 1 } else { -1 })
    }
}

/// Errors and trial counts of one completed criterion-mode reversal block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalSummary {
    pub reversal_number: u32,
    pub errors: u32,
    pub trials: u32,
}

/// Learning milestones reached during the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestones {
    /// Option the session started with.
    pub initial_correct: Option<Choice>,
    /// Trial on which the first reversal fired.
    pub reversal_trial: Option<usize>,
    pub first_learning_trial: Option<usize>,
    pub reversal_learning_trial: Option<usize>,
}

/// Result of applying one responded trial to the session state, before feedback is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub trial_index: usize,
    pub correct_option: Choice,
    pub actually_correct: bool,
    pub is_reversal_trial: bool,
    pub is_perseverative: bool,
    pub is_regressive: bool,
    pub phase: Phase,
    pub reversal_block: u32,
    pub trial_in_block: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub trials_completed: usize,
    pub correct_option: Option<Choice>,
    pub previous_correct: Option<Choice>,
    pub reversal_block: u32,
    pub in_reversal_phase: bool,
    pub performance_window: VecDeque<bool>,
    pub block_correct_trials: BTreeSet<usize>,
    pub trials_in_block: usize,
    pub criterion_reached: bool,
    pub milestones: Milestones,
    pub reversal_count: u32,
    pub block_errors: u32,
    pub block_trials: u32,
    pub reversal_summaries: Vec<ReversalSummary>,
}

impl SessionState {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            correct_option: config.initial_correct,
            milestones: Milestones {
                initial_correct: config.initial_correct,
                ..Milestones::default()
            },
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_flag(self.in_reversal_phase)
    }

    pub fn is_exhausted(&self, config: &SessionConfig) -> bool {
        self.trials_completed >= config.max_trials
    }

    pub fn next_trial_index(&self) -> usize {
        self.trials_completed + 1
    }

    /// Applies a responded trial: fires a reversal when due, classifies the choice, and updates
    /// the performance window and criterion bookkeeping.
    pub fn advance(&mut self, config: &SessionConfig, choice: Choice) -> Classification {
        let trial_index = self.next_trial_index();
        self.trials_completed = trial_index;

        if self.correct_option.is_none() {
            self.correct_option = Some(choice);
            self.milestones.initial_correct = Some(choice);
            debug!(trial_index, correct = choice.label(), "first response defines the correct option");
        }

        let is_reversal_trial = self.reversal_due(config, trial_index);
        if is_reversal_trial {
            self.reverse(config, trial_index);
        }
        self.trials_in_block += 1;

        let correct_option = self.correct_option.unwrap_or(choice);
        let actually_correct = choice == correct_option;
        let is_perseverative = self.in_reversal_phase
            && !is_reversal_trial
            && self.previous_correct == Some(choice);
        let is_regressive = !actually_correct && !self.block_correct_trials.is_empty();

        if actually_correct {
            self.block_correct_trials.insert(trial_index);
        }

        if config.reversal_mode == ReversalMode::Criterion && self.in_reversal_phase {
            self.block_trials += 1;
            if !actually_correct {
                self.block_errors += 1;
            }
        }

        if !is_reversal_trial {
            self.performance_window.push_back(actually_correct);
            while self.performance_window.len() > config.window_size {
                self.performance_window.pop_front();
            }
        }
        self.check_criterion(config, trial_index);

        Classification {
            trial_index,
            correct_option,
            actually_correct,
            is_reversal_trial,
            is_perseverative,
            is_regressive,
            phase: self.phase(),
            reversal_block: self.reversal_block,
            trial_in_block: self.trials_in_block,
        }
    }

    /// Counts an omitted trial. The window, the per-block record and the criterion state stay
    /// untouched.
    pub fn skip(&mut self) -> usize {
        self.trials_completed += 1;
        self.trials_in_block += 1;
        self.trials_completed
    }

    /// Whether the responded trial `trial_index` opens a reversal block.
    ///
    /// Predetermined mode reverses once, on the first responded trial at or after
    /// `floor(max_trials / 2) + 1`. Omissions never reverse, so an omitted scheduled trial moves
    /// the reversal to the next answered one. Criterion mode reverses on the response after the
    /// criterion was reached.
    fn reversal_due(&self, config: &SessionConfig, trial_index: usize) -> bool {
        match config.reversal_mode {
            ReversalMode::Predetermined => config
                .reversal_trial()
                .is_some_and(|at| trial_index >= at && !self.in_reversal_phase),
            ReversalMode::Criterion => self.criterion_reached,
        }
    }

    fn reverse(&mut self, config: &SessionConfig, trial_index: usize) {
        debug_assert!(
            self.correct_option.is_some(),
            "reversal fired before a correct option was assigned"
        );
        if config.reversal_mode == ReversalMode::Criterion {
            if self.reversal_count > 0 {
                self.reversal_summaries.push(ReversalSummary {
                    reversal_number: self.reversal_count,
                    errors: self.block_errors,
                    trials: self.block_trials,
                });
            }
            self.reversal_count += 1;
            self.block_errors = 0;
            self.block_trials = 0;
            self.criterion_reached = false;
        } else {
            self.reversal_count += 1;
        }

        self.reversal_block += 1;
        self.previous_correct = self.correct_option;
        self.correct_option = self.correct_option.map(Choice::other);
        self.performance_window.clear();
        self.block_correct_trials.clear();
        self.trials_in_block = 0;
        self.in_reversal_phase = true;
        self.milestones.reversal_trial.get_or_insert(trial_index);

        info!(
            trial_index,
            block = self.reversal_block,
            correct = self.correct_option.map(Choice::label).unwrap_or("-"),
            "reversal"
        );
    }

    fn check_criterion(&mut self, config: &SessionConfig, trial_index: usize) {
        let correct_in_window = self.performance_window.iter().filter(|c| **c).count();
        if self.performance_window.len() < config.window_size
            || correct_in_window < config.accuracy_threshold
        {
            return;
        }

        if self.milestones.first_learning_trial.is_none() {
            self.milestones.first_learning_trial = Some(trial_index);
            info!(trial_index, "learning criterion reached");
        } else if self.in_reversal_phase && self.milestones.reversal_learning_trial.is_none() {
            self.milestones.reversal_learning_trial = Some(trial_index);
            info!(trial_index, "reversal learning criterion reached");
        }

        if config.reversal_mode == ReversalMode::Criterion && !self.criterion_reached {
            self.criterion_reached = true;
            debug!(trial_index, "criterion armed, reversal fires on the next response");
        }
    }

    /// Completed reversal summaries plus the block still open, if it has any trials.
    pub fn summaries_with_open_block(&self) -> Vec<ReversalSummary> {
        let mut summaries = self.reversal_summaries.clone();
        if self.reversal_count > 0 && self.block_trials > 0 {
            summaries.push(ReversalSummary {
                reversal_number: self.reversal_count,
                errors: self.block_errors,
                trials: self.block_trials,
            });
        }
        summaries
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("session already recorded all {max_trials} trials")]
    SessionComplete { max_trials: usize },
}

/// What the front end shows after a trial closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackDecision {
    pub trial_index: usize,
    /// Positive or negative feedback; `None` for an omission ("too slow").
    pub feedback: Option<bool>,
    pub is_reversal_trial: bool,
    pub session_complete: bool,
}

/// Everything a finished session hands to aggregation and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub config: SessionConfig,
    pub trials: Vec<PrltTrial>,
    pub milestones: Milestones,
    pub reversal_summaries: Vec<ReversalSummary>,
}

impl SessionOutcome {
    pub fn valid_trials(&self) -> impl Iterator<Item = &PrltTrial> {
        self.trials.iter().filter(|trial| trial.is_valid())
    }
}

#[derive(Debug, Clone)]
pub struct PrltEngine<F: FeedbackSource = FeedbackProvider> {
    config: SessionConfig,
    state: SessionState,
    feedback: F,
    trials: Vec<PrltTrial>,
}

impl PrltEngine<FeedbackProvider> {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let feedback = FeedbackProvider::from_config(&config);
        Self::with_source(config, feedback)
    }
}

impl<F: FeedbackSource> PrltEngine<F> {
    pub fn with_source(config: SessionConfig, feedback: F) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            mode = config.reversal_mode.as_str(),
            method = config.randomization_method.as_str(),
            probability = config.feedback_probability,
            planned_trials = config.max_trials,
            "session started"
        );
        Ok(Self {
            state: SessionState::new(&config),
            trials: Vec::with_capacity(config.max_trials),
            config,
            feedback,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn trials(&self) -> &[PrltTrial] {
        &self.trials
    }

    pub fn feedback_source(&self) -> &F {
        &self.feedback
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_exhausted(&self.config)
    }

    pub fn remaining(&self) -> usize {
        self.config.max_trials.saturating_sub(self.state.trials_completed)
    }

    pub fn process_choice(
        &mut self,
        choice: Choice,
        rt_ms: u32,
    ) -> Result<FeedbackDecision, EngineError> {
        self.ensure_open()?;

        let class = self.state.advance(&self.config, choice);
        let shown = self
            .feedback
            .feedback(class.phase, class.actually_correct, class.is_reversal_trial);

        self.trials.push(PrltTrial {
            trial_index: class.trial_index,
            choice: Some(choice),
            correct_option: Some(class.correct_option),
            feedback_shown: Some(shown),
            actually_correct: class.actually_correct,
            misleading: shown != class.actually_correct,
            rt_ms,
            is_omission: false,
            reversal_block: class.reversal_block,
            is_reversal_trial: class.is_reversal_trial,
            is_reversal_phase: class.phase == Phase::Reversal,
            is_perseverative: class.is_perseverative,
            is_regressive: class.is_regressive,
            trial_in_block: class.trial_in_block,
        });

        Ok(self.decision(class.trial_index, Some(shown), class.is_reversal_trial))
    }

    /// Records a trial that ran past the response deadline.
    pub fn handle_omission(&mut self) -> Result<FeedbackDecision, EngineError> {
        self.ensure_open()?;

        let trial_index = self.state.skip();
        let rt_ms = self.config.response_deadline.as_ms().unwrap_or(0);
        debug!(trial_index, "omission");

        self.trials.push(PrltTrial {
            trial_index,
            choice: None,
            correct_option: self.state.correct_option,
            feedback_shown: None,
            actually_correct: false,
            misleading: false,
            rt_ms,
            is_omission: true,
            reversal_block: self.state.reversal_block,
            is_reversal_trial: false,
            is_reversal_phase: self.state.in_reversal_phase,
            is_perseverative: false,
            is_regressive: false,
            trial_in_block: self.state.trials_in_block,
        });

        Ok(self.decision(trial_index, None, false))
    }

    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            config: self.config.clone(),
            trials: self.trials.clone(),
            milestones: self.state.milestones,
            reversal_summaries: self.state.summaries_with_open_block(),
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.is_complete() {
            Err(EngineError::SessionComplete {
                max_trials: self.config.max_trials,
            })
        } else {
            Ok(())
        }
    }

    fn decision(&self, trial_index: usize, feedback: Option<bool>, reversal: bool) -> FeedbackDecision {
        let session_complete = self.is_complete();
        if session_complete {
            info!(trials = self.trials.len(), "session complete");
        }
        FeedbackDecision {
            trial_index,
            feedback,
            is_reversal_trial: reversal,
            session_complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always truthful; counts how often it was asked.
    #[derive(Debug, Default)]
    struct Truthful {
        draws: usize,
    }

    impl FeedbackSource for Truthful {
        fn draw_congruence(&mut self, _: Phase, _: bool, _: bool) -> Option<bool> {
            self.draws += 1;
            Some(true)
        }
    }

    fn engine(config: SessionConfig) -> PrltEngine<Truthful> {
        PrltEngine::with_source(config, Truthful::default()).expect("valid config")
    }

    #[test]
    fn first_response_defines_the_correct_option() {
        let mut eng = engine(SessionConfig::default());
        let decision = eng.process_choice(Choice::B, 400).expect("open");
        assert_eq!(decision.feedback, Some(true));
        assert_eq!(eng.state().correct_option, Some(Choice::B));
        assert_eq!(eng.state().milestones.initial_correct, Some(Choice::B));
    }

    #[test]
    fn configured_initial_option_is_respected() {
        let mut eng = engine(SessionConfig {
            initial_correct: Some(Choice::A),
            ..SessionConfig::default()
        });
        eng.process_choice(Choice::B, 400).expect("open");
        assert!(!eng.trials()[0].actually_correct);
        assert_eq!(eng.trials()[0].feedback_shown, Some(false));
    }

    #[test]
    fn omission_leaves_window_and_sources_alone() {
        let mut eng = engine(SessionConfig {
            initial_correct: Some(Choice::A),
            ..SessionConfig::default()
        });
        eng.process_choice(Choice::A, 300).expect("open");
        let window_before = eng.state().performance_window.clone();
        let draws_before = eng.feedback_source().draws;

        let decision = eng.handle_omission().expect("open");
        assert_eq!(decision.feedback, None);
        assert_eq!(eng.state().performance_window, window_before);
        assert_eq!(eng.feedback_source().draws, draws_before);

        let omitted = &eng.trials()[1];
        assert!(omitted.is_omission);
        assert_eq!(omitted.choice, None);
        assert_eq!(omitted.rt_ms, 6_000);
        assert_eq!(omitted.trial_index, 2);
    }

    #[test]
    fn omissions_count_towards_the_session_length() {
        let mut eng = engine(SessionConfig {
            max_trials: 3,
            ..SessionConfig::default()
        });
        eng.handle_omission().expect("open");
        eng.process_choice(Choice::A, 250).expect("open");
        let last = eng.handle_omission().expect("open");
        assert!(last.session_complete);
        assert_eq!(
            eng.process_choice(Choice::A, 250),
            Err(EngineError::SessionComplete { max_trials: 3 })
        );
    }

    #[test]
    fn unlimited_deadline_logs_zero_rt_for_omissions() {
        let mut eng = engine(SessionConfig {
            response_deadline: crate::tasks::prlt::ResponseDeadline::Unlimited,
            ..SessionConfig::default()
        });
        eng.handle_omission().expect("open");
        assert_eq!(eng.trials()[0].rt_ms, 0);
        assert_eq!(eng.trials()[0].correct_option, None);
    }

    #[test]
    fn predetermined_reversal_waits_for_a_response() {
        let mut eng = engine(SessionConfig {
            max_trials: 10,
            initial_correct: Some(Choice::A),
            ..SessionConfig::default()
        });
        for _ in 0..5 {
            eng.process_choice(Choice::A, 300).expect("open");
        }
        eng.handle_omission().expect("open");
        let decision = eng.process_choice(Choice::A, 300).expect("open");
        assert!(decision.is_reversal_trial);
        assert_eq!(decision.trial_index, 7);
        assert!(!eng.trials()[5].is_reversal_phase);
        assert_eq!(eng.state().milestones.reversal_trial, Some(7));
        // Only one predetermined reversal, however late it fired.
        for _ in 0..3 {
            let decision = eng.process_choice(Choice::B, 300).expect("open");
            assert!(!decision.is_reversal_trial);
        }
        assert_eq!(eng.state().reversal_block, 1);
    }

    #[test]
    fn criterion_summaries_track_each_reversal_block() {
        let config = SessionConfig {
            max_trials: 200,
            reversal_mode: ReversalMode::Criterion,
            window_size: 4,
            accuracy_threshold: 4,
            initial_correct: Some(Choice::A),
            ..SessionConfig::default()
        };
        let mut eng = engine(config);

        // Learning block: four correct choices arm the criterion.
        for _ in 0..4 {
            eng.process_choice(Choice::A, 300).expect("open");
        }
        assert!(eng.state().criterion_reached);

        // Reversal 1 fires on trial 5; one more error, then four correct B choices.
        let first = eng.process_choice(Choice::A, 300).expect("open");
        assert!(first.is_reversal_trial);
        eng.process_choice(Choice::A, 300).expect("open");
        for _ in 0..4 {
            eng.process_choice(Choice::B, 300).expect("open");
        }
        let second = eng.process_choice(Choice::B, 300).expect("open");
        assert!(second.is_reversal_trial);
        assert_eq!(eng.state().reversal_block, 2);

        let summaries = eng.state().summaries_with_open_block();
        assert_eq!(
            summaries[0],
            ReversalSummary {
                reversal_number: 1,
                errors: 2,
                trials: 6,
            }
        );
        // Trial 11 opened reversal 2 with a choice that is now wrong.
        assert_eq!(
            summaries[1],
            ReversalSummary {
                reversal_number: 2,
                errors: 1,
                trials: 1,
            }
        );
    }
}
