//! Async session driver. Each trial races the participant's response against the response
//! deadline; whichever arrives first closes the trial through the [`ResponseGate`] and cancels
//! the other timer. The gate then stays closed for the feedback period.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::engine::{EngineError, PrltEngine};
use super::feedback::FeedbackSource;
use super::Choice;
use crate::core::qc::QualityFlags;
use crate::core::timing::{self, ResponseGate, TrialTicket};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// A choice together with the delay after trial onset at which it is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub choice: Choice,
    pub rt_ms: u32,
}

pub trait Participant {
    /// Response to the trial that just opened, or `None` to let it run out.
    fn respond(&mut self, trial_index: usize) -> Option<Response>;

    fn observe(&mut self, _choice: Choice, _feedback: bool) {}
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("trial {trial_index} has no response and no deadline")]
    Stalled { trial_index: usize },
    #[error("event channel closed while trial {trial_index} was open")]
    ChannelClosed { trial_index: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: u64,
    pub responses: usize,
    pub omissions: usize,
    /// Completions that arrived for a trial that was already closed.
    pub stale_events: usize,
}

#[derive(Debug, Clone, Copy)]
enum SessionEvent {
    Respond { ticket: TrialTicket, choice: Choice },
    Deadline { ticket: TrialTicket },
}

/// Drives `engine` until every planned trial is recorded.
pub async fn run_session<F, P>(
    engine: &mut PrltEngine<F>,
    participant: &mut P,
    qc: &mut QualityFlags,
) -> Result<RunSummary, RunnerError>
where
    F: FeedbackSource,
    P: Participant + ?Sized,
{
    let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
    let mut gate = ResponseGate::new(run_id);
    let (sender, mut events) = unbounded::<SessionEvent>();
    let mut summary = RunSummary {
        run_id,
        ..RunSummary::default()
    };

    while !engine.is_complete() {
        let trial_index = engine.state().next_trial_index();
        // Captured at onset; later settings changes do not reach an open trial.
        let deadline_ms = engine.config().response_deadline.as_ms();
        let feedback_ms = engine.config().feedback_duration_ms;

        let ticket = gate.open(trial_index);
        let opened_at = Instant::now();
        let response = participant.respond(trial_index);
        if response.is_none() && deadline_ms.is_none() {
            gate.close();
            return Err(RunnerError::Stalled { trial_index });
        }

        let response_timer = response.map(|r| {
            queue_event(
                sender.clone(),
                r.rt_ms,
                SessionEvent::Respond {
                    ticket,
                    choice: r.choice,
                },
            )
        });
        let deadline_timer =
            deadline_ms.map(|ms| queue_event(sender.clone(), ms, SessionEvent::Deadline { ticket }));

        loop {
            let event = events
                .next()
                .await
                .ok_or(RunnerError::ChannelClosed { trial_index })?;

            match event {
                SessionEvent::Respond { ticket, choice } => {
                    if !gate.try_close(ticket) {
                        summary.stale_events += 1;
                        debug!(?ticket, "ignoring stale response");
                        continue;
                    }
                    cancel(&deadline_timer);
                    let rt_ms = elapsed_ms(opened_at);
                    let decision = engine.process_choice(choice, rt_ms)?;
                    if let Some(shown) = decision.feedback {
                        participant.observe(choice, shown);
                    }
                    summary.responses += 1;
                    break;
                }
                SessionEvent::Deadline { ticket } => {
                    if !gate.try_close(ticket) {
                        summary.stale_events += 1;
                        debug!(?ticket, "ignoring stale deadline");
                        continue;
                    }
                    cancel(&response_timer);
                    engine.handle_omission()?;
                    qc.log_omission();
                    summary.omissions += 1;
                    warn!(trial_index, "response deadline passed");
                    break;
                }
            }
        }

        timing::sleep_ms(u64::from(feedback_ms)).await;
    }

    let valid = engine.trials().iter().filter(|t| t.is_valid()).count();
    qc.assess_valid_trials(valid, engine.config().max_trials);
    Ok(summary)
}

fn queue_event(
    sender: UnboundedSender<SessionEvent>,
    delay_ms: u32,
    event: SessionEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        timing::sleep_ms(u64::from(delay_ms)).await;
        let _ = sender.unbounded_send(event);
    })
}

fn cancel(timer: &Option<JoinHandle<()>>) {
    if let Some(handle) = timer {
        handle.abort();
    }
}

fn elapsed_ms(since: Instant) -> u32 {
    u32::try_from(since.elapsed().as_millis()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::prlt::{ResponseDeadline, SessionConfig};
    use std::collections::VecDeque;

    struct Scripted {
        responses: VecDeque<Option<Response>>,
        observed: Vec<bool>,
    }

    impl Scripted {
        fn new(responses: Vec<Option<Response>>) -> Self {
            Self {
                responses: responses.into(),
                observed: Vec::new(),
            }
        }
    }

    impl Participant for Scripted {
        fn respond(&mut self, _trial_index: usize) -> Option<Response> {
            self.responses.pop_front().flatten()
        }

        fn observe(&mut self, _choice: Choice, feedback: bool) {
            self.observed.push(feedback);
        }
    }

    fn answer(choice: Choice, rt_ms: u32) -> Option<Response> {
        Some(Response { choice, rt_ms })
    }

    fn config(max_trials: usize, deadline: ResponseDeadline) -> SessionConfig {
        SessionConfig {
            max_trials,
            response_deadline: deadline,
            feedback_duration_ms: 500,
            initial_correct: Some(Choice::A),
            seed: Some(21),
            ..SessionConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn responses_beat_the_deadline_and_cancel_it() {
        let mut engine =
            PrltEngine::new(config(3, ResponseDeadline::Limited(1_000))).expect("valid config");
        let mut participant = Scripted::new(vec![
            answer(Choice::A, 400),
            answer(Choice::A, 250),
            answer(Choice::B, 900),
        ]);
        let mut qc = QualityFlags::pristine();

        let start = Instant::now();
        let summary = run_session(&mut engine, &mut participant, &mut qc)
            .await
            .expect("session runs");

        assert_eq!(summary.responses, 3);
        assert_eq!(summary.omissions, 0);
        assert_eq!(summary.stale_events, 0);
        let rts: Vec<u32> = engine.trials().iter().map(|t| t.rt_ms).collect();
        assert_eq!(rts, vec![400, 250, 900]);
        assert_eq!(participant.observed.len(), 3);
        assert_eq!(start.elapsed().as_millis(), 400 + 250 + 900 + 3 * 500);
        assert!(qc.min_trials_met);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_or_missing_responses_become_omissions() {
        let mut engine =
            PrltEngine::new(config(3, ResponseDeadline::Limited(1_000))).expect("valid config");
        let mut participant = Scripted::new(vec![
            answer(Choice::A, 300),
            answer(Choice::A, 1_500),
            None,
        ]);
        let mut qc = QualityFlags::pristine();

        let summary = run_session(&mut engine, &mut participant, &mut qc)
            .await
            .expect("session runs");

        assert_eq!(summary.responses, 1);
        assert_eq!(summary.omissions, 2);
        let trials = engine.trials();
        assert!(trials[1].is_omission);
        assert_eq!(trials[1].rt_ms, 1_000);
        assert!(trials[2].is_omission);
        assert_eq!(qc.omissions, 2);
        assert!(!qc.min_trials_met);
        assert_eq!(participant.observed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_deadline_waits_for_slow_responses() {
        let mut engine =
            PrltEngine::new(config(2, ResponseDeadline::Unlimited)).expect("valid config");
        let mut participant =
            Scripted::new(vec![answer(Choice::A, 60_000), answer(Choice::B, 120_000)]);
        let mut qc = QualityFlags::pristine();

        let summary = run_session(&mut engine, &mut participant, &mut qc)
            .await
            .expect("session runs");
        assert_eq!(summary.omissions, 0);
        assert_eq!(engine.trials()[1].rt_ms, 120_000);
    }

    #[tokio::test(start_paused = true)]
    async fn no_response_without_deadline_is_reported() {
        let mut engine =
            PrltEngine::new(config(2, ResponseDeadline::Unlimited)).expect("valid config");
        let mut participant = Scripted::new(vec![None]);
        let mut qc = QualityFlags::pristine();

        let err = run_session(&mut engine, &mut participant, &mut qc)
            .await
            .expect_err("stalls");
        assert!(matches!(err, RunnerError::Stalled { trial_index: 1 }));
    }
}
