//! Timing utilities and the response gate shared by task runners.
//!
//! Exactly one trial is open at a time. The gate is the single flag that decides whether an
//! incoming response (or a deadline firing) may complete that trial; every completion carries
//! the ticket it was issued for, so a late timer or a double key press resolves to a no-op.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifies one open trial inside one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialTicket {
    pub run_id: u64,
    pub trial_index: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ResponseGate {
    run_id: u64,
    open: Option<TrialTicket>,
}

impl ResponseGate {
    pub fn new(run_id: u64) -> Self {
        Self { run_id, open: None }
    }

    /// Opens the gate for `trial_index` and returns the ticket completions must present.
    pub fn open(&mut self, trial_index: usize) -> TrialTicket {
        let ticket = TrialTicket {
            run_id: self.run_id,
            trial_index,
        };
        self.open = Some(ticket);
        ticket
    }

    pub fn is_accepting(&self) -> bool {
        self.open.is_some()
    }

    pub fn current(&self) -> Option<TrialTicket> {
        self.open
    }

    /// Closes the gate when `ticket` names the open trial. Returns `false` for stale tickets
    /// and for a second completion of the same trial.
    pub fn try_close(&mut self, ticket: TrialTicket) -> bool {
        if self.open == Some(ticket) {
            self.open = None;
            true
        } else {
            false
        }
    }

    /// Drops the open trial without completing it (abort).
    pub fn close(&mut self) {
        self.open = None;
    }
}

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_completion_wins() {
        let mut gate = ResponseGate::new(7);
        let ticket = gate.open(3);
        assert!(gate.is_accepting());
        assert!(gate.try_close(ticket));
        assert!(!gate.try_close(ticket), "late deadline must be a no-op");
        assert!(!gate.is_accepting());
    }

    #[test]
    fn stale_ticket_does_not_close_next_trial() {
        let mut gate = ResponseGate::new(1);
        let old = gate.open(1);
        assert!(gate.try_close(old));
        let next = gate.open(2);
        assert!(!gate.try_close(old));
        assert_eq!(gate.current(), Some(next));
    }

    #[test]
    fn tickets_from_other_runs_are_rejected() {
        let mut gate = ResponseGate::new(2);
        gate.open(1);
        let foreign = TrialTicket {
            run_id: 1,
            trial_index: 1,
        };
        assert!(!gate.try_close(foreign));
        assert!(gate.is_accepting());
    }
}
