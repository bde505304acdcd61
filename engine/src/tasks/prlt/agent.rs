//! Simulated participant: a single-rate Q-learner with softmax choices, uniform reaction
//! times and an optional lapse rate.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::runner::{Participant, Response};
use super::Choice;
use crate::modeling::models::prob_b;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentParams {
    pub alpha: f64,
    pub beta: f64,
    /// Probability of letting a trial run past its deadline.
    pub lapse_rate: f64,
    pub rt_min_ms: u32,
    pub rt_max_ms: u32,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            beta: 5.0,
            lapse_rate: 0.0,
            rt_min_ms: 250,
            rt_max_ms: 900,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedParticipant {
    params: AgentParams,
    values: [f64; 2],
    rng: StdRng,
}

impl SimulatedParticipant {
    pub fn new(params: AgentParams, seed: u64) -> Self {
        Self {
            params,
            values: [0.5; 2],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> AgentParams {
        self.params
    }

    pub fn values(&self) -> [f64; 2] {
        self.values
    }

    pub fn choose(&mut self) -> Choice {
        let p_b = prob_b(self.values, self.params.beta);
        if self.rng.gen::<f64>() < p_b {
            Choice::B
        } else {
            Choice::A
        }
    }

    /// Delta-rule update from shown feedback coded 0/1.
    pub fn learn(&mut self, choice: Choice, rewarded: bool) {
        let reward = if rewarded { 1.0 } else { 0.0 };
        let value = &mut self.values[choice.index()];
        *value += self.params.alpha * (reward - *value);
    }

    fn reaction_time(&mut self) -> u32 {
        let lo = self.params.rt_min_ms.min(self.params.rt_max_ms);
        let hi = self.params.rt_min_ms.max(self.params.rt_max_ms);
        self.rng.gen_range(lo..=hi)
    }
}

impl Participant for SimulatedParticipant {
    fn respond(&mut self, _trial_index: usize) -> Option<Response> {
        if self.params.lapse_rate > 0.0 && self.rng.gen::<f64>() < self.params.lapse_rate {
            return None;
        }
        let choice = self.choose();
        Some(Response {
            choice,
            rt_ms: self.reaction_time(),
        })
    }

    fn observe(&mut self, choice: Choice, feedback: bool) {
        self.learn(choice, feedback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_moves_the_chosen_value_only() {
        let mut agent = SimulatedParticipant::new(AgentParams::default(), 1);
        agent.learn(Choice::B, true);
        let [a, b] = agent.values();
        assert_eq!(a, 0.5);
        assert!((b - 0.65).abs() < 1e-12);
        agent.learn(Choice::A, false);
        assert!((agent.values()[0] - 0.35).abs() < 1e-12);
    }

    #[test]
    fn reaction_times_stay_in_range() {
        let mut agent = SimulatedParticipant::new(
            AgentParams {
                rt_min_ms: 300,
                rt_max_ms: 310,
                ..AgentParams::default()
            },
            2,
        );
        for trial in 1..=50 {
            let response = agent.respond(trial).expect("no lapses configured");
            assert!((300..=310).contains(&response.rt_ms));
        }
    }

    #[test]
    fn certain_lapses_never_respond() {
        let mut agent = SimulatedParticipant::new(
            AgentParams {
                lapse_rate: 1.0,
                ..AgentParams::default()
            },
            3,
        );
        assert!((1..=20).all(|trial| agent.respond(trial).is_none()));
    }

    #[test]
    fn confident_agent_exploits_the_better_option() {
        let mut agent = SimulatedParticipant::new(
            AgentParams {
                beta: 20.0,
                ..AgentParams::default()
            },
            4,
        );
        for _ in 0..20 {
            agent.learn(Choice::A, true);
            agent.learn(Choice::B, false);
        }
        let picks_a = (0..200).filter(|_| agent.choose() == Choice::A).count();
        assert!(picks_a > 190, "picked A {picks_a} times");
    }
}
