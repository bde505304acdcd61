//! Quality control markers for task sessions. These flags capture context that helps interpret runs.

use serde::{Deserialize, Serialize};

/// Share of planned trials that must carry a response for a session to count as complete.
pub const MIN_VALID_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityFlags {
    pub focus_lost_events: u32,
    pub omissions: u32,
    pub min_trials_met: bool,
    pub device: DeviceSnapshot,
}

impl QualityFlags {
    pub fn pristine() -> Self {
        Self {
            focus_lost_events: 0,
            omissions: 0,
            min_trials_met: true,
            device: DeviceSnapshot::capture(),
        }
    }

    pub fn log_focus_loss(&mut self) {
        self.focus_lost_events = self.focus_lost_events.saturating_add(1);
    }

    pub fn log_omission(&mut self) {
        self.omissions = self.omissions.saturating_add(1);
    }

    pub fn mark_min_trials(&mut self, met: bool) {
        self.min_trials_met = met;
    }

    /// Marks the minimum-trial requirement from the number of answered trials.
    pub fn assess_valid_trials(&mut self, valid: usize, planned: usize) {
        let required = (planned as f64 * MIN_VALID_FRACTION).ceil() as usize;
        self.mark_min_trials(valid >= required);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSnapshot {
    pub platform: String,
    pub arch: String,
}

impl DeviceSnapshot {
    pub fn capture() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

impl Default for QualityFlags {
    fn default() -> Self {
        Self::pristine()
    }
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self::capture()
    }
}
