//! Formatting helpers for presenting metrics.

pub fn format_ms(value: f64) -> String {
    format!("{value:.0} ms")
}

/// Renders a 0..=1 rate as a whole percentage.
pub fn format_rate(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

pub fn format_param(value: f64) -> String {
    format!("{value:.3}")
}

/// Renders an optional trial index, falling back to a "not reached" marker.
pub fn format_trial(value: Option<usize>) -> String {
    match value {
        Some(trial) => trial.to_string(),
        None => "not reached".to_string(),
    }
}
