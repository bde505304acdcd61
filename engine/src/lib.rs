//! Shared engine crate for the probabilistic reversal-learning task. Trial logic, feedback
//! randomization, model fitting and result exports live here; front ends stay thin.

pub mod core;
pub mod modeling;
pub mod results;
pub mod tasks;
