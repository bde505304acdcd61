//! Single-subject maximum-likelihood fits of reinforcement-learning models by grid search.

pub mod grid;
pub mod interpret;
pub mod models;
pub mod outcome;
pub mod search;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use models::ModelKind;
pub use outcome::{ChoiceData, Encoding, Outcome};

use search::grid_search;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFit {
    pub model: ModelKind,
    pub params: BTreeMap<String, f64>,
    pub nll: f64,
    pub n_trials: usize,
}

impl ModelFit {
    pub fn param(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }

    pub fn aic(&self) -> f64 {
        2.0 * self.params.len() as f64 + 2.0 * self.nll
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFits {
    pub fits: Vec<ModelFit>,
}

impl ModelFits {
    pub fn get(&self, model: ModelKind) -> Option<&ModelFit> {
        self.fits.iter().find(|fit| fit.model == model)
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    /// Lowest AIC across fitted models.
    pub fn best_by_aic(&self) -> Option<&ModelFit> {
        self.fits
            .iter()
            .min_by(|a, b| a.aic().total_cmp(&b.aic()))
    }
}

pub fn fit_model(model: ModelKind, data: &ChoiceData) -> Option<ModelFit> {
    let axes = model.axes();
    let best = grid_search(&axes, |params| model.nll(data, params))?;
    debug!(
        model = model.name(),
        nll = best.value,
        evaluated = best.evaluated,
        "grid search finished"
    );

    let params = model
        .param_names()
        .iter()
        .zip(best.params)
        .map(|(name, value)| (name.to_string(), value))
        .collect();

    Some(ModelFit {
        model,
        params,
        nll: best.value,
        n_trials: data.len(),
    })
}

/// Fits every model independently. Nothing is fitted without answered trials.
pub fn fit_all_models(data: &ChoiceData) -> ModelFits {
    if data.is_empty() {
        return ModelFits::default();
    }

    #[cfg(feature = "parallel")]
    let fits = {
        use rayon::prelude::*;
        ModelKind::ALL
            .par_iter()
            .filter_map(|model| fit_model(*model, data))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let fits = ModelKind::ALL
        .iter()
        .filter_map(|model| fit_model(*model, data))
        .collect();

    ModelFits { fits }
}
