use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    flight::{FEATURE_NAMES, FlightInput, N_FEATURES, ValidationError},
    model::{self, Regressor},
};

/// Validates flight input, maps it to the model's feature layout and returns
/// the rounded price estimate. Holds the model read-only for its whole life.
pub struct PredictionService<R> {
    model: R,
}

impl<R: Regressor> PredictionService<R> {
    /// Fails if the model was not trained on the canonical feature layout.
    pub fn new(model: R) -> Result<Self, model::Error> {
        if model.n_features() != N_FEATURES {
            return Err(model::Error::FeatureCount {
                expected: N_FEATURES,
                actual: model.n_features(),
            });
        }
        Ok(Self { model })
    }

    pub fn predict(&self, input: &FlightInput) -> Result<PredictionResult, Error> {
        input.validate()?;
        let features = input.to_feature_vector();
        let price = self.model.predict(features.as_slice())?;
        if !price.is_finite() {
            return Err(model::Error::NonFiniteOutput(price).into());
        }
        debug!("Predicted price {price} for {features:?}");
        Ok(PredictionResult {
            predicted_price: round_price(price),
        })
    }

    pub fn status(&self) -> Status {
        Status {
            model_kind: self.model.kind().to_string(),
            n_features: self.model.n_features(),
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }
}

/// Rounds the exact binary value to two decimals, ties to even.
fn round_price(price: f64) -> f64 {
    format!("{price:.2}").parse().unwrap_or(price)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub model_kind: String,
    pub n_features: usize,
    pub feature_names: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Prediction failed: {0}")]
    Inference(#[from] model::Error),
}
