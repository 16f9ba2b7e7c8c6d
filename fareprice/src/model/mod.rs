//! The pre-trained price model, consumed through [`Regressor`].
//!
//! Artifacts are JSON documents tagged by `kind`. Every backend is validated
//! when it is loaded so that a broken artifact stops the process at startup
//! instead of failing on the first request.

mod config;
mod linear;
mod tree;

use std::io;

use serde::{Deserialize, Serialize};

pub use crate::model::{
    config::{Config, DEFAULT_MODEL_PATH},
    linear::Linear,
    tree::{Boosting, Forest, Tree},
};

/// Single-sample inference over a fixed-width feature vector.
pub trait Regressor: Send + Sync + 'static {
    fn kind(&self) -> &'static str;

    fn n_features(&self) -> usize;

    /// Returns one scalar for one row of `n_features()` values.
    fn predict(&self, features: &[f64]) -> Result<f64, Error>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Linear(Linear),
    Forest(Forest),
    Boosting(Boosting),
}

impl Model {
    /// Parses and validates a JSON artifact.
    pub fn from_slice(data: &[u8]) -> Result<Self, Error> {
        let model: Self = serde_json::from_slice(data)?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Linear(model) => model.validate(),
            Self::Forest(model) => model.validate(),
            Self::Boosting(model) => model.validate(),
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            Self::Linear(model) => model,
            Self::Forest(model) => model,
            Self::Boosting(model) => model,
        }
    }
}

impl Regressor for Model {
    fn kind(&self) -> &'static str {
        self.inner().kind()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict(&self, features: &[f64]) -> Result<f64, Error> {
        self.inner().predict(features)
    }
}

fn check_feature_count(expected: usize, features: &[f64]) -> Result<(), Error> {
    if features.len() != expected {
        return Err(Error::FeatureCount {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {message}: {cause}")]
    IO { message: String, cause: io::Error },
    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    FeatureCount { expected: usize, actual: usize },
    #[error("Malformed tree: {0}")]
    MalformedTree(String),
    #[error("Model produced a non-finite output: {0}")]
    NonFiniteOutput(f64),
}
