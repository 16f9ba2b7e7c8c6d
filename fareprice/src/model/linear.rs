use serde::{Deserialize, Serialize};

use crate::model::{Error, Regressor, check_feature_count};

/// `intercept + Σ coefficients[i] * x[i]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Linear {
    pub n_features: usize,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl Linear {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.coefficients.len() != self.n_features {
            return Err(Error::InvalidArtifact(format!(
                "linear model has {} coefficients for {} features",
                self.coefficients.len(),
                self.n_features
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidArtifact(
                "linear model has non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }
}

impl Regressor for Linear {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<f64, Error> {
        check_feature_count(self.n_features, features)?;
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>())
    }
}
