use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{Error, Model, Regressor as _};

pub const DEFAULT_MODEL_PATH: &str = "best_model.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

impl Config {
    /// Reads and validates the model artifact. A missing file is an error:
    /// the service must not start without its model.
    pub fn load(&self) -> Result<Model, Error> {
        let data = std::fs::read(&self.path).map_err(|cause| Error::IO {
            message: format!("Failed to read model artifact at {:?}", self.path),
            cause,
        })?;
        let model = Model::from_slice(&data)?;
        info!(
            "Loaded {} model with {} features from {:?}",
            model.kind(),
            model.n_features(),
            self.path
        );
        Ok(model)
    }
}
