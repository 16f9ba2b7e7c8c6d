//! Airline ticket price prediction served over HTTP.
//!
//! [`Fareprice`] loads the pre-trained model once, exposes it through the
//! REST server (feature `rest`) and answers [`Command`]s sent over the
//! channel returned by [`Fareprice::new`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub use crate::command::{Command, handle_command};
#[cfg(feature = "rest")]
pub use crate::rest::Config as RestConfig;
pub use crate::{
    model::Config as ModelConfig,
    service::{PredictionResult, PredictionService, Status},
};

mod command;
pub mod flight;
pub mod model;
#[cfg(feature = "rest")]
pub mod rest;
pub mod service;

const COMMAND_CHANNEL_SIZE: usize = 100;

pub struct Fareprice {
    config: Config,
    command_receiver: mpsc::Receiver<Command>,
}

impl Fareprice {
    pub fn new(config: Config) -> (Self, mpsc::Sender<Command>) {
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        (
            Self {
                config,
                command_receiver,
            },
            command_sender,
        )
    }

    /// Loads the model, starts serving, and handles commands until
    /// [`Command::Shutdown`] arrives or every sender is dropped.
    ///
    /// Startup failures (most importantly a missing model artifact) are sent
    /// to `ready_sender` and nothing is served.
    pub async fn run(mut self, ready_sender: oneshot::Sender<Result<(), Error>>) {
        info!("Fareprice is running...");

        let service = match self.load_service() {
            Ok(service) => service,
            Err(e) => {
                error!("Failed to load the model: {e}");
                let _ = ready_sender.send(Err(e));
                return;
            }
        };

        #[cfg(feature = "rest")]
        let rest_server = match rest::Server::new(&self.config.rest, service.clone()).await {
            Ok(server) => server,
            Err(e) => {
                error!("Failed to start REST server: {e}");
                let _ = ready_sender.send(Err(e.into()));
                return;
            }
        };

        if ready_sender.send(Ok(())).is_err() {
            warn!("Nobody is waiting for the ready signal");
        }

        loop {
            let Some(cmd) = self.command_receiver.recv().await else {
                warn!("All command senders dropped, shutting down.");
                break;
            };
            debug!("Command received: {:?}", cmd);
            if handle_command(cmd, &service) {
                break;
            }
        }

        #[cfg(feature = "rest")]
        rest_server.shutdown().await;
        info!("Fareprice has been shut down.");
    }

    fn load_service(&self) -> Result<Arc<PredictionService<model::Model>>, Error> {
        let model = self.config.model.load()?;
        Ok(Arc::new(PredictionService::new(model)?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Model error: {0}")]
    Model(#[from] model::Error),
    #[cfg(feature = "rest")]
    #[error("HTTP error: {0}")]
    Http(#[from] rest::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub model: model::Config,
    #[cfg(feature = "rest")]
    pub rest: rest::Config,
}
