use tokio::sync::oneshot;
use tracing::error;

use crate::{
    flight::FlightInput,
    model::Regressor,
    service::{self, PredictionResult, PredictionService, Status},
};

#[derive(Debug)]
pub enum Command {
    Predict {
        input: FlightInput,
        reply_sender: oneshot::Sender<Result<PredictionResult, service::Error>>,
    },
    Status {
        reply_sender: oneshot::Sender<Status>,
    },
    Shutdown,
}

/// Returns `true` if the runtime should shut down.
pub fn handle_command<R: Regressor>(command: Command, service: &PredictionService<R>) -> bool {
    match command {
        Command::Predict {
            input,
            reply_sender,
        } => {
            let _ = reply_sender
                .send(service.predict(&input))
                .inspect_err(|_| error!("Failed to send predict reply"));
        }
        Command::Status { reply_sender } => {
            let _ = reply_sender
                .send(service.status())
                .inspect_err(|_| error!("Failed to send status reply"));
        }
        Command::Shutdown => {
            // Should shutdown
            return true;
        }
    }

    // Should not shutdown
    false
}
