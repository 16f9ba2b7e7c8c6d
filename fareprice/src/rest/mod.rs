mod error;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::{sync::oneshot, task::JoinHandle};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, info};

use crate::{
    flight::FlightInput,
    model::Regressor,
    rest::error::ApiError,
    service::{PredictionResult, PredictionService, Status},
};
pub use crate::rest::error::{Error, ErrorBody};

pub struct Server {
    local_addr: SocketAddr,
    server_join_handle: JoinHandle<()>,
    shutdown_sender: oneshot::Sender<()>,
}

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

struct ServerState<R> {
    service: Arc<PredictionService<R>>,
}

impl<R> Clone for ServerState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl Server {
    pub async fn new<R: Regressor>(
        config: &Config,
        service: Arc<PredictionService<R>>,
    ) -> Result<Self, Error> {
        let router = router(config, service);
        let listener = tokio::net::TcpListener::bind(config.addr)
            .await
            .map_err(|cause| Error::IO {
                message: format!("Failed to listen on {}", config.addr),
                cause,
            })?;
        let local_addr = listener.local_addr().map_err(|cause| Error::IO {
            message: "Failed to get the local address".to_string(),
            cause,
        })?;
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let server_join_handle = tokio::spawn(async move {
            info!("starting REST server: {local_addr}");
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal(shutdown_receiver))
                .await
            {
                error!("REST server terminated with error: {e}");
            }
        });

        Ok(Self {
            local_addr,
            server_join_handle,
            shutdown_sender,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(self) {
        // The receiver is gone only if the server task already exited.
        let _ = self.shutdown_sender.send(());
        if let Err(e) = self.server_join_handle.await {
            error!("REST server task failed: {e}");
        }
        info!("REST server has been shut down.");
    }
}

/// A future to be passed to the [`axum::serve::Serve::with_graceful_shutdown`].
/// When this future resolves, the axum server will start graceful shutdown.
async fn shutdown_signal(shutdown_receiver: oneshot::Receiver<()>) {
    // A dropped sender means the `Server` is gone, which is a shutdown as well.
    let _ = shutdown_receiver.await;
    info!("starting graceful shutdown for REST server...");
}

pub(crate) fn router<R: Regressor>(config: &Config, service: Arc<PredictionService<R>>) -> Router {
    let router = Router::new()
        .route("/predict", post(predict::<R>))
        .route("/status", get(status::<R>))
        .layer(TraceLayer::new_for_http())
        .layer(
            // Necessary for graceful shutdown
            TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout),
        );
    let router = if config.cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };
    router.with_state(ServerState { service })
}

async fn predict<R: Regressor>(
    State(state): State<ServerState<R>>,
    payload: Result<Json<FlightInput>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(input) = payload?;
    debug!("predict request: {input:?}");
    Ok(Json(state.service.predict(&input)?))
}

async fn status<R: Regressor>(State(state): State<ServerState<R>>) -> Json<Status> {
    Json(state.service.status())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub addr: SocketAddr,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Allow any origin, method and header.
    pub cors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cors: true,
        }
    }
}
