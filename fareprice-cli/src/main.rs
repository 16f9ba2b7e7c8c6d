use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use fareprice::{Fareprice, ModelConfig, RestConfig, flight::FlightInput};
use tokio::{
    signal,
    sync::{mpsc, oneshot},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    info!("Starting Fareprice binary...");
    if let Err(e) = run(args).await {
        error!("Error: {e}");
        std::process::exit(1);
    } else {
        info!("Fareprice has been terminated.");
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config();

    let (fareprice, command_sender) = Fareprice::new(config);
    let (ready_sender, ready_receiver) = oneshot::channel();
    let fareprice_task = tokio::spawn(async move { fareprice.run(ready_sender).await });
    ready_receiver
        .await
        .expect("ready channel shouldn't be closed")?;

    let result = match args.command {
        Command::Daemonize => {
            handle_status(&command_sender).await;
            daemonize().await;
            Ok(())
        }
        Command::Status => {
            handle_status(&command_sender).await;
            Ok(())
        }
        Command::Predict { input } => handle_predict(&command_sender, input).await,
    };

    // Shutdown Fareprice.
    command_sender
        .send(fareprice::Command::Shutdown)
        .await
        .inspect_err(|e| {
            error!("Channel send error: {e}");
        })?;
    info!("Waiting for Fareprice to terminate...");
    if let Err(e) = fareprice_task.await {
        error!("Failed to wait until Fareprice is terminated: {e}");
    }
    result
}

/// A future that resolves when a termination signal is received.
async fn daemonize() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Termination signal received");
}

async fn handle_status(command_sender: &mpsc::Sender<fareprice::Command>) {
    info!("Handling status command");
    let (reply_sender, reply_receiver) = oneshot::channel();
    if let Err(e) = command_sender
        .send(fareprice::Command::Status { reply_sender })
        .await
    {
        error!("Channel send error: {e}");
        return;
    }
    let Ok(status) = reply_receiver.await else {
        error!("Failed to receive status reply");
        return;
    };

    println!("============================");
    println!(" Status");
    println!("============================");
    println!(
        "{}",
        serde_json::to_string_pretty(&status).expect("Status should be serializable")
    );
}

async fn handle_predict(
    command_sender: &mpsc::Sender<fareprice::Command>,
    input: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Predicting the price for {input:?}");
    let data = std::fs::read(&input)
        .map_err(|e| format!("Failed to read flight input at {input:?}: {e}"))?;
    let input: FlightInput = serde_json::from_slice(&data)?;

    let (reply_sender, reply_receiver) = oneshot::channel();
    command_sender
        .send(fareprice::Command::Predict {
            input,
            reply_sender,
        })
        .await?;
    let result = reply_receiver.await??;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

#[derive(Debug, Parser)]
#[command(version, about = "Airline ticket price prediction service")]
struct Args {
    /// Path to the JSON model artifact
    #[clap(long, env = "FAREPRICE_MODEL_PATH", default_value = fareprice::model::DEFAULT_MODEL_PATH)]
    model_path: PathBuf,
    #[clap(long, env = "FAREPRICE_REST_ADDR", default_value = "127.0.0.1:8000")]
    rest_addr: SocketAddr,
    #[clap(long, env = "FAREPRICE_REQUEST_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    request_timeout: Duration,
    /// Disable the permissive CORS policy
    #[clap(long, env = "FAREPRICE_NO_CORS")]
    no_cors: bool,
    #[clap(subcommand)]
    command: Command,
}

impl Args {
    fn to_config(&self) -> fareprice::Config {
        fareprice::Config {
            model: ModelConfig {
                path: self.model_path.clone(),
            },
            rest: RestConfig {
                addr: self.rest_addr,
                request_timeout: self.request_timeout,
                cors: !self.no_cors,
            },
        }
    }
}

#[derive(Debug, Parser)]
enum Command {
    /// Serve HTTP requests until SIGINT or SIGTERM
    Daemonize,
    /// Print the loaded model
    Status,
    /// Predict the price for a JSON flight input file
    Predict { input: PathBuf },
}
