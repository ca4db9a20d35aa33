use rust_fanout_logs::os_signals::wait_for_shutdown_signal;
use rust_fanout_logs::{Config, ProcessContext, Subscriber};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Setup tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let context = ProcessContext::default();

    let subscription = match Subscriber::new(&config, context.clone()).setup().await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // The signal listener is the only thing that fires the shutdown token.
    let shutdown = context.shutdown.clone();
    let signal = tokio::spawn(async move {
        let received = wait_for_shutdown_signal().await;
        shutdown.cancel();
        received
    });

    if let Err(e) = subscription.run().await {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    match signal.await {
        Ok(Ok(received)) => {
            info!(signal = %received, "Exiting");
            ExitCode::from(received.exit_code())
        }
        Ok(Err(e)) => {
            warn!("Failed to listen for shutdown signals: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            warn!("Signal listener task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
