//! Command-line console for the back-office admin session.
//!
//! Restores the persisted session, runs one command and exits.

mod command;
mod config;

use std::process::ExitCode;
use std::sync::Arc;

use backoffice_session::{AuthSessionManager, FileTokenStore, HttpAuthApi};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::command::Command;
use crate::config::AdminConfig;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let config = match AdminConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!("Loaded configuration");

    let api = match HttpAuthApi::new(config.api) {
        Ok(api) => api,
        Err(e) => {
            tracing::error!(error = %e, "failed to create API client");
            return ExitCode::FAILURE;
        }
    };
    let store = FileTokenStore::new(config.store_path);
    tracing::debug!(store = %store.path().display(), "using session file");
    let manager = AuthSessionManager::new(Arc::new(api), Arc::new(store), config.session);

    let state = manager.start().await;
    tracing::debug!(?state, "session restored");
    // One-shot process: commands validate explicitly.
    manager.shutdown();

    let outcome = tokio::select! {
        outcome = command.run(&manager) => outcome,
        _ = tokio::signal::ctrl_c() => Err("interrupted".to_string()),
    };

    match outcome {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
