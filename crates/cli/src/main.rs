use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pairlink::{Collaborators, Orchestrator, ProcessRegistry, ServiceConfig, SessionPersistence, SessionStore, Sweeper};
use pairlink_cli::cli::Cli;
use pairlink_cli::gateway::{self, Dispatcher, TelegramClient, TelegramNotifier};
use pairlink_cli::http::{self, AppState};
use pairlink_cli::logging;
use pairlink_runtime::credentials::reclaim_orphans;
use pairlink_runtime::driver::DriverConnector;
use pairlink_runtime::{BlobUploader, DisabledUploader, HttpUploader};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = run(cli).await {
		error!(target = "pairlink", error = %format!("{err:#}"), "service failed");
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<()> {
	let config = cli.service_config().context("invalid configuration")?;
	let token = config.bot_token.clone().context("a bot token is required (--bot-token or BOT_TOKEN)")?;

	tokio::fs::create_dir_all(&config.state_dir)
		.await
		.with_context(|| format!("failed to create state dir {}", config.state_dir.display()))?;
	tokio::fs::create_dir_all(&config.auth_root)
		.await
		.with_context(|| format!("failed to create auth root {}", config.auth_root.display()))?;

	let persistence = Arc::new(SessionPersistence::new(Arc::new(SessionStore::new()), &config.state_dir));
	persistence.restore().await;
	if let Err(err) = reclaim_orphans(&config.auth_root).await {
		warn!(target = "pairlink", root = %config.auth_root.display(), error = %err, "orphaned auth dir scan failed");
	}

	let telegram = TelegramClient::new(&token);
	let orchestrator = Orchestrator::new(
		config.pairing_settings(),
		Arc::new(ProcessRegistry::new()),
		Arc::clone(&persistence),
		Collaborators {
			connector: Arc::new(DriverConnector::new(config.driver.program.clone(), config.driver.args.clone())),
			uploader: uploader(&config),
			notifier: Arc::new(TelegramNotifier::new(telegram.clone())),
		},
	);

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let sweeper = tokio::spawn(Sweeper::new(orchestrator.clone(), config.sweep_interval(), config.stale_after()).run(shutdown_rx.clone()));
	let flusher = tokio::spawn(Arc::clone(&persistence).run(config.flush_interval(), shutdown_rx.clone()));

	let listener = TcpListener::bind(("0.0.0.0", config.port))
		.await
		.with_context(|| format!("failed to bind liveness endpoint on port {}", config.port))?;
	let server = tokio::spawn(http::serve(listener, AppState::new(orchestrator.clone()), shutdown_rx.clone()));
	let polling = tokio::spawn(gateway::run_polling(
		telegram,
		Dispatcher::new(orchestrator.clone()),
		std::time::Duration::from_secs(config.poll_timeout_secs),
		shutdown_rx,
	));

	info!(target = "pairlink", port = config.port, sessions = persistence.store().len(), "pairlink running");
	wait_for_signal().await?;

	let _ = shutdown_tx.send(true);
	if let Err(err) = flusher.await {
		error!(target = "pairlink", error = %err, "persistence task panicked");
	}
	orchestrator.shutdown().await;

	let (sweeper, server, polling) = tokio::join!(sweeper, server, polling);
	if let Ok(Err(err)) = server {
		warn!(target = "pairlink.http", error = %err, "liveness endpoint stopped with error");
	}
	if sweeper.is_err() || polling.is_err() {
		warn!(target = "pairlink", "background task panicked during shutdown");
	}

	info!(target = "pairlink", "pairlink stopped");
	Ok(())
}

fn uploader(config: &ServiceConfig) -> Arc<dyn BlobUploader> {
	match &config.upload_endpoint {
		Some(endpoint) => Arc::new(HttpUploader::new(endpoint.clone())),
		None => {
			info!(target = "pairlink", "no upload endpoint configured; sessions get local ids");
			Arc::new(DisabledUploader)
		}
	}
}

async fn wait_for_signal() -> Result<()> {
	let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
	let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

	tokio::select! {
		_ = sigterm.recv() => info!(target = "pairlink", "received SIGTERM"),
		_ = sigint.recv() => info!(target = "pairlink", "received SIGINT"),
	}
	Ok(())
}
