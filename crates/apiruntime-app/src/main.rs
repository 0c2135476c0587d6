//! `apiruntime-app`: the host binary that composes the runtime's one owned
//! CLI contract, `serve-http` (SPEC_FULL.md §6 "CLI surface"). Everything
//! else — a general-purpose CLI framework, DI container — is explicitly
//! out of scope (§1); this binary exists to prove the wiring layer actually
//! boots a listener, the way `agentgateway-app`'s `main.rs` does for its own
//! runtime.
mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use apiruntime::config::AppConfig;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "apiruntime", about = "API runtime host binary")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Starts the HTTP listener and blocks until shutdown (SPEC_FULL.md §6).
	ServeHttp {
		#[arg(long)]
		config: PathBuf,
		#[arg(long)]
		host: Option<String>,
		#[arg(long)]
		port: Option<u16>,
	},
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(rt) => rt,
		Err(e) => {
			eprintln!("failed to start the tokio runtime: {e}");
			return ExitCode::from(1);
		},
	};

	match cli.command {
		Command::ServeHttp { config, host, port } => runtime.block_on(serve_http(config, host, port)),
	}
}

async fn serve_http(config_path: PathBuf, host: Option<String>, port: Option<u16>) -> ExitCode {
	let mut config = match load_config(&config_path) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("config error: {e:#}");
			return ExitCode::from(2);
		},
	};

	if let Some(host) = host {
		config.httpserver.server.host = host;
	}
	if let Some(port) = port {
		config.httpserver.server.port = port;
	}

	let built = match wiring::Builder::new(config).build() {
		Ok(built) => built,
		Err(e) => {
			eprintln!("config error: {e:#}");
			return ExitCode::from(2);
		},
	};

	match run_server(built).await {
		Ok(()) => ExitCode::from(0),
		Err(e) => {
			eprintln!("server error: {e:#}");
			ExitCode::from(1)
		},
	}
}

fn load_config(path: &PathBuf) -> Result<AppConfig> {
	let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
	serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Binds the listener and serves until a shutdown signal is observed.
/// `with_graceful_shutdown`'s future resolves the instant a signal arrives
/// (so `axum` stops accepting new connections immediately); the grace
/// deadline described in SPEC_FULL.md §5 is enforced separately by a spawned
/// task that cancels the shared token only after `shutdown_timeout` has
/// elapsed, giving in-flight handlers a chance to finish on their own first.
async fn run_server(built: wiring::Built) -> Result<()> {
	let listener = tokio::net::TcpListener::bind(&built.bind_addr).await.with_context(|| format!("binding {}", built.bind_addr))?;
	tracing::info!(addr = %built.bind_addr, "apiruntime listening");

	let shutdown = built.shutdown.clone();
	let shutdown_timeout = built.shutdown_timeout;

	axum::serve(listener, built.router)
		.with_graceful_shutdown(shutdown_signal(shutdown, shutdown_timeout))
		.await
		.context("serving requests")
}

async fn shutdown_signal(cancellation: CancellationToken, shutdown_timeout: Duration) {
	wait_for_signal().await;
	tracing::info!("shutdown signal received, draining in-flight requests");
	tokio::spawn(async move {
		tokio::time::sleep(shutdown_timeout).await;
		cancellation.cancel();
	});
}

async fn wait_for_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install sigterm handler")
			.recv()
			.await;
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
